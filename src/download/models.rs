//! Data carried through one EPUB request.

use std::path::PathBuf;

use crate::base_system::credentials::{CredentialOverrides, Credentials};
use crate::base_system::file_cleaner::WorkDir;
use crate::base_system::part_range::PartSelection;

pub const EPUB_MEDIA_TYPE: &str = "application/epub+zip";
pub const ZIP_MEDIA_TYPE: &str = "application/zip";

/// Raw fields as they arrived, before any validation.
#[derive(Debug, Clone, Default)]
pub struct RequestInput {
    pub jnovelclub_url: Option<String>,
    pub prepub_parts: Option<String>,
    pub overrides: CredentialOverrides,
}

/// A validated request, ready for the generator.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub source_url: String,
    pub part_range: PartSelection,
    pub credentials: Credentials,
}

/// Files produced for one request, all inside `workdir`.
#[derive(Debug)]
pub struct GeneratedArtifactSet {
    pub files: Vec<PathBuf>,
    pub workdir: WorkDir,
}

/// What goes back to the client. Holding it keeps the working directory alive.
#[derive(Debug)]
pub struct ServableResponse {
    pub path: PathBuf,
    pub media_type: &'static str,
    pub filename: String,
    pub workdir: WorkDir,
}
