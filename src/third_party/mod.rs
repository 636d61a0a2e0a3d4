//! EPUB generation collaborator boundary.
//!
//! The pipeline only sees [`ArtifactGenerator`]; `jncep_cli` is the production
//! implementation that drives the `jncep` command line tool.

pub mod jncep_cli;

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::download::models::GenerationRequest;

pub use jncep_cli::JncepCli;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("J-Novel Club login failed: {0}")]
    Auth(String),
    #[error("payment required: {0}")]
    PaymentRequired(String),
    #[error("nothing found for this URL: {0}")]
    NotFound(String),
    #[error("part range out of bounds: {0}")]
    Range(String),
    #[error("network error talking to J-Novel Club: {0}")]
    Network(String),
    #[error("EPUB generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("could not start the EPUB generator: {0}")]
    Launch(#[source] std::io::Error),
    #[error("EPUB generator exited with {code:?}: {detail}")]
    Failed { code: Option<i32>, detail: String },
}

/// Produces one EPUB per touched volume inside `output_dir`.
///
/// Blocking; callers run it off the async workers. Returned paths are ordered
/// by volume/part. Every failure is terminal for the request.
pub trait ArtifactGenerator: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, GenerationError>;
}
