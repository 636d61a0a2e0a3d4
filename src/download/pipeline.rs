//! Turns raw request fields into a servable file.
//!
//! Order: URL check, credentials, part range, working directory, generator,
//! packager. Everything before the generator is local, so bad input never
//! costs a call to J-Novel Club.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use super::error::PipelineError;
use super::models::{GeneratedArtifactSet, GenerationRequest, RequestInput, ServableResponse};
use super::packager;
use crate::base_system::credentials::{self, DefaultCredentials};
use crate::base_system::file_cleaner::WorkDir;
use crate::base_system::jnc_url;
use crate::base_system::part_range::PartSelection;
use crate::third_party::ArtifactGenerator;

pub struct Pipeline {
    defaults: DefaultCredentials,
    output_root: PathBuf,
    generator: Arc<dyn ArtifactGenerator>,
}

impl Pipeline {
    pub fn new(
        defaults: DefaultCredentials,
        output_root: PathBuf,
        generator: Arc<dyn ArtifactGenerator>,
    ) -> Self {
        Self {
            defaults,
            output_root,
            generator,
        }
    }

    pub fn has_default_credentials(&self) -> bool {
        self.defaults.is_complete()
    }

    /// Validates without touching the network or the disk.
    pub fn prepare(&self, input: &RequestInput) -> Result<GenerationRequest, PipelineError> {
        let source_url = jnc_url::validate(input.jnovelclub_url.as_deref())?;
        let credentials = credentials::resolve(&input.overrides, &self.defaults)?;
        let part_range = PartSelection::parse(input.prepub_parts.as_deref())?;

        Ok(GenerationRequest {
            source_url,
            part_range,
            credentials,
        })
    }

    pub async fn run(&self, input: RequestInput) -> Result<ServableResponse, PipelineError> {
        let request = self.prepare(&input)?;
        info!(
            target: "pipeline",
            url = %request.source_url,
            parts = %request.part_range,
            "EPUB request accepted"
        );

        let workdir = WorkDir::create_in(&self.output_root)?;
        let generator = Arc::clone(&self.generator);

        // Generation and zipping are blocking; the working directory moves into
        // the task so that it is dropped (and removed) there on failure.
        let result = tokio::task::spawn_blocking(move || {
            let files = generator.generate(&request, workdir.path())?;
            packager::package(GeneratedArtifactSet { files, workdir }, &request.source_url)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("generation task failed: {e}")))?;

        if let Err(err) = &result {
            warn!(target: "pipeline", error = %err, "EPUB request failed");
        }
        result
    }
}
