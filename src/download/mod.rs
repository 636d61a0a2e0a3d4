//! Request-to-artifact flow.
//!
//! - `models`: request / artifact / response types
//! - `error`: `PipelineError` and its HTTP status mapping
//! - `packager`: single EPUB or zip bundle
//! - `pipeline`: validation, generation and packaging for one request

pub mod error;
pub mod models;
pub mod packager;
pub mod pipeline;
