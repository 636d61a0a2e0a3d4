//! J-Novel Club URL validation.

use regex::Regex;
use std::sync::OnceLock;

use crate::download::error::PipelineError;

pub const FIELD: &str = "jnovelclub_url";

static RE_JNC_URL: OnceLock<Regex> = OnceLock::new();
static RE_SLUG: OnceLock<Regex> = OnceLock::new();

fn re_jnc_url() -> &'static Regex {
    RE_JNC_URL.get_or_init(|| {
        Regex::new(r"(?i)^https://j-novel\.club/(read|series)/[a-z0-9-]+")
            .expect("compile RE_JNC_URL")
    })
}

fn re_slug() -> &'static Regex {
    RE_SLUG.get_or_init(|| {
        Regex::new(r"(?i)^https://j-novel\.club/(?:read|series)/([a-z0-9-]+)")
            .expect("compile RE_SLUG")
    })
}

/// Returns the trimmed URL when it points at a series or a part.
pub fn validate(raw: Option<&str>) -> Result<String, PipelineError> {
    let trimmed = raw.map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        return Err(PipelineError::validation(
            FIELD,
            "jnovelclub_url is missing from the request",
        ));
    }
    if !re_jnc_url().is_match(trimmed) {
        return Err(PipelineError::validation(
            FIELD,
            format!("Invalid J-Novel Club URL: {trimmed}"),
        ));
    }
    Ok(trimmed.to_string())
}

/// `https://j-novel.club/series/some-title#volume-2` -> `some-title`
pub fn slug(url: &str) -> Option<&str> {
    re_slug()
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
