//! Account credentials: per-request overrides on top of process defaults.

use std::fmt;

use tracing::info;

use crate::base_system::context::{ENV_EMAIL, ENV_PASSWORD};
use crate::download::error::PipelineError;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &mask_email(&self.email))
            .field("password", &"***")
            .finish()
    }
}

/// Process-wide defaults, taken from `Config` at startup.
#[derive(Clone, Default)]
pub struct DefaultCredentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl DefaultCredentials {
    pub fn is_complete(&self) -> bool {
        present(self.email.as_deref()).is_some() && present(self.password.as_deref()).is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CredentialOverrides {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Request,
    Environment,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Request => f.write_str("request"),
            Source::Environment => f.write_str("environment"),
        }
    }
}

pub fn resolve(
    overrides: &CredentialOverrides,
    defaults: &DefaultCredentials,
) -> Result<Credentials, PipelineError> {
    let (email, email_from) = pick(
        overrides.email.as_deref(),
        defaults.email.as_deref(),
        ENV_EMAIL,
    )?;
    let (password, password_from) = pick(
        overrides.password.as_deref(),
        defaults.password.as_deref(),
        ENV_PASSWORD,
    )?;

    info!(
        target: "pipeline",
        email = %mask_email(email),
        email_from = %email_from,
        password_from = %password_from,
        "credentials resolved"
    );

    Ok(Credentials {
        email: email.to_string(),
        password: password.to_string(),
    })
}

fn pick<'a>(
    request: Option<&'a str>,
    default: Option<&'a str>,
    field: &'static str,
) -> Result<(&'a str, Source), PipelineError> {
    if let Some(v) = present(request) {
        return Ok((v, Source::Request));
    }
    if let Some(v) = present(default) {
        return Ok((v, Source::Environment));
    }
    Err(PipelineError::Configuration { field })
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `abcdef@example.com` -> `abc...example.com`
pub fn mask_email(email: &str) -> String {
    let head: String = email.chars().take(3).collect();
    let domain = email.rsplit_once('@').map(|(_, d)| d).unwrap_or("");
    format!("{head}...{domain}")
}
