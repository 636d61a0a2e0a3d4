//! Process-wide configuration (`Config`) and its defaults.
//!
//! Read once at startup, then shared read-only behind an `Arc`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigError, ConfigSpec, FieldMeta};
use super::credentials::DefaultCredentials;

pub const ENV_EMAIL: &str = "JNCEP_EMAIL";
pub const ENV_PASSWORD: &str = "JNCEP_PASSWORD";
pub const ENV_OUTPUT: &str = "JNCEP_OUTPUT";
pub const ENV_LOGS: &str = "JNCEP_LOGS";
pub const ENV_BIN: &str = "JNCEP_BIN";
pub const ENV_TIMEOUT: &str = "JNCEP_TIMEOUT";
pub const ENV_WEB_ADDR: &str = "JNCEP_WEB_ADDR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_jncep_bin")]
    pub jncep_bin: String,
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: None,
            password: None,
            output_dir: default_output_dir(),
            logs_dir: default_logs_dir(),
            bind_addr: default_bind_addr(),
            jncep_bin: default_jncep_bin(),
            generation_timeout: default_generation_timeout(),
        }
    }
}

impl Config {
    pub fn default_credentials(&self) -> DefaultCredentials {
        DefaultCredentials {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout)
    }
}

impl ConfigSpec for Config {
    fn fields() -> &'static [FieldMeta] {
        CONFIG_FIELDS
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_EMAIL) {
            self.email = Some(v);
        }
        if let Some(v) = get(ENV_PASSWORD) {
            self.password = Some(v);
        }
        if let Some(v) = get(ENV_OUTPUT) {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_LOGS) {
            self.logs_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_BIN) {
            self.jncep_bin = v;
        }
        if let Some(v) = get(ENV_WEB_ADDR) {
            self.bind_addr = v;
        }
        if let Some(v) = get(ENV_TIMEOUT) {
            self.generation_timeout = match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Env {
                        var: ENV_TIMEOUT,
                        value: v,
                    });
                }
            };
        }
        Ok(())
    }
}

const CONFIG_FIELDS: &[FieldMeta] = &[
    FieldMeta {
        name: "email",
        description: "Default J-Novel Club account email (env JNCEP_EMAIL).\nThe password is only read from JNCEP_PASSWORD or an explicit config file.",
    },
    FieldMeta {
        name: "output_dir",
        description: "Root for per-request working directories (env JNCEP_OUTPUT)",
    },
    FieldMeta {
        name: "logs_dir",
        description: "Log directory (env JNCEP_LOGS)",
    },
    FieldMeta {
        name: "bind_addr",
        description: "Listen address, comma separated for several (env JNCEP_WEB_ADDR)",
    },
    FieldMeta {
        name: "jncep_bin",
        description: "jncep executable used to build EPUBs (env JNCEP_BIN)",
    },
    FieldMeta {
        name: "generation_timeout",
        description: "Seconds before a running jncep process is killed (env JNCEP_TIMEOUT)",
    },
];

fn default_output_dir() -> PathBuf {
    PathBuf::from("/output")
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_jncep_bin() -> String {
    "jncep".to_string()
}

fn default_generation_timeout() -> u64 {
    600
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use super::*;
    use crate::base_system::config::{generate_yaml_with_comments, load_with_env};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let cfg: Config = load_with_env(None, env(&[])).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("/output"));
        assert_eq!(cfg.bind_addr, "0.0.0.0:5000");
        assert_eq!(cfg.jncep_bin, "jncep");
        assert_eq!(cfg.generation_timeout, 600);
        assert!(cfg.email.is_none());
        assert!(cfg.password.is_none());
    }

    #[test]
    fn env_overrides_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "email: file@x.com\noutput_dir: /srv/out\ngeneration_timeout: 30\n")
            .unwrap();

        let cfg: Config = load_with_env(
            Some(&path),
            env(&[
                (ENV_EMAIL, "env@x.com"),
                (ENV_PASSWORD, "secret"),
                (ENV_LOGS, "/logs"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.email.as_deref(), Some("env@x.com"));
        assert_eq!(cfg.password.as_deref(), Some("secret"));
        assert_eq!(cfg.output_dir, PathBuf::from("/srv/out"));
        assert_eq!(cfg.logs_dir, PathBuf::from("/logs"));
        assert_eq!(cfg.generation_timeout, 30);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let cfg: Config = load_with_env(None, env(&[(ENV_EMAIL, "  ")])).unwrap();
        assert!(cfg.email.is_none());
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = load_with_env::<Config, _>(None, env(&[(ENV_TIMEOUT, "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: ENV_TIMEOUT, .. }));

        let err = load_with_env::<Config, _>(None, env(&[(ENV_TIMEOUT, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_with_env::<Config, _>(Some(&dir.path().join("nope.yml")), env(&[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn commented_yaml_lists_every_field_but_no_password() {
        let yaml = generate_yaml_with_comments(&Config::default()).unwrap();
        for field in CONFIG_FIELDS {
            assert!(yaml.contains(&format!("{}:", field.name)), "{}", field.name);
        }
        assert!(yaml.contains("# Root for per-request working directories"));
        assert!(!yaml.contains("password:"));
    }
}
