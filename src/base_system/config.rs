//! Config file loading, env overrides and commented YAML generation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMeta {
    pub name: &'static str,
    pub description: &'static str,
}

pub trait ConfigSpec: Serialize + DeserializeOwned + Default {
    fn fields() -> &'static [FieldMeta];

    /// Applies process-environment overrides on top of the file/default values.
    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>;
}

/// Loads a config, then lets the environment override it.
///
/// - `config_path` is `Some` and exists: file values are merged over defaults
/// - `config_path` is `Some` but missing: error, an explicit path must exist
/// - `config_path` is `None`: defaults only
///
/// The file is never written back; the service treats config as read-only.
pub fn load<T: ConfigSpec>(config_path: Option<&Path>) -> Result<T, ConfigError> {
    load_with_env(config_path, |key| std::env::var(key).ok())
}

pub fn load_with_env<T, F>(config_path: Option<&Path>, lookup: F) -> Result<T, ConfigError>
where
    T: ConfigSpec,
    F: Fn(&str) -> Option<String>,
{
    let mut config = match config_path {
        Some(path) => read_merged::<T>(path)?,
        None => T::default(),
    };
    config.apply_env(lookup)?;
    Ok(config)
}

fn read_merged<T: ConfigSpec>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let user_yaml: Value = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut merged = serde_yaml::to_value(T::default())
        .map_err(|err| ConfigError::Validation(err.to_string()))?;
    merge_values(&mut merged, user_yaml);

    serde_yaml::from_value(merged).map_err(|err| ConfigError::Validation(err.to_string()))
}

pub fn generate_yaml_with_comments<T: ConfigSpec>(config: &T) -> Result<String, ConfigError> {
    let value =
        serde_yaml::to_value(config).map_err(|err| ConfigError::Validation(err.to_string()))?;
    let mapping = match value {
        Value::Mapping(map) => map,
        _ => {
            return Err(ConfigError::Validation(
                "config must serialize to a mapping".to_string(),
            ));
        }
    };

    let mut lines = Vec::new();
    for field in T::fields() {
        if !field.description.is_empty() {
            lines.push(format!("# {}", field.description.replace('\n', "\n# ")));
        }
        let key = Value::String(field.name.to_string());
        let val = mapping.get(&key).cloned().unwrap_or(Value::Null);
        let yaml_line = serde_yaml::to_string(&serde_yaml::Mapping::from_iter([(key, val)]))
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        lines.push(yaml_line.trim().to_string());
    }

    Ok(lines.join("\n"))
}

fn merge_values(default: &mut Value, user: Value) {
    match (default, user) {
        (Value::Mapping(dest), Value::Mapping(src)) => {
            for (key, user_val) in src {
                if let Some(dest_val) = dest.get_mut(&key) {
                    merge_values(dest_val, user_val);
                } else {
                    dest.insert(key, user_val);
                }
            }
        }
        // A null in the user file keeps the default.
        (_, Value::Null) => {}
        (dest, other) => {
            *dest = other;
        }
    }
}
