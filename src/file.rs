//! Config file resolution and loading.
//!
//! A `--config` value names either a file or a directory. A directory is
//! resolved by convention to `{dir}/{program stem}.yaml`, so one directory
//! can hold the configs of several programs side by side.
//!
//! The format is chosen from the path: anything containing `.yaml` is read
//! as YAML, anything containing `.json` as JSON. Other paths are rejected
//! with [`ArgError::UnsupportedFormat`].

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::ArgError;

/// Resolve a `--config` value to a concrete file path.
///
/// `program` is the invoking program as it appears in `argv[0]`; only its
/// file stem is used.
pub fn resolve_config_path(config: &Path, program: &str) -> PathBuf {
    if config.is_dir() {
        config.join(format!("{}.yaml", program_stem(program)))
    } else {
        config.to_path_buf()
    }
}

/// File name of `program` without directory or extension.
pub fn program_stem(program: &str) -> String {
    Path::new(program)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

/// Read a config file into a (possibly nested) mapping.
///
/// An empty document yields an empty mapping.
pub fn load_config_file(path: &Path) -> Result<Map<String, Value>, ArgError> {
    if !path.exists() {
        return Err(ArgError::ConfigNotFound(path.to_path_buf()));
    }
    let name = path.to_string_lossy();
    let is_yaml = name.contains(".yaml");
    if !is_yaml && !name.contains(".json") {
        return Err(ArgError::UnsupportedFormat(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| ArgError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = if is_yaml {
        serde_yaml::from_str(&content).map_err(|e| ArgError::YamlError {
            path: path.to_path_buf(),
            source: e,
        })?
    } else {
        serde_json::from_str(&content).map_err(|e| ArgError::JsonError {
            path: path.to_path_buf(),
            source: e,
        })?
    };

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ArgError::InvalidValue {
            key: path.display().to_string(),
            reason: format!("config file must hold a mapping, found {other}"),
        }),
    }
}
