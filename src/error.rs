use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArgError {
    #[error("Key '{key}' conflicts with key '{conflicting}'")]
    KeyConflict { key: String, conflicting: String },

    #[error(
        "Only `Option<X>` unions are supported (one type per flag); \
         problem encountered in field '{field}'"
    )]
    UnsupportedUnionType { field: String },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required field '{0}'")]
    MissingRequiredField(String),

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Duplicate field '{field}' in schema {schema}")]
    DuplicateField { schema: String, field: String },

    #[error("Flag '--{0}' is generated more than once")]
    FlagConflict(String),

    #[error("Schema {0} contains itself through a nested field")]
    CyclicSchema(String),

    #[error("Could not find config file: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Config file type is not supported: {0} (expected .yaml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to parse {path}: {source}")]
    JsonError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    YamlError {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Cli(#[from] clap::Error),
}

impl ArgError {
    /// True when the error is clap's request to display help or version text.
    pub fn is_display_request(&self) -> bool {
        matches!(
            self,
            ArgError::Cli(e) if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp
                    | clap::error::ErrorKind::DisplayVersion
                    | clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            )
        )
    }
}
