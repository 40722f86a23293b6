use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayerfigError {
    #[error("Cannot flatten through a collection at path '{0}'")]
    FlattenThroughCollection(String),

    #[error("Duplicate environment key '{key}' (paths '{first}' and '{second}')")]
    DuplicateKey {
        key: String,
        first: String,
        second: String,
    },

    #[error("Unknown file type: {}", path.display())]
    UnknownFileType { path: PathBuf },

    #[error("Path traversal attempt: '{}'", path.display())]
    PathTraversal { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    ParseError { path: PathBuf, source: DecodeError },

    #[error("Invalid content in {}: {source}", path.display())]
    FileContent {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[source] serde_json::Error),

    #[error("Empty flag target name")]
    EmptyTarget,

    #[error("Source flag not found: {flag} -> {target}")]
    FlagNotFound { flag: String, target: String },

    #[error("Target field not found: {0}")]
    TargetNotFound(String),

    #[error("Cannot read flag '{flag}': {reason}")]
    FlagValue { flag: String, reason: String },
}

/// Failure of one of the file codecs.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error("file is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("unsupported mapping key: {0}")]
    MappingKey(String),
}

/// Coarse classification of a [`LayerfigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The record type cannot be represented as an index.
    Structural,
    /// The config file could not be located, identified or read.
    Discovery,
    /// The config file content is malformed or of the wrong type.
    Deserialization,
    /// A key or path is unknown to the index or the record.
    Lookup,
    /// A value was targeted at a real field but cannot be written to it.
    Coercion,
}

impl LayerfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LayerfigError::FlattenThroughCollection(_) | LayerfigError::DuplicateKey { .. } => {
                ErrorKind::Structural
            }
            LayerfigError::UnknownFileType { .. }
            | LayerfigError::PathTraversal { .. }
            | LayerfigError::IoError { .. } => ErrorKind::Discovery,
            LayerfigError::ParseError { .. } | LayerfigError::FileContent { .. } => {
                ErrorKind::Deserialization
            }
            LayerfigError::KeyNotFound(_)
            | LayerfigError::PathNotFound(_)
            | LayerfigError::EmptyTarget
            | LayerfigError::FlagNotFound { .. }
            | LayerfigError::TargetNotFound(_) => ErrorKind::Lookup,
            LayerfigError::InvalidValue { .. }
            | LayerfigError::InvalidConfig(_)
            | LayerfigError::FlagValue { .. } => ErrorKind::Coercion,
        }
    }

    /// True for the "no such field" outcome of the path setter.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LayerfigError::PathNotFound(_))
    }
}
