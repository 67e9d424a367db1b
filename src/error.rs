//! Error types for the registry, the import/export pipeline and configuration.
//!
//! Per-record problems during import never surface as these values to the
//! caller of a count-returning function; they are absorbed into the
//! `ImportReport` warnings. Per-call problems (validation, duplicates,
//! unreadable files) are returned as explicit failure signals.

use crate::entities::EntityKind;
use crate::validation::ValidationReport;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// Entity failed its validation rule set
    #[error("{} '{}' failed validation: {}", .0.kind, .0.id, .0.summary())]
    Validation(ValidationReport),

    /// An entity with this id is already registered
    #[error("duplicate {kind} id '{id}'")]
    DuplicateIdentifier { kind: EntityKind, id: String },

    /// Another operator already uses this email
    #[error("operator email '{email}' is already registered")]
    DuplicateEmail { email: String },

    /// A foreign reference does not resolve to a live entity
    #[error("{kind} '{id}' references unknown {target} '{target_id}'")]
    UnresolvedReference {
        kind: EntityKind,
        id: String,
        target: EntityKind,
        target_id: String,
    },

    /// Lookup by id found nothing
    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: String },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// File could not be opened, read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// One record could not be parsed into a typed candidate
    #[error("malformed record at {location}: {reason}")]
    MalformedRecord { location: String, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
