//! Error types for the event engine.
//!
//! [`EngineError`] is fatal for the call that returned it. [`ContentError`]
//! is recovered where it happens: the catalog logs it and skips the file or
//! template, so it only reaches callers of the loading functions directly.

use std::path::PathBuf;

use clan_state::{CatId, EventFamily};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that end an engine call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No template survived filtering and participant resolution, even after
    /// the used-event set was reset.
    #[error("no eligible {family} event for sub-types {sub_types:?}")]
    ExhaustedPool {
        family: EventFamily,
        sub_types: Vec<String>,
    },
    #[error("unknown cat: {0}")]
    UnknownCat(CatId),
    /// The chosen template has no outcome any participant can carry.
    #[error("event {event_id} has no valid outcome")]
    NoValidOutcome { event_id: String },
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors in authored content.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid template {event_id}: {reason}")]
    InvalidTemplate { event_id: String, reason: String },
    #[error("invalid {field}: {value}")]
    InvalidField { field: String, value: String },
}

impl ContentError {
    pub(crate) fn field(field: impl Into<String>, value: impl Into<String>) -> Self {
        ContentError::InvalidField {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Result type alias for engine calls
pub type Result<T> = std::result::Result<T, EngineError>;
