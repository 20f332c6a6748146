//! Error types for the runner and its collaborators

use std::path::PathBuf;

use thiserror::Error;

use crate::unit::UnitId;

/// Errors from the remote query-execution service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from object storage
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors rendering a query template
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to render template '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },
}

/// Fatal scheduler outcomes
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Unit '{name}' ({unit_id}) exceeded the retry limit after {retries} retries: {reason}")]
    RetryExhausted {
        unit_id: UnitId,
        name: String,
        retries: u32,
        reason: String,
    },
}
