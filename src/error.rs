//! Engine error types
//!
//! Per-item failures inside a running job never surface here; they are
//! counted, logged, and the job continues. These variants cover the typed
//! rejections the command surface needs to map to status codes.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("a {0} job is already running")]
    AlreadyRunning(&'static str),

    #[error("{0}")]
    NotConfigured(&'static str),

    #[error("media item not found: {0}")]
    NotFound(Uuid),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("path not allowed: {0}")]
    PathNotAllowed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
