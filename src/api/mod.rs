//! API route definitions
//!
//! REST endpoints under /api plus the /ws progress stream. Handlers stay
//! thin: they translate requests into engine calls and engine errors into
//! status codes.

pub mod filesystem;
pub mod health;
pub mod jobs;
pub mod media;
pub mod settings;
pub mod ws;

use axum::http::StatusCode;

use crate::error::EngineError;

/// Map an engine rejection to an HTTP status + message pair
pub fn error_response(error: EngineError) -> (StatusCode, String) {
    let status = match &error {
        EngineError::AlreadyRunning(_) => StatusCode::CONFLICT,
        EngineError::NotConfigured(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidState(_) => StatusCode::CONFLICT,
        EngineError::PathNotAllowed(_) => StatusCode::FORBIDDEN,
        EngineError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error.to_string())
}
