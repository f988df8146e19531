//! Curator - media ingestion and organization engine
//!
//! Discovers media files across configured source trees, parses and
//! enriches their metadata, detects duplicates, and atomically relocates
//! files into a canonical library layout.

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

pub use app::AppState;
pub use error::{EngineError, EngineResult};
