//! Filesystem browsing for server-side directory selection
//!
//! Backs the configuration UI's folder picker. Navigation is restricted to
//! an allow-list of root prefixes supplied at startup; any path resolving
//! outside the allow-list is rejected before the disk is touched.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::error::{EngineError, EngineResult};

/// A directory entry visible to the browser
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

/// Result of browsing a directory
#[derive(Debug, Clone, Serialize)]
pub struct BrowseResult {
    pub current_path: String,
    pub parent_path: Option<String>,
    pub entries: Vec<FileEntry>,
}

/// Directory browser bounded by an allow-list of roots
#[derive(Debug, Clone)]
pub struct FilesystemBrowser {
    allowed_roots: Vec<PathBuf>,
}

impl FilesystemBrowser {
    pub fn new(allowed_roots: &[String]) -> Self {
        Self {
            allowed_roots: allowed_roots.iter().map(PathBuf::from).collect(),
        }
    }

    /// Check a path against the allow-list without touching the disk
    pub fn is_allowed(&self, path: &Path) -> bool {
        let normalized = normalize_lexically(path);
        self.allowed_roots
            .iter()
            .any(|root| normalized.starts_with(root))
    }

    /// List the directories and files directly under `path`
    pub async fn browse(&self, path: &str) -> EngineResult<BrowseResult> {
        let requested = if path.is_empty() {
            PathBuf::from("/")
        } else {
            PathBuf::from(path)
        };
        let normalized = normalize_lexically(&requested);

        if !self.is_allowed(&normalized) {
            return Err(EngineError::PathNotAllowed(
                normalized.to_string_lossy().to_string(),
            ));
        }

        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&normalized)
            .await
            .with_context(|| format!("reading {}", normalized.display()))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .context("reading directory entry")?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };
            entries.push(FileEntry {
                name,
                path: entry.path().to_string_lossy().to_string(),
                is_dir: metadata.is_dir(),
                size: if metadata.is_dir() { 0 } else { metadata.len() },
            });
        }

        entries.sort_by(|a, b| (!a.is_dir, a.name.to_lowercase()).cmp(&(!b.is_dir, b.name.to_lowercase())));

        let parent_path = normalized
            .parent()
            .filter(|p| self.is_allowed(p))
            .map(|p| p.to_string_lossy().to_string());

        Ok(BrowseResult {
            current_path: normalized.to_string_lossy().to_string(),
            parent_path,
            entries,
        })
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
