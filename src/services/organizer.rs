//! Organization executor
//!
//! Moves pending items into the canonical library layout. Per-item failures
//! are recorded and the batch continues; nothing on disk is touched until
//! the safety guards pass. Moves go through a `.tmp` rename so a crash
//! leaves either a clean pre-state or an advanceable post-state, and the
//! cross-device fallback verifies the copied size before the source is
//! unlinked.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::catalog::CatalogRepository;
use crate::db::jobs::{JobRepository, JobStatus};
use crate::db::logs::{LogAction, OrganizationLogRepository};
use crate::db::media_items::{ItemStatus, MediaItemRecord, MediaItemRepository, MediaType};
use crate::db::settings::{Settings, SettingsRepository};
use crate::db::Database;
use crate::error::{EngineError, EngineResult};
use crate::services::jobs::{JobCoordinator, JobGuard, JobKind};
use crate::services::path_planner;
use crate::services::progress::{ProgressBus, ProgressEvent};

/// Organizer service driving organize jobs
#[derive(Clone)]
pub struct OrganizerService {
    db: Database,
    coordinator: Arc<JobCoordinator>,
    progress: ProgressBus,
}

/// What happened to one item of the batch
enum ItemOutcome {
    /// Moved into place, or skipped over an identical-size collision
    Succeeded,
    /// Not eligible (wrong status or season pack); counters advance only
    Ineligible,
    Failed,
}

impl OrganizerService {
    pub fn new(db: Database, coordinator: Arc<JobCoordinator>, progress: ProgressBus) -> Self {
        Self {
            db,
            coordinator,
            progress,
        }
    }

    /// Start organizing the given items as a background task and return the
    /// job id. Items are processed in exactly the order supplied.
    pub async fn start_organize(&self, ids: Vec<Uuid>) -> EngineResult<Uuid> {
        let settings = SettingsRepository::new(self.db.clone()).load().await?;
        if settings.movies_root.is_none() && settings.tv_root.is_none() {
            return Err(EngineError::NotConfigured(
                "no destination roots configured",
            ));
        }

        let guard = self
            .coordinator
            .try_acquire(JobKind::Organize)
            .ok_or(EngineError::AlreadyRunning("organize"))?;

        let job = JobRepository::new(self.db.clone())
            .create_organize_job(ids.len() as i64)
            .await?;

        info!(job_id = %job.id, items = ids.len(), "Starting organize");

        let organizer = self.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            organizer.run_organize(job_id, ids, settings, guard).await;
        });

        Ok(job_id)
    }

    async fn run_organize(&self, job_id: Uuid, ids: Vec<Uuid>, settings: Settings, guard: JobGuard) {
        let result = self.organize_inner(job_id, &ids, &settings).await;
        let jobs = JobRepository::new(self.db.clone());

        let status = match result {
            Ok(()) => {
                if let Err(e) = jobs
                    .finish_organize_job(job_id, JobStatus::Completed, None)
                    .await
                {
                    error!(job_id = %job_id, error = %e, "Failed to finalize organize job");
                }
                JobStatus::Completed
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Organize failed");
                if let Err(e2) = jobs
                    .finish_organize_job(job_id, JobStatus::Failed, Some(&e.to_string()))
                    .await
                {
                    error!(job_id = %job_id, error = %e2, "Failed to finalize organize job");
                }
                JobStatus::Failed
            }
        };

        self.progress
            .publish(ProgressEvent::OrganizeDone { job_id, status });
        drop(guard);
    }

    async fn organize_inner(&self, job_id: Uuid, ids: &[Uuid], settings: &Settings) -> Result<()> {
        let jobs = JobRepository::new(self.db.clone());
        let total = ids.len() as i64;
        let mut processed = 0i64;
        let mut success_count = 0i64;
        let mut failed_count = 0i64;

        for &id in ids {
            let (outcome, current_file) = self.organize_item(id, settings).await;
            match outcome {
                ItemOutcome::Succeeded => success_count += 1,
                ItemOutcome::Failed => failed_count += 1,
                ItemOutcome::Ineligible => {}
            }

            processed += 1;
            jobs.update_organize_progress(
                job_id,
                processed,
                success_count,
                failed_count,
                current_file.as_deref(),
            )
            .await?;
            self.progress.publish(ProgressEvent::OrganizeProgress {
                job_id,
                total_files: total,
                processed_files: processed,
                current_file,
                success_count,
                failed_count,
            });
        }

        info!(
            job_id = %job_id,
            total,
            success = success_count,
            failed = failed_count,
            "Organize completed"
        );

        Ok(())
    }

    /// Process one item, leaving audit rows and status updates behind.
    /// Returns the outcome plus the filename reported as current progress.
    async fn organize_item(&self, id: Uuid, settings: &Settings) -> (ItemOutcome, Option<String>) {
        let items = MediaItemRepository::new(self.db.clone());
        let logs = OrganizationLogRepository::new(self.db.clone());

        let item = match items.get_by_id(id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                warn!(item_id = %id, "Organize requested for missing item");
                let _ = logs
                    .append(Some(id), LogAction::Error, None, None, Some("item not found"))
                    .await;
                return (ItemOutcome::Failed, None);
            }
            Err(e) => {
                error!(item_id = %id, error = %e, "Failed to load item");
                return (ItemOutcome::Failed, None);
            }
        };

        let current = Some(item.original_filename.clone());

        if item.status != ItemStatus::Pending || item.is_season_pack {
            debug!(item_id = %id, status = ?item.status, "Item not eligible, skipping");
            return (ItemOutcome::Ineligible, current);
        }

        match self.execute_move(&item, settings).await {
            Ok(outcome) => (outcome, current),
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(item_id = %id, error = %message, "Failed to organize item");
                let _ = items.mark_error(id).await;
                let _ = logs
                    .append(
                        Some(id),
                        LogAction::Error,
                        Some(&source_path_of(&item).to_string_lossy()),
                        None,
                        Some(&message),
                    )
                    .await;
                (ItemOutcome::Failed, current)
            }
        }
    }

    /// Plan, guard, resolve collisions, and move a single item.
    async fn execute_move(&self, item: &MediaItemRecord, settings: &Settings) -> Result<ItemOutcome> {
        let items = MediaItemRepository::new(self.db.clone());
        let logs = OrganizationLogRepository::new(self.db.clone());

        let source = source_path_of(item);
        let planned = match path_planner::plan(item, settings) {
            Some(planned) => planned,
            None => match item.detected_type {
                MediaType::Unknown => bail!("cannot organize an unclassified item"),
                MediaType::Movie => bail!("movies destination root is not configured"),
                MediaType::TvShow => bail!("TV destination root is not configured"),
            },
        };

        // Safety guards: never touch the filesystem on a degenerate plan
        if planned == source {
            bail!("source and destination are the same path");
        }
        if planned.starts_with(Path::new(&item.original_path)) {
            bail!(
                "destination {} is inside the source directory {}",
                planned.display(),
                item.original_path
            );
        }

        // Collision handling
        let destination = if !planned.exists() {
            planned.clone()
        } else {
            let existing_size = tokio::fs::metadata(&planned)
                .await
                .map(|m| m.len() as i64)
                .unwrap_or(-1);

            if existing_size == item.file_size {
                // Same size at the destination: another copy of this file
                // is already organized there. Record and leave both alone.
                let planned_str = planned.to_string_lossy().to_string();
                info!(
                    item_id = %item.id,
                    destination = %planned_str,
                    "Identical file already at destination, skipping"
                );
                items.mark_skipped(item.id, &planned_str).await?;
                logs.append(
                    Some(item.id),
                    LogAction::Skip,
                    Some(&source.to_string_lossy()),
                    Some(&planned_str),
                    None,
                )
                .await?;
                return Ok(ItemOutcome::Succeeded);
            }

            next_free_copy_name(&planned)
        };

        move_file(&source, &destination)
            .await
            .with_context(|| format!("moving {} to {}", source.display(), destination.display()))?;

        let destination_str = destination.to_string_lossy().to_string();
        items.mark_organized(item.id, &destination_str).await?;
        logs.append(
            Some(item.id),
            LogAction::Move,
            Some(&source.to_string_lossy()),
            Some(&destination_str),
            None,
        )
        .await?;

        self.update_catalog_projection(item).await;

        info!(
            item_id = %item.id,
            destination = %destination_str,
            "Organized item"
        );

        Ok(ItemOutcome::Succeeded)
    }

    /// Maintain the aggregated series/movie projections when catalog
    /// metadata is present.
    async fn update_catalog_projection(&self, item: &MediaItemRecord) {
        let tmdb_id = match item.tmdb_id {
            Some(tmdb_id) => tmdb_id,
            None => return,
        };
        let catalog = CatalogRepository::new(self.db.clone());
        let name = item
            .tmdb_name
            .as_deref()
            .or(item.cleaned_name.as_deref())
            .unwrap_or(&item.original_filename);

        let result = match item.detected_type {
            MediaType::TvShow => {
                catalog
                    .record_series_episode(tmdb_id, name, item.poster_path.as_deref())
                    .await
            }
            MediaType::Movie => {
                catalog
                    .record_movie(tmdb_id, name, item.year, item.poster_path.as_deref())
                    .await
            }
            MediaType::Unknown => Ok(()),
        };

        if let Err(e) = result {
            warn!(item_id = %item.id, error = %e, "Failed to update catalog projection");
        }
    }

    /// Move an organized item's file back to its source location and reset
    /// its lifecycle state.
    pub async fn undo_organize(&self, id: Uuid) -> EngineResult<MediaItemRecord> {
        let items = MediaItemRepository::new(self.db.clone());
        let logs = OrganizationLogRepository::new(self.db.clone());

        let item = items.get_by_id(id).await?.ok_or(EngineError::NotFound(id))?;

        if item.status != ItemStatus::Organized {
            return Err(EngineError::InvalidState(format!(
                "item is {}, not organized",
                item.status.as_str()
            )));
        }
        let destination = match item.destination_path.as_deref() {
            Some(destination) => PathBuf::from(destination),
            None => {
                return Err(EngineError::InvalidState(
                    "organized item has no destination path".to_string(),
                ))
            }
        };
        if !destination.exists() {
            return Err(EngineError::InvalidState(format!(
                "destination file {} no longer exists",
                destination.display()
            )));
        }

        let source = source_path_of(&item);
        tokio::fs::create_dir_all(&item.original_path)
            .await
            .with_context(|| format!("recreating {}", item.original_path))
            .map_err(EngineError::Other)?;

        move_file(&destination, &source)
            .await
            .with_context(|| {
                format!(
                    "moving {} back to {}",
                    destination.display(),
                    source.display()
                )
            })
            .map_err(EngineError::Other)?;

        items.reset_after_undo(id).await?;
        logs.append(
            Some(id),
            LogAction::Move,
            Some(&destination.to_string_lossy()),
            Some(&source.to_string_lossy()),
            None,
        )
        .await?;

        info!(item_id = %id, "Undid organization");

        items.get_by_id(id).await?.ok_or(EngineError::NotFound(id))
    }
}

fn source_path_of(item: &MediaItemRecord) -> PathBuf {
    Path::new(&item.original_path).join(&item.original_filename)
}

/// First free `{base} (copy N){ext}` name next to a conflicting destination
fn next_free_copy_name(planned: &Path) -> PathBuf {
    let parent = planned.parent().unwrap_or_else(|| Path::new(""));
    let stem = planned
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let ext = planned.extension().and_then(|e| e.to_str());

    let mut n = 2u32;
    loop {
        let candidate_name = match ext {
            Some(ext) => format!("{} (copy {}).{}", stem, n, ext),
            None => format!("{} (copy {})", stem, n),
        };
        let candidate = parent.join(candidate_name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Move a file with atomic intent: rename into a `.tmp` sibling of the
/// destination, falling back to copy + size-verify + unlink across devices,
/// then rename the temp file into place.
async fn move_file(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let temp = PathBuf::from(format!("{}.tmp", destination.to_string_lossy()));

    match tokio::fs::rename(source, &temp).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(
                source = %source.display(),
                destination = %destination.display(),
                "Cross-device move, copying"
            );
            tokio::fs::copy(source, &temp)
                .await
                .with_context(|| format!("copying to {}", temp.display()))?;

            let source_size = tokio::fs::metadata(source).await.map(|m| m.len());
            let temp_size = tokio::fs::metadata(&temp).await.map(|m| m.len());
            match (source_size, temp_size) {
                (Ok(a), Ok(b)) if a == b => {}
                _ => {
                    let _ = tokio::fs::remove_file(&temp).await;
                    bail!("size verification failed after cross-device copy");
                }
            }

            tokio::fs::remove_file(source)
                .await
                .with_context(|| format!("removing source {}", source.display()))?;
        }
        Err(e) => {
            return Err(e).with_context(|| format!("renaming {} aside", source.display()));
        }
    }

    tokio::fs::rename(&temp, destination)
        .await
        .with_context(|| format!("renaming into {}", destination.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_name_probing() {
        let dir = tempfile::tempdir().unwrap();
        let planned = dir.path().join("Inception (2010).mkv");
        std::fs::write(&planned, b"a").unwrap();

        let first = next_free_copy_name(&planned);
        assert_eq!(
            first.file_name().unwrap().to_str().unwrap(),
            "Inception (2010) (copy 2).mkv"
        );

        std::fs::write(&first, b"b").unwrap();
        let second = next_free_copy_name(&planned);
        assert_eq!(
            second.file_name().unwrap().to_str().unwrap(),
            "Inception (2010) (copy 3).mkv"
        );
    }

    #[tokio::test]
    async fn test_move_file_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.mkv");
        std::fs::write(&source, b"payload").unwrap();

        let destination = dir.path().join("nested/deeply/dest.mkv");
        move_file(&source, &destination).await.unwrap();

        assert!(!source.exists());
        assert_eq!(std::fs::read(&destination).unwrap(), b"payload");
    }
}
