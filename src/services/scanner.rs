//! Source tree scanner
//!
//! Reconciles the configured source directory trees into the media item
//! set. A scan runs in two passes: the first counts supported files so
//! progress has a denominator, the second parses, enriches, deduplicates,
//! and persists. Re-running a scan over an unchanged tree is a no-op: items
//! whose size has not changed are skipped before any parsing happens.
//!
//! Per-file failures are counted and the scan continues; only programming
//! errors or store unavailability fail the job itself.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::db::jobs::{JobRepository, JobStatus};
use crate::db::media_items::{
    ItemStatus, MediaItemFilter, MediaItemRecord, MediaItemRepository, MediaType, ScanFields,
};
use crate::db::settings::{Settings, SettingsRepository, SourceFolder};
use crate::db::Database;
use crate::error::{EngineError, EngineResult};
use crate::services::duplicates;
use crate::services::ffprobe::FfprobeService;
use crate::services::filename_parser;
use crate::services::jobs::{JobCoordinator, JobGuard, JobKind};
use crate::services::organizer::OrganizerService;
use crate::services::path_planner;
use crate::services::progress::{ProgressBus, ProgressEvent};
use crate::services::tmdb::TmdbClient;

/// Media file extensions the scanner recognizes
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "webm", "m4v", "ts", "m2ts",
];

/// Scanner service driving scan jobs
#[derive(Clone)]
pub struct ScannerService {
    db: Database,
    coordinator: Arc<JobCoordinator>,
    progress: ProgressBus,
    ffprobe: FfprobeService,
    /// API key used when the settings store has none (seeded from env)
    fallback_api_key: Option<String>,
}

/// Mutable counters threaded through a running scan
struct ScanState {
    job_id: Uuid,
    total_files: i64,
    processed_files: i64,
    new_items: i64,
    errors_count: i64,
    current_folder: Option<String>,
}

impl ScannerService {
    pub fn new(
        db: Database,
        coordinator: Arc<JobCoordinator>,
        progress: ProgressBus,
        ffprobe: FfprobeService,
        fallback_api_key: Option<String>,
    ) -> Self {
        Self {
            db,
            coordinator,
            progress,
            ffprobe,
            fallback_api_key,
        }
    }

    /// Start a scan as a background task and return its job id.
    ///
    /// Rejects immediately when a scan is already running or when no source
    /// folders are configured.
    pub async fn start_scan(&self) -> EngineResult<Uuid> {
        let settings = SettingsRepository::new(self.db.clone()).load().await?;
        if settings.source_folders.is_empty() {
            return Err(EngineError::NotConfigured("no source folders configured"));
        }

        let guard = self
            .coordinator
            .try_acquire(JobKind::Scan)
            .ok_or(EngineError::AlreadyRunning("scan"))?;

        let job = JobRepository::new(self.db.clone())
            .create_scan_job()
            .await?;

        info!(job_id = %job.id, folders = settings.source_folders.len(), "Starting scan");

        let scanner = self.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            scanner.run_scan(job_id, settings, guard).await;
        });

        Ok(job_id)
    }

    /// Clear enrichment, duplicate grouping, and status so the next scan
    /// reclassifies the item; returns the updated record.
    pub async fn rescan_item(&self, id: Uuid) -> EngineResult<MediaItemRecord> {
        let items = MediaItemRepository::new(self.db.clone());
        if items.get_by_id(id).await?.is_none() {
            return Err(EngineError::NotFound(id));
        }

        items.reset_for_rescan(id).await?;
        items
            .get_by_id(id)
            .await?
            .ok_or(EngineError::NotFound(id))
    }

    /// Body of the background scan task. The guard releases the scan slot
    /// when this returns, normally or not.
    async fn run_scan(&self, job_id: Uuid, settings: Settings, guard: JobGuard) {
        let result = self.scan_inner(job_id, &settings).await;
        let jobs = JobRepository::new(self.db.clone());

        let status = match result {
            Ok(state) => {
                info!(
                    job_id = %job_id,
                    total = state.total_files,
                    processed = state.processed_files,
                    new_items = state.new_items,
                    errors = state.errors_count,
                    "Scan completed"
                );
                if let Err(e) = jobs.finish_scan_job(job_id, JobStatus::Completed, None).await {
                    error!(job_id = %job_id, error = %e, "Failed to finalize scan job");
                }
                JobStatus::Completed
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Scan failed");
                if let Err(e2) = jobs
                    .finish_scan_job(job_id, JobStatus::Failed, Some(&e.to_string()))
                    .await
                {
                    error!(job_id = %job_id, error = %e2, "Failed to finalize scan job");
                }
                JobStatus::Failed
            }
        };

        self.progress
            .publish(ProgressEvent::ScanDone { job_id, status });
        drop(guard);

        if status == JobStatus::Completed && settings.auto_organize {
            self.auto_organize(&settings).await;
        }
    }

    async fn scan_inner(&self, job_id: Uuid, settings: &Settings) -> Result<ScanState> {
        let jobs = JobRepository::new(self.db.clone());
        let folders = settings.parsed_source_folders();

        let mut state = ScanState {
            job_id,
            total_files: 0,
            processed_files: 0,
            new_items: 0,
            errors_count: 0,
            current_folder: None,
        };

        // First pass: count supported files so progress has a denominator
        for folder in &folders {
            let (count, errors) = count_media_files(Path::new(&folder.path));
            state.total_files += count;
            state.errors_count += errors;
        }
        jobs.set_scan_total(job_id, state.total_files).await?;
        self.publish_progress(&state);

        let tmdb = TmdbClient::new(
            settings
                .tmdb_api_key
                .clone()
                .or_else(|| self.fallback_api_key.clone()),
        );

        // Second pass: parse, enrich, deduplicate, persist
        for folder in &folders {
            self.process_folder(folder, &tmdb, &mut state).await?;
        }

        jobs.update_scan_progress(
            job_id,
            state.processed_files,
            state.new_items,
            state.errors_count,
            state.current_folder.as_deref(),
        )
        .await?;

        Ok(state)
    }

    async fn process_folder(
        &self,
        folder: &SourceFolder,
        tmdb: &TmdbClient,
        state: &mut ScanState,
    ) -> Result<()> {
        let root = Path::new(&folder.path);
        let type_override = folder.kind.type_override();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Already counted by the first pass
                    warn!(folder = %folder.path, error = %e, "Unreadable entry during scan");
                    continue;
                }
            };

            if entry.path_is_symlink() || !entry.file_type().is_file() {
                continue;
            }
            if !has_supported_extension(entry.path()) {
                continue;
            }
            if !within_root(entry.path(), root) {
                warn!(path = %entry.path().display(), "Path escapes its source root, skipping");
                continue;
            }

            match self
                .process_file(entry.path(), type_override, tmdb, state)
                .await
            {
                Ok(()) => {}
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Failed to process file");
                    state.errors_count += 1;
                }
            }

            state.processed_files += 1;
            state.current_folder = entry
                .path()
                .parent()
                .map(|p| p.to_string_lossy().to_string());

            JobRepository::new(self.db.clone())
                .update_scan_progress(
                    state.job_id,
                    state.processed_files,
                    state.new_items,
                    state.errors_count,
                    state.current_folder.as_deref(),
                )
                .await?;
            self.publish_progress(state);
        }

        Ok(())
    }

    async fn process_file(
        &self,
        path: &Path,
        type_override: Option<MediaType>,
        tmdb: &TmdbClient,
        state: &mut ScanState,
    ) -> Result<()> {
        let items = MediaItemRepository::new(self.db.clone());

        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        let file_size = metadata.len() as i64;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("Filename is not valid UTF-8")?
            .to_string();
        let parent_path = path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        let parent_folder = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("");

        // Incremental skip: a known file with an unchanged size is left
        // untouched
        let existing = items.get_by_location(&parent_path, &filename).await?;
        if let Some(ref record) = existing {
            if record.file_size == file_size {
                return Ok(());
            }
        }

        let parsed = filename_parser::parse(&filename, parent_folder);
        let mut fields = ScanFields {
            file_size,
            detected_type: type_override.unwrap_or(parsed.detected_type),
            detected_name: parsed.detected_name,
            cleaned_name: parsed.cleaned_name,
            year: parsed.year,
            season: parsed.season,
            episode: parsed.episode,
            episode_end: parsed.episode_end,
            episode_title: None,
            is_season_pack: parsed.is_season_pack,
            confidence: parsed.confidence,
            tmdb_id: None,
            tmdb_name: None,
            poster_path: None,
            duplicate_of: None,
            duration: None,
        };

        self.enrich(&mut fields, tmdb).await;

        fields.duration = self.ffprobe.probe_duration(path).await;

        let primaries = items.list_primaries(fields.detected_type).await?;
        fields.duplicate_of = duplicates::find_primary(&fields, &primaries)
            // A changed copy of a known file must not become its own primary
            .filter(|primary| Some(*primary) != existing.as_ref().map(|r| r.id));

        match existing {
            None => {
                items
                    .insert(&parent_path, &filename, &extension_of(path), &fields)
                    .await?;
                state.new_items += 1;
            }
            Some(record) if record.manual_override => {
                items.update_file_size(record.id, file_size).await?;
            }
            Some(record) => {
                items.update_scan_fields(record.id, &fields).await?;
            }
        }

        Ok(())
    }

    /// Catalog enrichment: a match adds confidence and the catalog year
    /// wins over the parsed one.
    async fn enrich(&self, fields: &mut ScanFields, tmdb: &TmdbClient) {
        let name = match fields.cleaned_name.as_deref().or(fields.detected_name.as_deref()) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return,
        };

        match fields.detected_type {
            MediaType::Movie => {
                if let Some(movie) = tmdb.search_movie(&name, fields.year).await {
                    fields.tmdb_id = Some(movie.id);
                    fields.tmdb_name = Some(movie.title);
                    fields.poster_path = movie.poster_path;
                    if movie.year.is_some() {
                        fields.year = movie.year;
                    }
                    fields.confidence = (fields.confidence + 20).min(100);
                }
            }
            MediaType::TvShow => {
                if let Some(show) = tmdb.search_tv(&name).await {
                    fields.tmdb_id = Some(show.id);
                    fields.tmdb_name = Some(show.name);
                    fields.poster_path = show.poster_path;
                    if show.year.is_some() {
                        fields.year = show.year;
                    }
                    fields.confidence = (fields.confidence + 20).min(100);

                    if let (Some(season), Some(episode)) = (fields.season, fields.episode) {
                        fields.episode_title =
                            tmdb.episode_title(show.id, season, episode).await;
                    }
                }
            }
            MediaType::Unknown => {}
        }
    }

    fn publish_progress(&self, state: &ScanState) {
        self.progress.publish(ProgressEvent::ScanProgress {
            job_id: state.job_id,
            total_files: state.total_files,
            processed_files: state.processed_files,
            current_folder: state.current_folder.clone(),
            new_items: state.new_items,
            errors_count: state.errors_count,
        });
    }

    /// Kick off organization of everything organizable after a scan when
    /// the auto-organize flag is set.
    async fn auto_organize(&self, settings: &Settings) {
        if settings.movies_root.is_none() && settings.tv_root.is_none() {
            return;
        }

        let items = MediaItemRepository::new(self.db.clone());
        let pending = match items
            .list(&MediaItemFilter {
                status: Some(ItemStatus::Pending),
                ..Default::default()
            })
            .await
        {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "Failed to list pending items for auto-organize");
                return;
            }
        };

        let ids: Vec<Uuid> = pending
            .iter()
            .filter(|item| {
                item.duplicate_of.is_none()
                    && !item.is_season_pack
                    && item.detected_type != MediaType::Unknown
                    && !path_planner::is_already_organized(item, settings)
            })
            .map(|item| item.id)
            .collect();

        if ids.is_empty() {
            return;
        }

        info!(count = ids.len(), "Auto-organizing scanned items");
        let organizer = OrganizerService::new(
            self.db.clone(),
            self.coordinator.clone(),
            self.progress.clone(),
        );
        if let Err(e) = organizer.start_organize(ids).await {
            warn!(error = %e, "Auto-organize could not start");
        }
    }
}

/// Count supported, non-hidden, non-symlink files under a root. Returns
/// (count, unreadable entries).
fn count_media_files(root: &Path) -> (i64, i64) {
    let mut count = 0;
    let mut errors = 0;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e.path()));

    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.path_is_symlink() || !entry.file_type().is_file() {
                    continue;
                }
                if !within_root(entry.path(), root) {
                    errors += 1;
                    continue;
                }
                if has_supported_extension(entry.path()) {
                    count += 1;
                }
            }
            Err(_) => errors += 1,
        }
    }

    (count, errors)
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Hidden files and directories (leading dot) are never scanned
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Lexical containment test: the normalized path must stay under the
/// normalized root.
fn within_root(path: &Path, root: &Path) -> bool {
    normalize_lexically(path).starts_with(normalize_lexically(root))
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
