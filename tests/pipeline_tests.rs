//! Integration tests for the scan -> organize pipeline
//!
//! These drive the real engine over temporary directory trees with a
//! file-backed SQLite store. The catalog client stays disabled (no API key)
//! and duration probing points at a nonexistent binary, so everything runs
//! offline and the duplicate detector exercises its file-size rule.

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use uuid::Uuid;

use curator::db::jobs::{JobRepository, JobStatus, OrganizeJobRecord, ScanJobRecord};
use curator::db::logs::{LogAction, OrganizationLogRepository};
use curator::db::media_items::{
    ItemStatus, MediaItemFilter, MediaItemRecord, MediaItemRepository, MediaType,
};
use curator::db::settings::{Settings, SettingsRepository};
use curator::db::{self, Database};
use curator::error::EngineError;
use curator::services::{
    FfprobeService, JobCoordinator, OrganizerService, ProgressBus, ScannerService,
};

struct Harness {
    _root: TempDir,
    db: Database,
    scanner: ScannerService,
    organizer: OrganizerService,
    source_dir: PathBuf,
    movies_dir: PathBuf,
    tv_dir: PathBuf,
}

impl Harness {
    async fn new() -> Self {
        let root = TempDir::new().unwrap();
        let source_dir = root.path().join("in");
        let movies_dir = root.path().join("movies");
        let tv_dir = root.path().join("tv");
        std::fs::create_dir_all(&source_dir).unwrap();
        std::fs::create_dir_all(&movies_dir).unwrap();
        std::fs::create_dir_all(&tv_dir).unwrap();

        let db_url = format!("sqlite://{}", root.path().join("curator.db").display());
        let pool = db::connect_with_retry(
            &db_url,
            Duration::from_secs(5),
            Duration::from_millis(100),
        )
        .await
        .unwrap();
        db::schema::ensure_schema(&pool).await.unwrap();

        let coordinator = JobCoordinator::new();
        let progress = ProgressBus::new();
        let scanner = ScannerService::new(
            pool.clone(),
            coordinator.clone(),
            progress.clone(),
            FfprobeService::new("/nonexistent/ffprobe"),
            None,
        );
        let organizer = OrganizerService::new(pool.clone(), coordinator, progress);

        Self {
            _root: root,
            db: pool,
            scanner,
            organizer,
            source_dir,
            movies_dir,
            tv_dir,
        }
    }

    async fn configure(&self) {
        let settings = Settings {
            tmdb_api_key: None,
            source_folders: vec![format!("MIXED:{}", self.source_dir.display())],
            movies_root: Some(self.movies_dir.display().to_string()),
            tv_root: Some(self.tv_dir.display().to_string()),
            auto_organize: false,
        };
        SettingsRepository::new(self.db.clone())
            .save(&settings)
            .await
            .unwrap();
    }

    fn write_source_file(&self, name: &str, size: usize) -> PathBuf {
        let path = self.source_dir.join(name);
        std::fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    async fn scan_and_wait(&self) -> ScanJobRecord {
        let job_id = self.scanner.start_scan().await.unwrap();
        self.wait_for_scan(job_id).await
    }

    async fn wait_for_scan(&self, job_id: Uuid) -> ScanJobRecord {
        let jobs = JobRepository::new(self.db.clone());
        for _ in 0..400 {
            if let Some(job) = jobs.get_scan_job(job_id).await.unwrap() {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("scan job {} did not reach a terminal state", job_id);
    }

    async fn organize_and_wait(&self, ids: Vec<Uuid>) -> OrganizeJobRecord {
        let job_id = self.organizer.start_organize(ids).await.unwrap();
        let jobs = JobRepository::new(self.db.clone());
        for _ in 0..400 {
            if let Some(job) = jobs.get_organize_job(job_id).await.unwrap() {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("organize job {} did not reach a terminal state", job_id);
    }

    async fn all_items(&self) -> Vec<MediaItemRecord> {
        MediaItemRepository::new(self.db.clone())
            .list(&MediaItemFilter::default())
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_fresh_scan_then_organize_movie() {
    let harness = Harness::new().await;
    harness.configure().await;
    let source = harness.write_source_file("Inception.2010.1080p.mkv", 4096);

    let job = harness.scan_and_wait().await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.total_files, 1);
    assert_eq!(job.new_items, 1);

    let items = harness.all_items().await;
    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.detected_type, MediaType::Movie);
    assert_eq!(item.year, Some(2010));
    assert_eq!(item.cleaned_name.as_deref(), Some("Inception"));
    assert!(item.confidence >= 40);
    assert_eq!(item.status, ItemStatus::Pending);

    let job = harness.organize_and_wait(vec![item.id]).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.success_count, 1);
    assert_eq!(job.failed_count, 0);

    let destination = harness
        .movies_dir
        .join("Inception (2010)/Inception (2010).mkv");
    assert!(destination.exists());
    assert!(!source.exists());

    let item = MediaItemRepository::new(harness.db.clone())
        .get_by_id(item.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.status, ItemStatus::Organized);
    assert_eq!(
        item.destination_path.as_deref(),
        Some(destination.to_str().unwrap())
    );
}

#[tokio::test]
async fn test_multi_episode_layout() {
    let harness = Harness::new().await;
    harness.configure().await;
    harness.write_source_file("Friends.S01E01E02.720p.mkv", 2048);

    harness.scan_and_wait().await;
    let items = harness.all_items().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].season, Some(1));
    assert_eq!(items[0].episode, Some(1));
    assert_eq!(items[0].episode_end, Some(2));

    let job = harness.organize_and_wait(vec![items[0].id]).await;
    assert_eq!(job.success_count, 1);

    assert!(harness
        .tv_dir
        .join("Friends/Season 01/Friends - S01E01-E02.mkv")
        .exists());
}

#[tokio::test]
async fn test_rescan_is_stable() {
    let harness = Harness::new().await;
    harness.configure().await;
    harness.write_source_file("Breaking.Bad.S01E01.720p.mkv", 2048);
    harness.write_source_file("Inception.2010.1080p.mkv", 4096);

    let first = harness.scan_and_wait().await;
    assert_eq!(first.new_items, 2);
    let before = harness.all_items().await;

    let second = harness.scan_and_wait().await;
    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.new_items, 0);
    assert_eq!(second.errors_count, first.errors_count);

    let after = harness.all_items().await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_duplicate_detection_across_release_groups() {
    let harness = Harness::new().await;
    harness.configure().await;
    // Same episode, different release groups, sizes within 5%
    harness.write_source_file("Breaking.Bad.S01E01.1080p.x265-AAA.mkv", 10_000);
    harness.write_source_file("Breaking.Bad.S01E01.720p.x264-ZZZ.mkv", 10_200);

    harness.scan_and_wait().await;
    let items = harness.all_items().await;
    assert_eq!(items.len(), 2);

    let duplicates: Vec<&MediaItemRecord> = items
        .iter()
        .filter(|i| i.duplicate_of.is_some())
        .collect();
    let primaries: Vec<&MediaItemRecord> = items
        .iter()
        .filter(|i| i.duplicate_of.is_none())
        .collect();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(primaries.len(), 1);
    assert_eq!(
        duplicates[0].duplicate_of.as_deref(),
        Some(primaries[0].id.to_string().as_str())
    );
}

#[tokio::test]
async fn test_collision_with_identical_size_skips() {
    let harness = Harness::new().await;
    harness.configure().await;
    let source = harness.write_source_file("Inception.2010.1080p.mkv", 4096);

    // The planned destination already holds a file of the exact same size
    let dest_dir = harness.movies_dir.join("Inception (2010)");
    std::fs::create_dir_all(&dest_dir).unwrap();
    let existing = dest_dir.join("Inception (2010).mkv");
    std::fs::write(&existing, vec![1u8; 4096]).unwrap();

    harness.scan_and_wait().await;
    let items = harness.all_items().await;
    let job = harness.organize_and_wait(vec![items[0].id]).await;

    // The collision counts as success without touching either file
    assert_eq!(job.success_count, 1);
    assert_eq!(job.failed_count, 0);
    assert!(source.exists());
    assert_eq!(std::fs::read(&existing).unwrap(), vec![1u8; 4096]);

    let item = MediaItemRepository::new(harness.db.clone())
        .get_by_id(items[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.status, ItemStatus::Skipped);
    assert_eq!(
        item.duplicate_of.as_deref(),
        Some(existing.to_str().unwrap())
    );

    let logs = OrganizationLogRepository::new(harness.db.clone())
        .list_for_item(items[0].id)
        .await
        .unwrap();
    assert!(logs.iter().any(|l| l.action == LogAction::Skip));
}

#[tokio::test]
async fn test_collision_with_different_size_gets_copy_suffix() {
    let harness = Harness::new().await;
    harness.configure().await;
    harness.write_source_file("Inception.2010.1080p.mkv", 4096);

    let dest_dir = harness.movies_dir.join("Inception (2010)");
    std::fs::create_dir_all(&dest_dir).unwrap();
    std::fs::write(dest_dir.join("Inception (2010).mkv"), vec![1u8; 100]).unwrap();

    harness.scan_and_wait().await;
    let items = harness.all_items().await;
    let job = harness.organize_and_wait(vec![items[0].id]).await;

    assert_eq!(job.success_count, 1);
    assert!(dest_dir.join("Inception (2010) (copy 2).mkv").exists());
}

#[tokio::test]
async fn test_undo_restores_source() {
    let harness = Harness::new().await;
    harness.configure().await;
    let source = harness.write_source_file("Inception.2010.1080p.mkv", 4096);

    harness.scan_and_wait().await;
    let items = harness.all_items().await;
    harness.organize_and_wait(vec![items[0].id]).await;
    assert!(!source.exists());

    let item = harness.organizer.undo_organize(items[0].id).await.unwrap();
    assert_eq!(item.status, ItemStatus::Pending);
    assert!(item.destination_path.is_none());
    assert!(source.exists());
    assert!(!harness
        .movies_dir
        .join("Inception (2010)/Inception (2010).mkv")
        .exists());
}

#[tokio::test]
async fn test_season_pack_is_never_organized() {
    let harness = Harness::new().await;
    harness.configure().await;
    let source = harness.write_source_file("Breaking.Bad.Season.01.Complete.mkv", 2048);

    harness.scan_and_wait().await;
    let items = harness.all_items().await;
    assert_eq!(items.len(), 1);
    assert!(items[0].is_season_pack);

    let job = harness.organize_and_wait(vec![items[0].id]).await;
    assert_eq!(job.processed_files, 1);
    assert_eq!(job.success_count, 0);
    assert_eq!(job.failed_count, 0);
    assert!(source.exists());

    let item = MediaItemRepository::new(harness.db.clone())
        .get_by_id(items[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.status, ItemStatus::Pending);
}

#[tokio::test]
async fn test_scan_requires_source_folders() {
    let harness = Harness::new().await;
    // No settings saved at all
    let result = harness.scanner.start_scan().await;
    assert!(matches!(result, Err(EngineError::NotConfigured(_))));
}

#[tokio::test]
async fn test_organize_requires_destination_roots() {
    let harness = Harness::new().await;
    let settings = Settings {
        source_folders: vec![format!("MIXED:{}", harness.source_dir.display())],
        ..Default::default()
    };
    SettingsRepository::new(harness.db.clone())
        .save(&settings)
        .await
        .unwrap();

    let result = harness.organizer.start_organize(vec![Uuid::new_v4()]).await;
    assert!(matches!(result, Err(EngineError::NotConfigured(_))));
}

#[tokio::test]
async fn test_tagged_movies_folder_overrides_classification() {
    let harness = Harness::new().await;

    let tagged_dir = harness._root.path().join("tagged-movies");
    std::fs::create_dir_all(&tagged_dir).unwrap();
    std::fs::write(tagged_dir.join("random_video_file.mkv"), vec![0u8; 512]).unwrap();

    let settings = Settings {
        source_folders: vec![format!("MOVIES:{}", tagged_dir.display())],
        movies_root: Some(harness.movies_dir.display().to_string()),
        tv_root: Some(harness.tv_dir.display().to_string()),
        ..Default::default()
    };
    SettingsRepository::new(harness.db.clone())
        .save(&settings)
        .await
        .unwrap();

    harness.scan_and_wait().await;
    let items = harness.all_items().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].detected_type, MediaType::Movie);
}

#[tokio::test]
async fn test_manual_override_survives_rescan() {
    let harness = Harness::new().await;
    harness.configure().await;
    let source = harness.write_source_file("Inception.2010.1080p.mkv", 4096);

    harness.scan_and_wait().await;
    let items = harness.all_items().await;
    let id = items[0].id;

    let repo = MediaItemRepository::new(harness.db.clone());
    repo.apply_manual_edit(
        id,
        &curator::db::media_items::ManualEdit {
            cleaned_name: Some("Inception Director's Cut".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // Grow the file so the incremental skip does not short-circuit
    std::fs::write(&source, vec![0u8; 8192]).unwrap();
    harness.scan_and_wait().await;

    let item = repo.get_by_id(id).await.unwrap().unwrap();
    assert!(item.manual_override);
    assert_eq!(item.confidence, 100);
    assert_eq!(
        item.cleaned_name.as_deref(),
        Some("Inception Director's Cut")
    );
    // Only the size was refreshed
    assert_eq!(item.file_size, 8192);
}

#[tokio::test]
async fn test_rescan_request_clears_enrichment() {
    let harness = Harness::new().await;
    harness.configure().await;
    harness.write_source_file("Inception.2010.1080p.mkv", 4096);

    harness.scan_and_wait().await;
    let items = harness.all_items().await;
    let id = items[0].id;

    // Simulate an organized, deduplicated item
    let repo = MediaItemRepository::new(harness.db.clone());
    repo.mark_organized(id, "/somewhere/else.mkv").await.unwrap();

    let item = harness.scanner.rescan_item(id).await.unwrap();
    assert_eq!(item.status, ItemStatus::Pending);
    assert!(item.tmdb_id.is_none());
    assert!(item.duplicate_of.is_none());
    assert!(item.episode_title.is_none());
}

#[tokio::test]
async fn test_hidden_files_are_ignored() {
    let harness = Harness::new().await;
    harness.configure().await;
    harness.write_source_file(".hidden.mkv", 1024);
    harness.write_source_file("visible.2019.mkv", 1024);

    let job = harness.scan_and_wait().await;
    assert_eq!(job.total_files, 1);
    assert_eq!(job.new_items, 1);

    let items = harness.all_items().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].original_filename, "visible.2019.mkv");
}

#[tokio::test]
async fn test_unsupported_extensions_are_ignored() {
    let harness = Harness::new().await;
    harness.configure().await;
    harness.write_source_file("subtitle.srt", 100);
    harness.write_source_file("notes.txt", 100);
    harness.write_source_file("movie.2015.mkv", 1024);

    let job = harness.scan_and_wait().await;
    assert_eq!(job.total_files, 1);
    assert_eq!(job.new_items, 1);
}

#[tokio::test]
async fn test_stats_reflect_pipeline_state() {
    let harness = Harness::new().await;
    harness.configure().await;
    harness.write_source_file("Inception.2010.1080p.mkv", 4096);
    harness.write_source_file("Breaking.Bad.S01E01.720p.mkv", 2048);

    harness.scan_and_wait().await;
    let repo = MediaItemRepository::new(harness.db.clone());

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.movies, 1);
    assert_eq!(stats.tv_shows, 1);
    assert_eq!(stats.organized, 0);

    let movie_id = harness
        .all_items()
        .await
        .iter()
        .find(|i| i.detected_type == MediaType::Movie)
        .map(|i| i.id)
        .unwrap();
    harness.organize_and_wait(vec![movie_id]).await;

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.organized, 1);
    assert_eq!(stats.pending, 1);
}

#[tokio::test]
async fn test_progress_stream_reports_terminal_event() {
    let harness = Harness::new().await;
    harness.configure().await;
    harness.write_source_file("Inception.2010.1080p.mkv", 4096);

    // Rebuild a scanner sharing the harness pool but with our own bus so we
    // can subscribe before the scan starts
    let coordinator = JobCoordinator::new();
    let progress = ProgressBus::new();
    let scanner = ScannerService::new(
        harness.db.clone(),
        coordinator,
        progress.clone(),
        FfprobeService::new("/nonexistent/ffprobe"),
        None,
    );

    let mut events = progress.subscribe();
    let job_id = scanner.start_scan().await.unwrap();

    let mut saw_done = false;
    for _ in 0..200 {
        match tokio::time::timeout(Duration::from_millis(100), events.recv()).await {
            Ok(Ok(curator::services::ProgressEvent::ScanDone { job_id: done_id, status })) => {
                assert_eq!(done_id, job_id);
                assert_eq!(status, JobStatus::Completed);
                saw_done = true;
                break;
            }
            Ok(Ok(_)) => {}
            Ok(Err(_)) => break,
            Err(_) => {}
        }
    }
    assert!(saw_done, "never observed the terminal scan event");
}
