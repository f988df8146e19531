//! Destination path planning
//!
//! Pure mapping from item metadata and destination configuration to the
//! canonical library layout:
//!
//! - `{movies_root}/Inception (2010)/Inception (2010).mkv`
//! - `{tv_root}/Fallout/Season 02/Fallout - S02E01.mkv`
//! - `{tv_root}/Friends/Season 01/Friends - S01E01-E02.mkv`

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::db::media_items::{MediaItemRecord, MediaType};
use crate::db::settings::Settings;

/// Compute the canonical destination for an item, or None when the matching
/// destination root is unset or the item is unclassified.
pub fn plan(item: &MediaItemRecord, settings: &Settings) -> Option<PathBuf> {
    let name = display_name(item)?;

    match item.detected_type {
        MediaType::Movie => {
            let root = settings.movies_root.as_deref()?;
            let year = item
                .year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            let folder = sanitize(&format!("{} ({})", name, year));
            let filename = format!("{}.{}", folder, item.extension);
            Some(Path::new(root).join(folder).join(filename))
        }
        MediaType::TvShow => {
            let root = settings.tv_root.as_deref()?;
            let season = item.season.unwrap_or(1);
            let episode = item.episode.unwrap_or(1);
            let clean = sanitize(&name);

            let episode_token = match item.episode_end {
                Some(end) => format!("S{:02}E{:02}-E{:02}", season, episode, end),
                None => format!("S{:02}E{:02}", season, episode),
            };
            let filename = format!("{} - {}.{}", clean, episode_token, item.extension);
            Some(
                Path::new(root)
                    .join(clean)
                    .join(format!("Season {:02}", season))
                    .join(filename),
            )
        }
        MediaType::Unknown => None,
    }
}

/// True when the item's content already resides in the canonical layout:
/// either its source location equals the planned destination, or it lives
/// under the matching destination root with a canonical containing folder.
/// Conservative by design, so irregular trees are never double-moved.
pub fn is_already_organized(item: &MediaItemRecord, settings: &Settings) -> bool {
    let source = Path::new(&item.original_path).join(&item.original_filename);

    if let Some(planned) = plan(item, settings) {
        if planned == source {
            return true;
        }
    }

    let root = match item.detected_type {
        MediaType::Movie => settings.movies_root.as_deref(),
        MediaType::TvShow => settings.tv_root.as_deref(),
        MediaType::Unknown => None,
    };
    let root = match root {
        Some(r) if !r.is_empty() => Path::new(r),
        _ => return false,
    };

    if !Path::new(&item.original_path).starts_with(root) {
        return false;
    }

    let parent_name = Path::new(&item.original_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    match item.detected_type {
        MediaType::TvShow => {
            let season_re = Regex::new(r"^Season \d{2}$").unwrap();
            season_re.is_match(parent_name)
        }
        MediaType::Movie => {
            let movie_re = Regex::new(r"^.+ \((?:\d{4}|Unknown)\)$").unwrap();
            movie_re.is_match(parent_name)
        }
        MediaType::Unknown => false,
    }
}

/// Best display name for planning: the cleaned title, falling back to the
/// catalog name, then the raw detected name.
fn display_name(item: &MediaItemRecord) -> Option<String> {
    item.cleaned_name
        .as_deref()
        .or(item.tmdb_name.as_deref())
        .or(item.detected_name.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Strip characters that are hostile to common filesystems.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => ' ',
            _ => c,
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::db::media_items::ItemStatus;

    fn item(media_type: MediaType) -> MediaItemRecord {
        MediaItemRecord {
            id: Uuid::new_v4(),
            original_filename: "file.mkv".to_string(),
            original_path: "/in".to_string(),
            file_size: 1,
            extension: "mkv".to_string(),
            detected_type: media_type,
            detected_name: None,
            cleaned_name: None,
            year: None,
            season: None,
            episode: None,
            episode_end: None,
            episode_title: None,
            is_season_pack: false,
            confidence: 50,
            tmdb_id: None,
            tmdb_name: None,
            poster_path: None,
            status: ItemStatus::Pending,
            destination_path: None,
            duplicate_of: None,
            manual_override: false,
            duration: None,
            created_at: Utc::now(),
        }
    }

    fn settings() -> Settings {
        Settings {
            movies_root: Some("/movies".to_string()),
            tv_root: Some("/tv".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_movie() {
        let mut movie = item(MediaType::Movie);
        movie.cleaned_name = Some("Inception".to_string());
        movie.year = Some(2010);

        let path = plan(&movie, &settings()).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/movies/Inception (2010)/Inception (2010).mkv")
        );
    }

    #[test]
    fn test_plan_movie_without_year() {
        let mut movie = item(MediaType::Movie);
        movie.cleaned_name = Some("Primer".to_string());

        let path = plan(&movie, &settings()).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/movies/Primer (Unknown)/Primer (Unknown).mkv")
        );
    }

    #[test]
    fn test_plan_episode() {
        let mut episode = item(MediaType::TvShow);
        episode.cleaned_name = Some("Fallout".to_string());
        episode.season = Some(2);
        episode.episode = Some(1);

        let path = plan(&episode, &settings()).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/tv/Fallout/Season 02/Fallout - S02E01.mkv")
        );
    }

    #[test]
    fn test_plan_multi_episode() {
        let mut episode = item(MediaType::TvShow);
        episode.cleaned_name = Some("Friends".to_string());
        episode.season = Some(1);
        episode.episode = Some(1);
        episode.episode_end = Some(2);

        let path = plan(&episode, &settings()).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/tv/Friends/Season 01/Friends - S01E01-E02.mkv")
        );
    }

    #[test]
    fn test_plan_special_goes_to_season_zero() {
        let mut episode = item(MediaType::TvShow);
        episode.cleaned_name = Some("Naruto".to_string());
        episode.season = Some(0);
        episode.episode = Some(1);

        let path = plan(&episode, &settings()).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/tv/Naruto/Season 00/Naruto - S00E01.mkv")
        );
    }

    #[test]
    fn test_plan_defaults_season_and_episode() {
        let mut episode = item(MediaType::TvShow);
        episode.cleaned_name = Some("Lost".to_string());

        let path = plan(&episode, &settings()).unwrap();
        assert_eq!(path, PathBuf::from("/tv/Lost/Season 01/Lost - S01E01.mkv"));
    }

    #[test]
    fn test_plan_requires_matching_root() {
        let mut movie = item(MediaType::Movie);
        movie.cleaned_name = Some("Inception".to_string());

        let empty = Settings::default();
        assert!(plan(&movie, &empty).is_none());

        let unknown = item(MediaType::Unknown);
        assert!(plan(&unknown, &settings()).is_none());
    }

    #[test]
    fn test_sanitize_strips_path_separators() {
        let mut movie = item(MediaType::Movie);
        movie.cleaned_name = Some("Face/Off: Special".to_string());
        movie.year = Some(1997);

        let path = plan(&movie, &settings()).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/movies/Face Off Special (1997)/Face Off Special (1997).mkv")
        );
    }

    #[test]
    fn test_already_organized_exact_plan_match() {
        let mut episode = item(MediaType::TvShow);
        episode.cleaned_name = Some("Fallout".to_string());
        episode.season = Some(2);
        episode.episode = Some(1);
        episode.original_path = "/tv/Fallout/Season 02".to_string();
        episode.original_filename = "Fallout - S02E01.mkv".to_string();

        assert!(is_already_organized(&episode, &settings()));
    }

    #[test]
    fn test_already_organized_canonical_parent() {
        let mut episode = item(MediaType::TvShow);
        episode.cleaned_name = Some("Fallout".to_string());
        episode.original_path = "/tv/Fallout/Season 02".to_string();
        episode.original_filename = "weird-name.mkv".to_string();

        assert!(is_already_organized(&episode, &settings()));
    }

    #[test]
    fn test_not_organized_outside_root() {
        let mut episode = item(MediaType::TvShow);
        episode.cleaned_name = Some("Fallout".to_string());
        episode.original_path = "/downloads/Fallout/Season 02".to_string();
        episode.original_filename = "Fallout - S02E01.mkv".to_string();

        assert!(!is_already_organized(&episode, &settings()));
    }
}
