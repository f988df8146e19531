//! Cross-copy duplicate detection
//!
//! Decides whether a freshly scanned file is another copy of an item the
//! store already holds. A match needs both an identity signal (same catalog
//! id, or the same normalized title with matching year or episode numbers)
//! and a similarity signal (near-identical names, durations within two
//! seconds, or - when durations are not comparable - file sizes within 5%).
//!
//! The detector runs against the historical primary set, so grouping stays
//! one level deep: primaries never point at other items.

use strsim::normalized_levenshtein;
use uuid::Uuid;

use crate::db::media_items::{MediaItemRecord, MediaType, ScanFields};

const NAME_SIMILARITY_THRESHOLD: f64 = 0.90;
const DURATION_TOLERANCE_SECS: f64 = 2.0;
const SIZE_TOLERANCE_RATIO: f64 = 0.05;

/// Find the primary this candidate duplicates, if any. `existing` is
/// scanned in order and the first match wins.
pub fn find_primary(candidate: &ScanFields, existing: &[MediaItemRecord]) -> Option<Uuid> {
    existing
        .iter()
        .find(|item| is_duplicate_of(candidate, item))
        .map(|item| item.id)
}

fn is_duplicate_of(candidate: &ScanFields, existing: &MediaItemRecord) -> bool {
    if existing.detected_type != candidate.detected_type || existing.duplicate_of.is_some() {
        return false;
    }

    identity_matches(candidate, existing) && similarity_matches(candidate, existing)
}

/// Identity: same catalog id, or the same normalized title with the year
/// (movies) or episode numbers (TV) agreeing.
fn identity_matches(candidate: &ScanFields, existing: &MediaItemRecord) -> bool {
    let episode_matches =
        candidate.season == existing.season && candidate.episode == existing.episode;

    if let (Some(a), Some(b)) = (candidate.tmdb_id, existing.tmdb_id) {
        if a == b {
            match candidate.detected_type {
                MediaType::TvShow => {
                    if episode_matches {
                        return true;
                    }
                }
                _ => return true,
            }
        }
    }

    let candidate_name = normalize_name(best_name_of_fields(candidate));
    let existing_name = normalize_name(best_name_of_record(existing));
    if candidate_name.is_empty() || existing_name.is_empty() {
        return false;
    }

    let names_match = candidate_name == existing_name
        || (candidate_name.len() > 3
            && existing_name.len() > 3
            && (candidate_name.contains(&existing_name)
                || existing_name.contains(&candidate_name)));

    if !names_match {
        return false;
    }

    match candidate.detected_type {
        MediaType::Movie => candidate.year == existing.year,
        MediaType::TvShow => episode_matches,
        MediaType::Unknown => false,
    }
}

/// Similarity: near-identical names, close durations, or close sizes when
/// durations cannot be compared.
fn similarity_matches(candidate: &ScanFields, existing: &MediaItemRecord) -> bool {
    let candidate_name = normalize_name(best_name_of_fields(candidate));
    let existing_name = normalize_name(best_name_of_record(existing));
    if !candidate_name.is_empty()
        && !existing_name.is_empty()
        && normalized_levenshtein(&candidate_name, &existing_name) > NAME_SIMILARITY_THRESHOLD
    {
        return true;
    }

    match (candidate.duration, existing.duration) {
        (Some(a), Some(b)) => (a - b).abs() <= DURATION_TOLERANCE_SECS,
        _ => sizes_within_tolerance(candidate.file_size, existing.file_size),
    }
}

fn sizes_within_tolerance(a: i64, b: i64) -> bool {
    let larger = a.max(b);
    if larger <= 0 {
        return false;
    }
    let diff = (a - b).abs() as f64;
    diff / larger as f64 <= SIZE_TOLERANCE_RATIO
}

/// Fallback chain: the cleaned title, then the raw detected one, then the
/// catalog name.
fn best_name_of_fields(fields: &ScanFields) -> &str {
    fields
        .cleaned_name
        .as_deref()
        .or(fields.detected_name.as_deref())
        .or(fields.tmdb_name.as_deref())
        .unwrap_or("")
}

fn best_name_of_record(item: &MediaItemRecord) -> &str {
    item.cleaned_name
        .as_deref()
        .or(item.detected_name.as_deref())
        .or(item.tmdb_name.as_deref())
        .unwrap_or("")
}

/// Lowercase and strip everything non-alphanumeric.
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}
