//! Filename parser for scene-style release names
//!
//! Parses filenames like:
//! - "Breaking.Bad.S01E01.720p.BluRay.x264-DEMAND.mkv"
//! - "Game of Thrones - 1x01 - Winter Is Coming.mp4"
//! - "Inception.2010.2160p.UHD.BluRay.mkv"
//!
//! Classification runs in a fixed order: specials, episode patterns, season
//! packs, then year. A positive classification from an earlier stage is never
//! overridden by a later one, so an explicit episode tag always beats a year.

use chrono::Datelike;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::media_items::MediaType;

/// Parsed media information from a filename
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedMedia {
    pub detected_type: MediaType,
    pub detected_name: Option<String>,
    pub cleaned_name: Option<String>,
    pub year: Option<i64>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub episode_end: Option<i64>,
    pub is_season_pack: bool,
    pub confidence: i64,
}

impl Default for ParsedMedia {
    fn default() -> Self {
        Self {
            detected_type: MediaType::Unknown,
            detected_name: None,
            cleaned_name: None,
            year: None,
            season: None,
            episode: None,
            episode_end: None,
            is_season_pack: false,
            confidence: 0,
        }
    }
}

/// Noise tokens removed from title candidates (matched case-insensitively
/// at word boundaries)
const NOISE_TOKENS: &[&str] = &[
    // Resolution
    "480p", "576p", "720p", "1080p", "1080i", "2160p", "4k", "uhd", "hd", "sd",
    // Source
    "bluray", "blu", "bdrip", "brrip", "bdremux", "remux", "webrip", "webdl", "web", "dl",
    "hdtv", "dvdrip", "dvd", "hdrip", "cam", "hdcam", "screener",
    // Codec
    "x264", "x265", "h264", "h265", "hevc", "avc", "av1", "xvid", "divx", "10bit", "8bit",
    // Audio
    "aac", "aac2", "ac3", "eac3", "dts", "dd", "ddp", "ddp5", "dd5", "atmos", "truehd",
    "flac", "mp3", "opus", "2ch", "6ch",
    // Dynamic range
    "hdr", "hdr10", "hdr10plus", "dv", "dovi", "sdr",
    // Language
    "english", "hindi", "french", "german", "spanish", "italian", "japanese", "korean",
    "chinese", "russian", "portuguese", "tamil", "telugu", "dual", "multi",
    "esub", "esubs", "msubs", "sub", "subs", "subbed", "dubbed",
    // Release / distribution labels
    "yify", "yts", "rarbg", "ettv", "eztv", "amzn", "nf", "dsnp", "hulu", "max", "hbo",
    "atvp", "pcok", "proper", "repack", "internal", "limited", "extended", "unrated",
    "remastered", "imax", "3d",
];

/// Folder names too generic to serve as a title fallback
const GENERIC_FOLDERS: &[&str] = &[
    "downloads", "download", "media", "movies", "movie", "films", "film", "tv", "tv shows",
    "tvshows", "shows", "series", "videos", "video", "incoming", "complete", "completed",
    "unsorted", "torrents", "new",
];

/// Minor English words kept lowercase unless sentence-initial
const MINOR_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "of", "in", "on", "at", "to", "for", "with", "from", "by",
];

/// Parse a filename (with extension) into structured media information.
///
/// `parent_folder` is the file's immediate containing directory name, used
/// as a title fallback when the filename itself yields nothing.
pub fn parse(filename: &str, parent_folder: &str) -> ParsedMedia {
    let mut result = ParsedMedia::default();

    let stem = strip_extension(filename);
    // Dots and underscores become spaces; hyphens survive until cleanup so
    // range patterns like S04E01-03 stay intact.
    let working = normalize(&stem);

    let mut name_candidate: Option<String> = None;

    // Stage 1: specials (season 0)
    if let Some(candidate) = detect_special(&working, &mut result) {
        name_candidate = Some(candidate);
    }

    // Stage 2: explicit episode patterns
    if result.detected_type == MediaType::Unknown {
        if let Some(candidate) = detect_episode(&working, &mut result) {
            name_candidate = Some(candidate);
        }
    }

    // Stage 3: season packs
    if result.detected_type == MediaType::Unknown {
        if let Some(candidate) = detect_season_pack(&working, &mut result) {
            name_candidate = Some(candidate);
        }
    }

    // Stage 4: year implies movie
    if result.detected_type == MediaType::Unknown {
        if let Some(candidate) = detect_year(&working, &mut result) {
            name_candidate = Some(candidate);
        }
    }

    // Stage 5: title cleanup and fallback
    let detected = name_candidate
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let mut cleaned = detected.as_deref().map(|n| clean_title(n, &mut result));

    if cleaned.as_deref().map(str::is_empty).unwrap_or(true) {
        let parent = parent_folder.trim();
        if !parent.is_empty() && !GENERIC_FOLDERS.contains(&parent.to_lowercase().as_str()) {
            let from_parent = clean_title(&normalize(parent), &mut result);
            if !from_parent.is_empty() {
                result.detected_name = Some(parent.to_string());
                cleaned = Some(from_parent);
            }
        }
        if cleaned.as_deref().map(str::is_empty).unwrap_or(true) && !working.is_empty() {
            let from_basename = clean_title(&working, &mut result);
            if !from_basename.is_empty() {
                result.detected_name = Some(working.clone());
                cleaned = Some(from_basename);
                result.confidence -= 10;
            }
        }
    } else {
        result.detected_name = detected;
    }

    result.cleaned_name = cleaned.filter(|s| !s.is_empty());
    result.confidence = result.confidence.clamp(0, 100);

    debug!(
        filename = filename,
        media_type = ?result.detected_type,
        name = ?result.cleaned_name,
        season = ?result.season,
        episode = ?result.episode,
        year = ?result.year,
        confidence = result.confidence,
        "Parsed filename"
    );

    result
}

/// Strip a trailing file extension (last dot segment of 2-4 alphanumerics)
fn strip_extension(filename: &str) -> String {
    if let Some((stem, ext)) = filename.rsplit_once('.') {
        if !stem.is_empty() && (2..=4).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return stem.to_string();
        }
    }
    filename.to_string()
}

/// Compatibility-fold the string and turn dot/underscore separators into
/// spaces, collapsing runs of whitespace.
fn normalize(s: &str) -> String {
    let folded: String = s.chars().map(compat_fold).collect();
    let spaced = folded.replace(['.', '_'], " ");
    collapse_whitespace(&spaced)
}

/// Small NFKD-style compatibility fold for the forms that occur in release
/// names: full-width ASCII and ideographic/non-breaking spaces.
fn compat_fold(c: char) -> char {
    match c {
        '\u{FF01}'..='\u{FF5E}' => {
            char::from_u32(c as u32 - 0xFEE0).unwrap_or(c)
        }
        '\u{3000}' | '\u{00A0}' => ' ',
        _ => c,
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stage 1: specials - `S00E##`, `special`, `ova`, `episode 0`
fn detect_special(working: &str, result: &mut ParsedMedia) -> Option<String> {
    let s00_re = Regex::new(r"(?i)\bs00\s*e(\d{1,3})\b").unwrap();
    if let Some(caps) = s00_re.captures(working) {
        result.detected_type = MediaType::TvShow;
        result.season = Some(0);
        result.episode = caps.get(1).and_then(|m| m.as_str().parse().ok());
        result.confidence += 30;
        let m = caps.get(0).unwrap();
        return Some(working[..m.start()].to_string());
    }

    let keyword_re = Regex::new(r"(?i)\b(?:specials?|ova|episode\s+0)\b").unwrap();
    if let Some(m) = keyword_re.find(working) {
        result.detected_type = MediaType::TvShow;
        result.season = Some(0);
        result.confidence += 30;

        // A trailing number after the marker is the episode
        let trailing_re = Regex::new(r"(?i)\b(?:specials?|ova)\b[^0-9]*(\d{1,3})\s*$").unwrap();
        if let Some(caps) = trailing_re.captures(working) {
            result.episode = caps.get(1).and_then(|c| c.as_str().parse().ok());
        }

        return Some(working[..m.start()].to_string());
    }

    None
}

/// Stage 2: explicit episode patterns, most specific first
fn detect_episode(working: &str, result: &mut ParsedMedia) -> Option<String> {
    // S01E01E02 (multi-episode)
    let multi_re = Regex::new(r"(?i)\bs(\d{1,2})\s*e(\d{1,3})\s*e(\d{1,3})\b").unwrap();
    if let Some(caps) = multi_re.captures(working) {
        result.detected_type = MediaType::TvShow;
        result.season = caps.get(1).and_then(|m| m.as_str().parse().ok());
        result.episode = caps.get(2).and_then(|m| m.as_str().parse().ok());
        result.episode_end = caps.get(3).and_then(|m| m.as_str().parse().ok());
        result.confidence += 50;
        let m = caps.get(0).unwrap();
        return Some(working[..m.start()].to_string());
    }

    // S04E01-03 / S01E01-E02 (episode range)
    let range_re = Regex::new(r"(?i)\bs(\d{1,2})\s*e(\d{1,3})\s*-\s*e?(\d{1,3})\b").unwrap();
    if let Some(caps) = range_re.captures(working) {
        result.detected_type = MediaType::TvShow;
        result.season = caps.get(1).and_then(|m| m.as_str().parse().ok());
        result.episode = caps.get(2).and_then(|m| m.as_str().parse().ok());
        result.episode_end = caps.get(3).and_then(|m| m.as_str().parse().ok());
        result.confidence += 50;
        let m = caps.get(0).unwrap();
        return Some(working[..m.start()].to_string());
    }

    // S01E01 / S01 E01 / S01 EP 01
    let sxxexx_re = Regex::new(r"(?i)\bs(\d{1,2})\s*(?:ep|e)\s*(\d{1,3})\b").unwrap();
    if let Some(caps) = sxxexx_re.captures(working) {
        result.detected_type = MediaType::TvShow;
        result.season = caps.get(1).and_then(|m| m.as_str().parse().ok());
        result.episode = caps.get(2).and_then(|m| m.as_str().parse().ok());
        result.confidence += 50;
        let m = caps.get(0).unwrap();
        return Some(working[..m.start()].to_string());
    }

    // 1x01, optionally 1x01-03
    let cross_re = Regex::new(r"(?i)\b(\d{1,2})x(\d{2,3})\b(?:\s*-\s*(\d{1,3})\b)?").unwrap();
    if let Some(caps) = cross_re.captures(working) {
        result.detected_type = MediaType::TvShow;
        result.season = caps.get(1).and_then(|m| m.as_str().parse().ok());
        result.episode = caps.get(2).and_then(|m| m.as_str().parse().ok());
        result.episode_end = caps.get(3).and_then(|m| m.as_str().parse().ok());
        result.confidence += 45;
        let m = caps.get(0).unwrap();
        return Some(working[..m.start()].to_string());
    }

    // season 1 episode 2
    let verbose_re = Regex::new(r"(?i)\bseason\s*(\d{1,2})\s*episode\s*(\d{1,3})\b").unwrap();
    if let Some(caps) = verbose_re.captures(working) {
        result.detected_type = MediaType::TvShow;
        result.season = caps.get(1).and_then(|m| m.as_str().parse().ok());
        result.episode = caps.get(2).and_then(|m| m.as_str().parse().ok());
        result.confidence += 40;
        let m = caps.get(0).unwrap();
        return Some(working[..m.start()].to_string());
    }

    None
}

/// Number words accepted in `season <word>` packs
const SEASON_WORDS: &[(&str, i64)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
];

/// Stage 3: season packs - whole-season files never organized per episode
fn detect_season_pack(working: &str, result: &mut ParsedMedia) -> Option<String> {
    let complete_re = Regex::new(r"(?i)\bcomplete\s+season(?:\s+(\d{1,2}))?\b").unwrap();
    let numeric_re = Regex::new(r"(?i)\bseason\s+(\d{1,2})\b").unwrap();
    let word_re = Regex::new(r"(?i)\bseason\s+([a-z]+)\b").unwrap();
    // Bare S## is a pack: any S##E## form was consumed by episode detection
    let bare_re = Regex::new(r"(?i)\bs(\d{1,2})\b").unwrap();

    let (m, season) = if let Some(caps) = complete_re.captures(working) {
        (
            caps.get(0).unwrap(),
            caps.get(1).and_then(|c| c.as_str().parse().ok()),
        )
    } else if let Some(caps) = numeric_re.captures(working) {
        (
            caps.get(0).unwrap(),
            caps.get(1).and_then(|c| c.as_str().parse().ok()),
        )
    } else if let Some(caps) = word_re.captures(working) {
        let word = caps.get(1).map(|c| c.as_str().to_lowercase())?;
        let season = SEASON_WORDS
            .iter()
            .find(|(w, _)| *w == word)
            .map(|(_, n)| *n)?;
        (caps.get(0).unwrap(), Some(season))
    } else if let Some(caps) = bare_re.captures(working) {
        (
            caps.get(0).unwrap(),
            caps.get(1).and_then(|c| c.as_str().parse().ok()),
        )
    } else {
        return None;
    };

    result.detected_type = MediaType::TvShow;
    result.is_season_pack = true;
    result.season = season;
    result.confidence += 20;

    // Title is whatever surrounds the pack marker; prefer the prefix
    let before = working[..m.start()].trim();
    if !before.is_empty() {
        Some(before.to_string())
    } else {
        Some(working[m.end()..].to_string())
    }
}

/// Stage 4: a plausible release year classifies the file as a movie
fn detect_year(working: &str, result: &mut ParsedMedia) -> Option<String> {
    let (m, year) = find_year(working)?;

    result.detected_type = MediaType::Movie;
    result.year = Some(year);
    result.confidence += 40;
    Some(working[..m.0].to_string())
}

/// Find a year token in [1900, current year + 1]. A year at the very start
/// of the string is kept only when no later one exists ("2001 A Space
/// Odyssey 1968" names the film, not the release year).
fn find_year(working: &str) -> Option<((usize, usize), i64)> {
    let year_re = Regex::new(r"[\(\[]?\b(19\d{2}|20\d{2})\b[\)\]]?").unwrap();
    let max_year = chrono::Utc::now().year() as i64 + 1;

    let mut first: Option<((usize, usize), i64)> = None;
    for caps in year_re.captures_iter(working) {
        let year: i64 = match caps.get(1).and_then(|m| m.as_str().parse().ok()) {
            Some(y) => y,
            None => continue,
        };
        if !(1900..=max_year).contains(&year) {
            continue;
        }
        let m = caps.get(0).unwrap();
        let span = (m.start(), m.end());
        if m.start() > 0 {
            return Some((span, year));
        }
        first.get_or_insert((span, year));
    }
    first
}

/// Remove noise tokens and bracket groups from a title candidate, then
/// title-case the remainder.
fn clean_title(candidate: &str, result: &mut ParsedMedia) -> String {
    let mut s = candidate.replace(['-', '_'], " ");

    // Bracketed or parenthesized groups are release junk once the year has
    // been extracted
    let bracket_re = Regex::new(r"[\(\[][^\)\]]*[\)\]]").unwrap();
    s = bracket_re.replace_all(&s, " ").to_string();

    // Audio channel layouts (5.1 arrives here as "5 1")
    let channels_re = Regex::new(r"\b[2579]\s[01]\b").unwrap();
    s = channels_re.replace_all(&s, " ").to_string();

    // A trailing year is kept as metadata, not as part of the title
    let trailing_year_re = Regex::new(r"\b(19\d{2}|20\d{2})\s*$").unwrap();
    let snapshot = s.clone();
    if let Some(caps) = trailing_year_re.captures(&snapshot) {
        if let Some(year) = caps.get(1).and_then(|m| m.as_str().parse().ok()) {
            let max_year = chrono::Utc::now().year() as i64 + 1;
            if (1900..=max_year).contains(&year) {
                result.year.get_or_insert(year);
                let m = caps.get(0).unwrap();
                s.truncate(m.start());
            }
        }
    }

    let words: Vec<&str> = s
        .split_whitespace()
        .filter(|w| {
            let lower = w.to_lowercase();
            !NOISE_TOKENS.contains(&lower.as_str())
        })
        .collect();

    title_case(&words.join(" "))
}

/// Title-case: capitalize lowercase words, keep existing capitalization
/// (acronyms like "MD" survive), minor words stay lowercase unless first.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i > 0 && MINOR_WORDS.contains(&lower.as_str()) {
                lower
            } else if word.chars().any(|c| c.is_uppercase()) {
                word.to_string()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_file(filename: &str) -> ParsedMedia {
        parse(filename, "downloads")
    }

    #[test]
    fn test_parse_sxxexx() {
        let result = parse_file("Breaking.Bad.S01E01.720p.BluRay.x264-DEMAND.mkv");
        assert_eq!(result.detected_type, MediaType::TvShow);
        assert_eq!(result.season, Some(1));
        assert_eq!(result.episode, Some(1));
        assert_eq!(result.episode_end, None);
        assert_eq!(result.cleaned_name.as_deref(), Some("Breaking Bad"));
    }

    #[test]
    fn test_parse_noisy_release_name() {
        let result =
            parse_file("Fallout.S02E01.1080p.WEB-DL.Hindi.5.1-English.5.1.ESub.x264-HDHub4u.Ms.mkv");
        assert_eq!(result.detected_type, MediaType::TvShow);
        assert_eq!(result.season, Some(2));
        assert_eq!(result.episode, Some(1));
        assert_eq!(result.cleaned_name.as_deref(), Some("Fallout"));
    }

    #[test]
    fn test_parse_cross_format() {
        let result = parse_file("Game of Thrones - 1x01 - Winter Is Coming.mp4");
        assert_eq!(result.detected_type, MediaType::TvShow);
        assert_eq!(result.season, Some(1));
        assert_eq!(result.episode, Some(1));
        assert_eq!(result.cleaned_name.as_deref(), Some("Game of Thrones"));
    }

    #[test]
    fn test_parse_multi_episode() {
        let result = parse_file("Friends.S01E01E02.720p.mkv");
        assert_eq!(result.detected_type, MediaType::TvShow);
        assert_eq!(result.season, Some(1));
        assert_eq!(result.episode, Some(1));
        assert_eq!(result.episode_end, Some(2));
        assert_eq!(result.cleaned_name.as_deref(), Some("Friends"));
    }

    #[test]
    fn test_parse_episode_range() {
        let result = parse_file("Stranger.Things.S04E01-03.2160p.mkv");
        assert_eq!(result.detected_type, MediaType::TvShow);
        assert_eq!(result.season, Some(4));
        assert_eq!(result.episode, Some(1));
        assert_eq!(result.episode_end, Some(3));
        assert_eq!(result.cleaned_name.as_deref(), Some("Stranger Things"));
    }

    #[test]
    fn test_parse_movie_with_parenthesized_year() {
        let result = parse_file("The.Matrix.(1999).1080p.BluRay.mkv");
        assert_eq!(result.detected_type, MediaType::Movie);
        assert_eq!(result.year, Some(1999));
        assert_eq!(result.cleaned_name.as_deref(), Some("The Matrix"));
    }

    #[test]
    fn test_parse_movie_with_bare_year() {
        let result = parse_file("Inception.2010.2160p.UHD.BluRay.mkv");
        assert_eq!(result.detected_type, MediaType::Movie);
        assert_eq!(result.year, Some(2010));
        assert_eq!(result.cleaned_name.as_deref(), Some("Inception"));
    }

    #[test]
    fn test_parse_season_pack() {
        let result = parse_file("Complete Season 01 - House MD.mkv");
        assert_eq!(result.detected_type, MediaType::TvShow);
        assert!(result.is_season_pack);
        assert_eq!(result.season, Some(1));
        assert_eq!(result.episode, None);
        assert_eq!(result.cleaned_name.as_deref(), Some("House MD"));
    }

    #[test]
    fn test_parse_special() {
        let result = parse_file("Naruto - Special - OVA.mkv");
        assert_eq!(result.detected_type, MediaType::TvShow);
        assert_eq!(result.season, Some(0));
        assert_eq!(result.cleaned_name.as_deref(), Some("Naruto"));
    }

    #[test]
    fn test_parse_unclassifiable() {
        let result = parse_file("random_video_file.mkv");
        assert_eq!(result.detected_type, MediaType::Unknown);
        assert_eq!(result.season, None);
        assert_eq!(result.episode, None);
        assert_eq!(result.year, None);
    }

    #[test]
    fn test_episode_pattern_beats_year() {
        // A year after a valid episode tag never reclassifies to movie
        let result = parse_file("Show.S03E07.2021.1080p.mkv");
        assert_eq!(result.detected_type, MediaType::TvShow);
        assert_eq!(result.season, Some(3));
        assert_eq!(result.episode, Some(7));
    }

    #[test]
    fn test_resolution_is_not_an_episode() {
        let result = parse_file("Some.Movie.2015.1920x1080.mkv");
        assert_eq!(result.detected_type, MediaType::Movie);
        assert_eq!(result.year, Some(2015));
    }

    #[test]
    fn test_parent_folder_fallback() {
        let result = parse("episode_one.mkv", "Cowboy Bebop");
        assert_eq!(result.cleaned_name.as_deref(), Some("Cowboy Bebop"));
    }

    #[test]
    fn test_generic_parent_folder_penalizes_confidence() {
        let with_parent = parse("random_video_file.mkv", "Cowboy Bebop");
        let without = parse("random_video_file.mkv", "downloads");
        assert!(without.confidence <= with_parent.confidence);
    }

    #[test]
    fn test_confidence_bounds() {
        for name in [
            "Breaking.Bad.S01E01.720p.BluRay.x264-DEMAND.mkv",
            "Inception.2010.mkv",
            "x.mkv",
            "",
            "....",
            "s99e999.mkv",
        ] {
            let result = parse(name, "");
            assert!(
                (0..=100).contains(&result.confidence),
                "confidence out of range for {:?}",
                name
            );
        }
    }

    #[test]
    fn test_season_word_pack() {
        let result = parse_file("Archer Season Two.mkv");
        assert!(result.is_season_pack);
        assert_eq!(result.season, Some(2));
        assert_eq!(result.cleaned_name.as_deref(), Some("Archer"));
    }

    #[test]
    fn test_bare_season_tag_is_pack() {
        let result = parse_file("The.Wire.S02.1080p.mkv");
        assert!(result.is_season_pack);
        assert_eq!(result.season, Some(2));
        assert_eq!(result.cleaned_name.as_deref(), Some("The Wire"));
    }

    #[test]
    fn test_fullwidth_digits_fold() {
        let result = parse_file("Ｉｎｃｅｐｔｉｏｎ．２０１０.mkv");
        assert_eq!(result.detected_type, MediaType::Movie);
        assert_eq!(result.year, Some(2010));
    }
}
