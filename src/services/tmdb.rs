//! TMDB (The Movie Database) API client for metadata enrichment
//!
//! Base URL: https://api.themoviedb.org/3
//!
//! Lookups never fail the surrounding scan: every public method returns an
//! Option and maps rate limits, transport errors, and non-success responses
//! to retries or a silent no-match. With no API key configured, every
//! operation returns None.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_QUERY_LEN: usize = 100;

/// Words dropped from search queries
const STOP_WORDS: &[&str] = &["the", "a", "an", "and", "of", "in", "on", "at", "to", "for"];

/// A movie match from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogMovie {
    pub id: i64,
    pub title: String,
    pub year: Option<i64>,
    pub poster_path: Option<String>,
}

/// A series match from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogShow {
    pub id: i64,
    pub name: String,
    pub year: Option<i64>,
    pub poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovieSearchResponse {
    results: Vec<MovieResult>,
}

#[derive(Debug, Deserialize)]
struct MovieResult {
    id: i64,
    title: String,
    release_date: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TvSearchResponse {
    results: Vec<TvResult>,
}

#[derive(Debug, Deserialize)]
struct TvResult {
    id: i64,
    name: String,
    first_air_date: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodeResponse {
    name: Option<String>,
}

/// TMDB API client
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TmdbClient {
    /// Create a new TMDB client; `api_key = None` disables all lookups
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: "https://api.themoviedb.org/3".to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    /// Point the client at a different server (tests)
    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Search for a movie. Prefers a result whose release year matches the
    /// supplied one exactly, otherwise takes the first result.
    pub async fn search_movie(&self, name: &str, year: Option<i64>) -> Option<CatalogMovie> {
        let key = self.api_key.as_deref()?;
        let query = preprocess_query(name);
        if query.is_empty() {
            return None;
        }

        let url = format!("{}/search/movie", self.base_url);
        let mut params: Vec<(&str, String)> = vec![
            ("api_key", key.to_string()),
            ("query", query),
            ("include_adult", "false".to_string()),
        ];
        if let Some(y) = year {
            params.push(("year", y.to_string()));
        }

        let response: MovieSearchResponse = self.get_json(&url, &params, "search_movie").await?;

        let movies: Vec<CatalogMovie> = response
            .results
            .into_iter()
            .map(|r| CatalogMovie {
                id: r.id,
                title: r.title,
                year: year_of(r.release_date.as_deref()),
                poster_path: r.poster_path,
            })
            .collect();

        if let Some(wanted) = year {
            if let Some(exact) = movies.iter().find(|m| m.year == Some(wanted)) {
                return Some(exact.clone());
            }
        }
        movies.into_iter().next()
    }

    /// Search for a series; first result wins.
    pub async fn search_tv(&self, name: &str) -> Option<CatalogShow> {
        let key = self.api_key.as_deref()?;
        let query = preprocess_query(name);
        if query.is_empty() {
            return None;
        }

        let url = format!("{}/search/tv", self.base_url);
        let params: Vec<(&str, String)> =
            vec![("api_key", key.to_string()), ("query", query)];

        let response: TvSearchResponse = self.get_json(&url, &params, "search_tv").await?;

        response.results.into_iter().next().map(|r| CatalogShow {
            id: r.id,
            name: r.name,
            year: year_of(r.first_air_date.as_deref()),
            poster_path: r.poster_path,
        })
    }

    /// Title of one episode of a known series.
    pub async fn episode_title(
        &self,
        series_id: i64,
        season: i64,
        episode: i64,
    ) -> Option<String> {
        let key = self.api_key.as_deref()?;

        let url = format!(
            "{}/tv/{}/season/{}/episode/{}",
            self.base_url, series_id, season, episode
        );
        let params: Vec<(&str, String)> = vec![("api_key", key.to_string())];

        let response: EpisodeResponse = self.get_json(&url, &params, "episode_title").await?;
        response.name.filter(|n| !n.is_empty())
    }

    /// GET with the shared retry schedule: up to three attempts, linear
    /// backoff on 429 (1s then 2s between the attempts), a short pause on
    /// transport errors, and None on any other non-success response.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
        operation: &str,
    ) -> Option<T> {
        for attempt in 1..=MAX_ATTEMPTS {
            let response = match self.client.get(url).query(params).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(operation, attempt, error = %e, "Catalog request failed");
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                    continue;
                }
            };

            if response.status().as_u16() == 429 {
                warn!(operation, attempt, "Catalog rate limit hit");
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                }
                continue;
            }

            if !response.status().is_success() {
                debug!(operation, status = %response.status(), "Catalog returned non-success");
                return None;
            }

            match response.json::<T>().await {
                Ok(parsed) => return Some(parsed),
                Err(e) => {
                    warn!(operation, error = %e, "Failed to parse catalog response");
                    return None;
                }
            }
        }

        None
    }
}

/// Extract the year from a `YYYY-MM-DD` date string
fn year_of(date: Option<&str>) -> Option<i64> {
    date.and_then(|d| d.split('-').next())
        .and_then(|y| y.parse().ok())
}

/// Strip non-alphanumeric characters, drop stop words, collapse whitespace,
/// and truncate to a sane query length.
fn preprocess_query(name: &str) -> String {
    let stripped: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut query = stripped
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ");

    if query.len() > MAX_QUERY_LEN {
        // Truncate on a char boundary
        let mut cut = MAX_QUERY_LEN;
        while !query.is_char_boundary(cut) {
            cut -= 1;
        }
        query.truncate(cut);
    }
    query
}
