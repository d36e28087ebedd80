//! Validation of operator input.
//!
//! Configuration values are checked once at startup so a misconfigured
//! daemon fails before touching the checkpoint store. Stream names given on
//! the command line go through the same three-tier resolution the rest of
//! the CLI uses: exact match → synonym lookup → error with suggestion.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::model::StreamKind;

/// Upper bound on rows per batch; keeps `IN (...)` lists under SQLite's
/// parameter limit.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Characters Elasticsearch refuses in index names.
pub static FORBIDDEN_INDEX_CHARS: LazyLock<HashSet<char>> = LazyLock::new(|| {
    ['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':']
        .into_iter()
        .collect()
});

pub static VALID_STREAMS: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    StreamKind::ALL
        .iter()
        .map(StreamKind::checkpoint_key)
        .collect()
});

pub static STREAM_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("film", "film_work"),
        ("films", "film_work"),
        ("film_works", "film_work"),
        ("filmwork", "film_work"),
        ("movie", "film_work"),
        ("movies", "film_work"),
        ("persons", "person"),
        ("people", "person"),
        ("genres", "genre"),
    ]
    .into_iter()
    .collect()
});

/// Validate an Elasticsearch index name.
///
/// # Errors
///
/// Returns a message describing the first violated rule.
pub fn validate_index_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("index name must not be empty".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("index name '{name}' is reserved"));
    }
    if name.len() > 255 {
        return Err("index name must be at most 255 bytes".to_string());
    }
    if name.starts_with(['-', '_', '+']) {
        return Err(format!("index name '{name}' must not start with '-', '_' or '+'"));
    }
    if name.chars().any(char::is_uppercase) {
        return Err(format!("index name '{name}' must be lowercase"));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_INDEX_CHARS.contains(c)) {
        return Err(format!("index name '{name}' contains forbidden character '{c}'"));
    }
    Ok(())
}

/// Validate the number of rows fetched per batch.
///
/// # Errors
///
/// Returns a message when the size is zero or above [`MAX_BATCH_SIZE`].
pub fn validate_batch_size(size: usize) -> Result<(), String> {
    if (1..=MAX_BATCH_SIZE).contains(&size) {
        Ok(())
    } else {
        Err(format!("batch size must be 1-{MAX_BATCH_SIZE}, got {size}"))
    }
}

/// Validate the search sink base URL.
///
/// # Errors
///
/// Returns a message when the URL is not an http(s) URL with a host.
pub fn validate_sink_url(url: &str) -> Result<(), String> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| format!("sink URL '{url}' must start with http:// or https://"))?;

    if rest.trim_matches('/').is_empty() {
        return Err(format!("sink URL '{url}' has no host"));
    }
    Ok(())
}

/// Resolve a stream name via exact match or synonym lookup.
///
/// Returns the stream, or an error with the original input and an optional
/// suggestion.
pub fn normalize_stream(input: &str) -> Result<StreamKind, (String, Option<String>)> {
    let lower = input.trim().to_lowercase();

    // Tier 1: exact match
    if let Some(kind) = StreamKind::from_key(&lower) {
        return Ok(kind);
    }

    // Tier 2: synonym lookup
    if let Some(kind) = STREAM_SYNONYMS
        .get(lower.as_str())
        .and_then(|canonical| StreamKind::from_key(canonical))
    {
        return Ok(kind);
    }

    // Tier 3: find closest suggestion
    let suggestion = find_closest_match(&lower, &VALID_STREAMS, &STREAM_SYNONYMS);
    Err((input.to_string(), suggestion))
}

/// Find the closest matching value across valid set and synonyms.
fn find_closest_match(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;

    for &v in valid.iter().chain(synonyms.keys()) {
        let dist = levenshtein_distance(input, v);
        if dist <= 3 && best.is_none_or(|(_, best_dist)| dist < best_dist) {
            // For synonyms, show what it maps to
            let shown = synonyms.get(v).copied().unwrap_or(v);
            best = Some((shown, dist));
        }
    }

    best.map(|(v, _)| v.to_string())
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Single-row optimization (O(min(m,n)) space)
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1) // deletion
                .min(curr[j - 1] + 1) // insertion
                .min(prev[j - 1] + cost); // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
