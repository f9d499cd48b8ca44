//! Track, playlist, and search endpoints.
//!
//! The catalog is the public face of the service: anyone can browse tracks,
//! public playlists, and search results without a session. Write operations
//! are gated by role (track curation is ADMIN-only) or ownership (playlists),
//! and ownership failures on private playlists return 404 so their existence
//! is not leaked.
//!
//! This module is split into small route-focused files plus a shared storage
//! layer so the HTTP surface stays easy to read and the SQL logic stays easy
//! to test. The handler modules only parse inputs and map the high-level
//! flow, while `storage` owns database queries and response shaping.
//!
//! Listing endpoints paginate with an id cursor: fetch one row past the page
//! size, and when it exists hand its id back as `next_cursor`. The next page
//! starts at that row, so no track is skipped when rows are inserted between
//! requests.

pub(crate) mod playlists;
pub(crate) mod search;
pub(crate) mod storage;
pub(crate) mod tracks;
pub(crate) mod types;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_CHART_SIZE: i64 = 10;
const MAX_CHART_SIZE: i64 = 50;
const DEFAULT_SEARCH_LIMIT: i64 = 10;
const MAX_SEARCH_LIMIT: i64 = 50;

/// Clamp a caller-supplied page size into the allowed range.
fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

/// Trim an optional owned field; blank strings are treated as absent.
fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Borrowed variant of [`normalize_optional`] for create paths.
fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
