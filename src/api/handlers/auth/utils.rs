//! Small helpers shared across the auth handlers.

use axum::http::HeaderMap;
use once_cell::sync::Lazy;
use regex::Regex;

// One segment before the @, a dotted domain after it, no whitespace anywhere.
static EMAIL_SHAPE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    EMAIL_SHAPE
        .as_ref()
        .is_some_and(|shape| shape.is_match(email_normalized))
}

/// SQLSTATE 23505 is how Postgres reports a broken unique constraint.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().is_some_and(|code| code.as_ref() == "23505")
    )
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Client IP for rate limiting. `x-forwarded-for` may carry the whole proxy
/// chain; only the first hop identifies the caller. `x-real-ip` is the
/// single-proxy fallback.
pub(super) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| {
            header_str(headers, "x-real-ip")
                .map(str::trim)
                .filter(|value| !value.is_empty())
        })
        .map(str::to_string)
}
