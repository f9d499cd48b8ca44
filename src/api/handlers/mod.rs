//! API handlers and shared utilities for Resona.
//!
//! This module organizes the service's route handlers and provides common
//! functions for query and path parameter validation.

pub mod auth;
pub mod billing;
pub mod catalog;
pub mod health;
pub mod me;
pub mod root;

use axum::{
    extract::{Query, rejection::QueryRejection},
    http::StatusCode,
};
use tracing::error;
use uuid::Uuid;

/// Unwrap query-string extraction, mapping malformed input to a 400.
pub(crate) fn parse_query<T>(
    query: Result<Query<T>, QueryRejection>,
) -> Result<T, (StatusCode, String)> {
    match query {
        Ok(Query(args)) => Ok(args),
        Err(err) => {
            error!("Failed to parse query parameters: {err}");
            Err((
                StatusCode::BAD_REQUEST,
                "Invalid query parameters".to_string(),
            ))
        }
    }
}

/// Parse a path segment as a UUID; `what` names the entity for the 400 body.
pub(crate) fn parse_uuid(value: &str, what: &str) -> Result<Uuid, (StatusCode, String)> {
    value.trim().parse::<Uuid>().map_err(|err| {
        error!("Failed to parse {what} id: {err}");
        (StatusCode::BAD_REQUEST, format!("Invalid {what} id"))
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_query, parse_uuid};
    use anyhow::{Result, anyhow};
    use axum::{extract::Query, http::StatusCode, http::Uri};
    use serde::Deserialize;
    use uuid::Uuid;

    #[derive(Deserialize, Debug, Default)]
    struct PageArgs {
        limit: Option<i64>,
    }

    #[test]
    fn parse_query_accepts_valid_query() {
        let query = Ok(Query(PageArgs { limit: Some(5) }));
        let parsed = parse_query(query);
        assert!(matches!(parsed, Ok(args) if args.limit == Some(5)));
    }

    #[test]
    fn parse_query_rejects_malformed_values() -> Result<()> {
        let uri: Uri = "http://example.com/v1/tracks?limit=abc".parse()?;
        let rejection = Query::<PageArgs>::try_from_uri(&uri)
            .err()
            .ok_or_else(|| anyhow!("expected query rejection"))?;
        let parsed = parse_query::<PageArgs>(Err(rejection));
        assert!(matches!(
            parsed,
            Err((StatusCode::BAD_REQUEST, msg)) if msg == "Invalid query parameters"
        ));
        Ok(())
    }

    #[test]
    fn parse_uuid_accepts_valid_uuid() {
        let id = Uuid::new_v4();
        let parsed = parse_uuid(&id.to_string(), "track");
        assert!(matches!(parsed, Ok(value) if value == id));
    }

    #[test]
    fn parse_uuid_trims_whitespace() {
        let id = Uuid::new_v4();
        let parsed = parse_uuid(&format!("  {id} "), "playlist");
        assert!(matches!(parsed, Ok(value) if value == id));
    }

    #[test]
    fn parse_uuid_rejects_garbage() {
        let parsed = parse_uuid("not-a-uuid", "track");
        assert!(matches!(
            parsed,
            Err((StatusCode::BAD_REQUEST, msg)) if msg == "Invalid track id"
        ));
    }
}
