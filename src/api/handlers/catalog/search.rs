//! Catalog search handler.
//!
//! One endpoint fans out over tracks, artists, albums and public playlists.
//! The `type` parameter narrows the fan-out; omitted groups are left out of
//! the response entirely rather than returned empty.

use axum::{
    Json,
    extract::{Extension, Query, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::error;
use utoipa::IntoParams;

use super::super::parse_query;
use super::{
    DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT, clamp_limit, storage,
    types::{SearchKind, SearchResponse},
};

#[derive(IntoParams, Debug, Deserialize, Default)]
#[into_params(parameter_in = Query)]
pub struct SearchArgs {
    /// Term matched case-insensitively against names and titles.
    q: String,
    /// Restricts the search to one group; defaults to all of them.
    #[serde(rename = "type", default)]
    kind: SearchKind,
    limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/v1/search",
    params(SearchArgs),
    responses(
        (status = 200, description = "Matches grouped by kind.", body = SearchResponse),
        (status = 400, description = "Missing or blank search term.", body = String),
    ),
    tag = "search"
)]
/// Searches the catalog. Tracks match on title, artist name or genre and come
/// back most played first; private playlists are never searchable.
pub async fn search(
    pool: Extension<PgPool>,
    query: Result<Query<SearchArgs>, QueryRejection>,
) -> impl IntoResponse {
    let args = match parse_query(query) {
        Ok(args) => args,
        Err(rejection) => return rejection.into_response(),
    };

    let term = args.q.trim();
    if term.is_empty() {
        return (StatusCode::BAD_REQUEST, "Search term is required.").into_response();
    }
    let pattern = storage::like_pattern(term);
    let limit = clamp_limit(args.limit, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT);

    let mut response = SearchResponse::default();

    if args.kind.includes(SearchKind::Track) {
        match storage::search_tracks(&pool, &pattern, limit).await {
            Ok(tracks) => response.tracks = Some(tracks),
            Err(err) => {
                error!("Track search failed: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }
    if args.kind.includes(SearchKind::Artist) {
        match storage::search_artists(&pool, &pattern, limit).await {
            Ok(artists) => response.artists = Some(artists),
            Err(err) => {
                error!("Artist search failed: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }
    if args.kind.includes(SearchKind::Album) {
        match storage::search_albums(&pool, &pattern, limit).await {
            Ok(albums) => response.albums = Some(albums),
            Err(err) => {
                error!("Album search failed: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }
    if args.kind.includes(SearchKind::Playlist) {
        match storage::search_playlists(&pool, &pattern, limit).await {
            Ok(playlists) => response.playlists = Some(playlists),
            Err(err) => {
                error!("Playlist search failed: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    (StatusCode::OK, Json(response)).into_response()
}

#[cfg(test)]
mod tests {
    use super::{SearchArgs, search};
    use crate::api::handlers::catalog::types::SearchKind;
    use anyhow::Result;
    use axum::{
        extract::{Extension, Query},
        http::{StatusCode, Uri},
        response::IntoResponse,
    };
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn search_rejects_blank_term() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let query = Ok(Query(SearchArgs {
            q: "   ".to_string(),
            ..SearchArgs::default()
        }));
        let response = search(Extension(pool), query).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[test]
    fn search_args_parse_type_alias() -> Result<()> {
        let uri: Uri = "/v1/search?q=dub&type=artist&limit=5".parse()?;
        let Query(args) = Query::<SearchArgs>::try_from_uri(&uri)?;
        assert_eq!(args.q, "dub");
        assert_eq!(args.kind, SearchKind::Artist);
        assert_eq!(args.limit, Some(5));
        Ok(())
    }

    #[test]
    fn search_args_require_term() {
        let uri: Uri = "/v1/search?type=track".parse().unwrap();
        assert!(Query::<SearchArgs>::try_from_uri(&uri).is_err());
    }
}
