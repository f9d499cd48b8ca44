//! Request/response types for the catalog APIs.
//!
//! These payloads are shared between handlers and `OpenAPI` generation.
//! Timestamps are rendered server-side as UTC RFC 3339 strings.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTrackRequest {
    pub title: String,
    /// Artist name; the artist row is created on first use.
    pub artist: String,
    /// Optional album title under the same artist.
    pub album: Option<String>,
    pub genre: Option<String>,
    pub duration_secs: i32,
    pub audio_url: String,
    pub cover_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateTrackRequest {
    pub title: Option<String>,
    pub genre: Option<String>,
    pub duration_secs: Option<i32>,
    pub audio_url: Option<String>,
    pub cover_url: Option<String>,
    pub is_featured: Option<bool>,
}

impl UpdateTrackRequest {
    pub(super) fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.genre.is_none()
            && self.duration_secs.is_none()
            && self.audio_url.is_none()
            && self.cover_url.is_none()
            && self.is_featured.is_none()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    /// Playlists are public unless the owner opts out.
    pub is_public: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdatePlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub is_public: Option<bool>,
}

impl UpdatePlaylistRequest {
    pub(super) fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.cover_url.is_none()
            && self.is_public.is_none()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddTrackRequest {
    pub track_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ArtistSummary {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlbumSummary {
    pub id: String,
    pub title: String,
    pub cover_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrackResponse {
    pub id: String,
    pub title: String,
    pub artist: ArtistSummary,
    pub album: Option<AlbumSummary>,
    pub genre: Option<String>,
    pub duration_secs: i32,
    pub audio_url: String,
    pub cover_url: Option<String>,
    pub play_count: i64,
    pub is_featured: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrackPage {
    pub items: Vec<TrackResponse>,
    /// Id of the first track on the next page, absent on the last page.
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OwnerSummary {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlaylistResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub is_public: bool,
    pub owner: OwnerSummary,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlaylistPage {
    pub items: Vec<PlaylistResponse>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlaylistDetail {
    #[serde(flatten)]
    pub playlist: PlaylistResponse,
    /// Tracks in playlist order.
    pub tracks: Vec<TrackResponse>,
}

/// Like toggle outcome: the state after the request, not a delta.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LikeResponse {
    pub liked: bool,
}

/// Album hit in search results; carries the artist name for display.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlbumResult {
    pub id: String,
    pub title: String,
    pub cover_url: Option<String>,
    pub artist_name: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<TrackResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artists: Option<Vec<ArtistSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub albums: Option<Vec<AlbumResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlists: Option<Vec<PlaylistResponse>>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    All,
    Track,
    Artist,
    Album,
    Playlist,
}

impl SearchKind {
    /// Whether results for `other` should be included for this search type.
    pub(super) fn includes(self, other: Self) -> bool {
        self == Self::All || self == other
    }
}

#[cfg(test)]
mod tests {
    use super::{SearchKind, UpdatePlaylistRequest, UpdateTrackRequest};
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn update_track_request_rejects_unknown_fields() {
        let result: Result<UpdateTrackRequest, _> =
            serde_json::from_value(json!({"title": "ok", "plays": 5}));
        assert!(result.is_err());
    }

    #[test]
    fn update_track_request_empty_detection() -> Result<()> {
        let empty: UpdateTrackRequest = serde_json::from_value(json!({}))?;
        assert!(empty.is_empty());
        let titled: UpdateTrackRequest = serde_json::from_value(json!({"title": "New"}))?;
        assert!(!titled.is_empty());
        Ok(())
    }

    #[test]
    fn update_playlist_request_empty_detection() -> Result<()> {
        let empty: UpdatePlaylistRequest = serde_json::from_value(json!({}))?;
        assert!(empty.is_empty());
        let renamed: UpdatePlaylistRequest = serde_json::from_value(json!({"is_public": false}))?;
        assert!(!renamed.is_empty());
        Ok(())
    }

    #[test]
    fn search_kind_defaults_to_all() -> Result<()> {
        let kind: SearchKind = serde_json::from_value(json!("all"))?;
        assert_eq!(kind, SearchKind::All);
        assert!(SearchKind::All.includes(SearchKind::Track));
        assert!(SearchKind::Track.includes(SearchKind::Track));
        assert!(!SearchKind::Track.includes(SearchKind::Album));
        Ok(())
    }
}
