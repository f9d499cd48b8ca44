use super::handlers::{auth, billing, catalog, health, me};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec. Handlers for the same path
/// share one `routes!` call. Routes added outside (like `/` or
/// `OPTIONS /health`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::session::login))
        .routes(routes!(auth::session::refresh))
        .routes(routes!(auth::session::logout))
        .routes(routes!(auth::recovery::request_otp))
        .routes(routes!(auth::recovery::verify_otp))
        .routes(routes!(auth::recovery::reset_password))
        .routes(routes!(auth::google::google_login))
        .routes(routes!(me::get_me, me::patch_me))
        .routes(routes!(me::change_password))
        .routes(routes!(me::list_sessions))
        .routes(routes!(me::revoke_session))
        .routes(routes!(me::get_subscription))
        .routes(routes!(me::list_likes))
        .routes(routes!(me::list_my_playlists))
        .routes(routes!(
            catalog::tracks::list_tracks,
            catalog::tracks::create_track
        ))
        .routes(routes!(catalog::tracks::featured_tracks))
        .routes(routes!(catalog::tracks::trending_tracks))
        .routes(routes!(
            catalog::tracks::get_track,
            catalog::tracks::patch_track,
            catalog::tracks::delete_track
        ))
        .routes(routes!(catalog::tracks::play_track))
        .routes(routes!(catalog::tracks::like_track))
        .routes(routes!(
            catalog::playlists::list_playlists,
            catalog::playlists::create_playlist
        ))
        .routes(routes!(
            catalog::playlists::get_playlist,
            catalog::playlists::patch_playlist,
            catalog::playlists::delete_playlist
        ))
        .routes(routes!(catalog::playlists::add_track))
        .routes(routes!(catalog::playlists::remove_track))
        .routes(routes!(catalog::search::search))
        .routes(routes!(billing::checkout))
        .routes(routes!(billing::verify));

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Registration, login, token rotation, and recovery".to_string());

    let mut me_tag = Tag::new("me");
    me_tag.description = Some("Authenticated profile, sessions, and library".to_string());

    let mut tracks_tag = Tag::new("tracks");
    tracks_tag.description = Some("Track catalog, playback, and likes".to_string());

    let mut playlists_tag = Tag::new("playlists");
    playlists_tag.description = Some("Playlist browsing and curation".to_string());

    let mut search_tag = Tag::new("search");
    search_tag.description = Some("Catalog search across tracks, artists, albums, and playlists".to_string());

    let mut billing_tag = Tag::new("billing");
    billing_tag.description = Some("Subscription checkout and verification".to_string());

    router.get_openapi_mut().tags = Some(vec![
        auth_tag,
        me_tag,
        tracks_tag,
        playlists_tag,
        search_tag,
        billing_tag,
    ]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}
