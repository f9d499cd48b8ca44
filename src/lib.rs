//! # Resona (Music Streaming Backend)
//!
//! `resona` is the REST backend of a music streaming service: catalog
//! (tracks, albums, artists), playlists, search, subscription billing, and
//! the account layer that ties them together.
//!
//! ## Sessions & Tokens
//!
//! Authentication issues two credentials per login: a short-lived `JWT`
//! access token (~15 minutes) and a long-lived opaque refresh token
//! (~7 days). Refresh tokens are stored hashed (SHA-256) in a ledger table
//! and are single-use: every `/v1/auth/refresh` call revokes the presented
//! token and issues a replacement, so a replayed token is rejected.
//!
//! - **Password accounts** store an argon2 hash; accounts created through
//!   Google sign-in may have no password at all and cannot use the password
//!   login path.
//! - **Step-up verification** uses single-use 6-digit codes with a 10 minute
//!   expiry and a 30 second reissue cooldown, kept in a process-local store.
//!
//! ## Catalog & Playback
//!
//! Catalog rows are soft-deleted and paginated by cursor. Playback side
//! effects (play counts, listening history, per-user stats) never run inside
//! the request: `POST /v1/tracks/{id}/play` enqueues a row in a work-queue
//! table that a background worker drains with retry and backoff.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
