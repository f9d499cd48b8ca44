//! Auth handlers and supporting modules.
//!
//! This module coordinates password auth, the refresh-token ledger, one-time
//! codes for account recovery, and Google federated login.
//!
//! ## Token model
//!
//! - Access tokens are short-lived signed `JWT`s; handlers verify them
//!   without touching the database.
//! - Refresh tokens are opaque random values stored hashed in the
//!   `refresh_tokens` ledger. Presenting one rotates it: the old row is
//!   revoked and a replacement issued in the same transaction, so a stolen
//!   token stops working the moment the legitimate client refreshes.
//!
//! ## One-time codes
//!
//! Recovery codes live behind the [`OtpStore`] trait keyed by normalized
//! email. The in-process default keeps single-use and cooldown guarantees per
//! instance; a shared deployment can swap in an external store without
//! touching the handlers.

pub(crate) mod google;
mod otp;
pub(crate) mod password;
pub(crate) mod principal;
mod rate_limit;
pub(crate) mod recovery;
pub(crate) mod register;
pub(crate) mod session;
mod state;
mod storage;
mod tokens;
pub(crate) mod types;
mod utils;

pub use google::{GoogleIdentity, IdentityVerifier, VerifiedIdentity};
pub use otp::{InMemoryOtpStore, OtpStore, StoredCode};
pub use rate_limit::{NoopRateLimiter, RateLimiter};
pub use state::{AuthConfig, AuthState};
