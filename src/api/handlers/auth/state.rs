//! Auth state and configuration.

use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

use super::otp::OtpStore;
use super::rate_limit::RateLimiter;

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_OTP_TTL_SECONDS: u64 = 10 * 60;
const DEFAULT_OTP_COOLDOWN_SECONDS: u64 = 30;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    frontend_base_url: String,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    otp_ttl_seconds: u64,
    otp_cooldown_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString, frontend_base_url: String) -> Self {
        Self {
            jwt_secret,
            frontend_base_url,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            otp_cooldown_seconds: DEFAULT_OTP_COOLDOWN_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: u64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_otp_cooldown_seconds(mut self, seconds: u64) -> Self {
        self.otp_cooldown_seconds = seconds;
        self
    }

    pub(crate) fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(crate) fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    pub(crate) fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    pub(super) fn otp_ttl(&self) -> Duration {
        Duration::from_secs(self.otp_ttl_seconds)
    }

    pub(super) fn otp_cooldown(&self) -> Duration {
        Duration::from_secs(self.otp_cooldown_seconds)
    }

    /// Cookies carry `Secure` only when the site is served over https.
    pub(crate) fn cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    otp_store: Arc<dyn OtpStore>,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        otp_store: Arc<dyn OtpStore>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            config,
            otp_store,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn otp_store(&self) -> &dyn OtpStore {
        self.otp_store.as_ref()
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::super::otp::InMemoryOtpStore;
    use super::super::rate_limit::NoopRateLimiter;
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new(
            SecretString::from("test-secret"),
            "http://localhost:5173".to_string(),
        )
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = config();

        assert_eq!(config.frontend_base_url(), "http://localhost:5173");
        assert_eq!(
            config.access_token_ttl_seconds(),
            DEFAULT_ACCESS_TOKEN_TTL_SECONDS
        );
        assert_eq!(
            config.refresh_token_ttl_seconds(),
            DEFAULT_REFRESH_TOKEN_TTL_SECONDS
        );
        assert_eq!(config.otp_ttl(), Duration::from_secs(600));
        assert_eq!(config.otp_cooldown(), Duration::from_secs(30));

        let config = config
            .with_access_token_ttl_seconds(60)
            .with_refresh_token_ttl_seconds(3600)
            .with_otp_ttl_seconds(120)
            .with_otp_cooldown_seconds(5);

        assert_eq!(config.access_token_ttl_seconds(), 60);
        assert_eq!(config.refresh_token_ttl_seconds(), 3600);
        assert_eq!(config.otp_ttl(), Duration::from_secs(120));
        assert_eq!(config.otp_cooldown(), Duration::from_secs(5));
    }

    #[test]
    fn cookie_secure_follows_frontend_scheme() {
        assert!(!config().cookie_secure());

        let https = AuthConfig::new(
            SecretString::from("test-secret"),
            "https://resona.dev".to_string(),
        );
        assert!(https.cookie_secure());
    }

    #[test]
    fn auth_state_exposes_store_and_limiter() {
        let state = AuthState::new(
            config(),
            Arc::new(InMemoryOtpStore::new()),
            Arc::new(NoopRateLimiter),
        );
        assert!(state.otp_store().get("nobody@x.com").is_none());
        assert_eq!(state.config().frontend_base_url(), "http://localhost:5173");
    }
}
