use crate::api::{
    self,
    handlers::{auth, billing::HttpPaymentGateway, billing::PaymentGateway},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub frontend_base_url: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub otp_ttl_seconds: u64,
    pub otp_cooldown_seconds: u64,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<SecretString>,
    pub payment_base_url: Option<String>,
    pub payment_api_key: Option<SecretString>,
    pub payment_callback_url: Option<String>,
    pub playback_poll_seconds: u64,
    pub playback_batch_size: usize,
    pub playback_max_attempts: u32,
    pub playback_backoff_base_seconds: u64,
    pub playback_backoff_max_seconds: u64,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if outbound HTTP clients cannot be built or the server
/// fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = auth::AuthConfig::new(args.jwt_secret, args.frontend_base_url)
        .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds)
        .with_otp_ttl_seconds(args.otp_ttl_seconds)
        .with_otp_cooldown_seconds(args.otp_cooldown_seconds);

    let identity: Option<Arc<dyn auth::IdentityVerifier>> =
        match (args.google_client_id, args.google_client_secret) {
            (Some(client_id), Some(client_secret)) => {
                let verifier = auth::GoogleIdentity::new(client_id, client_secret)
                    .context("Failed to build Google identity client")?;
                Some(Arc::new(verifier))
            }
            (None, None) => None,
            _ => anyhow::bail!(
                "Google sign-in needs both --google-client-id and --google-client-secret"
            ),
        };
    if identity.is_none() {
        info!("Google sign-in not configured, /v1/auth/google disabled");
    }

    let gateway: Option<Arc<dyn PaymentGateway>> =
        match (args.payment_base_url, args.payment_api_key) {
            (Some(base_url), Some(api_key)) => {
                let gateway =
                    HttpPaymentGateway::new(base_url, api_key, args.payment_callback_url)
                        .context("Failed to build payment gateway client")?;
                Some(Arc::new(gateway))
            }
            (None, None) => None,
            _ => anyhow::bail!(
                "Billing needs both --payment-base-url and --payment-api-key"
            ),
        };
    if gateway.is_none() {
        info!("Payment gateway not configured, /v1/billing disabled");
    }

    let playback_config = api::events::PlaybackWorkerConfig::new()
        .with_poll_interval_seconds(args.playback_poll_seconds)
        .with_batch_size(args.playback_batch_size)
        .with_max_attempts(args.playback_max_attempts)
        .with_backoff_base_seconds(args.playback_backoff_base_seconds)
        .with_backoff_max_seconds(args.playback_backoff_max_seconds);

    api::new(
        args.port,
        args.dsn,
        auth_config,
        identity,
        gateway,
        playback_config,
    )
    .await
}
