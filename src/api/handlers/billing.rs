//! Subscription billing.
//!
//! Checkout prices the requested plan server-side, creates a session at the
//! payment gateway, and records a PENDING transaction. After the gateway
//! redirects back, the frontend calls verify: a captured payment marks the
//! transaction COMPLETED and extends the subscription by 30 days, anything
//! else marks it FAILED. Verification is idempotent for transactions that
//! already completed. The provider lives behind [`PaymentGateway`] so tests
//! can stub it.

use anyhow::{Context, Result, anyhow};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::error;
use ulid::Ulid;
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::AuthState;
use super::auth::principal::require_auth;

const CURRENCY: &str = "USD";

/// Monthly plans and their prices in cents. Every captured payment extends
/// the subscription by 30 days; the tiers differ in features, not duration.
const PLANS: &[(&str, i64)] = &[("premium", 499), ("family", 799)];

fn plan_price_cents(plan: &str) -> Option<i64> {
    PLANS
        .iter()
        .find(|(name, _)| *name == plan)
        .map(|(_, cents)| *cents)
}

fn new_reference_id() -> String {
    format!("res_{}", Ulid::new())
}

/// A checkout session created at the gateway.
#[derive(Clone, Debug)]
pub struct CheckoutSession {
    pub checkout_url: String,
}

/// Gateway verdict for a reference id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    Captured,
    Declined,
}

/// Payment provider seam. Checkout asks for a hosted payment page; verify
/// asks whether the reference was paid.
pub trait PaymentGateway: Send + Sync {
    fn create_checkout<'a>(
        &'a self,
        reference_id: &'a str,
        amount_cents: i64,
        currency: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CheckoutSession>> + Send + 'a>>;

    fn verify<'a>(
        &'a self,
        reference_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<PaymentStatus>> + Send + 'a>>;
}

/// Live gateway speaking the provider's HTTP API with an `x-api-key` header.
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    api_key: SecretString,
    callback_url: Option<String>,
}

impl HttpPaymentGateway {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: String,
        api_key: SecretString,
        callback_url: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build payment gateway http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            callback_url,
        })
    }

    async fn create(
        &self,
        reference_id: &str,
        amount_cents: i64,
        currency: &str,
    ) -> Result<CheckoutSession> {
        let mut body = serde_json::json!({
            "reference_id": reference_id,
            "amount_cents": amount_cents,
            "currency": currency,
        });
        if let Some(callback_url) = &self.callback_url {
            body["callback_url"] = Value::from(callback_url.as_str());
        }

        let response = self
            .client
            .post(format!("{}/external/create-request", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("payment gateway checkout request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "payment gateway checkout failed: {}",
                response.status()
            ));
        }

        let json_response: Value = response
            .json()
            .await
            .context("payment gateway checkout response was not json")?;
        let checkout_url = json_response
            .get("checkout_url")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("payment gateway response missing checkout_url"))?;
        Ok(CheckoutSession {
            checkout_url: checkout_url.to_string(),
        })
    }

    async fn verify_reference(&self, reference_id: &str) -> Result<PaymentStatus> {
        let response = self
            .client
            .get(format!("{}/external/verify-reference", self.base_url))
            .query(&[("reference_id", reference_id)])
            .header("x-api-key", self.api_key.expose_secret())
            .send()
            .await
            .context("payment gateway verify request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "payment gateway verify failed: {}",
                response.status()
            ));
        }

        let json_response: Value = response
            .json()
            .await
            .context("payment gateway verify response was not json")?;
        // Providers answer either {"status": "SUCCESS"} or {"received": true}.
        let captured = json_response.get("status").and_then(Value::as_str) == Some("SUCCESS")
            || json_response.get("received").and_then(Value::as_bool) == Some(true);
        Ok(if captured {
            PaymentStatus::Captured
        } else {
            PaymentStatus::Declined
        })
    }
}

impl PaymentGateway for HttpPaymentGateway {
    fn create_checkout<'a>(
        &'a self,
        reference_id: &'a str,
        amount_cents: i64,
        currency: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CheckoutSession>> + Send + 'a>> {
        Box::pin(self.create(reference_id, amount_cents, currency))
    }

    fn verify<'a>(
        &'a self,
        reference_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<PaymentStatus>> + Send + 'a>> {
        Box::pin(self.verify_reference(reference_id))
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub plan: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub reference_id: String,
    pub checkout_url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyRequest {
    pub reference_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    pub status: String,
}

#[utoipa::path(
    post,
    path = "/v1/billing/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout session created.", body = CheckoutResponse),
        (status = 400, description = "Unknown plan.", body = String),
        (status = 401, description = "Missing or invalid access token."),
        (status = 502, description = "Payment gateway error.", body = String),
        (status = 503, description = "Billing not configured.", body = String),
    ),
    tag = "billing"
)]
/// Starts a subscription payment. Prices come from the server-side plan
/// table; the client only names the plan.
pub async fn checkout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    gateway: Extension<Option<Arc<dyn PaymentGateway>>>,
    Json(payload): Json<CheckoutRequest>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, auth_state.config()) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let plan = payload.plan.trim().to_lowercase();
    let Some(amount_cents) = plan_price_cents(&plan) else {
        return (StatusCode::BAD_REQUEST, "Unknown plan.").into_response();
    };
    let Some(gateway) = gateway.0 else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Billing is not configured.").into_response();
    };

    let reference_id = new_reference_id();
    let session = match gateway
        .create_checkout(&reference_id, amount_cents, CURRENCY)
        .await
    {
        Ok(session) => session,
        Err(err) => {
            error!("Checkout creation failed at gateway: {err}");
            return (StatusCode::BAD_GATEWAY, "Payment gateway error.").into_response();
        }
    };

    if let Err(err) = insert_pending_transaction(
        &pool,
        principal.user_id,
        &reference_id,
        &plan,
        amount_cents,
    )
    .await
    {
        error!("Failed to record pending transaction: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        Json(CheckoutResponse {
            reference_id,
            checkout_url: session.checkout_url,
        }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/v1/billing/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Final transaction status.", body = VerifyResponse),
        (status = 400, description = "Missing reference id.", body = String),
        (status = 401, description = "Missing or invalid access token."),
        (status = 404, description = "Transaction not found.", body = String),
        (status = 502, description = "Payment gateway error.", body = String),
        (status = 503, description = "Billing not configured.", body = String),
    ),
    tag = "billing"
)]
/// Settles a transaction after the gateway redirect. Asking again about a
/// transaction that already completed answers COMPLETED without another
/// gateway round trip.
pub async fn verify(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    gateway: Extension<Option<Arc<dyn PaymentGateway>>>,
    Json(payload): Json<VerifyRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&headers, auth_state.config()) {
        return status.into_response();
    }

    let reference_id = payload.reference_id.trim();
    if reference_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "Reference id is required.").into_response();
    }

    let transaction = match fetch_transaction(&pool, reference_id).await {
        Ok(Some(transaction)) => transaction,
        Ok(None) => return (StatusCode::NOT_FOUND, "Transaction not found.").into_response(),
        Err(err) => {
            error!("Failed to load transaction: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if transaction.status == "COMPLETED" {
        return (
            StatusCode::OK,
            Json(VerifyResponse {
                status: "COMPLETED".to_string(),
            }),
        )
            .into_response();
    }

    let Some(gateway) = gateway.0 else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Billing is not configured.").into_response();
    };

    let status = match gateway.verify(reference_id).await {
        Ok(status) => status,
        Err(err) => {
            error!("Verification failed at gateway: {err}");
            return (StatusCode::BAD_GATEWAY, "Payment gateway error.").into_response();
        }
    };

    match status {
        PaymentStatus::Captured => {
            if let Err(err) =
                complete_transaction(&pool, reference_id, transaction.user_id, &transaction.plan)
                    .await
            {
                error!("Failed to apply completed payment: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            (
                StatusCode::OK,
                Json(VerifyResponse {
                    status: "COMPLETED".to_string(),
                }),
            )
                .into_response()
        }
        PaymentStatus::Declined => {
            if let Err(err) = fail_transaction(&pool, reference_id).await {
                error!("Failed to mark transaction failed: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            (
                StatusCode::OK,
                Json(VerifyResponse {
                    status: "FAILED".to_string(),
                }),
            )
                .into_response()
        }
    }
}

struct TransactionRow {
    user_id: Uuid,
    plan: String,
    status: String,
}

async fn insert_pending_transaction(
    pool: &PgPool,
    user_id: Uuid,
    reference_id: &str,
    plan: &str,
    amount_cents: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        INSERT INTO transactions (user_id, reference_id, plan, amount_cents, currency, status)
        VALUES ($1, $2, $3, $4, $5, 'PENDING')
        ",
    )
    .bind(user_id)
    .bind(reference_id)
    .bind(plan)
    .bind(amount_cents)
    .bind(CURRENCY)
    .execute(pool)
    .await?;
    Ok(())
}

async fn fetch_transaction(
    pool: &PgPool,
    reference_id: &str,
) -> Result<Option<TransactionRow>, sqlx::Error> {
    let row = sqlx::query("SELECT user_id, plan, status FROM transactions WHERE reference_id = $1")
        .bind(reference_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| TransactionRow {
        user_id: row.get("user_id"),
        plan: row.get("plan"),
        status: row.get("status"),
    }))
}

/// Marks the transaction COMPLETED and extends the subscription, atomically.
async fn complete_transaction(
    pool: &PgPool,
    reference_id: &str,
    user_id: Uuid,
    plan: &str,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        r"
        UPDATE transactions
        SET status = 'COMPLETED', updated_at = NOW()
        WHERE reference_id = $1
        ",
    )
    .bind(reference_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        r"
        INSERT INTO subscriptions (user_id, plan, status, started_at, expires_at)
        VALUES ($1, $2, 'ACTIVE', NOW(), NOW() + INTERVAL '30 days')
        ON CONFLICT (user_id) DO UPDATE SET
            plan = EXCLUDED.plan,
            status = 'ACTIVE',
            expires_at = NOW() + INTERVAL '30 days',
            updated_at = NOW()
        ",
    )
    .bind(user_id)
    .bind(plan)
    .execute(&mut *tx)
    .await?;
    tx.commit().await
}

async fn fail_transaction(pool: &PgPool, reference_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        UPDATE transactions
        SET status = 'FAILED', updated_at = NOW()
        WHERE reference_id = $1 AND status = 'PENDING'
        ",
    )
    .bind(reference_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::auth::{AuthConfig, AuthState, InMemoryOtpStore, NoopRateLimiter};
    use super::{
        CheckoutRequest, CheckoutSession, PaymentGateway, PaymentStatus, VerifyRequest, checkout,
        new_reference_id, plan_price_cents, verify,
    };
    use anyhow::Result;
    use axum::{
        Json,
        extract::Extension,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
    };
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;

    struct StaticGateway;

    impl PaymentGateway for StaticGateway {
        fn create_checkout<'a>(
            &'a self,
            reference_id: &'a str,
            _amount_cents: i64,
            _currency: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<CheckoutSession>> + Send + 'a>> {
            Box::pin(async move {
                Ok(CheckoutSession {
                    checkout_url: format!("https://pay.test/checkout/{reference_id}"),
                })
            })
        }

        fn verify<'a>(
            &'a self,
            _reference_id: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<PaymentStatus>> + Send + 'a>> {
            Box::pin(async { Ok(PaymentStatus::Captured) })
        }
    }

    fn test_auth_state() -> Arc<AuthState> {
        let config = AuthConfig::new(
            SecretString::from("unit-test-secret"),
            "http://localhost:5173".to_string(),
        );
        Arc::new(AuthState::new(
            config,
            Arc::new(InMemoryOtpStore::new()),
            Arc::new(NoopRateLimiter),
        ))
    }

    #[test]
    fn known_plans_have_positive_prices() {
        assert!(plan_price_cents("premium").is_some_and(|cents| cents > 0));
        assert!(plan_price_cents("family").is_some_and(|cents| cents > 0));
        assert!(plan_price_cents("free").is_none());
    }

    #[test]
    fn reference_ids_carry_the_service_prefix() {
        let reference_id = new_reference_id();
        assert!(reference_id.starts_with("res_"));
        // 26 characters of ulid after the prefix.
        assert_eq!(reference_id.len(), 30);
    }

    #[tokio::test]
    async fn gateway_trait_object_is_callable() -> Result<()> {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(StaticGateway);
        let session = gateway.create_checkout("res_1", 499, "USD").await?;
        assert_eq!(session.checkout_url, "https://pay.test/checkout/res_1");
        assert_eq!(gateway.verify("res_1").await?, PaymentStatus::Captured);
        Ok(())
    }

    #[tokio::test]
    async fn checkout_requires_auth() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = checkout(
            HeaderMap::new(),
            Extension(pool),
            Extension(test_auth_state()),
            Extension(None),
            Json(CheckoutRequest {
                plan: "premium".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn verify_requires_auth() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify(
            HeaderMap::new(),
            Extension(pool),
            Extension(test_auth_state()),
            Extension(None),
            Json(VerifyRequest {
                reference_id: "res_1".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
