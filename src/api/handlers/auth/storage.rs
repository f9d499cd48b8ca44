//! Database helpers for accounts and the refresh-token ledger.

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use super::tokens::{generate_refresh_token, hash_refresh_token};
use super::utils::is_unique_violation;

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub(super) enum RegisterOutcome {
    Created(UserRecord),
    Conflict,
}

/// Account row as the auth flows need it.
#[derive(Debug, Clone)]
pub(super) struct UserRecord {
    pub(super) id: Uuid,
    pub(super) email: String,
    pub(super) password_hash: Option<String>,
    pub(super) display_name: Option<String>,
    pub(super) role: String,
    pub(super) google_id: Option<String>,
}

/// Result of a successful refresh rotation: the owning user plus the
/// raw replacement token for the cookie.
#[derive(Debug)]
pub(super) struct RotatedSession {
    pub(super) user_id: Uuid,
    pub(super) email: String,
    pub(super) display_name: Option<String>,
    pub(super) role: String,
    pub(super) refresh_token: String,
}

const USER_COLUMNS: &str = "id, email, password_hash, display_name, role, google_id";

fn user_from_row(row: &PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        display_name: row.get("display_name"),
        role: row.get("role"),
        google_id: row.get("google_id"),
    }
}

pub(super) async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;
    Ok(row.as_ref().map(user_from_row))
}

pub(super) async fn insert_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    display_name: Option<&str>,
) -> Result<RegisterOutcome> {
    let query = format!(
        r"
        INSERT INTO users (email, password_hash, display_name)
        VALUES ($1, $2, $3)
        RETURNING {USER_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(RegisterOutcome::Created(user_from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(RegisterOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Issue a fresh refresh token for the user: generate a random value,
/// store only its hash, and return the raw value for the cookie.
pub(super) async fn issue_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    let query = r"
        INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_refresh_token()?;
        let token_hash = hash_refresh_token(&token);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert refresh token"),
        }
    }

    Err(anyhow!("failed to generate unique refresh token"))
}

/// Rotate a presented refresh token: revoke it and insert its replacement
/// in one transaction. Returns `None` when the presented token is unknown,
/// already revoked, or expired.
pub(super) async fn rotate_refresh_token(
    pool: &PgPool,
    presented_hash: &[u8],
    ttl_seconds: i64,
) -> Result<Option<RotatedSession>> {
    let mut tx = pool.begin().await.context("begin refresh rotation")?;

    let query = r"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE token_hash = $1
          AND revoked = FALSE
          AND expires_at > NOW()
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(presented_hash)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to revoke presented refresh token")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(None);
    };
    let user_id: Uuid = row.get("user_id");

    let query = "SELECT email, display_name, role FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to load user for rotation")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(None);
    };

    // A hash collision would abort the enclosing transaction, so unlike
    // issue_refresh_token this insert is not retried.
    let token = generate_refresh_token()?;
    let token_hash = hash_refresh_token(&token);
    let query = r"
        INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(token_hash)
        .bind(ttl_seconds)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert rotated refresh token")?;

    tx.commit().await.context("commit refresh rotation")?;

    Ok(Some(RotatedSession {
        user_id,
        email: row.get("email"),
        display_name: row.get("display_name"),
        role: row.get("role"),
        refresh_token: token,
    }))
}

pub(super) async fn revoke_refresh_token(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    // Logout is idempotent; revoking an unknown or already-revoked token is a no-op.
    let query = "UPDATE refresh_tokens SET revoked = TRUE WHERE token_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke refresh token")?;
    Ok(())
}

pub(super) async fn update_password(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET password_hash = $2, updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(())
}

/// Find the account for a federated login, linking or creating as needed.
/// An existing account with the same email is linked to the Google subject;
/// otherwise a passwordless account is created.
pub(super) async fn link_or_create_google_user(
    pool: &PgPool,
    email: &str,
    google_id: &str,
    display_name: Option<&str>,
) -> Result<UserRecord> {
    if let Some(mut user) = find_user_by_email(pool, email).await? {
        if user.google_id.is_none() {
            let query = r"
                UPDATE users
                SET google_id = $2, updated_at = NOW()
                WHERE id = $1
            ";
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "UPDATE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(user.id)
                .bind(google_id)
                .execute(pool)
                .instrument(span)
                .await
                .context("failed to link google subject")?;
            user.google_id = Some(google_id.to_string());
        }
        return Ok(user);
    }

    let query = format!(
        r"
        INSERT INTO users (email, display_name, google_id)
        VALUES ($1, $2, $3)
        RETURNING {USER_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .bind(display_name)
        .bind(google_id)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(user_from_row(&row)),
        Err(err) if is_unique_violation(&err) => {
            // Lost a race against a concurrent signup with the same email.
            find_user_by_email(pool, email)
                .await?
                .ok_or_else(|| anyhow!("user disappeared after unique violation"))
        }
        Err(err) => Err(err).context("failed to insert google user"),
    }
}

#[cfg(test)]
mod tests {
    use super::{RegisterOutcome, RotatedSession, UserRecord};
    use uuid::Uuid;

    #[test]
    fn register_outcome_conflict_debug_name() {
        assert_eq!(format!("{:?}", RegisterOutcome::Conflict), "Conflict");
    }

    #[test]
    fn user_record_holds_values() {
        let record = UserRecord {
            id: Uuid::nil(),
            email: "listener@example.com".to_string(),
            password_hash: Some("$argon2id$stub".to_string()),
            display_name: None,
            role: "LISTENER".to_string(),
            google_id: None,
        };
        assert_eq!(record.id, Uuid::nil());
        assert_eq!(record.email, "listener@example.com");
        assert_eq!(record.role, "LISTENER");
        assert!(record.google_id.is_none());
    }

    #[test]
    fn rotated_session_holds_values() {
        let rotated = RotatedSession {
            user_id: Uuid::nil(),
            email: "listener@example.com".to_string(),
            display_name: None,
            role: "LISTENER".to_string(),
            refresh_token: "raw-token".to_string(),
        };
        assert_eq!(rotated.user_id, Uuid::nil());
        assert_eq!(rotated.refresh_token, "raw-token");
    }
}
