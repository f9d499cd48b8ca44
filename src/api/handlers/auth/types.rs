//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body fallback for clients that cannot send the refresh cookie.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
}

/// Successful register/login/refresh payload. The access token is also
/// set as a cookie; the body copy serves non-browser clients.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub access_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OtpVerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PasswordResetRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct GoogleLoginRequest {
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use serde_json::json;

    #[test]
    fn register_request_round_trips() -> Result<()> {
        let request = RegisterRequest {
            email: "alice@example.com".to_string(),
            password: "correct horse".to_string(),
            display_name: Some("Alice".to_string()),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "alice@example.com");
        let decoded: RegisterRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.display_name.as_deref(), Some("Alice"));
        Ok(())
    }

    #[test]
    fn refresh_request_tolerates_missing_token() -> Result<()> {
        let decoded: RefreshRequest = serde_json::from_value(json!({}))?;
        assert!(decoded.refresh_token.is_none());
        Ok(())
    }

    #[test]
    fn auth_response_round_trips() -> Result<()> {
        let response = AuthResponse {
            user: UserProfile {
                id: "00000000-0000-0000-0000-000000000000".to_string(),
                email: "bob@example.com".to_string(),
                display_name: None,
                role: "LISTENER".to_string(),
            },
            access_token: "jwt".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        let decoded: AuthResponse = serde_json::from_value(value)?;
        assert_eq!(decoded.user.email, "bob@example.com");
        assert_eq!(decoded.access_token, "jwt");
        Ok(())
    }

    #[test]
    fn otp_verify_request_round_trips() -> Result<()> {
        let request = OtpVerifyRequest {
            email: "carol@example.com".to_string(),
            code: "123456".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let decoded: OtpVerifyRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.code, "123456");
        Ok(())
    }
}
