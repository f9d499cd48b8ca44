use axum::response::IntoResponse;

/// Plain banner on `/`; answers without touching the database.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::root;
    use axum::{http::StatusCode, response::IntoResponse};

    #[tokio::test]
    async fn banner_names_the_service() {
        let response = root().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap_or_default();
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with(env!("CARGO_PKG_NAME")));
    }
}
