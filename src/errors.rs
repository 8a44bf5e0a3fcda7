use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::envelope::ApiResponse;

#[derive(Debug, Error)]
pub enum AppError {
    /// A required input was missing or malformed. Raised before any upstream call.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    TokenAcquisition(String),

    #[error("{0}")]
    TicketAcquisition(String),

    /// Upstream answered with a non-zero application code.
    #[error("{0}")]
    Provider(String),

    /// Transport failure, timeout, or a body that is not a provider envelope.
    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    ContentFormat(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::TokenAcquisition(_) => "token_acquisition",
            AppError::TicketAcquisition(_) => "ticket_acquisition",
            AppError::Provider(_) => "provider",
            AppError::Network(_) => "network",
            AppError::ContentFormat(_) => "content_format",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Network("upstream request timed out".to_string())
        } else if e.is_connect() {
            AppError::Network(format!("upstream connection failed: {}", e))
        } else {
            AppError::Network(format!("upstream request failed: {}", e))
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::Internal(e) => {
                tracing::error!(kind = self.kind(), "Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            // Application-level outcomes always travel as HTTP 200 so the
            // browser client only has to inspect `code`.
            other => {
                tracing::info!(kind = other.kind(), error = %other, "request failed");
                (StatusCode::OK, other.to_string())
            }
        };

        (status, Json(ApiResponse::fail(msg))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_provider_error_keeps_message_verbatim() {
        let resp = AppError::Provider("invalid".into()).into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json, serde_json::json!({"code": -1, "msg": "invalid"}));
    }

    #[tokio::test]
    async fn test_internal_error_is_500_and_hides_details() {
        let resp = AppError::Internal(anyhow::anyhow!("secret detail")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["code"], -1);
        assert_eq!(json["msg"], "internal server error");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(AppError::validation("x").kind(), "validation");
        assert_eq!(AppError::ContentFormat("x".into()).kind(), "content_format");
    }
}
