//! Response envelopes.
//!
//! Two shapes meet here: the provider's `{code, msg, data}` envelope coming
//! back from the open platform, and the gateway's own `{code, msg, data}`
//! envelope going out to the browser client. They look alike but differ in
//! meaning: the provider's codes are passed through only as messages, the
//! gateway only ever answers `0` or `-1`.

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Gateway-side envelope: `{code: 0, msg: "ok", data}` or `{code: -1, msg}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn fail(msg: impl Into<String>) -> Self {
        Self {
            code: -1,
            msg: msg.into(),
            data: None,
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// Wrap a handler's payload in the success envelope.
pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

/// Provider-side envelope used by every open-platform endpoint.
#[derive(Debug, Deserialize)]
pub struct ProviderEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

impl<T> ProviderEnvelope<T> {
    /// `code == 0` yields the (possibly absent) data; anything else becomes
    /// a provider error carrying `msg`, or `fallback` when `msg` is empty.
    pub fn into_result(self, fallback: &str) -> Result<Option<T>, AppError> {
        if self.code == 0 {
            Ok(self.data)
        } else if self.msg.is_empty() {
            Err(AppError::Provider(fallback.to_string()))
        } else {
            Err(AppError::Provider(self.msg))
        }
    }
}

/// Token-exchange responses put the token at the top level, not under `data`.
#[derive(Debug, Deserialize)]
pub struct TokenEnvelope {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub tenant_access_token: Option<String>,
    pub app_access_token: Option<String>,
    /// Lifetime in seconds.
    pub expire: Option<u64>,
}
