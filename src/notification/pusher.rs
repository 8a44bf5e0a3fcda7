use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use md5::Md5;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::PusherConfig;

/// Real-time fan-out to connected browsers.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Publish `data` as `event` on `channel`.
    async fn trigger(&self, channel: &str, event: &str, data: &serde_json::Value) -> Result<()>;
}

// ── Request Signing ──────────────────────────────────────────

/// Lowercase hex HMAC-SHA256 of `payload` under `secret`.
fn hmac_sha256_hex(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid HMAC key: {}", e))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn md5_hex(body: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

/// Query string for a signed `POST /apps/{app_id}/events`, including
/// `auth_signature`. Parameters are in the sorted order the signature
/// is computed over.
fn signed_query(
    app_id: &str,
    key: &str,
    secret: &str,
    timestamp: i64,
    body: &[u8],
) -> Result<Vec<(&'static str, String)>> {
    let mut params = vec![
        ("auth_key", key.to_string()),
        ("auth_timestamp", timestamp.to_string()),
        ("auth_version", "1.0".to_string()),
        ("body_md5", md5_hex(body)),
    ];
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    let to_sign = format!("POST\n/apps/{}/events\n{}", app_id, query);
    params.push(("auth_signature", hmac_sha256_hex(secret, to_sign.as_bytes())?));
    Ok(params)
}

#[derive(Serialize)]
struct TriggerBody<'a> {
    name: &'a str,
    channels: [&'a str; 1],
    /// Pusher wants the event payload as a JSON string.
    data: String,
}

// ── Pusher ───────────────────────────────────────────────────

/// Pusher Channels REST client. One attempt per event, no retry.
#[derive(Clone)]
pub struct PusherBroadcaster {
    client: reqwest::Client,
    app_id: String,
    key: String,
    secret: String,
    endpoint: String,
}

impl PusherBroadcaster {
    pub fn new(cfg: &PusherConfig, timeout: Duration) -> Result<Self> {
        let endpoint = format!("https://api-{}.pusher.com", cfg.cluster);
        Self::with_endpoint(cfg, &endpoint, timeout)
    }

    /// Point at a non-default host (self-hosted relay, test server).
    pub fn with_endpoint(cfg: &PusherConfig, endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent("Leadhub-Gateway/1.0")
                .build()
                .context("failed to build broadcaster HTTP client")?,
            app_id: cfg.app_id.clone(),
            key: cfg.key.clone(),
            secret: cfg.secret.clone(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Broadcaster for PusherBroadcaster {
    async fn trigger(&self, channel: &str, event: &str, data: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_vec(&TriggerBody {
            name: event,
            channels: [channel],
            data: data.to_string(),
        })?;
        let query = signed_query(
            &self.app_id,
            &self.key,
            &self.secret,
            chrono::Utc::now().timestamp(),
            &body,
        )?;

        let url = format!("{}/apps/{}/events", self.endpoint, self.app_id);
        let resp = self
            .client
            .post(&url)
            .query(&query)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .context("failed to reach broadcaster")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("broadcaster returned error: status={}, body={}", status, body);
        }

        info!(channel, event, "broadcast delivered");
        Ok(())
    }
}

/// Used when no broadcaster credentials are configured.
#[derive(Debug, Clone, Default)]
pub struct DisabledBroadcaster;

#[async_trait]
impl Broadcaster for DisabledBroadcaster {
    async fn trigger(&self, channel: &str, event: &str, _data: &serde_json::Value) -> Result<()> {
        debug!(channel, event, "no broadcaster configured, dropping event");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────
