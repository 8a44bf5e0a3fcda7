//! Shared harness: a wiremock server standing in for the open platform and
//! a broadcaster that records what it was asked to push.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gateway::config::{AppCredentials, Config};
use gateway::notification::pusher::Broadcaster;
use gateway::AppState;

pub const BASE_ID: &str = "bascnLeads";
pub const TABLE_ID: &str = "tblLeads";
pub const NONCE: &str = "test-nonce";

pub fn test_config(server: &MockServer) -> Config {
    Config {
        port: 0,
        api_base: format!("{}/open-apis", server.uri()),
        messaging: AppCredentials::new("cli_msg", "msg-secret"),
        base: AppCredentials::new("cli_base", "base-secret"),
        noncestr: NONCE.to_string(),
        upstream_timeout: Duration::from_secs(2),
        pusher: None,
        pusher_channel: "leads-channel".to_string(),
        pusher_event: "record-changed".to_string(),
        watched_tables: vec![TABLE_ID.to_string()],
    }
}

/// Keeps every trigger call; optionally fails them all.
#[derive(Default)]
pub struct RecordingBroadcaster {
    pub calls: Mutex<Vec<(String, String, Value)>>,
    pub fail: bool,
}

impl RecordingBroadcaster {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn trigger(&self, channel: &str, event: &str, data: &Value) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((channel.to_string(), event.to_string(), data.clone()));
        if self.fail {
            anyhow::bail!("pusher returned 500");
        }
        Ok(())
    }
}

pub struct Harness {
    pub server: MockServer,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub state: Arc<AppState>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::with_broadcaster(RecordingBroadcaster::default()).await
    }

    pub async fn with_broadcaster(broadcaster: RecordingBroadcaster) -> Self {
        let server = MockServer::start().await;
        Self::with_config(server, |_| {}, broadcaster)
    }

    pub fn with_config(
        server: MockServer,
        tweak: impl FnOnce(&mut Config),
        broadcaster: RecordingBroadcaster,
    ) -> Self {
        let mut cfg = test_config(&server);
        tweak(&mut cfg);
        let broadcaster = Arc::new(broadcaster);
        let state = AppState::with_broadcaster(cfg, broadcaster.clone()).unwrap();
        Self {
            server,
            broadcaster,
            state: Arc::new(state),
        }
    }

    /// Send one request through the full router.
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = gateway::api::app(self.state.clone())
            .oneshot(req.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    /// Answer tenant token exchanges with `token`, expecting `times` calls.
    pub async fn mock_tenant_token(&self, token: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "msg": "ok",
                "tenant_access_token": token,
                "expire": 7200
            })))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    pub fn table_path(&self, suffix: &str) -> String {
        format!("/open-apis/bitable/v1/apps/{}/tables/{}/{}", BASE_ID, TABLE_ID, suffix)
    }
}

pub fn provider_ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "success", "data": data }))
}
