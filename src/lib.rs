//! Leadhub Gateway: library crate for the binary and integration tests.
//!
//! A thin credential-injecting relay in front of the Lark open platform:
//! Base record CRUD, messaging, JSAPI signing, and webhook fan-out to Pusher.

use std::sync::Arc;

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod notification;
pub mod proxy;

use cache::{Identity, TokenCache};
use errors::AppError;
use notification::pusher::{Broadcaster, DisabledBroadcaster, PusherBroadcaster};
use proxy::upstream::UpstreamClient;

/// Shared application state passed to handlers.
pub struct AppState {
    pub config: config::Config,
    pub upstream: UpstreamClient,
    pub tokens: TokenCache,
    pub broadcaster: Arc<dyn Broadcaster>,
}

impl AppState {
    /// Build state from config, choosing the broadcaster from the Pusher block.
    pub fn new(config: config::Config) -> anyhow::Result<Self> {
        let broadcaster: Arc<dyn Broadcaster> = match &config.pusher {
            Some(p) => Arc::new(PusherBroadcaster::new(p, config.upstream_timeout)?),
            None => {
                tracing::warn!("PUSHER_* not set, record-change broadcasts are disabled");
                Arc::new(DisabledBroadcaster)
            }
        };
        Self::with_broadcaster(config, broadcaster)
    }

    pub fn with_broadcaster(
        config: config::Config,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> anyhow::Result<Self> {
        let upstream = UpstreamClient::new(&config.api_base, config.upstream_timeout)?;
        Ok(Self {
            config,
            upstream,
            tokens: TokenCache::new(),
            broadcaster,
        })
    }

    /// Tenant token for `identity`, from cache or freshly exchanged.
    pub async fn tenant_token(&self, identity: Identity) -> Result<String, AppError> {
        let creds = self.config.credentials(identity);
        self.tokens
            .get_or_refresh(identity, || self.upstream.tenant_access_token(creds))
            .await
    }
}
