use std::fmt;
use std::time::Duration;

use anyhow::Context;

use crate::cache::Identity;

pub const DEFAULT_PORT: u16 = 8989;
pub const DEFAULT_API_BASE: &str = "https://open.larksuite.com/open-apis";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// An app ID / app secret pair registered with the open platform.
#[derive(Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_secret: String,
}

impl AppCredentials {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
        }
    }
}

// Never print the secret.
impl fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"****")
            .finish()
    }
}

#[derive(Clone)]
pub struct PusherConfig {
    pub app_id: String,
    pub key: String,
    pub secret: String,
    pub cluster: String,
}

impl fmt::Debug for PusherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PusherConfig")
            .field("app_id", &self.app_id)
            .field("key", &self.key)
            .field("secret", &"****")
            .field("cluster", &self.cluster)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Open platform API root, without a trailing slash.
    pub api_base: String,
    /// Auth, JSAPI signing, messaging and contacts.
    pub messaging: AppCredentials,
    /// Base (bitable) record operations.
    pub base: AppCredentials,
    /// Pre-shared nonce for JSAPI signatures.
    pub noncestr: String,
    pub upstream_timeout: Duration,
    /// `None` disables real-time broadcasts.
    pub pusher: Option<PusherConfig>,
    pub pusher_channel: String,
    pub pusher_event: String,
    /// Tables whose record-change webhooks are broadcast.
    pub watched_tables: Vec<String>,
}

impl Config {
    pub fn credentials(&self, identity: Identity) -> &AppCredentials {
        match identity {
            Identity::Messaging => &self.messaging,
            Identity::Base => &self.base,
        }
    }

    pub fn is_watched_table(&self, table_id: &str) -> bool {
        self.watched_tables.iter().any(|t| t == table_id)
    }

    /// Build from an arbitrary variable lookup. `load()` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).with_context(|| format!("{} must be set", key))
        };

        let port = match get("PORT") {
            Some(p) => p.parse().with_context(|| format!("PORT is not a valid port: {}", p))?,
            None => DEFAULT_PORT,
        };

        let api_base = get("LARK_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let parsed = url::Url::parse(&api_base)
            .with_context(|| format!("LARK_API_BASE is not a valid URL: {}", api_base))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("LARK_API_BASE must be an http(s) URL, got {}", api_base);
        }
        let api_base = api_base.trim_end_matches('/').to_string();

        let upstream_timeout = match get("UPSTREAM_TIMEOUT_SECS") {
            Some(v) => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => anyhow::bail!("UPSTREAM_TIMEOUT_SECS must be a positive integer, got {}", v),
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let pusher = match (get("PUSHER_APP_ID"), get("PUSHER_KEY"), get("PUSHER_SECRET")) {
            (Some(app_id), Some(key), Some(secret)) => Some(PusherConfig {
                app_id,
                key,
                secret,
                cluster: get("PUSHER_CLUSTER").unwrap_or_else(|| "ap1".to_string()),
            }),
            (None, None, None) => None,
            _ => anyhow::bail!(
                "PUSHER_APP_ID, PUSHER_KEY and PUSHER_SECRET must be set together"
            ),
        };

        Ok(Config {
            port,
            api_base,
            messaging: AppCredentials::new(require("LARK_APP_ID")?, require("LARK_APP_SECRET")?),
            base: AppCredentials::new(
                require("LARK_BASE_APP_ID")?,
                require("LARK_BASE_APP_SECRET")?,
            ),
            noncestr: require("LARK_NONCESTR")?,
            upstream_timeout,
            pusher,
            pusher_channel: get("PUSHER_CHANNEL").unwrap_or_else(|| "leads-channel".to_string()),
            pusher_event: get("PUSHER_EVENT").unwrap_or_else(|| "record-changed".to_string()),
            watched_tables: get("WEBHOOK_TABLE_IDS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        })
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    Config::from_lookup(|key| std::env::var(key).ok())
}
