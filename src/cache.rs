use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::errors::AppError;

/// Tokens are dropped this long before the provider says they expire.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// Which credential pair a call is made with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Auth, JSAPI tickets, messaging and contacts.
    Messaging,
    /// Base record operations.
    Base,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Messaging => f.pad("messaging"),
            Identity::Base => f.pad("base"),
        }
    }
}

/// A token as handed out by the provider.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Lifetime in seconds reported by the provider.
    pub expires_in: u64,
}

#[derive(Clone)]
pub(crate) struct CacheEntry {
    token: String,
    pub(crate) expires_at: Instant,
}

#[derive(Default)]
struct Slot {
    entry: RwLock<Option<CacheEntry>>,
    /// Held while a refresh is in flight so concurrent misses share it.
    refresh: Mutex<()>,
}

impl Slot {
    async fn fresh(&self) -> Option<String> {
        let entry = self.entry.read().await;
        entry
            .as_ref()
            .filter(|e| Instant::now() < e.expires_at)
            .map(|e| e.token.clone())
    }
}

/// In-memory tenant token cache, one slot per identity.
///
/// Lives for the whole process in `AppState`. A hit never touches the
/// refresh lock; a miss takes it, re-checks, and only then calls out, so a
/// burst of requests at expiry produces a single refresh.
#[derive(Default)]
pub struct TokenCache {
    messaging: Slot,
    base: Slot,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, identity: Identity) -> &Slot {
        match identity {
            Identity::Messaging => &self.messaging,
            Identity::Base => &self.base,
        }
    }

    /// The cached token for `identity`, if it has not expired.
    pub async fn cached(&self, identity: Identity) -> Option<String> {
        self.slot(identity).fresh().await
    }

    /// Return the cached token or run `refresh` to obtain a new one.
    ///
    /// Errors from `refresh` are returned as-is and leave the slot untouched.
    pub async fn get_or_refresh<F, Fut>(&self, identity: Identity, refresh: F) -> Result<String, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IssuedToken, AppError>>,
    {
        let slot = self.slot(identity);
        if let Some(token) = slot.fresh().await {
            return Ok(token);
        }

        let _guard = slot.refresh.lock().await;
        // Someone else may have refreshed while we waited for the lock.
        if let Some(token) = slot.fresh().await {
            return Ok(token);
        }

        let issued = refresh().await?;
        let ttl = Duration::from_secs(issued.expires_in).saturating_sub(EXPIRY_MARGIN);
        *slot.entry.write().await = Some(CacheEntry {
            token: issued.token.clone(),
            expires_at: Instant::now() + ttl,
        });
        tracing::debug!(%identity, ttl_secs = ttl.as_secs(), "tenant token refreshed");

        Ok(issued.token)
    }
}
