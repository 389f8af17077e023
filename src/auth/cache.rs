//! Memoized authenticator
//!
//! A cache belongs to one client or stream. The cached authenticator is
//! replaced wholesale when its token expires, never mutated, so holders of
//! the old `Arc` keep a consistent (if stale) view.

use super::authenticator::Authenticator;
use super::selector::{select_authenticator, AuthContext};
use crate::config::AuthConfig;
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Holds the active authenticator for one client
#[derive(Debug, Default)]
pub struct AuthenticatorCache {
    ctx: AuthContext,
    current: RwLock<Option<Arc<Authenticator>>>,
}

impl AuthenticatorCache {
    /// Create an empty cache
    pub fn new(ctx: AuthContext) -> Self {
        Self {
            ctx,
            current: RwLock::new(None),
        }
    }

    /// Collaborators used when (re)selecting
    pub fn context(&self) -> &AuthContext {
        &self.ctx
    }

    /// Return the cached authenticator, selecting a new one if none is
    /// cached or the cached one's token has expired.
    ///
    /// Concurrent callers that find an expired token wait for a single
    /// reselection instead of each refreshing.
    ///
    /// The write lock is held across reselection, including the OAuth2
    /// token request. While a refresh is in flight every other `get`,
    /// [`current`](Self::current) and [`clear`](Self::clear) on this cache
    /// waits for it to finish, so a slow token endpoint stalls all readers.
    pub async fn get(&self, config: &AuthConfig) -> Result<Arc<Authenticator>> {
        // Fast path
        {
            let current = self.current.read().await;
            if let Some(auth) = current.as_ref() {
                if auth.is_token_valid() {
                    return Ok(Arc::clone(auth));
                }
            }
        }

        let mut current = self.current.write().await;

        // Double-check after acquiring write lock (another task might have refreshed)
        if let Some(auth) = current.as_ref() {
            if auth.is_token_valid() {
                return Ok(Arc::clone(auth));
            }
            debug!(auth_method = %auth.method(), "Cached token expired; reselecting authenticator");
        }

        let auth = Arc::new(select_authenticator(config, &self.ctx).await?);
        *current = Some(Arc::clone(&auth));
        Ok(auth)
    }

    /// The cached authenticator, without validity checks
    pub async fn current(&self) -> Option<Arc<Authenticator>> {
        self.current.read().await.clone()
    }

    /// Drop the cached authenticator so the next `get` reselects
    pub async fn clear(&self) {
        let mut current = self.current.write().await;
        *current = None;
    }
}

/// Memoized, auto-refreshing authenticator lookup
pub async fn get_authenticator(
    config: &AuthConfig,
    cache: &AuthenticatorCache,
) -> Result<Arc<Authenticator>> {
    cache.get(config).await
}
