//! Bearer token caching and refresh.
//!
//! The Target issues short-lived bearer tokens through a login call. The
//! manager keeps the last grant in a JSON file next to the runtime data and
//! refreshes it transparently when expired. Failure never panics and never
//! throws: a `None` token means no further Target work is possible this
//! cycle.
//!
//! The cache file is read-modify-write without coordination; a lost update
//! between concurrent refreshes only costs one extra login call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::gateway::TargetGateway;

/// A bearer credential with its expiry, as persisted in the cache file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    pub expiration: DateTime<Utc>,
}

impl TokenGrant {
    /// Whether the grant is still usable at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && now < self.expiration
    }
}

/// Caching token manager over a [`TargetGateway`]'s login call.
pub struct TokenManager<G> {
    gateway: Arc<G>,
    cache_path: PathBuf,
}

impl<G: TargetGateway> TokenManager<G> {
    /// Create a manager caching grants at `cache_path`.
    #[must_use]
    pub fn new(gateway: Arc<G>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            gateway,
            cache_path: cache_path.into(),
        }
    }

    /// Return a usable token: the cached one while unexpired, otherwise a
    /// freshly fetched grant. `None` on any failure.
    pub async fn get_token(&self) -> Option<String> {
        if let Some(grant) = self.read_cache() {
            if grant.is_valid_at(Utc::now()) {
                debug!("using cached token");
                return Some(grant.access_token);
            }
        }
        self.refresh().await
    }

    /// Force a login call, persisting and returning the new grant's token.
    /// `None` on any failure.
    pub async fn refresh(&self) -> Option<String> {
        match self.gateway.login().await {
            Ok(Some(grant)) => {
                if let Err(error) = self.write_cache(&grant) {
                    // A stale cache only costs an extra login next run.
                    warn!(%error, "failed to persist token cache");
                }
                info!(expiration = %grant.expiration, "token refreshed");
                Some(grant.access_token)
            }
            Ok(None) => {
                warn!("login rejected: not authenticated");
                None
            }
            Err(error) => {
                warn!(%error, "login call failed");
                None
            }
        }
    }

    fn read_cache(&self) -> Option<TokenGrant> {
        let raw = std::fs::read_to_string(&self.cache_path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    fn write_cache(&self, grant: &TokenGrant) -> std::io::Result<()> {
        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(grant).unwrap_or_default();
        std::fs::write(&self.cache_path, json)
    }

    /// Path of the cache file.
    #[must_use]
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }
}
