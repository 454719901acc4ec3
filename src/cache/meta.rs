//! Per-app metadata cache
//!
//! Records the tool version an app was last built against so a later pass
//! can advise a rebuild after an upgrade.

use crate::cache::keys::AppCacheKeys;
use crate::cache::store::{CacheStore, SetOptions};
use crate::error::BerthResult;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Placeholder recorded when containers exist but the build version is unknown
pub const UNKNOWN_BUILT_AGAINST: &str = "unknown";

/// Persisted app metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMeta {
    /// Tool version the app was last built against
    pub built_against: Option<String>,
}

impl AppMeta {
    /// Load metadata, falling back to empty metadata on a miss
    pub async fn load(cache: &CacheStore, keys: &AppCacheKeys) -> Self {
        cache.get(&keys.meta).await.unwrap_or_default()
    }

    /// Record `version` as the built-against version and persist it
    pub async fn record_built_against(
        &mut self,
        cache: &CacheStore,
        keys: &AppCacheKeys,
        version: &str,
    ) -> BerthResult<()> {
        self.built_against = Some(version.to_string());
        cache.set(&keys.meta, &*self, SetOptions::persistent()).await?;
        debug!("Recorded built against {}", version);
        Ok(())
    }

    /// Whether a rebuild should be suggested when running `version`
    pub fn needs_rebuild(&self, version: &str) -> bool {
        self.built_against.as_deref().is_some_and(|v| v != version)
    }
}
