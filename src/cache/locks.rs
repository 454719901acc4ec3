//! Build locks
//!
//! A build lock is a persisted cache key whose presence means a build ran
//! (or is running) and may have left containers behind. Its value is a
//! fingerprint of the steps and tool version, so an identical build can be
//! skipped. Locks are only ever cleared after the runtime confirms the
//! project has no containers at all.

use crate::cache::store::{CacheStore, SetOptions};
use crate::error::BerthResult;
use crate::orchestration::{ContainerRuntime, ListOptions};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Fingerprint a set of build steps for a tool version (first 12 hex chars)
pub fn fingerprint(steps: &[String], version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(version.as_bytes());
    for step in steps {
        hasher.update([0u8]);
        hasher.update(step.as_bytes());
    }
    let result = hasher.finalize();
    hex::encode(&result[..6])
}

/// Whether the lock at `key` holds exactly `fingerprint`
pub async fn is_current(cache: &CacheStore, key: &str, fingerprint: &str) -> bool {
    cache.get::<String>(key).await.as_deref() == Some(fingerprint)
}

/// Record a lock; it never expires on its own
pub async fn record(cache: &CacheStore, key: &str, fingerprint: &str) -> BerthResult<()> {
    cache.set(key, fingerprint, SetOptions::durable()).await?;
    debug!("Recorded build lock {} ({})", key, fingerprint);
    Ok(())
}

/// Remove `keys` if, and only if, the runtime reports zero containers for `project`
///
/// Returns whether the locks were removed.
pub async fn purge_if_idle(
    cache: &CacheStore,
    engine: &dyn ContainerRuntime,
    project: &str,
    keys: &[&str],
) -> BerthResult<bool> {
    let containers = engine
        .list(&ListOptions {
            all: true,
            project: Some(project.to_string()),
        })
        .await?;

    if !containers.is_empty() {
        debug!(
            "Keeping build locks for {}: {} container(s) still exist",
            project,
            containers.len()
        );
        return Ok(false);
    }

    for key in keys {
        cache.remove(key).await?;
    }
    info!("Removed build locks for {}", project);
    Ok(true)
}
