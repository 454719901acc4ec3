//! Key/value cache with optional expiry and optional persistence
//!
//! Every entry lives in an in-memory map. Entries written with
//! `persist = true` are also mirrored to `<dir>/<key>.json` and are the only
//! ones that survive a restart. A persisted file that cannot be parsed is
//! treated as a miss.

use crate::error::{BerthError, BerthResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

/// A single cached value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    /// Cache key
    pub key: String,

    /// Stored payload
    pub value: Value,

    /// When the entry stops being valid
    pub expires_at: Option<DateTime<Utc>>,

    /// Whether the entry is mirrored to disk
    pub persist: bool,
}

impl CacheEntry {
    /// Check if entry is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

/// When a stored entry stops being valid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Expiry {
    /// Use the store's default TTL, if any
    #[default]
    StoreDefault,
    /// Expire after the given duration
    After(Duration),
    /// Never expire, regardless of the store default
    Never,
}

/// Options for [`CacheStore::set`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    pub expiry: Expiry,

    /// Mirror the entry to disk
    pub persist: bool,
}

impl SetOptions {
    /// In-memory entry using the store's default TTL
    pub fn memory() -> Self {
        Self::default()
    }

    /// Entry mirrored to disk, subject to the store's default TTL
    pub fn persistent() -> Self {
        Self {
            expiry: Expiry::StoreDefault,
            persist: true,
        }
    }

    /// Entry mirrored to disk that only an explicit `remove` deletes
    pub fn durable() -> Self {
        Self {
            expiry: Expiry::Never,
            persist: true,
        }
    }

    /// Override the TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expiry = Expiry::After(ttl);
        self
    }
}

/// Cache store backed by memory and an optional on-disk mirror
pub struct CacheStore {
    dir: PathBuf,
    default_ttl: Option<Duration>,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl CacheStore {
    /// Create a store persisting into `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            default_ttl: None,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Set the TTL for `Expiry::StoreDefault` entries (zero disables expiry)
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    /// Directory persisted entries are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the persisted file for `key`
    pub fn path_for(&self, key: &str) -> BerthResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }

    /// Whether a persisted file exists for `key`, without reading it
    pub fn exists_on_disk(&self, key: &str) -> bool {
        self.path_for(key).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Store a value
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        opts: SetOptions,
    ) -> BerthResult<()> {
        let path = self.path_for(key)?;
        let ttl = match opts.expiry {
            Expiry::StoreDefault => self.default_ttl,
            Expiry::After(ttl) => Some(ttl),
            Expiry::Never => None,
        };
        let expires_at = match ttl {
            Some(ttl) => Some(
                Utc::now()
                    + chrono::Duration::from_std(ttl)
                        .map_err(|e| BerthError::Internal(format!("invalid cache ttl: {}", e)))?,
            ),
            None => None,
        };

        let entry = CacheEntry {
            key: key.to_string(),
            value: serde_json::to_value(value)?,
            expires_at,
            persist: opts.persist,
        };

        if opts.persist {
            fs::create_dir_all(&self.dir).await.map_err(|e| {
                BerthError::io(format!("creating cache directory {}", self.dir.display()), e)
            })?;
            let content = serde_json::to_string_pretty(&entry)?;
            fs::write(&path, content)
                .await
                .map_err(|e| BerthError::io(format!("writing cache file {}", path.display()), e))?;
            debug!("Set cache key {} on disk at {}", key, path.display());
        } else {
            debug!("Set cache key {} in memory", key);
        }

        self.write_entries().insert(key.to_string(), entry);
        Ok(())
    }

    /// Get the raw value for `key`
    pub async fn get_value(&self, key: &str) -> Option<Value> {
        self.entry(key).await.map(|e| e.value)
    }

    /// Get and deserialize the value for `key`
    ///
    /// A value that does not deserialize into `T` counts as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key).await?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Ignoring malformed cache entry {}: {}", key, e);
                None
            }
        }
    }

    /// Check if a live entry exists for `key`
    pub async fn has(&self, key: &str) -> bool {
        self.entry(key).await.is_some()
    }

    /// Remove `key` from memory and disk, returning whether anything was removed
    pub async fn remove(&self, key: &str) -> BerthResult<bool> {
        let path = self.path_for(key)?;
        let in_memory = self.write_entries().remove(key).is_some();

        let on_disk = if path.exists() {
            fs::remove_file(&path)
                .await
                .map_err(|e| BerthError::io(format!("removing cache file {}", path.display()), e))?;
            debug!("Removed cache file {}", path.display());
            true
        } else {
            false
        };

        Ok(in_memory || on_disk)
    }

    /// Drop every in-memory entry; persisted files are untouched
    fn flush_memory(&self) {
        self.write_entries().clear();
    }

    /// Remove every persisted file and in-memory entry
    pub async fn clear(&self) -> BerthResult<usize> {
        self.flush_memory();

        if !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| BerthError::io("reading cache directory", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BerthError::io("reading cache entry", e))?
        {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(entry.path())
                    .await
                    .map_err(|e| BerthError::io("removing cache file", e))?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn entry(&self, key: &str) -> Option<CacheEntry> {
        let cached = self.read_entries().get(key).cloned();
        if let Some(entry) = cached {
            if entry.is_expired() {
                self.expire(key, entry.persist).await;
                return None;
            }
            return Some(entry);
        }

        let entry = self.load_from_disk(key).await?;
        if entry.is_expired() {
            self.expire(key, true).await;
            return None;
        }

        debug!("Cache key {} retrieved from disk", key);
        self.write_entries().insert(key.to_string(), entry.clone());
        Some(entry)
    }

    async fn load_from_disk(&self, key: &str) -> Option<CacheEntry> {
        let path = self.path_for(key).ok()?;
        if !path.exists() {
            return None;
        }

        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed reading cache file {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Ignoring corrupt cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn expire(&self, key: &str, persisted: bool) {
        debug!("Cache key {} expired", key);
        self.write_entries().remove(key);
        if persisted {
            if let Err(e) = self.remove(key).await {
                warn!("Failed removing expired cache key {}: {}", key, e);
            }
        }
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keys become file names, so path separators and empty keys are rejected
fn validate_key(key: &str) -> BerthResult<()> {
    let reason = if key.is_empty() {
        Some("key is empty")
    } else if key.contains(['/', '\\']) {
        Some("key contains a path separator")
    } else if key == "." || key == ".." {
        Some("key is a relative path component")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(BerthError::CacheKeyInvalid {
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
