//! Cache key naming
//!
//! Keys are derived from the app name alone so that a front end can find
//! them before the app itself is loaded.

use serde::{Deserialize, Serialize};

/// Key of the persisted task list
pub const TASKS_CACHE_KEY: &str = "_.tasks.cache";

/// Build step generation a lock belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockGeneration {
    /// Build and run steps declared on services
    V3,
    /// Locally built service images
    V4,
}

/// Every cache key belonging to one app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCacheKeys {
    pub compose: String,
    pub recipe: String,
    pub pre_lock: String,
    pub post_lock: String,
    pub v4_pre_lock: String,
    pub v4_post_lock: String,
    pub meta: String,
}

impl AppCacheKeys {
    /// Derive the keys for the app called `name`
    pub fn for_app(name: &str) -> Self {
        Self {
            compose: format!("{}.compose.cache", name),
            recipe: format!("{}.recipe.cache", name),
            pre_lock: format!("{}.build.lock", name),
            post_lock: format!("{}.post-build.lock", name),
            v4_pre_lock: format!("{}.v4.build.lock", name),
            v4_post_lock: format!("{}.v4.post-build.lock", name),
            meta: format!("{}.meta.cache", name),
        }
    }

    /// Pre and post build lock keys for a generation
    pub fn locks(&self, generation: LockGeneration) -> [&str; 2] {
        match generation {
            LockGeneration::V3 => [&self.pre_lock, &self.post_lock],
            LockGeneration::V4 => [&self.v4_pre_lock, &self.v4_post_lock],
        }
    }

    /// Every key, in a stable order
    pub fn all(&self) -> [&str; 7] {
        [
            &self.compose,
            &self.recipe,
            &self.pre_lock,
            &self.post_lock,
            &self.v4_pre_lock,
            &self.v4_post_lock,
            &self.meta,
        ]
    }
}
