//! Cache store and build-lock bookkeeping
//!
//! Memoizes expensive derivations and durably records facts between process
//! invocations.
//!
//! # Persisted keys
//!
//! | Key | Meaning | Safe to delete |
//! |-----|---------|----------------|
//! | `<app>.compose.cache` | Derived services, compose files, containers | yes |
//! | `<app>.recipe.cache` | Recipe the compose cache was derived from | yes |
//! | `<app>.meta.cache` | Version the app was built against | yes |
//! | `<app>.build.lock` (and friends) | Build ran, artifacts may exist | only with zero containers |
//! | `_.tasks.cache` | Discovered command list | yes |

pub mod invalidation;
pub mod keys;
pub mod locks;
pub mod meta;
pub mod store;

pub use invalidation::{invalidate_app_caches, Invalidation};
pub use keys::{AppCacheKeys, LockGeneration, TASKS_CACHE_KEY};
pub use meta::{AppMeta, UNKNOWN_BUILT_AGAINST};
pub use store::{CacheEntry, CacheStore, Expiry, SetOptions};
