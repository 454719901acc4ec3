//! Compose and recipe cache invalidation
//!
//! The compose cache lets an app skip service discovery entirely, so it is
//! only trusted while the recipe it was derived from is unchanged.

use crate::cache::keys::AppCacheKeys;
use crate::cache::store::CacheStore;
use crate::error::BerthResult;
use tracing::info;

/// What [`invalidate_app_caches`] decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// Caches are consistent and were left alone
    Kept,
    /// The declared recipe differs from the cached one; compose and recipe caches dropped
    RecipeChanged,
    /// A recipe cache existed without a compose cache; recipe cache dropped
    RecipeCacheOrphaned,
}

/// Drop compose/recipe caches that can no longer be trusted
///
/// - a declared recipe with no (or a different) recipe cache drops the
///   compose cache, as does a recipe that was removed from the app;
/// - a recipe cache without a compose cache is dropped so both are derived
///   again together.
pub async fn invalidate_app_caches(
    cache: &CacheStore,
    keys: &AppCacheKeys,
    recipe: Option<&str>,
) -> BerthResult<Invalidation> {
    let cached_recipe = cache.get::<String>(&keys.recipe).await;

    let recipe_changed = match (recipe, cached_recipe.as_deref()) {
        (Some(declared), Some(cached)) => declared != cached,
        (Some(_), None) => true,
        (None, Some(_)) => true,
        (None, None) => false,
    };

    if recipe_changed {
        cache.remove(&keys.compose).await?;
        cache.remove(&keys.recipe).await?;
        info!("Recipe changed; dropped compose cache {}", keys.compose);
        return Ok(Invalidation::RecipeChanged);
    }

    if cached_recipe.is_some() && !cache.has(&keys.compose).await {
        cache.remove(&keys.recipe).await?;
        info!("Dropped orphaned recipe cache {}", keys.recipe);
        return Ok(Invalidation::RecipeCacheOrphaned);
    }

    Ok(Invalidation::Kept)
}
