//! Service descriptors and builders
//!
//! A builder turns a service declaration into the compose fragment the app
//! renders. Recipes plug in their own builders by type name.

use crate::app::config::ServiceConfig;
use crate::error::{BerthError, BerthResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Builder used when a service declares no type
pub const DEFAULT_SERVICE_TYPE: &str = "compose";

/// A resolved service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    /// Builder type that produced this service
    pub kind: String,
    /// Compose service definition
    pub fragment: serde_json::Value,
    #[serde(default)]
    pub build_steps: Vec<String>,
    #[serde(default)]
    pub run_steps: Vec<String>,
}

impl ServiceDescriptor {
    /// Whether the image is built from a local context rather than pulled
    pub fn is_local(&self) -> bool {
        self.fragment.get("build").is_some()
    }
}

/// Turns a service declaration into a [`ServiceDescriptor`]
pub trait ServiceBuilder: Send + Sync {
    /// Type name declarations select this builder with
    fn kind(&self) -> &str;

    fn build(&self, name: &str, config: &ServiceConfig, root: &Path) -> BerthResult<ServiceDescriptor>;
}

/// Passes the declared compose fragment through, adding `image` and `build`
pub struct ComposeServiceBuilder;

impl ServiceBuilder for ComposeServiceBuilder {
    fn kind(&self) -> &str {
        DEFAULT_SERVICE_TYPE
    }

    fn build(&self, name: &str, config: &ServiceConfig, root: &Path) -> BerthResult<ServiceDescriptor> {
        let mut fragment = config.compose.clone();
        if let Some(image) = &config.image {
            fragment.insert("image".to_string(), image.clone().into());
        }
        if let Some(context) = &config.build {
            fragment.insert(
                "build".to_string(),
                root.join(context).display().to_string().into(),
            );
        }
        if !fragment.contains_key("image") && !fragment.contains_key("build") {
            return Err(BerthError::ConfigInvalid {
                path: root.to_path_buf(),
                reason: format!("service {} needs an image or a build context", name),
            });
        }

        Ok(ServiceDescriptor {
            name: name.to_string(),
            kind: self.kind().to_string(),
            fragment: serde_json::Value::Object(fragment),
            build_steps: config.build_steps.clone(),
            run_steps: config.run_steps.clone(),
        })
    }
}

/// Builders by type name
#[derive(Clone)]
pub struct BuilderRegistry {
    builders: HashMap<String, Arc<dyn ServiceBuilder>>,
}

impl BuilderRegistry {
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    pub fn register(&mut self, builder: Arc<dyn ServiceBuilder>) {
        self.builders.insert(builder.kind().to_string(), builder);
    }

    /// Build `name` with the builder its declaration selects
    pub fn build(&self, name: &str, config: &ServiceConfig, root: &Path) -> BerthResult<ServiceDescriptor> {
        let kind = config.kind.as_deref().unwrap_or(DEFAULT_SERVICE_TYPE);
        let builder = self.builders.get(kind).ok_or_else(|| BerthError::ConfigInvalid {
            path: root.to_path_buf(),
            reason: format!("service {} has unknown type {}", name, kind),
        })?;
        builder.build(name, config, root)
    }
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ComposeServiceBuilder));
        registry
    }
}
