//! Newest-version resolution for module links
//!
//! Dispatches a link to the registry whose host marker it contains and
//! turns every failure into "unresolved".

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::RegistriesConfig;
use crate::version::error::RegistryError;
use crate::version::registries::{GitHubRegistry, NuGetRegistry, OptimizelyRegistry};
use crate::version::registry::{Registry, RegistryType};

/// Routes module links to the registry that can answer for them
pub struct RegistryResolver {
    registries: HashMap<RegistryType, Arc<dyn Registry>>,
}

impl RegistryResolver {
    /// Create a resolver from explicit registry implementations
    pub fn new(registries: Vec<Arc<dyn Registry>>) -> Self {
        Self {
            registries: registries
                .into_iter()
                .map(|registry| (registry.registry_type(), registry))
                .collect(),
        }
    }

    /// Create a resolver with the HTTP-backed registries enabled in `config`
    pub fn from_config(config: &RegistriesConfig) -> Self {
        let mut registries: Vec<Arc<dyn Registry>> = Vec::new();
        if config.nuget.enabled {
            registries.push(Arc::new(NuGetRegistry::new()));
        }
        if config.optimizely.enabled {
            registries.push(Arc::new(OptimizelyRegistry::new()));
        }
        if config.github.enabled {
            registries.push(Arc::new(GitHubRegistry::new()));
        }
        Self::new(registries)
    }

    /// Returns the registry that would serve `link`, if any
    pub fn registry_for(&self, link: &str) -> Option<&Arc<dyn Registry>> {
        RegistryType::detect(link).and_then(|registry_type| self.registries.get(&registry_type))
    }

    /// Fetch the newest version published behind `link`
    ///
    /// Never fails: unknown or disabled hosts, HTTP errors and pages without
    /// a recognizable version all yield `None`. Unknown hosts are rejected
    /// before any request is made.
    pub async fn fetch_newest_version(&self, link: &str) -> Option<String> {
        let Some(registry) = self.registry_for(link) else {
            warn!("Unknown link source: {}", link);
            return None;
        };

        let registry_type = registry.registry_type().as_str();
        match registry.fetch_newest_version(link).await {
            Ok(Some(version)) => {
                info!("Newest version from {}: {}", registry_type, version);
                Some(version)
            }
            Ok(None) => {
                warn!("No version found on {} page: {}", registry_type, link);
                None
            }
            Err(RegistryError::NotFound(_)) => {
                warn!("{} page not found: {}", registry_type, link);
                None
            }
            Err(e) => {
                warn!("Error fetching from {}: {}", registry_type, e);
                None
            }
        }
    }
}
