//! Optimizely NuGet feed implementation
//!
//! The feed has no version API; the package page sets its title from script,
//! e.g. `document.title = 'EPiServer.CMS.Core 12.18.0';`.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::version::error::RegistryError;
use crate::version::registries::{get_checked, http_client};
use crate::version::registry::{Registry, RegistryType};

static TITLE_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"document\.title\s*=\s*'.*? (\d+\.\d+\.\d+)';").unwrap()
});

/// Registry implementation for Optimizely package pages
pub struct OptimizelyRegistry {
    client: reqwest::Client,
}

impl OptimizelyRegistry {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }
}

impl Default for OptimizelyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the version from the page's title assignment
fn extract_title_version(html: &str) -> Option<String> {
    TITLE_VERSION
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[async_trait::async_trait]
impl Registry for OptimizelyRegistry {
    fn registry_type(&self) -> RegistryType {
        RegistryType::Optimizely
    }

    async fn fetch_newest_version(&self, link: &str) -> Result<Option<String>, RegistryError> {
        debug!("Fetching newest version from Optimizely feed: {}", link);
        let response = get_checked(&self.client, link).await?;
        let html = response.text().await?;

        Ok(extract_title_version(&html))
    }
}
