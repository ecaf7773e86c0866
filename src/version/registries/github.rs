//! GitHub releases page implementation
//!
//! Reads the first release-tag anchor of a releases page
//! (`href="/org/repo/releases/tag/3.4.5"`); GitHub lists the newest release first.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::version::error::RegistryError;
use crate::version::registries::{get_checked, http_client};
use crate::version::registry::{Registry, RegistryType};

static RELEASE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href=".*?/releases/tag/([\d.]+)""#).unwrap());

/// Registry implementation for GitHub releases pages
pub struct GitHubRegistry {
    client: reqwest::Client,
}

impl GitHubRegistry {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }
}

impl Default for GitHubRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the version from the first release-tag link
fn extract_release_tag(html: &str) -> Option<String> {
    RELEASE_TAG
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[async_trait::async_trait]
impl Registry for GitHubRegistry {
    fn registry_type(&self) -> RegistryType {
        RegistryType::GitHub
    }

    async fn fetch_newest_version(&self, link: &str) -> Result<Option<String>, RegistryError> {
        debug!("Fetching newest version from GitHub: {}", link);
        let response = get_checked(&self.client, link).await?;
        let html = response.text().await?;

        Ok(extract_release_tag(&html))
    }
}
