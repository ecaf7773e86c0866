//! NuGet flat-container API implementation

use serde::Deserialize;
use tracing::{debug, warn};

use crate::version::error::RegistryError;
use crate::version::registries::{get_checked, http_client};
use crate::version::registry::{Registry, RegistryType};

/// Response from the NuGet package version index
#[derive(Debug, Deserialize)]
struct VersionIndexResponse {
    #[serde(default)]
    versions: Vec<String>,
}

/// Registry implementation for NuGet version index links
/// (e.g. `https://api.nuget.org/v3-flatcontainer/serilog/index.json`)
pub struct NuGetRegistry {
    client: reqwest::Client,
}

impl NuGetRegistry {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }
}

impl Default for NuGetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Registry for NuGetRegistry {
    fn registry_type(&self) -> RegistryType {
        RegistryType::NuGet
    }

    async fn fetch_newest_version(&self, link: &str) -> Result<Option<String>, RegistryError> {
        debug!("Fetching newest version from NuGet API: {}", link);
        let response = get_checked(&self.client, link).await?;

        let index: VersionIndexResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse NuGet response: {}", e);
            RegistryError::InvalidResponse(e.to_string())
        })?;

        // The index lists versions oldest first
        Ok(index.versions.into_iter().last())
    }
}
