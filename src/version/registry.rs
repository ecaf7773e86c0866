//! Registry trait for fetching the newest version behind a module link

#[cfg(test)]
use mockall::automock;

use crate::version::error::RegistryError;

/// Kind of registry a module link points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryType {
    /// NuGet flat-container API (`{"versions": [...]}`)
    NuGet,
    /// Optimizely NuGet feed package page
    Optimizely,
    /// GitHub releases page
    GitHub,
}

impl RegistryType {
    /// Dispatch order when a link could match several registries
    pub const PRIORITY: [RegistryType; 3] = [
        RegistryType::NuGet,
        RegistryType::Optimizely,
        RegistryType::GitHub,
    ];

    /// Returns the string representation of the registry type
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryType::NuGet => "nuget",
            RegistryType::Optimizely => "optimizely",
            RegistryType::GitHub => "github",
        }
    }

    /// Substring identifying links served by this registry
    pub fn host_marker(&self) -> &'static str {
        match self {
            RegistryType::NuGet => "nuget.org",
            RegistryType::Optimizely => "optimizely",
            RegistryType::GitHub => "github.com",
        }
    }

    /// Detect the registry behind a link
    ///
    /// Matching is substring containment on the whole link, checked in
    /// [`RegistryType::PRIORITY`] order.
    pub fn detect(link: &str) -> Option<RegistryType> {
        Self::PRIORITY
            .into_iter()
            .find(|registry_type| link.contains(registry_type.host_marker()))
    }
}

impl std::str::FromStr for RegistryType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nuget" => Ok(RegistryType::NuGet),
            "optimizely" => Ok(RegistryType::Optimizely),
            "github" => Ok(RegistryType::GitHub),
            _ => Err(()),
        }
    }
}

/// Trait for fetching the newest published version of a module
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Returns the type of registry this implementation handles
    fn registry_type(&self) -> RegistryType;

    /// Fetches the newest version published at `link`
    ///
    /// # Returns
    /// * `Ok(Some(version))` - The newest version found on the page
    /// * `Ok(None)` - The page was fetched but carries no version
    /// * `Err(RegistryError)` - If the fetch fails
    async fn fetch_newest_version(&self, link: &str) -> Result<Option<String>, RegistryError>;
}
