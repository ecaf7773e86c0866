//! Registry and downloader test doubles

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use dep_reconcile::download::Downloader;
use dep_reconcile::version::error::{DownloadError, RegistryError};
use dep_reconcile::version::registry::{Registry, RegistryType};
use dep_reconcile::version::resolver::RegistryResolver;

/// Mock registry answering from a fixed link -> version table
pub struct MockRegistry {
    registry_type: RegistryType,
    versions: HashMap<String, String>,
    calls: Arc<AtomicUsize>,
}

impl MockRegistry {
    pub fn new(registry_type: RegistryType) -> Self {
        Self {
            registry_type,
            versions: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_version(mut self, link: &str, version: &str) -> Self {
        self.versions.insert(link.to_string(), version.to_string());
        self
    }

    /// Shared counter of fetches made through this registry
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Registry for MockRegistry {
    fn registry_type(&self) -> RegistryType {
        self.registry_type
    }

    async fn fetch_newest_version(&self, link: &str) -> Result<Option<String>, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.versions.get(link) {
            Some(version) => Ok(Some(version.clone())),
            None => Err(RegistryError::NotFound(link.to_string())),
        }
    }
}

/// Create a resolver backed by the given mock registries
pub fn create_test_resolver(registries: Vec<MockRegistry>) -> RegistryResolver {
    RegistryResolver::new(
        registries
            .into_iter()
            .map(|registry| Arc::new(registry) as Arc<dyn Registry>)
            .collect(),
    )
}

/// Downloader failing a fixed number of times before serving `body`
pub struct FlakyDownloader {
    failures: usize,
    body: Vec<u8>,
    attempts: Arc<AtomicUsize>,
}

impl FlakyDownloader {
    pub fn new(failures: usize, body: &str) -> Self {
        Self {
            failures,
            body: body.as_bytes().to_vec(),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn attempts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }
}

#[async_trait]
impl Downloader for FlakyDownloader {
    async fn download(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, DownloadError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            Err(DownloadError::Status {
                url: url.to_string(),
                status: 503,
            })
        } else {
            Ok(self.body.clone())
        }
    }
}
