//! Build manifest (`*.deps.json`) reader
//!
//! A manifest maps build targets to resolved components:
//!
//! ```json
//! {
//!   "targets": {
//!     "net6.0": {
//!       "PkgA/2.0.0": { "runtime": { "lib/net6.0/PkgA.dll": {} } }
//!     }
//!   }
//! }
//! ```
//!
//! The installed version of a module is read from the component key of the
//! first component whose `runtime` or `compile` identifiers mention the module.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Suffix of manifest files dropped into the upload directory
pub const MANIFEST_SUFFIX: &str = ".deps.json";

/// Version embedded in a component key: a slash followed by digits and dots
static KEY_VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/([\d.]+)").unwrap());

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parsed dependency manifest
///
/// Targets and components keep document order, which decides which entry
/// wins when several match.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Manifest {
    #[serde(default)]
    pub targets: IndexMap<String, IndexMap<String, ComponentEntry>>,
}

/// Metadata of one resolved component
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ComponentEntry {
    #[serde(default)]
    pub runtime: Option<DependencyIds>,
    #[serde(default)]
    pub compile: Option<DependencyIds>,
}

/// Dependency identifiers, either listed or used as object keys
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DependencyIds {
    List(Vec<String>),
    Map(IndexMap<String, serde_json::Value>),
}

impl DependencyIds {
    pub fn ids(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            DependencyIds::List(ids) => Box::new(ids.iter().map(String::as_str)),
            DependencyIds::Map(ids) => Box::new(ids.keys().map(String::as_str)),
        }
    }

    fn mentions(&self, module_name: &str) -> bool {
        self.ids().any(|id| identifier_matches(module_name, id))
    }
}

impl std::str::FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: Manifest = content.parse()?;
        info!(
            "Loaded manifest {:?} with {} targets",
            path,
            manifest.targets.len()
        );
        Ok(manifest)
    }
}

/// Loose identifier match used to tie a module to manifest entries
///
/// This is substring containment, not equality: module `Foo` also matches
/// `Foo.Bar.dll` or `lib/net6.0/MyFoo.dll`, so a short module name can pick
/// up another package's version. Renamed package variants rely on the loose
/// match, so it is kept; an empty module name matches nothing.
pub fn identifier_matches(module_name: &str, identifier: &str) -> bool {
    !module_name.is_empty() && identifier.contains(module_name)
}

/// Extracts the version embedded in a component key (`PkgA/2.0.0` -> `2.0.0`)
fn key_version(component_key: &str) -> Option<&str> {
    KEY_VERSION
        .captures(component_key)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Finds the version of `module_name` referenced by the manifest
///
/// Walks targets and components in document order and returns the version
/// from the key of the first component whose runtime or compile identifiers
/// match. Components whose key carries no version are skipped.
pub fn find_current_version(module_name: &str, manifest: &Manifest) -> Option<String> {
    let found = manifest
        .targets
        .values()
        .flat_map(|components| components.iter())
        .filter(|(_, entry)| {
            [&entry.runtime, &entry.compile]
                .into_iter()
                .flatten()
                .any(|ids| ids.mentions(module_name))
        })
        .find_map(|(key, _)| key_version(key))
        .map(String::from);

    match &found {
        Some(version) => debug!("Found current version {} for {}", version, module_name),
        None => debug!("No current version found for {}", module_name),
    }
    found
}

/// Returns the first `*.deps.json` file in `upload_dir`, by file name
pub fn find_manifest(upload_dir: &Path) -> Result<Option<PathBuf>, ManifestError> {
    let io_err = |source| ManifestError::Io {
        path: upload_dir.to_path_buf(),
        source,
    };

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(upload_dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(MANIFEST_SUFFIX));
        if is_manifest && path.is_file() {
            candidates.push(path);
        }
    }

    candidates.sort();
    Ok(candidates.into_iter().next())
}
