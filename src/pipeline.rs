//! Reconciliation pipeline driver
//!
//! ```text
//! reference ──┐
//!             ▼
//! current ──▶ merge ──▶ annotate_current ──▶ annotate_newest ──▶ finalize ──▶ output
//!               │              │                    │
//!               ▼              ▼                    ▼
//!           checkpoint     checkpoint           checkpoint
//! ```
//!
//! Each stage is a `ModuleTable -> ModuleTable` function; checkpoints are
//! written to the work directory when enabled and are never read back
//! within a run.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::annotate::{AnnotateStats, annotate_current, annotate_newest};
use crate::config::{ConfigError, PipelineConfig};
use crate::download::{Downloader, HttpDownloader, RetryPolicy, download_with_retry};
use crate::manifest::{Manifest, ManifestError, find_manifest};
use crate::table::finalize::finalize;
use crate::table::merge::merge;
use crate::table::{ModuleTable, TableError};
use crate::version::error::DownloadError;
use crate::version::resolver::RegistryResolver;
use crate::version::semver::{CompareResult, compare_versions};

/// File name used for a downloaded reference table inside the work directory
const DOWNLOADED_REFERENCE: &str = "reference.download.csv";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No *.deps.json manifest found at {0:?}")]
    ManifestNotFound(PathBuf),

    #[error("No reference table given and no referenceUrl configured")]
    NoReferenceSource,

    #[error("Upload directory {0:?} does not exist")]
    UploadDirMissing(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Where the reference table comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSource {
    /// A table already on disk
    Local(PathBuf),
    /// A table downloaded with retry before the run
    Remote(String),
}

impl ReferenceSource {
    /// Interprets a command-line argument: http(s) URLs are remote, anything else a path
    pub fn parse(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            ReferenceSource::Remote(arg.to_string())
        } else {
            ReferenceSource::Local(PathBuf::from(arg))
        }
    }
}

/// Inputs of a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineInputs {
    /// Table exported from the current build
    pub current_table: PathBuf,
    /// Curated table from the previous reconciliation
    pub reference: ReferenceSource,
    /// Manifest to read; discovered in the upload directory when None
    pub manifest: Option<PathBuf>,
}

impl PipelineInputs {
    /// Builds inputs from the two positional command-line arguments
    ///
    /// `source` is either the reference table (path or URL) or, when it
    /// names a `.json` file, the manifest; the reference table then comes
    /// from the configured `referenceUrl`.
    pub fn from_args(
        current_table: &str,
        source: &str,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        if current_table.trim().is_empty() || source.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "table arguments must not be empty".to_string(),
            ));
        }

        let current_table = PathBuf::from(current_table);
        if source.ends_with(".json") {
            let url = config
                .reference_url
                .as_deref()
                .ok_or(PipelineError::NoReferenceSource)?;
            return Ok(Self {
                current_table,
                reference: ReferenceSource::parse(url),
                manifest: Some(PathBuf::from(source)),
            });
        }

        Ok(Self {
            current_table,
            reference: ReferenceSource::parse(source),
            manifest: None,
        })
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Location of the finalized table
    pub output: PathBuf,
    /// Rows in the finalized table
    pub rows: usize,
    pub current: AnnotateStats,
    pub newest: AnnotateStats,
    /// Rows whose installed version is behind the newest published one
    pub outdated: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    resolver: RegistryResolver,
    downloader: Arc<dyn Downloader>,
}

impl Pipeline {
    /// Create a pipeline with HTTP-backed registries and downloader
    pub fn new(config: PipelineConfig) -> Self {
        let resolver = RegistryResolver::from_config(&config.registries);
        Self::with_components(config, resolver, Arc::new(HttpDownloader::new()))
    }

    pub fn with_components(
        config: PipelineConfig,
        resolver: RegistryResolver,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        Self {
            config,
            resolver,
            downloader,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole reconciliation
    ///
    /// Fatal conditions (missing manifest, exhausted download retries,
    /// unreadable tables) are returned as errors; row-level lookups never fail.
    pub async fn run(&self, inputs: &PipelineInputs) -> Result<RunReport, PipelineError> {
        self.config.validate()?;

        let file_name = inputs.current_table.file_name().ok_or_else(|| {
            PipelineError::InvalidInput(format!(
                "current table {:?} has no file name",
                inputs.current_table
            ))
        })?;

        let manifest_path = self.locate_manifest(inputs)?;
        info!("Using manifest {:?}", manifest_path);

        let (reference_path, downloaded) = self.fetch_reference(&inputs.reference).await?;

        let result = self
            .reconcile(inputs, file_name, &manifest_path, &reference_path)
            .await;

        // The downloaded copy goes whether or not the run succeeded
        let cleanup = if downloaded {
            remove_file(&reference_path)
        } else {
            Ok(())
        };
        let report = result?;
        cleanup?;

        info!(
            "Run complete: {} rows, {} outdated",
            report.rows, report.outdated
        );
        Ok(report)
    }

    async fn reconcile(
        &self,
        inputs: &PipelineInputs,
        file_name: &OsStr,
        manifest_path: &Path,
        reference_path: &Path,
    ) -> Result<RunReport, PipelineError> {
        let current = ModuleTable::read(&inputs.current_table)?;
        let reference = ModuleTable::read(reference_path)?;
        let checkpoint_path = self.config.work_dir.join(file_name);

        let table = merge(&current, &reference);
        self.checkpoint(&table, &checkpoint_path)?;

        let manifest = Manifest::load(manifest_path)?;
        let (table, current_stats) = annotate_current(table, &manifest);
        self.checkpoint(&table, &checkpoint_path)?;

        let (table, newest_stats) = annotate_newest(table, &self.resolver).await;
        self.checkpoint(&table, &checkpoint_path)?;

        let table = finalize(table);
        let outdated = count_outdated(&table);

        let output = self.config.output_dir.join(file_name);
        table.write(&output)?;
        info!("Module table has been updated and moved to: {:?}", output);

        remove_file(manifest_path)?;
        info!("Removed consumed manifest {:?}", manifest_path);
        if self.config.checkpoint {
            remove_file(&checkpoint_path)?;
        }

        Ok(RunReport {
            output,
            rows: table.len(),
            current: current_stats,
            newest: newest_stats,
            outdated,
        })
    }

    fn locate_manifest(&self, inputs: &PipelineInputs) -> Result<PathBuf, PipelineError> {
        match &inputs.manifest {
            Some(path) if path.is_file() => Ok(path.clone()),
            Some(path) => Err(PipelineError::ManifestNotFound(path.clone())),
            None if !self.config.upload_dir.is_dir() => Err(PipelineError::UploadDirMissing(
                self.config.upload_dir.clone(),
            )),
            None => find_manifest(&self.config.upload_dir)?
                .ok_or_else(|| PipelineError::ManifestNotFound(self.config.upload_dir.clone())),
        }
    }

    /// Returns the local reference table path and whether it was downloaded
    async fn fetch_reference(
        &self,
        source: &ReferenceSource,
    ) -> Result<(PathBuf, bool), PipelineError> {
        match source {
            ReferenceSource::Local(path) => Ok((path.clone(), false)),
            ReferenceSource::Remote(url) => {
                let dest = self.config.work_dir.join(DOWNLOADED_REFERENCE);
                let policy = RetryPolicy::from(&self.config.download);
                let path =
                    download_with_retry(self.downloader.as_ref(), url, &policy, &dest).await?;
                Ok((path, true))
            }
        }
    }

    fn checkpoint(&self, table: &ModuleTable, path: &Path) -> Result<(), PipelineError> {
        if self.config.checkpoint {
            table.write(path)?;
            debug!("Checkpointed {} rows to {:?}", table.len(), path);
        }
        Ok(())
    }
}

/// Counts rows whose current version is older than the newest version
fn count_outdated(table: &ModuleTable) -> usize {
    table
        .rows
        .iter()
        .filter(|row| {
            let (Some(current), Some(newest)) = (&row.current_version, &row.newest_version)
            else {
                return false;
            };
            let outdated = compare_versions(current, newest) == CompareResult::Outdated;
            if outdated {
                info!("{} is outdated: {} -> {}", row.module_name, current, newest);
            }
            outdated
        })
        .count()
}

fn remove_file(path: &Path) -> Result<(), PipelineError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("{:?} was already removed", path);
            Ok(())
        }
        Err(source) => Err(PipelineError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
