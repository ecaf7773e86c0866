//! Version annotation passes over a merged module table
//!
//! Both passes visit rows strictly in table order and only ever overwrite a
//! version field with a resolved value, so re-running a pass against
//! unchanged sources leaves the table unchanged.

use tracing::info;

use crate::manifest::{Manifest, find_current_version};
use crate::table::ModuleTable;
use crate::version::resolver::RegistryResolver;

/// Per-pass row counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotateStats {
    /// Rows whose version field received a value
    pub resolved: usize,
    /// Rows looked up without result
    pub unresolved: usize,
    /// Rows not looked up at all (blank link)
    pub skipped: usize,
}

/// Pass 1: fill `current_version` from the build manifest
pub fn annotate_current(mut table: ModuleTable, manifest: &Manifest) -> (ModuleTable, AnnotateStats) {
    let mut stats = AnnotateStats::default();

    for (i, row) in table.rows.iter_mut().enumerate() {
        match find_current_version(&row.module_name, manifest) {
            Some(version) => {
                info!("Row {} ({}): current version {}", i, row.module_name, version);
                row.current_version = Some(version);
                stats.resolved += 1;
            }
            None => {
                info!("Row {} ({}): not referenced by the manifest", i, row.module_name);
                stats.unresolved += 1;
            }
        }
    }

    info!(
        "Updated current_version: {} resolved, {} unresolved",
        stats.resolved, stats.unresolved
    );
    (table, stats)
}

/// Pass 2: fill `newest_version` from each row's registry link
///
/// Rows without a link are skipped and never reach the resolver.
pub async fn annotate_newest(
    mut table: ModuleTable,
    resolver: &RegistryResolver,
) -> (ModuleTable, AnnotateStats) {
    let mut stats = AnnotateStats::default();

    for (i, row) in table.rows.iter_mut().enumerate() {
        let Some(link) = row.link() else {
            info!("Skipping row {} ({}) due to missing or empty link", i, row.module_name);
            stats.skipped += 1;
            continue;
        };

        let newest = resolver.fetch_newest_version(link).await;
        match newest {
            Some(version) => {
                row.newest_version = Some(version);
                stats.resolved += 1;
            }
            None => stats.unresolved += 1,
        }
    }

    info!(
        "Updated newest_version: {} resolved, {} unresolved, {} skipped",
        stats.resolved, stats.unresolved, stats.skipped
    );
    (table, stats)
}
