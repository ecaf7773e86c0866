//! Join of a current module table against a reference table

use std::collections::HashMap;

use tracing::{debug, info};

use crate::table::{ModuleRow, ModuleTable, TAG_NEW};

/// Merge `reference` curation data into `current`
///
/// For every row of `current`:
/// - a reference row with the same `module_name` (exact, case-sensitive)
///   overwrites `links`, `notes` and `tag`; with duplicate names the first
///   reference row wins
/// - otherwise the row is tagged [`TAG_NEW`] and keeps its own links and notes
///
/// Rows only present in `reference` are dropped, so the result always has
/// the row count and column layout of `current`.
pub fn merge(current: &ModuleTable, reference: &ModuleTable) -> ModuleTable {
    let mut lookup: HashMap<&str, &ModuleRow> = HashMap::new();
    for row in &reference.rows {
        lookup.entry(row.module_name.as_str()).or_insert(row);
    }

    let mut matched = 0usize;
    let rows = current
        .rows
        .iter()
        .map(|row| {
            let mut merged = row.clone();
            match lookup.get(row.module_name.as_str()) {
                Some(reference_row) => {
                    matched += 1;
                    merged.links = reference_row.links.clone();
                    merged.notes = reference_row.notes.clone();
                    merged.tag = reference_row.tag;
                }
                None => {
                    debug!("{} not found in reference table, tagging as new", row.module_name);
                    merged.tag = Some(TAG_NEW);
                }
            }
            merged
        })
        .collect::<Vec<_>>();

    info!(
        "Merged {} rows: {} matched, {} new",
        rows.len(),
        matched,
        rows.len() - matched
    );

    current.with_rows(rows)
}
