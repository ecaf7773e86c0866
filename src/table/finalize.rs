//! Final filtering and ordering of the deliverable table

use std::cmp::Reverse;

use tracing::info;

use crate::table::{ModuleRow, ModuleTable, TAG_REMOVED};

/// Produce the deliverable table
///
/// 1. rows tagged [`TAG_REMOVED`] are dropped
/// 2. missing notes become empty strings
/// 3. noted rows come first, in their current order
/// 4. unnoted rows follow, newest `modified_date` first; rows without a
///    parseable date go last and keep their relative order
pub fn finalize(table: ModuleTable) -> ModuleTable {
    let total = table.len();
    let (noted, mut unnoted): (Vec<ModuleRow>, Vec<ModuleRow>) = table
        .rows
        .iter()
        .filter(|row| row.tag != Some(TAG_REMOVED))
        .cloned()
        .map(|mut row| {
            row.notes.get_or_insert_with(String::new);
            row
        })
        .partition(ModuleRow::is_noted);

    unnoted.sort_by_key(|row| Reverse(row.modified_at()));

    let kept = noted.len() + unnoted.len();
    info!(
        "Finalized table: {} rows kept ({} noted), {} removed",
        kept,
        noted.len(),
        total - kept
    );

    table.with_rows(noted.into_iter().chain(unnoted).collect())
}
