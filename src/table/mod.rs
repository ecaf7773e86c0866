//! Module table: the unit of state flowing through the pipeline
//!
//! A table is an ordered list of [`ModuleRow`]s plus the header order it was
//! read with, so a table can be written back with its original column layout.
//!
//! # Modules
//!
//! - [`merge`]: Joins a current table against a reference table
//! - [`finalize`]: Drops removed rows and orders the deliverable

pub mod finalize;
pub mod merge;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

pub const MODULE_NAME: &str = "module_name";
pub const LINKS: &str = "links";
pub const NOTES: &str = "notes";
pub const TAG: &str = "tag";
pub const CURRENT_VERSION: &str = "current_version";
pub const NEWEST_VERSION: &str = "newest_version";
pub const MODIFIED_DATE: &str = "modified_date";

/// Columns every module table must carry
pub const REQUIRED_COLUMNS: [&str; 7] = [
    MODULE_NAME,
    LINKS,
    NOTES,
    TAG,
    CURRENT_VERSION,
    NEWEST_VERSION,
    MODIFIED_DATE,
];

/// Row marked for removal by a curator
pub const TAG_REMOVED: i64 = 0;
/// Row matched in the reference table
pub const TAG_RETAINED: i64 = 1;
/// Row with no counterpart in the reference table
pub const TAG_NEW: i64 = 2;
/// Row already reviewed by a curator
pub const TAG_REVIEWED: i64 = 3;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("CSV error in {path:?}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Missing required column '{column}' in {path:?}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Invalid tag '{value}' on line {line} of {path:?}")]
    InvalidTag {
        path: PathBuf,
        line: u64,
        value: String,
    },
}

/// One software module tracked by the inventory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRow {
    /// Join key, compared case-sensitively
    pub module_name: String,
    /// Registry page of the module
    pub links: Option<String>,
    /// Curator commentary
    pub notes: Option<String>,
    pub tag: Option<i64>,
    pub current_version: Option<String>,
    pub newest_version: Option<String>,
    /// Raw timestamp as read from the table
    pub modified_date: Option<String>,
    /// Columns outside the required schema, keyed by header
    pub extra: IndexMap<String, String>,
}

impl ModuleRow {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            ..Self::default()
        }
    }

    /// Returns the registry link if it is present and not blank
    pub fn link(&self) -> Option<&str> {
        self.links
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
    }

    /// Returns true if a curator left non-blank notes on this row
    pub fn is_noted(&self) -> bool {
        self.notes
            .as_deref()
            .is_some_and(|notes| !notes.trim().is_empty())
    }

    /// Parses `modified_date`, returning None for blank or unrecognized values
    pub fn modified_at(&self) -> Option<NaiveDateTime> {
        self.modified_date.as_deref().and_then(parse_timestamp)
    }
}

/// Parses the timestamp formats found in exported inventory tables
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Ordered collection of module rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTable {
    headers: Vec<String>,
    pub rows: Vec<ModuleRow>,
}

impl Default for ModuleTable {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ModuleTable {
    /// Creates a table with the required columns as its header
    pub fn new(rows: Vec<ModuleRow>) -> Self {
        Self {
            headers: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    /// Replaces the rows while keeping the column layout
    pub fn with_rows(&self, rows: Vec<ModuleRow>) -> Self {
        Self {
            headers: self.headers.clone(),
            rows,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Reads a comma-delimited table with a header row
    pub fn read(path: &Path) -> Result<Self, TableError> {
        let csv_err = |source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(csv_err)?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let index_of = |column: &str| -> Result<usize, TableError> {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| TableError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                })
        };

        let name_idx = index_of(MODULE_NAME)?;
        let links_idx = index_of(LINKS)?;
        let notes_idx = index_of(NOTES)?;
        let tag_idx = index_of(TAG)?;
        let current_idx = index_of(CURRENT_VERSION)?;
        let newest_idx = index_of(NEWEST_VERSION)?;
        let modified_idx = index_of(MODIFIED_DATE)?;
        let known = [
            name_idx,
            links_idx,
            notes_idx,
            tag_idx,
            current_idx,
            newest_idx,
            modified_idx,
        ];

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(csv_err)?;
            let field = |idx: usize| record.get(idx).unwrap_or("");
            let optional = |idx: usize| Some(field(idx)).filter(|v| !v.is_empty()).map(String::from);

            let tag = parse_tag(field(tag_idx)).map_err(|value| TableError::InvalidTag {
                path: path.to_path_buf(),
                line: record.position().map(|p| p.line()).unwrap_or(0),
                value,
            })?;

            let extra = headers
                .iter()
                .enumerate()
                .filter(|(idx, _)| !known.contains(idx))
                .map(|(idx, header)| (header.clone(), field(idx).to_string()))
                .collect();

            rows.push(ModuleRow {
                module_name: field(name_idx).to_string(),
                links: optional(links_idx),
                notes: optional(notes_idx),
                tag,
                current_version: optional(current_idx),
                newest_version: optional(newest_idx),
                modified_date: optional(modified_idx),
                extra,
            });
        }

        debug!("Read {} rows from {:?}", rows.len(), path);
        Ok(Self { headers, rows })
    }

    /// Writes the table, replacing `path` only once the write has completed
    pub fn write(&self, path: &Path) -> Result<(), TableError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| TableError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp_path = temp_path_for(path);
        self.write_to(&tmp_path)?;
        std::fs::rename(&tmp_path, path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Wrote {} rows to {:?}", self.rows.len(), path);
        Ok(())
    }

    fn write_to(&self, path: &Path) -> Result<(), TableError> {
        let csv_err = |source| TableError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(path)
            .map_err(csv_err)?;

        writer.write_record(&self.headers).map_err(csv_err)?;
        for row in &self.rows {
            let record: Vec<String> = self.headers.iter().map(|h| cell(row, h)).collect();
            writer.write_record(&record).map_err(csv_err)?;
        }

        writer.flush().map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn cell(row: &ModuleRow, header: &str) -> String {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    match header {
        MODULE_NAME => row.module_name.clone(),
        LINKS => text(&row.links),
        NOTES => text(&row.notes),
        TAG => row.tag.map(|t| t.to_string()).unwrap_or_default(),
        CURRENT_VERSION => text(&row.current_version),
        NEWEST_VERSION => text(&row.newest_version),
        MODIFIED_DATE => text(&row.modified_date),
        other => row.extra.get(other).cloned().unwrap_or_default(),
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    file_name.push(".tmp");
    path.with_file_name(file_name)
}

/// Parses a tag cell. Spreadsheet exports write integers as "2.0".
fn parse_tag(value: &str) -> Result<Option<i64>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(tag) = value.parse::<i64>() {
        return Ok(Some(tag));
    }
    match value.parse::<f64>() {
        Ok(tag) if tag.fract() == 0.0 && tag.is_finite() => Ok(Some(tag as i64)),
        _ => Err(value.to_string()),
    }
}
