//! Dependency inventory reconciliation
//!
//! Merges a current module table with the curated reference table, resolves
//! installed versions from a build manifest and newest versions from package
//! registries, and writes the finalized table.
//!
//! # Modules
//!
//! - [`table`]: Module table model, merge and finalize stages
//! - [`manifest`]: Build manifest reader
//! - [`version`]: Registry lookups for the newest published version
//! - [`annotate`]: Version annotation passes
//! - [`download`]: Reference table download with retry
//! - [`pipeline`]: Stage sequencing, checkpoints and cleanup
//! - [`runner`]: Background run queue with observable status
//! - [`config`]: Paths and tunables passed to the pipeline
//! - [`logging`]: Tracing subscriber setup

pub mod annotate;
pub mod config;
pub mod download;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod runner;
pub mod table;
pub mod version;
