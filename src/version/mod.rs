//! Version lookup layer
//!
//! Resolves the newest published version of a module from its registry link.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │  Resolver   │────▶│  Registry   │
//! │ (dispatch)  │     │   (fetch)   │
//! └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐
//!                     │ Registries  │
//!                     │(nuget, ...) │
//!                     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`registry`]: Registry trait and host detection
//! - [`registries`]: Concrete registries (NuGet API, Optimizely feed, GitHub releases)
//! - [`resolver`]: Link dispatch that degrades every failure to "unresolved"
//! - [`error`]: Error types for registry and download operations
//! - [`semver`]: Version comparison used for run summaries

pub mod error;
pub mod registries;
pub mod registry;
pub mod resolver;
pub mod semver;
