//! Core configuration classification engine for confscope.
//!
//! This crate classifies configuration files of unknown or ambiguous format,
//! renders redacted diffs between two captures of the same logical
//! configuration, and hunts file trees for drift-prone tokens. It is designed
//! to be embedded in CLIs and fleet-audit pipelines.
//!
//! # Main Types
//!
//! - [`Catalog`] - Ordered registry of format detectors producing ranked matches
//! - [`DetectionMatch`] - A classified file with confidence and metadata
//! - [`RuleSet`] - Compiled hunt rules for flagging sensitive tokens
//! - [`Config`] - User configuration loaded from `.confscope.toml`
//!
//! # Error Handling
//!
//! This crate uses [`thiserror`] for structured, typed errors that library
//! consumers can match on:
//!
//! - [`RuleError`] - Hunt rule compilation failures
//! - [`DiffError`] - Diff rendering failures
//! - [`ConfigError`] - Configuration loading/parsing failures
//! - [`ConfscopeError`] - Top-level error enum combining the above
//!
//! The CLI crate (`confscope_cli`) uses `anyhow` for error propagation.

/// Format detector plugins and the classification catalog.
pub mod catalog;
/// User configuration loaded from `.confscope.toml`.
pub mod config;
/// Content-aware diff rendering with token masking.
pub mod diff;
/// Error types for rule compilation, diffing, and scanning.
pub mod error;
/// Rule-based hunting for sensitive or drift-prone tokens.
pub mod hunt;
/// Common re-exports for internal use.
pub mod prelude;
/// Capped byte sampling and encoding detection.
pub mod sample;
/// Parallel file-tree scanning.
pub mod scan;
/// Relational snapshot export with column masking policies.
pub mod sqlexport;
#[cfg(test)]
pub(crate) mod test_utils;

pub use catalog::{Catalog, DetectContext, Detection, DetectionMatch, FormatDetector, MetadataValue};
pub use config::{Config, ConfigError};
pub use diff::{ContentType, DiffLine, DiffResult, Hunk, LineKind, render_diff, render_unified_diff};
pub use error::{ConfscopeError, DiffError, RuleError, ScanError};
pub use hunt::{HuntHit, HuntRule, RuleSet, hunt_content, hunt_path};
pub use sample::{DEFAULT_SAMPLE_CAP, Encoding, Sample};
pub use scan::{ScanFailure, ScanOptions, ScanOutcome, scan_tree};
pub use sqlexport::{ExportManifest, ExportOptions, SnapshotExport, export_snapshot};

/// Default filename for confscope configuration.
pub const CONFIG_FILENAME: &str = ".confscope.toml";
