//! Convenience re-exports of the most commonly used types.
//!
//! ```
//! use confscope_core::prelude::*;
//! ```

pub use crate::catalog::{Catalog, DetectContext, Detection, DetectionMatch, FormatDetector, MetadataValue};
pub use crate::config::Config;
pub use crate::diff::{ContentType, DiffResult, render_diff, render_unified_diff};
pub use crate::error::{ConfscopeError, DiffError, RuleError, ScanError};
pub use crate::hunt::{HuntHit, HuntRule, RuleSet, hunt_content, hunt_path};
pub use crate::sample::{DEFAULT_SAMPLE_CAP, Sample};
pub use crate::scan::{ScanOptions, ScanOutcome, scan_tree};
