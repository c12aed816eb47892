//! Format detection catalog.
//!
//! The catalog holds an ordered set of [`FormatDetector`] plugins, one per
//! format family, and ranks their classifications of a byte sample. Each
//! plugin independently decides whether it detects its format; the catalog
//! never merges results from different plugins.
//!
//! The critical invariant enforced across all plugins: a file extension may
//! raise a plugin's confidence but can never, by itself, cause a detection.
//! Every plugin requires at least one structural content signal.

mod container;
mod ini;
mod json;
pub mod score;
mod xml;
mod yaml;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub use container::ContainerDetector;
pub use ini::IniDetector;
pub use json::JsonDetector;
use serde::Serialize;
use sha2::{Digest, Sha256};
#[cfg(feature = "tracing")]
use tracing::trace;
pub use xml::XmlDetector;
pub use yaml::YamlDetector;

use crate::sample::Sample;
use score::Signals;

/// Length of the truncated hex provenance hash for namespace URIs.
const PROVENANCE_HASH_LENGTH: usize = 12;

/// Maximum entries in bounded metadata previews (keys, tables, stages).
pub(crate) const PREVIEW_LIMIT: usize = 8;

/// A scalar or structured metadata value attached to a detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean flag (e.g. `sample_truncated`).
    Bool(bool),
    /// Integer count (e.g. `bytes_sampled`).
    Int(i64),
    /// String value (e.g. `encoding`).
    Str(String),
    /// Bounded list of strings (e.g. key previews).
    List(Vec<String>),
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

/// Result of classifying one file with one plugin.
///
/// Constructed once per `(file, plugin)` pairing that detects; immutable
/// after construction. The scan layer retains only the highest-confidence
/// match per file.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionMatch {
    /// Path of the classified resource.
    pub path: Box<Path>,
    /// Canonical format family identifier (e.g. `"xml"`). Stable across
    /// versions; used as the join key for the diff renderer's content-type
    /// selection.
    pub format: Box<str>,
    /// Finer-grained sub-classification within `format`; may be empty.
    pub variant: Box<str>,
    /// Calibrated confidence in `[0.0, 1.0]`. Not a probability guarantee.
    pub confidence: f64,
    /// Plugin-defined metadata keys plus the catalog-stamped provenance keys.
    pub metadata: BTreeMap<String, MetadataValue>,
    /// Short audit strings explaining which signals contributed.
    /// Never an input to scoring logic.
    pub reasons: Vec<Box<str>>,
}

/// Per-file context handed to detectors alongside the byte sample.
#[derive(Debug, Clone, Copy)]
pub struct DetectContext<'a> {
    path: &'a Path,
}

impl<'a> DetectContext<'a> {
    /// Creates a context for the given path.
    #[must_use]
    pub const fn new(path: &'a Path) -> Self {
        Self { path }
    }

    /// Returns the path being classified.
    #[must_use]
    pub const fn path(&self) -> &'a Path {
        self.path
    }

    /// Returns the lowercased file extension, if any.
    ///
    /// Extensions are hints only: they may contribute a corroborating
    /// signal to scoring but never establish a detection on their own.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }

}

/// A successful plugin detection, before catalog stamping and ranking.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Sub-classification within the plugin's format family; may be empty.
    pub variant: String,
    /// Extracted structural signals; the catalog converts these to a score.
    pub signals: Signals,
    /// Plugin-defined metadata.
    pub metadata: BTreeMap<String, MetadataValue>,
    /// Audit strings naming the signals that contributed.
    pub reasons: Vec<String>,
}

impl Detection {
    /// Creates a detection for the given variant with default signals.
    #[must_use]
    pub fn new(variant: impl Into<String>) -> Self {
        Self {
            variant: variant.into(),
            signals: Signals::default(),
            metadata: BTreeMap::new(),
            reasons: Vec::new(),
        }
    }

    /// Records a metadata key/value pair.
    pub fn insert(&mut self, key: &str, value: impl Into<MetadataValue>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// Records an audit reason string.
    pub fn reason(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }
}

/// A format-family detector plugin.
///
/// Each plugin declares a stable format identifier and a version string,
/// and independently decides whether a byte sample belongs to its family.
/// Plugins that cannot decode the sample return `None` rather than erroring.
pub trait FormatDetector: Send + Sync {
    /// Returns the canonical format family identifier (e.g. `"xml"`).
    fn format(&self) -> &'static str;

    /// Returns the plugin version recorded as `catalog_version` metadata.
    fn version(&self) -> &'static str;

    /// Classifies the sample, returning `Some` only when at least one
    /// structural content signal supports the detection.
    fn detect(&self, sample: &Sample, ctx: &DetectContext<'_>) -> Option<Detection>;
}

/// Ordered registry of format detector plugins.
///
/// Treated as immutable, process-wide configuration after construction;
/// safe to share across scan workers without locking. Registration order
/// is the tie-break order for equal confidence scores.
pub struct Catalog {
    detectors: Vec<Box<dyn FormatDetector>>,
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("detectors", &self.detectors.len())
            .finish_non_exhaustive()
    }
}

impl Catalog {
    /// Creates a catalog containing all built-in format detectors.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(vec![
            Box::new(XmlDetector),
            Box::new(JsonDetector),
            Box::new(YamlDetector),
            Box::new(IniDetector),
            Box::new(ContainerDetector),
        ])
    }

    /// Creates a catalog from an explicit detector list.
    ///
    /// Insertion order becomes the tie-break order on equal confidence.
    #[must_use]
    pub fn new(detectors: Vec<Box<dyn FormatDetector>>) -> Self {
        Self { detectors }
    }

    /// Returns the number of registered detectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// Returns `true` if the catalog has no detectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Classifies one sampled file against every registered plugin.
    ///
    /// Returns matches ordered by descending confidence, ties broken by
    /// plugin registration order, then by variant lexical order. A file no
    /// plugin detects yields an empty vector ("undetected", not an error).
    #[must_use]
    pub fn classify(&self, path: &Path, sample: &Sample) -> Vec<DetectionMatch> {
        let ctx = DetectContext::new(path);
        let mut matches: Vec<(usize, DetectionMatch)> = Vec::new();

        for (order, detector) in self.detectors.iter().enumerate() {
            let Some(detection) = detector.detect(sample, &ctx) else {
                continue;
            };

            #[cfg(feature = "tracing")]
            trace!(format = detector.format(), variant = %detection.variant, "detected");

            matches.push((order, finalize(detector.as_ref(), detection, path, sample)));
        }

        matches.sort_by(|(order_a, a), (order_b, b)| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| order_a.cmp(order_b))
                .then_with(|| a.variant.cmp(&b.variant))
        });

        matches.into_iter().map(|(_, m)| m).collect()
    }
}

/// Stamps the catalog-mandated metadata keys and computes the final score.
fn finalize(detector: &dyn FormatDetector, detection: Detection, path: &Path, sample: &Sample) -> DetectionMatch {
    let Detection {
        variant,
        signals,
        mut metadata,
        reasons,
    } = detection;

    metadata.insert("catalog_format".into(), detector.format().into());
    metadata.insert("catalog_variant".into(), variant.as_str().into());
    metadata.insert("catalog_version".into(), detector.version().into());
    metadata.insert(
        "bytes_sampled".into(),
        MetadataValue::Int(i64::try_from(sample.bytes_sampled()).unwrap_or(i64::MAX)),
    );
    metadata.insert("encoding".into(), sample.encoding().as_str().into());
    metadata.insert("sample_truncated".into(), sample.is_truncated().into());
    metadata.insert("content_sha256".into(), sample.content_sha256().into());

    DetectionMatch {
        path: path.into(),
        format: detector.format().into(),
        variant: variant.into(),
        confidence: score::confidence(&signals),
        metadata,
        reasons: reasons.into_iter().map(Into::into).collect(),
    }
}

/// Hashes a provenance value (e.g. a namespace URI) to a short stable token.
///
/// The raw value is never stored in metadata; only the truncated hex of
/// `sha256("<kind>|<value>")` is recorded.
#[must_use]
pub(crate) fn provenance_hash(kind: &str, value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b"|");
    hasher.update(value.as_bytes());
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(PROVENANCE_HASH_LENGTH);
    hex
}
