//! Indentation-delimited (line-oriented) format detector.
//!
//! Classification is heuristic and line-based: the detector samples
//! structure rather than building a document tree. At least one explicit
//! structural signal (key-colon line, list marker, or document-start
//! marker) is required; indentation changes only corroborate.

use super::score::Signals;
use super::{DetectContext, Detection, FormatDetector, PREVIEW_LIMIT};
use crate::sample::Sample;

/// Extensions that corroborate an indentation-delimited detection.
const YAML_EXTENSIONS: &[&str] = &["yml", "yaml"];

#[derive(Default)]
struct LineScan {
    key_lines: usize,
    list_items: usize,
    document_starts: usize,
    document_ends: usize,
    indentation_changes: usize,
    has_comments: bool,
    top_level_keys: Vec<String>,
}

/// Detector for the indentation-delimited format family.
#[derive(Debug, Clone, Copy)]
pub struct YamlDetector;

impl FormatDetector for YamlDetector {
    fn format(&self) -> &'static str {
        "yaml"
    }

    fn version(&self) -> &'static str {
        "yaml-detector/2"
    }

    fn detect(&self, sample: &Sample, ctx: &DetectContext<'_>) -> Option<Detection> {
        let text = sample.text()?;
        let scan = scan_lines(&text);

        // Structural signal required; extension alone is insufficient.
        if scan.key_lines == 0 && scan.list_items == 0 && scan.document_starts == 0 {
            return None;
        }

        let document_count = scan.document_starts.max(1);
        let mut detection = Detection::new(if document_count > 1 { "multi-document" } else { "document" });
        detection.signals = Signals::parsed();

        if scan.key_lines > 0 {
            detection.reason(format!("{} key-colon lines", scan.key_lines));
        }
        if scan.list_items > 0 {
            detection.signals.corroborate();
            detection.reason(format!("{} list markers", scan.list_items));
        }
        if scan.document_starts > 0 {
            detection.signals.corroborate();
            detection.reason("explicit document-start marker");
        }
        if scan.indentation_changes > 0 {
            detection.signals.corroborate();
            detection.reason("meaningful indentation changes");
        }
        if scan.has_comments {
            detection.signals.corroborate();
            detection.reason("recognized comment style");
        }
        if let Some(ext) = ctx.extension()
            && YAML_EXTENSIONS.contains(&ext.as_str())
        {
            detection.signals.corroborate();
            detection.reason(format!("extension hint '.{ext}'"));
        }

        detection.insert("document_count", i64::try_from(document_count).unwrap_or(i64::MAX));
        detection.insert("key_line_count", i64::try_from(scan.key_lines).unwrap_or(i64::MAX));
        detection.insert("list_item_count", i64::try_from(scan.list_items).unwrap_or(i64::MAX));
        if !scan.top_level_keys.is_empty() {
            detection.insert("top_level_key_preview", scan.top_level_keys.clone());
        }

        Some(detection)
    }
}

fn scan_lines(text: &str) -> LineScan {
    let mut scan = LineScan::default();
    let mut prev_indent: Option<usize> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('#') {
            scan.has_comments = true;
            continue;
        }

        if line.starts_with("---") {
            scan.document_starts += 1;
            continue;
        }
        if line.starts_with("...") {
            scan.document_ends += 1;
            continue;
        }

        let indent = line.len() - trimmed.len();
        if let Some(prev) = prev_indent
            && prev != indent
        {
            scan.indentation_changes += 1;
        }
        prev_indent = Some(indent);

        if trimmed.starts_with("- ") || trimmed == "-" {
            scan.list_items += 1;
            continue;
        }

        if let Some(key) = key_of(trimmed) {
            scan.key_lines += 1;
            if indent == 0 && scan.top_level_keys.len() < PREVIEW_LIMIT && !scan.top_level_keys.contains(&key) {
                scan.top_level_keys.push(key);
            }
        }
    }

    scan
}

/// Extracts the key from a `key: value` or `key:` line.
///
/// The colon must terminate the key or be followed by whitespace so that
/// URLs (`http://...`) and Windows paths don't count as mappings.
fn key_of(trimmed: &str) -> Option<String> {
    let colon = trimmed.find(':')?;
    let key = trimmed[..colon].trim();
    let rest = &trimmed[colon + 1..];

    if key.is_empty() {
        return None;
    }
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }

    Some(key.to_string())
}
