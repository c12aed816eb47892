//! Structured-settings (brace-delimited) format detector.
//!
//! Parses strict JSON first, then retries after stripping `//` line comments
//! for settings dialects that allow them. Comment stripping is string-aware:
//! a `//` inside a string literal never truncates the value.

use serde_json::Value;

use super::score::Signals;
use super::{DetectContext, Detection, FormatDetector, MetadataValue, PREVIEW_LIMIT};
use crate::sample::Sample;

/// Extensions that corroborate a structured-settings detection.
const JSON_EXTENSIONS: &[&str] = &["json", "jsonc", "json5"];

/// Analysis window in characters, independent of the byte sample cap.
const ANALYSIS_WINDOW_CHARS: usize = 200_000;

/// Detector for the brace-delimited structured-settings family.
#[derive(Debug, Clone, Copy)]
pub struct JsonDetector;

impl FormatDetector for JsonDetector {
    fn format(&self) -> &'static str {
        "json"
    }

    fn version(&self) -> &'static str {
        "json-detector/2"
    }

    fn detect(&self, sample: &Sample, ctx: &DetectContext<'_>) -> Option<Detection> {
        let text = sample.text()?;
        let (window, window_truncated) = analysis_window(&text);

        let trimmed = window.trim_start();
        if !trimmed.starts_with(['{', '[', '"']) && !looks_scalar(trimmed) {
            return None;
        }

        let (value, stripped_comments) = parse_with_recovery(window)?;

        let mut detection = Detection::new(variant_of(&value, stripped_comments));
        detection.signals = Signals {
            structural_parse: true,
            corroborating: 0,
            recovered_parse: stripped_comments,
        };
        detection.reason("well-formed structured settings");

        let has_comments = has_line_comments(window);
        detection.insert("has_comments", has_comments);
        detection.insert("parsed_with_comment_stripping", stripped_comments);
        detection.insert("analysis_window_truncated", window_truncated);

        if stripped_comments {
            detection.reason("parsed after comment stripping");
        }
        if has_comments {
            detection.signals.corroborate();
            detection.reason("recognized comment style");
        }
        if trimmed.starts_with(['{', '[']) {
            detection.signals.corroborate();
            detection.reason("brace-delimited document");
        }
        if let Some(ext) = ctx.extension()
            && JSON_EXTENSIONS.contains(&ext.as_str())
        {
            detection.signals.corroborate();
            detection.reason(format!("extension hint '.{ext}'"));
        }

        if let Value::Object(map) = &value {
            detection.insert("top_level_key_count", i64::try_from(map.len()).unwrap_or(i64::MAX));
            detection.insert("top_level_key_preview", key_preview(map));
        }

        Some(detection)
    }
}

fn analysis_window(text: &str) -> (&str, bool) {
    match text.char_indices().nth(ANALYSIS_WINDOW_CHARS) {
        Some((byte_offset, _)) => (&text[..byte_offset], true),
        None => (text, false),
    }
}

fn looks_scalar(trimmed: &str) -> bool {
    matches!(trimmed.chars().next(), Some(c) if c.is_ascii_digit() || c == '-')
        || trimmed.starts_with("true")
        || trimmed.starts_with("false")
        || trimmed.starts_with("null")
        || trimmed.starts_with("//")
}

fn parse_with_recovery(window: &str) -> Option<(Value, bool)> {
    if let Ok(value) = serde_json::from_str::<Value>(window) {
        return Some((value, false));
    }

    if !has_line_comments(window) {
        return None;
    }

    let stripped = strip_line_comments(window);
    serde_json::from_str::<Value>(&stripped).ok().map(|v| (v, true))
}

fn variant_of(value: &Value, stripped_comments: bool) -> &'static str {
    if stripped_comments {
        return "jsonc";
    }
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        _ => "scalar",
    }
}

fn key_preview(map: &serde_json::Map<String, Value>) -> MetadataValue {
    let keys: Vec<String> = map.keys().take(PREVIEW_LIMIT).cloned().collect();
    MetadataValue::List(keys)
}

fn has_line_comments(window: &str) -> bool {
    window != strip_line_comments(window)
}

/// Removes `//` comments without corrupting string literals.
///
/// Tracks string state and escape sequences so `"http://host"` survives
/// intact while `{ } // trailing note` loses the note.
fn strip_line_comments(window: &str) -> String {
    let mut out = String::with_capacity(window.len());

    for line in window.split_inclusive('\n') {
        out.push_str(strip_line(line));
        if line.ends_with('\n') && !out.ends_with('\n') {
            out.push('\n');
        }
    }

    out
}

fn strip_line(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    let mut prev_slash: Option<usize> = None;

    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => {
                in_string = !in_string;
                prev_slash = None;
            }
            '/' if !in_string => {
                if let Some(start) = prev_slash {
                    return &line[..start];
                }
                prev_slash = Some(idx);
            }
            _ => prev_slash = None,
        }
    }

    line
}
