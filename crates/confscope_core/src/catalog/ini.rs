//! Key-value/INI-like format detector.
//!
//! Requires at least one real key/value pair or a recognized special-case
//! layout (shell-export style, dot-prefixed environment file, properties
//! style) before matching. A comment-only file with an `.ini` extension is
//! never detected.

use super::score::Signals;
use super::{DetectContext, Detection, FormatDetector, PREVIEW_LIMIT};
use crate::sample::Sample;

/// Extensions that corroborate a key-value detection.
const INI_EXTENSIONS: &[&str] = &["ini", "cfg", "conf", "env", "properties", "toml"];

#[derive(Default)]
struct PairScan {
    pairs: usize,
    sections: Vec<String>,
    shell_exports: usize,
    has_comments: bool,
    key_preview: Vec<String>,
    equals_pairs: usize,
    colon_pairs: usize,
    env_style_keys: usize,
}

/// Detector for the key-value/INI-like format family.
#[derive(Debug, Clone, Copy)]
pub struct IniDetector;

impl FormatDetector for IniDetector {
    fn format(&self) -> &'static str {
        "ini"
    }

    fn version(&self) -> &'static str {
        "ini-detector/2"
    }

    fn detect(&self, sample: &Sample, ctx: &DetectContext<'_>) -> Option<Detection> {
        let text = sample.text()?;
        let scan = scan_pairs(&text);

        // At least one real pair is required; extension-only relaxation
        // is disallowed.
        if scan.pairs == 0 && scan.shell_exports == 0 {
            return None;
        }

        let mut detection = Detection::new(variant_of(&scan));
        detection.signals = Signals::parsed();
        detection.reason(format!("{} key/value pairs", scan.pairs + scan.shell_exports));

        if !scan.sections.is_empty() {
            detection.signals.corroborate();
            detection.reason("section headers present");
        }
        if scan.has_comments {
            detection.signals.corroborate();
            detection.reason("recognized comment style");
        }
        if scan.shell_exports > 0 {
            detection.signals.corroborate();
            detection.reason("shell-export assignments");
        }
        if let Some(ext) = ctx.extension()
            && INI_EXTENSIONS.contains(&ext.as_str())
        {
            detection.signals.corroborate();
            detection.reason(format!("extension hint '.{ext}'"));
        }

        detection.insert(
            "pair_count",
            i64::try_from(scan.pairs + scan.shell_exports).unwrap_or(i64::MAX),
        );
        if !scan.sections.is_empty() {
            detection.insert("sections", scan.sections.clone());
        }
        if !scan.key_preview.is_empty() {
            detection.insert("key_preview", scan.key_preview.clone());
        }

        Some(detection)
    }
}

/// Derives the variant from content layout only, so renaming a file never
/// changes it. The path stays an extension hint in scoring.
fn variant_of(scan: &PairScan) -> &'static str {
    if scan.shell_exports > 0 && scan.shell_exports >= scan.pairs {
        return "shell-env";
    }
    if scan.colon_pairs > scan.equals_pairs {
        return "properties";
    }
    if scan.sections.is_empty()
        && scan.colon_pairs == 0
        && scan.equals_pairs > 0
        && scan.env_style_keys == scan.equals_pairs
    {
        return "dotenv";
    }
    "ini"
}

fn scan_pairs(text: &str) -> PairScan {
    let mut scan = PairScan::default();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with(';') || trimmed.starts_with('#') {
            scan.has_comments = true;
            continue;
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') && trimmed.len() > 2 {
            if scan.sections.len() < PREVIEW_LIMIT {
                scan.sections.push(trimmed[1..trimmed.len() - 1].to_string());
            }
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("export ")
            && split_pair(rest, '=').is_some()
        {
            scan.shell_exports += 1;
            record_key(&mut scan, rest, '=');
            continue;
        }

        if let Some((key, _)) = split_pair(trimmed, '=') {
            scan.pairs += 1;
            scan.equals_pairs += 1;
            if is_env_style_key(key) {
                scan.env_style_keys += 1;
            }
            record_key(&mut scan, trimmed, '=');
        } else if split_pair(trimmed, ':').is_some() {
            scan.pairs += 1;
            scan.colon_pairs += 1;
            record_key(&mut scan, trimmed, ':');
        }
    }

    scan
}

fn record_key(scan: &mut PairScan, line: &str, separator: char) {
    if scan.key_preview.len() >= PREVIEW_LIMIT {
        return;
    }
    if let Some((key, _)) = split_pair(line, separator) {
        let key = key.to_string();
        if !scan.key_preview.contains(&key) {
            scan.key_preview.push(key);
        }
    }
}

/// An UPPER_SNAKE key, the naming convention of env files.
fn is_env_style_key(key: &str) -> bool {
    key.starts_with(|c: char| c.is_ascii_uppercase())
        && key.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Splits a `key<sep>value` line, requiring a non-empty single-token key.
fn split_pair(line: &str, separator: char) -> Option<(&str, &str)> {
    let idx = line.find(separator)?;
    let key = line[..idx].trim();
    let value = line[idx + 1..].trim();

    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    // A pair needs an actual value or at least the separator at line end
    // with a bare key (common in INI, e.g. "flag=").
    Some((key, value))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::catalog::MetadataValue;
    use crate::sample::DEFAULT_SAMPLE_CAP;

    fn detect(content: &str, path: &str) -> Option<Detection> {
        let sample = Sample::from_bytes(content.as_bytes(), DEFAULT_SAMPLE_CAP);
        IniDetector.detect(&sample, &DetectContext::new(Path::new(path)))
    }

    #[test]
    fn detects_sectioned_ini() {
        let content = "[database]\nserver = db01\nport = 5432\n\n[logging]\nlevel = warn\n";
        let detection = detect(content, "app.ini").unwrap();

        assert_eq!(detection.variant, "ini");
        assert_eq!(
            detection.metadata.get("sections"),
            Some(&MetadataValue::List(vec!["database".into(), "logging".into()]))
        );
        assert_eq!(detection.metadata.get("pair_count"), Some(&MetadataValue::Int(3)));
    }

    #[test]
    fn comment_only_ini_file_is_not_detected() {
        // Comment lines with no pairs must not detect, even with the
        // .ini extension.
        let content = "# first comment\n# second comment\n";
        assert!(detect(content, "empty.ini").is_none());
    }

    #[test]
    fn detects_dotenv_layout() {
        let content = "DATABASE_URL=postgres://db01/app\nDEBUG=false\n";
        let detection = detect(content, ".env").unwrap();
        assert_eq!(detection.variant, "dotenv");
    }

    #[test]
    fn dotenv_stage_files_share_the_variant() {
        let detection = detect("KEY=value\n", ".env.production").unwrap();
        assert_eq!(detection.variant, "dotenv");
    }

    #[test]
    fn detects_shell_export_layout() {
        let content = "export PATH=/usr/bin\nexport EDITOR=vim\n";
        let detection = detect(content, "profile").unwrap();

        assert_eq!(detection.variant, "shell-env");
        assert_eq!(detection.metadata.get("pair_count"), Some(&MetadataValue::Int(2)));
    }

    #[test]
    fn detects_properties_layout() {
        let content = "log.level: warn\ndb.host: db01\n";
        let detection = detect(content, "app.properties").unwrap();
        assert_eq!(detection.variant, "properties");
    }

    #[test]
    fn records_key_preview() {
        let content = "alpha = 1\nbeta = 2\n";
        let detection = detect(content, "a.cfg").unwrap();

        assert_eq!(
            detection.metadata.get("key_preview"),
            Some(&MetadataValue::List(vec!["alpha".into(), "beta".into()]))
        );
    }

    #[test]
    fn extension_alone_never_detects() {
        assert!(detect("nothing structured here", "file.ini").is_none());
    }

    #[test]
    fn extension_hint_raises_corroboration_only() {
        let content = "key = value\n";
        let with_hint = detect(content, "a.ini").unwrap();
        let without_hint = detect(content, "a.unknown").unwrap();

        assert!(with_hint.signals.corroborating > without_hint.signals.corroborating);
        assert_eq!(with_hint.variant, without_hint.variant);
    }

    #[test]
    fn variant_survives_renaming() {
        // Variants come from content layout; the path is a hint only.
        let dotenv = "DATABASE_URL=postgres://db01/app\nDEBUG=false\n";
        assert_eq!(detect(dotenv, ".env").unwrap().variant, "dotenv");
        assert_eq!(detect(dotenv, "renamed.txt").unwrap().variant, "dotenv");

        let properties = "log.level: warn\ndb.host: db01\n";
        assert_eq!(detect(properties, "app.properties").unwrap().variant, "properties");
        assert_eq!(detect(properties, "app.bak").unwrap().variant, "properties");
    }

    #[test]
    fn sectioned_uppercase_keys_stay_plain_ini() {
        let content = "[database]\nHOST=db01\nPORT=5432\n";
        assert_eq!(detect(content, "app.ini").unwrap().variant, "ini");
    }

    #[test]
    fn keys_with_spaces_are_not_pairs() {
        // Prose with an equals sign is not a key/value line.
        assert!(detect("this sentence = not a pair\n", "notes.txt").is_none());
    }

    #[test]
    fn bare_key_with_trailing_separator_counts() {
        let detection = detect("flag=\n", "a.ini").unwrap();
        assert_eq!(detection.metadata.get("pair_count"), Some(&MetadataValue::Int(1)));
    }
}
