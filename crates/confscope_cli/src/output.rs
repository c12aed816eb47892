//! Text and JSON output formatters.

use confscope_core::{HuntHit, ScanOutcome};
use serde::Serialize;

/// Metadata keys shown in the text table's preview column.
const METADATA_PREVIEW_KEYS: usize = 4;

#[derive(Serialize)]
struct UndetectedRecord<'a> {
    path: &'a std::path::Path,
    detected: bool,
}

#[derive(Serialize)]
struct ScanReport<'a> {
    matches: &'a [confscope_core::DetectionMatch],
    failures: &'a [confscope_core::ScanFailure],
    #[serde(skip_serializing_if = "Option::is_none")]
    undetected: Option<Vec<UndetectedRecord<'a>>>,
}

/// Prints one row per detection: path, format, variant, confidence to two
/// decimal places, and a bounded preview of metadata keys.
pub(crate) fn print_scan_text(outcome: &ScanOutcome, include_undetected: bool) {
    for m in &outcome.matches {
        let keys: Vec<&str> = m
            .metadata
            .keys()
            .filter(|k| !k.starts_with("catalog_"))
            .take(METADATA_PREVIEW_KEYS)
            .map(String::as_str)
            .collect();

        println!(
            "{}\t{}\t{}\t{:.2}\t{}",
            m.path.display(),
            m.format,
            variant_or_dash(&m.variant),
            m.confidence,
            keys.join(",")
        );
    }

    if include_undetected {
        for path in &outcome.undetected {
            println!("{}\t(undetected)", path.display());
        }
    }

    for failure in &outcome.failures {
        eprintln!("failed: {}: {}", failure.path.display(), failure.message);
    }
}

/// Prints the scan outcome as a JSON document.
///
/// Undetected files are emitted as `{"path": ..., "detected": false}`
/// records, and only when asked for.
pub(crate) fn print_scan_json(outcome: &ScanOutcome, include_undetected: bool) -> anyhow::Result<()> {
    let report = ScanReport {
        matches: &outcome.matches,
        failures: &outcome.failures,
        undetected: include_undetected.then(|| {
            outcome
                .undetected
                .iter()
                .map(|path| UndetectedRecord { path, detected: false })
                .collect()
        }),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Prints one row per hunt hit: location, rule, matches, excerpt.
pub(crate) fn print_hunt_text(hits: &[HuntHit]) {
    for hit in hits {
        println!(
            "{}:{}\t[{}]\t{}\t{}",
            hit.path.display(),
            hit.line_number,
            hit.rule,
            hit.matches.join(", "),
            hit.excerpt
        );
    }
}

/// Prints hunt hits as a JSON array.
pub(crate) fn print_hunt_json(hits: &[HuntHit]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(hits)?);
    Ok(())
}

fn variant_or_dash(variant: &str) -> &str {
    if variant.is_empty() { "-" } else { variant }
}
