//! Binary-container format detector.
//!
//! Recognizes settings stores that are binary at the byte level: SQLite
//! database files and binary property lists. Detection rests entirely on
//! the file's magic header; the table preview is an enrichment that only
//! runs when the file exists on disk.

use rusqlite::{Connection, OpenFlags};

use super::score::Signals;
use super::{DetectContext, Detection, FormatDetector};
use crate::sample::Sample;

/// SQLite database file header (first 16 bytes).
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

/// Binary property list header.
const BPLIST_MAGIC: &[u8] = b"bplist00";

/// Extensions that corroborate a container detection.
const CONTAINER_EXTENSIONS: &[&str] = &["db", "sqlite", "sqlite3", "db3", "plist"];

/// Maximum table names recorded in the `table_preview` metadata key.
const TABLE_PREVIEW_LIMIT: usize = 16;

/// Detector for binary settings containers.
#[derive(Debug, Clone, Copy)]
pub struct ContainerDetector;

impl FormatDetector for ContainerDetector {
    fn format(&self) -> &'static str {
        "binary-container"
    }

    fn version(&self) -> &'static str {
        "container-detector/2"
    }

    fn detect(&self, sample: &Sample, ctx: &DetectContext<'_>) -> Option<Detection> {
        let bytes = sample.bytes();

        let mut detection = if bytes.starts_with(SQLITE_MAGIC) {
            let mut detection = Detection::new("sqlite");
            detection.signals = Signals::parsed();
            detection.reason("sqlite magic header");

            if let Some(page_size) = sqlite_page_size(bytes) {
                detection.signals.corroborate();
                detection.reason("valid page size field");
                detection.insert("page_size", i64::from(page_size));
            }

            // Table enumeration needs the real file, not just the sample.
            if let Some(tables) = list_tables(ctx) {
                detection.signals.corroborate();
                detection.reason(format!("{} user tables enumerated", tables.len()));
                detection.insert("table_count", i64::try_from(tables.len()).unwrap_or(i64::MAX));
                detection.insert("table_preview", tables);
            }

            detection
        } else if bytes.starts_with(BPLIST_MAGIC) {
            let mut detection = Detection::new("plist");
            detection.signals = Signals::parsed();
            detection.reason("binary plist magic header");
            detection
        } else {
            return None;
        };

        if let Some(ext) = ctx.extension()
            && CONTAINER_EXTENSIONS.contains(&ext.as_str())
        {
            detection.signals.corroborate();
            detection.reason(format!("extension hint '.{ext}'"));
        }

        Some(detection)
    }
}

/// Reads the big-endian page size at offset 16 and validates it.
///
/// Valid values are powers of two between 512 and 32768, or 1 (meaning
/// 65536 in the file format).
fn sqlite_page_size(bytes: &[u8]) -> Option<u32> {
    let raw = u16::from_be_bytes([*bytes.get(16)?, *bytes.get(17)?]);
    match raw {
        1 => Some(65_536),
        512..=32_768 if raw.is_power_of_two() => Some(u32::from(raw)),
        _ => None,
    }
}

/// Enumerates user table names from the database, read-only.
///
/// Returns `None` when the path does not exist or the database cannot be
/// opened; enumeration failure never blocks the header-based detection.
fn list_tables(ctx: &DetectContext<'_>) -> Option<Vec<String>> {
    if !ctx.path().is_file() {
        return None;
    }

    let conn = Connection::open_with_flags(ctx.path(), OpenFlags::SQLITE_OPEN_READ_ONLY).ok()?;
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
        .ok()?;

    let tables: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .ok()?
        .filter_map(Result::ok)
        .take(TABLE_PREVIEW_LIMIT)
        .collect();

    Some(tables)
}
