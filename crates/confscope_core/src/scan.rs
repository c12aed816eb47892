//! Parallel file-tree scanning.
//!
//! The orchestrator walks a tree, samples each file, and classifies it
//! against an immutable [`Catalog`] shared across rayon workers. Paths are
//! sorted lexically before the parallel classify; the order-preserving
//! `par_iter().map().collect()` then yields deterministic output with no
//! post-sort.
//!
//! Per-file I/O failures never abort the walk; they are collected in the
//! outcome with the path and error message only, never file content.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::Serialize;
#[cfg(feature = "tracing")]
use tracing::debug;

use crate::catalog::{Catalog, DetectionMatch};
use crate::error::ScanError;
use crate::sample::{DEFAULT_SAMPLE_CAP, Sample};

/// Options controlling a tree scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Optional glob filter applied to every file path.
    pub glob: Option<String>,
    /// Glob patterns for paths excluded from the walk.
    pub exclude: Vec<String>,
    /// Maximum bytes sampled per file.
    pub sample_cap: usize,
    /// Worker thread count; `None` uses the rayon default.
    pub threads: Option<usize>,
    /// Whether the walk honours `.gitignore` files.
    pub respect_gitignore: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            glob: None,
            exclude: Vec::new(),
            sample_cap: DEFAULT_SAMPLE_CAP,
            threads: None,
            respect_gitignore: false,
        }
    }
}

/// A per-file failure recorded during a scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanFailure {
    /// Path of the file that could not be processed.
    pub path: Box<Path>,
    /// The I/O error message. Never contains file content.
    pub message: String,
}

/// The complete result of scanning one tree.
#[derive(Debug, Default, Serialize)]
pub struct ScanOutcome {
    /// Best (highest-confidence) match per detected file, in lexical
    /// path order.
    pub matches: Vec<DetectionMatch>,
    /// Files no plugin detected. Kept separate from `matches` so callers
    /// opt in to reporting them.
    pub undetected: Vec<Box<Path>>,
    /// Per-file failures encountered during the scan.
    pub failures: Vec<ScanFailure>,
}

enum FileOutcome {
    Match(Box<DetectionMatch>),
    Undetected(Box<Path>),
    Failure(ScanFailure),
    Skipped,
}

/// Scans the tree under `root`, classifying every matching file.
///
/// Cancellation is cooperative: `cancel` is checked before each file, and
/// files seen after it flips are simply not processed. The partial outcome
/// gathered so far is still returned.
pub fn scan_tree(root: &Path, catalog: &Catalog, options: &ScanOptions, cancel: &AtomicBool) -> Result<ScanOutcome, ScanError> {
    let paths = collect_filtered(root, options.glob.as_deref(), &options.exclude, options.respect_gitignore)?;

    #[cfg(feature = "tracing")]
    debug!(files = paths.len(), detectors = catalog.len(), "scanning tree");

    let classify_all = || {
        paths
            .par_iter()
            .map(|path| {
                if cancel.load(Ordering::Relaxed) {
                    return FileOutcome::Skipped;
                }
                classify_one(path, catalog, options.sample_cap)
            })
            .collect::<Vec<_>>()
    };

    let results = match options.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|source| ScanError::ThreadPool { source })?;
            pool.install(classify_all)
        }
        None => classify_all(),
    };

    let mut outcome = ScanOutcome::default();
    for result in results {
        match result {
            FileOutcome::Match(m) => outcome.matches.push(*m),
            FileOutcome::Undetected(path) => outcome.undetected.push(path),
            FileOutcome::Failure(failure) => outcome.failures.push(failure),
            FileOutcome::Skipped => {}
        }
    }

    Ok(outcome)
}

fn classify_one(path: &Path, catalog: &Catalog, sample_cap: usize) -> FileOutcome {
    let sample = match Sample::read(path, sample_cap) {
        Ok(sample) => sample,
        Err(e) => {
            return FileOutcome::Failure(ScanFailure {
                path: path.into(),
                message: e.to_string(),
            });
        }
    };

    let mut matches = catalog.classify(path, &sample);
    if matches.is_empty() {
        FileOutcome::Undetected(path.into())
    } else {
        FileOutcome::Match(Box::new(matches.remove(0)))
    }
}

/// Walks `root` and returns matching file paths in lexical order.
///
/// Hidden files are included and gitignore handling is off: configuration
/// trees routinely keep the interesting files hidden or ignored.
pub(crate) fn collect_paths(root: &Path, glob: Option<&str>) -> Result<Vec<PathBuf>, ScanError> {
    collect_filtered(root, glob, &[], false)
}

fn collect_filtered(root: &Path, glob: Option<&str>, exclude: &[String], respect_gitignore: bool) -> Result<Vec<PathBuf>, ScanError> {
    let glob_set = build_glob_set(glob.as_slice())?;
    let exclude_set = build_glob_set(exclude)?;

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(respect_gitignore)
        .git_global(false)
        .git_exclude(false)
        .build();

    let mut paths: Vec<PathBuf> = walker
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(ignore::DirEntry::into_path)
        .filter(|path| glob_set.as_ref().is_none_or(|set| set.is_match(path)))
        .filter(|path| exclude_set.as_ref().is_none_or(|set| !set.is_match(path)))
        .collect();

    paths.sort();
    Ok(paths)
}

fn build_glob_set<S: AsRef<str>>(patterns: &[S]) -> Result<Option<GlobSet>, ScanError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let compiled = GlobBuilder::new(pattern)
            .build()
            .map_err(|source| ScanError::InvalidGlob {
                pattern: pattern.to_string(),
                source,
            })?;
        builder.add(compiled);
    }

    let set = builder.build().map_err(|source| ScanError::InvalidGlob {
        pattern: patterns.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", "),
        source,
    })?;

    Ok(Some(set))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::catalog::MetadataValue;
    use crate::test_utils::write_tree;

    fn scan(root: &Path, options: &ScanOptions) -> ScanOutcome {
        let catalog = Catalog::builtin();
        let cancel = AtomicBool::new(false);
        scan_tree(root, &catalog, options, &cancel).unwrap()
    }

    #[test]
    fn scans_a_mixed_tree() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                ("app.config", "<configuration><appSettings/></configuration>"),
                ("settings.json", r#"{"mode": "primary"}"#),
                ("notes", "no structure whatsoever"),
            ],
        );

        let outcome = scan(dir.path(), &ScanOptions::default());

        assert_eq!(outcome.matches.len(), 2);
        assert_eq!(outcome.undetected.len(), 1);
        assert!(outcome.failures.is_empty());
        assert!(outcome.undetected[0].ends_with("notes"));
    }

    #[test]
    fn output_is_in_lexical_path_order() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("zz.json", "{}"), ("aa.json", "{}"), ("mm.json", "{}")]);

        let outcome = scan(dir.path(), &ScanOptions::default());

        let names: Vec<_> = outcome
            .matches
            .iter()
            .map(|m| m.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["aa.json", "mm.json", "zz.json"]);
    }

    #[test]
    fn repeated_scans_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            fs::write(dir.path().join(format!("f{i:02}.json")), format!("{{\"n\": {i}}}")).unwrap();
        }

        let first = scan(dir.path(), &ScanOptions::default());
        let second = scan(dir.path(), &ScanOptions::default());

        let paths = |o: &ScanOutcome| o.matches.iter().map(|m| m.path.clone()).collect::<Vec<_>>();
        assert_eq!(paths(&first), paths(&second));
    }

    #[test]
    fn keeps_only_the_best_match_per_file() {
        let dir = tempfile::tempdir().unwrap();
        // Detectable by both the yaml and ini detectors; exactly one
        // match must survive.
        fs::write(dir.path().join("service.conf"), "host: db01\nport: 5432\n").unwrap();

        let outcome = scan(dir.path(), &ScanOptions::default());
        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn glob_filters_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.json"), "{}").unwrap();
        fs::write(dir.path().join("skip.yaml"), "a: 1\n").unwrap();

        let options = ScanOptions {
            glob: Some("*.json".into()),
            ..ScanOptions::default()
        };
        let outcome = scan(dir.path(), &options);

        assert_eq!(outcome.matches.len(), 1);
        assert!(outcome.matches[0].path.ends_with("keep.json"));
    }

    #[test]
    fn exclude_globs_remove_paths_from_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("keep.json", "{}"), ("generated/skip.json", "{}")]);

        let options = ScanOptions {
            exclude: vec!["**/generated/**".into()],
            ..ScanOptions::default()
        };
        let outcome = scan(dir.path(), &options);

        assert_eq!(outcome.matches.len(), 1);
        assert!(outcome.matches[0].path.ends_with("keep.json"));
    }

    #[test]
    fn gitignore_is_honoured_only_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".gitignore"), "ignored.json\n").unwrap();
        fs::write(dir.path().join("ignored.json"), "{}").unwrap();
        fs::write(dir.path().join("tracked.json"), "{}").unwrap();

        let default_outcome = scan(dir.path(), &ScanOptions::default());
        assert!(default_outcome.matches.iter().any(|m| m.path.ends_with("ignored.json")));

        let options = ScanOptions {
            respect_gitignore: true,
            ..ScanOptions::default()
        };
        let respectful = scan(dir.path(), &options);
        assert!(!respectful.matches.iter().any(|m| m.path.ends_with("ignored.json")));
        assert!(respectful.matches.iter().any(|m| m.path.ends_with("tracked.json")));
    }

    #[test]
    fn invalid_glob_fails_before_walking() {
        let dir = tempfile::tempdir().unwrap();
        let options = ScanOptions {
            glob: Some("[broken".into()),
            ..ScanOptions::default()
        };

        let catalog = Catalog::builtin();
        let cancel = AtomicBool::new(false);
        let err = scan_tree(dir.path(), &catalog, &options, &cancel).unwrap_err();

        assert!(matches!(err, ScanError::InvalidGlob { pattern, .. } if pattern == "[broken"));
    }

    #[test]
    fn hidden_files_are_scanned() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "KEY=value\n").unwrap();

        let outcome = scan(dir.path(), &ScanOptions::default());

        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].variant.as_ref(), "dotenv");
    }

    #[test]
    fn sample_cap_is_applied_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let numbers: Vec<String> = (0..2000).map(|i| i.to_string()).collect();
        let body = format!("[{}]", numbers.join(", "));
        fs::write(dir.path().join("big.json"), &body).unwrap();

        let options = ScanOptions {
            sample_cap: 64,
            ..ScanOptions::default()
        };
        let outcome = scan(dir.path(), &options);

        // The capped sample cuts the array short, so json cannot detect
        // it; the file lands in undetected with nothing read past the cap.
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.undetected.len(), 1);
    }

    #[test]
    fn explicit_thread_count_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();

        let options = ScanOptions {
            threads: Some(1),
            ..ScanOptions::default()
        };
        let outcome = scan(dir.path(), &options);

        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn pre_set_cancellation_processes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();

        let catalog = Catalog::builtin();
        let cancel = AtomicBool::new(true);
        let outcome = scan_tree(dir.path(), &catalog, &ScanOptions::default(), &cancel).unwrap();

        assert!(outcome.matches.is_empty());
        assert!(outcome.undetected.is_empty());
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn nonexistent_root_yields_an_empty_outcome() {
        let outcome = scan(Path::new("/nonexistent/confscope-scan-root"), &ScanOptions::default());

        assert!(outcome.matches.is_empty());
        assert!(outcome.undetected.is_empty());
    }

    #[test]
    fn stamped_metadata_reaches_the_outcome() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"k": 1}"#).unwrap();

        let outcome = scan(dir.path(), &ScanOptions::default());
        let metadata = &outcome.matches[0].metadata;

        assert_eq!(metadata.get("catalog_format"), Some(&"json".into()));
        assert_eq!(metadata.get("sample_truncated"), Some(&false.into()));
        assert!(matches!(metadata.get("content_sha256"), Some(MetadataValue::Str(_))));
    }
}
