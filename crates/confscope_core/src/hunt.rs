//! Rule-based hunting for sensitive or drift-prone tokens.
//!
//! Rules are declarative data: literal token lists matched with an
//! aho-corasick automaton (case-insensitive) plus an optional per-line
//! regex. Compilation happens once, up front, and fails fast on a bad
//! rule so a scan never starts with a half-usable rule set.
//!
//! Evaluation is deliberately simple: every rule sees every line
//! independently. No early exit, no cross-rule state, no deduplication.

use std::path::Path;

use aho_corasick::{AhoCorasick, MatchKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
#[cfg(feature = "tracing")]
use tracing::debug;

use crate::error::{RuleError, ScanError};
use crate::sample::Sample;
use crate::scan::collect_paths;

/// Maximum excerpt length in characters.
pub const EXCERPT_MAX_CHARS: usize = 160;

/// A declarative hunt rule, as authored in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuntRule {
    /// Stable rule identifier (e.g. `"database_server"`).
    pub name: String,
    /// Human-readable description of what the rule flags.
    pub description: String,
    /// Label for the kind of token the rule identifies (e.g. `"hostname"`).
    pub token_name: String,
    /// Literal tokens matched case-insensitively. May be empty when a
    /// `pattern` is given.
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Optional per-line regular expression.
    #[serde(default)]
    pub pattern: Option<String>,
}

/// One rule hit on one line of one file.
#[derive(Debug, Clone, Serialize)]
pub struct HuntHit {
    /// Name of the rule that matched.
    pub rule: Box<str>,
    /// Path of the file containing the line.
    pub path: Box<Path>,
    /// 1-based line number.
    pub line_number: usize,
    /// The line, truncated to [`EXCERPT_MAX_CHARS`] characters.
    pub excerpt: Box<str>,
    /// The matched substrings only, never the surrounding content.
    pub matches: Vec<Box<str>>,
}

struct CompiledRule {
    rule: HuntRule,
    automaton: Option<AhoCorasick>,
    regex: Option<Regex>,
}

/// A set of hunt rules compiled for evaluation.
///
/// Immutable after construction; safe to share across scan workers.
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet").field("rules", &self.rules.len()).finish_non_exhaustive()
    }
}

impl RuleSet {
    /// Compiles declarative rules, failing fast on the first defect.
    pub fn compile(rules: Vec<HuntRule>) -> Result<Self, RuleError> {
        let compiled = rules.into_iter().map(compile_rule).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules: compiled })
    }

    /// Compiles the built-in rule set.
    pub fn builtin() -> Result<Self, RuleError> {
        Self::compile(builtin_rules())
    }

    /// Returns the number of compiled rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if the set has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the declarative form of every compiled rule.
    pub fn rules(&self) -> impl Iterator<Item = &HuntRule> {
        self.rules.iter().map(|c| &c.rule)
    }
}

fn compile_rule(rule: HuntRule) -> Result<CompiledRule, RuleError> {
    if rule.tokens.is_empty() && rule.pattern.is_none() {
        return Err(RuleError::EmptyMatcher { name: rule.name });
    }

    let automaton = if rule.tokens.is_empty() {
        None
    } else {
        Some(
            AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .match_kind(MatchKind::LeftmostLongest)
                .build(&rule.tokens)
                .map_err(|e| RuleError::InvalidTokens {
                    name: rule.name.clone(),
                    message: e.to_string(),
                })?,
        )
    };

    let regex = match &rule.pattern {
        Some(pattern) => Some(Regex::new(pattern).map_err(|source| RuleError::InvalidRegex {
            name: rule.name.clone(),
            source,
        })?),
        None => None,
    };

    Ok(CompiledRule { rule, automaton, regex })
}

/// Built-in rules covering the usual drift-prone tokens in configuration
/// trees: connection fragments, credential assignments, raw addresses,
/// internal hostnames, and numbered database servers.
#[must_use]
pub fn builtin_rules() -> Vec<HuntRule> {
    vec![
        HuntRule {
            name: "connection_string".into(),
            description: "Connection-string fragments that often embed environment-specific endpoints".into(),
            token_name: "connection fragment".into(),
            tokens: vec![
                "connectionString".into(),
                "Data Source=".into(),
                "Initial Catalog=".into(),
                "Server=".into(),
            ],
            pattern: None,
        },
        HuntRule {
            name: "password_assignment".into(),
            description: "Inline password or credential assignment".into(),
            token_name: "credential".into(),
            tokens: Vec::new(),
            pattern: Some(r"(?i)\b(?:password|passwd|pwd)\s*[=:]\s*[^\s;,]+".into()),
        },
        HuntRule {
            name: "ip_address".into(),
            description: "Hard-coded IPv4 address".into(),
            token_name: "address".into(),
            tokens: Vec::new(),
            pattern: Some(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b".into()),
        },
        HuntRule {
            name: "internal_hostname".into(),
            description: "Hostname under an internal-only domain suffix".into(),
            token_name: "hostname".into(),
            tokens: Vec::new(),
            pattern: Some(r"(?i)\b[a-z0-9][a-z0-9-]*\.(?:internal|intranet|corp|local|lan)\b".into()),
        },
        HuntRule {
            name: "database_server".into(),
            description: "Numbered database server name".into(),
            token_name: "server".into(),
            tokens: Vec::new(),
            pattern: Some(r"(?i)\b(?:db|sql|database)[a-z-]*\d+\b".into()),
        },
    ]
}

/// Evaluates every rule against every line of `content` independently.
///
/// Hits are ordered by line number, then by rule order within the set.
#[must_use]
pub fn hunt_content(content: &str, path: &Path, rules: &RuleSet) -> Vec<HuntHit> {
    let mut hits = Vec::new();

    for (index, line) in content.lines().enumerate() {
        for compiled in &rules.rules {
            let matches = line_matches(line, compiled);
            if matches.is_empty() {
                continue;
            }

            hits.push(HuntHit {
                rule: compiled.rule.name.as_str().into(),
                path: path.into(),
                line_number: index + 1,
                excerpt: excerpt_of(line).into(),
                matches,
            });
        }
    }

    hits
}

/// Hunts every readable text file under `root`, in lexical path order.
///
/// Binary and unreadable files are skipped; lines within a file are
/// visited in order and hits are never deduplicated.
pub fn hunt_path(root: &Path, rules: &RuleSet, glob: Option<&str>) -> Result<Vec<HuntHit>, ScanError> {
    let paths = collect_paths(root, glob)?;

    #[cfg(feature = "tracing")]
    debug!(files = paths.len(), rules = rules.len(), "hunting tree");

    let mut hits = Vec::new();
    for path in paths {
        let Ok(content) = std::fs::read(&path) else {
            continue;
        };
        let sample = Sample::from_bytes(&content, content.len());
        let Some(text) = sample.text() else {
            continue;
        };
        hits.extend(hunt_content(&text, &path, rules));
    }

    Ok(hits)
}

fn line_matches(line: &str, compiled: &CompiledRule) -> Vec<Box<str>> {
    let mut matches: Vec<Box<str>> = Vec::new();

    if let Some(automaton) = &compiled.automaton {
        for m in automaton.find_iter(line) {
            matches.push(line[m.start()..m.end()].into());
        }
    }

    if let Some(regex) = &compiled.regex {
        for m in regex.find_iter(line) {
            matches.push(m.as_str().into());
        }
    }

    matches
}

fn excerpt_of(line: &str) -> &str {
    match line.char_indices().nth(EXCERPT_MAX_CHARS) {
        Some((byte_offset, _)) => &line[..byte_offset],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_utils::write_tree;

    fn single_rule(tokens: &[&str], pattern: Option<&str>) -> RuleSet {
        RuleSet::compile(vec![HuntRule {
            name: "test_rule".into(),
            description: "test".into(),
            token_name: "token".into(),
            tokens: tokens.iter().map(|t| (*t).to_string()).collect(),
            pattern: pattern.map(str::to_string),
        }])
        .unwrap()
    }

    #[test]
    fn builtin_rules_compile() {
        let rules = RuleSet::builtin().unwrap();
        assert_eq!(rules.len(), 5);
        assert!(!rules.is_empty());
    }

    #[test]
    fn invalid_regex_fails_fast_with_rule_name() {
        let err = RuleSet::compile(vec![HuntRule {
            name: "broken".into(),
            description: String::new(),
            token_name: String::new(),
            tokens: Vec::new(),
            pattern: Some("[unclosed".into()),
        }])
        .unwrap_err();

        assert!(matches!(err, RuleError::InvalidRegex { name, .. } if name == "broken"));
    }

    #[test]
    fn rule_without_matcher_is_rejected() {
        let err = RuleSet::compile(vec![HuntRule {
            name: "hollow".into(),
            description: String::new(),
            token_name: String::new(),
            tokens: Vec::new(),
            pattern: None,
        }])
        .unwrap_err();

        assert!(matches!(err, RuleError::EmptyMatcher { name } if name == "hollow"));
    }

    #[test]
    fn tokens_match_case_insensitively() {
        let rules = single_rule(&["Server="], None);
        let hits = hunt_content("endpoint: SERVER=db01\n", Path::new("a.yaml"), &rules);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matches, vec!["SERVER=".into()]);
    }

    #[test]
    fn matches_record_matched_substrings_only() {
        let rules = single_rule(&[], Some(r"db\d+"));
        let hits = hunt_content("primary is db01, fallback db02\n", Path::new("f"), &rules);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matches, vec!["db01".into(), "db02".into()]);
    }

    #[test]
    fn rules_are_evaluated_independently_per_line() {
        let rules = RuleSet::compile(vec![
            HuntRule {
                name: "first".into(),
                description: String::new(),
                token_name: String::new(),
                tokens: vec!["db01".into()],
                pattern: None,
            },
            HuntRule {
                name: "second".into(),
                description: String::new(),
                token_name: String::new(),
                tokens: vec!["password".into()],
                pattern: None,
            },
        ])
        .unwrap();

        let hits = hunt_content("db01 password=x\n", Path::new("f"), &rules);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].rule.as_ref(), "first");
        assert_eq!(hits[1].rule.as_ref(), "second");
    }

    #[test]
    fn line_numbers_are_one_based() {
        let rules = single_rule(&["needle"], None);
        let hits = hunt_content("clean\nneedle here\n", Path::new("f"), &rules);

        assert_eq!(hits[0].line_number, 2);
    }

    #[test]
    fn excerpt_is_truncated_to_the_char_limit() {
        let rules = single_rule(&["needle"], None);
        let long_line = format!("needle {}", "x".repeat(500));
        let hits = hunt_content(&long_line, Path::new("f"), &rules);

        assert_eq!(hits[0].excerpt.chars().count(), EXCERPT_MAX_CHARS);
    }

    #[test]
    fn short_lines_are_excerpted_whole() {
        let rules = single_rule(&["needle"], None);
        let hits = hunt_content("a needle line", Path::new("f"), &rules);
        assert_eq!(hits[0].excerpt.as_ref(), "a needle line");
    }

    #[test]
    fn builtin_password_assignment_matches() {
        let rules = RuleSet::builtin().unwrap();
        let hits = hunt_content("Password=hunter2;", Path::new("web.config"), &rules);

        assert!(hits.iter().any(|h| h.rule.as_ref() == "password_assignment"));
    }

    #[test]
    fn builtin_ip_address_matches() {
        let rules = RuleSet::builtin().unwrap();
        let hits = hunt_content("host: 10.0.12.7\n", Path::new("c.yaml"), &rules);

        let hit = hits.iter().find(|h| h.rule.as_ref() == "ip_address").unwrap();
        assert_eq!(hit.matches, vec!["10.0.12.7".into()]);
    }

    #[test]
    fn builtin_internal_hostname_matches() {
        let rules = RuleSet::builtin().unwrap();
        let hits = hunt_content("endpoint=cache.internal\n", Path::new("c.env"), &rules);

        assert!(hits.iter().any(|h| h.rule.as_ref() == "internal_hostname"));
    }

    #[test]
    fn hunt_path_visits_files_in_lexical_order() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("zeta.txt", "needle\n"), ("alpha.txt", "needle\n")]);

        let rules = single_rule(&["needle"], None);
        let hits = hunt_path(dir.path(), &rules, None).unwrap();

        assert_eq!(hits.len(), 2);
        assert!(hits[0].path.ends_with("alpha.txt"));
        assert!(hits[1].path.ends_with("zeta.txt"));
    }

    #[test]
    fn hunt_path_skips_binary_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blob.bin"), [0x80u8, 0x81, 0x82, 0x00]).unwrap();
        fs::write(dir.path().join("plain.txt"), "needle\n").unwrap();

        let rules = single_rule(&["needle"], None);
        let hits = hunt_path(dir.path(), &rules, None).unwrap();

        assert_eq!(hits.len(), 1);
        assert!(hits[0].path.ends_with("plain.txt"));
    }

    #[test]
    fn hunt_path_honours_glob_filter() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("a.config", "needle\n"), ("b.log", "needle\n")]);

        let rules = single_rule(&["needle"], None);
        let hits = hunt_path(dir.path(), &rules, Some("*.config")).unwrap();

        assert_eq!(hits.len(), 1);
        assert!(hits[0].path.ends_with("a.config"));
    }

    #[test]
    fn invalid_glob_is_a_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let rules = single_rule(&["needle"], None);
        let err = hunt_path(dir.path(), &rules, Some("[bad")).unwrap_err();

        assert!(matches!(err, ScanError::InvalidGlob { .. }));
    }
}
