//! User configuration loaded from `.confscope.toml`.
//!
//! All fields are optional in the file; a missing file or missing field
//! falls back to permissive defaults so a bare `confscope scan .` always
//! works.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CONFIG_FILENAME;
use crate::error::RuleError;
use crate::hunt::{HuntRule, RuleSet, builtin_rules};
use crate::sample::DEFAULT_SAMPLE_CAP;

/// Errors that can occur when loading or persisting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config at {path}: {source}")]
    Read {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The configuration could not be serialized.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// The underlying TOML serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// The configuration file could not be written.
    #[error("failed to write config to {path}: {source}")]
    Write {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Confscope configuration, as authored in `.confscope.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maximum bytes sampled per file during classification.
    pub sample_cap: usize,
    /// Glob patterns for paths excluded from scans and hunts.
    pub exclude_paths: Vec<String>,
    /// Worker thread count; `None` uses the rayon default.
    pub threads: Option<usize>,
    /// Whether tree walks honour `.gitignore` files. Off by default:
    /// configuration trees routinely gitignore the interesting files.
    pub respect_gitignore: bool,
    /// Custom hunt rules appended to the built-in set.
    pub rules: Vec<HuntRule>,
    /// Names of built-in rules to disable.
    pub disabled_rules: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_cap: DEFAULT_SAMPLE_CAP,
            exclude_paths: Vec::new(),
            threads: None,
            respect_gitignore: false,
            rules: Vec::new(),
            disabled_rules: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration from an explicit file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `.confscope.toml` from `dir`, or the defaults when absent.
    ///
    /// A present-but-invalid file is still an error; silently ignoring a
    /// typo in a config file is worse than failing.
    pub fn load_or_default(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILENAME);
        if path.is_file() { Self::load(&path) } else { Ok(Self::default()) }
    }

    /// Writes the configuration to `path` as TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Compiles the effective hunt rule set: built-ins minus the disabled
    /// names, plus the custom rules.
    pub fn rule_set(&self) -> Result<RuleSet, RuleError> {
        let mut rules: Vec<HuntRule> = builtin_rules()
            .into_iter()
            .filter(|rule| !self.disabled_rules.contains(&rule.name))
            .collect();
        rules.extend(self.rules.iter().cloned());
        RuleSet::compile(rules)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn defaults_are_permissive() {
        let config = Config::default();

        assert_eq!(config.sample_cap, DEFAULT_SAMPLE_CAP);
        assert!(config.exclude_paths.is_empty());
        assert_eq!(config.threads, None);
        assert!(!config.respect_gitignore);
        assert!(config.rules.is_empty());
        assert!(config.disabled_rules.is_empty());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(config.sample_cap, DEFAULT_SAMPLE_CAP);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "sample_cap = 262144\n").unwrap();

        let config = Config::load_or_default(dir.path()).unwrap();

        assert_eq!(config.sample_cap, 262_144);
        assert!(!config.respect_gitignore);
    }

    #[test]
    fn full_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);

        let config = Config {
            sample_cap: 65_536,
            exclude_paths: vec!["target/**".into()],
            threads: Some(4),
            respect_gitignore: true,
            rules: vec![HuntRule {
                name: "legacy_endpoint".into(),
                description: "retired service endpoint".into(),
                token_name: "endpoint".into(),
                tokens: vec!["legacy.internal".into()],
                pattern: None,
            }],
            disabled_rules: vec!["ip_address".into()],
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.sample_cap, 65_536);
        assert_eq!(loaded.threads, Some(4));
        assert_eq!(loaded.rules.len(), 1);
        assert_eq!(loaded.disabled_rules, vec!["ip_address".to_string()]);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "sample_cap = [not an int\n").unwrap();

        let err = Config::load_or_default(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "sampel_cap = 100\n").unwrap();

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn rule_set_applies_disables_and_custom_rules() {
        let config = Config {
            disabled_rules: vec!["ip_address".into()],
            rules: vec![HuntRule {
                name: "custom".into(),
                description: String::new(),
                token_name: String::new(),
                tokens: vec!["needle".into()],
                pattern: None,
            }],
            ..Config::default()
        };

        let rule_set = config.rule_set().unwrap();
        let names: Vec<_> = rule_set.rules().map(|r| r.name.clone()).collect();

        assert!(!names.contains(&"ip_address".to_string()));
        assert!(names.contains(&"custom".to_string()));
        assert!(names.contains(&"password_assignment".to_string()));
    }

    #[test]
    fn rule_set_rejects_invalid_custom_rule() {
        let config = Config {
            rules: vec![HuntRule {
                name: "bad".into(),
                description: String::new(),
                token_name: String::new(),
                tokens: Vec::new(),
                pattern: Some("(unclosed".into()),
            }],
            ..Config::default()
        };

        assert!(config.rule_set().is_err());
    }
}
