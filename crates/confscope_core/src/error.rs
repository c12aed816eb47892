use thiserror::Error;

/// Errors that can occur when compiling a hunt rule.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule's regular expression failed to compile.
    #[error("invalid regex in rule '{name}': {source}")]
    InvalidRegex {
        /// Name of the rule that failed (e.g. `"database_server"`).
        name: String,
        /// The underlying regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// The rule declared neither literal tokens nor a regex pattern.
    #[error("rule '{name}' has no tokens and no pattern")]
    EmptyMatcher {
        /// Name of the rule with no matcher.
        name: String,
    },

    /// The rule's literal token set could not be compiled into an automaton.
    #[error("invalid token set in rule '{name}': {message}")]
    InvalidTokens {
        /// Name of the rule that failed.
        name: String,
        /// Description of the automaton build failure.
        message: String,
    },
}

/// Errors that can occur when rendering a diff.
///
/// Failure messages reference labels and content types only; they never
/// carry raw payload content.
#[derive(Debug, Error)]
pub enum DiffError {
    /// The requested content type has no diff strategy.
    #[error("unsupported content type '{format}'")]
    UnsupportedContentType {
        /// The format identifier that could not be mapped to a strategy.
        format: String,
    },

    /// One side of the diff could not be decoded as text.
    #[error("input '{label}' is not valid text")]
    Undecodable {
        /// Display label of the side that failed to decode.
        label: String,
    },

    /// The mask token set could not be compiled into an automaton.
    #[error("invalid mask tokens: {message}")]
    InvalidMaskTokens {
        /// Description of the automaton build failure.
        message: String,
    },
}

/// Errors that can occur when setting up a tree scan or hunt.
///
/// Per-file I/O failures during a scan are collected in the scan outcome
/// rather than raised through this type; only configuration defects that
/// must fail fast are represented here.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A glob filter could not be compiled.
    #[error("invalid glob '{pattern}': {source}")]
    InvalidGlob {
        /// The glob pattern that failed to compile.
        pattern: String,
        /// The underlying glob compilation error.
        #[source]
        source: globset::Error,
    },

    /// The worker thread pool could not be constructed.
    #[error("failed to build scan thread pool: {source}")]
    ThreadPool {
        /// The underlying pool construction error.
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

/// Top-level error type for the confscope pipeline.
///
/// Unifies errors from rule compilation, configuration loading, diff
/// rendering, and scan setup into a single type for callers that
/// orchestrate the full workflow.
#[derive(Debug, Error)]
pub enum ConfscopeError {
    /// A hunt rule failed to compile.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// Configuration could not be read, parsed, or written.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// A diff could not be rendered.
    #[error(transparent)]
    Diff(#[from] DiffError),

    /// A scan could not be set up.
    #[error(transparent)]
    Scan(#[from] ScanError),
}
