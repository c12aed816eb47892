//! Command-line interface for confscope.
//!
//! Exit codes: 0 on success with nothing to report, 1 when a scan recorded
//! failures, a hunt produced hits, or a diff found differences, and 2 on
//! usage or configuration errors.

mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use confscope_core::{Catalog, Config, ContentType, HuntRule, RuleSet, ScanOptions, hunt_path, render_diff, scan_tree};
use serde::Deserialize;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Classify, diff, and hunt configuration trees.
#[derive(Debug, Parser)]
#[command(name = "confscope", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify every file under a root directory.
    Scan {
        /// Root directory to scan.
        root: PathBuf,
        /// Glob filter applied to file paths.
        #[arg(long)]
        glob: Option<String>,
        /// Maximum bytes sampled per file.
        #[arg(long)]
        sample_cap: Option<usize>,
        /// Worker thread count.
        #[arg(long)]
        threads: Option<usize>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Also report files no plugin detected.
        #[arg(long)]
        include_undetected: bool,
    },
    /// Render a unified diff between two captures of a configuration file.
    Diff {
        /// The earlier capture.
        before: PathBuf,
        /// The later capture.
        after: PathBuf,
        /// Content type controlling the diff strategy.
        #[arg(long, value_enum)]
        content_type: ContentTypeArg,
        /// Literal token to mask on both sides; repeatable.
        #[arg(long = "mask", value_name = "TOKEN")]
        mask: Vec<String>,
        /// Unchanged context lines around each hunk.
        #[arg(long, default_value_t = confscope_core::diff::DEFAULT_CONTEXT_LINES)]
        context: usize,
    },
    /// Hunt a tree for sensitive or drift-prone tokens.
    Hunt {
        /// Root directory to hunt.
        root: PathBuf,
        /// Glob filter applied to file paths.
        #[arg(long)]
        glob: Option<String>,
        /// TOML file of custom rules replacing the configured set.
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable columns.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ContentTypeArg {
    Xml,
    Json,
    Yaml,
    Ini,
    Text,
}

impl ContentTypeArg {
    const fn as_format(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Ini => "ini",
            Self::Text => "text",
        }
    }
}

/// Schema of a `--rules` file: a list of `[[rules]]` tables.
#[derive(Debug, Deserialize)]
struct RulesFile {
    rules: Vec<HuntRule>,
}

fn main() -> ExitCode {
    init_tracing();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Scan {
            root,
            glob,
            sample_cap,
            threads,
            format,
            include_undetected,
        } => run_scan(&root, glob, sample_cap, threads, format, include_undetected),
        Command::Diff {
            before,
            after,
            content_type,
            mask,
            context,
        } => run_diff(&before, &after, content_type, &mask, context),
        Command::Hunt {
            root,
            glob,
            rules,
            format,
        } => run_hunt(&root, glob.as_deref(), rules.as_deref(), format),
    }
}

fn run_scan(
    root: &std::path::Path,
    glob: Option<String>,
    sample_cap: Option<usize>,
    threads: Option<usize>,
    format: OutputFormat,
    include_undetected: bool,
) -> anyhow::Result<ExitCode> {
    let config = Config::load_or_default(root).context("loading configuration")?;
    let options = ScanOptions {
        glob,
        exclude: config.exclude_paths.clone(),
        sample_cap: sample_cap.unwrap_or(config.sample_cap),
        threads: threads.or(config.threads),
        respect_gitignore: config.respect_gitignore,
    };

    let catalog = Catalog::builtin();
    let cancel = AtomicBool::new(false);
    let outcome = scan_tree(root, &catalog, &options, &cancel).context("scanning tree")?;

    match format {
        OutputFormat::Text => output::print_scan_text(&outcome, include_undetected),
        OutputFormat::Json => output::print_scan_json(&outcome, include_undetected)?,
    }

    Ok(if outcome.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn run_diff(
    before: &std::path::Path,
    after: &std::path::Path,
    content_type: ContentTypeArg,
    mask: &[String],
    context: usize,
) -> anyhow::Result<ExitCode> {
    let content_type = ContentType::for_format(content_type.as_format())?;
    let before_bytes = std::fs::read(before).with_context(|| format!("reading {}", before.display()))?;
    let after_bytes = std::fs::read(after).with_context(|| format!("reading {}", after.display()))?;

    let diff = render_diff(
        &before_bytes,
        &after_bytes,
        content_type,
        &before.display().to_string(),
        &after.display().to_string(),
        mask,
        context,
    )?;

    if diff.is_identical() {
        return Ok(ExitCode::SUCCESS);
    }

    print!("{}", diff.to_unified());
    Ok(ExitCode::from(1))
}

fn run_hunt(
    root: &std::path::Path,
    glob: Option<&str>,
    rules: Option<&std::path::Path>,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let rule_set = match rules {
        Some(path) => {
            let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let file: RulesFile = toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
            RuleSet::compile(file.rules)?
        }
        None => {
            let config = Config::load_or_default(root).context("loading configuration")?;
            config.rule_set()?
        }
    };

    let hits = hunt_path(root, &rule_set, glob)?;

    match format {
        OutputFormat::Text => output::print_hunt_text(&hits),
        OutputFormat::Json => output::print_hunt_json(&hits)?,
    }

    Ok(if hits.is_empty() { ExitCode::SUCCESS } else { ExitCode::from(1) })
}
