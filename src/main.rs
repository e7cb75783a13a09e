//! dupefind - find groups of files with identical content.
//!
//! Usage:
//!   dupefind [OPTIONS] <DIRS>...
//!   dupefind --config dupefind.toml [DIRS]...
//!   dupefind --help
//!
//! Exit status: 0 when duplicates were found, 2 when none were, 1 on error
//! and 130 when interrupted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use clap::{ArgAction, Parser, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};

use dupefind_analyze::{DuplicateFinder, DuplicateReport};
use dupefind_core::{CompareStrategy, DepthPolicy, DigestAlgorithm, ScanConfig, ScanError};

const EXIT_NO_DUPLICATES: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(
    name = "dupefind",
    version,
    about = "Find groups of files with identical content",
    long_about = "dupefind walks one or more directory trees, groups files by size \
                  and then by content, and prints every group of two or more \
                  identical files.\n\n\
                  Settings may come from a TOML file given with --config; flags \
                  given on the command line take precedence."
)]
struct Cli {
    /// Directories to scan
    #[arg(required_unless_present = "config")]
    dirs: Vec<PathBuf>,

    /// Directory to skip, with everything below it (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "DIR")]
    exclude: Vec<PathBuf>,

    /// Recursion depth: negative for unlimited, 0 for top level only
    #[arg(short, long, allow_hyphen_values = true)]
    level: Option<i64>,

    /// Minimum file size to consider (e.g., "10", "1KB", "2MB")
    #[arg(short, long)]
    min_size: Option<String>,

    /// Shell-glob matched against file names (repeatable)
    #[arg(long = "mask", value_name = "GLOB")]
    masks: Vec<String>,

    /// Match masks without regard to case
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Bytes read per chunk while comparing
    #[arg(short, long)]
    block_size: Option<usize>,

    /// Digest algorithm
    #[arg(short, long, value_enum)]
    algo: Option<AlgoArg>,

    /// How files of equal size are compared
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Confirm digest matches byte for byte
    #[arg(long)]
    verify: bool,

    /// Read settings from a TOML file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Report progress on stderr
    #[arg(short, long)]
    progress: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AlgoArg {
    Crc32,
    Md5,
    Blake3,
}

impl From<AlgoArg> for DigestAlgorithm {
    fn from(arg: AlgoArg) -> Self {
        match arg {
            AlgoArg::Crc32 => Self::Crc32,
            AlgoArg::Md5 => Self::Md5,
            AlgoArg::Blake3 => Self::Blake3,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Pairwise,
    DigestOnce,
}

impl From<StrategyArg> for CompareStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Pairwise => Self::Pairwise,
            StrategyArg::DigestOnce => Self::DigestOnce,
        }
    }
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = build_config(&cli)?;
    tracing::debug!(?config, "resolved configuration");

    let finder = DuplicateFinder::new();
    let cancel = finder.cancellation_token().clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted, stopping...");
        cancel.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    let reporter = cli.progress.then(|| spawn_progress_reporter(&finder));

    let result = finder.find_duplicates(&config);

    // Closing the channels ends the reporter thread.
    drop(finder);
    if let Some(handle) = reporter {
        let _ = handle.join();
    }

    let report = match result {
        Ok(report) => report,
        Err(ScanError::Interrupted) => return Ok(ExitCode::from(EXIT_INTERRUPTED)),
        Err(err) => return Err(err).context("Duplicate search failed"),
    };

    match cli.format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.has_duplicates() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_NO_DUPLICATES))
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Layer command-line flags over the optional config file.
fn build_config(cli: &Cli) -> Result<ScanConfig> {
    let mut config = match &cli.config {
        Some(path) => ScanConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ScanConfig {
            roots: Vec::new(),
            ..ScanConfig::new(PathBuf::new())
        },
    };

    config.roots.extend(cli.dirs.iter().cloned());
    config.exclude.extend(cli.exclude.iter().cloned());
    if let Some(level) = cli.level {
        config.depth = DepthPolicy::from_level(level);
    }
    if let Some(min_size) = &cli.min_size {
        config.min_size = parse_size(min_size)
            .with_context(|| format!("Invalid minimum size '{min_size}'"))?;
    }
    if !cli.masks.is_empty() {
        config.masks = cli.masks.clone();
    }
    if cli.ignore_case {
        config.case_insensitive = true;
    }
    if let Some(block_size) = cli.block_size {
        config.block_size = block_size;
    }
    if let Some(algo) = cli.algo {
        config.algorithm = algo.into();
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy.into();
    }
    if cli.verify {
        config.verify_bytes = true;
    }

    if config.roots.is_empty() {
        bail!("No directories to scan: pass them as arguments or set `roots` in the config file");
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Print scan and comparison progress to stderr until the finder is dropped.
fn spawn_progress_reporter(finder: &DuplicateFinder) -> thread::JoinHandle<()> {
    let mut scan_rx = finder.subscribe_scan();
    let mut hash_rx = finder.subscribe();

    thread::spawn(move || {
        use tokio::sync::broadcast::error::RecvError;

        loop {
            match scan_rx.blocking_recv() {
                Ok(progress) if progress.finished => {
                    eprintln!(
                        "Scanned {} files ({}) in {:.2}s, {:.0} files/s",
                        progress.files_scanned,
                        format_size(progress.bytes_scanned),
                        progress.elapsed.as_secs_f64(),
                        progress.files_per_second()
                    );
                    break;
                }
                Ok(progress) => eprintln!(
                    "Scanned {} files ({})",
                    progress.files_scanned,
                    format_size(progress.bytes_scanned)
                ),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return,
            }
        }

        loop {
            match hash_rx.blocking_recv() {
                Ok(progress) => eprintln!(
                    "Compared {}/{} size groups ({} comparisons)",
                    progress.buckets_done, progress.buckets_total, progress.comparisons
                ),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return,
            }
        }
    })
}

fn print_text(report: &DuplicateReport) {
    println!();
    println!("{}", "─".repeat(70));
    println!(" Duplicate File Report");
    println!("{}", "─".repeat(70));
    println!();

    if report.groups.is_empty() {
        println!(" No duplicate files found.");
    } else {
        println!(
            " Found {} duplicate groups ({} files)",
            report.group_count,
            report.total_duplicate_files()
        );
        println!(
            " Total wasted space: {}",
            format_size(report.total_wasted_space)
        );
        println!();

        for (i, group) in report.groups.iter().enumerate() {
            println!(
                " Group {} ({} files, {} each, {} wasted)",
                i + 1,
                group.count(),
                format_size(group.size),
                format_size(group.wasted_bytes())
            );
            for path in &group.files {
                println!("   {}", path.display());
            }
            println!();
        }
    }

    println!(
        " {} files scanned, {} compared, {} comparisons",
        report.files_scanned, report.files_compared, report.comparisons
    );

    if report.is_partial() {
        println!();
        println!(" {} warning(s); results may be incomplete:", report.warnings.len());
        for warning in &report.warnings {
            println!("   {}: {}", warning.path.display(), warning.message);
        }
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Parse a size string (e.g., "10", "1KB", "2MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();

    let multiplier: u64 = if s.ends_with("GB") || s.ends_with('G') {
        1024 * 1024 * 1024
    } else if s.ends_with("MB") || s.ends_with('M') {
        1024 * 1024
    } else if s.ends_with("KB") || s.ends_with('K') {
        1024
    } else {
        1
    };

    let num: f64 = s
        .trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.')
        .parse()?;
    if num < 0.0 || !num.is_finite() {
        bail!("size must be a non-negative number");
    }

    Ok((num * multiplier as f64) as u64)
}
