//! dtrust - software-origin trust assessment for a Linux root filesystem
//!
//! `collect` writes a JSON TrustReport to stdout (or `--out`), `score` reads
//! one back and prints the score. Logs always go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use dtrust_core::manual::{DEFAULT_AREAS, DEFAULT_SCAN_LIMIT};
use dtrust_core::{ReportAssembler, ScanConfig, Tier, TrustReport, WeightConfig};

mod score_table;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "dtrust",
    about = "Assess software-origin trust signals of a Linux root filesystem",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "info", global = true)]
    log_level: LogLevel,
}

#[derive(Parser, Debug)]
enum Command {
    /// Collect a trust report from a root filesystem
    Collect {
        /// Root of the filesystem to inspect
        #[clap(long, default_value = "/")]
        rootfs: PathBuf,

        /// Collection depth: 1 = repositories only, 2 = everything
        #[clap(long, default_value = "2", value_parser = clap::value_parser!(u8).range(1..=2))]
        tier: u8,

        /// Output file, `-` for stdout
        #[clap(long, default_value = "-")]
        out: PathBuf,

        /// Wall-clock budget for the whole scan in seconds, 0 disables it
        #[clap(long, default_value = "15")]
        max_seconds: u64,

        /// Maximum entries recorded per manual install area
        #[clap(long, default_value_t = DEFAULT_SCAN_LIMIT)]
        scan_limit: usize,

        /// Manual install area to inventory (repeatable, default /usr/local and /opt)
        #[clap(long = "area")]
        areas: Vec<String>,
    },

    /// Score a previously collected report
    Score {
        /// Path to a report produced by `dtrust collect`
        report: PathBuf,

        /// Weight configuration (YAML); defaults to the user config file if present
        #[clap(long)]
        weights: Option<PathBuf>,

        /// Print the full ScoreResult as JSON instead of a table
        #[clap(long)]
        json: bool,
    },
}

/// Initialize tracing with CLI flags
fn initialize_tracing(log_level: &LogLevel) {
    let filter = EnvFilter::new(log_level.to_filter_directive());

    // stdout carries the JSON document only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level);

    match cli.command {
        Command::Collect {
            rootfs,
            tier,
            out,
            max_seconds,
            scan_limit,
            areas,
        } => {
            let tier = Tier::try_from(tier).map_err(anyhow::Error::msg)?;
            let config = ScanConfig {
                rootfs,
                tier,
                scan_limit,
                manual_areas: if areas.is_empty() {
                    DEFAULT_AREAS.iter().map(|a| a.to_string()).collect()
                } else {
                    areas
                },
                max_duration: (max_seconds > 0).then(|| Duration::from_secs(max_seconds)),
            };
            collect_command(config, out)
        }
        Command::Score {
            report,
            weights,
            json,
        } => score_command(report, weights, json),
    }
}

fn collect_command(config: ScanConfig, out: PathBuf) -> Result<()> {
    if !config.rootfs.is_dir() {
        anyhow::bail!("Root filesystem {} is not a directory", config.rootfs.display());
    }

    let report = ReportAssembler::new(config).assemble();
    if report.is_partial() {
        warn!("Manual area inventory was truncated; the report is partial");
    }

    let json = report.to_json_pretty().context("Failed to serialize report")?;

    if out.as_os_str() == "-" {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{json}").context("Failed to write report to stdout")?;
    } else {
        fs::write(&out, format!("{json}\n"))
            .with_context(|| format!("Failed to write report to {}", out.display()))?;
        info!("Report written to {}", out.display());
    }
    Ok(())
}

fn score_command(report_path: PathBuf, weights: Option<PathBuf>, json: bool) -> Result<()> {
    let content = fs::read_to_string(&report_path)
        .with_context(|| format!("Failed to read report {}", report_path.display()))?;
    let report = TrustReport::from_json(&content)
        .with_context(|| format!("Failed to parse report {}", report_path.display()))?;

    if major(&report.schema_version) != major(dtrust_core::SCHEMA_VERSION) {
        warn!(
            "Report schema {} differs from supported {}; scoring anyway",
            report.schema_version,
            dtrust_core::SCHEMA_VERSION
        );
    }

    let weights_path = match weights {
        Some(path) => {
            if !path.exists() {
                warn!("Weights file {} not found, using built-in defaults", path.display());
            }
            Some(path)
        }
        None => default_weights_path().filter(|p| p.exists()),
    };
    debug!("Weights path: {:?}", weights_path);
    let weights = WeightConfig::load_or_default(weights_path.as_deref());

    let result = dtrust_core::score(&report, &weights);

    let mut stdout = io::stdout().lock();
    if json {
        let json = result.to_json_pretty().context("Failed to serialize score")?;
        writeln!(stdout, "{json}")?;
    } else {
        writeln!(stdout, "{}", score_table::render(&report, &result))?;
    }
    Ok(())
}

/// `<platform config dir>/dtrust/scoring.yaml`
fn default_weights_path() -> Option<PathBuf> {
    use directories::ProjectDirs;

    ProjectDirs::from("", "", "dtrust").map(|dirs| dirs.config_dir().join("scoring.yaml"))
}

fn major(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_defaults() {
        let cli = Cli::try_parse_from(["dtrust", "collect"]).unwrap();
        match cli.command {
            Command::Collect {
                rootfs,
                tier,
                out,
                max_seconds,
                scan_limit,
                areas,
            } => {
                assert_eq!(rootfs, PathBuf::from("/"));
                assert_eq!(tier, 2);
                assert_eq!(out, PathBuf::from("-"));
                assert_eq!(max_seconds, 15);
                assert_eq!(scan_limit, DEFAULT_SCAN_LIMIT);
                assert!(areas.is_empty());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_tier_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["dtrust", "collect", "--tier", "3"]).is_err());
    }

    #[test]
    fn test_major_version() {
        assert_eq!(major("3.0.0"), "3");
        assert_eq!(major("garbage"), "garbage");
    }
}
