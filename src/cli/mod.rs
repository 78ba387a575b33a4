//! nomad-prep CLI Module
//!
//! Command-line interface for running the preparation and inspecting inputs.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::pipeline::{Pipeline, PipelineReport};
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<22} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "nomad-prep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Prepare user and session tables for destination prediction")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full preparation
    Run {
        /// JSON configuration file (defaults apply to omitted fields)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory with train_users.csv, test_users.csv and sessions.csv
        #[arg(long)]
        raw_dir: Option<PathBuf>,

        /// Directory receiving the output tables
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Worker threads for session aggregation (default: all cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Per-user aggregation timeout in milliseconds
        #[arg(long)]
        task_timeout_ms: Option<u64>,
    },

    /// Show rows and columns of a CSV file
    Info {
        /// Input CSV file
        data: PathBuf,
    },

    /// Print the default configuration as JSON
    Config,
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Build the run configuration from an optional file and flag overrides
pub fn resolve_config(
    config_path: Option<&Path>,
    raw_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    threads: Option<usize>,
    task_timeout_ms: Option<u64>,
) -> crate::Result<PipelineConfig> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(dir) = raw_dir {
        config.paths.raw_dir = dir;
    }
    if let Some(dir) = output_dir {
        config.paths.output_dir = dir;
    }
    if let Some(n) = threads {
        config.parallel.n_threads = Some(n);
    }
    if let Some(ms) = task_timeout_ms {
        config.parallel.task_timeout_ms = ms;
    }

    config.validate()?;
    Ok(config)
}

pub fn cmd_run(
    config_path: Option<&Path>,
    raw_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    threads: Option<usize>,
    task_timeout_ms: Option<u64>,
) -> anyhow::Result<()> {
    section("Prepare");

    let config = resolve_config(config_path, raw_dir, output_dir, threads, task_timeout_ms)?;
    kv("Raw data", &config.paths.raw_dir.display().to_string());
    kv("Output", &config.paths.output_dir.display().to_string());
    kv("Threads", &config.parallel.num_threads().to_string());

    step_run("Running pipeline");
    let start = Instant::now();
    let report = Pipeline::new(config)?.run()?;
    step_ok(&format!("done in {:.2?}", start.elapsed()));

    print_report(&report);
    Ok(())
}

fn print_report(report: &PipelineReport) {
    section("Summary");
    kv("Train users", &report.train_users.to_string());
    kv("Test users", &report.test_users.to_string());
    kv("Session events", &report.session_events.to_string());
    kv("Events without user", &report.discarded_events.to_string());
    kv("Session users", &report.session_users.to_string());
    kv("Session-only users", &report.session_only_users.to_string());
    kv("Ages set missing", &report.user_cleaning.ages_nulled.to_string());
    kv(
        "Unknown markers",
        &(report.user_cleaning.unknown_replaced + report.session_cleaning.unknown_replaced)
            .to_string(),
    );
    kv("Retried tasks", &report.dispatch.retried.to_string());

    section("Outputs");
    for output in &report.outputs {
        step_ok(&format!(
            "{} {}",
            output.path.display(),
            dim(&format!("{} rows × {} cols", output.rows, output.columns))
        ));
    }
    println!();
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let info = DataLoader::new().get_file_info(data_path)?;

    kv("File", &info.path.display().to_string());
    kv("Size", &format!("{:.2} MB", info.file_size as f64 / 1024.0 / 1024.0));
    kv("Rows", &info.n_rows.to_string());
    kv("Columns", &info.n_cols.to_string());
    println!();

    for column in &info.columns {
        println!("  {} {}", dim("·"), column);
    }

    println!();
    Ok(())
}

pub fn cmd_config() -> anyhow::Result<()> {
    println!("{}", PipelineConfig::default().to_json()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = resolve_config(
            None,
            Some(PathBuf::from("in")),
            Some(PathBuf::from("out")),
            Some(3),
            Some(500),
        )
        .unwrap();

        assert_eq!(config.paths.raw_dir, PathBuf::from("in"));
        assert_eq!(config.paths.output_dir, PathBuf::from("out"));
        assert_eq!(config.parallel.n_threads, Some(3));
        assert_eq!(config.parallel.task_timeout_ms, 500);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        assert!(resolve_config(None, None, None, None, Some(0)).is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from(["nomad-prep", "run", "--raw-dir", "raw", "-t", "2"]).unwrap();
        match cli.command {
            Commands::Run { raw_dir, threads, .. } => {
                assert_eq!(raw_dir, Some(PathBuf::from("raw")));
                assert_eq!(threads, Some(2));
            }
            _ => panic!("expected run"),
        }
    }
}
