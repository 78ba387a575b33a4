//! nomad-prep - Main Entry Point

use clap::Parser;
use nomad_prep::cli::{cmd_config, cmd_info, cmd_run, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nomad_prep=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            raw_dir,
            output_dir,
            threads,
            task_timeout_ms,
        } => {
            cmd_run(
                config.as_deref(),
                raw_dir,
                output_dir,
                threads,
                task_timeout_ms,
            )?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
        Commands::Config => {
            cmd_config()?;
        }
    }

    Ok(())
}
