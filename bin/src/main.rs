//! ohlcvault CLI - Incremental Kraken OHLC archiver.

use anyhow::{Context, Result};
use clap::Parser;
use ohlcvault_lib::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

mod commands;
mod display;
mod logging;

#[derive(Parser, Debug)]
#[command(name = "ohlcvault")]
#[command(about = "Archive Kraken OHLC snapshot CSVs into monthly Parquet files", long_about = None)]
#[command(version)]
struct Cli {
    /// Root of the source snapshot tree
    #[arg(short, long)]
    input: PathBuf,

    /// Root of the Parquet archive [default: parquet-data]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Download fresh snapshots from Kraken before archiving
    #[arg(long)]
    download: bool,

    /// Archive a flat legacy tree instead of running incrementally
    #[arg(long)]
    migrate: bool,

    /// Delete source files once they are archived
    #[arg(long)]
    delete_csv: bool,

    /// Restore every processed source file, then exit
    #[arg(long, conflicts_with_all = ["download", "migrate", "restore_errors"])]
    restore: bool,

    /// Restore every source file in the error state, then exit
    #[arg(long, conflicts_with_all = ["download", "migrate"])]
    restore_errors: bool,

    /// Only fetch and archive these pairs (comma separated)
    #[arg(long, value_delimiter = ',')]
    pairs: Vec<String>,

    /// Move unparseable source files to the error state
    #[arg(long)]
    mark_errors: bool,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Layout of newly created partitions (nested, flat)
    #[arg(long)]
    layout: Option<ArchiveLayout>,

    /// Quiet mode (suppress progress output)
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Builds the run configuration: flags over file values over defaults.
    fn archive_config(&self) -> Result<ArchiveConfig> {
        let mut config = match &self.config {
            Some(path) => ArchiveConfig::from_toml_file(path)?,
            None => ArchiveConfig::load_default()?,
        };

        config.input.clone_from(&self.input);
        if let Some(output) = &self.output {
            config.output.clone_from(output);
        }
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if !self.pairs.is_empty() {
            config.pairs.clone_from(&self.pairs);
        }
        config.mark_errors |= self.mark_errors;
        config.delete_processed |= self.delete_csv;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level, &cli.input) {
        eprintln!("Error: {e:#}");
        return ExitCode::from(1);
    }

    match run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{e:#}"), "fatal");
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: &Cli) -> Result<u8> {
    let config = cli.archive_config().context("Invalid configuration")?;

    if cli.restore || cli.restore_errors {
        return commands::restore::restore(config.input, cli.restore_errors, cli.quiet).await;
    }

    let mut code = 0;
    if cli.download {
        #[cfg(feature = "fetch")]
        match commands::download::download(&config, cli.quiet).await {
            Ok(downloaded) => code = downloaded,
            Err(e) => {
                // Snapshots already on disk are still archived.
                error!(error = %format!("{e:#}"), "download failed");
                eprintln!("Download failed: {e:#}");
                code = 2;
            }
        }
        #[cfg(not(feature = "fetch"))]
        {
            anyhow::bail!("Kraken download support not compiled in");
        }
    }

    let archived = commands::archive::archive(config, cli.migrate, cli.quiet).await?;
    Ok(code.max(archived))
}
