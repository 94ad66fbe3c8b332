use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use domain_backup::cli::{handle_backup_command, handle_config_command, BackupCommands, ConfigArgs};
use domain_backup::config::{paths, Settings};
use domain_backup::display::format_warnings;
use domain_backup::{BackupError, Outcome};

const LOG_ENV_VAR: &str = "DOMAIN_BACKUP_LOG";

#[derive(Parser)]
#[command(
    name = "domain-backup",
    author = "Kaylee Beyene",
    version,
    about = "Versioned backup and transactional restore of server domains",
    long_about = "domain-backup takes versioned zip snapshots of a server domain \
                  directory and restores a domain from them. A restore is swapped \
                  into place so that a failure leaves the original domain intact."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Backup(BackupCommands),

    /// Show or change the stored settings
    Config(ConfigArgs),
}

/// Deletes files that could not be removed during the operation
struct PendingCleanup(Vec<PathBuf>);

impl Drop for PendingCleanup {
    fn drop(&mut self) {
        for path in &self.0 {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "deferred cleanup failed");
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings_path = paths::settings_file()?;
    let settings = Settings::load_or_default(&settings_path)?;

    let result = match cli.command {
        Commands::Backup(cmd) => handle_backup_command(&settings, cmd),
        Commands::Config(args) => handle_config_command(&settings_path, settings, args),
    };

    let report = match result {
        Ok(report) => report,
        Err(e @ BackupError::SwapUnrecoverable { .. }) => {
            eprintln!("{}", e);
            return Ok(ExitCode::from(2));
        }
        Err(e) if e.severity() == Outcome::Warning => {
            eprintln!("{}", e);
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => return Err(e.into()),
    };

    let _cleanup = PendingCleanup(report.pending_cleanup.clone());

    if !report.message.is_empty() {
        // A warning with nothing recorded means there was nothing to do
        if report.outcome == Outcome::Warning && !report.has_warnings() {
            eprintln!("{}", report.message);
        } else {
            println!("{}", report.message);
        }
    }
    for line in format_warnings(&report) {
        eprintln!("{}", line);
    }

    Ok(match report.outcome {
        Outcome::Failure => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Commands::Backup(cmd) => cmd.domain_args().verbose,
        Commands::Config(_) => false,
    };
    init_logging(verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
