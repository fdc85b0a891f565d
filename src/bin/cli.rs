//! Gazette Crawler CLI
//!
//! Single-pass entry point, meant to be invoked by an external scheduler.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use gazette_crawler::{
    error::Result,
    models::Config,
    pipeline::{self, RunOutcome},
    services::render_report,
    storage,
    utils::open_log_file,
};

/// gazette-crawler - Kenya Law gazette watcher
#[derive(Parser, Debug)]
#[command(
    name = "gazette-crawler",
    version,
    about = "Notifies about new energy-sector gazette notices"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Append log lines to this file instead of stderr
    #[arg(long, env = "GAZETTE_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover, notify and store new notices (default)
    Run {
        /// Print the report instead of sending and storing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate configuration
    Validate,

    /// Show what the store holds
    Info,
}

/// Initialize logging based on verbosity flag, optionally into a file.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder.format_timestamp_secs();
    if let Some(path) = log_file {
        let file = open_log_file(path)?;
        builder
            .target(env_logger::Target::Pipe(Box::new(file)))
            .write_style(env_logger::WriteStyle::Never);
    }
    builder.init();
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = Config::load_or_default(&cli.config).with_env_secrets();
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command.unwrap_or(Command::Run { dry_run: false }) {
        Command::Run { dry_run: false } => {
            let outcome = pipeline::run_pipeline(&config).await.inspect_err(|e| {
                log::error!("Run failed: {}", e);
            })?;
            match outcome {
                RunOutcome::NotFound | RunOutcome::Empty { .. } => log::warn!("{}", outcome),
                _ => log::info!("{}", outcome),
            }
        }

        Command::Run { dry_run: true } => match pipeline::preview(&config).await? {
            Some(preview) => {
                let pending = preview.pending.as_ref().map_or(0, |b| b.len());
                log::info!(
                    "{} of {} notice(s) for {} would be published",
                    pending,
                    preview.listed.len(),
                    preview.listed.publication_date()
                );
                if let Some(batch) = &preview.pending {
                    println!("{}", render_report(batch));
                }
            }
            None => log::warn!("{}", RunOutcome::NotFound),
        },

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Site and storage settings OK");

            if let Err(e) = config.mail.validate() {
                log::error!("Mail validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Mail settings OK ({} recipient(s))", config.mail.to.len());

            log::info!("All validations passed!");
        }

        Command::Info => {
            let store = storage::open(&config).await?;
            let summary = store.summary().await?;
            log::info!("Store: {}", summary.location);
            log::info!("Stored notices: {}", summary.row_count);
            match summary.latest_date {
                Some(date) => log::info!("Latest stored date: {}", date),
                None => log::info!("No notices stored yet."),
            }
        }
    }

    Ok(())
}
