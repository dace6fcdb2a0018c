use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use collection_mirror::{
    init_logging, CoreConfig, CoreService, LogFormat, LoggingConfig, PageRequest, SyncSettings,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(version, about = "Mirror a Discogs collection into a local SQLite database")]
struct CliArgs {
    /// Path to the SQLite database file.
    #[arg(long, env = "COLLECTION_DB", default_value = "collection.db")]
    db: PathBuf,

    /// Log output format: pretty, json or compact.
    #[arg(long, env = "LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log workspace crates at debug level.
    #[arg(short, long)]
    verbose: bool,

    /// Log filter directives, overriding --verbose.
    #[arg(long, env = "RUST_LOG")]
    log_filter: Option<String>,

    /// Hours after which the mirror counts as stale.
    #[arg(long)]
    stale_after_hours: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a personal access token and store it as the local user.
    Register {
        #[arg(long, env = "DISCOGS_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Run a full sync now and print its report.
    Sync,
    /// Print the latest sync record and rate-limit state.
    Status,
    /// Print stored releases, refreshing first if the mirror is stale.
    List {
        /// Only releases filed in this folder.
        #[arg(long)]
        folder: Option<i64>,

        /// Zero-based page of results.
        #[arg(long, default_value_t = 0)]
        page: u32,

        #[arg(long, default_value_t = 50)]
        page_size: u32,

        /// Print what is stored without refreshing a stale mirror.
        #[arg(long)]
        no_wait: bool,
    },
}

fn logging_config(cli: &CliArgs) -> LoggingConfig {
    let mut config = LoggingConfig::default();
    if let Some(format) = cli.log_format {
        config = config.with_format(format);
    }
    if cli.verbose {
        config = config.with_level(Level::DEBUG);
    }
    if let Some(filter) = &cli.log_filter {
        config = config.with_filter(filter.clone());
    }
    config
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();
    init_logging(logging_config(&cli)).context("Failed to initialize logging")?;

    let mut settings = SyncSettings::default();
    if let Some(hours) = cli.stale_after_hours {
        let threshold = Duration::from_secs(hours.saturating_mul(3600));
        settings = settings.with_staleness_threshold(threshold);
    }

    let config = CoreConfig::builder()
        .database_path(&cli.db)
        .sync_settings(settings)
        .build()
        .context("Invalid configuration")?;

    info!(database = %cli.db.display(), "Opening collection mirror");
    let service = CoreService::bootstrap(config)
        .await
        .context("Failed to start the core service")?;

    match cli.command {
        Command::Register { token } => {
            let user = service.register_token(&token).await?;
            println!("Registered as {}", user.username);
        }
        Command::Sync => {
            if service.current_user().await?.is_none() {
                bail!("No user registered; run `collection-sync register` first");
            }
            let handle = service.resync().await?;
            info!(sync_id = %handle.sync_id(), "Sync started");
            let report = handle.wait().await?;
            print_json(&report)?;
        }
        Command::Status => {
            print_json(&service.sync_status().await?)?;
        }
        Command::List {
            folder,
            page,
            page_size,
            no_wait,
        } => {
            let request = PageRequest::new(page, page_size);

            // A refresh started here would die with the process, so
            // --no-wait only reads what is stored.
            let view = if no_wait {
                service.stored_collection(folder, request).await?
            } else {
                let view = service.get_collection(folder, request).await?;
                if view.syncing {
                    info!("Mirror is being refreshed, waiting for the sync to finish");
                    service.wait_for_sync().await;
                    service.stored_collection(folder, request).await?
                } else {
                    view
                }
            };

            print_json(&view)?;
        }
    }

    Ok(())
}
