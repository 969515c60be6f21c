//! certwatch CLI
//!
//! Scheduled entry point: one `run` per invocation, plus inspection helpers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use certwatch::{
    error::{AppError, Result},
    models::{Config, Credentials, Record, Settings},
    pipeline::{self, HourWindow, Watch},
    services::{FeedFetcher, MessageFormatter, RecordParser, TelegramNotifier, deliver_with_retry},
    storage::{LocalStorage, SnapshotStorage},
    utils::http,
};
use chrono::Utc;
use clap::{Parser, Subcommand};

/// certwatch - Certified Cellular Device Watcher
#[derive(Parser, Debug)]
#[command(
    name = "certwatch",
    version,
    about = "Announces newly certified cellular devices to a chat"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "certwatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the registry, announce new devices, update the snapshot
    Run,

    /// Validate the configuration file
    Validate,

    /// Show snapshot statistics
    Info,

    /// List records from the snapshot, newest first
    List {
        /// Maximum number of records to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Case-insensitive substring filter over names, model and company
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Parse a local CSV export without touching the snapshot
    Parse {
        /// Path to the CSV file
        file: PathBuf,
    },

    /// Send a test message to the configured chat
    TestNotify,

    /// Write the snapshot records to a CSV file
    Export {
        /// Output path (default: devices_export_<timestamp>.csv)
        #[arg(short, long)]
        filename: Option<PathBuf>,
    },

    /// Remove a record from the snapshot so the next run announces it again
    Delete {
        /// Record id (certificate number)
        id: String,
    },

    /// Resend the alert for one record, or for the latest batch
    Resend {
        /// Record id (certificate number); omit for the latest batch
        id: Option<String>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Missing file means defaults; an unreadable or invalid file is fatal.
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let config = Config::load(path)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    } else {
        log::info!("No config at {}, using defaults", path.display());
        Ok(Config::default())
    }
}

async fn run(settings: &Settings) -> Result<()> {
    let config = &settings.config;
    let client = http::create_client(&config.feed)?;

    let fetcher = FeedFetcher::from_config(&config.feed, client.clone());
    let parser = RecordParser::new(&config.parser);
    let storage = LocalStorage::new(&config.storage.snapshot_path);
    let notifier = TelegramNotifier::new(client, &settings.credentials, &config.notify.parse_mode);
    let formatter = MessageFormatter::new(&config.notify, &config.status)?;
    let status = HourWindow::from_config(&config.status)?;

    let watch = Watch {
        fetcher: &fetcher,
        parser: &parser,
        storage: &storage,
        notifier: &notifier,
        formatter: &formatter,
        status: &status,
        notify: &config.notify,
    };

    let report = watch.run_and_report(Utc::now()).await?;
    log::info!(
        "Run complete: {} new, {} delivered, {} undelivered, {} tracked{}",
        report.new_records.len(),
        report.delivered,
        report.failed_deliveries,
        report.total,
        if report.baseline { " (baseline)" } else { "" }
    );
    Ok(())
}

async fn load_snapshot(config: &Config) -> Result<Vec<Record>> {
    let storage = LocalStorage::new(&config.storage.snapshot_path);
    match storage.load().await? {
        Some(records) => Ok(records),
        None => {
            log::info!("No snapshot found at {}", storage.location());
            Ok(Vec::new())
        }
    }
}

fn log_record(record: &Record) {
    log::info!(
        "  {} | {} | {} | {} | {}",
        record.certificate_number,
        record.display_name(),
        record.model_code,
        record.company_name,
        record.discovered_at.format("%Y-%m-%d %H:%M")
    );
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Run => {
            // Credentials are checked before any network I/O.
            let settings = Settings::new(config, Credentials::from_env()?)?;
            run(&settings).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} feed url(s), {} category label(s), {} keyword(s))",
                config.feed.candidate_urls().count(),
                config.parser.category_labels.len(),
                config.parser.keywords.len()
            );

            match Credentials::from_env() {
                Ok(creds) => log::info!("✓ Chat credentials present (chat {})", creds.chat_id),
                Err(e) => log::warn!("Chat credentials missing: {}", e),
            }
        }

        Command::Info => {
            let records = load_snapshot(&config).await?;
            let now = Utc::now();
            let within = |hours: i64| {
                records
                    .iter()
                    .filter(|r| now - r.discovered_at <= chrono::Duration::hours(hours))
                    .count()
            };

            log::info!("Snapshot: {}", config.storage.snapshot_path);
            log::info!("Tracked devices: {}", records.len());
            log::info!("Discovered in the last 24h: {}", within(24));
            log::info!("Discovered in the last 7d: {}", within(24 * 7));

            let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
            for record in &records {
                *by_type.entry(record.device_type.as_str()).or_default() += 1;
            }
            for (device_type, count) in by_type {
                let label = if device_type.is_empty() { "N/A" } else { device_type };
                log::info!("  {}: {}", label, count);
            }
        }

        Command::List { limit, filter } => {
            let mut records = load_snapshot(&config).await?;
            if let Some(needle) = filter.as_deref() {
                records.retain(|r| r.matches(needle));
            }
            records.sort_by(|a, b| b.discovered_at.cmp(&a.discovered_at));

            log::info!("Showing {} of {} record(s)", limit.min(records.len()), records.len());
            records.iter().take(limit).for_each(log_record);
        }

        Command::Parse { file } => {
            let text = tokio::fs::read_to_string(&file).await?;
            let parser = RecordParser::new(&config.parser);
            let output = parser.parse(&text, Utc::now())?;

            log::info!("{:?}", output.stats);
            output.records.iter().for_each(log_record);
        }

        Command::TestNotify => {
            let settings = Settings::new(config, Credentials::from_env()?)?;
            let config = &settings.config;
            let client = http::create_client(&config.feed)?;
            let notifier =
                TelegramNotifier::new(client, &settings.credentials, &config.notify.parse_mode);
            let formatter = MessageFormatter::new(&config.notify, &config.status)?;

            deliver_with_retry(
                &notifier,
                &formatter.test_message(Utc::now()),
                config.notify.max_attempts,
                Duration::from_millis(config.notify.retry_delay_ms),
            )
            .await
            .map_err(|e| AppError::notification(format!("test message failed: {e}")))?;
            log::info!("✓ Test message delivered to chat {}", settings.credentials.chat_id);
        }

        Command::Export { filename } => {
            let records = load_snapshot(&config).await?;
            let filename = filename.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "devices_export_{}.csv",
                    Utc::now().format("%Y%m%d_%H%M%S")
                ))
            });

            tokio::fs::write(&filename, pipeline::export_csv(&records)).await?;
            log::info!("✓ Exported {} record(s) to {}", records.len(), filename.display());
        }

        Command::Delete { id } => {
            let storage = LocalStorage::new(&config.storage.snapshot_path);
            match pipeline::delete_record(&storage, &id).await? {
                Some(record) => log::info!(
                    "✓ Deleted {} ({}); it will be announced on the next run",
                    record.id,
                    record.display_name()
                ),
                None => log::warn!("Record {} not found in {}", id, storage.location()),
            }
        }

        Command::Resend { id } => {
            let settings = Settings::new(config, Credentials::from_env()?)?;
            let config = &settings.config;
            let records = load_snapshot(config).await?;
            let selected = pipeline::select_for_resend(&records, id.as_deref());
            if selected.is_empty() {
                log::warn!("No matching records to resend");
                return Ok(());
            }

            let client = http::create_client(&config.feed)?;
            let notifier =
                TelegramNotifier::new(client, &settings.credentials, &config.notify.parse_mode);
            let formatter = MessageFormatter::new(&config.notify, &config.status)?;

            let report = pipeline::resend(&selected, &notifier, &formatter, &config.notify).await;
            log::info!(
                "Resent {} alert(s), {} failed",
                report.delivered,
                report.failed
            );
            if report.failed > 0 {
                return Err(AppError::notification(format!(
                    "{} resend(s) not delivered",
                    report.failed
                )));
            }
        }
    }

    Ok(())
}
