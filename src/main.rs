use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use outagewatch::config::{AppConfig, LoggingConfig};
use outagewatch::storage::{self, EventStore, OutageLog};

#[derive(Parser)]
#[command(
    name = "outagewatch",
    about = "Tells power outages, ISP outages and router failures apart from uptime probe heartbeats",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (webhook receiver + analysis engine)
    Serve {
        /// Bind address, overrides the config file
        #[arg(long)]
        bind: Option<String>,
    },

    /// Classify the current analysis window
    Status {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// 24-hour event and outage report
    Report {
        #[arg(long)]
        json: bool,
    },

    /// 7-day uptime per probe
    Uptime {
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn init_tracing(cfg: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cfg.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Used only while the config is resolved, before its logging section is known.
fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = tracing::subscriber::with_default(bootstrap_subscriber(), || {
        AppConfig::resolve(cli.config.as_deref())
    })?;

    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
                config.validate()?;
            }
            tracing::info!(bind = %config.server.bind, "Starting outagewatch daemon");
            outagewatch::serve(config).await?;
        }
        Commands::Status { json } => {
            let pool = storage::open_pool(&config.storage.db_path)?;
            let store = EventStore::new(pool);
            let registry = outagewatch::build_registry(&config.analysis, &store)?;
            let (classification, missing) = outagewatch::detect::engine::snapshot(
                &store,
                &registry,
                config.analysis.window(),
                Utc::now(),
            )
            .await?;
            if json {
                let out = serde_json::json!({ "classification": classification, "missing": missing });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!(
                    "{}",
                    outagewatch::report::render_status(&classification, &missing, config.analysis.window_secs)
                );
            }
        }
        Commands::Report { json } => {
            let pool = storage::open_pool(&config.storage.db_path)?;
            let report = outagewatch::report::daily_report(
                &EventStore::new(pool.clone()),
                &OutageLog::new(pool),
                Utc::now(),
            )?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", outagewatch::report::render_daily(&report));
            }
        }
        Commands::Uptime { json } => {
            let pool = storage::open_pool(&config.storage.db_path)?;
            let report = outagewatch::report::uptime_report(&EventStore::new(pool), Utc::now())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", outagewatch::report::render_uptime(&report));
            }
        }
        Commands::Config => {
            if !config.notify.telegram_bot_token.is_empty() {
                config.notify.telegram_bot_token = "<redacted>".to_string();
            }
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
