//! digestd - scheduled log digest daemon
//!
//! Queries Loggly on a schedule for every configured search and posts a
//! summary table to Slack when a search matches enough events.

use std::path::PathBuf;
use std::sync::Arc;

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};
use digestd::{Credentials, DigestConfig, TokioScheduler, build_runner, schedule_all};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LOG_FILTER: &str = "digestd=info,digest_pipeline=info,digest_clients=info";

#[derive(Parser)]
#[command(name = "digestd")]
#[command(about = "Scheduled Loggly digests posted to Slack")]
#[command(version)]
struct Cli {
    /// Path to the searches file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "searches.toml", global = true)]
    config: PathBuf,

    /// Emit logs as JSON; any value other than 0, false, no or off enables it
    #[arg(
        long,
        env = "JSON_LOGS",
        global = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value = "false",
        default_missing_value = "true",
        value_parser = FalseyValueParser::new()
    )]
    json_logs: bool,

    /// Loggly account subdomain
    #[arg(long, env = "LOGGLY_ACCOUNT", default_value = "", global = true)]
    loggly_account: String,

    /// Loggly API token
    #[arg(long, env = "LOGGLY_TOKEN", default_value = "", hide_env_values = true, global = true)]
    loggly_token: String,

    /// Override the Loggly API base URL
    #[arg(long, env = "LOGGLY_BASE_URL", global = true)]
    loggly_base_url: Option<String>,

    /// Slack incoming-webhook URL
    #[arg(long, env = "SLACK_WEBHOOK", default_value = "", hide_env_values = true, global = true)]
    slack_webhook: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every search on its schedule until interrupted
    Run {
        /// Log notifications instead of posting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration and list the searches
    Check,

    /// Run one search now and print its report
    Once {
        /// Name of the search
        name: String,

        /// Log notifications instead of posting them
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    fn credentials(&self) -> Credentials {
        Credentials {
            loggly_account: self.loggly_account.clone(),
            loggly_token: self.loggly_token.clone(),
            loggly_base_url: self.loggly_base_url.clone(),
            slack_webhook: self.slack_webhook.clone(),
        }
    }
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))?;
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let config = DigestConfig::from_file(&cli.config)?;
    info!(config = %cli.config.display(), searches = config.searches.len(), "loaded config");

    match &cli.command {
        Commands::Run { dry_run } => run(&config, &cli.credentials(), *dry_run).await?,
        Commands::Check => check(&config)?,
        Commands::Once { name, dry_run } => once(&config, &cli.credentials(), name, *dry_run).await?,
    }

    Ok(())
}

async fn run(config: &DigestConfig, creds: &Credentials, dry_run: bool) -> anyhow::Result<()> {
    let runner = Arc::new(build_runner(config, creds, dry_run)?);
    let mut scheduler = TokioScheduler::new();
    let count = schedule_all(&runner, config, &mut scheduler)?;
    info!(searches = count, overlap = ?config.overlap, dry_run, "digestd running");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    scheduler.shutdown();
    Ok(())
}

fn check(config: &DigestConfig) -> anyhow::Result<()> {
    for spec in config.specs()? {
        let channel = if spec.channel.is_empty() {
            "(webhook default)"
        } else {
            spec.channel.as_str()
        };
        println!(
            "{}: {}, window {}m, threshold {}, channel {}{}",
            spec.name,
            spec.schedule,
            spec.window_minutes,
            spec.threshold,
            channel,
            if spec.group_by_environment {
                ", grouped by environment"
            } else {
                ""
            },
        );
    }
    Ok(())
}

async fn once(
    config: &DigestConfig,
    creds: &Credentials,
    name: &str,
    dry_run: bool,
) -> anyhow::Result<()> {
    let spec = config.spec(name)?;
    let runner = build_runner(config, creds, dry_run)?;

    let report = runner.run(&spec).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_success() {
        error!(search = %name, state = %report.state, "run failed");
        anyhow::bail!(
            "search '{name}' failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
