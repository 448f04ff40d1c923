// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava-Notion Sync command-line interface.
//!
//! Mirrors Strava activities into a Notion database.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use strava_notion_sync::{
    config::Config,
    models::properties,
    routes,
    services::{
        run_sync, DatabaseStatus, NotionClient, Outcome, Progress, StravaClient, StravaService,
        SyncEvent, SyncOptions,
    },
    time_utils,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "strava-notion-sync", version)]
#[command(about = "Sync Strava activities to a Notion database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sync activities from Strava to Notion
    Sync {
        /// Fetch all activities, not just those since the last sync
        #[arg(long)]
        full: bool,
        /// Show what would change without writing to Notion
        #[arg(long)]
        dry_run: bool,
        /// Number of activities written to Notion concurrently
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..=16))]
        concurrency: u16,
    },
    /// Add the required properties to the Notion database
    InitSchema,
    /// Show database statistics
    Status,
    /// Authorize with Strava and print a refresh token
    Auth,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Sync {
            full,
            dry_run,
            concurrency,
        } => {
            let options = SyncOptions {
                full,
                dry_run,
                concurrency: usize::from(concurrency),
            };
            sync(&config, options).await
        }
        Commands::InitSchema => init_schema(&config).await,
        Commands::Status => status(&config).await,
        Commands::Auth => auth(&config).await,
    }
}

async fn sync(config: &Config, options: SyncOptions) -> Result<()> {
    let refresh_token = config.require_refresh_token().context(
        "No refresh token configured. Run `strava-notion-sync auth` first",
    )?;
    let strava = StravaService::new(StravaClient::from_config(config)?, refresh_token.to_string());
    let notion = NotionClient::from_config(config)?;

    if options.full {
        println!("Full sync: fetching all activities");
    }
    if options.dry_run {
        println!("Dry run: nothing will be written");
    }

    let progress: Progress<'_> = &print_progress;
    let report = run_sync(&strava, &notion, options, Some(progress)).await?;

    println!("\nFetched {} activities from Strava", report.fetched);
    println!("{}", report);
    for failure in &report.failures {
        println!(
            "  failed: {} ({}): {}",
            failure.name, failure.external_id, failure.error
        );
    }

    if report.has_failures() {
        anyhow::bail!("{} activities failed to sync", report.failed);
    }
    Ok(())
}

/// One line per activity: `+` created, `~` updated, `=` unchanged, `!` failed.
fn print_progress(event: &SyncEvent<'_>) {
    let symbol = match event.outcome {
        Outcome::Created => "+",
        Outcome::Updated(_) => "~",
        Outcome::Unchanged => "=",
        Outcome::Failed(_) => "!",
    };
    println!("  [{}] {} ({})", symbol, event.name, event.external_id);
}

async fn init_schema(config: &Config) -> Result<()> {
    let notion = NotionClient::from_config(config)?;

    println!("Database: {}", notion.database_title().await?);
    notion.init_schema().await?;

    println!("\nSchema updated! Properties:");
    for (name, definition) in properties::schema() {
        let kind = definition
            .as_object()
            .and_then(|d| d.keys().next().cloned())
            .unwrap_or_default();
        println!("  + {}: {}", name, kind);
    }
    Ok(())
}

async fn status(config: &Config) -> Result<()> {
    let notion = NotionClient::from_config(config)?;
    let status = DatabaseStatus::load(&notion).await?;

    println!("Notion Database: {}", status.title);
    println!("Total activities: {}", status.total);
    if let Some(most_recent) = status.most_recent {
        println!("Most recent: {}", most_recent.date());
    }
    println!("\nActivities by type:");
    for (activity_type, count) in &status.by_type {
        println!("  {}: {}", activity_type, count);
    }
    Ok(())
}

async fn auth(config: &Config) -> Result<()> {
    let client = StravaClient::from_config(config)?;

    println!(
        "Make sure 'localhost' is set as the Authorization Callback Domain of your Strava app."
    );
    let tokens = routes::auth::authorize(&client, config.auth_callback_port, |url| {
        println!("\nOpen this URL in your browser to authorize:\n\n  {}\n", url);
    })
    .await?;

    println!("Authorization successful!\n");
    println!("Add this to your .env file:");
    println!("STRAVA_REFRESH_TOKEN=\"{}\"", tokens.refresh_token);
    if let Some(expires_at) = chrono::DateTime::from_timestamp(tokens.expires_at, 0) {
        println!(
            "\nAccess token expires at {}",
            time_utils::format_local(expires_at.naive_utc())
        );
    }
    Ok(())
}

/// Initialize logging to stderr; JSON lines when `LOG_FORMAT=json`.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("strava_notion_sync=info,warn"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
