// src/main.rs
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use recall_feed::domain::models::{PersistenceMode, Persisted};
use recall_feed::lifecycle::{self, SettingsOverrides};
use recall_feed::service::RecallPipeline;

/// Fetch the recall listing once, enrich new entries and persist them.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Persistence mode: `append` or `overwrite` (required unless set in the config file)
    #[arg(long)]
    mode: Option<PersistenceMode>,

    /// Listing page to scrape
    #[arg(long)]
    listing_url: Option<String>,

    /// Base address for resolving relative detail links
    #[arg(long)]
    base_url: Option<String>,

    /// Record store (CSV)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Directory for downloaded images
    #[arg(long)]
    images: Option<PathBuf>,

    /// Delay between detail/image requests (ms)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Per-request timeout (seconds)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Persist the "Terminated Recall" column
    #[arg(long, default_value_t = false)]
    track_terminated: bool,

    /// Print the run report as JSON on stdout
    #[arg(long, default_value_t = false)]
    report_json: bool,

    /// Debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    lifecycle::init_logging(args.verbose);

    let overrides = SettingsOverrides {
        persistence_mode: args.mode,
        listing_url: args.listing_url,
        base_url: args.base_url,
        store_path: args.store,
        image_dir: args.images,
        request_delay_ms: args.delay_ms,
        request_timeout_secs: args.timeout_secs,
        track_terminated: args.track_terminated,
    };
    let settings = lifecycle::load_settings(args.config.as_deref(), overrides)
        .context("Failed to load settings")?;

    let pipeline = RecallPipeline::from_settings(settings).context("Failed to set up pipeline")?;
    let report = pipeline.run().await.context("Recall run aborted")?;

    match &report.persisted {
        Persisted::Written { records } => tracing::info!(
            "New entries added: {} ({})",
            records,
            pipeline.settings().store_path.display()
        ),
        Persisted::NothingToPersist => tracing::info!("No new entries found."),
    }

    if args.report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
