#![forbid(unsafe_code)]

//! One-shot channel sync. Registers the seed channels, reconciles every
//! watched channel against YouTube and prints what changed. Meant to be run
//! from cron next to (or instead of) the backend's daily job.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tubeprog_tools::config::{
    EmptyFetchPolicy, RuntimeConfig, RuntimeOverrides, load_seed_channels, resolve_runtime_config,
};
use tubeprog_tools::library::Library;
use tubeprog_tools::logging::init_logging;
use tubeprog_tools::reconcile::{Reconciler, SyncError, SyncReport, register_seed_channels};
use tubeprog_tools::youtube::YouTubeClient;

#[derive(Debug, Parser)]
#[command(about = "Reconcile watched YouTube channels with the TubeProg library")]
struct SyncArgs {
    /// Library database file (TUBEPROG_DB).
    #[arg(long)]
    db: Option<PathBuf>,
    /// Application namespace inside the database (TUBEPROG_APP_ID).
    #[arg(long)]
    app_id: Option<String>,
    #[arg(long)]
    env_file: Option<PathBuf>,
    /// Programs kept per channel (SYNC_WINDOW).
    #[arg(long)]
    window: Option<usize>,
    /// Shortest upload kept, in seconds (SYNC_MIN_DURATION_SECS).
    #[arg(long = "min-duration")]
    min_duration: Option<u64>,
    /// Evict a channel's programs when YouTube lists no uploads for it.
    #[arg(long)]
    evict_on_empty: bool,
    /// Report the plan without writing to the library.
    #[arg(long)]
    dry_run: bool,
    /// Only reconcile this channel id.
    #[arg(long)]
    channel: Option<String>,
}

impl SyncArgs {
    fn overrides(&self) -> RuntimeOverrides {
        RuntimeOverrides {
            db_path: self.db.clone(),
            app_id: self.app_id.clone(),
            env_path: self.env_file.clone(),
            window: self.window,
            min_duration_secs: self.min_duration,
            empty_fetch: self.evict_on_empty.then_some(EmptyFetchPolicy::Evict),
            ..RuntimeOverrides::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = SyncArgs::parse();
    let config = resolve_runtime_config(args.overrides())?;

    let report = run(&config, &args).await?;
    print_report(&report);
    Ok(())
}

async fn run(config: &RuntimeConfig, args: &SyncArgs) -> Result<SyncReport> {
    let api_key = config
        .youtube_api_key
        .clone()
        .ok_or(SyncError::MissingApiKey)?;
    let catalog = YouTubeClient::new(api_key);
    let library = Library::open(&config.db_path, config.app_id.clone())
        .await
        .context("opening program library")?;

    if args.channel.is_none() && !args.dry_run {
        let seeds = load_seed_channels(&config.channels_file)?;
        let added = register_seed_channels(&library, &catalog, &seeds).await;
        if added > 0 {
            tracing::info!(added, "seed channels registered");
        }
    }

    let report = Reconciler::new(&library, &catalog, config.sync.clone())
        .dry_run(args.dry_run)
        .only_channel(args.channel.clone())
        .run()
        .await?;
    Ok(report)
}

fn print_report(report: &SyncReport) {
    for channel in &report.channels {
        if channel.inserted.is_empty() && channel.deleted.is_empty() {
            continue;
        }
        println!("{}", channel.channel_id);
        for video in &channel.inserted {
            println!("  + {video}");
        }
        for video in &channel.deleted {
            println!("  - {video}");
        }
    }
    for skip in &report.skipped {
        println!("skipped {}: {:?}", skip.channel_id, skip.reason);
    }
    for failure in &report.write_failures {
        eprintln!("write failed: {failure}");
    }
    println!("{}", report.message());
}
