// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Skytrack replay CLI
//!
//! Drives a full relay engine from a recorded beacon log, printing the
//! create/update calls a real chat channel would receive.
//!
//! # Usage
//!
//! ```bash
//! # Replay a log, tracking two ids
//! skytrack-replay --file beacons.log --track DD8F2A,DD9921
//!
//! # Faster replay, custom reconciliation period
//! skytrack-replay --file beacons.log --track DD8F2A --delay-ms 50 --interval 2
//!
//! # Using a configuration file
//! skytrack-replay --file beacons.log --track DD8F2A --config tracker.toml
//!
//! # Generate / check configuration
//! skytrack-replay gen-config --output tracker.toml
//! skytrack-replay validate --config tracker.toml
//! ```
//!
//! Log format: one record per line, `address,lat,lon[,name]`; `#` starts a
//! comment.

mod console;
mod replay;

use clap::{Parser, Subcommand};
use console::ConsoleChannel;
use replay::{LineDecoder, ReplayFeed};
use skytrack::{ChannelId, GeoPoint, ReconnectConfig, TrackerConfig, TrackerEngine};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Skytrack beacon replay
#[derive(Parser, Debug)]
#[command(name = "skytrack-replay")]
#[command(about = "Skytrack replay tool - drive the relay engine from a recorded beacon log")]
#[command(version)]
struct Args {
    /// Beacon log file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Ids to track (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    track: Option<Vec<String>>,

    /// Target channel id
    #[arg(long, default_value = "1")]
    channel: i64,

    /// Landing site as "lat,lon" for caption distance annotations
    #[arg(long)]
    landing: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Delay between replayed records (milliseconds)
    #[arg(long, default_value = "200")]
    delay_ms: u64,

    /// Reconciliation period (seconds); overrides the config file
    #[arg(long, default_value = "5")]
    interval: u64,

    /// Delay before the first reconciliation tick (seconds)
    #[arg(long, default_value = "1")]
    first_delay: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "tracker.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(cmd) = args.command {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let file = args
        .file
        .as_ref()
        .ok_or("missing --file (or use a subcommand)")?;
    let tracked = args
        .track
        .as_ref()
        .filter(|ids| !ids.is_empty())
        .ok_or("missing --track")?;

    let mut config = match args.config {
        Some(ref path) => TrackerConfig::from_file(path)?,
        None => TrackerConfig {
            // Replay feeds close quickly; keep the reconnect budget tight.
            reconnect: ReconnectConfig {
                max_attempts: 2,
                initial_backoff_ms: 100,
                max_backoff_ms: 200,
            },
            ..Default::default()
        },
    };
    config.update_interval_secs = args.interval;
    config.initial_delay_secs = args.first_delay;
    config.validate()?;

    let content = std::fs::read_to_string(file)?;
    let feed = ReplayFeed::from_log(&content, Duration::from_millis(args.delay_ms));
    if feed.is_empty() {
        return Err(format!("no beacon records in {}", file.display()).into());
    }
    let records = feed.len();
    let channel = Arc::new(ConsoleChannel::new(config.live_period_secs));

    let engine = TrackerEngine::new(
        config.clone(),
        Arc::new(feed),
        Arc::new(LineDecoder),
        channel.clone(),
    );

    engine.set_target_channel(ChannelId(args.channel));
    if let Some(ref landing) = args.landing {
        engine.set_landing(parse_landing(landing)?);
    }
    for id in tracked {
        engine.add(id, None, None)?;
    }

    println!("Skytrack replay v{}", env!("CARGO_PKG_VERSION"));
    println!("{records} records, {} tracked ids", tracked.len());
    println!("Press Ctrl+C to stop early...");
    println!();

    engine.track_on().await?;

    // Enough for the whole log plus two reconciliation passes.
    let run_for = Duration::from_millis(args.delay_ms) * records as u32
        + config.update_interval() * 2
        + config.initial_delay();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => println!("\nStopping..."),
        _ = tokio::time::sleep(run_for) => {}
    }

    if engine.is_enabled() {
        engine.track_off().await?;
    }

    let status = engine.status();
    println!();
    println!("--- Replay finished ---");
    println!("tracked ids:      {}", status.tracked);
    println!("messages created: {}", channel.creates());
    println!("messages updated: {}", channel.updates());
    Ok(())
}

fn parse_landing(raw: &str) -> Result<GeoPoint, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = raw.splitn(2, ',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(format!("invalid landing {raw:?} (expected lat,lon)").into());
    }
    Ok(GeoPoint::new(parts[0].parse()?, parts[1].parse()?))
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = TrackerConfig::default();
    let toml_str = toml::to_string_pretty(&config)?;

    let content = format!(
        r#"# Skytrack tracker configuration
# Generated by skytrack-replay gen-config

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match TrackerConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Update interval: {}s", config.update_interval_secs);
            println!("Initial delay:   {}s", config.initial_delay_secs);
            println!(
                "Reconnect:       {} attempts, {}..{} ms backoff",
                config.reconnect.max_attempts,
                config.reconnect.initial_backoff_ms,
                config.reconnect.max_backoff_ms
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {e}");
            std::process::exit(1);
        }
    }
}
