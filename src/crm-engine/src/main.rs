//! crm-engine: contact engagement and segmentation engine for founder CRMs.
//!
//! Scores interaction ledgers, applies guarded lifecycle transitions,
//! compiles segment definitions, and aggregates campaign funnels. Input is
//! read from JSON files and results are printed as JSON on stdout.

mod commands;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use crm_core::config::{AppConfig, LogFormat};
use crm_core::ContactStatus;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "crm-engine")]
#[command(about = "Contact engagement scoring, lifecycle, segmentation and funnel reporting")]
#[command(version)]
struct Cli {
    /// TOML config file (environment variables with prefix CRM_ENGINE__ override it)
    #[arg(long, global = true, env = "CRM_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score every contact in an interaction ledger
    Score {
        /// JSON array of interactions
        #[arg(long)]
        interactions: PathBuf,

        /// Scoring instant (RFC 3339); defaults to the current time
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Number of top interaction types to report (overrides config)
        #[arg(long)]
        top: Option<usize>,
    },

    /// Attempt a lifecycle status change on a stored contact
    Transition {
        /// JSON contact snapshot
        #[arg(long)]
        contact: PathBuf,

        /// Target status
        #[arg(long)]
        to: ContactStatus,

        /// Version the caller last read
        #[arg(long)]
        expected_version: u64,

        /// Confirm a transition that requires explicit confirmation
        #[arg(long, default_value_t = false)]
        confirmed: bool,
    },

    /// Compile a segment definition and optionally evaluate it
    Segment {
        /// JSON segment definition
        #[arg(long)]
        definition: PathBuf,

        /// JSON array of contacts to match against
        #[arg(long)]
        contacts: Option<PathBuf>,
    },

    /// Aggregate campaign targeting edges into a funnel
    Funnel {
        /// JSON array of targeting edges
        #[arg(long)]
        edges: PathBuf,

        /// One funnel per campaign instead of a combined one
        #[arg(long, default_value_t = false)]
        by_campaign: bool,
    },
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log.filter.as_str().into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn emit(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{out}");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Tracing depends on the log section, so a load failure is reported after init.
    let (config, load_error) = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_tracing(&config);
    if let Some(e) = load_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }

    info!(
        half_life_days = config.engagement.half_life_days,
        max_depth = config.segmentation.max_depth,
        max_conflict_retries = config.lifecycle.max_conflict_retries,
        "Configuration loaded"
    );

    match cli.command {
        Command::Score {
            interactions,
            now,
            top,
        } => {
            let scores = commands::score(&config, &interactions, now, top)
                .with_context(|| format!("scoring {}", interactions.display()))?;
            emit(&scores)
        }
        Command::Transition {
            contact,
            to,
            expected_version,
            confirmed,
        } => {
            let outcome =
                commands::transition(&config, &contact, to, expected_version, confirmed)
                    .with_context(|| format!("transitioning {}", contact.display()))?;
            emit(&outcome)
        }
        Command::Segment {
            definition,
            contacts,
        } => {
            let outcome = commands::segment(&config, &definition, contacts.as_deref())
                .with_context(|| format!("compiling {}", definition.display()))?;
            emit(&outcome)
        }
        Command::Funnel { edges, by_campaign } => {
            let outcome = commands::funnel(&edges, by_campaign)
                .with_context(|| format!("aggregating {}", edges.display()))?;
            emit(&outcome)
        }
    }
}
