//! Batch ingestion CLI: normalizes a file of research observations and
//! retains the ones that clear the retention threshold into the memory
//! backend (§4.1, §6).
//!
//! Usage:
//!   dexter-ingest-batch --input observations.json [--threshold 0.7]

use anyhow::{Context, Result};
use clap::Parser;
use dexter_trading_core::domain::Observation;
use dexter_trading_core::ingestion::{normalize, should_retain};
use dexter_trading_core::orchestration::MemoryClient;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "dexter-ingest-batch")]
#[command(about = "Normalize and retain a batch of research observations")]
struct Args {
    /// Path to a JSON file containing an array of observations
    #[arg(long)]
    input: String,

    /// Retention score threshold; bookmarked observations always retain
    #[arg(long, env = "RETENTION_THRESHOLD", default_value_t = 0.0)]
    threshold: f64,

    /// Memory service base URL
    #[arg(long, env = "MEMORY_SERVICE_URL", default_value = "http://localhost:8090")]
    memory_service_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input))?;
    let observations: Vec<Observation> =
        serde_json::from_str(&raw).context("input is not a valid observation array")?;

    let memory_client = MemoryClient::new(args.memory_service_url, Duration::from_secs(15))
        .context("failed to build memory client")?;

    let mut retained = 0u32;
    let mut skipped = 0u32;

    for obs in &observations {
        if !should_retain(obs, args.threshold) {
            skipped += 1;
            continue;
        }

        let normalized = match normalize(obs) {
            Ok(normalized) => normalized,
            Err(err) => {
                eprintln!("skipping {} observation for {}: {err}", obs_kind(obs), obs.symbol);
                skipped += 1;
                continue;
            }
        };

        let item = dexter_trading_core::domain::MemoryItem {
            id: None,
            ts: normalized.event.ts,
            item_type: normalized.event.event_type.clone(),
            symbol: Some(normalized.event.symbol.clone()),
            tags: normalized.event.tags.clone(),
            summary: normalized.event.summary.clone(),
            data: serde_json::to_value(&normalized.event)?,
            source: dexter_trading_core::domain::MemorySource {
                system: "ingest-batch".to_string(),
                reference: None,
            },
        };

        match memory_client.retain(normalized.bank.as_str(), &item).await {
            Ok(()) => retained += 1,
            Err(err) => {
                eprintln!("failed to retain {} observation for {}: {err}", obs_kind(obs), obs.symbol);
                skipped += 1;
            }
        }
    }

    println!("retained={retained} skipped={skipped}");
    Ok(())
}

fn obs_kind(obs: &Observation) -> &'static str {
    match obs.kind {
        dexter_trading_core::domain::ObservationKind::Earnings => "earnings",
        dexter_trading_core::domain::ObservationKind::NewsHeadline => "news_headline",
        dexter_trading_core::domain::ObservationKind::UnusualVolume => "unusual_volume",
        dexter_trading_core::domain::ObservationKind::PriceGap => "price_gap",
    }
}
