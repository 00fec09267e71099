use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};

mod classify;
mod config;
mod domain;
mod error;
mod extractor;
mod logging;
mod lookups;
mod merge;
mod normalize;
mod pipeline;
mod remote;
mod staging;
mod storage;
mod summary;

use crate::config::Config;
use crate::lookups::LookupTables;
use crate::merge::RemoteOutcome;
use crate::pipeline::{detect_institution_and_call, IngestService};
use crate::remote::{HttpRemoteSink, RemoteSink};
use crate::staging::StagingStore;
use crate::storage::{JsonFileMergeStore, MergeStore};
use crate::summary::BatchSummary;

#[derive(Parser)]
#[command(name = "uni_scraper")]
#[command(about = "University admission call list parser and classifier")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a listing and print its summary without persisting anything
    Preview {
        /// Raw listing text file (the <pre> block content)
        input: PathBuf,
        /// Admission round; inferred from --source when omitted
        #[arg(long)]
        call: Option<u32>,
        /// Institution tag; inferred from --source when omitted
        #[arg(long)]
        institution: Option<String>,
        /// Source URL or label to infer institution/call from
        #[arg(long)]
        source: Option<String>,
    },
    /// Parse a listing, then confirm it into the local stores and the
    /// remote mirror
    Ingest {
        /// Raw listing text file (the <pre> block content)
        input: PathBuf,
        #[arg(long)]
        call: Option<u32>,
        #[arg(long)]
        institution: Option<String>,
        #[arg(long)]
        source: Option<String>,
        /// Stage and summarize only; the batch is cancelled instead of
        /// confirmed
        #[arg(long)]
        dry_run: bool,
    },
}

fn resolve_origin(
    call: Option<u32>,
    institution: Option<String>,
    source: Option<String>,
) -> (String, u32) {
    let (detected_institution, detected_call) = source
        .as_deref()
        .map(detect_institution_and_call)
        .unwrap_or_else(|| ("unknown".to_string(), 1));
    (
        institution.unwrap_or(detected_institution),
        call.unwrap_or(detected_call),
    )
}

fn print_summary(summary: &BatchSummary) {
    println!("\n📊 Batch summary:");
    println!("   Total: {}", summary.total);
    for (gender, count) in &summary.by_gender {
        println!("   Gender {}: {}", gender, count);
    }
    for (city, count) in &summary.by_city {
        println!("   City {}: {}", city, count);
    }
    for (quota, count) in &summary.by_quota {
        println!("   Quota {}: {}", quota, count);
    }
    if !summary.unresolved_names.is_empty() {
        println!(
            "   Unresolved first names ({}): {}",
            summary.unresolved_names.len(),
            summary.unresolved_names.join(", ")
        );
    }
}

async fn build_service(config: &Config, with_remote: bool) -> anyhow::Result<IngestService> {
    let tables = LookupTables::load(
        &config.lookups.gender_map,
        &config.lookups.campus_map,
        &config.lookups.city_map,
    )?;
    let staging = StagingStore::new(chrono::Duration::minutes(config.staging.ttl_minutes as i64));
    let store: Arc<dyn MergeStore> = Arc::new(JsonFileMergeStore::new(&config.output.directory));

    let remote: Option<Arc<dyn RemoteSink>> = if with_remote {
        HttpRemoteSink::from_env(
            &config.remote.table,
            Duration::from_secs(config.remote.timeout_seconds),
        )?
        .map(|sink| Arc::new(sink) as Arc<dyn RemoteSink>)
    } else {
        None
    };

    Ok(IngestService::new(tables, staging, store, remote))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Preview {
            input,
            call,
            institution,
            source,
        } => {
            let (institution, call) = resolve_origin(call, institution, source);
            let text = std::fs::read_to_string(&input)?;

            let service = build_service(&config, false).await?;
            let outcome = service.parse_batch(&text, call, &institution);

            println!("🔍 Previewing {} (call {})", institution, call);
            print_summary(&outcome.summary);
            if !outcome.failures.is_empty() {
                println!("\n⚠️  {} line(s) failed to parse", outcome.failures.len());
            }
            service.cancel(outcome.batch_id).await?;
        }
        Commands::Ingest {
            input,
            call,
            institution,
            source,
            dry_run,
        } => {
            let (institution, call) = resolve_origin(call, institution, source);
            let text = std::fs::read_to_string(&input)?;

            let service = build_service(&config, !dry_run).await?;
            let outcome = service.parse_batch(&text, call, &institution);

            println!("📥 Ingesting {} (call {})", institution, call);
            print_summary(&outcome.summary);
            if !outcome.failures.is_empty() {
                println!("\n⚠️  {} line(s) failed to parse", outcome.failures.len());
            }

            if dry_run {
                service.cancel(outcome.batch_id).await?;
                println!("\n🚫 Dry run: batch cancelled, nothing persisted");
                return Ok(());
            }

            match service.confirm(outcome.batch_id).await {
                Ok(confirmed) => {
                    let merge = &confirmed.merge;
                    println!("\n✅ Batch confirmed (call {})", merge.call_number);
                    println!(
                        "   Cumulative: {} inserted, {} already present",
                        merge.inserted, merge.skipped_existing
                    );
                    for (city, city_outcome) in &merge.cities {
                        println!(
                            "   {}: snapshot {}, inserted {}",
                            city, city_outcome.snapshot, city_outcome.inserted
                        );
                    }
                    match &merge.remote {
                        RemoteOutcome::Uploaded { sent, skipped } => {
                            println!("   Remote: {} sent, {} skipped", sent, skipped);
                        }
                        RemoteOutcome::NoEligibleRows { skipped } => {
                            println!("   Remote: nothing eligible ({} skipped)", skipped);
                        }
                        RemoteOutcome::Failed { message, .. } => {
                            println!("   ⚠️  Remote failed, local merge kept: {}", message);
                        }
                        RemoteOutcome::Disabled => {
                            println!("   Remote: disabled");
                        }
                    }
                    info!(batch = %confirmed.batch_id, "ingestion finished");
                }
                Err(e) => {
                    error!("confirmation failed: {}", e);
                    println!("❌ Confirmation failed: {}", e);
                }
            }
        }
    }

    Ok(())
}
