use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use dinesafe::apis::ckan::CkanClient;
use dinesafe::config::Config;
use dinesafe::error::DineSafeError;
use dinesafe::infra::http_client::ReqwestHttp;
use dinesafe::logging;
use dinesafe::pipeline::processing::filter::DateRange;
use dinesafe::pipeline::processing::summary::summary_metrics;
use dinesafe::pipeline::{aggregate_by_location, filter, summarize, InspectionFilter, Pipeline};
use dinesafe::storage::SnapshotStore;

#[derive(Parser)]
#[command(name = "dinesafe")]
#[command(about = "Toronto DineSafe food inspection data pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, normalize and store a fresh snapshot
    Refresh {
        /// CKAN package to fetch (defaults to the configured package)
        #[arg(long)]
        package_id: Option<String>,
    },
    /// Print headline numbers for the latest snapshot
    Summary,
    /// Filter the latest snapshot and print matching rows as JSON
    Query {
        /// Severity label to keep (repeatable)
        #[arg(long = "severity")]
        severities: Vec<String>,
        /// Establishment status to keep (repeatable)
        #[arg(long = "status")]
        statuses: Vec<String>,
        /// Establishment type to keep (repeatable)
        #[arg(long = "type")]
        types: Vec<String>,
        /// First inspection date to keep, YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last inspection date to keep, YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Case-insensitive substring of the establishment name
        #[arg(long)]
        name: Option<String>,
        /// Print per-location rollups instead of inspection rows
        #[arg(long)]
        locations: bool,
        /// Maximum number of rows to print
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the metadata sidecar of the latest refresh
    Metadata,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = Config::load().context("loading configuration")?;
    let _guard = logging::init_logging(&config.logging.log_dir);
    dinesafe::metrics::init_metrics(config.metrics.addr.as_deref());

    let cli = Cli::parse();
    let store = SnapshotStore::new(config.storage.data_dir.clone());

    let outcome = match cli.command {
        Commands::Refresh { package_id } => {
            let package_id = package_id.unwrap_or_else(|| config.source.package_id.clone());
            refresh(&config, &store, &package_id).await
        }
        Commands::Summary => print_summary(&store),
        Commands::Query {
            severities,
            statuses,
            types,
            from,
            to,
            name,
            locations,
            limit,
        } => {
            let mut criteria = InspectionFilter::new()
                .severities(severities)
                .statuses(statuses)
                .establishment_types(types)
                .date_range(DateRange { start: from, end: to });
            if let Some(name) = name {
                criteria = criteria.name(name);
            }
            query(&store, &criteria, locations, limit)
        }
        Commands::Metadata => print_metadata(&store),
    };

    match outcome {
        Err(DineSafeError::NotFound(msg)) => {
            warn!("{}", msg);
            println!("⚠️  No data available: {}", msg);
            println!("   Run `dinesafe refresh` to download the dataset first.");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {}", e);
            Err(e.into())
        }
        Ok(()) => Ok(()),
    }
}

async fn refresh(config: &Config, store: &SnapshotStore, package_id: &str) -> dinesafe::error::Result<()> {
    println!("🔄 Refreshing DineSafe data...");
    let http = Arc::new(ReqwestHttp::new(config.source.timeout())?);
    let client = CkanClient::new(config.source.base_url.clone(), http);

    let result = Pipeline::refresh(&client, store, package_id).await?;
    println!("\n📊 Refresh Results:");
    println!("   Rows: {}", result.rows);
    println!("   Unique establishments: {}", result.metadata.unique_establishments);
    println!("   Snapshot: {}", result.path.display());
    Ok(())
}

// One-shot commands read storage directly
fn print_summary(store: &SnapshotStore) -> dinesafe::error::Result<()> {
    let table = store.load_latest()?;
    let summary = summarize(&table);

    println!("\n📊 DineSafe Summary:");
    println!("   Total inspections: {}", summary.total_inspections);
    println!("   Unique establishments: {}", summary.unique_establishments);
    if let (Some(min), Some(max)) = (summary.date_range.min, summary.date_range.max) {
        println!("   Date range: {} to {}", min, max);
    }
    if let Some(m) = summary_metrics(&table) {
        println!("   Avg inspections per establishment: {:.1}", m.avg_inspections_per_establishment);
        println!("   Date span: {} days", m.date_range_days);
        if let Some(severity) = m.most_common_severity {
            println!("   Most common severity: {}", severity);
        }
    }

    println!("\n   By severity:");
    for c in &summary.severity_counts {
        println!("     {:<30} {}", c.label, c.count);
    }
    println!("\n   By status:");
    for c in &summary.status_counts {
        println!("     {:<30} {}", c.label, c.count);
    }
    println!("\n   Top establishment types:");
    for c in summary.establishment_types.iter().take(10) {
        println!("     {:<30} {}", c.label, c.count);
    }
    Ok(())
}

fn query(
    store: &SnapshotStore,
    criteria: &InspectionFilter,
    locations: bool,
    limit: Option<usize>,
) -> dinesafe::error::Result<()> {
    let table = store.load_latest()?;
    let filtered = filter(&table, criteria);
    info!("Query matched {} of {} rows", filtered.len(), table.len());

    let limit = limit.unwrap_or(usize::MAX);
    let json = if locations {
        let rollup: Vec<_> = aggregate_by_location(&filtered).into_iter().take(limit).collect();
        serde_json::to_string_pretty(&rollup)?
    } else {
        let rows: Vec<_> = filtered.iter().take(limit).collect();
        serde_json::to_string_pretty(&rows)?
    };
    println!("{}", json);
    Ok(())
}

fn print_metadata(store: &SnapshotStore) -> dinesafe::error::Result<()> {
    match store.load_metadata()? {
        Some(metadata) => println!("{}", serde_json::to_string_pretty(&metadata)?),
        None => {
            return Err(DineSafeError::NotFound(format!(
                "No metadata found in {}",
                store.data_dir().display()
            )))
        }
    }
    Ok(())
}
