use clap::{Parser, Subcommand};
use std::sync::Arc;

use orders_etl::config::Config;
use orders_etl::error::Result;
use orders_etl::logging;
use orders_etl::pipeline::Pipeline;
use orders_etl::store::Store;
use orders_etl::types::PartitionSpec;

#[derive(Parser)]
#[command(name = "orders_etl")]
#[command(about = "Spreadsheet order ingestion and incremental loading")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the partition configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load declared year partitions into the store
    Load {
        /// Specific years to load (comma-separated). Defaults to every declared partition
        #[arg(long)]
        years: Option<String>,
        /// Normalize and dedupe, but write to an in-memory store only
        #[arg(long)]
        dry_run: bool,
    },
    /// List the declared partitions and their target relations
    Partitions,
}

#[cfg(feature = "db")]
async fn build_store(config: &Config, dry_run: bool) -> Result<Arc<dyn Store>> {
    use orders_etl::config::DatabaseConfig;
    use orders_etl::db::PgStore;
    use orders_etl::store::InMemoryStore;

    if dry_run {
        tracing::info!("Dry run: using in-memory store");
        Ok(Arc::new(InMemoryStore::new()))
    } else {
        let database = DatabaseConfig::from_env(&config.store.schema)?;
        Ok(Arc::new(PgStore::connect(&database).await?))
    }
}

#[cfg(not(feature = "db"))]
async fn build_store(_config: &Config, dry_run: bool) -> Result<Arc<dyn Store>> {
    use orders_etl::store::InMemoryStore;

    if !dry_run {
        tracing::warn!("Built without the `db` feature, falling back to in-memory store");
    }
    Ok(Arc::new(InMemoryStore::new()))
}

fn select_partitions(mut specs: Vec<PartitionSpec>, years: Option<String>) -> Vec<PartitionSpec> {
    if let Some(list) = years {
        let wanted: Vec<String> = list.split(',').map(|s| s.trim().to_string()).collect();
        specs.retain(|spec| wanted.contains(&spec.year));
    }
    specs
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Partitions => {
            for spec in config.partition_specs() {
                println!(
                    "{}: {} -> {} / {}",
                    spec.year,
                    spec.source_path.display(),
                    spec.orders_relation,
                    spec.items_relation
                );
            }
        }
        Commands::Load { years, dry_run } => {
            let specs = select_partitions(config.partition_specs(), years);
            if specs.is_empty() {
                println!("⚠️  No matching partitions to load");
                return Ok(());
            }

            let store = build_store(&config, dry_run).await?;
            let pipeline = Pipeline::new(store);

            println!("🚀 Loading {} partition(s)...", specs.len());
            pipeline.run(&specs).await?;
            println!("✅ ETL completed successfully.");
        }
    }

    Ok(())
}
