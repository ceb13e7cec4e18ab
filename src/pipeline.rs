use crate::dedupe::dedupe_orders;
use crate::error::Result;
use crate::loader::{IncrementalLoader, LoadSummary};
use crate::normalize::normalize_record;
use crate::source::{RecordSource, XlsxSource};
use crate::store::Store;
use crate::types::{LineItem, Order, PartitionSpec};
use metrics::counter;
use std::sync::Arc;
use tracing::{info, instrument};

/// Year-partition driver: normalize, dedupe and load each declared partition
/// strictly one after another.
pub struct Pipeline {
    loader: IncrementalLoader,
}

impl Pipeline {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            loader: IncrementalLoader::new(store),
        }
    }

    /// Run one partition end to end.
    #[instrument(skip(self, source), fields(year = %partition.year))]
    pub async fn run_partition(
        &self,
        partition: &PartitionSpec,
        source: &dyn RecordSource,
    ) -> Result<LoadSummary> {
        info!("Reading records from {}", partition.source_path.display());
        let records = source.records()?;
        counter!("etl_records_read_total", "year" => partition.year.clone())
            .increment(records.len() as u64);

        let mut orders: Vec<Order> = Vec::with_capacity(records.len());
        let mut items: Vec<LineItem> = Vec::new();
        for record in &records {
            let (order, line_items) = normalize_record(record)?;
            orders.push(order);
            items.extend(line_items);
        }
        info!(
            "Normalized {} orders and {} line items",
            orders.len(),
            items.len()
        );

        let orders = dedupe_orders(orders);
        let summary = self.loader.load_partition(partition, orders, items).await?;

        counter!("etl_orders_inserted_total", "year" => partition.year.clone())
            .increment(summary.orders_inserted as u64);
        counter!("etl_items_inserted_total", "year" => partition.year.clone())
            .increment(summary.items_inserted as u64);
        counter!("etl_items_unresolved_total", "year" => partition.year.clone())
            .increment(summary.items_unresolved as u64);

        Ok(summary)
    }

    /// Run every declared partition in order. The first failure propagates
    /// immediately and aborts the remaining partitions.
    pub async fn run(&self, partitions: &[PartitionSpec]) -> Result<Vec<LoadSummary>> {
        let mut summaries = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let source = XlsxSource::new(partition.source_path.clone());
            let summary = self.run_partition(partition, &source).await?;
            info!(
                year = %summary.year,
                orders = summary.orders_inserted,
                items = summary.items_inserted,
                "Partition load completed"
            );
            println!(
                "✅ Year {} load completed: {} new orders, {} new line items ({} orders and {} items already present)",
                summary.year,
                summary.orders_inserted,
                summary.items_inserted,
                summary.orders_already_present,
                summary.items_already_present
            );
            summaries.push(summary);
        }
        Ok(summaries)
    }
}
