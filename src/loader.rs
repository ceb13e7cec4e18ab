use crate::error::{EtlError, Result};
use crate::store::Store;
use crate::types::{LineItem, LoadedLineItem, Order, PartitionSpec};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Counts from one partition load.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LoadSummary {
    pub year: String,
    pub orders_seen: usize,
    pub orders_inserted: usize,
    pub orders_already_present: usize,
    pub items_seen: usize,
    pub items_inserted: usize,
    pub items_already_present: usize,
    /// Items whose parent key matched no persisted order. Dropped from the
    /// load, surfaced here so silent data loss at least leaves a trace.
    pub items_unresolved: usize,
}

/// Makes exactly the new orders and line items of one partition durable.
///
/// Orders are committed and re-read before items are resolved, so items for
/// brand-new orders see their store-assigned parent ids.
pub struct IncrementalLoader {
    store: Arc<dyn Store>,
}

impl IncrementalLoader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, orders, items), fields(year = %partition.year))]
    pub async fn load_partition(
        &self,
        partition: &PartitionSpec,
        orders: Vec<Order>,
        items: Vec<LineItem>,
    ) -> Result<LoadSummary> {
        let mut summary = LoadSummary {
            year: partition.year.clone(),
            orders_seen: orders.len(),
            items_seen: items.len(),
            ..LoadSummary::default()
        };

        self.store.ensure_relations(partition).await?;

        let existing_keys = self.store.existing_order_keys(partition).await?;
        let new_orders: Vec<Order> = orders
            .into_iter()
            .filter(|order| {
                order
                    .order_number
                    .as_deref()
                    .is_some_and(|key| !existing_keys.contains(key))
            })
            .collect();
        summary.orders_already_present = summary.orders_seen - new_orders.len();

        if new_orders.is_empty() {
            debug!("No new orders, skipping insert");
        } else {
            self.store.insert_orders(partition, &new_orders).await?;
            summary.orders_inserted = new_orders.len();
        }

        // Re-read after the insert so items of brand-new orders resolve
        let id_map = self.store.order_id_map(partition).await?;

        let mut resolved = Vec::with_capacity(items.len());
        for item in items {
            match item
                .order_number
                .as_deref()
                .and_then(|key| id_map.get(key))
            {
                Some(&order_id) => resolved.push(LoadedLineItem {
                    order_id,
                    article_name: item.article_name,
                    article_id: item.article_id,
                    quantity: item.quantity,
                }),
                None => summary.items_unresolved += 1,
            }
        }
        if summary.items_unresolved > 0 {
            warn!(
                count = summary.items_unresolved,
                "Dropping line items with no matching order"
            );
        }

        let existing_pairs = match self.store.existing_item_pairs(partition).await {
            Ok(pairs) => pairs,
            Err(EtlError::RelationNotFound(relation)) => {
                debug!(%relation, "Items relation not created yet, treating as empty");
                HashSet::new()
            }
            Err(other) => return Err(other),
        };

        let new_items: Vec<LoadedLineItem> = resolved
            .into_iter()
            .filter(|item| !existing_pairs.contains(&(item.order_id, item.article_id.clone())))
            .collect();
        summary.items_already_present =
            summary.items_seen - summary.items_unresolved - new_items.len();

        if new_items.is_empty() {
            debug!("No new line items, skipping insert");
        } else {
            self.store.insert_items(partition, &new_items).await?;
            summary.items_inserted = new_items.len();
        }

        Ok(summary)
    }
}
