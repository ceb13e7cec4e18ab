use crate::error::{EtlError, Result};
use crate::types::{LoadedLineItem, Order, PartitionSpec};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Persistence boundary for the partitioned order relations.
///
/// Inserts are append-only; surrogate ids are assigned by the store and only
/// ever observed through `order_id_map`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Idempotent DDL: create the namespace and both partition relations if
    /// they do not exist yet.
    async fn ensure_relations(&self, partition: &PartitionSpec) -> Result<()>;

    /// Business keys already persisted in the partition's orders relation.
    async fn existing_order_keys(&self, partition: &PartitionSpec) -> Result<HashSet<String>>;

    async fn insert_orders(&self, partition: &PartitionSpec, orders: &[Order]) -> Result<()>;

    /// Business key to surrogate id for every persisted order. Must reflect
    /// rows inserted earlier in the same run.
    async fn order_id_map(&self, partition: &PartitionSpec) -> Result<HashMap<String, i64>>;

    /// (parent surrogate id, article id) pairs already persisted. Fails with
    /// `EtlError::RelationNotFound` when the items relation has never been
    /// created; callers decide whether that is tolerable.
    async fn existing_item_pairs(&self, partition: &PartitionSpec)
        -> Result<HashSet<(i64, String)>>;

    async fn insert_items(&self, partition: &PartitionSpec, items: &[LoadedLineItem])
        -> Result<()>;
}

/// In-memory store for dry runs and tests. Relations are plain vectors keyed
/// by relation name; surrogate ids come from a single counter so they behave
/// like an auto-incrementing key.
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    orders: HashMap<String, Vec<(i64, Order)>>,
    items: HashMap<String, Vec<LoadedLineItem>>,
    next_order_id: i64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_order_id: 1,
                ..Inner::default()
            })),
        }
    }

    /// Snapshot of one orders relation, for assertions.
    pub fn order_rows(&self, relation: &str) -> Vec<(i64, Order)> {
        let inner = self.inner.lock().unwrap();
        inner.orders.get(relation).cloned().unwrap_or_default()
    }

    /// Snapshot of one items relation, for assertions.
    pub fn item_rows(&self, relation: &str) -> Vec<LoadedLineItem> {
        let inner = self.inner.lock().unwrap();
        inner.items.get(relation).cloned().unwrap_or_default()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ensure_relations(&self, partition: &PartitionSpec) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .orders
            .entry(partition.orders_relation.clone())
            .or_default();
        inner
            .items
            .entry(partition.items_relation.clone())
            .or_default();
        Ok(())
    }

    async fn existing_order_keys(&self, partition: &PartitionSpec) -> Result<HashSet<String>> {
        let inner = self.inner.lock().unwrap();
        let keys = inner
            .orders
            .get(&partition.orders_relation)
            .map(|rows| {
                rows.iter()
                    .filter_map(|(_, order)| order.order_number.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(keys)
    }

    async fn insert_orders(&self, partition: &PartitionSpec, orders: &[Order]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for order in orders {
            let id = inner.next_order_id;
            inner.next_order_id += 1;
            inner
                .orders
                .entry(partition.orders_relation.clone())
                .or_default()
                .push((id, order.clone()));
        }
        debug!(
            relation = %partition.orders_relation,
            count = orders.len(),
            "Inserted orders"
        );
        Ok(())
    }

    async fn order_id_map(&self, partition: &PartitionSpec) -> Result<HashMap<String, i64>> {
        let inner = self.inner.lock().unwrap();
        let map = inner
            .orders
            .get(&partition.orders_relation)
            .map(|rows| {
                rows.iter()
                    .filter_map(|(id, order)| order.order_number.clone().map(|key| (key, *id)))
                    .collect()
            })
            .unwrap_or_default();
        Ok(map)
    }

    async fn existing_item_pairs(
        &self,
        partition: &PartitionSpec,
    ) -> Result<HashSet<(i64, String)>> {
        let inner = self.inner.lock().unwrap();
        let rows = inner
            .items
            .get(&partition.items_relation)
            .ok_or_else(|| EtlError::RelationNotFound(partition.items_relation.clone()))?;
        Ok(rows
            .iter()
            .map(|item| (item.order_id, item.article_id.clone()))
            .collect())
    }

    async fn insert_items(
        &self,
        partition: &PartitionSpec,
        items: &[LoadedLineItem],
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .items
            .entry(partition.items_relation.clone())
            .or_default()
            .extend_from_slice(items);
        debug!(
            relation = %partition.items_relation,
            count = items.len(),
            "Inserted line items"
        );
        Ok(())
    }
}
