use crate::config::DatabaseConfig;
use crate::error::{EtlError, Result};
use crate::store::Store;
use crate::types::{LoadedLineItem, Order, PartitionSpec};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Postgres error code for "relation does not exist"
const UNDEFINED_TABLE: &str = "42P01";

/// Postgres-backed store. Relations live in the configured schema; surrogate
/// ids are BIGSERIAL primary keys, so they are assigned on insert and only
/// observed through `order_id_map`.
pub struct PgStore {
    pool: PgPool,
    schema: String,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to Postgres at {}:{}", config.host, config.port);
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.url())
            .await
            .map_err(store_err)?;
        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    fn qualified(&self, relation: &str) -> String {
        format!("{}.{}", self.schema, relation)
    }
}

fn store_err(e: sqlx::Error) -> EtlError {
    EtlError::Store {
        message: e.to_string(),
    }
}

/// Map undefined-table errors to the typed variant; everything else stays a
/// plain store error.
fn classify(e: sqlx::Error, relation: &str) -> EtlError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some(UNDEFINED_TABLE) {
            return EtlError::RelationNotFound(relation.to_string());
        }
    }
    store_err(e)
}

#[async_trait]
impl Store for PgStore {
    async fn ensure_relations(&self, partition: &PartitionSpec) -> Result<()> {
        // Namespace first, then relations; all three statements are no-ops
        // when the objects already exist
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                order_number TEXT,
                invoice_number TEXT,
                payment_reference TEXT,
                billing_address TEXT,
                shipping_address TEXT,
                paid_amount NUMERIC(12, 2),
                country_code TEXT,
                order_date DATE
            )",
            self.qualified(&partition.orders_relation)
        ))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                order_id BIGINT NOT NULL REFERENCES {} (id),
                article_name TEXT NOT NULL,
                article_id TEXT NOT NULL,
                quantity BIGINT NOT NULL
            )",
            self.qualified(&partition.items_relation),
            self.qualified(&partition.orders_relation)
        ))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        debug!(
            orders = %partition.orders_relation,
            items = %partition.items_relation,
            "Ensured partition relations"
        );
        Ok(())
    }

    async fn existing_order_keys(&self, partition: &PartitionSpec) -> Result<HashSet<String>> {
        let rows = sqlx::query(&format!(
            "SELECT order_number FROM {} WHERE order_number IS NOT NULL",
            self.qualified(&partition.orders_relation)
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>(0))
            .collect())
    }

    async fn insert_orders(&self, partition: &PartitionSpec, orders: &[Order]) -> Result<()> {
        let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(format!(
            "INSERT INTO {} (order_number, invoice_number, payment_reference, \
             billing_address, shipping_address, paid_amount, country_code, order_date) ",
            self.qualified(&partition.orders_relation)
        ));
        builder.push_values(orders, |mut row, order| {
            row.push_bind(order.order_number.clone())
                .push_bind(order.invoice_number.clone())
                .push_bind(order.payment_reference.clone())
                .push_bind(order.billing_address.clone())
                .push_bind(order.shipping_address.clone())
                .push_bind(order.paid_amount)
                .push_bind(order.country_code.clone())
                .push_bind(order.order_date);
        });
        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        debug!(
            relation = %partition.orders_relation,
            count = orders.len(),
            "Inserted orders"
        );
        Ok(())
    }

    async fn order_id_map(&self, partition: &PartitionSpec) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query(&format!(
            "SELECT id, order_number FROM {} WHERE order_number IS NOT NULL",
            self.qualified(&partition.orders_relation)
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>(1), row.get::<i64, _>(0)))
            .collect())
    }

    async fn existing_item_pairs(
        &self,
        partition: &PartitionSpec,
    ) -> Result<HashSet<(i64, String)>> {
        let rows = sqlx::query(&format!(
            "SELECT order_id, article_id FROM {}",
            self.qualified(&partition.items_relation)
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| classify(e, &partition.items_relation))?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<i64, _>(0), row.get::<String, _>(1)))
            .collect())
    }

    async fn insert_items(
        &self,
        partition: &PartitionSpec,
        items: &[LoadedLineItem],
    ) -> Result<()> {
        let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(format!(
            "INSERT INTO {} (order_id, article_name, article_id, quantity) ",
            self.qualified(&partition.items_relation)
        ));
        builder.push_values(items, |mut row, item| {
            row.push_bind(item.order_id)
                .push_bind(item.article_name.clone())
                .push_bind(item.article_id.clone())
                .push_bind(item.quantity);
        });
        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        debug!(
            relation = %partition.items_relation,
            count = items.len(),
            "Inserted line items"
        );
        Ok(())
    }
}
