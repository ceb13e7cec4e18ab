use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One raw spreadsheet row, keyed by column header
pub type SourceRecord = serde_json::Value;

/// One purchase transaction. A missing cell becomes `None`; only a missing
/// column is an error (handled during normalization). Orders are immutable
/// once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Business key, unique within one year partition
    pub order_number: Option<String>,
    pub invoice_number: Option<String>,
    pub payment_reference: Option<String>,
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
    pub paid_amount: Option<Decimal>,
    pub country_code: Option<String>,
    /// Parsed from day-first text; unparseable dates stay `None`
    pub order_date: Option<NaiveDate>,
}

/// One article slot of an order, before the parent order's surrogate id is
/// known. Carries the parent's business key instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub order_number: Option<String>,
    pub article_name: String,
    pub article_id: String,
    pub quantity: i64,
}

/// A line item whose parent has been resolved to a store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedLineItem {
    pub order_id: i64,
    pub article_name: String,
    pub article_id: String,
    pub quantity: i64,
}

/// Descriptor for one year partition: its label, source workbook and the two
/// relations it owns. Built once from configuration, never re-derived from
/// file names mid-run.
#[derive(Debug, Clone)]
pub struct PartitionSpec {
    pub year: String,
    pub source_path: PathBuf,
    pub orders_relation: String,
    pub items_relation: String,
}

impl PartitionSpec {
    pub fn new(year: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        let year = year.into();
        Self {
            orders_relation: format!("excel_orders_{year}"),
            items_relation: format!("excel_order_items_{year}"),
            year,
            source_path: source_path.into(),
        }
    }
}
