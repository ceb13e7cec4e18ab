use anyhow::Result;
use chrono::NaiveDate;
use orders_etl::error::Result as EtlResult;
use orders_etl::pipeline::Pipeline;
use orders_etl::source::RecordSource;
use orders_etl::store::InMemoryStore;
use orders_etl::types::{PartitionSpec, SourceRecord};
use serde_json::{json, Value};
use std::sync::Arc;

/// Fixed in-memory record source, standing in for a spreadsheet.
struct StaticSource {
    records: Vec<SourceRecord>,
}

impl StaticSource {
    fn new(records: Vec<SourceRecord>) -> Self {
        Self { records }
    }
}

impl RecordSource for StaticSource {
    fn records(&self) -> EtlResult<Vec<SourceRecord>> {
        Ok(self.records.clone())
    }
}

/// Build one source row with all eight order columns present. `slots` are
/// (name, article id, quantity) triples keyed by slot index.
fn row(order_number: Value, date: &str, slots: &[(usize, &str, &str, Value)]) -> SourceRecord {
    let mut record = json!({
        "OrderNumber": order_number,
        "InvoiceNumber": "INV-1",
        "PaymentReference": "PAY-1",
        "BillingAddress": "Billing St 1",
        "ShippingAddress": "Shipping St 2",
        "PaidAmount": 10.0,
        "CountryCode": "DE",
        "OrderDate": date,
    });
    let fields = record.as_object_mut().unwrap();
    for (slot, name, article_id, quantity) in slots {
        fields.insert(format!("ArticleName{slot}"), json!(name));
        fields.insert(format!("ArticleId{slot}"), json!(article_id));
        fields.insert(format!("Quantity{slot}"), quantity.clone());
    }
    record
}

fn scenario_rows() -> Vec<SourceRecord> {
    vec![
        row(json!("A1"), "01/02/2021", &[(1, "X", "ASIN1", json!(2))]),
        row(json!("A1"), "01/02/2021", &[]),
        row(json!("A2"), "bad-date", &[(1, "Y", "ASIN2", Value::Null)]),
    ]
}

#[tokio::test]
async fn concrete_scenario_from_three_rows() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(store.clone());
    let partition = PartitionSpec::new("2021", "scenario.xlsx");

    let summary = pipeline
        .run_partition(&partition, &StaticSource::new(scenario_rows()))
        .await?;

    assert_eq!(summary.orders_inserted, 2);
    assert_eq!(summary.items_inserted, 2);
    assert_eq!(summary.items_unresolved, 0);

    let orders = store.order_rows(&partition.orders_relation);
    assert_eq!(orders.len(), 2);
    let a1 = orders
        .iter()
        .find(|(_, o)| o.order_number.as_deref() == Some("A1"))
        .unwrap();
    assert_eq!(
        a1.1.order_date,
        Some(NaiveDate::from_ymd_opt(2021, 2, 1).unwrap())
    );
    let a2 = orders
        .iter()
        .find(|(_, o)| o.order_number.as_deref() == Some("A2"))
        .unwrap();
    assert_eq!(a2.1.order_date, None);

    let items = store.item_rows(&partition.items_relation);
    assert_eq!(items.len(), 2);
    let asin1 = items.iter().find(|i| i.article_id == "ASIN1").unwrap();
    assert_eq!(asin1.order_id, a1.0);
    assert_eq!(asin1.quantity, 2);
    let asin2 = items.iter().find(|i| i.article_id == "ASIN2").unwrap();
    assert_eq!(asin2.order_id, a2.0);
    assert_eq!(asin2.quantity, 1);

    Ok(())
}

#[tokio::test]
async fn loading_twice_is_idempotent() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(store.clone());
    let partition = PartitionSpec::new("2021", "scenario.xlsx");
    let source = StaticSource::new(scenario_rows());

    pipeline.run_partition(&partition, &source).await?;
    let second = pipeline.run_partition(&partition, &source).await?;

    assert_eq!(second.orders_inserted, 0);
    assert_eq!(second.items_inserted, 0);
    assert_eq!(store.order_rows(&partition.orders_relation).len(), 2);
    assert_eq!(store.item_rows(&partition.items_relation).len(), 2);

    Ok(())
}

#[tokio::test]
async fn incremental_run_adds_only_new_rows() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(store.clone());
    let partition = PartitionSpec::new("2021", "scenario.xlsx");

    pipeline
        .run_partition(&partition, &StaticSource::new(scenario_rows()))
        .await?;

    // Same rows again plus one genuinely new order
    let mut rows = scenario_rows();
    rows.push(row(
        json!("A3"),
        "15/06/2021",
        &[(1, "Z", "ASIN3", json!(5))],
    ));
    let summary = pipeline
        .run_partition(&partition, &StaticSource::new(rows))
        .await?;

    assert_eq!(summary.orders_inserted, 1);
    assert_eq!(summary.items_inserted, 1);
    assert_eq!(store.order_rows(&partition.orders_relation).len(), 3);
    assert_eq!(store.item_rows(&partition.items_relation).len(), 3);

    Ok(())
}

#[tokio::test]
async fn orphaned_items_are_never_persisted() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(store.clone());
    let partition = PartitionSpec::new("2021", "scenario.xlsx");

    // Keyless order row with a populated slot: the order is dropped by
    // dedup, so its item must not survive either
    let rows = vec![
        row(json!("A1"), "01/02/2021", &[(1, "X", "ASIN1", json!(1))]),
        row(Value::Null, "01/02/2021", &[(2, "Ghost", "ASIN9", json!(1))]),
    ];
    let summary = pipeline
        .run_partition(&partition, &StaticSource::new(rows))
        .await?;

    assert_eq!(summary.items_unresolved, 1);
    let items = store.item_rows(&partition.items_relation);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].article_id, "ASIN1");

    Ok(())
}

#[tokio::test]
async fn partitions_are_isolated() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(store.clone());
    let p2021 = PartitionSpec::new("2021", "a.xlsx");
    let p2022 = PartitionSpec::new("2022", "b.xlsx");

    // Same business key in both years: both must persist
    let rows = vec![row(json!("A1"), "01/02/2021", &[(1, "X", "ASIN1", json!(1))])];
    pipeline
        .run_partition(&p2021, &StaticSource::new(rows.clone()))
        .await?;
    let summary = pipeline
        .run_partition(&p2022, &StaticSource::new(rows))
        .await?;

    assert_eq!(summary.orders_inserted, 1);
    assert_eq!(store.order_rows(&p2021.orders_relation).len(), 1);
    assert_eq!(store.order_rows(&p2022.orders_relation).len(), 1);

    Ok(())
}

#[tokio::test]
async fn duplicate_keys_keep_first_attribute_values() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(store.clone());
    let partition = PartitionSpec::new("2021", "scenario.xlsx");

    let mut first = row(json!("A1"), "01/02/2021", &[]);
    first
        .as_object_mut()
        .unwrap()
        .insert("InvoiceNumber".into(), json!("INV-FIRST"));
    let mut second = row(json!("A1"), "02/03/2021", &[]);
    second
        .as_object_mut()
        .unwrap()
        .insert("InvoiceNumber".into(), json!("INV-SECOND"));

    pipeline
        .run_partition(&partition, &StaticSource::new(vec![first, second]))
        .await?;

    let orders = store.order_rows(&partition.orders_relation);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].1.invoice_number.as_deref(), Some("INV-FIRST"));
    assert_eq!(
        orders[0].1.order_date,
        Some(NaiveDate::from_ymd_opt(2021, 2, 1).unwrap())
    );

    Ok(())
}

#[tokio::test]
async fn missing_order_column_fails_the_partition() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(store.clone());
    let partition = PartitionSpec::new("2021", "scenario.xlsx");

    let mut record = row(json!("A1"), "01/02/2021", &[]);
    record.as_object_mut().unwrap().remove("PaymentReference");

    let result = pipeline
        .run_partition(&partition, &StaticSource::new(vec![record]))
        .await;
    assert!(result.is_err());

    // Nothing was persisted for the failed partition
    assert!(store.order_rows(&partition.orders_relation).is_empty());
}
