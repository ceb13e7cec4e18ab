use crate::constants::{
    article_id_column, article_name_column, quantity_column, BILLING_ADDRESS_COL,
    COUNTRY_CODE_COL, INVOICE_NUMBER_COL, MAX_ARTICLE_SLOTS, ORDER_DATE_COL, ORDER_NUMBER_COL,
    PAID_AMOUNT_COL, PAYMENT_REFERENCE_COL, SHIPPING_ADDRESS_COL,
};
use crate::error::{EtlError, Result};
use crate::types::{LineItem, Order, SourceRecord};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

/// Day-first formats first; ISO last because Excel date cells arrive as ISO text
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y", "%Y-%m-%d"];

/// Convert one flat source record into an order plus its 0-5 line items.
///
/// Pure mapping, no side effects. A missing order column is fatal for the
/// partition; an empty cell is not.
pub fn normalize_record(record: &SourceRecord) -> Result<(Order, Vec<LineItem>)> {
    let order_number = text_field(record, ORDER_NUMBER_COL)?;

    let order = Order {
        order_number: order_number.clone(),
        invoice_number: text_field(record, INVOICE_NUMBER_COL)?,
        payment_reference: text_field(record, PAYMENT_REFERENCE_COL)?,
        billing_address: text_field(record, BILLING_ADDRESS_COL)?,
        shipping_address: text_field(record, SHIPPING_ADDRESS_COL)?,
        paid_amount: parse_amount(required_cell(record, PAID_AMOUNT_COL)?),
        country_code: text_field(record, COUNTRY_CODE_COL)?,
        order_date: text_field(record, ORDER_DATE_COL)?.and_then(|s| parse_order_date(&s)),
    };

    let mut items = Vec::new();
    for slot in 1..=MAX_ARTICLE_SLOTS {
        // Slot columns are optional; a sheet with fewer slots just yields fewer items
        let name = record
            .get(article_name_column(slot).as_str())
            .and_then(text_value);
        let article_id = record
            .get(article_id_column(slot).as_str())
            .and_then(text_value);

        if let (Some(article_name), Some(article_id)) = (name, article_id) {
            let quantity = parse_quantity(record.get(quantity_column(slot).as_str()));
            items.push(LineItem {
                order_number: order_number.clone(),
                article_name,
                article_id,
                quantity,
            });
        }
    }

    Ok((order, items))
}

/// Parse a day-first textual date; anything unparseable becomes `None`.
pub fn parse_order_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

fn required_cell<'a>(record: &'a SourceRecord, column: &str) -> Result<&'a Value> {
    record
        .get(column)
        .ok_or_else(|| EtlError::MissingColumn(column.to_string()))
}

fn text_field(record: &SourceRecord, column: &str) -> Result<Option<String>> {
    Ok(text_value(required_cell(record, column)?))
}

/// Cell text: null and blank strings become `None`, numeric cells keep their
/// textual form (order numbers are sometimes typed as numbers in exports).
fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        // German exports write comma decimals
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

/// Quantity coercion: integer when parseable, 1 when absent or non-numeric.
fn parse_quantity(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(1),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(1)
        }
        _ => 1,
    }
}
