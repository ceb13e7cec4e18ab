use crate::types::Order;
use std::collections::HashSet;
use tracing::debug;

/// Collapse duplicate orders within one batch.
///
/// Keep-first policy: the earliest row wins and keeps its attribute values.
/// Rows without a business key (blank trailer rows, export artifacts) are
/// dropped entirely. Line items are not touched here; items whose parent was
/// dropped simply fail to resolve at load time.
pub fn dedupe_orders(orders: Vec<Order>) -> Vec<Order> {
    let total = orders.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(total);
    let mut kept = Vec::with_capacity(total);
    let mut keyless = 0usize;

    for order in orders {
        match order.order_number.as_deref() {
            None => keyless += 1,
            Some(key) => {
                if seen.insert(key.to_string()) {
                    kept.push(order);
                }
            }
        }
    }

    let duplicates = total - keyless - kept.len();
    if keyless > 0 || duplicates > 0 {
        debug!(
            keyless,
            duplicates,
            kept = kept.len(),
            "Deduplicated order batch"
        );
    }
    kept
}
