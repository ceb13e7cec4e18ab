/// Column name constants for the source spreadsheets to ensure consistency
/// between the normalizer and tests.

// Order columns (all eight must exist in every source sheet)
pub const ORDER_NUMBER_COL: &str = "OrderNumber";
pub const INVOICE_NUMBER_COL: &str = "InvoiceNumber";
pub const PAYMENT_REFERENCE_COL: &str = "PaymentReference";
pub const BILLING_ADDRESS_COL: &str = "BillingAddress";
pub const SHIPPING_ADDRESS_COL: &str = "ShippingAddress";
pub const PAID_AMOUNT_COL: &str = "PaidAmount";
pub const COUNTRY_CODE_COL: &str = "CountryCode";
pub const ORDER_DATE_COL: &str = "OrderDate";

/// Repeated article sub-fields per row; slots beyond this are never scanned
pub const MAX_ARTICLE_SLOTS: usize = 5;

pub fn article_name_column(slot: usize) -> String {
    format!("ArticleName{slot}")
}

pub fn article_id_column(slot: usize) -> String {
    format!("ArticleId{slot}")
}

pub fn quantity_column(slot: usize) -> String {
    format!("Quantity{slot}")
}
