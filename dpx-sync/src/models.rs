//! Record types
//!
//! Remote shapes deserialize straight from the OData payloads (field names
//! match the wire). [`CandidateRecord`] is the in-flight reconciliation unit;
//! [`ExtractRow`] is its flattened on-disk projection.

use serde::{Deserialize, Deserializer, Serialize};

/// Down-payment status of a line that still has an open down payment
pub const DOWN_PAYMENT_OPEN: &str = "D";

/// Accept `null` where a string is expected
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// OData v2 sends decimals as strings, v4 as numbers
fn decimal_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
        Missing(()),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(value) => Ok(value),
        Amount::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid amount '{}': {}", text, e))),
        Amount::Missing(()) => Ok(0.0),
    }
}

/// Sales order header
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SalesOrderHeader {
    #[serde(rename = "SalesOrder", default, deserialize_with = "null_as_empty")]
    pub sales_order: String,
    #[serde(rename = "CompanyCode", default, deserialize_with = "null_as_empty")]
    pub company_code: String,
    #[serde(rename = "SoldToParty", default)]
    pub sold_to_party: Option<String>,
    #[serde(rename = "YY1_InvoiceScenario_SDH", default)]
    pub scenario_tag: Option<String>,
}

impl SalesOrderHeader {
    pub const COMPANY_CODE: &'static str = "CompanyCode";
    pub const FIELDS: &'static [&'static str] =
        &["SalesOrder", "CompanyCode", "SoldToParty", "YY1_InvoiceScenario_SDH"];
}

/// Sales order line item
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SalesOrderItem {
    #[serde(rename = "SalesOrder", default, deserialize_with = "null_as_empty")]
    pub sales_order: String,
    #[serde(rename = "SalesOrderItem", default, deserialize_with = "null_as_empty")]
    pub sales_order_item: String,
    #[serde(rename = "YY1_SALESFORCEID_I_SDI", default)]
    pub correlation_id: Option<String>,
    #[serde(rename = "DownPaymentStatus", default)]
    pub down_payment_status: Option<String>,
}

impl SalesOrderItem {
    pub const SALES_ORDER: &'static str = "SalesOrder";
    pub const FIELDS: &'static [&'static str] = &[
        "SalesOrder",
        "SalesOrderItem",
        "YY1_SALESFORCEID_I_SDI",
        "DownPaymentStatus",
    ];

    pub fn has_open_down_payment(&self) -> bool {
        self.down_payment_status.as_deref().map(str::trim) == Some(DOWN_PAYMENT_OPEN)
    }
}

/// OData v2 entity metadata
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EntityMetadata {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Accounting document line item
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountingItem {
    #[serde(rename = "AccountingDocument", default, deserialize_with = "null_as_empty")]
    pub accounting_document: String,
    #[serde(rename = "CompanyCode", default, deserialize_with = "null_as_empty")]
    pub company_code: String,
    #[serde(rename = "SalesDocument", default, deserialize_with = "null_as_empty")]
    pub sales_document: String,
    #[serde(rename = "SalesDocumentItem", default, deserialize_with = "null_as_empty")]
    pub sales_document_item: String,
    #[serde(
        rename = "AmountInTransactionCurrency",
        default,
        deserialize_with = "decimal_amount"
    )]
    pub amount: f64,
    #[serde(rename = "FiscalYear", default)]
    pub fiscal_year: Option<String>,
    #[serde(rename = "__metadata", default)]
    pub metadata: Option<EntityMetadata>,
    #[serde(rename = "@odata.id", default)]
    pub odata_id: Option<String>,
}

impl AccountingItem {
    pub const COMPANY_CODE: &'static str = "CompanyCode";
    pub const SALES_DOCUMENT: &'static str = "SalesDocument";
    pub const SALES_DOCUMENT_ITEM: &'static str = "SalesDocumentItem";

    /// Entity identifier carrying the key predicates, if the payload had one
    pub fn identifier(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.id.as_deref().or(m.uri.as_deref()))
            .or(self.odata_id.as_deref())
    }
}

/// Billing document header
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingDocument {
    #[serde(rename = "BillingDocument", default, deserialize_with = "null_as_empty")]
    pub billing_document: String,
}

impl BillingDocument {
    pub const COMPANY_CODE: &'static str = "CompanyCode";
    pub const SCENARIO: &'static str = "YY1_InvoiceScenario_BDH";
    pub const CLEARING_STATUS: &'static str = "InvoiceClearingStatus";
    /// Clearing status value for a fully cleared invoice
    pub const CLEARED: &'static str = "C";
    pub const FIELDS: &'static [&'static str] = &["BillingDocument"];
}

/// Billing document to accounting document / sales order cross-reference
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillingAccountingXref {
    #[serde(rename = "BillingDocument", default, deserialize_with = "null_as_empty")]
    pub billing_document: String,
    #[serde(rename = "AccountingDocument", default, deserialize_with = "null_as_empty")]
    pub accounting_document: String,
    #[serde(rename = "FiscalYear", default, deserialize_with = "null_as_empty")]
    pub fiscal_year: String,
    #[serde(rename = "SalesDocument", default, deserialize_with = "null_as_empty")]
    pub sales_document: String,
    #[serde(rename = "SalesDocumentItem", default, deserialize_with = "null_as_empty")]
    pub sales_document_item: String,
}

impl BillingAccountingXref {
    pub const BILLING_DOCUMENT: &'static str = "BillingDocument";
    pub const FIELDS: &'static [&'static str] = &[
        "BillingDocument",
        "AccountingDocument",
        "FiscalYear",
        "SalesDocument",
        "SalesDocumentItem",
    ];
}

/// Remote status of an accounting document
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FlagRecord {
    #[serde(rename = "AccountingDocument", default, deserialize_with = "null_as_empty")]
    pub accounting_document: String,
    #[serde(rename = "CompanyCode", default, deserialize_with = "null_as_empty")]
    pub company_code: String,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
    #[serde(rename = "IsPaymentSent", default)]
    pub payment_sent: Option<String>,
    #[serde(rename = "IsPaymentBlocked", default)]
    pub payment_blocked: Option<String>,
}

impl FlagRecord {
    pub const ACCOUNTING_DOCUMENT: &'static str = "AccountingDocument";
    pub const COMPANY_CODE: &'static str = "CompanyCode";
}

/// In-flight reconciliation unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateRecord {
    pub partition: String,
    pub sales_order: String,
    pub sales_order_item: String,
    pub correlation_id: Option<String>,
    pub customer: Option<String>,
    pub accounting_document: Option<String>,
    pub fiscal_year: Option<String>,
    /// Scenario B only: the billing document this record was found through
    pub billing_document: Option<String>,
}

impl CandidateRecord {
    /// Complete once both the accounting document and fiscal year are known
    pub fn is_complete(&self) -> bool {
        fn present(value: &Option<String>) -> bool {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        }
        present(&self.accounting_document) && present(&self.fiscal_year)
    }

    /// Identity used for de-duplication before extraction
    pub fn dedup_key(&self) -> (&str, &str, &str) {
        (&self.partition, &self.sales_order, &self.sales_order_item)
    }

    /// Flatten into the seven canonical fields; `None` if incomplete
    pub fn to_extract_row(&self) -> Option<ExtractRow> {
        if !self.is_complete() {
            return None;
        }
        Some(ExtractRow {
            sales_order: self.sales_order.clone(),
            sales_order_item: self.sales_order_item.clone(),
            correlation_id: self.correlation_id.clone().unwrap_or_default(),
            customer: self.customer.clone().unwrap_or_default(),
            accounting_document: self.accounting_document.clone().unwrap_or_default(),
            company_code: self.partition.clone(),
            fiscal_year: self.fiscal_year.clone().unwrap_or_default(),
        })
    }
}

/// One line of an extract file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractRow {
    pub sales_order: String,
    pub sales_order_item: String,
    pub correlation_id: String,
    pub customer: String,
    pub accounting_document: String,
    pub company_code: String,
    pub fiscal_year: String,
}

impl ExtractRow {
    /// Header line, in file order
    pub const HEADER: [&'static str; 7] = [
        "SalesOrder",
        "SalesOrderItem",
        "YY1_SALESFORCEID_I_SDI",
        "Customer",
        "AccountingDocument",
        "CompanyCode",
        "FiscalYear",
    ];

    pub fn fields(&self) -> [&str; 7] {
        [
            &self.sales_order,
            &self.sales_order_item,
            &self.correlation_id,
            &self.customer,
            &self.accounting_document,
            &self.company_code,
            &self.fiscal_year,
        ]
    }

    /// Positional construction; missing trailing fields are empty
    pub fn from_fields<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut values = fields.into_iter().map(str::to_string);
        let mut next = || values.next().unwrap_or_default();
        Self {
            sales_order: next(),
            sales_order_item: next(),
            correlation_id: next(),
            customer: next(),
            accounting_document: next(),
            company_code: next(),
            fiscal_year: next(),
        }
    }
}
