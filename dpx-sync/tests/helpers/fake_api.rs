//! In-memory [`SalesApi`] for stage and pipeline tests

use async_trait::async_trait;
use dpx_sync::api::SalesApi;
use dpx_sync::error::FetchError;
use dpx_sync::models::{
    AccountingItem, BillingAccountingXref, BillingDocument, FlagRecord, SalesOrderHeader,
    SalesOrderItem,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeSalesApi {
    headers: HashMap<String, Vec<SalesOrderHeader>>,
    items: HashMap<String, Vec<SalesOrderItem>>,
    accounting: HashMap<String, Vec<AccountingItem>>,
    billing: HashMap<String, Vec<BillingDocument>>,
    xref: HashMap<String, Vec<BillingAccountingXref>>,
    flags: HashMap<String, Vec<FlagRecord>>,
    failing: HashSet<String>,
    pub flag_lookups: AtomicUsize,
    pub item_lookups: Mutex<Vec<String>>,
}

fn failure(key: &str) -> FetchError {
    FetchError::Api {
        url: format!("fake://{}", key),
        status: 500,
        body: "scripted failure".to_string(),
    }
}

impl FakeSalesApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, partition: &str, sales_order: &str, customer: &str, tag: &str) -> Self {
        self.headers
            .entry(partition.to_string())
            .or_default()
            .push(SalesOrderHeader {
                sales_order: sales_order.to_string(),
                company_code: partition.to_string(),
                sold_to_party: Some(customer.to_string()),
                scenario_tag: Some(tag.to_string()),
            });
        self
    }

    pub fn item(mut self, sales_order: &str, item: &str, sfid: &str, status: &str) -> Self {
        self.items
            .entry(sales_order.to_string())
            .or_default()
            .push(SalesOrderItem {
                sales_order: sales_order.to_string(),
                sales_order_item: item.to_string(),
                correlation_id: Some(sfid.to_string()),
                down_payment_status: Some(status.to_string()),
            });
        self
    }

    pub fn accounting(
        mut self,
        sales_order: &str,
        item: &str,
        document: &str,
        amount: f64,
        fiscal_year: &str,
    ) -> Self {
        self.accounting
            .entry(sales_order.to_string())
            .or_default()
            .push(AccountingItem {
                accounting_document: document.to_string(),
                company_code: String::new(),
                sales_document: sales_order.to_string(),
                sales_document_item: item.to_string(),
                amount,
                fiscal_year: Some(fiscal_year.to_string()),
                metadata: None,
                odata_id: None,
            });
        self
    }

    pub fn accounting_row(mut self, row: AccountingItem) -> Self {
        self.accounting
            .entry(row.sales_document.clone())
            .or_default()
            .push(row);
        self
    }

    pub fn billing(mut self, partition: &str, billing_document: &str) -> Self {
        self.billing
            .entry(partition.to_string())
            .or_default()
            .push(BillingDocument {
                billing_document: billing_document.to_string(),
            });
        self
    }

    pub fn xref(
        mut self,
        billing_document: &str,
        document: &str,
        fiscal_year: &str,
        sales_order: &str,
        item: &str,
    ) -> Self {
        self.xref
            .entry(billing_document.to_string())
            .or_default()
            .push(BillingAccountingXref {
                billing_document: billing_document.to_string(),
                accounting_document: document.to_string(),
                fiscal_year: fiscal_year.to_string(),
                sales_document: sales_order.to_string(),
                sales_document_item: item.to_string(),
            });
        self
    }

    pub fn flag(mut self, document: &str, status: &str, sent: &str, blocked: &str) -> Self {
        self.flags
            .entry(document.to_string())
            .or_default()
            .push(FlagRecord {
                accounting_document: document.to_string(),
                company_code: String::new(),
                status: Some(status.to_string()),
                payment_sent: Some(sent.to_string()),
                payment_blocked: Some(blocked.to_string()),
            });
        self
    }

    /// Any lookup keyed by `key` (partition, sales order, billing or accounting document) fails
    pub fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    fn lookup<T: Clone>(
        &self,
        map: &HashMap<String, Vec<T>>,
        key: &str,
    ) -> Result<Vec<T>, FetchError> {
        if self.failing.contains(key) {
            return Err(failure(key));
        }
        Ok(map.get(key).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl SalesApi for FakeSalesApi {
    async fn sales_order_headers(
        &self,
        partition: &str,
    ) -> Result<Vec<SalesOrderHeader>, FetchError> {
        self.lookup(&self.headers, partition)
    }

    async fn sales_order_items(
        &self,
        sales_order: &str,
    ) -> Result<Vec<SalesOrderItem>, FetchError> {
        self.item_lookups.lock().unwrap().push(sales_order.to_string());
        tokio::task::yield_now().await;
        self.lookup(&self.items, sales_order)
    }

    async fn accounting_items(
        &self,
        _partition: &str,
        sales_order: &str,
        items: &[String],
    ) -> Result<Vec<AccountingItem>, FetchError> {
        let rows = self.lookup(&self.accounting, sales_order)?;
        Ok(rows
            .into_iter()
            .filter(|row| items.contains(&row.sales_document_item))
            .collect())
    }

    async fn billing_documents(&self, partition: &str) -> Result<Vec<BillingDocument>, FetchError> {
        self.lookup(&self.billing, partition)
    }

    async fn billing_accounting_xref(
        &self,
        billing_document: &str,
    ) -> Result<Vec<BillingAccountingXref>, FetchError> {
        self.lookup(&self.xref, billing_document)
    }

    async fn flag_records(
        &self,
        accounting_document: &str,
        _partition: &str,
    ) -> Result<Vec<FlagRecord>, FetchError> {
        self.flag_lookups.fetch_add(1, Ordering::SeqCst);
        self.lookup(&self.flags, accounting_document)
    }
}
