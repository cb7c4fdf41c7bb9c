//! Remote sales and accounting API
//!
//! [`SalesApi`] is the seam between the stage executors and the network; the
//! OData implementation issues one paged query per call, retried with the
//! linear-backoff policy. Tests substitute in-memory implementations.

use crate::error::FetchError;
use crate::models::{
    AccountingItem, BillingAccountingXref, BillingDocument, FlagRecord, SalesOrderHeader,
    SalesOrderItem,
};
use crate::odata::fetcher::Credentials;
use crate::odata::{Filter, PagedFetcher, Query};
use crate::retry::{retry_linear, RetryPolicy};
use async_trait::async_trait;
use dpx_common::config::{EndpointConfig, Settings};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Collection reads used by the reconciliation stages
#[async_trait]
pub trait SalesApi: Send + Sync {
    /// Sales order headers of one partition
    async fn sales_order_headers(
        &self,
        partition: &str,
    ) -> Result<Vec<SalesOrderHeader>, FetchError>;

    /// Line items of one sales order
    async fn sales_order_items(&self, sales_order: &str) -> Result<Vec<SalesOrderItem>, FetchError>;

    /// Accounting rows posted against the given lines of one sales order
    async fn accounting_items(
        &self,
        partition: &str,
        sales_order: &str,
        items: &[String],
    ) -> Result<Vec<AccountingItem>, FetchError>;

    /// Cleared scenario-B billing documents of one partition
    async fn billing_documents(&self, partition: &str) -> Result<Vec<BillingDocument>, FetchError>;

    /// Accounting / sales order cross-reference of one billing document
    async fn billing_accounting_xref(
        &self,
        billing_document: &str,
    ) -> Result<Vec<BillingAccountingXref>, FetchError>;

    /// Status records of one accounting document
    async fn flag_records(
        &self,
        accounting_document: &str,
        partition: &str,
    ) -> Result<Vec<FlagRecord>, FetchError>;
}

/// [`SalesApi`] over OData collections
pub struct ODataSalesApi {
    fetcher: PagedFetcher,
    endpoints: EndpointConfig,
    retry: RetryPolicy,
}

impl ODataSalesApi {
    pub fn new(fetcher: PagedFetcher, endpoints: EndpointConfig, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            endpoints,
            retry,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, FetchError> {
        let api = &settings.api;
        let fetcher = PagedFetcher::new(
            &api.base_url,
            Credentials {
                username: api.username.clone(),
                password: api.password.clone(),
            },
            settings.api_timeout(),
            &api.user_agent,
        )?;
        let retry = RetryPolicy::new(api.max_retries, Duration::from_millis(api.base_delay_ms));
        Ok(Self::new(fetcher, api.endpoints.clone(), retry))
    }

    async fn fetch<T>(
        &self,
        operation: &str,
        collection: &str,
        query: Query,
    ) -> Result<Vec<T>, FetchError>
    where
        T: DeserializeOwned + Send,
    {
        retry_linear(operation, &self.retry, FetchError::is_retriable, || {
            self.fetcher.fetch_all::<T>(collection, &query)
        })
        .await
    }
}

#[async_trait]
impl SalesApi for ODataSalesApi {
    async fn sales_order_headers(
        &self,
        partition: &str,
    ) -> Result<Vec<SalesOrderHeader>, FetchError> {
        let query = Query::new(Filter::new().eq(SalesOrderHeader::COMPANY_CODE, partition))
            .select(SalesOrderHeader::FIELDS);
        self.fetch("sales order headers", &self.endpoints.sales_orders, query).await
    }

    async fn sales_order_items(
        &self,
        sales_order: &str,
    ) -> Result<Vec<SalesOrderItem>, FetchError> {
        let query = Query::new(Filter::new().eq(SalesOrderItem::SALES_ORDER, sales_order))
            .select(SalesOrderItem::FIELDS);
        self.fetch("sales order items", &self.endpoints.sales_order_items, query).await
    }

    async fn accounting_items(
        &self,
        partition: &str,
        sales_order: &str,
        items: &[String],
    ) -> Result<Vec<AccountingItem>, FetchError> {
        let per_item = items
            .iter()
            .map(|item| Filter::new().eq(AccountingItem::SALES_DOCUMENT_ITEM, item))
            .collect();
        let filter = Filter::new()
            .eq(AccountingItem::COMPANY_CODE, partition)
            .eq(AccountingItem::SALES_DOCUMENT, sales_order)
            .any_of(per_item);
        // No $select: the entity identifier must stay in the payload
        self.fetch("accounting items", &self.endpoints.accounting_items, Query::new(filter))
            .await
    }

    async fn billing_documents(&self, partition: &str) -> Result<Vec<BillingDocument>, FetchError> {
        let filter = Filter::new()
            .eq(BillingDocument::COMPANY_CODE, partition)
            .eq(BillingDocument::SCENARIO, "B")
            .eq(BillingDocument::CLEARING_STATUS, BillingDocument::CLEARED);
        let query = Query::new(filter).select(BillingDocument::FIELDS);
        self.fetch("billing documents", &self.endpoints.billing_documents, query).await
    }

    async fn billing_accounting_xref(
        &self,
        billing_document: &str,
    ) -> Result<Vec<BillingAccountingXref>, FetchError> {
        let query = Query::new(
            Filter::new().eq(BillingAccountingXref::BILLING_DOCUMENT, billing_document),
        )
        .select(BillingAccountingXref::FIELDS);
        self.fetch(
            "billing accounting xref",
            &self.endpoints.billing_accounting_xref,
            query,
        )
        .await
    }

    async fn flag_records(
        &self,
        accounting_document: &str,
        partition: &str,
    ) -> Result<Vec<FlagRecord>, FetchError> {
        let filter = Filter::new()
            .eq(FlagRecord::ACCOUNTING_DOCUMENT, accounting_document)
            .eq(FlagRecord::COMPANY_CODE, partition);
        self.fetch("flag records", &self.endpoints.flags, Query::new(filter)).await
    }
}
