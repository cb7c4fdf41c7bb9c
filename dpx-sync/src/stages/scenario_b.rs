//! Scenario B (billing) path
//!
//! cleared billing documents → accounting/sales order xref → line items for the
//! correlation id → complete candidates. The customer is not resolved here.

use super::{retain_complete, unit_result};
use crate::api::SalesApi;
use crate::error::Result;
use crate::models::{BillingAccountingXref, CandidateRecord, SalesOrderItem};
use crate::pool::StagePools;
use dpx_common::Partition;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Runs the billing path for one partition at a time
pub struct ScenarioBExecutor {
    api: Arc<dyn SalesApi>,
    pools: StagePools,
}

impl ScenarioBExecutor {
    pub fn new(api: Arc<dyn SalesApi>, pools: StagePools) -> Self {
        Self { api, pools }
    }

    pub async fn run(&self, partition: &Partition) -> Result<Vec<CandidateRecord>> {
        let code = partition.code.as_str();

        // Stage 1: cleared billing documents; failure aborts the partition
        let billing_documents: Vec<String> = self
            .api
            .billing_documents(code)
            .await?
            .into_iter()
            .map(|doc| doc.billing_document)
            .filter(|id| !id.trim().is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        tracing::info!(
            partition = code,
            billing_documents = billing_documents.len(),
            "Cleared billing documents found"
        );

        // Stage 2: cross-reference per billing document
        let xref_results = self
            .pools
            .accounting_documents
            .run_all(billing_documents.iter(), |billing_document| {
                let api = Arc::clone(&self.api);
                async move { api.billing_accounting_xref(billing_document).await }
            })
            .await;

        let skeletons: Vec<CandidateRecord> = billing_documents
            .iter()
            .zip(xref_results)
            .filter_map(|(billing_document, result)| {
                unit_result(result, "billing_accounting_xref", code, billing_document)
            })
            .flatten()
            .filter(|row| !row.sales_document.trim().is_empty())
            .map(|row| skeleton(code, row))
            .collect();

        // Stage 3: correlation ids per distinct sales order
        let sales_orders: Vec<String> = skeletons
            .iter()
            .map(|s| s.sales_order.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let item_results = self
            .pools
            .sales_order_items
            .run_all(sales_orders.iter(), |sales_order| {
                let api = Arc::clone(&self.api);
                async move { api.sales_order_items(sales_order).await }
            })
            .await;

        let mut correlation: HashMap<(String, String), Option<String>> = HashMap::new();
        let mut resolved_orders = BTreeSet::new();
        for (sales_order, result) in sales_orders.iter().zip(item_results) {
            let Some(items) = unit_result(result, "sales_order_items", code, sales_order) else {
                continue;
            };
            resolved_orders.insert(sales_order.clone());
            for SalesOrderItem {
                sales_order,
                sales_order_item,
                correlation_id,
                ..
            } in items
            {
                correlation.insert(
                    (sales_order.trim().to_string(), sales_order_item.trim().to_string()),
                    correlation_id,
                );
            }
        }

        let candidates: Vec<CandidateRecord> = skeletons
            .into_iter()
            .filter(|s| resolved_orders.contains(&s.sales_order))
            .map(|mut s| {
                s.correlation_id = correlation
                    .get(&(s.sales_order.clone(), s.sales_order_item.clone()))
                    .cloned()
                    .flatten();
                s
            })
            .collect();

        tracing::info!(
            partition = code,
            candidates = candidates.len(),
            "Billing path candidates joined"
        );

        // Stage 4
        Ok(retain_complete(code, candidates))
    }
}

fn skeleton(partition: &str, row: BillingAccountingXref) -> CandidateRecord {
    fn non_blank(value: String) -> Option<String> {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    CandidateRecord {
        partition: partition.to_string(),
        sales_order: row.sales_document.trim().to_string(),
        sales_order_item: row.sales_document_item.trim().to_string(),
        correlation_id: None,
        customer: None,
        accounting_document: non_blank(row.accounting_document),
        fiscal_year: non_blank(row.fiscal_year),
        billing_document: non_blank(row.billing_document),
    }
}
