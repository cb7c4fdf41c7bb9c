//! Scenario A (normal) path
//!
//! headers → open down-payment lines → accounting rows → complete candidates

use super::accounting::select_offset_entry;
use super::{retain_complete, unit_result};
use crate::api::SalesApi;
use crate::error::Result;
use crate::models::{AccountingItem, CandidateRecord, SalesOrderHeader, SalesOrderItem};
use crate::pool::StagePools;
use dpx_common::Partition;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Retained header plus its open down-payment lines
struct OrderLines {
    sales_order: String,
    customer: Option<String>,
    lines: Vec<LineRef>,
}

struct LineRef {
    item: String,
    correlation_id: Option<String>,
}

/// Runs the normal path for one partition at a time
pub struct ScenarioAExecutor {
    api: Arc<dyn SalesApi>,
    pools: StagePools,
}

impl ScenarioAExecutor {
    pub fn new(api: Arc<dyn SalesApi>, pools: StagePools) -> Self {
        Self { api, pools }
    }

    /// Produce complete candidates for `partition`
    ///
    /// `excluded` lists sales orders that must never be considered.
    pub async fn run(
        &self,
        partition: &Partition,
        excluded: &[String],
    ) -> Result<Vec<CandidateRecord>> {
        let code = partition.code.as_str();

        // Stage 1: headers; failure aborts the partition
        let headers = self.api.sales_order_headers(code).await?;
        let header_count = headers.len();
        let headers = retain_headers(headers, excluded);
        tracing::info!(
            partition = code,
            fetched = header_count,
            retained = headers.len(),
            "Sales order headers retained"
        );

        // Stage 2: open down-payment lines per header
        let item_results = self
            .pools
            .sales_order_items
            .run_all(headers.iter(), |header| {
                let api = Arc::clone(&self.api);
                async move { api.sales_order_items(&header.sales_order).await }
            })
            .await;

        let orders: Vec<OrderLines> = headers
            .iter()
            .zip(item_results)
            .filter_map(|(header, result)| {
                let items = unit_result(result, "sales_order_items", code, &header.sales_order)?;
                let lines = open_lines(items);
                if lines.is_empty() {
                    return None;
                }
                Some(OrderLines {
                    sales_order: header.sales_order.clone(),
                    customer: header.sold_to_party.clone(),
                    lines,
                })
            })
            .collect();
        tracing::info!(
            partition = code,
            orders = orders.len(),
            lines = orders.iter().map(|o| o.lines.len()).sum::<usize>(),
            "Open down-payment lines found"
        );

        // Stage 3: accounting rows per sales order
        let accounting_results = self
            .pools
            .accounting_documents
            .run_all(orders.iter(), |order| {
                let api = Arc::clone(&self.api);
                let items: Vec<String> = order.lines.iter().map(|l| l.item.clone()).collect();
                async move { api.accounting_items(code, &order.sales_order, &items).await }
            })
            .await;

        let candidates: Vec<CandidateRecord> = orders
            .iter()
            .zip(accounting_results)
            .filter_map(|(order, result)| {
                unit_result(result, "accounting_items", code, &order.sales_order)
                    .map(|rows| join_accounting(code, order, &rows))
            })
            .flatten()
            .collect();

        // Stage 4: only complete candidates leave the executor
        Ok(retain_complete(code, candidates))
    }
}

/// Headers with a scenario tag and a sales order, minus exclusions
fn retain_headers(headers: Vec<SalesOrderHeader>, excluded: &[String]) -> Vec<SalesOrderHeader> {
    let excluded: HashSet<&str> = excluded.iter().map(|s| s.trim()).collect();
    let mut seen = HashSet::new();
    headers
        .into_iter()
        .filter(|h| h.scenario_tag.as_deref().is_some_and(|t| !t.trim().is_empty()))
        .filter(|h| !h.sales_order.trim().is_empty())
        .filter(|h| !excluded.contains(h.sales_order.trim()))
        .filter(|h| seen.insert(h.sales_order.clone()))
        .collect()
}

fn open_lines(items: Vec<SalesOrderItem>) -> Vec<LineRef> {
    items
        .into_iter()
        .filter(SalesOrderItem::has_open_down_payment)
        .filter(|item| !item.sales_order_item.trim().is_empty())
        .map(|item| LineRef {
            item: item.sales_order_item,
            correlation_id: item.correlation_id,
        })
        .collect()
}

/// Attach the selected accounting document to each line of one order
fn join_accounting(
    partition: &str,
    order: &OrderLines,
    rows: &[AccountingItem],
) -> Vec<CandidateRecord> {
    let mut by_item: HashMap<&str, Vec<&AccountingItem>> = HashMap::new();
    for row in rows {
        by_item
            .entry(row.sales_document_item.trim())
            .or_default()
            .push(row);
    }

    order
        .lines
        .iter()
        .map(|line| {
            let line_rows = by_item.get(line.item.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let selection =
                select_offset_entry(partition, &order.sales_order, &line.item, line_rows);
            CandidateRecord {
                partition: partition.to_string(),
                sales_order: order.sales_order.clone(),
                sales_order_item: line.item.clone(),
                correlation_id: line.correlation_id.clone(),
                customer: order.customer.clone(),
                accounting_document: selection.as_ref().map(|s| s.accounting_document.clone()),
                fiscal_year: selection.and_then(|s| s.fiscal_year),
                billing_document: None,
            }
        })
        .collect()
}
