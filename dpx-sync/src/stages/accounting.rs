//! Accounting join
//!
//! Each down-payment line is expected to carry exactly two accounting rows: the
//! charge and its offset. The offsetting (negative) row is the authoritative
//! reference. Count and balance anomalies are logged but never block selection.

use crate::fiscal_year::fiscal_year_from_identifier;
use crate::models::AccountingItem;

/// Rows a healthy line produces
pub const EXPECTED_ROWS_PER_LINE: usize = 2;

/// Largest tolerated deviation of the summed amounts from zero
pub const BALANCE_EPSILON: f64 = 0.01;

/// Outcome of selecting among the accounting rows of one line
#[derive(Debug, Clone, PartialEq)]
pub struct AccountingSelection {
    pub accounting_document: String,
    /// Fiscal year from the row's field, else from its identifier
    pub fiscal_year: Option<String>,
    pub amount: f64,
    pub row_count: usize,
    pub balance: f64,
}

impl AccountingSelection {
    pub fn is_balanced(&self) -> bool {
        self.balance.abs() <= BALANCE_EPSILON
    }
}

/// Pick the offsetting entry among one line's accounting rows
///
/// Returns `None` when no row has a negative amount.
pub fn select_offset_entry(
    partition: &str,
    sales_order: &str,
    sales_order_item: &str,
    rows: &[&AccountingItem],
) -> Option<AccountingSelection> {
    if rows.len() != EXPECTED_ROWS_PER_LINE {
        tracing::warn!(
            partition,
            sales_order,
            sales_order_item,
            rows = rows.len(),
            expected = EXPECTED_ROWS_PER_LINE,
            "Unexpected accounting row count for sales order line"
        );
    }

    let balance: f64 = rows.iter().map(|row| row.amount).sum();
    if balance.abs() > BALANCE_EPSILON {
        tracing::warn!(
            partition,
            sales_order,
            sales_order_item,
            balance,
            "Accounting rows do not balance to zero"
        );
    }

    let offset = rows.iter().find(|row| row.amount < 0.0)?;

    Some(AccountingSelection {
        accounting_document: offset.accounting_document.clone(),
        fiscal_year: resolve_fiscal_year(offset),
        amount: offset.amount,
        row_count: rows.len(),
        balance,
    })
}

/// Field first, identifier second
fn resolve_fiscal_year(row: &AccountingItem) -> Option<String> {
    if let Some(year) = row.fiscal_year.as_deref().map(str::trim) {
        if !year.is_empty() {
            return Some(year.to_string());
        }
    }

    let identifier = row.identifier()?;
    match fiscal_year_from_identifier(identifier) {
        Ok(year) => Some(year),
        Err(e) => {
            tracing::warn!(
                accounting_document = %row.accounting_document,
                identifier,
                error = %e,
                "Could not recover fiscal year from accounting identifier"
            );
            None
        }
    }
}
