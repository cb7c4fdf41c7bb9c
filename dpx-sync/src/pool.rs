//! Bounded task pools
//!
//! A [`TaskPool`] caps how many units of work run at once. Admission is FIFO
//! (tokio's semaphore queues waiters fairly); completion order is whatever the
//! network gives us. Each unit's result comes back to its own caller, so one
//! failing lookup never cancels its siblings.
//!
//! Pools are built once per run and handed to every stage, which caps the total
//! number of outstanding remote calls across all partitions.

use crate::error::SyncError;
use dpx_common::config::PoolConfig;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Fixed-ceiling admission gate for async work
#[derive(Clone, Debug)]
pub struct TaskPool {
    name: &'static str,
    ceiling: usize,
    semaphore: Arc<Semaphore>,
}

impl TaskPool {
    /// Ceilings below 1 are raised to 1
    pub fn new(name: &'static str, ceiling: usize) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            name,
            ceiling,
            semaphore: Arc::new(Semaphore::new(ceiling)),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Units currently allowed to start without waiting
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run one unit once a slot frees up
    pub async fn run<F>(&self, unit: F) -> Result<F::Output, SyncError>
    where
        F: Future,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| SyncError::Pool(format!("{} pool closed: {}", self.name, e)))?;
        Ok(unit.await)
    }

    /// Fan out one unit per item and collect every result in item order
    ///
    /// Results are returned positionally; completion order is unconstrained.
    pub async fn run_all<I, F, Fut>(
        &self,
        items: I,
        mut make_unit: F,
    ) -> Vec<Result<Fut::Output, SyncError>>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future,
    {
        let units: Vec<_> = items
            .into_iter()
            .map(|item| self.run(make_unit(item)))
            .collect();

        tracing::trace!(pool = self.name, units = units.len(), "Pool fan-out");
        join_all(units).await
    }
}

/// The three process-wide pools, one per lookup kind
#[derive(Clone, Debug)]
pub struct StagePools {
    pub sales_order_items: TaskPool,
    pub accounting_documents: TaskPool,
    pub flags: TaskPool,
}

impl StagePools {
    pub fn from_config(config: &PoolConfig) -> Self {
        Self {
            sales_order_items: TaskPool::new("sales_order_items", config.sales_order_items),
            accounting_documents: TaskPool::new(
                "accounting_documents",
                config.accounting_documents,
            ),
            flags: TaskPool::new("flags", config.flags),
        }
    }

    /// Same ceiling everywhere (tests use 1 to force serial execution)
    pub fn uniform(ceiling: usize) -> Self {
        Self {
            sales_order_items: TaskPool::new("sales_order_items", ceiling),
            accounting_documents: TaskPool::new("accounting_documents", ceiling),
            flags: TaskPool::new("flags", ceiling),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ceiling_raised_to_one() {
        let pool = TaskPool::new("test", 0);
        assert_eq!(pool.ceiling(), 1);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_results_returned_in_item_order() {
        let pool = TaskPool::new("test", 3);
        let results = pool
            .run_all(vec![30u64, 10, 20], |delay| async move {
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                delay
            })
            .await;

        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn test_unit_failure_isolated() {
        let pool = TaskPool::new("test", 2);
        let results = pool
            .run_all(1..=4, |n| async move {
                if n == 2 {
                    Err(format!("unit {} failed", n))
                } else {
                    Ok(n)
                }
            })
            .await;

        let outcomes: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(outcomes[0], Ok(1));
        assert!(outcomes[1].is_err());
        assert_eq!(outcomes[2], Ok(3));
        assert_eq!(outcomes[3], Ok(4));
    }

    #[test]
    fn test_pools_from_config() {
        let pools = StagePools::from_config(&PoolConfig {
            sales_order_items: 4,
            accounting_documents: 6,
            flags: 8,
        });
        assert_eq!(pools.sales_order_items.ceiling(), 4);
        assert_eq!(pools.accounting_documents.ceiling(), 6);
        assert_eq!(pools.flags.ceiling(), 8);
    }
}
