// DataFusion QueryExecutor
//
// Plans SQL against the session and materialises results in memory, with
// optional timeout support.

use datafusion::prelude::*;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{EtlError, Result};

/// Executes DataFusion queries with an optional timeout
pub struct DataFusionQueryExecutor {
    ctx: SessionContext,
    /// `None` lets queries run to completion
    default_timeout: Option<Duration>,
}

impl DataFusionQueryExecutor {
    pub fn new(ctx: SessionContext, default_timeout: Option<Duration>) -> Self {
        Self {
            ctx,
            default_timeout,
        }
    }

    /// Plan a SQL query and execute it into an in-memory table
    ///
    /// The returned DataFrame scans the cached batches, so consuming it again does
    /// not re-run the query.
    ///
    /// # Errors
    /// Returns error if parsing or planning fails (unknown table or column, type mismatch)
    pub async fn execute_cached(&self, sql: &str) -> Result<DataFrame> {
        self.with_timeout(async {
            let df = self.ctx.sql(sql).await?;
            let cached = df.cache().await?;
            Ok(cached)
        })
        .await
    }

    async fn with_timeout<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.default_timeout {
            Some(limit) => timeout(limit, fut)
                .await
                .map_err(|_| EtlError::Timeout(limit))?,
            None => fut.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generous_timeout_completes() {
        let executor = DataFusionQueryExecutor::new(SessionContext::new(), Some(Duration::from_secs(30)));
        let df = executor.execute_cached("SELECT 1 as num").await.unwrap();
        assert_eq!(df.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_execute_cached() {
        let executor = DataFusionQueryExecutor::new(SessionContext::new(), None);

        let df = executor
            .execute_cached("SELECT 1 as num, 'hello' as text")
            .await
            .unwrap();
        let batches = df.clone().collect().await.unwrap();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 1);

        // A cached frame can be consumed more than once
        assert_eq!(df.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_table_is_query_error() {
        let executor = DataFusionQueryExecutor::new(SessionContext::new(), None);
        let result = executor.execute_cached("SELECT * FROM missing_table").await;
        assert!(matches!(result, Err(EtlError::Query(_))));
    }

    #[tokio::test]
    async fn test_query_timeout() {
        let executor = DataFusionQueryExecutor::new(SessionContext::new(), Some(Duration::from_nanos(1)));

        // May or may not time out depending on system speed, but should not crash
        match executor.execute_cached("SELECT 1").await {
            Ok(_) => {}
            Err(e) => assert!(matches!(e, EtlError::Timeout(_))),
        }
    }
}
