use datafusion::prelude::DataFrame;
use std::time::Duration;

use crate::error::Result;
use crate::models::{Dataset, PAGE_ID_COLUMN, SOURCE_SCHEMA, SOURCE_TABLE, WIKI_COLUMN};
use crate::services::datafusion::{DataFusionQueryExecutor, EtlSession};
use crate::validation::SqlValidator;

/// Runs the per-dataset SELECT DISTINCT against the usage table
pub struct ExtractionService {
    executor: DataFusionQueryExecutor,
}

impl ExtractionService {
    pub fn new(session: &EtlSession, timeout: Option<Duration>) -> Self {
        Self {
            executor: DataFusionQueryExecutor::new(session.context().clone(), timeout),
        }
    }

    /// SQL selecting the distinct (page, wiki) pairs of a dataset
    pub fn extraction_sql(dataset: Dataset) -> String {
        format!(
            "SELECT DISTINCT {}, {} FROM {}.{} WHERE {}",
            PAGE_ID_COLUMN,
            WIKI_COLUMN,
            SOURCE_SCHEMA,
            SOURCE_TABLE,
            dataset.aspect_filter().to_sql()
        )
    }

    /// Run the dataset's query and cache the result in memory
    pub async fn extract(&self, dataset: Dataset) -> Result<DataFrame> {
        let sql = Self::extraction_sql(dataset);
        SqlValidator::validate_select_only(&sql)?;

        tracing::debug!("Extracting {} dataset: {}", dataset, sql);
        self.executor.execute_cached(&sql).await
    }
}
