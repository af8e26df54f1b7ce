// DataFusion CatalogManager
//
// Registers the usage table under its schema in the session's default catalog,
// so extraction queries can address it as `goransm.wdcm_clients_wb_entity_usage`.

use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::catalog::{MemorySchemaProvider, TableProvider};
use datafusion::common::TableReference;
use datafusion::prelude::*;
use std::sync::Arc;

use crate::config::{SourceConfig, SourceFormat};
use crate::error::{EtlError, Result};
use crate::models::{ASPECT_COLUMN, PAGE_ID_COLUMN, SOURCE_SCHEMA, SOURCE_TABLE, WIKI_COLUMN};

/// Name of the catalog DataFusion creates by default
pub const DEFAULT_CATALOG: &str = "datafusion";

/// Manages catalog registration for DataFusion
///
/// ```text
/// datafusion (default catalog)
///   └── goransm
///       └── wdcm_clients_wb_entity_usage
/// ```
pub struct DataFusionCatalogManager {
    ctx: SessionContext,
}

impl DataFusionCatalogManager {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    /// Register the source schema in the default catalog
    pub fn register_source_schema(&self) -> Result<()> {
        let catalog = self.ctx.catalog(DEFAULT_CATALOG).ok_or_else(|| {
            EtlError::Session(format!("Default catalog '{}' not found", DEFAULT_CATALOG))
        })?;

        if catalog.schema(SOURCE_SCHEMA).is_none() {
            catalog
                .register_schema(SOURCE_SCHEMA, Arc::new(MemorySchemaProvider::new()))
                .map_err(|e| {
                    EtlError::Session(format!(
                        "Failed to register schema '{}': {}",
                        SOURCE_SCHEMA, e
                    ))
                })?;
        }

        Ok(())
    }

    /// Bind an arbitrary table provider as the source table
    pub fn register_source_table(&self, provider: Arc<dyn TableProvider>) -> Result<()> {
        self.ctx
            .register_table(source_table_reference(), provider)
            .map_err(|e| EtlError::Session(format!("Failed to register source table: {}", e)))?;

        tracing::info!("Registered source table {}.{}", SOURCE_SCHEMA, SOURCE_TABLE);
        Ok(())
    }

    /// Bind the files at `source.path` as the source table
    ///
    /// Does nothing when no path is configured; queries then fail on the missing table.
    pub async fn register_source_files(&self, source: &SourceConfig) -> Result<()> {
        let Some(path) = source.path.as_deref() else {
            tracing::warn!(
                "No source path configured; {}.{} must be registered by the caller",
                SOURCE_SCHEMA,
                SOURCE_TABLE
            );
            return Ok(());
        };

        let registered = match source.format {
            SourceFormat::Parquet => {
                self.ctx
                    .register_parquet(source_table_reference(), path, ParquetReadOptions::default())
                    .await
            }
            SourceFormat::Csv => {
                let schema = usage_table_schema();
                let options = CsvReadOptions::new().has_header(true).schema(&schema);
                self.ctx
                    .register_csv(source_table_reference(), path, options)
                    .await
            }
        };

        registered.map_err(|e| {
            EtlError::Session(format!(
                "Failed to register source table from {}: {}",
                path, e
            ))
        })?;

        tracing::info!(
            "Registered source table {}.{} from {} ({:?})",
            SOURCE_SCHEMA,
            SOURCE_TABLE,
            path,
            source.format
        );
        Ok(())
    }

    /// List all tables registered in the source schema
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let catalog = self.ctx.catalog(DEFAULT_CATALOG).ok_or_else(|| {
            EtlError::Session(format!("Default catalog '{}' not found", DEFAULT_CATALOG))
        })?;

        let schema = catalog.schema(SOURCE_SCHEMA).ok_or_else(|| {
            EtlError::Session(format!("Schema '{}' not found", SOURCE_SCHEMA))
        })?;

        Ok(schema.table_names())
    }
}

fn source_table_reference() -> TableReference {
    TableReference::partial(SOURCE_SCHEMA, SOURCE_TABLE)
}

/// Columns the extraction queries read from the usage table
pub fn usage_table_schema() -> Schema {
    Schema::new(vec![
        Field::new(PAGE_ID_COLUMN, DataType::Int64, false),
        Field::new(WIKI_COLUMN, DataType::Utf8, false),
        Field::new(ASPECT_COLUMN, DataType::Utf8, false),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::datasource::MemTable;

    #[tokio::test]
    async fn test_register_source_schema_and_table() {
        let manager = DataFusionCatalogManager::new(SessionContext::new());
        manager.register_source_schema().unwrap();
        assert!(manager.list_tables().unwrap().is_empty());

        let table = MemTable::try_new(Arc::new(usage_table_schema()), vec![vec![]]).unwrap();
        manager.register_source_table(Arc::new(table)).unwrap();

        let tables = manager.list_tables().unwrap();
        assert_eq!(tables, vec![SOURCE_TABLE.to_string()]);
    }

    #[test]
    fn test_register_schema_twice_is_harmless() {
        let manager = DataFusionCatalogManager::new(SessionContext::new());
        manager.register_source_schema().unwrap();
        manager.register_source_schema().unwrap();
        assert!(manager.list_tables().is_ok());
    }

    #[test]
    fn test_table_requires_schema() {
        let manager = DataFusionCatalogManager::new(SessionContext::new());
        let table = MemTable::try_new(Arc::new(usage_table_schema()), vec![vec![]]).unwrap();
        assert!(manager.register_source_table(Arc::new(table)).is_err());
    }

    #[tokio::test]
    async fn test_no_source_path_is_noop() {
        let manager = DataFusionCatalogManager::new(SessionContext::new());
        manager.register_source_schema().unwrap();
        let source = SourceConfig {
            path: None,
            format: SourceFormat::Parquet,
        };
        manager.register_source_files(&source).await.unwrap();
        assert!(manager.list_tables().unwrap().is_empty());
    }
}
