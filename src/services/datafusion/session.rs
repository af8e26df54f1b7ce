// DataFusion SessionManager
//
// Builds the one SessionContext a pipeline run uses, with catalog support and
// the usage table bound into it.

use datafusion::catalog::TableProvider;
use datafusion::prelude::*;
use std::sync::Arc;

use super::catalog::DataFusionCatalogManager;
use crate::config::{EngineConfig, EtlConfig};
use crate::error::Result;

/// Manages DataFusion SessionContext creation
///
/// # Example
/// ```rust,ignore
/// let manager = DataFusionSessionManager::new(config.engine.clone());
/// let session = manager.create_session()?;
/// let df = session.sql("SELECT * FROM information_schema.tables").await?;
/// ```
pub struct DataFusionSessionManager {
    config: EngineConfig,
}

impl DataFusionSessionManager {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Create a new DataFusion SessionContext
    ///
    /// The session exposes `information_schema` and carries the source schema in
    /// its default catalog. No tables are registered yet.
    pub fn create_session(&self) -> Result<SessionContext> {
        let config = SessionConfig::new()
            .with_batch_size(self.config.batch_size)
            .with_target_partitions(self.config.target_partitions)
            .with_information_schema(true);

        let ctx = SessionContext::new_with_config(config);
        DataFusionCatalogManager::new(ctx.clone()).register_source_schema()?;

        Ok(ctx)
    }
}

/// The engine session shared by every stage of a run
#[derive(Clone)]
pub struct EtlSession {
    ctx: SessionContext,
}

impl EtlSession {
    /// Open a session with the source table bound from the configured files
    pub async fn open(config: &EtlConfig) -> Result<Self> {
        let session = Self::empty(&config.engine)?;
        let catalog = session.catalog();
        catalog.register_source_files(&config.source).await?;
        tracing::debug!("Source schema tables: {:?}", catalog.list_tables()?);

        tracing::info!(
            "Opened engine session (batch_size: {}, target_partitions: {})",
            config.engine.batch_size,
            config.engine.target_partitions
        );
        Ok(session)
    }

    /// Open a session whose source table is `provider`
    pub fn with_source_table(engine: &EngineConfig, provider: Arc<dyn TableProvider>) -> Result<Self> {
        let session = Self::empty(engine)?;
        session.catalog().register_source_table(provider)?;
        Ok(session)
    }

    /// Open a session with the source schema but no source table
    pub fn empty(engine: &EngineConfig) -> Result<Self> {
        let ctx = DataFusionSessionManager::new(engine.clone()).create_session()?;
        Ok(Self { ctx })
    }

    pub fn catalog(&self) -> DataFusionCatalogManager {
        DataFusionCatalogManager::new(self.ctx.clone())
    }

    /// Get the session context
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }
}
