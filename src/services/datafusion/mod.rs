// DataFusion engine layer
//
// Session bootstrap, catalog registration of the usage table and query
// execution for the extraction pipeline.

pub mod session; // DataFusionSessionManager, EtlSession
pub mod catalog; // DataFusionCatalogManager
pub mod executor; // DataFusionQueryExecutor

pub use session::{DataFusionSessionManager, EtlSession};
pub use catalog::DataFusionCatalogManager;
pub use executor::DataFusionQueryExecutor;
