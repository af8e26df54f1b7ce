pub mod csv_writer;
pub mod etl_service;
pub mod extraction_service;
pub mod datafusion; // DataFusion engine layer

pub use csv_writer::*;
pub use etl_service::*;
pub use extraction_service::*;
