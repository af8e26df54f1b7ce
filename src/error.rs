use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use std::time::Duration;
use thiserror::Error;

/// ETL error types
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("XML parse error in {path}: {source}")]
    Xml {
        path: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Invalid SQL: {0}")]
    InvalidSql(String),

    #[error("Query error: {0}")]
    Query(#[from] DataFusionError),

    #[error("Query execution timeout after {0:?}")]
    Timeout(Duration),

    #[error("Write error: {0}")]
    Write(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;

impl From<config::ConfigError> for EtlError {
    fn from(err: config::ConfigError) -> Self {
        EtlError::Config(err.to_string())
    }
}

impl From<ArrowError> for EtlError {
    fn from(err: ArrowError) -> Self {
        EtlError::Write(err.to_string())
    }
}

impl From<std::io::Error> for EtlError {
    fn from(err: std::io::Error) -> Self {
        EtlError::Write(err.to_string())
    }
}
