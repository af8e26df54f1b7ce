pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod validation;

pub use error::{EtlError, Result};
pub use models::*;
pub use services::*;
pub use validation::*;
