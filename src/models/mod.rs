pub mod dataset;
pub mod report;

pub use dataset::*;
pub use report::*;
