use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema holding the source table in the default catalog
pub const SOURCE_SCHEMA: &str = "goransm";
/// Entity usage table, one row per (page, wiki, aspect) usage
pub const SOURCE_TABLE: &str = "wdcm_clients_wb_entity_usage";

pub const PAGE_ID_COLUMN: &str = "eu_page_id";
pub const WIKI_COLUMN: &str = "wiki_db";
pub const ASPECT_COLUMN: &str = "eu_aspect";

/// Aspect code marking a sitelink use
pub const SITELINK_MARKER: &str = "S";

/// Filter on the aspect column of the usage table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectFilter {
    Equals(&'static str),
    NotEquals(&'static str),
}

impl AspectFilter {
    /// Render the filter as a SQL predicate over the aspect column
    pub fn to_sql(&self) -> String {
        match self {
            AspectFilter::Equals(marker) => format!("{} = '{}'", ASPECT_COLUMN, marker),
            AspectFilter::NotEquals(marker) => format!("{} != '{}'", ASPECT_COLUMN, marker),
        }
    }

    /// Whether a row with the given aspect passes this filter
    #[cfg(test)]
    pub fn matches(&self, aspect: &str) -> bool {
        match self {
            AspectFilter::Equals(marker) => aspect == *marker,
            AspectFilter::NotEquals(marker) => aspect != *marker,
        }
    }
}

/// The two projections extracted from the usage table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    /// (page, wiki) pairs using an entity other than via a sitelink
    Usage,
    /// (page, wiki) pairs using an entity via a sitelink
    Coverage,
}

impl Dataset {
    /// Datasets in the order the pipeline writes them
    pub const ALL: [Dataset; 2] = [Dataset::Usage, Dataset::Coverage];

    /// Directory name appended to the configured output base path
    pub fn file_name(&self) -> &'static str {
        match self {
            Dataset::Usage => "wdUsage",
            Dataset::Coverage => "wdSitelinks",
        }
    }

    pub fn aspect_filter(&self) -> AspectFilter {
        match self {
            Dataset::Usage => AspectFilter::NotEquals(SITELINK_MARKER),
            Dataset::Coverage => AspectFilter::Equals(SITELINK_MARKER),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Usage => "usage",
            Dataset::Coverage => "coverage",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
