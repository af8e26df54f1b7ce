use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::dataset::Dataset;

/// Outcome of writing one dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteReport {
    pub dataset: Dataset,
    pub target: String,
    pub row_count: usize,
    pub files: Vec<PathBuf>,
    pub execution_time_ms: u64,
}

/// Summary of one pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub reports: Vec<WriteReport>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            reports: Vec::new(),
        }
    }

    pub fn record(&mut self, report: WriteReport) {
        self.reports.push(report);
    }

    pub fn mark_finished(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn report(&self, dataset: Dataset) -> Option<&WriteReport> {
        self.reports.iter().find(|r| r.dataset == dataset)
    }

    pub fn total_rows(&self) -> usize {
        self.reports.iter().map(|r| r.row_count).sum()
    }
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}
