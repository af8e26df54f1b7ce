use std::time::Instant;

use crate::config::EtlConfig;
use crate::error::Result;
use crate::models::{Dataset, RunSummary, WriteReport};
use crate::services::csv_writer::PartitionedCsvWriter;
use crate::services::datafusion::EtlSession;
use crate::services::extraction_service::ExtractionService;

/// Extract-then-write for each dataset, in order
pub struct EtlService<'a> {
    config: &'a EtlConfig,
    extraction: ExtractionService,
    writer: PartitionedCsvWriter,
}

impl<'a> EtlService<'a> {
    pub fn new(config: &'a EtlConfig, session: &EtlSession) -> Self {
        Self {
            config,
            extraction: ExtractionService::new(session, config.query_timeout()),
            writer: PartitionedCsvWriter::new(config.output.partitions, config.output.quote_mode),
        }
    }

    /// Produce every dataset; the first failure aborts the run
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::new();
        tracing::info!("Starting run {}", summary.id);

        for dataset in Dataset::ALL {
            let report = self.process(dataset).await?;
            summary.record(report);
        }

        summary.mark_finished();
        Ok(summary)
    }

    /// Extract, cache and write a single dataset
    pub async fn process(&self, dataset: Dataset) -> Result<WriteReport> {
        let start_time = Instant::now();
        let target = self.config.output_path(dataset);

        let df = self.extraction.extract(dataset).await?;
        let outcome = self.writer.write(df, &target).await?;

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(
            "Wrote {} dataset: {} rows in {} parts to {} ({} ms)",
            dataset,
            outcome.row_count,
            outcome.files.len(),
            target,
            execution_time_ms
        );

        Ok(WriteReport {
            dataset,
            target,
            row_count: outcome.row_count,
            files: outcome.files,
            execution_time_ms,
        })
    }
}
