// Partitioned delimited-text writer
//
// Hash-repartitions a DataFrame's rows through the engine and writes one headerless CSV part
// file per partition into a target directory, replacing whatever was there.

use datafusion::arrow::csv::WriterBuilder;
use datafusion::logical_expr::Partitioning;
use datafusion::prelude::*;
use futures::StreamExt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::QuoteMode;
use crate::error::{EtlError, Result};

const DELIMITER: u8 = b',';

/// Result of writing one DataFrame
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub row_count: usize,
    pub files: Vec<PathBuf>,
}

pub struct PartitionedCsvWriter {
    partitions: usize,
    quote_mode: QuoteMode,
}

impl PartitionedCsvWriter {
    pub fn new(partitions: usize, quote_mode: QuoteMode) -> Self {
        Self {
            partitions: partitions.max(1),
            quote_mode,
        }
    }

    /// Overwrite `target` with the contents of `df`
    ///
    /// Always produces exactly `partitions` files named `part-NNNNN.csv`; partitions
    /// that receive no rows yield empty files.
    pub async fn write(&self, df: DataFrame, target: &str) -> Result<WriteOutcome> {
        let dir = Path::new(target);
        prepare_target(dir).await?;

        // Rows spread by every column, so small results still fill several parts
        let keys: Vec<Expr> = df.schema().columns().into_iter().map(Expr::Column).collect();
        let df = df.repartition(Partitioning::Hash(keys, self.partitions))?;
        let streams = df.execute_stream_partitioned().await?;

        let mut files = Vec::with_capacity(self.partitions);
        let mut writers = Vec::with_capacity(self.partitions);
        for index in 0..self.partitions {
            let path = dir.join(part_file_name(index));
            let file = File::create(&path).map_err(|e| {
                EtlError::Write(format!("Failed to create {}: {}", path.display(), e))
            })?;
            writers.push(
                WriterBuilder::new()
                    .with_header(false)
                    .with_delimiter(DELIMITER)
                    .with_quote(self.quote_mode.quote_byte())
                    .build(BufWriter::new(file)),
            );
            files.push(path);
        }

        let mut row_count = 0;
        for (index, mut stream) in streams.into_iter().enumerate() {
            // The engine may plan fewer or more streams than requested parts
            let writer = &mut writers[index % self.partitions];
            while let Some(batch) = stream.next().await {
                let batch = batch?;
                row_count += batch.num_rows();
                writer.write(&batch)?;
            }
        }

        for (writer, path) in writers.into_iter().zip(&files) {
            let mut inner = writer.into_inner();
            inner.flush().map_err(|e| {
                EtlError::Write(format!("Failed to flush {}: {}", path.display(), e))
            })?;
            tracing::debug!("Wrote {}", path.display());
        }

        Ok(WriteOutcome { row_count, files })
    }
}

fn part_file_name(index: usize) -> String {
    format!("part-{:05}.csv", index)
}

/// Remove anything at `dir` and recreate it empty
async fn prepare_target(dir: &Path) -> Result<()> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => {
            tracing::info!("Overwriting existing output at {}", dir.display());
            tokio::fs::remove_dir_all(dir).await?;
        }
        Ok(_) => {
            tracing::info!("Overwriting existing file at {}", dir.display());
            tokio::fs::remove_file(dir).await?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        EtlError::Write(format!("Failed to create {}: {}", dir.display(), e))
    })?;
    Ok(())
}
