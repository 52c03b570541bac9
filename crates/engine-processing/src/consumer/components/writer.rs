use crate::{
    error::TransferError,
    retry::{classify_db_error, is_duplicate_key},
};
use connectors::sql::base::{error::DbError, target::TargetSession};
use engine_core::{
    metrics::Metrics,
    retry::{RetryDisposition, RetryPolicy},
};
use model::{
    execution::job::{TargetSchema, TransferMode},
    records::batch::Batch,
};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct WriteResult {
    /// Records of the batch that were applied (all of them on success).
    pub rows_written: usize,
    /// Rows the target reported as changed. In update mode this excludes
    /// unmatched ids.
    pub rows_affected: u64,
    pub duration: Duration,
}

/// Applies batches to the target through a session it owns exclusively.
pub struct BatchWriter {
    session: Box<dyn TargetSession>,
    schema: TargetSchema,
    mode: TransferMode,
    retry: RetryPolicy,
    metrics: Metrics,
}

impl BatchWriter {
    pub fn new(
        session: Box<dyn TargetSession>,
        schema: TargetSchema,
        mode: TransferMode,
        retry: RetryPolicy,
        metrics: Metrics,
    ) -> Self {
        Self {
            session,
            schema,
            mode,
            retry,
            metrics,
        }
    }

    /// Write a batch, retrying transient failures. Constraint violations are
    /// returned immediately.
    pub async fn write_batch(&mut self, batch: &Batch) -> Result<WriteResult, TransferError> {
        let start = Instant::now();
        let mut attempt = 0;

        let rows_affected = loop {
            let result = match self.mode {
                TransferMode::Create => {
                    self.session
                        .insert_records(&self.schema, &batch.records)
                        .await
                }
                TransferMode::Update => {
                    self.session
                        .update_records(&self.schema, &batch.records)
                        .await
                }
            };

            match result {
                Ok(affected) => break affected,
                Err(err) => {
                    let retryable = classify_db_error(&err) != RetryDisposition::Stop;
                    if !retryable || !self.retry.has_attempts_left(attempt) {
                        return Err(self.fail(batch, err, attempt + 1));
                    }

                    let delay = self.retry.delay;
                    warn!(
                        batch_id = %batch.id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying batch write"
                    );
                    self.metrics.increment_write_retries(1);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        let duration = start.elapsed();
        let rows_written = batch.len();
        let rows_per_sec = rows_written as f64 / duration.as_secs_f64().max(f64::EPSILON);

        self.metrics.increment_records(rows_written as u64);
        self.metrics.increment_batches(1);
        self.metrics.increment_bytes(batch.size_bytes() as u64);

        info!(
            batch_id = %batch.id,
            table = %self.schema.table,
            mode = %self.mode,
            rows = rows_written,
            affected = rows_affected,
            duration_ms = duration.as_millis(),
            rows_per_sec = %format!("{:.2}", rows_per_sec),
            "Batch written successfully"
        );

        Ok(WriteResult {
            rows_written,
            rows_affected,
            duration,
        })
    }

    fn fail(&self, batch: &Batch, err: DbError, attempts: usize) -> TransferError {
        self.metrics.increment_failures(1);
        if is_duplicate_key(&err) {
            error!(batch_id = %batch.id, table = %self.schema.table, error = %err, "Duplicate id in batch");
        } else {
            error!(batch_id = %batch.id, table = %self.schema.table, attempts, error = %err, "Batch write failed");
        }
        TransferError::Write {
            batch_id: batch.id.clone(),
            table: self.schema.table.clone(),
            source: err,
        }
    }
}
