//! Range-partitioned backfill of target columns from a source table.
//!
//! The source table is split once into consecutive key ranges of
//! `batch_size` rows; each range is applied by one `UPDATE ... JOIN`
//! statement. The first failing range aborts the job.

use crate::error::BatchUpdateError;
use connectors::sql::base::target::{TargetSession, TargetStore};
use engine_core::progress::{NoopObserver, ProgressCounter, ProgressObserver};
use model::{
    execution::job::BatchUpdateJob,
    pagination::range::{PartitionRange, total_rows},
};
use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct BatchUpdateReport {
    pub source_table: String,
    pub target_table: String,
    pub pages: usize,
    pub pages_done: usize,
    pub source_rows: u64,
    pub rows_updated: u64,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl BatchUpdateReport {
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.rows_updated as f64 / secs
    }
}

/// Checks that both tables, both id columns and every mapped column exist.
pub async fn validate_tables(
    target: &dyn TargetStore,
    job: &BatchUpdateJob,
) -> Result<(), BatchUpdateError> {
    job.validate()?;

    let mut source_cols = vec![job.source_id_column.as_str()];
    source_cols.extend(job.column_mapping.iter().map(|m| m.source.as_str()));
    let mut target_cols = vec![job.target_id_column.as_str()];
    target_cols.extend(job.column_mapping.iter().map(|m| m.target.as_str()));

    for (table, required) in [
        (&job.source_table, source_cols),
        (&job.target_table, target_cols),
    ] {
        let exists = target
            .table_exists(table)
            .await
            .map_err(|source| BatchUpdateError::Db {
                table: table.clone(),
                source,
            })?;
        if !exists {
            return Err(BatchUpdateError::TableNotFound {
                table: table.clone(),
            });
        }

        let existing: HashSet<String> = target
            .column_names(table)
            .await
            .map_err(|source| BatchUpdateError::Db {
                table: table.clone(),
                source,
            })?
            .into_iter()
            .map(|c| c.to_lowercase())
            .collect();

        if let Some(missing) = required
            .into_iter()
            .find(|c| !existing.contains(&c.to_lowercase()))
        {
            return Err(BatchUpdateError::ColumnNotFound {
                table: table.clone(),
                column: missing.to_string(),
            });
        }
    }

    Ok(())
}

/// Computes the disjoint key ranges covering the source table.
pub async fn partition(
    target: &dyn TargetStore,
    job: &BatchUpdateJob,
) -> Result<Vec<PartitionRange>, BatchUpdateError> {
    let start = Instant::now();
    let ranges = target
        .table_pagination(&job.source_table, &job.source_id_column, job.batch_size)
        .await
        .map_err(|source| BatchUpdateError::Db {
            table: job.source_table.clone(),
            source,
        })?;

    info!(
        table = %job.source_table,
        pages = ranges.len(),
        rows = total_rows(&ranges),
        duration_ms = start.elapsed().as_millis(),
        "Partitioned source table"
    );
    Ok(ranges)
}

#[derive(Debug)]
struct PageAck {
    page_num: u64,
    affected: u64,
}

pub struct BatchUpdateRunner {
    target: Arc<dyn TargetStore>,
    job: BatchUpdateJob,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
}

impl BatchUpdateRunner {
    pub fn new(target: Arc<dyn TargetStore>, job: BatchUpdateJob) -> Self {
        Self {
            target,
            job,
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn job(&self) -> &BatchUpdateJob {
        &self.job
    }

    /// Validates, optionally compacts, partitions and applies every range.
    pub async fn run(&self) -> Result<BatchUpdateReport, BatchUpdateError> {
        validate_tables(self.target.as_ref(), &self.job).await?;

        if self.job.compact {
            self.target
                .compact_table(&self.job.target_table)
                .await
                .map_err(|source| BatchUpdateError::Db {
                    table: self.job.target_table.clone(),
                    source,
                })?;
        }

        let ranges = partition(self.target.as_ref(), &self.job).await?;
        self.apply(ranges).await
    }

    /// Applies `ranges` with up to `workers` sessions.
    pub async fn apply(
        &self,
        ranges: Vec<PartitionRange>,
    ) -> Result<BatchUpdateReport, BatchUpdateError> {
        let start = Instant::now();
        let pages = ranges.len();
        let source_rows = total_rows(&ranges);
        let mut counter = ProgressCounter::new(source_rows, self.observer.clone());

        let workers = self.job.workers.clamp(1, pages.max(1));
        let queue = Arc::new(Mutex::new(VecDeque::from(ranges)));
        let run_cancel = self.cancel.child_token();
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel::<PageAck>();

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let session = self
                .target
                .session()
                .await
                .map_err(|source| BatchUpdateError::Db {
                    table: self.job.target_table.clone(),
                    source,
                })?;
            handles.push(tokio::spawn(page_worker(
                worker,
                session,
                self.job.clone(),
                queue.clone(),
                ack_tx.clone(),
                run_cancel.clone(),
            )));
        }
        drop(ack_tx);

        let mut pages_done = 0usize;
        while let Some(ack) = ack_rx.recv().await {
            pages_done += 1;
            counter.advance(ack.affected);
            counter.message(&format!("page {} / {pages}", ack.page_num));
        }
        counter.finish();

        let mut first_error = None;
        for handle in handles {
            let outcome = handle
                .await
                .map_err(|e| BatchUpdateError::Worker(e.to_string()))
                .and_then(|r| r);
            if let Err(err) = outcome {
                first_error.get_or_insert(err);
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        let report = BatchUpdateReport {
            source_table: self.job.source_table.clone(),
            target_table: self.job.target_table.clone(),
            pages,
            pages_done,
            source_rows,
            rows_updated: counter.done(),
            elapsed: start.elapsed(),
            cancelled: self.cancel.is_cancelled(),
        };
        info!(
            target = %report.target_table,
            pages = report.pages,
            pages_done = report.pages_done,
            rows = report.rows_updated,
            elapsed_ms = report.elapsed.as_millis(),
            rows_per_sec = %format!("{:.2}", report.throughput()),
            "Batch update finished"
        );
        Ok(report)
    }
}

async fn page_worker(
    worker: usize,
    mut session: Box<dyn TargetSession>,
    job: BatchUpdateJob,
    queue: Arc<Mutex<VecDeque<PartitionRange>>>,
    ack_tx: mpsc::UnboundedSender<PageAck>,
    cancel: CancellationToken,
) -> Result<(), BatchUpdateError> {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let Some(range) = queue.lock().await.pop_front() else {
            break;
        };

        let start = Instant::now();
        match session.update_range(&job, &range).await {
            Ok(affected) => {
                info!(
                    worker,
                    page_num = range.page_num,
                    start_key = %range.start_key,
                    end_key = %range.end_key,
                    rows = affected,
                    duration_ms = start.elapsed().as_millis(),
                    "Page updated"
                );
                let _ = ack_tx.send(PageAck {
                    page_num: range.page_num,
                    affected,
                });
            }
            Err(source) => {
                error!(worker, page_num = range.page_num, error = %source, "Page update failed");
                cancel.cancel();
                return Err(BatchUpdateError::Page {
                    page_num: range.page_num,
                    start_key: range.start_key,
                    end_key: range.end_key,
                    source,
                });
            }
        }
    }
    Ok(())
}
