use crate::{
    bootstrap::{SourceProfile, prepare_target, profile_source},
    consumer::{
        components::writer::BatchWriter,
        live::{BatchWorker, SharedReceiver, WorkerEvent},
    },
    error::TransferError,
    producer::{
        components::reader::CursorReader,
        config::ReaderConfig,
        live::{CursorScan, ScanEnd, ScanStep, run_producer},
    },
};
use connectors::{source::VectorSource, sql::base::target::TargetStore};
use engine_core::{
    metrics::{Metrics, MetricsSnapshot},
    progress::{NoopObserver, ProgressCounter, ProgressObserver},
    retry::RetryPolicy,
};
use model::execution::job::{TransferJob, TransferMode};
use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Init,
    Bootstrap,
    Streaming,
    Done,
    Failed,
}

impl TransferPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferPhase::Init => "Init",
            TransferPhase::Bootstrap => "Bootstrap",
            TransferPhase::Streaming => "Streaming",
            TransferPhase::Done => "Done",
            TransferPhase::Failed => "Failed",
        }
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one transfer run.
#[derive(Debug)]
pub struct TransferReport {
    pub phase: TransferPhase,
    /// Last phase entered before the run ended; differs from `phase` only
    /// for failed runs.
    pub reached: TransferPhase,
    pub collection: String,
    pub table: String,
    pub mode: TransferMode,
    pub workers: usize,
    pub source_total: u64,
    pub records_written: u64,
    pub batches: u64,
    pub elapsed: Duration,
    /// `None` when streaming never started.
    pub fetch_outcome: Option<ScanEnd>,
    pub final_batch_size: usize,
    pub metrics: MetricsSnapshot,
    /// First fatal error of a failed run.
    pub error: Option<TransferError>,
}

impl TransferReport {
    pub fn is_success(&self) -> bool {
        self.phase == TransferPhase::Done
            && self.fetch_outcome.as_ref().is_some_and(ScanEnd::is_complete)
    }

    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.records_written as f64 / secs
    }
}

/// Coordinates reading, bootstrapping and writing for one [`TransferJob`].
pub struct TransferScheduler {
    source: Arc<dyn VectorSource>,
    target: Arc<dyn TargetStore>,
    job: TransferJob,
    reader_config: ReaderConfig,
    write_retry: RetryPolicy,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
    metrics: Metrics,
    run_id: String,
    phase: TransferPhase,
}

struct StreamSummary {
    written: u64,
    end: ScanEnd,
    final_batch_size: usize,
}

impl TransferScheduler {
    pub fn new(
        source: Arc<dyn VectorSource>,
        target: Arc<dyn TargetStore>,
        job: TransferJob,
    ) -> Self {
        let reader_config = ReaderConfig::default().with_batch_size(job.batch_size);
        let run_id = format!(
            "{}-{}",
            job.collection,
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        Self {
            source,
            target,
            job,
            reader_config,
            write_retry: RetryPolicy::default(),
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
            metrics: Metrics::new(),
            run_id,
            phase: TransferPhase::Init,
        }
    }

    /// Reader settings; the batch size always comes from the job.
    pub fn with_reader_config(mut self, config: ReaderConfig) -> Self {
        self.reader_config = config.with_batch_size(self.job.batch_size);
        self
    }

    pub fn with_write_retry(mut self, retry: RetryPolicy) -> Self {
        self.write_retry = retry;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn job(&self) -> &TransferJob {
        &self.job
    }

    pub fn phase(&self) -> TransferPhase {
        self.phase
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn reader(&self, config: ReaderConfig) -> CursorReader {
        CursorReader::new(
            self.source.clone(),
            self.job.collection.clone(),
            config,
            self.metrics.clone(),
        )
    }

    /// INIT: validates the job and the source, and samples ids.
    pub async fn profile(&self) -> Result<SourceProfile, TransferError> {
        self.job.validate()?;
        let sampler_config = self
            .reader_config
            .clone()
            .with_vector(false)
            .with_payload(false);
        let mut sampler = self.reader(sampler_config);
        profile_source(self.source.as_ref(), &mut sampler, &self.job).await
    }

    /// Runs every phase. Failures are reported, never returned.
    pub async fn run(self) -> TransferReport {
        let start = Instant::now();
        match self.profile().await {
            Ok(profile) => self.run_with_profile(profile).await,
            Err(err) => {
                error!(collection = %self.job.collection, error = %err, "Transfer precondition failed");
                self.report(start, 0, 0, None, Some(err))
            }
        }
    }

    /// Runs BOOTSTRAP and STREAMING for a source profiled beforehand.
    pub async fn run_with_profile(mut self, profile: SourceProfile) -> TransferReport {
        let start = Instant::now();
        let total = profile.total;

        self.enter(TransferPhase::Bootstrap);
        if let Err(err) = prepare_target(self.target.as_ref(), &self.job, &profile).await {
            error!(table = %self.job.schema.table, error = %err, "Bootstrap failed");
            return self.report(start, total, 0, None, Some(err));
        }

        self.enter(TransferPhase::Streaming);
        let mut counter = ProgressCounter::new(total, self.observer.clone());
        let result = if self.job.workers <= 1 {
            self.stream_sequential(total, &mut counter).await
        } else {
            self.stream_concurrent(total, &mut counter).await
        };
        counter.finish();

        match result {
            Ok(summary) => {
                if let ScanEnd::Failed(reason) = &summary.end {
                    warn!(reason = %reason, written = summary.written, "Scan stopped early");
                }
                self.phase = TransferPhase::Done;
                let mut report = self.report(start, total, summary.written, Some(summary.end), None);
                report.final_batch_size = summary.final_batch_size;
                info!(
                    collection = %report.collection,
                    table = %report.table,
                    records = report.records_written,
                    elapsed_ms = report.elapsed.as_millis(),
                    rows_per_sec = %format!("{:.2}", report.throughput()),
                    "Transfer finished"
                );
                report
            }
            Err((written, err)) => {
                error!(table = %self.job.schema.table, error = %err, "Transfer failed");
                self.report(start, total, written, None, Some(err))
            }
        }
    }

    fn enter(&mut self, phase: TransferPhase) {
        info!(from = %self.phase, to = %phase, "Transfer phase");
        self.phase = phase;
    }

    fn report(
        &self,
        start: Instant,
        total: u64,
        written: u64,
        fetch_outcome: Option<ScanEnd>,
        error: Option<TransferError>,
    ) -> TransferReport {
        let failed = error.is_some();
        let metrics = self.metrics.snapshot();
        TransferReport {
            phase: if failed {
                TransferPhase::Failed
            } else {
                TransferPhase::Done
            },
            reached: self.phase,
            collection: self.job.collection.clone(),
            table: self.job.schema.table.clone(),
            mode: self.job.mode,
            workers: self.job.workers,
            source_total: total,
            records_written: written,
            batches: metrics.batches_processed,
            elapsed: start.elapsed(),
            fetch_outcome,
            final_batch_size: self.job.batch_size,
            metrics,
            error,
        }
    }

    async fn open_writer(&self) -> Result<BatchWriter, TransferError> {
        let session = self.target.session().await.map_err(TransferError::Session)?;
        Ok(BatchWriter::new(
            session,
            self.job.schema.clone(),
            self.job.mode,
            self.write_retry.clone(),
            self.metrics.clone(),
        ))
    }

    /// One session, pull one batch then write it.
    async fn stream_sequential(
        &self,
        total: u64,
        counter: &mut ProgressCounter,
    ) -> Result<StreamSummary, (u64, TransferError)> {
        let mut writer = self.open_writer().await.map_err(|e| (0, e))?;
        let mut scan = CursorScan::new(self.reader(self.reader_config.clone()), &self.run_id, total);

        let end = loop {
            let batch = match scan.next_batch(&self.cancel).await {
                Ok(ScanStep::Batch(batch)) => batch,
                Ok(ScanStep::End(end)) => break end,
                Err(err) => return Err((counter.done(), err)),
            };

            match writer.write_batch(&batch).await {
                Ok(result) => {
                    counter.advance(result.rows_written as u64);
                }
                Err(err) => return Err((counter.done(), err)),
            }
        };

        Ok(StreamSummary {
            written: counter.done(),
            end,
            final_batch_size: scan.reader().batch_size(),
        })
    }

    /// One producer feeding a bounded queue, `workers` consumers each with
    /// its own session. Completes when every queued batch is acknowledged.
    async fn stream_concurrent(
        &self,
        total: u64,
        counter: &mut ProgressCounter,
    ) -> Result<StreamSummary, (u64, TransferError)> {
        let workers = self.job.workers;
        let capacity = workers * 2;
        let run_cancel = self.cancel.child_token();

        // Sessions are checked out up front so a connection failure aborts
        // before any batch is read.
        let mut writers = Vec::with_capacity(workers);
        for _ in 0..workers {
            writers.push(self.open_writer().await.map_err(|e| (0, e))?);
        }

        let (batch_tx, batch_rx) = mpsc::channel(capacity);
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel::<WorkerEvent>();
        let shared_rx: SharedReceiver = Arc::new(Mutex::new(batch_rx));

        let scan = CursorScan::new(self.reader(self.reader_config.clone()), &self.run_id, total);
        let producer = tokio::spawn(run_producer(scan, batch_tx, run_cancel.clone()));

        let consumers: Vec<JoinHandle<usize>> = writers
            .into_iter()
            .enumerate()
            .map(|(id, writer)| {
                let worker = BatchWorker::new(
                    id,
                    writer,
                    shared_rx.clone(),
                    ack_tx.clone(),
                    run_cancel.clone(),
                );
                tokio::spawn(worker.run())
            })
            .collect();
        drop(ack_tx);
        drop(shared_rx);
        info!(workers, queue_capacity = capacity, "Started workers");

        // The ack channel closes once every worker has exited. Events arrive
        // in the order they happened, so the first failure seen is the first
        // one that occurred.
        let mut first_error: Option<TransferError> = None;
        while let Some(event) = ack_rx.recv().await {
            match event {
                WorkerEvent::Written(ack) => {
                    counter.advance(ack.rows);
                }
                WorkerEvent::Failed { worker, error } => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    } else {
                        debug!(worker, error = %error, "Ignoring later worker failure");
                    }
                }
            }
        }

        for handle in consumers {
            if let Err(err) = handle.await {
                first_error.get_or_insert(TransferError::Worker(err.to_string()));
            }
        }

        run_cancel.cancel();
        let produced = producer
            .await
            .map_err(|e| TransferError::Worker(e.to_string()))
            .and_then(|r| r);

        if let Some(err) = first_error {
            return Err((counter.done(), err));
        }

        match produced {
            Ok(summary) => {
                let end = if self.cancel.is_cancelled() {
                    ScanEnd::Cancelled
                } else {
                    summary.end
                };
                Ok(StreamSummary {
                    written: counter.done(),
                    end,
                    final_batch_size: self.job.batch_size.min(summary.final_batch_size),
                })
            }
            Err(err) => Err((counter.done(), err)),
        }
    }
}
