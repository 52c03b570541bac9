use crate::error::CliError;
use connectors::{source::VectorSource, sql::base::target::TargetStore};
use engine_processing::{bootstrap::SourceProfile, scheduler::TransferScheduler};
use model::execution::job::{TargetSchema, TransferJob, TransferMode};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Pause between two runs so the cluster settles.
const PAUSE_BETWEEN_RUNS: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub workers: usize,
    pub batch_size: usize,
    pub table: String,
    /// `None` when the run failed.
    pub elapsed: Option<Duration>,
}

pub struct Benchmark {
    pub source: Arc<dyn VectorSource>,
    pub target: Arc<dyn TargetStore>,
    pub collection: String,
    pub workers: Vec<usize>,
    pub batch_sizes: Vec<usize>,
    pub table_prefix: String,
    pub cancel: CancellationToken,
}

pub fn table_name(prefix: &str, workers: usize, batch_size: usize) -> String {
    format!("{prefix}_{workers}w_{batch_size}b")
}

impl Benchmark {
    fn job(&self, workers: usize, batch_size: usize, profile: &SourceProfile) -> TransferJob {
        let schema = TargetSchema::new(table_name(&self.table_prefix, workers, batch_size));
        TransferJob::new(&self.collection, TransferMode::Create, schema)
            .with_workers(workers)
            .with_batch_size(batch_size)
            .with_drop_table(true)
            .with_id_type(profile.id_type)
    }

    /// Validates the collection once; every run reuses the result.
    pub async fn profile(&self) -> Result<SourceProfile, CliError> {
        let workers = self.workers.first().copied().unwrap_or(1);
        let batch_size = self.batch_sizes.first().copied().unwrap_or(100);
        let schema = TargetSchema::new(table_name(&self.table_prefix, workers, batch_size));
        let job = TransferJob::new(&self.collection, TransferMode::Create, schema)
            .with_workers(workers)
            .with_batch_size(batch_size);
        let scheduler = TransferScheduler::new(self.source.clone(), self.target.clone(), job);
        Ok(scheduler.profile().await?)
    }

    /// Runs every `(workers, batch size)` combination in order.
    pub async fn run(&self, profile: &SourceProfile) -> Vec<BenchmarkResult> {
        let grid: Vec<(usize, usize)> = self
            .workers
            .iter()
            .flat_map(|w| self.batch_sizes.iter().map(move |b| (*w, *b)))
            .collect();
        let mut results = Vec::with_capacity(grid.len());

        for (i, (workers, batch_size)) in grid.iter().copied().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Benchmark cancelled; skipping remaining runs");
                break;
            }

            let job = self.job(workers, batch_size, profile);
            let table = job.schema.table.clone();
            println!("Testing with workers={workers}, batch_size={batch_size}...");

            let start = Instant::now();
            let report = TransferScheduler::new(self.source.clone(), self.target.clone(), job)
                .with_cancel_token(self.cancel.clone())
                .run_with_profile(profile.clone())
                .await;
            let elapsed = start.elapsed();

            let elapsed = if report.is_success() {
                println!("Completed in {:.2}s", elapsed.as_secs_f64());
                Some(elapsed)
            } else {
                let reason = report
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .or_else(|| report.fetch_outcome.as_ref().map(ToString::to_string))
                    .unwrap_or_default();
                println!("Error: {reason}");
                None
            };
            results.push(BenchmarkResult {
                workers,
                batch_size,
                table,
                elapsed,
            });

            if i + 1 < grid.len() {
                tokio::select! {
                    _ = tokio::time::sleep(PAUSE_BETWEEN_RUNS) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
        }

        results
    }

    /// Drops every benchmark table; returns how many were dropped.
    pub async fn cleanup(&self, results: &[BenchmarkResult]) -> usize {
        let mut dropped = 0;
        for result in results {
            match self.target.drop_table(&result.table).await {
                Ok(()) => dropped += 1,
                Err(err) => error!(table = %result.table, error = %err, "Failed to drop table"),
            }
        }
        info!(dropped, "Benchmark tables cleaned up");
        dropped
    }
}

/// Results table with throughput and speed relative to the fastest run.
pub fn format_results(results: &[BenchmarkResult], records: u64) -> Vec<String> {
    let best = results.iter().filter_map(|r| r.elapsed).min();

    let mut lines = vec![
        format!(
            "{:<8} {:<12} {:<10} {:<12} {:<12}",
            "Workers", "Batch Size", "Time (s)", "Records/s", "Performance"
        ),
        "-".repeat(80),
    ];
    for r in results {
        let (time, rate, perf) = match (r.elapsed, best) {
            (Some(elapsed), Some(best)) => {
                let secs = elapsed.as_secs_f64().max(f64::EPSILON);
                let speedup = best.as_secs_f64() / secs;
                let perf = if speedup >= 1.0 {
                    format!("{speedup:.2}x")
                } else {
                    format!("{:.2}x slower", 1.0 / speedup.max(f64::EPSILON))
                };
                (format!("{secs:.2}"), format!("{:.0}", records as f64 / secs), perf)
            }
            _ => ("FAILED".into(), "FAILED".into(), "FAILED".into()),
        };
        lines.push(format!(
            "{:<8} {:<12} {:<10} {:<12} {:<12}",
            r.workers, r.batch_size, time, rate, perf
        ));
    }
    lines
}

/// The fastest successful run, if any.
pub fn best_result(results: &[BenchmarkResult]) -> Option<&BenchmarkResult> {
    results
        .iter()
        .filter(|r| r.elapsed.is_some())
        .min_by_key(|r| r.elapsed)
}
