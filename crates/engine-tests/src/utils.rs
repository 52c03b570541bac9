use crate::memory::{MemorySource, MemoryTarget};
use engine_core::retry::RetryPolicy;
use engine_processing::{producer::config::ReaderConfig, scheduler::TransferScheduler};
use model::{
    core::identifiers::PointId,
    execution::job::{TargetSchema, TransferJob, TransferMode},
    records::record::Record,
};
use serde_json::json;
use std::{sync::Arc, time::Duration};

pub const COLLECTION: &str = "midlib";
pub const TABLE: &str = "midlib_vectors";
pub const DIMENSION: usize = 4;

/// `count` records with numeric ids `1..=count`.
pub fn numeric_records(count: u64) -> Vec<Record> {
    (1..=count)
        .map(|i| {
            let x = i as f32;
            Record::new(i, vec![x, x / 2.0, -x, 1.0])
                .with_payload(json!({ "title": format!("doc-{i}"), "rank": i }))
        })
        .collect()
}

/// `count` records with fixed-width string ids.
pub fn uuid_records(count: u64) -> Vec<Record> {
    (0..count)
        .map(|i| {
            let id = format!("00000000-0000-0000-0000-{i:012}");
            Record::new(PointId::Uuid(id), vec![i as f32; DIMENSION])
        })
        .collect()
}

pub fn source_with(records: Vec<Record>) -> MemorySource {
    MemorySource::new().with_collection(COLLECTION, DIMENSION, "Cosine", records)
}

pub fn no_wait_retry() -> RetryPolicy {
    RetryPolicy::fixed(3, Duration::ZERO)
}

pub fn fast_reader() -> ReaderConfig {
    ReaderConfig::default().with_retry(no_wait_retry())
}

pub fn create_job(batch_size: usize, workers: usize) -> TransferJob {
    TransferJob::new(COLLECTION, TransferMode::Create, TargetSchema::new(TABLE))
        .with_batch_size(batch_size)
        .with_workers(workers)
}

pub fn update_job(batch_size: usize, workers: usize) -> TransferJob {
    TransferJob::new(COLLECTION, TransferMode::Update, TargetSchema::new(TABLE))
        .with_batch_size(batch_size)
        .with_workers(workers)
}

/// A scheduler over in-memory stores that never sleeps between retries.
pub fn scheduler(
    source: &Arc<MemorySource>,
    target: &MemoryTarget,
    job: TransferJob,
) -> TransferScheduler {
    TransferScheduler::new(source.clone(), Arc::new(target.clone()), job)
        .with_reader_config(fast_reader())
        .with_write_retry(no_wait_retry())
}
