use crate::{
    error::DumpError,
    producer::{
        components::reader::CursorReader,
        config::ReaderConfig,
        live::{CursorScan, ScanEnd, ScanStep},
    },
};
use connectors::{
    file::csv::writer::{CsvExportWriter, ExportColumns},
    source::VectorSource,
};
use engine_core::{
    metrics::Metrics,
    progress::{NoopObserver, ProgressCounter, ProgressObserver},
};
use model::{core::identifiers::PointId, pagination::cursor::Cursor};
use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const DEFAULT_BUFFER_SIZE: usize = 10_000;

/// Settings of a collection export.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub collection: String,
    pub output: PathBuf,
    /// Stop after this many records.
    pub limit: Option<u64>,
    /// Point id to start from instead of the beginning of the collection.
    pub offset: Option<PointId>,
    pub columns: ExportColumns,
    pub reader: ReaderConfig,
    /// Capacity of the buffered file writer, in bytes.
    pub buffer_size: usize,
}

impl DumpOptions {
    pub fn new(collection: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            collection: collection.into(),
            output: output.into(),
            limit: None,
            offset: None,
            columns: ExportColumns::default(),
            reader: ReaderConfig::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: Option<PointId>) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_columns(mut self, columns: ExportColumns) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.reader = self.reader.with_batch_size(size);
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }
}

#[derive(Debug, Clone)]
pub struct DumpReport {
    pub output: PathBuf,
    pub records: u64,
    pub bytes: u64,
    pub elapsed: Duration,
    pub outcome: ScanEnd,
}

/// Streams a collection into a CSV file.
pub async fn dump_collection(
    source: Arc<dyn VectorSource>,
    options: DumpOptions,
    observer: Option<Arc<dyn ProgressObserver>>,
    cancel: CancellationToken,
) -> Result<DumpReport, DumpError> {
    let start = Instant::now();
    let reader_config = options
        .reader
        .clone()
        .with_vector(options.columns.include_vectors)
        .with_payload(options.columns.include_payload);
    let reader = CursorReader::new(
        source,
        options.collection.clone(),
        reader_config,
        Metrics::new(),
    );

    let count = reader.check_preconditions().await?;
    let total = options.limit.map_or(count, |limit| limit.min(count));
    let mut counter = ProgressCounter::new(
        total,
        observer.unwrap_or_else(|| Arc::new(NoopObserver)),
    );

    let mut writer =
        CsvExportWriter::create(&options.output, options.columns.clone(), options.buffer_size)?;
    let run_id = format!("dump-{}", options.collection);
    let mut scan = CursorScan::new(reader, run_id, total)
        .starting_at(options.offset.clone().map(Cursor::new));

    let outcome = loop {
        match scan.next_batch(&cancel).await? {
            ScanStep::Batch(batch) => {
                let rows = writer.write_records(&batch.records)?;
                counter.advance(rows as u64);
            }
            ScanStep::End(end) => break end,
        }
    };
    counter.finish();

    let records = writer.rows_written() as u64;
    let bytes = writer.finish()?;
    let report = DumpReport {
        output: options.output,
        records,
        bytes,
        elapsed: start.elapsed(),
        outcome,
    };

    info!(
        collection = %options.collection,
        path = %report.output.display(),
        records = report.records,
        bytes = report.bytes,
        elapsed_ms = report.elapsed.as_millis(),
        outcome = %report.outcome,
        "Export finished"
    );
    Ok(report)
}
