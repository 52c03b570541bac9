use crate::{
    error::TransferError,
    producer::components::reader::{CursorReader, FetchOutcome},
};
use model::{pagination::cursor::Cursor, records::batch::Batch};
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Why a scan stopped producing batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEnd {
    /// The source returned no continuation cursor.
    Exhausted,
    /// The number of records fixed at start has been read.
    LimitReached,
    /// A fetch exhausted its retries; the reason is kept for the report.
    Failed(String),
    Cancelled,
}

impl ScanEnd {
    /// True when every record the scan was meant to read has been read.
    pub fn is_complete(&self) -> bool {
        matches!(self, ScanEnd::Exhausted | ScanEnd::LimitReached)
    }
}

impl fmt::Display for ScanEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanEnd::Exhausted => f.write_str("exhausted"),
            ScanEnd::LimitReached => f.write_str("limit reached"),
            ScanEnd::Failed(reason) => write!(f, "failed: {reason}"),
            ScanEnd::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug)]
pub enum ScanStep {
    Batch(Batch),
    End(ScanEnd),
}

/// One pass over a collection, advancing only through returned cursors.
///
/// Never requests more than `limit` records in total, so a collection that
/// grows during the run cannot make the scan overshoot its start-time size.
pub struct CursorScan {
    reader: CursorReader,
    run_id: String,
    cursor: Option<Cursor>,
    limit: u64,
    received: u64,
    seq: usize,
    end: Option<ScanEnd>,
}

impl CursorScan {
    pub fn new(reader: CursorReader, run_id: impl Into<String>, limit: u64) -> Self {
        Self {
            reader,
            run_id: run_id.into(),
            cursor: None,
            limit,
            received: 0,
            seq: 0,
            end: None,
        }
    }

    /// Starts the scan at `cursor` instead of the beginning of the collection.
    pub fn starting_at(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn batches(&self) -> usize {
        self.seq
    }

    pub fn reader(&self) -> &CursorReader {
        &self.reader
    }

    fn make_batch_id(&self, cursor: Option<&Cursor>) -> String {
        let mut h = blake3::Hasher::new();
        h.update(self.run_id.as_bytes());
        h.update(self.reader.collection().as_bytes());
        h.update(&self.seq.to_le_bytes());
        h.update(format!("{cursor:?}").as_bytes());
        h.finalize().to_hex().to_string()
    }

    fn finish(&mut self, end: ScanEnd) -> ScanStep {
        self.end = Some(end.clone());
        ScanStep::End(end)
    }

    /// Returns the next non-empty batch or the reason the scan ended.
    /// Cancellation is only observed here, between batches.
    pub async fn next_batch(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<ScanStep, TransferError> {
        if let Some(end) = &self.end {
            return Ok(ScanStep::End(end.clone()));
        }

        loop {
            if cancel.is_cancelled() {
                info!("Cancellation requested. Terminating scan.");
                return Ok(self.finish(ScanEnd::Cancelled));
            }

            let remaining = self.limit.saturating_sub(self.received);
            if remaining == 0 {
                return Ok(self.finish(ScanEnd::LimitReached));
            }
            let limit = usize::try_from(remaining).unwrap_or(usize::MAX);

            let from = self.cursor.clone();
            let page = match self.reader.fetch(from.as_ref(), limit).await? {
                FetchOutcome::Page(page) => page,
                FetchOutcome::Exhausted => {
                    info!("No more records to fetch. Terminating scan.");
                    return Ok(self.finish(ScanEnd::Exhausted));
                }
                FetchOutcome::Failed(reason) => {
                    return Ok(self.finish(ScanEnd::Failed(reason)));
                }
            };

            let next = page.next.clone();
            if page.records.is_empty() {
                // Empty page with a continuation: advance without emitting.
                self.cursor = next;
                continue;
            }

            let mut records = page.records;
            if records.len() as u64 > remaining {
                warn!(
                    rows = records.len(),
                    remaining, "Source returned more rows than requested; truncating"
                );
                records.truncate(limit);
            }

            self.received += records.len() as u64;
            let batch = Batch {
                id: self.make_batch_id(from.as_ref()),
                seq: self.seq,
                records,
                cursor: from,
                next: next.clone(),
                ts: chrono::Utc::now(),
            };
            self.seq += 1;

            match next {
                Some(cursor) => self.cursor = Some(cursor),
                None => self.end = Some(ScanEnd::Exhausted),
            }

            info!(
                batch_no = batch.seq + 1,
                batch_id = %batch.id,
                rows = batch.len(),
                "Fetched batch."
            );
            return Ok(ScanStep::Batch(batch));
        }
    }
}

/// Summary returned by the producer task.
#[derive(Debug)]
pub struct ProducerSummary {
    pub batches: usize,
    pub records: u64,
    pub end: ScanEnd,
    /// Page size in effect when the scan ended.
    pub final_batch_size: usize,
}

/// Pulls batches from `scan` into the bounded queue until the scan ends.
/// Dropping the sender on return tells consumers no more work is coming.
pub async fn run_producer(
    mut scan: CursorScan,
    batch_tx: mpsc::Sender<Batch>,
    cancel: CancellationToken,
) -> Result<ProducerSummary, TransferError> {
    let end = loop {
        match scan.next_batch(&cancel).await? {
            ScanStep::End(end) => break end,
            ScanStep::Batch(batch) => {
                tokio::select! {
                    sent = batch_tx.send(batch) => {
                        sent.map_err(|_| TransferError::ChannelClosed)?;
                    }
                    _ = cancel.cancelled() => break ScanEnd::Cancelled,
                }
            }
        }
    };

    info!(
        batches = scan.batches(),
        records = scan.received(),
        end = %end,
        "Producer finished"
    );
    Ok(ProducerSummary {
        batches: scan.batches(),
        records: scan.received(),
        end,
        final_batch_size: scan.reader().batch_size(),
    })
}
