use crate::{consumer::components::writer::BatchWriter, error::TransferError};
use model::records::batch::Batch;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Queue shared by all workers; each batch is taken by exactly one of them.
pub type SharedReceiver = Arc<Mutex<mpsc::Receiver<Batch>>>;

/// Completion message sent to the scheduler after a batch is written.
#[derive(Debug, Clone)]
pub struct WorkerAck {
    pub worker: usize,
    pub batch_id: String,
    pub seq: usize,
    pub rows: u64,
}

/// What a worker reports back, in the order it happened.
#[derive(Debug)]
pub enum WorkerEvent {
    Written(WorkerAck),
    Failed { worker: usize, error: TransferError },
}

pub struct BatchWorker {
    id: usize,
    writer: BatchWriter,
    batch_rx: SharedReceiver,
    events: mpsc::UnboundedSender<WorkerEvent>,
    cancel: CancellationToken,
}

impl BatchWorker {
    pub fn new(
        id: usize,
        writer: BatchWriter,
        batch_rx: SharedReceiver,
        events: mpsc::UnboundedSender<WorkerEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            writer,
            batch_rx,
            events,
            cancel,
        }
    }

    /// Writes batches until the queue is drained or the run is cancelled and
    /// returns how many it wrote. A failed write is reported as an event and
    /// cancels the whole run so no new batch is started.
    pub async fn run(mut self) -> usize {
        let mut written = 0usize;

        while !self.cancel.is_cancelled() {
            let Some(batch) = next_batch(&self.batch_rx, &self.cancel).await else {
                break;
            };

            match self.writer.write_batch(&batch).await {
                Ok(result) => {
                    written += 1;
                    let ack = WorkerAck {
                        worker: self.id,
                        batch_id: batch.id.clone(),
                        seq: batch.seq,
                        rows: result.rows_written as u64,
                    };
                    if self.events.send(WorkerEvent::Written(ack)).is_err() {
                        debug!(worker = self.id, "Scheduler stopped listening for acks");
                    }
                }
                Err(error) => {
                    self.cancel.cancel();
                    warn!(worker = self.id, error = %error, "Worker stopped on failed write");
                    let event = WorkerEvent::Failed {
                        worker: self.id,
                        error,
                    };
                    if self.events.send(event).is_err() {
                        debug!(worker = self.id, "Scheduler stopped listening for acks");
                    }
                    return written;
                }
            }
        }

        info!(worker = self.id, batches = written, "Worker finished");
        written
    }
}

async fn next_batch(batch_rx: &SharedReceiver, cancel: &CancellationToken) -> Option<Batch> {
    let mut rx = batch_rx.lock().await;
    tokio::select! {
        batch = rx.recv() => batch,
        _ = cancel.cancelled() => None,
    }
}
