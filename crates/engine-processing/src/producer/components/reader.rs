use crate::{error::TransferError, producer::config::ReaderConfig, retry::classify_source_error};
use connectors::source::{ScrollRequest, VectorSource};
use engine_core::{metrics::Metrics, retry::RetryError};
use model::pagination::{cursor::Cursor, page::ScrollPage};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a single page fetch produced.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Records (possibly none) and the continuation cursor.
    Page(ScrollPage),
    /// The source has no more records.
    Exhausted,
    /// Retries were exhausted; the scan cannot continue.
    Failed(String),
}

/// Fetches pages from one collection with adaptive retry.
///
/// The batch size only ever shrinks: once a page had to be halved, every
/// later fetch of the scan uses the smaller size.
pub struct CursorReader {
    source: Arc<dyn VectorSource>,
    collection: String,
    config: ReaderConfig,
    batch_size: usize,
    metrics: Metrics,
}

impl CursorReader {
    pub fn new(
        source: Arc<dyn VectorSource>,
        collection: impl Into<String>,
        config: ReaderConfig,
        metrics: Metrics,
    ) -> Self {
        let batch_size = config.batch_size.max(1);
        Self {
            source,
            collection: collection.into(),
            config,
            batch_size,
            metrics,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Current (possibly shrunk) page size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Verifies the collection exists and is not empty; returns its size.
    pub async fn check_preconditions(&self) -> Result<u64, TransferError> {
        let exists = self
            .source
            .collection_exists(&self.collection)
            .await
            .map_err(|source| self.source_error("exists", source))?;
        if !exists {
            return Err(TransferError::CollectionNotFound {
                collection: self.collection.clone(),
            });
        }

        let count = self
            .source
            .count(&self.collection)
            .await
            .map_err(|source| self.source_error("count", source))?;
        if count == 0 {
            return Err(TransferError::EmptyCollection {
                collection: self.collection.clone(),
            });
        }

        info!(collection = %self.collection, count, "Source collection ready");
        Ok(count)
    }

    /// Fetches at most `limit` records starting at `cursor`.
    ///
    /// Retry exhaustion is reported as [`FetchOutcome::Failed`]; only errors
    /// that no retry could fix are returned as `Err`.
    pub async fn fetch(
        &mut self,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<FetchOutcome, TransferError> {
        let requested = limit.min(self.batch_size).max(1);
        let source = self.source.clone();
        let collection = self.collection.clone();
        let with_vector = self.config.with_vector;
        let with_payload = self.config.with_payload;

        let result = self
            .config
            .retry
            .run_adaptive(
                requested,
                self.config.min_batch_size,
                |size| {
                    let source = source.clone();
                    let collection = collection.clone();
                    let mut request = ScrollRequest::new(cursor.cloned(), size);
                    request.with_vector = with_vector;
                    request.with_payload = with_payload;
                    async move { source.scroll(&collection, &request).await }
                },
                classify_source_error,
            )
            .await;

        match result {
            Ok(outcome) => {
                self.metrics.increment_fetch_retries(outcome.retries as u64);
                if outcome.shrinks > 0 {
                    self.metrics.increment_shrinks(outcome.shrinks as u64);
                    self.batch_size = self.batch_size.min(outcome.size);
                    warn!(
                        collection = %self.collection,
                        batch_size = self.batch_size,
                        "Batch size reduced for the rest of the scan"
                    );
                }

                let page = outcome.value;
                debug!(
                    collection = %self.collection,
                    requested = outcome.size,
                    rows = page.row_count(),
                    "Fetched page"
                );
                if page.is_exhausted() {
                    Ok(FetchOutcome::Exhausted)
                } else {
                    Ok(FetchOutcome::Page(page))
                }
            }
            Err(RetryError::AttemptsExceeded { attempts, error }) => {
                self.metrics.increment_failures(1);
                let reason = format!(
                    "fetch from '{}' failed after {attempts} attempts: {error}",
                    self.collection
                );
                warn!(collection = %self.collection, cursor = ?cursor, "{reason}");
                Ok(FetchOutcome::Failed(reason))
            }
            Err(RetryError::Fatal(error)) => {
                self.metrics.increment_failures(1);
                Err(self.source_error("scroll", error))
            }
        }
    }

    fn source_error(
        &self,
        operation: &'static str,
        source: connectors::error::SourceError,
    ) -> TransferError {
        TransferError::Source {
            collection: self.collection.clone(),
            operation,
            source,
        }
    }
}
