use engine_core::retry::RetryPolicy;
use model::execution::job::DEFAULT_BATCH_SIZE;

/// Smallest page the reader shrinks to after "payload too large" failures.
pub const DEFAULT_MIN_BATCH_SIZE: usize = 100;

/// Configuration for reading a collection page by page.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Number of records requested per page
    pub batch_size: usize,

    /// Floor for adaptive shrinking
    pub min_batch_size: usize,

    /// Attempts and delay for failed page fetches
    pub retry: RetryPolicy,

    pub with_vector: bool,
    pub with_payload: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            min_batch_size: DEFAULT_MIN_BATCH_SIZE,
            retry: RetryPolicy::default(),
            with_vector: true,
            with_payload: true,
        }
    }
}

impl ReaderConfig {
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_min_batch_size(mut self, size: usize) -> Self {
        self.min_batch_size = size.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_vector(mut self, enabled: bool) -> Self {
        self.with_vector = enabled;
        self
    }

    pub fn with_payload(mut self, enabled: bool) -> Self {
        self.with_payload = enabled;
        self
    }
}
