use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Indicates how an error should be handled by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Transient: wait and try again with the same unit of work.
    Retry,
    /// The unit of work was too large: halve it and try again immediately.
    Shrink,
    /// Fatal: bubble up without further attempts.
    Stop,
}

/// Result of running an operation under the retry policy.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The error was considered fatal and should bubble up immediately.
    #[error("fatal error: {0}")]
    Fatal(E),
    /// The error was retryable, but the configured attempts were exhausted.
    #[error("gave up after {attempts} attempts: {error}")]
    AttemptsExceeded { attempts: usize, error: E },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::AttemptsExceeded { error, .. } => error,
        }
    }

    pub fn inner(&self) -> &E {
        match self {
            RetryError::Fatal(e) => e,
            RetryError::AttemptsExceeded { error, .. } => error,
        }
    }
}

/// Successful outcome of [`RetryPolicy::run_adaptive`].
#[derive(Debug, Clone, PartialEq)]
pub struct Adaptive<T> {
    pub value: T,
    /// Size the operation finally succeeded with.
    pub size: usize,
    /// Delayed retries that consumed an attempt.
    pub retries: usize,
    pub shrinks: usize,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    /// Pause before every retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Constant delay between attempts.
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Whether a failure on zero-based `attempt` may be followed by another.
    pub fn has_attempts_left(&self, attempt: usize) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Executes the operation with the configured retry policy.
    ///
    /// [`RetryDisposition::Shrink`] is treated like `Retry` because the
    /// operation has no size to shrink.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        mut op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                    RetryDisposition::Retry | RetryDisposition::Shrink => {
                        if !self.has_attempts_left(attempt) {
                            return Err(RetryError::AttemptsExceeded {
                                attempts: attempt + 1,
                                error: err,
                            });
                        }

                        sleep(self.delay).await;
                        attempt += 1;
                    }
                },
            }
        }
    }

    /// Executes a size-parameterised operation, halving the size on
    /// [`RetryDisposition::Shrink`] as long as the result stays at or above
    /// `floor`.
    ///
    /// A shrink does not consume an attempt and does not wait. Once halving
    /// would go below `floor` the failure is handled like `Retry`.
    pub async fn run_adaptive<F, Fut, T, E, Classifier>(
        &self,
        initial_size: usize,
        floor: usize,
        mut op: F,
        classify: Classifier,
    ) -> Result<Adaptive<T>, RetryError<E>>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
        E: std::fmt::Display,
    {
        let mut size = initial_size.max(1);
        let mut attempt = 0;
        let mut shrinks = 0;

        loop {
            let err = match op(size).await {
                Ok(value) => {
                    return Ok(Adaptive {
                        value,
                        size,
                        retries: attempt,
                        shrinks,
                    });
                }
                Err(err) => err,
            };

            let disposition = match classify(&err) {
                RetryDisposition::Shrink if size / 2 >= floor => {
                    let next = size / 2;
                    warn!(from = size, to = next, error = %err, "Shrinking batch size");
                    size = next;
                    shrinks += 1;
                    continue;
                }
                RetryDisposition::Shrink => {
                    debug!(size, floor, "Cannot shrink below floor");
                    RetryDisposition::Retry
                }
                other => other,
            };

            match disposition {
                RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                _ => {
                    if !self.has_attempts_left(attempt) {
                        return Err(RetryError::AttemptsExceeded {
                            attempts: attempt + 1,
                            error: err,
                        });
                    }

                    let delay = self.delay;
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after transient failure"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
