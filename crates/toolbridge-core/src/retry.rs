//! Retry executor
//!
//! Runs a fallible async operation and repeats it after connection failures,
//! sleeping a constant `base_delay` between attempts so a warming-up endpoint
//! gets time to come up. Everything that is not a connection failure is
//! returned to the caller immediately.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::{BoxError, OperationError, OperationResult};
use crate::logging::SharedLogger;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Clone)]
pub struct RetryExecutor {
    /// Total number of attempts, including the first
    max_retries: u32,
    base_delay: Duration,
    logger: SharedLogger,
}

impl RetryExecutor {
    pub fn new(logger: SharedLogger) -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            logger,
        }
    }

    pub fn from_config(config: &RetryConfig, logger: SharedLogger) -> Self {
        Self::new(logger)
            .with_max_retries(config.max_retries)
            .with_base_delay(Duration::from_millis(config.base_delay_ms))
    }

    /// Total attempts; zero is treated as one
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Run `operation` until it succeeds, fails permanently or runs out of
    /// attempts.
    pub async fn execute<T, E, F, Fut>(&self, name: &str, operation: F) -> OperationResult<T>
    where
        E: Into<BoxError>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_counted(name, operation).await.map(|(value, _)| value)
    }

    /// Like [`execute`](Self::execute), also returning how many retries
    /// preceded the success.
    ///
    /// Errors that are already an [`OperationError`] keep their kind. Other
    /// errors are classified; when attempts run out on an error that
    /// started out unclassified, the result is an `Unknown` error naming
    /// the operation and the attempt count.
    pub async fn execute_counted<T, E, F, Fut>(&self, name: &str, mut operation: F) -> OperationResult<(T, u32)>
    where
        E: Into<BoxError>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 1;
        loop {
            let raw: BoxError = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        self.logger
                            .info(&format!("[RetryExecutor] {} succeeded on attempt {}", name, attempt));
                    }
                    return Ok((value, attempt - 1));
                }
                Err(e) => e.into(),
            };

            let (error, classified) = match raw.downcast::<OperationError>() {
                Ok(op) => (*op, true),
                Err(other) => (OperationError::classify(other), false),
            };

            if !error.is_retryable() {
                self.logger.debug(&format!(
                    "[RetryExecutor] {} failed with {} error; not retrying",
                    name,
                    error.kind()
                ));
                return Err(error);
            }

            if attempt >= self.max_retries {
                self.logger.error(&format!(
                    "[RetryExecutor] {} failed after {} attempts: {}",
                    name, attempt, error
                ));
                if classified {
                    return Err(error);
                }
                return Err(OperationError::unknown(format!(
                    "{} failed after {} attempts: {}",
                    name,
                    attempt,
                    error.message()
                ))
                .with_cause(error));
            }

            self.logger.warn(&format!(
                "[RetryExecutor] {} attempt {}/{} failed: {}; retrying in {:?}",
                name, attempt, self.max_retries, error, self.base_delay
            ));
            tokio::time::sleep(self.base_delay).await;
            attempt += 1;
        }
    }
}
