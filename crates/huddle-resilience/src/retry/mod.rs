//! Retry policy implementation.

use std::time::Duration;
use tracing::debug;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(500),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Result of a retried operation together with the number of attempts made.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Final result.
    pub result: Result<T, E>,
    /// Attempts made, at least one.
    pub attempts: u32,
}

impl RetryPolicy {
    /// Creates a new retry policy with the specified max attempts.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Creates a policy that never waits between attempts.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            jitter: false,
            ..Default::default()
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Calculates the delay for a given attempt number.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.initial_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let delay = Duration::from_millis(base_delay.min(self.max_delay.as_millis() as f64) as u64);

        if self.jitter {
            // up to 25% either way
            let jitter_factor = 1.0 + (rand_simple() * 0.5 - 0.25);
            Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64)
        } else {
            delay
        }
    }

    /// Executes a function with retry logic.
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_counted(f).await.result
    }

    /// Executes a function with retry logic and reports how many attempts ran.
    ///
    /// A policy with `max_attempts == 0` still runs the operation once.
    pub async fn execute_counted<F, Fut, T, E>(&self, mut f: F) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = self.delay_for_attempt(attempt);
                debug!("Retry attempt {} after {:?}", attempt, delay);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            match f().await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt + 1,
                    }
                }
                Err(e) => {
                    debug!("Attempt {} failed: {}", attempt + 1, e);
                    attempt += 1;
                    if attempt >= max_attempts {
                        return RetryOutcome {
                            result: Err(e),
                            attempts: attempt,
                        };
                    }
                }
            }
        }
    }
}

/// Simple pseudo-random number generator for jitter.
fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1000) / 1000.0
}
