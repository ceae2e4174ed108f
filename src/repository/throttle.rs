use crate::errors::RepositoryError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};

/// Fixed-window call budget shared by every repository in the process.
pub struct RateLimiter {
    max_calls: u32,
    window: Duration,
    state: Mutex<Window>,
}

struct Window {
    started: Instant,
    used: u32,
}

impl RateLimiter {
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            window,
            state: Mutex::new(Window {
                started: Instant::now(),
                used: 0,
            }),
        }
    }

    /// Wait until the current window has budget left, then consume one call.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut window = self.state.lock().await;
                let now = Instant::now();
                if now.duration_since(window.started) >= self.window {
                    window.started = now;
                    window.used = 0;
                }
                if window.used < self.max_calls {
                    window.used += 1;
                    return;
                }
                self.window - now.duration_since(window.started)
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limiter budget exhausted");
            time::sleep(wait).await;
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(8_000),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay before retry number `attempt` (1-based), capped, with up to 20%
    /// jitter added.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let capped = exp.min(self.max_delay);
        let jitter_ms = (capped.as_millis() as u64) / 5;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        capped + Duration::from_millis(jitter)
    }
}

/// Limiter plus retry loop wrapped around every external call.
pub struct Throttle {
    limiter: Option<RateLimiter>,
    retry: RetryPolicy,
}

impl Throttle {
    pub fn new(limiter: Option<RateLimiter>, retry: RetryPolicy) -> Self {
        Self { limiter, retry }
    }

    pub fn unlimited() -> Self {
        Self::new(None, RetryPolicy::default())
    }

    /// Run `call` until it succeeds, fails permanently, or the attempt budget is spent.
    /// Callers never see an intermediate transient error.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, RepositoryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
            }
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient spreadsheet API failure, retrying"
                    );
                    time::sleep(delay).await;
                }
                Err(err) if err.is_transient() => {
                    return Err(RepositoryError::RetriesExhausted {
                        operation,
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }
}
