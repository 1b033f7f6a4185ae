//! Retry logic with bounded backoff
//!
//! Network-class failures (timeouts, refused, reset or dropped connections, 5xx
//! and 429 responses) are retryable; everything else is permanent. [`Backoff`] hands out
//! the delay for each consecutive failure and reports exhaustion once
//! [`RetryConfig::max_attempts`] is reached.
//!
//! # Example
//!
//! ```
//! use collection_archiver::config::RetryConfig;
//! use collection_archiver::retry::Backoff;
//! use std::time::Duration;
//!
//! let config = RetryConfig::default();
//! let mut backoff = Backoff::new(&config);
//! assert_eq!(backoff.next_delay(), Some(Duration::from_secs(5)));
//! assert_eq!(backoff.attempt(), 1);
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, server busy, connection reset) should return `true`.
/// Permanent failures (bad configuration, malformed data, disk full) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Transport failures without a response; decode and builder errors are permanent
            Error::Network(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            // Server-side trouble and throttling are worth another attempt
            Error::Http { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::PageFetch { source, .. } => source.is_retryable(),
            Error::Config { .. }
            | Error::SourceFetch { .. }
            | Error::ItemExtract { .. }
            | Error::ImageFetch { .. }
            | Error::Write { .. }
            | Error::NameExhausted { .. }
            | Error::Serialization(_)
            | Error::Header(_) => false,
        }
    }
}

/// Delay schedule for consecutive failures of one operation
#[derive(Debug, Clone)]
pub struct Backoff<'a> {
    config: &'a RetryConfig,
    attempt: u32,
    delay: Duration,
}

impl<'a> Backoff<'a> {
    /// Start a fresh schedule
    pub fn new(config: &'a RetryConfig) -> Self {
        Self {
            config,
            attempt: 0,
            delay: config.initial_delay,
        }
    }

    /// Number of retries handed out so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay to wait before the next retry, or `None` once attempts are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.config.max_attempts {
            return None;
        }
        self.attempt += 1;

        let current = self.delay;
        let next = Duration::try_from_secs_f64(current.as_secs_f64() * self.config.backoff_multiplier)
            .unwrap_or(self.config.max_delay);
        self.delay = next.min(self.config.max_delay);

        Some(if self.config.jitter {
            add_jitter(current)
        } else {
            current
        })
    }

    /// Forget previous failures after a success
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.delay = self.config.initial_delay;
    }
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
