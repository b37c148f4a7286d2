//! Failure types for stream processing.
//!
//! Every failure carries an [`ErrorCategory`] that decides its fate:
//! transient errors are requeued with exponential backoff, permanent ones
//! go straight to the dead letter queue.

use thiserror::Error;

const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CAP_MS: u64 = 30_000;

/// Decides whether a failed job is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Likely to succeed on a later attempt (outage, timeout, contention).
    Transient,
    /// Will fail the same way every time; retrying only burns work.
    Permanent,
}

impl ErrorCategory {
    /// Backoff before retry number `retry_count + 1`.
    ///
    /// Doubles from 1s and caps at 30s. Permanent errors never wait
    /// because they never retry.
    pub fn backoff_delay_ms(&self, retry_count: u32) -> u64 {
        match self {
            Self::Permanent => 0,
            Self::Transient => BACKOFF_BASE_MS
                .saturating_mul(2u64.saturating_pow(retry_count))
                .min(BACKOFF_CAP_MS),
        }
    }

    /// Stable label for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
        }
    }
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("redis command failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("payload could not be serialized: {0}")]
    Serialization(String),

    /// A processor rejected the job, with its own verdict on retryability.
    #[error("processing failed: {message}")]
    Processing {
        message: String,
        category: ErrorCategory,
    },
}

impl StreamError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    /// Redis hiccups are retryable; a payload that failed to serialize
    /// will fail identically forever.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Redis(_) => ErrorCategory::Transient,
            Self::Serialization(_) => ErrorCategory::Permanent,
            Self::Processing { category, .. } => *category,
        }
    }

    pub fn backoff_delay_ms(&self, retry_count: u32) -> u64 {
        self.category().backoff_delay_ms(retry_count)
    }

    /// True when Redis reported a missing consumer group; the worker
    /// recreates the group and resumes.
    pub fn is_nogroup(&self) -> bool {
        matches!(self, Self::Redis(e) if e.to_string().contains("NOGROUP"))
    }

    /// True for connection-level Redis failures worth a reconnect pause.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Redis(e) => {
                e.is_connection_refusal()
                    || e.is_connection_dropped()
                    || e.is_io_error()
                    || e.is_timeout()
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
