//! Notification domain errors.

use thiserror::Error;

pub type NotificationResult<T> = Result<T, NotificationError>;

#[derive(Debug, Error)]
pub enum NotificationError {
    /// A delivery channel refused or failed to send.
    ///
    /// Always treated as retryable by the worker; a channel that is down
    /// now may be back before the retries run out.
    #[error("Channel error: {0}")]
    ChannelError(String),
}
