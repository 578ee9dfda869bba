//! Errors surfaced by [`SyncMessenger`](super::SyncMessenger).

use thiserror::Error;

use crate::{header::HeaderFormatError, record::FormatError, transport::TransportError};

/// Failure of one synchronous exchange.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ClientError {
    /// No reply arrived before the timeout and no resend was left.
    #[error("no reply to {request_id} (correlation id {correlation_id}) after {attempts} attempt(s)")]
    Timeout {
        /// Request id of the unanswered request.
        request_id: String,
        /// Correlation id every attempt was sent with.
        correlation_id: String,
        /// Number of messages sent, the first send included.
        attempts: u32,
    },
    /// Sending or receiving failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// The request header could not be written or the reply header parsed.
    #[error("header error: {0}")]
    Header(#[from] HeaderFormatError),
    /// A request or reply record could not be encoded or decoded.
    #[error("record error: {0}")]
    Format(#[from] FormatError),
}
