//! Errors raised by [`MessagingServer`](super::MessagingServer) operations.

use thiserror::Error;

use crate::{header::HeaderFormatError, reader::ReadError, transport::TransportError};

/// Errors that may occur while serving requests.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ServerError {
    /// Sending a reply failed; the request itself was processed.
    #[error("failed to send reply: {0}")]
    Reply(#[source] TransportError),
    /// The reply header could not be encoded.
    #[error("failed to write reply header: {0}")]
    Header(#[from] HeaderFormatError),
    /// Reading from the request queue failed; the server stopped.
    #[error("request queue failed: {0}")]
    Read(#[from] ReadError),
}
