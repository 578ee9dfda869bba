//! Point-to-point queue transport contract.
//!
//! The protocol layer only needs to send a message to a named queue, receive
//! one with a timeout, and acknowledge what it received. [`QueueTransport`]
//! captures that contract; [`MemoryTransport`] implements it in process.

mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use memory::{Fault, MemoryTransport};

/// Transport-assigned identifier of one delivered message.
pub type MessageId = String;

/// A message as delivered by the transport.
///
/// The body is immutable and reference counted, so clones share the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    message_id: MessageId,
    destination: String,
    correlation_id: Option<String>,
    reply_to: Option<String>,
    time_to_live: Option<Duration>,
    body: Bytes,
}

impl RawMessage {
    #[must_use]
    pub fn new(message_id: impl Into<MessageId>, destination: impl Into<String>, body: Bytes) -> Self {
        Self {
            message_id: message_id.into(),
            destination: destination.into(),
            correlation_id: None,
            reply_to: None,
            time_to_live: None,
            body,
        }
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    #[must_use]
    pub fn with_reply_to(mut self, reply_to: Option<String>) -> Self {
        self.reply_to = reply_to;
        self
    }

    #[must_use]
    pub fn with_time_to_live(mut self, ttl: Option<Duration>) -> Self {
        self.time_to_live = ttl;
        self
    }

    #[must_use]
    pub fn message_id(&self) -> &str { &self.message_id }

    #[must_use]
    pub fn destination(&self) -> &str { &self.destination }

    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> { self.correlation_id.as_deref() }

    #[must_use]
    pub fn reply_to(&self) -> Option<&str> { self.reply_to.as_deref() }

    #[must_use]
    pub fn time_to_live(&self) -> Option<Duration> { self.time_to_live }

    #[must_use]
    pub fn body(&self) -> &Bytes { &self.body }

    /// Identifier linking this delivery to its logical request.
    ///
    /// A resend arrives as a new delivery with a new message id, so the
    /// client-supplied correlation id wins when present.
    #[must_use]
    pub fn correlation_key(&self) -> &str { self.correlation_id().unwrap_or(&self.message_id) }
}

/// A message to be sent; the transport assigns the message id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Queue the message is sent to.
    pub destination: String,
    /// Correlation id stamped on the message.
    pub correlation_id: Option<String>,
    /// Queue replies should be sent to.
    pub reply_to: Option<String>,
    /// Expiry after which the message is discarded undelivered.
    pub time_to_live: Option<Duration>,
    /// Encoded body.
    pub body: Bytes,
}

impl OutboundMessage {
    #[must_use]
    pub fn new(destination: impl Into<String>, body: Bytes) -> Self {
        Self {
            destination: destination.into(),
            correlation_id: None,
            reply_to: None,
            time_to_live: None,
            body,
        }
    }

    #[must_use]
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    #[must_use]
    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    #[must_use]
    pub fn time_to_live(mut self, ttl: Option<Duration>) -> Self {
        self.time_to_live = ttl;
        self
    }
}

/// Errors raised by a [`QueueTransport`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TransportError {
    /// The destination queue does not exist.
    #[error("unknown queue {0}")]
    UnknownQueue(String),
    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,
    /// The underlying transport failed.
    #[error("transport failure: {0}")]
    Failure(String),
}

/// Send and synchronously receive messages on named queues.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Send `message`, returning the id the transport assigned to it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the message could not be enqueued.
    async fn send(&self, message: OutboundMessage) -> Result<MessageId, TransportError>;

    /// Wait for the next message on `queue`.
    ///
    /// When `correlation_id` is given only a message carrying that correlation
    /// id is taken. `None` for `timeout` waits indefinitely. `Ok(None)` means
    /// the timeout elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the receive itself failed.
    async fn receive(
        &self,
        queue: &str,
        correlation_id: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Option<RawMessage>, TransportError>;

    /// Confirm that `message` has been taken over by the receiver.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the acknowledgement failed.
    async fn acknowledge(&self, _message: &RawMessage) -> Result<(), TransportError> { Ok(()) }
}
