//! Receiving inbound messages from the request queue.
//!
//! [`MessageReader`] takes one message at a time from the configured queue.
//! [`HeaderReader`] layers header parsing and format binding on top so that
//! callers receive a ready-to-dispatch [`Request`](crate::request::Request).

mod header;
mod scope;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use thiserror::Error;

pub use header::HeaderReader;
pub use scope::RequestScope;

use crate::{
    error::ConfigError,
    header::HeaderFormatError,
    transport::{QueueTransport, RawMessage, TransportError},
};

/// Receive timeout used when none is configured.
pub const DEFAULT_READ_TIMEOUT_MS: i64 = 5000;

/// Settings for a [`MessageReader`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReaderConfig {
    queue: String,
    timeout: Option<Duration>,
}

/// Builder for [`ReaderConfig`].
#[derive(Clone, Debug)]
#[must_use]
pub struct ReaderConfigBuilder {
    queue: String,
    timeout_ms: i64,
}

impl ReaderConfigBuilder {
    /// Receive timeout in milliseconds; zero or negative waits indefinitely.
    pub fn timeout_millis(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyQueueName`] when no queue was named.
    pub fn build(self) -> Result<ReaderConfig, ConfigError> {
        if self.queue.trim().is_empty() {
            return Err(ConfigError::EmptyQueueName("receive"));
        }
        let timeout = u64::try_from(self.timeout_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        Ok(ReaderConfig {
            queue: self.queue,
            timeout,
        })
    }
}

impl ReaderConfig {
    /// Start configuring a reader for `queue`.
    pub fn builder(queue: impl Into<String>) -> ReaderConfigBuilder {
        ReaderConfigBuilder {
            queue: queue.into(),
            timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }

    #[must_use]
    pub fn queue(&self) -> &str { &self.queue }

    /// `None` means receives wait indefinitely.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> { self.timeout }
}

/// Why a received message could not be turned into a request.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReadFailure {
    /// The message was dequeued but could not be acknowledged.
    #[error("acknowledge failed: {0}")]
    Acknowledge(#[source] TransportError),
    /// The header was missing, malformed or unreadable.
    #[error(transparent)]
    Header(#[from] HeaderFormatError),
    /// A layout panicked while decoding the header.
    #[error("layout panicked: {0}")]
    Panic(String),
}

/// A received message that failed to read.
///
/// The message itself is kept so the dispatcher can still address an error
/// reply using its queue metadata.
#[derive(Debug, Error)]
#[error("failed to read message {}: {failure}", .message.message_id())]
pub struct MessageReadError {
    message: RawMessage,
    request_id: Option<String>,
    #[source]
    failure: ReadFailure,
}

impl MessageReadError {
    #[must_use]
    pub fn new(message: RawMessage, failure: ReadFailure) -> Self {
        Self {
            message,
            request_id: None,
            failure,
        }
    }

    /// Attach the request id recovered before the failure.
    #[must_use]
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    #[must_use]
    pub fn message(&self) -> &RawMessage { &self.message }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> { self.request_id.as_deref() }

    #[must_use]
    pub fn failure(&self) -> &ReadFailure { &self.failure }
}

/// Errors returned by the readers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReadError {
    /// Receiving failed; no message was taken from the queue.
    #[error("receive failed: {0}")]
    Transport(#[source] TransportError),
    /// A message was taken but could not be read.
    #[error(transparent)]
    Message(#[from] Box<MessageReadError>),
}

impl ReadError {
    /// Whether the reader loop should stop rather than reply and continue.
    #[must_use]
    pub fn is_fatal(&self) -> bool { matches!(self, ReadError::Transport(_)) }
}

impl From<MessageReadError> for ReadError {
    fn from(err: MessageReadError) -> Self { ReadError::Message(Box::new(err)) }
}

/// Takes raw messages from the request queue.
pub struct MessageReader {
    transport: Arc<dyn QueueTransport>,
    config: ReaderConfig,
    closed: AtomicBool,
}

impl MessageReader {
    #[must_use]
    pub fn new(transport: Arc<dyn QueueTransport>, config: ReaderConfig) -> Self {
        Self {
            transport,
            config,
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ReaderConfig { &self.config }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn QueueTransport> { &self.transport }

    /// Receive and acknowledge the next message.
    ///
    /// Returns `Ok(None)` when the timeout elapsed with nothing waiting or
    /// when the reader has been closed.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Transport`] when the receive fails and
    /// [`ReadError::Message`] when a dequeued message cannot be acknowledged.
    pub async fn read(&self) -> Result<Option<RawMessage>, ReadError> {
        if self.is_closed() {
            return Ok(None);
        }
        let received = self
            .transport
            .receive(&self.config.queue, None, self.config.timeout)
            .await
            .map_err(ReadError::Transport)?;
        let Some(message) = received else {
            log::trace!("no message on {} before timeout", self.config.queue);
            return Ok(None);
        };
        if let Err(err) = self.transport.acknowledge(&message).await {
            return Err(MessageReadError::new(message, ReadFailure::Acknowledge(err)).into());
        }
        log::debug!("received message {} from {}", message.message_id(), self.config.queue);
        Ok(Some(message))
    }

    /// Stop reading. Later reads return `Ok(None)`; closing twice is harmless.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            log::info!("closed reader on {}", self.config.queue);
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool { self.closed.load(Ordering::SeqCst) }
}
