//! Synchronous request/response client.
//!
//! [`SyncMessenger`] sends one request, blocks on the reply queue for the
//! correlated reply and, when resend control is enabled, resends the same
//! logical request with the resend flag set after each timeout.

mod error;
mod id;
mod settings;

use std::{sync::Arc, time::Duration};

use bytes::{Bytes, BytesMut};

pub use error::ClientError;
pub use id::{IdFormatter, IdGenerator, SequenceIdGenerator, ZeroPadFormatter};
pub use settings::{DEFAULT_GENERATOR_TARGET, DEFAULT_REPLY_TIMEOUT_MS, SendSettings, SendSettingsBuilder};

use crate::{
    header::{FwHeader, HeaderCodec, ResendFlag, StatusCode},
    metrics,
    record::{BodyCursor, FormatError, FormatPattern, Record},
    transport::{OutboundMessage, QueueTransport, RawMessage},
};

/// Request data for one synchronous exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncRequest {
    request_id: String,
    user_id: Option<String>,
    records: Vec<Record>,
}

impl SyncRequest {
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Append a body record.
    #[must_use]
    pub fn with_record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    #[must_use]
    pub fn request_id(&self) -> &str { &self.request_id }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> { self.user_id.as_deref() }

    #[must_use]
    pub fn records(&self) -> &[Record] { &self.records }
}

/// Decoded reply to a [`SyncRequest`].
#[derive(Clone, Debug)]
pub struct SyncReply {
    header: FwHeader,
    records: Vec<Record>,
    message: RawMessage,
    attempts: u32,
}

impl SyncReply {
    #[must_use]
    pub fn header(&self) -> &FwHeader { &self.header }

    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> { self.header.status_code() }

    /// Body records, decoded with the send layout of the request id.
    ///
    /// Empty when the reply has no body or no send layout exists; the raw
    /// bytes stay available through [`SyncReply::message`].
    #[must_use]
    pub fn records(&self) -> &[Record] { &self.records }

    #[must_use]
    pub fn message(&self) -> &RawMessage { &self.message }

    /// Messages sent before this reply arrived, the first send included.
    #[must_use]
    pub fn attempts(&self) -> u32 { self.attempts }
}

/// Sends requests and waits for their replies.
pub struct SyncMessenger {
    transport: Arc<dyn QueueTransport>,
    codec: Arc<HeaderCodec>,
    ids: Arc<dyn IdGenerator>,
    id_format: Arc<dyn IdFormatter>,
    receive_pattern: FormatPattern,
    send_pattern: FormatPattern,
}

impl SyncMessenger {
    #[must_use]
    pub fn new(transport: Arc<dyn QueueTransport>, codec: Arc<HeaderCodec>) -> Self {
        Self {
            transport,
            codec,
            ids: Arc::new(SequenceIdGenerator::new()),
            id_format: Arc::new(ZeroPadFormatter::default()),
            receive_pattern: FormatPattern::receive(),
            send_pattern: FormatPattern::send(),
        }
    }

    /// Replace the correlation id source.
    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>, id_format: Arc<dyn IdFormatter>) -> Self {
        self.ids = ids;
        self.id_format = id_format;
        self
    }

    /// Layout name patterns for request and reply bodies.
    ///
    /// The request body uses `receive`, the receiving side's view, and the
    /// reply body uses `send`.
    #[must_use]
    pub fn with_patterns(mut self, receive: FormatPattern, send: FormatPattern) -> Self {
        self.receive_pattern = receive;
        self.send_pattern = send;
        self
    }

    /// Send `request` and block until its reply arrives.
    ///
    /// Every attempt carries the same correlation id, so the server treats a
    /// resend as the same logical request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] when no reply arrived and no resend
    /// is left, or another [`ClientError`] when encoding, transport or reply
    /// decoding fails.
    pub async fn send_sync(&self, settings: &SendSettings, request: &SyncRequest) -> Result<SyncReply, ClientError> {
        let correlation_id = self
            .id_format
            .format(self.ids.generate(settings.generator_target()));
        let mut flag = settings.resend_control().then_some(ResendFlag::FirstSend);
        let mut attempts = 0;
        loop {
            let body = self.encode(request, flag)?;
            let outbound = OutboundMessage::new(settings.destination(), body)
                .correlation_id(correlation_id.as_str())
                .reply_to(settings.reply_queue())
                .time_to_live(settings.time_to_live());
            let message_id = self.transport.send(outbound).await?;
            attempts += 1;
            log::debug!(
                "sent {} as {message_id} (correlation id {correlation_id}, attempt {attempts})",
                request.request_id()
            );

            let received = self
                .transport
                .receive(settings.reply_queue(), Some(&correlation_id), settings.timeout())
                .await?;
            if let Some(message) = received {
                if attempts > 1 {
                    self.discard_stale_replies(settings.reply_queue(), &correlation_id).await;
                }
                return self.decode(request.request_id(), message, attempts);
            }
            if flag.is_none() || attempts > settings.retries() {
                return Err(ClientError::Timeout {
                    request_id: request.request_id().to_owned(),
                    correlation_id,
                    attempts,
                });
            }
            tracing::warn!(
                request_id = request.request_id(),
                correlation_id = correlation_id.as_str(),
                attempt = attempts,
                "reply timed out; resending"
            );
            metrics::inc_resends();
            flag = Some(ResendFlag::Resend);
        }
    }

    /// Remove replies to earlier attempts already waiting on `queue`.
    ///
    /// Replies arriving after this point are left to the reply time to live.
    async fn discard_stale_replies(&self, queue: &str, correlation_id: &str) {
        loop {
            match self.transport.receive(queue, Some(correlation_id), Some(Duration::ZERO)).await {
                Ok(Some(stale)) => log::debug!("discarded stale reply {} for {correlation_id}", stale.message_id()),
                Ok(None) => break,
                Err(err) => {
                    log::debug!("could not drain stale replies for {correlation_id}: {err}");
                    break;
                }
            }
        }
    }

    fn encode(&self, request: &SyncRequest, flag: Option<ResendFlag>) -> Result<Bytes, ClientError> {
        let mut header = FwHeader::new(request.request_id()).with_resend_flag(flag);
        if let Some(user_id) = request.user_id() {
            header = header.with_user_id(user_id);
        }
        let mut payload = BytesMut::new();
        self.codec.write_header(&header, &mut payload)?;
        if !request.records().is_empty() {
            let name = self.receive_pattern.resolve(request.request_id());
            let layout = self
                .codec
                .formats()
                .find(&name)
                .ok_or_else(|| FormatError::NoLayout(format!("request body {name}")))?;
            for record in request.records() {
                layout.write_record(record, &mut payload)?;
            }
        }
        Ok(payload.freeze())
    }

    fn decode(&self, request_id: &str, message: RawMessage, attempts: u32) -> Result<SyncReply, ClientError> {
        let mut body = BodyCursor::new(message.body().clone());
        let header = self.codec.parse_reply_header(&mut body)?;
        let mut records = Vec::new();
        if let Some(layout) = self.codec.formats().find(&self.send_pattern.resolve(request_id)) {
            while let Some(record) = layout.read_record(&mut body)? {
                records.push(record);
            }
        }
        Ok(SyncReply {
            header,
            records,
            message,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests;
