use std::panic::{AssertUnwindSafe, catch_unwind};

use super::{MessageReadError, MessageReader, ReadError, ReadFailure, RequestScope};
use crate::{
    header::HeaderCodec,
    panic::panic_message,
    record::{BodyCursor, FormatPattern},
    request::Request,
    transport::RawMessage,
};

/// Reads messages and turns each into a [`Request`].
///
/// The header is parsed with the configured [`HeaderCodec`]; the body and
/// reply layouts are then looked up by substituting the request id into the
/// receive and send patterns. A missing body or reply layout is allowed, an
/// unreadable header is not.
pub struct HeaderReader {
    reader: MessageReader,
    codec: HeaderCodec,
    receive_pattern: FormatPattern,
    send_pattern: FormatPattern,
}

impl HeaderReader {
    #[must_use]
    pub fn new(reader: MessageReader, codec: HeaderCodec) -> Self {
        Self {
            reader,
            codec,
            receive_pattern: FormatPattern::receive(),
            send_pattern: FormatPattern::send(),
        }
    }

    /// Override the body and reply layout name patterns.
    #[must_use]
    pub fn with_patterns(mut self, receive: FormatPattern, send: FormatPattern) -> Self {
        self.receive_pattern = receive;
        self.send_pattern = send;
        self
    }

    #[must_use]
    pub fn codec(&self) -> &HeaderCodec { &self.codec }

    #[must_use]
    pub fn message_reader(&self) -> &MessageReader { &self.reader }

    #[must_use]
    pub fn send_pattern(&self) -> &FormatPattern { &self.send_pattern }

    /// Read the next request, recording its identifiers in `scope`.
    ///
    /// `scope` is cleared first. It is filled as soon as the header parses,
    /// so it stays populated even when a later step fails.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Transport`] when receiving fails and
    /// [`ReadError::Message`] when the message was taken but is unreadable.
    pub async fn read(&self, scope: &mut RequestScope) -> Result<Option<Request>, ReadError> {
        scope.clear();
        let Some(message) = self.reader.read().await? else {
            return Ok(None);
        };
        let assembled = catch_unwind(AssertUnwindSafe(|| self.assemble(&message, scope)));
        let failure = match assembled {
            Ok(Ok(request)) => return Ok(Some(request)),
            Ok(Err(failure)) => failure,
            Err(payload) => {
                let text = panic_message(payload.as_ref()).to_owned();
                log::error!("layout panicked reading message {}: {text}", message.message_id());
                ReadFailure::Panic(text)
            }
        };
        let request_id = scope.request_id().map(str::to_owned);
        Err(MessageReadError::new(message, failure)
            .with_request_id(request_id)
            .into())
    }

    fn assemble(&self, message: &RawMessage, scope: &mut RequestScope) -> Result<Request, ReadFailure> {
        let mut body = BodyCursor::new(message.body().clone());
        let header = self.codec.parse_header(&mut body)?;
        scope.enter(&header);

        let formats = self.codec.formats();
        let request_id = header.request_id().unwrap_or_default();
        let body_name = self.receive_pattern.resolve(request_id);
        let reply_name = self.send_pattern.resolve(request_id);
        let body_formatter = formats.find(&body_name);
        if body_formatter.is_none() {
            log::debug!("no body layout {body_name}");
        }
        let reply_formatter = formats.find(&reply_name);
        if reply_formatter.is_none() {
            log::debug!("no reply layout {reply_name}");
        }
        Request::new(message.clone(), header, body, body_formatter, reply_formatter).map_err(Into::into)
    }

    /// Close the underlying [`MessageReader`].
    pub fn close(&self) { self.reader.close(); }

    #[must_use]
    pub fn is_closed(&self) -> bool { self.reader.is_closed() }
}
