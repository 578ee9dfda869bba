//! Turning one read result into one reply message.

use std::{sync::Arc, time::Duration};

use bytes::{Bytes, BytesMut};
use tracing::Instrument;

use super::ServerError;
use crate::{
    action::Router,
    header::{FwHeader, HeaderCodec, StatusCode},
    metrics,
    reader::{MessageReadError, ReadFailure},
    request::Request,
    resend::ResendCoordinator,
    transport::{OutboundMessage, QueueTransport, RawMessage},
};

/// Routes requests to actions and sends their replies.
pub struct RequestProcessor {
    transport: Arc<dyn QueueTransport>,
    codec: Arc<HeaderCodec>,
    router: Router,
    coordinator: ResendCoordinator,
    reply_ttl: Option<Duration>,
}

impl RequestProcessor {
    /// `codec` writes reply headers; it is normally the codec the requests
    /// were read with.
    #[must_use]
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        codec: Arc<HeaderCodec>,
        router: Router,
        coordinator: ResendCoordinator,
    ) -> Self {
        Self {
            transport,
            codec,
            router,
            coordinator,
            reply_ttl: None,
        }
    }

    #[must_use]
    pub fn with_reply_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.reply_ttl = ttl;
        self
    }

    #[must_use]
    pub fn router(&self) -> &Router { &self.router }

    /// Run the action for `request` and send its reply.
    ///
    /// A request id without an action is answered with
    /// [`StatusCode::NOT_FOUND`] and never opens a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the reply cannot be encoded or sent. The
    /// request's own outcome is already settled at that point.
    pub async fn handle(&self, mut request: Request) -> Result<(), ServerError> {
        let span = tracing::info_span!(
            "request",
            request_id = request.request_id(),
            message_id = request.message().message_id(),
        );
        async move {
            let Some(action) = self.router.get(request.request_id()).cloned() else {
                tracing::warn!("no action registered");
                metrics::inc_requests("not_found");
                let header = request.header().reply(StatusCode::NOT_FOUND);
                return self.send_reply(request.message(), &header, &Bytes::new()).await;
            };
            let reply = self.coordinator.process(action.as_ref(), &mut request).await;
            metrics::inc_requests(reply.outcome().as_str());
            tracing::debug!(
                status = %reply.status_code(),
                outcome = reply.outcome().as_str(),
                "request processed"
            );
            let header = request.header().reply(reply.status_code());
            self.send_reply(request.message(), &header, reply.body()).await
        }
        .instrument(span)
        .await
    }

    /// Answer a message that could not be read with a header-only error
    /// reply.
    ///
    /// # Errors
    ///
    /// As for [`RequestProcessor::handle`].
    pub async fn reject(&self, err: &MessageReadError) -> Result<(), ServerError> {
        tracing::warn!(message_id = err.message().message_id(), error = %err, "rejecting unreadable message");
        metrics::inc_requests("rejected");
        let status = match err.failure() {
            ReadFailure::Acknowledge(_) => StatusCode::FAILURE,
            _ => StatusCode::INVALID_FORMAT,
        };
        let header = err
            .request_id()
            .map_or_else(FwHeader::anonymous, FwHeader::new)
            .with_status_code(status);
        self.send_reply(err.message(), &header, &Bytes::new()).await
    }

    async fn send_reply(&self, request: &RawMessage, header: &FwHeader, body: &Bytes) -> Result<(), ServerError> {
        let Some(reply_to) = request.reply_to() else {
            log::debug!("message {} has no reply queue; reply dropped", request.message_id());
            return Ok(());
        };
        let mut payload = BytesMut::new();
        self.codec.write_header(header, &mut payload)?;
        payload.extend_from_slice(body);
        let reply = OutboundMessage::new(reply_to, payload.freeze())
            .correlation_id(request.correlation_key())
            .time_to_live(self.reply_ttl);
        let id = self.transport.send(reply).await.map_err(ServerError::Reply)?;
        metrics::inc_replies();
        log::debug!("sent reply {id} to {reply_to}");
        Ok(())
    }
}
