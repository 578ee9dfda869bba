//! A running server with the `RegisterBook` action, over in-memory queues.

use std::{sync::Arc, time::Duration};

use bytes::{Bytes, BytesMut};
use mqframe::{
    action::Router,
    client::{SendSettings, SendSettingsBuilder, SyncMessenger},
    header::{FwHeader, HeaderCodec, ResendFlag},
    reader::{HeaderReader, MessageReader, ReaderConfig},
    record::{BodyCursor, FormatRepository, Record},
    resend::ResendCoordinator,
    server::{MessagingServer, RequestProcessor, ServerConfig, ServerError},
    store::{MemoryStore, SentMessageTable},
    transport::{MemoryTransport, MessageId, OutboundMessage, QueueTransport, RawMessage},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::books::{BOOK_TABLE, RegisterBook, book_formats};

pub const REQUEST_QUEUE: &str = "BOOKS.REQ";
pub const REPLY_QUEUE: &str = "BOOKS.REPLY";

const REQUEST_ID: &str = "RegisterBook";

/// Server plus the handles tests inspect.
pub struct Harness {
    transport: Arc<MemoryTransport>,
    store: MemoryStore,
    action: RegisterBook,
    codec: Arc<HeaderCodec>,
    shutdown: CancellationToken,
    running: JoinHandle<Result<(), ServerError>>,
}

impl Harness {
    /// Spawn a server with `workers` workers on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero or called outside a Tokio runtime.
    #[must_use]
    pub fn start(workers: usize) -> Self { Self::start_with_store(workers, MemoryStore::new()) }

    /// As [`Harness::start`], sharing `store` with the caller.
    ///
    /// # Panics
    ///
    /// As for [`Harness::start`].
    #[must_use]
    pub fn start_with_store(workers: usize, store: MemoryStore) -> Self {
        let transport = Arc::new(MemoryTransport::new().with_queue(REQUEST_QUEUE).with_queue(REPLY_QUEUE));
        let codec = Arc::new(new_codec());
        let action = RegisterBook::new();

        let config = ReaderConfig::builder(REQUEST_QUEUE)
            .timeout_millis(20)
            .build()
            .expect("reader config");
        let reader = HeaderReader::new(MessageReader::new(transport.clone(), config), new_codec());
        let router = Router::new().route(REQUEST_ID, action.clone()).expect("route");
        let coordinator = ResendCoordinator::new(Arc::new(store.clone()), SentMessageTable::default());
        let processor = RequestProcessor::new(transport.clone(), Arc::clone(&codec), router, coordinator);
        let config = ServerConfig::builder().workers(workers).build().expect("server config");

        let shutdown = CancellationToken::new();
        let running = tokio::spawn(MessagingServer::new(reader, processor, config).run(shutdown.clone()));
        Self {
            transport,
            store,
            action,
            codec,
            shutdown,
            running,
        }
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<MemoryTransport> { &self.transport }

    #[must_use]
    pub fn store(&self) -> &MemoryStore { &self.store }

    /// The registered action; its counters are shared with the server.
    #[must_use]
    pub fn action(&self) -> &RegisterBook { &self.action }

    #[must_use]
    pub fn codec(&self) -> &Arc<HeaderCodec> { &self.codec }

    /// Committed book rows.
    #[must_use]
    pub fn rows(&self) -> usize { self.store.len(BOOK_TABLE) }

    /// Committed sent-message rows.
    #[must_use]
    pub fn sent_rows(&self) -> usize { self.store.len(SentMessageTable::default().table()) }

    /// Messenger sending through the harness transport.
    #[must_use]
    pub fn messenger(&self) -> SyncMessenger { SyncMessenger::new(self.transport.clone(), Arc::clone(&self.codec)) }

    /// Send settings aimed at the harness queues.
    pub fn settings(&self) -> SendSettingsBuilder {
        SendSettings::builder(REQUEST_QUEUE, REPLY_QUEUE).timeout_millis(2000)
    }

    /// Encode a `RegisterBook` request body.
    ///
    /// # Panics
    ///
    /// Panics if a record does not fit the request layout.
    #[must_use]
    pub fn encode(&self, flag: Option<ResendFlag>, records: &[Record]) -> Bytes {
        let mut payload = BytesMut::new();
        self.codec
            .write_header(&FwHeader::new(REQUEST_ID).with_resend_flag(flag), &mut payload)
            .expect("request header");
        let layout = self
            .codec
            .formats()
            .find("RegisterBook_RECEIVE")
            .expect("request layout");
        for record in records {
            layout.write_record(record, &mut payload).expect("request record");
        }
        payload.freeze()
    }

    /// Send raw `body` under `correlation_id`, asking for a reply.
    ///
    /// # Panics
    ///
    /// Panics if the send fails.
    pub async fn send_body(&self, correlation_id: &str, body: Bytes) -> MessageId {
        let message = OutboundMessage::new(REQUEST_QUEUE, body)
            .correlation_id(correlation_id)
            .reply_to(REPLY_QUEUE);
        self.transport.send(message).await.expect("send request")
    }

    /// Wait up to five seconds for the reply correlated to `correlation_id`.
    ///
    /// # Panics
    ///
    /// Panics if no reply arrives in time.
    pub async fn reply(&self, correlation_id: &str) -> RawMessage {
        self.transport
            .receive(REPLY_QUEUE, Some(correlation_id), Some(Duration::from_secs(5)))
            .await
            .expect("receive reply")
            .expect("reply before timeout")
    }

    /// Send a `RegisterBook` request and wait for its reply.
    pub async fn exchange(&self, correlation_id: &str, flag: Option<ResendFlag>, records: &[Record]) -> RawMessage {
        self.send_body(correlation_id, self.encode(flag, records)).await;
        self.reply(correlation_id).await
    }

    /// Decode a reply into its header and summary records.
    ///
    /// # Panics
    ///
    /// Panics if the reply cannot be decoded.
    #[must_use]
    pub fn parse(&self, reply: &RawMessage) -> (FwHeader, Vec<Record>) {
        let mut body = BodyCursor::new(reply.body().clone());
        let header = self.codec.parse_reply_header(&mut body).expect("reply header");
        let layout = self
            .codec
            .formats()
            .find("RegisterBook_SEND")
            .expect("reply layout");
        let mut records = Vec::new();
        while let Some(record) = layout.read_record(&mut body).expect("reply record") {
            records.push(record);
        }
        (header, records)
    }

    /// Cancel the server and wait for every worker to stop.
    ///
    /// # Errors
    ///
    /// Returns the server's fatal error, if it stopped on one.
    ///
    /// # Panics
    ///
    /// Panics if the server task itself panicked.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.shutdown.cancel();
        self.running.await.expect("server task")
    }
}

fn new_codec() -> HeaderCodec { HeaderCodec::builder(book_formats()).build().expect("codec") }
