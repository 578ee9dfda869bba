//! Tests for request processing and the worker lifecycle.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use rstest::{fixture, rstest};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::{
    action::{Action, ActionError, Router},
    header::{FwHeader, HeaderCodec, HeaderLayout, StatusCode},
    reader::{MessageReader, ReaderConfig},
    record::{BodyCursor, FixedLayout, MemoryFormatRepository, Record, RecordType},
    request::Request,
    resend::ResendCoordinator,
    response::Response,
    store::{MemoryStore, SentMessageTable, Transaction},
    transport::{Fault, MemoryTransport, OutboundMessage, QueueTransport, RawMessage},
};

const REQUESTS: &str = "REQ";
const REPLIES: &str = "REPLY";

struct Echo;

#[async_trait]
impl Action for Echo {
    async fn handle(
        &self,
        record: Option<Record>,
        _request: &mut Request,
        _tx: &mut dyn Transaction,
    ) -> Result<Response, ActionError> {
        Ok(record.into_iter().fold(Response::ok(), Response::with_record))
    }
}

fn formats() -> Arc<MemoryFormatRepository> {
    let line = |name: &str| {
        FixedLayout::builder(name)
            .record_type(RecordType::new("line").text("text", 4))
            .build()
            .expect("layout")
    };
    Arc::new(
        MemoryFormatRepository::new()
            .with(HeaderLayout::standard())
            .with(line("Echo_RECEIVE"))
            .with(line("Echo_SEND")),
    )
}

fn codec() -> HeaderCodec { HeaderCodec::builder(formats()).build().expect("codec") }

#[fixture]
fn transport() -> Arc<MemoryTransport> {
    Arc::new(MemoryTransport::new().with_queue(REQUESTS).with_queue(REPLIES))
}

fn server(transport: &Arc<MemoryTransport>, workers: usize) -> MessagingServer {
    let config = ReaderConfig::builder(REQUESTS)
        .timeout_millis(10)
        .build()
        .expect("reader config");
    let reader = HeaderReader::new(MessageReader::new(transport.clone(), config), codec());
    let router = Router::new().route("Echo", Echo).expect("route");
    let coordinator = ResendCoordinator::new(Arc::new(MemoryStore::new()), SentMessageTable::default());
    let processor = RequestProcessor::new(transport.clone(), Arc::new(codec()), router, coordinator);
    let config = ServerConfig::builder()
        .workers(workers)
        .reply_ttl(Some(Duration::from_secs(30)))
        .build()
        .expect("server config");
    MessagingServer::new(reader, processor, config)
}

async fn request(transport: &MemoryTransport, raw: &str) -> String {
    transport
        .send(OutboundMessage::new(REQUESTS, Bytes::copy_from_slice(raw.as_bytes())).reply_to(REPLIES))
        .await
        .expect("send request")
}

async fn reply(transport: &MemoryTransport, correlation: &str) -> RawMessage {
    transport
        .receive(REPLIES, Some(correlation), Some(Duration::from_secs(5)))
        .await
        .expect("receive")
        .expect("reply before timeout")
}

fn parse(reply: &RawMessage) -> (FwHeader, BodyCursor) {
    let mut body = BodyCursor::new(reply.body().clone());
    let header = codec().parse_reply_header(&mut body).expect("reply header");
    (header, body)
}

#[rstest]
#[tokio::test]
async fn replies_are_correlated_to_the_request(transport: Arc<MemoryTransport>) {
    let token = CancellationToken::new();
    let running = tokio::spawn(server(&transport, 2).run(token.clone()));

    let id = request(&transport, &format!("1{:<20}{:<10}0000ping", "Echo", "alice")).await;
    let reply = reply(&transport, &id).await;
    let (header, body) = parse(&reply);

    assert_eq!(header.status_code(), Some(StatusCode::SUCCESS));
    assert_eq!(header.request_id(), Some("Echo"));
    assert_eq!(header.user_id(), Some("alice"));
    assert_eq!(header.resend_flag(), None);
    assert_eq!(body.peek(), b"ping");
    assert_eq!(reply.time_to_live(), Some(Duration::from_secs(30)));

    token.cancel();
    running.await.expect("join").expect("clean shutdown");
}

#[rstest]
#[tokio::test]
async fn unknown_request_id_is_not_found(transport: Arc<MemoryTransport>) {
    let token = CancellationToken::new();
    let running = tokio::spawn(server(&transport, 1).run(token.clone()));

    let id = request(&transport, &format!("0{:<20}0000", "Missing")).await;
    let (header, body) = parse(&reply(&transport, &id).await);

    assert_eq!(header.status_code(), Some(StatusCode::NOT_FOUND));
    assert_eq!(header.request_id(), Some("Missing"));
    assert!(body.is_empty());

    token.cancel();
    running.await.expect("join").expect("clean shutdown");
}

#[rstest]
#[tokio::test]
async fn unreadable_message_gets_format_error_reply(transport: Arc<MemoryTransport>) {
    let token = CancellationToken::new();
    let running = tokio::spawn(server(&transport, 1).run(token.clone()));

    let id = request(&transport, "1Echo").await;
    let (header, _) = parse(&reply(&transport, &id).await);
    assert_eq!(header.status_code(), Some(StatusCode::INVALID_FORMAT));
    assert_eq!(header.request_id(), None);

    let id = request(&transport, &format!("0{:<20}0000pingpong", "Echo")).await;
    let (header, _) = parse(&reply(&transport, &id).await);
    assert_eq!(header.status_code(), Some(StatusCode::INVALID_FORMAT));

    token.cancel();
    running.await.expect("join").expect("clean shutdown");
}

#[rstest]
#[tokio::test]
async fn fatal_read_error_stops_every_worker(transport: Arc<MemoryTransport>) {
    let token = CancellationToken::new();
    transport.inject_fault(Fault::Receive);

    let result = tokio::time::timeout(Duration::from_secs(5), server(&transport, 3).run(token.clone()))
        .await
        .expect("server stops on its own");

    assert!(matches!(result, Err(ServerError::Read(err)) if err.is_fatal()));
    assert!(token.is_cancelled());
}

#[rstest]
#[tokio::test]
async fn closing_the_reader_stops_the_server(transport: Arc<MemoryTransport>) {
    let token = CancellationToken::new();
    let server = server(&transport, 2);
    let reader = Arc::clone(server.reader());
    let running = tokio::spawn(server.run(token.clone()));

    tokio::time::sleep(Duration::from_millis(20)).await;
    reader.close();

    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("server stops once the reader is closed")
        .expect("join")
        .expect("clean shutdown");
    assert!(!token.is_cancelled());
}

#[rstest]
fn server_needs_a_worker() {
    assert!(ServerConfig::builder().workers(0).build().is_err());
    assert_eq!(ServerConfig::default().workers(), 1);
}
