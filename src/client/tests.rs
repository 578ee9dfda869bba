//! Tests for the synchronous messenger.

use std::{sync::Arc, time::Duration};

use bytes::BytesMut;
use rstest::{fixture, rstest};
use tokio::task::JoinHandle;

use super::*;
use crate::{
    error::ConfigError,
    header::HeaderLayout,
    record::{FixedLayout, MemoryFormatRepository, RecordType},
    transport::MemoryTransport,
};

const REQUESTS: &str = "REQ";
const REPLIES: &str = "REPLY";

fn formats() -> Arc<MemoryFormatRepository> {
    let layout = |name: &str| {
        FixedLayout::builder(name)
            .record_type(RecordType::new("line").text("text", 4))
            .build()
            .expect("layout")
    };
    Arc::new(
        MemoryFormatRepository::new()
            .with(HeaderLayout::standard())
            .with(layout("Echo_RECEIVE"))
            .with(layout("Echo_SEND")),
    )
}

fn codec() -> Arc<HeaderCodec> { Arc::new(HeaderCodec::builder(formats()).build().expect("codec")) }

#[fixture]
fn transport() -> Arc<MemoryTransport> {
    Arc::new(MemoryTransport::new().with_queue(REQUESTS).with_queue(REPLIES))
}

fn settings() -> SendSettingsBuilder { SendSettings::builder(REQUESTS, REPLIES).timeout_millis(100) }

fn line(text: &str) -> Record { Record::new().with("text", text) }

/// Reads `count` requests and echoes the last one back with status 200.
fn responder(transport: &Arc<MemoryTransport>, count: usize) -> JoinHandle<Vec<(FwHeader, RawMessage)>> {
    let transport = Arc::clone(transport);
    tokio::spawn(async move {
        let codec = codec();
        let mut seen = Vec::new();
        for _ in 0..count {
            let message = transport
                .receive(REQUESTS, None, None)
                .await
                .expect("receive")
                .expect("request");
            let mut body = BodyCursor::new(message.body().clone());
            let header = codec.parse_header(&mut body).expect("request header");
            seen.push((header, message));
        }
        if let Some((header, message)) = seen.last() {
            let mut payload = BytesMut::new();
            codec
                .write_header(&header.reply(StatusCode::SUCCESS), &mut payload)
                .expect("reply header");
            let mut body = BodyCursor::new(message.body().clone());
            codec.parse_header(&mut body).expect("request header");
            payload.extend_from_slice(body.peek());
            let reply = OutboundMessage::new(REPLIES, payload.freeze())
                .correlation_id(message.correlation_key());
            transport.send(reply).await.expect("send reply");
        }
        seen
    })
}

#[rstest]
#[tokio::test]
async fn reply_is_decoded_with_send_layout(transport: Arc<MemoryTransport>) {
    let server = responder(&transport, 1);
    let messenger = SyncMessenger::new(transport.clone(), codec());
    let request = SyncRequest::new("Echo").with_user_id("alice").with_record(line("ping"));

    let reply = messenger
        .send_sync(&settings().build().expect("settings"), &request)
        .await
        .expect("reply");

    assert_eq!(reply.status_code(), Some(StatusCode::SUCCESS));
    assert_eq!(reply.header().user_id(), Some("alice"));
    assert_eq!(reply.records().len(), 1);
    assert_eq!(reply.records()[0].get("text"), Some("ping"));
    assert_eq!(reply.attempts(), 1);

    let seen = server.await.expect("join");
    let (header, message) = &seen[0];
    assert_eq!(header.resend_flag(), Some(ResendFlag::FirstSend));
    assert_eq!(message.reply_to(), Some(REPLIES));
    assert_eq!(message.correlation_id(), Some("00000000000000000001"));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn timeout_resends_with_same_correlation_id(transport: Arc<MemoryTransport>) {
    let server = responder(&transport, 2);
    let messenger = SyncMessenger::new(transport.clone(), codec());
    let settings = settings().retries(1).build().expect("settings");

    let reply = messenger
        .send_sync(&settings, &SyncRequest::new("Echo").with_record(line("ping")))
        .await
        .expect("reply to resend");
    assert_eq!(reply.attempts(), 2);

    let seen = server.await.expect("join");
    let flags: Vec<_> = seen.iter().map(|(h, _)| h.resend_flag()).collect();
    assert_eq!(flags, [Some(ResendFlag::FirstSend), Some(ResendFlag::Resend)]);
    assert_eq!(seen[0].1.correlation_id(), seen[1].1.correlation_id());
    assert_ne!(seen[0].1.message_id(), seen[1].1.message_id());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn late_replies_to_earlier_attempts_are_discarded(transport: Arc<MemoryTransport>) {
    let server = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move {
            let codec = codec();
            for _ in 0..2 {
                let message = transport
                    .receive(REQUESTS, None, None)
                    .await
                    .expect("receive")
                    .expect("request");
                let mut body = BodyCursor::new(message.body().clone());
                let header = codec.parse_header(&mut body).expect("request header");
                if header.resend_flag() == Some(ResendFlag::Resend) {
                    for _ in 0..2 {
                        let mut payload = BytesMut::new();
                        codec
                            .write_header(&header.reply(StatusCode::SUCCESS), &mut payload)
                            .expect("reply header");
                        let reply = OutboundMessage::new(REPLIES, payload.freeze())
                            .correlation_id(message.correlation_key());
                        transport.send(reply).await.expect("send reply");
                    }
                }
            }
        })
    };
    let messenger = SyncMessenger::new(transport.clone(), codec());
    let settings = settings().retries(1).build().expect("settings");

    let reply = messenger
        .send_sync(&settings, &SyncRequest::new("Echo"))
        .await
        .expect("reply to resend");
    server.await.expect("join");

    assert_eq!(reply.attempts(), 2);
    assert_eq!(transport.depth(REPLIES), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn retries_exhausted_is_a_timeout(transport: Arc<MemoryTransport>) {
    let messenger = SyncMessenger::new(transport.clone(), codec());
    let settings = settings().retries(2).build().expect("settings");

    let err = messenger
        .send_sync(&settings, &SyncRequest::new("Echo"))
        .await
        .expect_err("nobody answers");

    assert!(matches!(err, ClientError::Timeout { attempts: 3, .. }));
    assert_eq!(transport.depth(REQUESTS), 3);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn no_resend_without_resend_control(transport: Arc<MemoryTransport>) {
    let messenger = SyncMessenger::new(transport.clone(), codec());
    let settings = settings().retries(5).resend_control(false).build().expect("settings");

    let err = messenger
        .send_sync(&settings, &SyncRequest::new("Echo"))
        .await
        .expect_err("nobody answers");
    assert!(matches!(err, ClientError::Timeout { attempts: 1, .. }));

    let sent = transport
        .receive(REQUESTS, None, Some(Duration::from_millis(1)))
        .await
        .expect("receive")
        .expect("request");
    let header = codec()
        .parse_header(&mut BodyCursor::new(sent.body().clone()))
        .expect("header");
    assert_eq!(header.resend_flag(), None);
}

#[rstest]
#[tokio::test]
async fn records_need_a_receive_layout(transport: Arc<MemoryTransport>) {
    let messenger = SyncMessenger::new(transport.clone(), codec());
    let request = SyncRequest::new("Unknown").with_record(line("ping"));

    let err = messenger
        .send_sync(&settings().build().expect("settings"), &request)
        .await
        .expect_err("no layout");

    assert!(matches!(err, ClientError::Format(FormatError::NoLayout(_))));
    assert_eq!(transport.depth(REQUESTS), 0);
}

#[rstest]
fn sequence_is_per_target() {
    let ids = SequenceIdGenerator::new();
    assert_eq!(ids.generate("A"), 1);
    assert_eq!(ids.generate("B"), 1);
    assert_eq!(ids.generate("A"), 2);
}

#[rstest]
#[case(ZeroPadFormatter::new(5), 42, "00042")]
#[case(ZeroPadFormatter::new(2), 12345, "12345")]
#[case(ZeroPadFormatter::default(), 7, "00000000000000000007")]
fn zero_padding(#[case] format: ZeroPadFormatter, #[case] id: u64, #[case] expected: &str) {
    assert_eq!(format.format(id), expected);
}

#[rstest]
#[case(SendSettings::builder("", REPLIES), "destination")]
#[case(SendSettings::builder(REQUESTS, " "), "reply")]
fn blank_queue_names_are_rejected(#[case] builder: SendSettingsBuilder, #[case] which: &str) {
    assert!(matches!(builder.build(), Err(ConfigError::EmptyQueueName(name)) if name == which));
}

#[rstest]
fn settings_defaults() {
    let settings = SendSettings::builder(REQUESTS, REPLIES)
        .generator_target("ORDERS")
        .build()
        .expect("settings");
    assert_eq!(settings.timeout(), Some(Duration::from_millis(5000)));
    assert_eq!(settings.retries(), 0);
    assert!(settings.resend_control());
    assert_eq!(settings.generator_target(), "ORDERS");
    assert!(SendSettings::builder(REQUESTS, REPLIES).timeout_millis(0).build().expect("settings").timeout().is_none());
    assert!(SendSettings::builder(REQUESTS, REPLIES).generator_target("").build().is_err());
}

