//! The synchronous messenger against a running server.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use mqframe::{
    client::{ClientError, SyncMessenger, SyncRequest},
    header::StatusCode,
    transport::{MemoryTransport, MessageId, OutboundMessage, QueueTransport, RawMessage, TransportError},
};
use mqframe_testing::{Harness, book, summary};
use rstest::rstest;

/// Swallows the first reply it receives, as if it had been lost.
struct LosesFirstReply {
    inner: Arc<MemoryTransport>,
    lost: AtomicBool,
}

#[async_trait]
impl QueueTransport for LosesFirstReply {
    async fn send(&self, message: OutboundMessage) -> Result<MessageId, TransportError> {
        self.inner.send(message).await
    }

    async fn receive(
        &self,
        queue: &str,
        correlation_id: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Option<RawMessage>, TransportError> {
        let received = self.inner.receive(queue, correlation_id, timeout).await?;
        if received.is_some() && !self.lost.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(received)
    }
}

fn registration() -> SyncRequest {
    SyncRequest::new("RegisterBook")
        .with_user_id("librarian")
        .with_record(book("Dune", 412))
        .with_record(book("Hyperion", 482))
        .with_record(summary(2))
}

#[rstest]
#[tokio::test]
async fn send_sync_returns_decoded_reply() {
    let harness = Harness::start(1);
    let settings = harness.settings().build().expect("settings");

    let reply = harness
        .messenger()
        .send_sync(&settings, &registration())
        .await
        .expect("reply");

    assert_eq!(reply.status_code(), Some(StatusCode::SUCCESS));
    assert_eq!(reply.header().user_id(), Some("librarian"));
    assert_eq!(reply.records()[0].get("bookCount"), Some("2"));
    assert_eq!(reply.attempts(), 1);
    assert_eq!(harness.rows(), 2);

    harness.stop().await.expect("clean shutdown");
}

#[rstest]
#[tokio::test]
async fn lost_reply_is_recovered_by_resend() {
    let harness = Harness::start(1);
    let transport = Arc::new(LosesFirstReply {
        inner: harness.transport().clone(),
        lost: AtomicBool::new(false),
    });
    let messenger = SyncMessenger::new(transport, harness.codec().clone());
    let settings = harness.settings().timeout_millis(500).retries(1).build().expect("settings");

    let reply = messenger.send_sync(&settings, &registration()).await.expect("reply");

    assert_eq!(reply.status_code(), Some(StatusCode::SUCCESS));
    assert_eq!(reply.records()[0].get("bookCount"), Some("2"));
    assert_eq!(reply.attempts(), 2);
    assert_eq!(harness.action().runs(), 1);
    assert_eq!(harness.rows(), 2);

    harness.stop().await.expect("clean shutdown");
}

#[rstest]
#[tokio::test]
async fn lost_reply_without_retries_times_out() {
    let harness = Harness::start(1);
    let transport = Arc::new(LosesFirstReply {
        inner: harness.transport().clone(),
        lost: AtomicBool::new(false),
    });
    let messenger = SyncMessenger::new(transport, harness.codec().clone());
    let settings = harness.settings().timeout_millis(200).build().expect("settings");

    let err = messenger
        .send_sync(&settings, &registration())
        .await
        .expect_err("reply lost");

    assert!(matches!(err, ClientError::Timeout { attempts: 1, .. }));
    assert_eq!(harness.rows(), 2);

    harness.stop().await.expect("clean shutdown");
}

#[rstest]
#[tokio::test]
async fn unknown_request_id_is_not_found() {
    let harness = Harness::start(1);
    let settings = harness.settings().build().expect("settings");

    let reply = harness
        .messenger()
        .send_sync(&settings, &SyncRequest::new("Unregistered"))
        .await
        .expect("reply");

    assert_eq!(reply.status_code(), Some(StatusCode::NOT_FOUND));
    assert!(reply.records().is_empty());

    harness.stop().await.expect("clean shutdown");
}
