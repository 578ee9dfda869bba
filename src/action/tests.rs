//! Tests for routing and the single-record read.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use bytes::Bytes;
use rstest::rstest;

use super::*;
use crate::{
    header::FwHeader,
    record::{BodyCursor, FixedLayout, RecordFormatter, RecordType},
    store::{MemoryStore, TransactionalStore},
    transport::RawMessage,
};

#[derive(Default)]
struct Count {
    seen: AtomicUsize,
    manual: bool,
}

#[async_trait]
impl Action for Count {
    fn auto_read(&self) -> bool { !self.manual }

    async fn handle(
        &self,
        record: Option<Record>,
        request: &mut Request,
        _tx: &mut dyn Transaction,
    ) -> Result<Response, ActionError> {
        let records = match record {
            Some(record) => vec![record],
            None => request.read_records()?,
        };
        self.seen.fetch_add(records.len(), Ordering::SeqCst);
        Ok(Response::ok())
    }
}

struct Explode;

#[async_trait]
impl Action for Explode {
    fn auto_read(&self) -> bool { false }

    async fn handle(
        &self,
        _record: Option<Record>,
        _request: &mut Request,
        _tx: &mut dyn Transaction,
    ) -> Result<Response, ActionError> {
        panic!("ledger offline")
    }
}

fn request(body: &'static [u8], with_layout: bool) -> Request {
    let layout: Arc<dyn RecordFormatter> = Arc::new(
        FixedLayout::builder("Count_RECEIVE")
            .record_type(RecordType::new("item").text("name", 3))
            .build()
            .expect("layout"),
    );
    Request::new(
        RawMessage::new("ID:1", "REQ", Bytes::from_static(body)),
        FwHeader::new("Count"),
        BodyCursor::new(Bytes::from_static(body)),
        with_layout.then_some(layout),
        None,
    )
    .expect("request")
}

async fn run(action: &dyn Action, request: &mut Request) -> Result<Response, ActionError> {
    let store = MemoryStore::new();
    let mut tx = store.begin().await.expect("begin");
    ActionRunner.run(action, request, tx.as_mut()).await
}

#[rstest]
#[tokio::test]
async fn auto_read_passes_the_single_record() {
    let action = Count::default();
    run(&action, &mut request(b"abc", true)).await.expect("one record");
    assert_eq!(action.seen.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test]
async fn auto_read_rejects_a_second_record() {
    let action = Count::default();
    let err = run(&action, &mut request(b"abcdef", true))
        .await
        .expect_err("two records");
    assert!(matches!(err, ActionError::InvalidDataFormat(_)));
    assert_eq!(err.status_code(), StatusCode::INVALID_FORMAT);
    assert_eq!(action.seen.load(Ordering::SeqCst), 0);
}

#[rstest]
#[case(b"", true)]
#[case(b"abc", false)]
#[tokio::test]
async fn missing_record_reaches_the_handler_as_none(#[case] body: &'static [u8], #[case] with_layout: bool) {
    let action = Count::default();
    let mut req = request(body, with_layout);
    let result = run(&action, &mut req).await;
    if with_layout {
        result.expect("empty body");
    } else {
        assert!(matches!(result, Err(ActionError::Format(FormatError::NoLayout(_)))));
    }
}

#[rstest]
#[tokio::test]
async fn manual_read_accepts_many_records() {
    let action = Count {
        manual: true,
        ..Count::default()
    };
    run(&action, &mut request(b"abcdefghi", true)).await.expect("three records");
    assert_eq!(action.seen.load(Ordering::SeqCst), 3);
}

#[rstest]
#[tokio::test]
async fn action_panic_becomes_an_error() {
    let err = run(&Explode, &mut request(b"", true)).await.expect_err("panic caught");
    assert!(matches!(&err, ActionError::Panic(text) if text == "ledger offline"));
    assert_eq!(err.status_code(), StatusCode::FAILURE);
}

#[rstest]
fn router_rejects_duplicates_and_empty_ids() {
    let router = Router::new().route("Count", Count::default()).expect("first route");
    assert!(matches!(
        router.clone().route("Count", Count::default()),
        Err(ConfigError::DuplicateRoute(id)) if id == "Count"
    ));
    assert!(matches!(router.clone().route("", Explode), Err(ConfigError::EmptyRequestId)));

    assert!(router.get("Count").is_some());
    assert!(router.get("count").is_none());
    assert_eq!(router.len(), 1);
}
