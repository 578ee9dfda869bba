//! Unit tests for [`Request`] body access.

use std::sync::Arc;

use bytes::Bytes;
use rstest::rstest;

use super::*;
use crate::record::{FixedLayout, RecordType};

fn layout() -> Arc<dyn RecordFormatter> {
    Arc::new(
        FixedLayout::builder("Echo_RECEIVE")
            .record_type(RecordType::new("line").text("text", 4))
            .build()
            .expect("layout"),
    )
}

fn request(body: &'static [u8], formatter: Option<Arc<dyn RecordFormatter>>) -> Request {
    let message = RawMessage::new("ID:1", "Q", Bytes::from_static(body));
    Request::new(
        message,
        FwHeader::new("Echo"),
        BodyCursor::new(Bytes::from_static(body)),
        formatter,
        None,
    )
    .expect("request id present")
}

#[rstest]
fn read_records_consumes_body_and_retains_records() {
    let mut req = request(b"abcdefgh", Some(layout()));
    let records = req.read_records().expect("decode");

    assert_eq!(records.len(), 2);
    assert_eq!(req.records(), records.as_slice());
    assert!(!req.has_remaining());
}

#[rstest]
fn reading_without_layout_fails() {
    let mut req = request(b"abcd", None);
    assert!(matches!(req.read_record(), Err(FormatError::NoLayout(_))));
}

#[rstest]
fn snapshot_reads_independently() {
    let mut req = request(b"abcdefgh", Some(layout()));
    let mut snapshot = req.snapshot();

    let first = snapshot.read_record().expect("decode").expect("record");
    assert_eq!(first.get("text"), Some("abcd"));
    assert!(req.records().is_empty());
    assert_eq!(req.body().remaining(), 8);

    let again = req.read_record().expect("decode").expect("record");
    assert_eq!(again, first);
}

#[rstest]
fn request_requires_request_id() {
    let message = RawMessage::new("ID:1", "Q", Bytes::new());
    let result = Request::new(
        message,
        FwHeader::anonymous(),
        BodyCursor::new(Bytes::new()),
        None,
        None,
    );
    assert!(matches!(result, Err(HeaderFormatError::MissingRequestId)));
}
