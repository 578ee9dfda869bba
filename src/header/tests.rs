//! Unit tests for header parsing and shape selection.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use rstest::{fixture, rstest};

use super::*;
use crate::record::{BodyCursor, FixedLayout, MemoryFormatRepository, RecordType};

#[expect(
    unused_braces,
    reason = "rustc false positive for single-line rstest fixtures"
)]
#[fixture]
fn codec() -> HeaderCodec { codec_with(MemoryFormatRepository::new().with(HeaderLayout::standard())) }

fn codec_with(formats: MemoryFormatRepository) -> HeaderCodec {
    HeaderCodec::builder(Arc::new(formats)).build().expect("valid codec")
}

fn cursor(raw: &str) -> BodyCursor { BodyCursor::new(Bytes::copy_from_slice(raw.as_bytes())) }

fn pad(value: &str, width: usize) -> String { format!("{value:<width$}") }

#[rstest]
fn with_user_discriminator_selects_user_shape(codec: HeaderCodec) {
    let raw = format!("1{}{}0000", pad("RegisterBook", 20), pad("alice", 10));
    let header = codec.parse_header(&mut cursor(&raw)).expect("parse");

    assert_eq!(header.request_id(), Some("RegisterBook"));
    assert_eq!(header.shape(), HeaderShape::WithUser { user_id: "alice".into() });
    assert_eq!(header.resend_flag(), Some(ResendFlag::FirstSend));
    assert_eq!(header.status_code(), None);
}

#[rstest]
#[case("0")]
#[case(" ")]
#[case("X")]
fn other_discriminator_values_select_plain_shape(codec: HeaderCodec, #[case] flag: &str) {
    let raw = format!("{flag}{}1000", pad("RegisterBook", 20));
    let header = codec.parse_header(&mut cursor(&raw)).expect("parse");

    assert_eq!(header.request_id(), Some("RegisterBook"));
    assert_eq!(header.shape(), HeaderShape::WithoutUser);
    assert_eq!(header.resend_flag(), Some(ResendFlag::Resend));
}

#[rstest]
fn blank_resend_flag_means_no_resend_control(codec: HeaderCodec) {
    let raw = format!("0{} 000", pad("Ping", 20));
    let header = codec.parse_header(&mut cursor(&raw)).expect("parse");
    assert_eq!(header.resend_flag(), None);
}

#[rstest]
fn parse_leaves_body_after_header(codec: HeaderCodec) {
    let raw = format!("0{} 200BODY", pad("Ping", 20));
    let mut body = cursor(&raw);
    let header = codec.parse_header(&mut body).expect("parse");

    assert_eq!(header.status_code(), Some(StatusCode::SUCCESS));
    assert_eq!(body.peek(), b"BODY");
}

#[rstest]
#[case(format!("0{} 000", pad("", 20)), HeaderFormatError::MissingRequestId)]
#[case(format!("0{}7000", pad("Ping", 20)), HeaderFormatError::InvalidResendFlag("7".into()))]
#[case(String::new(), HeaderFormatError::MissingRecord)]
fn invalid_headers_are_rejected(codec: HeaderCodec, #[case] raw: String, #[case] expected: HeaderFormatError) {
    let err = codec.parse_header(&mut cursor(&raw)).expect_err("invalid header");
    assert_eq!(err, expected);
}

#[rstest]
fn truncated_header_is_a_format_error(codec: HeaderCodec) {
    let err = codec.parse_header(&mut cursor("1RegisterBook")).expect_err("truncated");
    assert!(matches!(err, HeaderFormatError::Format(_)));
}

#[rstest]
fn missing_layout_is_reported() {
    let codec = codec_with(MemoryFormatRepository::new());
    let err = codec.parse_header(&mut cursor("anything")).expect_err("no layout");
    assert_eq!(err, HeaderFormatError::MissingLayout("HEADER".into()));
}

#[rstest]
fn written_header_parses_back_with_same_fields(codec: HeaderCodec) {
    let header = FwHeader::new("RegisterBook")
        .with_user_id("alice")
        .with_resend_flag(Some(ResendFlag::Resend))
        .with_status_code(StatusCode::FAILURE);
    let mut buf = BytesMut::new();
    codec.write_header(&header, &mut buf).expect("write");

    let parsed = codec.parse_header(&mut BodyCursor::new(buf.freeze())).expect("parse");
    assert_eq!(parsed, header);
}

#[rstest]
fn write_keys_limit_copied_fields() {
    let formats = Arc::new(MemoryFormatRepository::new().with(HeaderLayout::standard()));
    let codec = HeaderCodec::builder(formats)
        .write_keys([REQUEST_ID, STATUS_CODE])
        .build()
        .expect("valid codec");
    let header = FwHeader::new("Ping")
        .with_resend_flag(Some(ResendFlag::FirstSend))
        .with_status_code(StatusCode::SUCCESS);
    let mut buf = BytesMut::new();
    codec.write_header(&header, &mut buf).expect("write");

    let parsed = codec.parse_header(&mut BodyCursor::new(buf.freeze())).expect("parse");
    assert_eq!(parsed.resend_flag(), None);
    assert_eq!(parsed.status_code(), Some(StatusCode::SUCCESS));
}

#[rstest]
fn mapped_wire_names_translate_to_internal_names() {
    let layout = FixedLayout::builder("HDR")
        .record_type(
            RecordType::new("plain")
                .text("flag", 1)
                .text("RESEND", 1)
                .text("REQ", 12),
        )
        .build()
        .expect("layout");
    let mapping = FieldMapping::identity()
        .map(REQUEST_ID, "REQ")
        .and_then(|m| m.map(RESEND_FLAG, "RESEND"))
        .expect("mapping");
    let codec = HeaderCodec::builder(Arc::new(MemoryFormatRepository::new().with(layout)))
        .layout_name("HDR")
        .mapping(mapping)
        .discriminator(Discriminator::new("flag", "U", "N"))
        .write_keys([REQUEST_ID, RESEND_FLAG])
        .build()
        .expect("codec");

    let header = codec.parse_header(&mut cursor("N1RegisterBook")).expect("parse");
    assert_eq!(header.request_id(), Some("RegisterBook"));
    assert_eq!(header.resend_flag(), Some(ResendFlag::Resend));

    let mut buf = BytesMut::new();
    codec.write_header(&header, &mut buf).expect("write");
    assert_eq!(&buf[..], b"N1RegisterBook");
}

#[rstest]
fn status_code_parse_rejects_non_digits() {
    assert!("".parse::<StatusCode>().is_err());
    assert!("20a".parse::<StatusCode>().is_err());
    assert_eq!("404".parse::<StatusCode>(), Ok(StatusCode::NOT_FOUND));
}

#[rstest]
#[case(999, true)]
#[case(1000, false)]
#[case(u16::MAX, false)]
fn status_codes_must_fit_three_digits(#[case] code: u16, #[case] fits: bool) {
    assert_eq!(StatusCode::new(code).is_some(), fits);
    assert_eq!(code.to_string().parse::<StatusCode>().is_ok(), fits);
}

#[rstest]
fn every_constructible_status_code_is_writable(codec: HeaderCodec) {
    let widest = StatusCode::new(StatusCode::MAX).expect("max fits");
    let mut buf = BytesMut::new();
    codec
        .write_header(&FwHeader::new("Echo").with_status_code(widest), &mut buf)
        .expect("three-digit status writes");
    let parsed = codec.parse_reply_header(&mut BodyCursor::new(buf.freeze())).expect("parse");
    assert_eq!(parsed.status_code(), Some(widest));
}
