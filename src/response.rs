//! Replies produced by actions or replayed from the sent-message table.
//!
//! A `Response` carries the status code for the reply header and a body that
//! is either a list of records still to be encoded with the reply layout or
//! bytes that were encoded earlier and must be sent unchanged.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::{
    header::StatusCode,
    record::{FormatError, Record, RecordFormatter},
};

/// Body of a [`Response`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Body {
    /// Records to encode with the reply layout.
    Records(Vec<Record>),
    /// Already encoded body bytes.
    Encoded(Bytes),
}

/// The single reply to a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    body: Body,
}

impl Default for Response {
    fn default() -> Self { Self::ok() }
}

impl Response {
    /// Successful reply with an empty body.
    #[must_use]
    pub fn ok() -> Self { Self::with_status(StatusCode::SUCCESS) }

    /// Reply with `status` and an empty body.
    #[must_use]
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            body: Body::Records(Vec::new()),
        }
    }

    /// Reply whose body was encoded earlier.
    #[must_use]
    pub fn encoded(status: StatusCode, body: Bytes) -> Self {
        Self {
            status,
            body: Body::Encoded(body),
        }
    }

    #[must_use]
    pub fn with_record(mut self, record: Record) -> Self {
        self.push_record(record);
        self
    }

    /// Append a record to the body.
    ///
    /// An encoded body is replaced by a record list.
    pub fn push_record(&mut self, record: Record) {
        match &mut self.body {
            Body::Records(records) => records.push(record),
            Body::Encoded(_) => self.body = Body::Records(vec![record]),
        }
    }

    /// Records still to be encoded; empty for an encoded body.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        match &self.body {
            Body::Records(records) => records,
            Body::Encoded(_) => &[],
        }
    }

    #[must_use]
    pub fn body(&self) -> &Body { &self.body }

    #[must_use]
    pub fn status_code(&self) -> StatusCode { self.status }

    pub fn set_status_code(&mut self, status: StatusCode) { self.status = status; }

    /// Encode the body with `formatter`.
    ///
    /// An empty record list encodes to no bytes and needs no layout.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::NoLayout`] when records are present but no reply
    /// layout was bound, or the error raised while writing a record.
    pub fn encode_body(&self, formatter: Option<&Arc<dyn RecordFormatter>>) -> Result<Bytes, FormatError> {
        let records = match &self.body {
            Body::Encoded(bytes) => return Ok(bytes.clone()),
            Body::Records(records) if records.is_empty() => return Ok(Bytes::new()),
            Body::Records(records) => records,
        };
        let formatter = formatter.ok_or_else(|| FormatError::NoLayout("reply body".to_owned()))?;
        let mut dst = BytesMut::new();
        for record in records {
            formatter.write_record(record, &mut dst)?;
        }
        Ok(dst.freeze())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::record::{FixedLayout, RecordType};

    fn summary() -> Arc<dyn RecordFormatter> {
        Arc::new(
            FixedLayout::builder("Count_SEND")
                .record_type(RecordType::new("summary").number("count", 3))
                .build()
                .expect("layout"),
        )
    }

    #[rstest]
    fn encodes_records_with_reply_layout() {
        let response = Response::ok().with_record(Record::new().with("count", "7"));
        let body = response.encode_body(Some(&summary())).expect("encode");
        assert_eq!(body.as_ref(), b"007");
    }

    #[rstest]
    fn empty_body_needs_no_layout() {
        let body = Response::with_status(StatusCode::FAILURE)
            .encode_body(None)
            .expect("nothing to encode");
        assert!(body.is_empty());
    }

    #[rstest]
    fn records_without_layout_fail() {
        let response = Response::ok().with_record(Record::new().with("count", "1"));
        assert!(matches!(response.encode_body(None), Err(FormatError::NoLayout(_))));
    }

    #[rstest]
    fn encoded_body_is_returned_verbatim() {
        let response = Response::encoded(StatusCode::SUCCESS, Bytes::from_static(b"002"));
        assert_eq!(response.encode_body(None).expect("verbatim").as_ref(), b"002");
        assert!(response.records().is_empty());
    }
}
