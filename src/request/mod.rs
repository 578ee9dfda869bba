//! Typed inbound request: header, buffered body and the formatters bound to
//! the request id.
//!
//! A [`Request`] is created once per inbound message by
//! [`crate::reader::HeaderReader`], consumed by exactly one action and then
//! dropped.

use std::{fmt, sync::Arc};

use crate::{
    header::{FwHeader, HeaderFormatError, ResendFlag},
    record::{BodyCursor, FormatError, Record, RecordFormatter},
    transport::RawMessage,
};

/// One inbound request.
///
/// Records read through [`Request::read_record`] are also retained and can be
/// inspected later via [`Request::records`].
#[derive(Clone)]
pub struct Request {
    request_id: String,
    message: RawMessage,
    header: FwHeader,
    body: BodyCursor,
    body_formatter: Option<Arc<dyn RecordFormatter>>,
    reply_formatter: Option<Arc<dyn RecordFormatter>>,
    records: Vec<Record>,
}

impl Request {
    /// Assemble a request from a parsed header and the unread body.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderFormatError::MissingRequestId`] when `header` has no
    /// request id.
    pub fn new(
        message: RawMessage,
        header: FwHeader,
        body: BodyCursor,
        body_formatter: Option<Arc<dyn RecordFormatter>>,
        reply_formatter: Option<Arc<dyn RecordFormatter>>,
    ) -> Result<Self, HeaderFormatError> {
        let request_id = header
            .request_id()
            .filter(|id| !id.is_empty())
            .ok_or(HeaderFormatError::MissingRequestId)?
            .to_owned();
        Ok(Self {
            request_id,
            message,
            header,
            body,
            body_formatter,
            reply_formatter,
            records: Vec::new(),
        })
    }

    /// Identifies both the action and the body layouts for this request.
    #[must_use]
    pub fn request_id(&self) -> &str { &self.request_id }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> { self.header.user_id() }

    #[must_use]
    pub fn resend_flag(&self) -> Option<ResendFlag> { self.header.resend_flag() }

    #[must_use]
    pub fn header(&self) -> &FwHeader { &self.header }

    /// Transport metadata of the delivery that carried this request.
    #[must_use]
    pub fn message(&self) -> &RawMessage { &self.message }

    /// Key linking this request to its original send.
    #[must_use]
    pub fn correlation_key(&self) -> &str { self.message.correlation_key() }

    /// Decode the next business record from the body.
    ///
    /// Returns `Ok(None)` once the body is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::NoLayout`] when no body layout exists for this
    /// request id, or the error raised by the layout.
    pub fn read_record(&mut self) -> Result<Option<Record>, FormatError> {
        let formatter = self
            .body_formatter
            .as_ref()
            .ok_or_else(|| FormatError::NoLayout(format!("request body of {}", self.request_id)))?;
        let record = formatter.read_record(&mut self.body)?;
        if let Some(record) = &record {
            self.records.push(record.clone());
        }
        Ok(record)
    }

    /// Decode every remaining record.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised by [`Request::read_record`].
    pub fn read_records(&mut self) -> Result<Vec<Record>, FormatError> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Whether unread body bytes remain.
    #[must_use]
    pub fn has_remaining(&self) -> bool { !self.body.is_empty() }

    /// Records decoded so far, in body order.
    #[must_use]
    pub fn records(&self) -> &[Record] { &self.records }

    #[must_use]
    pub fn body(&self) -> &BodyCursor { &self.body }

    #[must_use]
    pub fn body_formatter(&self) -> Option<&Arc<dyn RecordFormatter>> { self.body_formatter.as_ref() }

    #[must_use]
    pub fn reply_formatter(&self) -> Option<&Arc<dyn RecordFormatter>> { self.reply_formatter.as_ref() }

    /// Independent copy sharing the buffered body but with its own read
    /// position and record list.
    ///
    /// Reading from the snapshot leaves this request untouched, so a second
    /// consumer can parse the body without racing the first.
    #[must_use]
    pub fn snapshot(&self) -> Self { self.clone() }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("request_id", &self.request_id)
            .field("message_id", &self.message.message_id())
            .field("header", &self.header)
            .field("remaining", &self.body.remaining())
            .field("body_formatter", &self.body_formatter.as_ref().map(|f| f.name().to_owned()))
            .field("reply_formatter", &self.reply_formatter.as_ref().map(|f| f.name().to_owned()))
            .field("records", &self.records.len())
            .finish()
    }
}

#[cfg(test)]
mod tests;
