//! Framework control header carried as the first record of every message.
//!
//! [`FwHeader`] holds header fields under their internal names. The
//! [`HeaderCodec`] translates between those names and the wire fields of the
//! header layout, choosing the header shape from a classifier field before the
//! rest of the record is decoded.

mod codec;

use std::fmt;

use thiserror::Error;

pub use codec::{DEFAULT_HEADER_LAYOUT, Discriminator, FieldMapping, HeaderCodec, HeaderCodecBuilder, HeaderLayout};

use crate::record::{FormatError, Record};

/// Internal name of the request id field.
pub const REQUEST_ID: &str = "requestId";
/// Internal name of the user id field.
pub const USER_ID: &str = "userId";
/// Internal name of the resend flag field.
pub const RESEND_FLAG: &str = "resendFlag";
/// Internal name of the status code field.
pub const STATUS_CODE: &str = "statusCode";

/// Every internal header field name, in wire order.
pub const HEADER_FIELDS: [&str; 4] = [REQUEST_ID, USER_ID, RESEND_FLAG, STATUS_CODE];

/// Numeric result code set on replies.
///
/// # Examples
///
/// ```
/// use mqframe::header::StatusCode;
///
/// let code: StatusCode = "200".parse().expect("numeric");
/// assert_eq!(code, StatusCode::SUCCESS);
/// assert!(code.is_success());
/// assert!("2x0".parse::<StatusCode>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    /// The request completed normally.
    pub const SUCCESS: StatusCode = StatusCode(200);
    /// The message could not be decoded.
    pub const INVALID_FORMAT: StatusCode = StatusCode(400);
    /// No action is registered for the request id.
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    /// The business transaction failed.
    pub const FAILURE: StatusCode = StatusCode(500);

    /// Largest code the three-digit `statusCode` field carries.
    pub const MAX: u16 = 999;

    /// `None` when `code` does not fit in three digits.
    #[must_use]
    pub const fn new(code: u16) -> Option<Self> {
        if code > Self::MAX { None } else { Some(Self(code)) }
    }

    #[must_use]
    pub const fn as_u16(self) -> u16 { self.0 }

    #[must_use]
    pub const fn is_success(self) -> bool { self.0 >= 200 && self.0 < 300 }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl std::str::FromStr for StatusCode {
    type Err = HeaderFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HeaderFormatError::InvalidStatusCode(s.to_owned()));
        }
        s.parse::<u16>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| HeaderFormatError::InvalidStatusCode(s.to_owned()))
    }
}

/// Client-supplied resend control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResendFlag {
    /// `"0"`: the first send of a logical request.
    FirstSend,
    /// `"1"`: a resend of a request whose reply may have been lost.
    Resend,
}

impl ResendFlag {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ResendFlag::FirstSend => "0",
            ResendFlag::Resend => "1",
        }
    }

    /// Parse a wire value. Blank means no resend control.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderFormatError::InvalidResendFlag`] for any value other
    /// than `"0"`, `"1"` or blank.
    pub fn parse(value: &str) -> Result<Option<Self>, HeaderFormatError> {
        match value.trim() {
            "" => Ok(None),
            "0" => Ok(Some(ResendFlag::FirstSend)),
            "1" => Ok(Some(ResendFlag::Resend)),
            other => Err(HeaderFormatError::InvalidResendFlag(other.to_owned())),
        }
    }
}

/// Header shape selected by the classifier field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderShape {
    /// The header carries a user id.
    WithUser {
        /// The user on whose behalf the request runs.
        user_id: String,
    },
    /// The header has no user id column.
    WithoutUser,
}

/// Errors raised while parsing or writing the framework header.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderFormatError {
    /// The header layout could not be resolved.
    #[error("header layout {0} is not available")]
    MissingLayout(String),
    /// The message body is empty.
    #[error("message body holds no header record")]
    MissingRecord,
    /// The header record could not be decoded or encoded.
    #[error("invalid header record: {0}")]
    Format(#[from] FormatError),
    /// The header has no request id or it is blank.
    #[error("header has no request id")]
    MissingRequestId,
    /// The resend flag is neither `"0"` nor `"1"`.
    #[error("invalid resend flag {0:?}")]
    InvalidResendFlag(String),
    /// The status code is not numeric.
    #[error("invalid status code {0:?}")]
    InvalidStatusCode(String),
}

/// Ordered header fields keyed by internal name.
///
/// A header parsed from an inbound message always has a non-empty request id.
/// Headers built for replies may omit it when the inbound header could not be
/// read.
///
/// # Examples
///
/// ```
/// use mqframe::header::{FwHeader, HeaderShape, ResendFlag, StatusCode};
///
/// let header = FwHeader::new("RegisterBook")
///     .with_user_id("alice")
///     .with_resend_flag(Some(ResendFlag::FirstSend));
/// assert_eq!(header.request_id(), Some("RegisterBook"));
/// assert_eq!(header.shape(), HeaderShape::WithUser { user_id: "alice".into() });
///
/// let reply = header.reply(StatusCode::SUCCESS);
/// assert_eq!(reply.status_code(), Some(StatusCode::SUCCESS));
/// assert_eq!(reply.resend_flag(), None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FwHeader {
    fields: Record,
}

impl FwHeader {
    /// Create a header for `request_id`.
    #[must_use]
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            fields: Record::new().with(REQUEST_ID, request_id),
        }
    }

    /// Header without a request id, used for replies to unreadable messages.
    #[must_use]
    pub fn anonymous() -> Self { Self::default() }

    /// Validate fields decoded from the wire.
    pub(crate) fn from_fields(fields: Record) -> Result<Self, HeaderFormatError> {
        match fields.get(REQUEST_ID) {
            Some(id) if !id.trim().is_empty() => {}
            _ => return Err(HeaderFormatError::MissingRequestId),
        }
        Self::from_reply_fields(fields)
    }

    /// As [`FwHeader::from_fields`] but the request id may be absent.
    pub(crate) fn from_reply_fields(fields: Record) -> Result<Self, HeaderFormatError> {
        if let Some(flag) = fields.get(RESEND_FLAG) {
            ResendFlag::parse(flag)?;
        }
        if let Some(code) = fields.get(STATUS_CODE) {
            code.parse::<StatusCode>()?;
        }
        Ok(Self { fields })
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.fields.insert(USER_ID, user_id);
        self
    }

    #[must_use]
    pub fn with_resend_flag(mut self, flag: Option<ResendFlag>) -> Self {
        match flag {
            Some(flag) => {
                self.fields.insert(RESEND_FLAG, flag.as_str());
            }
            None => {
                self.fields.remove(RESEND_FLAG);
            }
        }
        self
    }

    #[must_use]
    pub fn with_status_code(mut self, code: StatusCode) -> Self {
        self.fields.insert(STATUS_CODE, code.to_string());
        self
    }

    /// Derive the reply header: request id and user id are copied, the
    /// status code is set and the resend flag is dropped.
    #[must_use]
    pub fn reply(&self, code: StatusCode) -> Self {
        let mut reply = FwHeader::default();
        for name in [REQUEST_ID, USER_ID] {
            if let Some(value) = self.fields.get(name) {
                reply.fields.insert(name, value);
            }
        }
        reply.with_status_code(code)
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> { self.fields.get(REQUEST_ID) }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> { self.fields.get(USER_ID) }

    /// Resend control requested by the client.
    ///
    /// Values are validated when the header is parsed, so an unparsable flag
    /// can only come from a header built in code and reads as absent.
    #[must_use]
    pub fn resend_flag(&self) -> Option<ResendFlag> {
        self.fields
            .get(RESEND_FLAG)
            .and_then(|flag| ResendFlag::parse(flag).ok().flatten())
    }

    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        self.fields.get(STATUS_CODE).and_then(|code| code.parse().ok())
    }

    #[must_use]
    pub fn shape(&self) -> HeaderShape {
        match self.user_id() {
            Some(user_id) => HeaderShape::WithUser {
                user_id: user_id.to_owned(),
            },
            None => HeaderShape::WithoutUser,
        }
    }

    /// Look up a field by internal name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> { self.fields.get(name) }

    /// All fields in order, keyed by internal name.
    #[must_use]
    pub fn fields(&self) -> &Record { &self.fields }
}

#[cfg(test)]
mod tests;
