//! Errors raised while decoding or encoding records.

use thiserror::Error;

/// Failure to read or write a record under a layout.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// No layout is available for the requested side of the exchange.
    #[error("no layout available: {0}")]
    NoLayout(String),

    /// The stream ended part way through a record.
    #[error("truncated record in layout {layout}: have {have} bytes, need {need}")]
    Truncated {
        /// Layout being decoded.
        layout: String,
        /// Bytes left in the stream.
        have: usize,
        /// Bytes required to complete the record.
        need: usize,
    },

    /// The classifier value selects no record type and no fallback exists.
    #[error("no record type in layout {layout} matches classifier value {value:?}")]
    UnknownRecordType {
        /// Layout being decoded or encoded.
        layout: String,
        /// Classifier value found.
        value: String,
    },

    /// A record names a record type the layout does not define.
    #[error("record type {record_type} is not defined in layout {layout}")]
    UndefinedRecordType {
        /// Layout being encoded.
        layout: String,
        /// Record type requested by the record.
        record_type: String,
    },

    /// A value does not fit its field width.
    #[error("value for field {field} exceeds width {width}")]
    Overflow {
        /// Field name.
        field: String,
        /// Field width in bytes.
        width: usize,
    },

    /// A numeric field holds something other than ASCII digits.
    #[error("field {field} is not numeric: {value:?}")]
    NotNumeric {
        /// Field name.
        field: String,
        /// Offending value.
        value: String,
    },

    /// A text field is not valid UTF-8.
    #[error("field {field} is not valid UTF-8")]
    InvalidText {
        /// Field name.
        field: String,
    },
}
