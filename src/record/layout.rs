//! Fixed-length text record layouts.
//!
//! A [`FixedLayout`] describes one or more record types. When several types
//! share a layout, a classifier field located at the same offset in every type
//! is decoded first and selects the type used for the rest of the record.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use super::{BodyCursor, FormatError, Record, RecordFormatter};

/// Encoding applied to a single field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Left aligned, padded with spaces. Trailing spaces are trimmed on read.
    Text,
    /// ASCII digits, right aligned and zero padded.
    Number,
}

/// Name, width and kind of one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    name: String,
    width: usize,
    kind: FieldKind,
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, width: usize, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            width,
            kind,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub const fn width(&self) -> usize { self.width }

    #[must_use]
    pub const fn kind(&self) -> FieldKind { self.kind }

    fn decode(&self, raw: &[u8]) -> Result<String, FormatError> {
        let text = std::str::from_utf8(raw).map_err(|_| FormatError::InvalidText {
            field: self.name.clone(),
        })?;
        match self.kind {
            FieldKind::Text => Ok(text.trim_end_matches(' ').to_owned()),
            FieldKind::Number => {
                let digits = text.trim_matches(' ');
                if !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(FormatError::NotNumeric {
                        field: self.name.clone(),
                        value: text.to_owned(),
                    });
                }
                let trimmed = digits.trim_start_matches('0');
                Ok(if trimmed.is_empty() { "0".to_owned() } else { trimmed.to_owned() })
            }
        }
    }

    fn encode(&self, value: &str, dst: &mut BytesMut) -> Result<(), FormatError> {
        if value.len() > self.width {
            return Err(FormatError::Overflow {
                field: self.name.clone(),
                width: self.width,
            });
        }
        let pad = self.width - value.len();
        match self.kind {
            FieldKind::Text => {
                dst.put_slice(value.as_bytes());
                dst.put_bytes(b' ', pad);
            }
            FieldKind::Number => {
                if !value.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(FormatError::NotNumeric {
                        field: self.name.clone(),
                        value: value.to_owned(),
                    });
                }
                dst.put_bytes(b'0', pad);
                dst.put_slice(value.as_bytes());
            }
        }
        Ok(())
    }
}

/// One record shape within a layout.
///
/// # Examples
///
/// ```
/// use mqframe::record::RecordType;
///
/// let book = RecordType::new("book")
///     .when("1")
///     .text("recordKind", 1)
///     .text("title", 20)
///     .number("pages", 4);
/// assert_eq!(book.length(), 25);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordType {
    name: String,
    classifier_value: Option<String>,
    fields: Vec<FieldSpec>,
}

impl RecordType {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classifier_value: None,
            fields: Vec::new(),
        }
    }

    /// Select this type when the classifier field holds `value`.
    ///
    /// A type without a classifier value is the layout fallback.
    #[must_use]
    pub fn when(mut self, value: impl Into<String>) -> Self {
        self.classifier_value = Some(value.into());
        self
    }

    /// Append a text field.
    #[must_use]
    pub fn text(self, name: impl Into<String>, width: usize) -> Self {
        self.field(FieldSpec::new(name, width, FieldKind::Text))
    }

    /// Append a numeric field.
    #[must_use]
    pub fn number(self, name: impl Into<String>, width: usize) -> Self {
        self.field(FieldSpec::new(name, width, FieldKind::Number))
    }

    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    #[must_use]
    pub fn classifier_value(&self) -> Option<&str> { self.classifier_value.as_deref() }

    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] { &self.fields }

    /// Encoded record length in bytes.
    #[must_use]
    pub fn length(&self) -> usize { self.fields.iter().map(FieldSpec::width).sum() }

    fn offset_of(&self, field: &str) -> Option<(usize, &FieldSpec)> {
        let mut offset = 0;
        for spec in &self.fields {
            if spec.name == field {
                return Some((offset, spec));
            }
            offset += spec.width;
        }
        None
    }
}

/// Errors detected while assembling a [`FixedLayout`].
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// The layout defines no record types.
    #[error("layout {0} defines no record types")]
    Empty(String),
    /// Several record types were given but no classifier field.
    #[error("layout {0} has several record types but no classifier")]
    MissingClassifier(String),
    /// A record type lacks the classifier field.
    #[error("record type {record_type} has no classifier field {field}")]
    ClassifierAbsent {
        /// Offending record type.
        record_type: String,
        /// Classifier field name.
        field: String,
    },
    /// The classifier field sits at different offsets or widths across types.
    #[error("classifier field {field} is misaligned in record type {record_type}")]
    ClassifierMisaligned {
        /// Offending record type.
        record_type: String,
        /// Classifier field name.
        field: String,
    },
    /// More than one record type lacks a classifier value.
    #[error("layout {0} has more than one fallback record type")]
    MultipleFallbacks(String),
    /// A field has zero width or appears twice in a record type.
    #[error("invalid field {field} in record type {record_type}")]
    InvalidField {
        /// Offending record type.
        record_type: String,
        /// Offending field.
        field: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Classifier {
    field: String,
    offset: usize,
    width: usize,
}

/// Fixed-length text layout implementing [`RecordFormatter`].
///
/// # Examples
///
/// ```
/// use bytes::{Bytes, BytesMut};
/// use mqframe::record::{BodyCursor, FixedLayout, Record, RecordFormatter, RecordType};
///
/// let layout = FixedLayout::builder("Ping_RECEIVE")
///     .record_type(RecordType::new("ping").text("name", 8).number("count", 3))
///     .build()
///     .expect("valid layout");
///
/// let mut buf = BytesMut::new();
/// layout
///     .write_record(&Record::new().with("name", "alpha").with("count", "7"), &mut buf)
///     .expect("encodes");
/// assert_eq!(&buf[..], b"alpha   007");
///
/// let mut cursor = BodyCursor::new(buf.freeze());
/// let record = layout.read_record(&mut cursor).expect("decodes").expect("one record");
/// assert_eq!(record.get("count"), Some("7"));
/// assert!(layout.read_record(&mut cursor).expect("end of stream").is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedLayout {
    name: String,
    classifier: Option<Classifier>,
    types: Vec<RecordType>,
}

/// Builder for [`FixedLayout`].
#[derive(Debug)]
pub struct FixedLayoutBuilder {
    name: String,
    classifier: Option<String>,
    types: Vec<RecordType>,
}

impl FixedLayoutBuilder {
    /// Name the field whose value selects the record type.
    #[must_use]
    pub fn classifier(mut self, field: impl Into<String>) -> Self {
        self.classifier = Some(field.into());
        self
    }

    #[must_use]
    pub fn record_type(mut self, record_type: RecordType) -> Self {
        self.types.push(record_type);
        self
    }

    /// Validate and build the layout.
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] if the record types are inconsistent with
    /// the classifier or with each other.
    pub fn build(self) -> Result<FixedLayout, LayoutError> {
        let Self {
            name,
            classifier,
            types,
        } = self;
        if types.is_empty() {
            return Err(LayoutError::Empty(name));
        }
        for record_type in &types {
            validate_fields(record_type)?;
        }
        let classifier = match classifier {
            Some(field) => Some(locate_classifier(&types, field)?),
            None if types.len() > 1 => return Err(LayoutError::MissingClassifier(name)),
            None => None,
        };
        if types.iter().filter(|t| t.classifier_value.is_none()).count() > 1 {
            return Err(LayoutError::MultipleFallbacks(name));
        }
        Ok(FixedLayout {
            name,
            classifier,
            types,
        })
    }
}

fn validate_fields(record_type: &RecordType) -> Result<(), LayoutError> {
    for (index, spec) in record_type.fields.iter().enumerate() {
        let repeated = record_type.fields[..index].iter().any(|f| f.name == spec.name);
        if spec.width == 0 || repeated {
            return Err(LayoutError::InvalidField {
                record_type: record_type.name.clone(),
                field: spec.name.clone(),
            });
        }
    }
    Ok(())
}

fn locate_classifier(types: &[RecordType], field: String) -> Result<Classifier, LayoutError> {
    let mut located: Option<(usize, usize)> = None;
    for record_type in types {
        let Some((offset, spec)) = record_type.offset_of(&field) else {
            return Err(LayoutError::ClassifierAbsent {
                record_type: record_type.name.clone(),
                field,
            });
        };
        match located {
            Some(position) if position != (offset, spec.width) => {
                return Err(LayoutError::ClassifierMisaligned {
                    record_type: record_type.name.clone(),
                    field,
                });
            }
            _ => located = Some((offset, spec.width)),
        }
    }
    let (offset, width) = located.unwrap_or_default();
    Ok(Classifier {
        field,
        offset,
        width,
    })
}

impl FixedLayout {
    /// Start building a layout registered under `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> FixedLayoutBuilder {
        FixedLayoutBuilder {
            name: name.into(),
            classifier: None,
            types: Vec::new(),
        }
    }

    #[must_use]
    pub fn record_types(&self) -> &[RecordType] { &self.types }

    /// Name of the classifier field, if the layout has one.
    #[must_use]
    pub fn classifier_field(&self) -> Option<&str> { self.classifier.as_ref().map(|c| c.field.as_str()) }

    fn fallback(&self) -> Option<&RecordType> {
        if self.classifier.is_none() {
            return self.types.first();
        }
        self.types.iter().find(|t| t.classifier_value.is_none())
    }

    fn by_classifier_value(&self, value: &str) -> Option<&RecordType> {
        self.types
            .iter()
            .find(|t| t.classifier_value.as_deref() == Some(value))
            .or_else(|| self.fallback())
    }

    /// Select the record type from the classifier bytes alone.
    fn classify(&self, src: &[u8]) -> Result<&RecordType, FormatError> {
        let Some(classifier) = &self.classifier else {
            return self.fallback().ok_or_else(|| self.unknown(""));
        };
        let end = classifier.offset + classifier.width;
        let raw = src.get(classifier.offset..end).ok_or(FormatError::Truncated {
            layout: self.name.clone(),
            have: src.len(),
            need: end,
        })?;
        let value = String::from_utf8_lossy(raw);
        let value = value.trim_end_matches(' ');
        self.by_classifier_value(value).ok_or_else(|| self.unknown(value))
    }

    fn select_for_write(&self, record: &Record) -> Result<&RecordType, FormatError> {
        if let Some(name) = record.record_type() {
            return self.types.iter().find(|t| t.name == name).ok_or_else(|| {
                FormatError::UndefinedRecordType {
                    layout: self.name.clone(),
                    record_type: name.to_owned(),
                }
            });
        }
        match &self.classifier {
            Some(classifier) => {
                let value = record.get(&classifier.field).unwrap_or_default();
                self.by_classifier_value(value).ok_or_else(|| self.unknown(value))
            }
            None => self.fallback().ok_or_else(|| self.unknown("")),
        }
    }

    fn unknown(&self, value: &str) -> FormatError {
        FormatError::UnknownRecordType {
            layout: self.name.clone(),
            value: value.to_owned(),
        }
    }
}

impl RecordFormatter for FixedLayout {
    fn name(&self) -> &str { &self.name }

    fn read_record(&self, cursor: &mut BodyCursor) -> Result<Option<Record>, FormatError> {
        if cursor.is_empty() {
            return Ok(None);
        }
        let record_type = self.classify(cursor.peek())?;
        let need = record_type.length();
        let have = cursor.remaining();
        let raw = cursor.take(need).ok_or_else(|| FormatError::Truncated {
            layout: self.name.clone(),
            have,
            need,
        })?;

        let mut record = Record::typed(record_type.name.clone());
        let mut offset = 0;
        for spec in &record_type.fields {
            let value = spec.decode(&raw[offset..offset + spec.width])?;
            record.insert(spec.name.clone(), value);
            offset += spec.width;
        }
        Ok(Some(record))
    }

    fn write_record(&self, record: &Record, dst: &mut BytesMut) -> Result<(), FormatError> {
        let record_type = self.select_for_write(record)?;
        let classifier = self.classifier.as_ref().map(|c| c.field.as_str());
        dst.reserve(record_type.length());
        for spec in &record_type.fields {
            let value = match record.get(&spec.name) {
                Some(value) => value,
                None if classifier == Some(spec.name.as_str()) => {
                    record_type.classifier_value.as_deref().unwrap_or_default()
                }
                None => "",
            };
            spec.encode(value, dst)?;
        }
        Ok(())
    }
}
