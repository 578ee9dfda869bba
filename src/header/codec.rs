//! Reading and writing the header record.

use std::sync::Arc;

use bytes::BytesMut;

use super::{FwHeader, HEADER_FIELDS, HeaderFormatError, HeaderShape, STATUS_CODE, USER_ID};
use crate::{
    error::ConfigError,
    record::{BodyCursor, FixedLayout, FormatRepository, Record, RecordFormatter, RecordType},
};

/// Default name of the header layout in the format repository.
pub const DEFAULT_HEADER_LAYOUT: &str = "HEADER";

/// Bidirectional mapping between internal header names and wire field names.
///
/// # Examples
///
/// ```
/// use mqframe::header::FieldMapping;
///
/// let mapping = FieldMapping::identity()
///     .map("resendFlag", "RESEND")
///     .expect("unique wire names");
/// assert_eq!(mapping.to_wire("resendFlag"), Some("RESEND"));
/// assert_eq!(mapping.to_internal("RESEND"), Some("resendFlag"));
/// assert_eq!(mapping.to_internal("resendFlag"), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMapping(Vec<(String, String)>);

impl FieldMapping {
    /// Map every internal header field to a wire field of the same name.
    #[must_use]
    pub fn identity() -> Self {
        Self(
            HEADER_FIELDS
                .iter()
                .map(|name| ((*name).to_owned(), (*name).to_owned()))
                .collect(),
        )
    }

    /// Map `internal` to `wire`, replacing any previous mapping for `internal`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateWireName`] when another internal field
    /// already uses `wire`.
    pub fn map(mut self, internal: &str, wire: &str) -> Result<Self, ConfigError> {
        if self.0.iter().any(|(i, w)| w == wire && i != internal) {
            return Err(ConfigError::DuplicateWireName(wire.to_owned()));
        }
        match self.0.iter_mut().find(|(i, _)| i == internal) {
            Some(entry) => entry.1 = wire.to_owned(),
            None => self.0.push((internal.to_owned(), wire.to_owned())),
        }
        Ok(self)
    }

    #[must_use]
    pub fn to_wire(&self, internal: &str) -> Option<&str> {
        self.0.iter().find(|(i, _)| i == internal).map(|(_, w)| w.as_str())
    }

    #[must_use]
    pub fn to_internal(&self, wire: &str) -> Option<&str> {
        self.0.iter().find(|(_, w)| w == wire).map(|(i, _)| i.as_str())
    }
}

impl Default for FieldMapping {
    fn default() -> Self { Self::identity() }
}

/// Classifier field choosing between the with-user and without-user shapes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discriminator {
    field: String,
    with_user: String,
    without_user: String,
}

impl Discriminator {
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        with_user: impl Into<String>,
        without_user: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            with_user: with_user.into(),
            without_user: without_user.into(),
        }
    }

    #[must_use]
    pub fn field(&self) -> &str { &self.field }

    fn selects_user(&self, wire: &Record) -> bool { wire.get(&self.field) == Some(self.with_user.as_str()) }

    fn value_for(&self, header: &FwHeader) -> &str {
        match header.shape() {
            HeaderShape::WithUser { .. } => &self.with_user,
            HeaderShape::WithoutUser => &self.without_user,
        }
    }
}

impl Default for Discriminator {
    fn default() -> Self { Self::new("userFlag", "1", "0") }
}

/// The default header layout.
pub struct HeaderLayout;

impl HeaderLayout {
    /// Two-shape fixed layout: the `userFlag` classifier selects whether a
    /// ten byte `userId` follows the request id.
    ///
    /// ```text
    /// with user:    userFlag(1)="1" requestId(20) userId(10) resendFlag(1) statusCode(3)
    /// without user: userFlag(1)     requestId(20)            resendFlag(1) statusCode(3)
    /// ```
    ///
    /// # Panics
    ///
    /// Panics only if the static definition below is edited into an invalid
    /// layout.
    #[must_use]
    pub fn standard() -> FixedLayout {
        Self::standard_named(DEFAULT_HEADER_LAYOUT).expect("standard header layout is valid")
    }

    /// [`HeaderLayout::standard`] registered under another name.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::record::LayoutError`] from layout validation.
    pub fn standard_named(name: &str) -> Result<FixedLayout, crate::record::LayoutError> {
        FixedLayout::builder(name)
            .classifier("userFlag")
            .record_type(
                RecordType::new("withUser")
                    .when("1")
                    .text("userFlag", 1)
                    .text("requestId", 20)
                    .text("userId", 10)
                    .text("resendFlag", 1)
                    .number("statusCode", 3),
            )
            .record_type(
                RecordType::new("withoutUser")
                    .text("userFlag", 1)
                    .text("requestId", 20)
                    .text("resendFlag", 1)
                    .number("statusCode", 3),
            )
            .build()
    }
}

/// Parses and writes [`FwHeader`]s through the header layout.
pub struct HeaderCodec {
    formats: Arc<dyn FormatRepository>,
    layout_name: String,
    mapping: FieldMapping,
    discriminator: Discriminator,
    write_keys: Vec<String>,
}

/// Builder for [`HeaderCodec`].
pub struct HeaderCodecBuilder {
    formats: Arc<dyn FormatRepository>,
    layout_name: String,
    mapping: FieldMapping,
    discriminator: Discriminator,
    write_keys: Vec<String>,
}

impl HeaderCodecBuilder {
    /// Name of the header layout in the repository (default `HEADER`).
    #[must_use]
    pub fn layout_name(mut self, name: impl Into<String>) -> Self {
        self.layout_name = name.into();
        self
    }

    #[must_use]
    pub fn mapping(mut self, mapping: FieldMapping) -> Self {
        self.mapping = mapping;
        self
    }

    #[must_use]
    pub fn discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = discriminator;
        self
    }

    /// Internal header keys copied into outbound header records.
    #[must_use]
    pub fn write_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.write_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyName`] for a blank layout name and
    /// [`ConfigError::UnmappedHeaderKey`] when a write key has no wire name.
    pub fn build(self) -> Result<HeaderCodec, ConfigError> {
        if self.layout_name.is_empty() {
            return Err(ConfigError::EmptyName("header layout name"));
        }
        if let Some(key) = self.write_keys.iter().find(|k| self.mapping.to_wire(k).is_none()) {
            return Err(ConfigError::UnmappedHeaderKey(key.clone()));
        }
        Ok(HeaderCodec {
            formats: self.formats,
            layout_name: self.layout_name,
            mapping: self.mapping,
            discriminator: self.discriminator,
            write_keys: self.write_keys,
        })
    }
}

impl HeaderCodec {
    /// Start configuring a codec that resolves its layout from `formats`.
    #[must_use]
    pub fn builder(formats: Arc<dyn FormatRepository>) -> HeaderCodecBuilder {
        HeaderCodecBuilder {
            formats,
            layout_name: DEFAULT_HEADER_LAYOUT.to_owned(),
            mapping: FieldMapping::identity(),
            discriminator: Discriminator::default(),
            write_keys: HEADER_FIELDS.iter().map(|k| (*k).to_owned()).collect(),
        }
    }

    #[must_use]
    pub fn layout_name(&self) -> &str { &self.layout_name }

    #[must_use]
    pub fn formats(&self) -> &Arc<dyn FormatRepository> { &self.formats }

    fn layout(&self) -> Result<Arc<dyn RecordFormatter>, HeaderFormatError> {
        self.formats
            .find(&self.layout_name)
            .ok_or_else(|| HeaderFormatError::MissingLayout(self.layout_name.clone()))
    }

    /// Decode the header record at the front of `cursor`.
    ///
    /// The layout resolves the header shape from the classifier field before
    /// decoding the remaining fields. A user id read under the without-user
    /// shape is discarded, and an all-zero status code reads as absent.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderFormatError`] when the layout is missing, the record
    /// cannot be decoded, or the decoded fields are invalid.
    pub fn parse_header(&self, cursor: &mut BodyCursor) -> Result<FwHeader, HeaderFormatError> {
        FwHeader::from_fields(self.decode_fields(cursor)?)
    }

    /// Decode a reply header.
    ///
    /// Unlike [`HeaderCodec::parse_header`] a blank request id is accepted,
    /// since replies to unreadable messages may not know it.
    ///
    /// # Errors
    ///
    /// As for [`HeaderCodec::parse_header`], except for a missing request id.
    pub fn parse_reply_header(&self, cursor: &mut BodyCursor) -> Result<FwHeader, HeaderFormatError> {
        FwHeader::from_reply_fields(self.decode_fields(cursor)?)
    }

    fn decode_fields(&self, cursor: &mut BodyCursor) -> Result<Record, HeaderFormatError> {
        let layout = self.layout()?;
        let wire = layout
            .read_record(cursor)?
            .ok_or(HeaderFormatError::MissingRecord)?;
        let with_user = self.discriminator.selects_user(&wire);

        let mut fields = Record::new();
        for (name, value) in wire.iter() {
            let Some(internal) = self.mapping.to_internal(name) else {
                continue;
            };
            let blank = value.trim().is_empty()
                || (internal == STATUS_CODE && value == "0")
                || (internal == USER_ID && !with_user);
            if !blank {
                fields.insert(internal, value);
            }
        }
        Ok(fields)
    }

    /// Encode `header` as one header record appended to `dst`.
    ///
    /// Only the configured write keys are copied; the classifier field is set
    /// from the header shape.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderFormatError`] when the layout is missing or a value
    /// does not fit the layout.
    pub fn write_header(&self, header: &FwHeader, dst: &mut BytesMut) -> Result<(), HeaderFormatError> {
        let layout = self.layout()?;
        let mut wire = Record::new().with(self.discriminator.field(), self.discriminator.value_for(header));
        for key in &self.write_keys {
            if let (Some(value), Some(wire_name)) = (header.get(key), self.mapping.to_wire(key)) {
                wire.insert(wire_name, value);
            }
        }
        layout.write_record(&wire, dst)?;
        Ok(())
    }
}
