//! Structured records and the formatter contract used to read and write them.
//!
//! A message body is a sequence of records, each encoded according to a named
//! layout. [`RecordFormatter`] is the seam between the protocol layer and the
//! concrete wire format; [`FixedLayout`] provides the fixed-length text format
//! used by default. Layouts are looked up by name through a
//! [`FormatRepository`], with names derived from the request id via a
//! [`FormatPattern`].

mod cursor;
mod error;
mod layout;

use std::sync::Arc;

use bytes::BytesMut;
use dashmap::DashMap;

pub use cursor::BodyCursor;
pub use error::FormatError;
pub use layout::{FieldKind, FieldSpec, FixedLayout, FixedLayoutBuilder, LayoutError, RecordType};

/// Placeholder substituted with the request id in a [`FormatPattern`].
pub const REQUEST_ID_PLACEHOLDER: &str = "<requestId>";

/// An ordered mapping of field names to textual values.
///
/// Field order is preserved so records read from the wire keep their layout
/// order. Inserting an existing field replaces its value in place.
///
/// # Examples
///
/// ```
/// use mqframe::record::Record;
///
/// let mut record = Record::new().with("title", "Rust").with("pages", "320");
/// record.insert("title", "Rust in Action");
/// assert_eq!(record.get("title"), Some("Rust in Action"));
/// assert_eq!(record.names().collect::<Vec<_>>(), ["title", "pages"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    record_type: Option<String>,
    fields: Vec<(String, String)>,
}

impl Record {
    /// Create an empty record with no record type.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create an empty record tagged with a layout record type.
    #[must_use]
    pub fn typed(record_type: impl Into<String>) -> Self {
        Self {
            record_type: Some(record_type.into()),
            fields: Vec::new(),
        }
    }

    /// Builder-style variant of [`Record::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        if let Some((_, existing)) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            return Some(std::mem::replace(existing, value));
        }
        self.fields.push((name, value));
        None
    }

    /// Return the value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(index).1)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool { self.get(name).is_some() }

    /// Record type name assigned by the layout that decoded this record.
    #[must_use]
    pub fn record_type(&self) -> Option<&str> { self.record_type.as_deref() }

    pub fn set_record_type(&mut self, record_type: Option<String>) { self.record_type = record_type; }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Iterate over field names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> { self.fields.iter().map(|(n, _)| n.as_str()) }

    #[must_use]
    pub fn len(&self) -> usize { self.fields.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.fields.is_empty() }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

/// Reads and writes records for one named layout.
pub trait RecordFormatter: Send + Sync {
    /// Layout name, used in diagnostics.
    fn name(&self) -> &str;

    /// Decode the next record from `cursor`.
    ///
    /// Returns `Ok(None)` exactly when the cursor has no bytes left.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] when the remaining bytes do not form a valid
    /// record under this layout.
    fn read_record(&self, cursor: &mut BodyCursor) -> Result<Option<Record>, FormatError>;

    /// Encode `record` and append it to `dst`.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] when a value cannot be represented in the
    /// layout.
    fn write_record(&self, record: &Record, dst: &mut BytesMut) -> Result<(), FormatError>;
}

/// Source of named record layouts.
pub trait FormatRepository: Send + Sync {
    /// Look up the formatter registered under `name`.
    ///
    /// Names are matched case-sensitively. `None` means no layout exists.
    fn find(&self, name: &str) -> Option<Arc<dyn RecordFormatter>>;
}

/// In-memory [`FormatRepository`] backed by a concurrent map.
#[derive(Default)]
pub struct MemoryFormatRepository(DashMap<String, Arc<dyn RecordFormatter>>);

impl MemoryFormatRepository {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `formatter` under its own name, replacing any previous entry.
    pub fn register<F: RecordFormatter + 'static>(&self, formatter: F) {
        let name = formatter.name().to_owned();
        self.0.insert(name, Arc::new(formatter));
    }

    /// Builder-style variant of [`MemoryFormatRepository::register`].
    #[must_use]
    pub fn with<F: RecordFormatter + 'static>(self, formatter: F) -> Self {
        self.register(formatter);
        self
    }

    /// Remove the formatter registered under `name`.
    pub fn remove(&self, name: &str) { self.0.remove(name); }
}

impl FormatRepository for MemoryFormatRepository {
    fn find(&self, name: &str) -> Option<Arc<dyn RecordFormatter>> {
        self.0.get(name).map(|entry| Arc::clone(entry.value()))
    }
}

/// Layout name template derived from a request id.
///
/// # Examples
///
/// ```
/// use mqframe::record::FormatPattern;
///
/// assert_eq!(FormatPattern::receive().resolve("RegisterBook"), "RegisterBook_RECEIVE");
/// assert_eq!(FormatPattern::new("in/<requestId>").resolve("Ping"), "in/Ping");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatPattern(String);

impl FormatPattern {
    /// Create a pattern from a template containing [`REQUEST_ID_PLACEHOLDER`].
    ///
    /// A template without the placeholder resolves to the same name for every
    /// request.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self { Self(template.into()) }

    /// Default pattern for request body layouts: `<requestId>_RECEIVE`.
    #[must_use]
    pub fn receive() -> Self { Self::new("<requestId>_RECEIVE") }

    /// Default pattern for reply body layouts: `<requestId>_SEND`.
    #[must_use]
    pub fn send() -> Self { Self::new("<requestId>_SEND") }

    /// Substitute `request_id` into the template.
    #[must_use]
    pub fn resolve(&self, request_id: &str) -> String { self.0.replace(REQUEST_ID_PLACEHOLDER, request_id) }

    #[must_use]
    pub fn template(&self) -> &str { &self.0 }
}
