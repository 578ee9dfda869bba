//! Transactional keyed storage used by actions and the resend coordinator.
//!
//! Business side effects and the sent-message record must commit or roll
//! back together, so both go through one [`Transaction`] obtained from a
//! [`TransactionalStore`]. Rows are addressed by table name and a composite
//! [`Key`].

mod memory;
mod sent;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use memory::MemoryStore;
pub use sent::{SentMessageColumns, SentMessageRecord, SentMessageTable};

/// Composite primary key; one value per key column.
pub type Key = Vec<String>;

/// A stored column value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Binary(Bytes),
}

impl Value {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            Value::Binary(_) => None,
        }
    }

    #[must_use]
    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            Value::Binary(bytes) => Some(bytes),
            Value::Text(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self { Value::Text(value.to_owned()) }
}

impl From<String> for Value {
    fn from(value: String) -> Self { Value::Text(value) }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self { Value::Binary(value) }
}

/// Ordered column values of one row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row(Vec<(String, Value)>);

impl Row {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set `column`, replacing any earlier value in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.0.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((column, value)),
        }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.iter().find(|(name, _)| name == column).map(|(_, value)| value)
    }

    #[must_use]
    pub fn text(&self, column: &str) -> Option<&str> { self.get(column).and_then(Value::as_text) }

    #[must_use]
    pub fn binary(&self, column: &str) -> Option<&Bytes> { self.get(column).and_then(Value::as_binary) }

    pub fn columns(&self) -> impl Iterator<Item = &str> { self.0.iter().map(|(name, _)| name.as_str()) }
}

/// Errors raised by a [`TransactionalStore`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with the same key already exists.
    #[error("duplicate key {} in {table}", .key.join("/"))]
    DuplicateKey { table: String, key: Key },
    /// A stored row is missing a column or holds the wrong kind of value.
    #[error("row in {table} has an invalid {column} column")]
    Corrupt { table: String, column: String },
    /// The store rejected the operation.
    #[error("store failure: {0}")]
    Failure(String),
}

impl StoreError {
    /// Whether the error is a unique key violation.
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool { matches!(self, StoreError::DuplicateKey { .. }) }
}

/// One unit of work against a [`TransactionalStore`].
///
/// Reads see committed rows plus this transaction's own pending writes.
/// Nothing becomes visible to other transactions before [`Transaction::commit`].
#[async_trait]
pub trait Transaction: Send {
    /// Fetch the row stored under `key`.
    async fn get(&mut self, table: &str, key: &[String]) -> Result<Option<Row>, StoreError>;

    /// Add a row, failing with [`StoreError::DuplicateKey`] if `key` exists.
    async fn insert(&mut self, table: &str, key: Key, row: Row) -> Result<(), StoreError>;

    /// Add or replace a row.
    async fn put(&mut self, table: &str, key: Key, row: Row) -> Result<(), StoreError>;

    /// Remove a row, returning whether it existed.
    async fn delete(&mut self, table: &str, key: &[String]) -> Result<bool, StoreError>;

    /// All rows of `table` in key order.
    async fn scan(&mut self, table: &str) -> Result<Vec<(Key, Row)>, StoreError>;

    /// Apply every pending write atomically.
    ///
    /// A duplicate key detected at commit aborts the whole transaction.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard every pending write.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Source of transactions.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    /// Start a new transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;
}
