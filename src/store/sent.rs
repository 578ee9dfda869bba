//! Persisted replies used to answer resends without re-running actions.

use bytes::Bytes;

use super::{Key, Row, StoreError, Transaction, Value};
use crate::{error::ConfigError, header::StatusCode};

/// Reply stored after a request's business transaction committed.
///
/// Keyed by `(message_id, request_id)` where `message_id` is the correlation
/// key of the original send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessageRecord {
    pub message_id: String,
    pub request_id: String,
    /// Queue the reply was sent to, if any.
    pub reply_queue: Option<String>,
    pub status_code: StatusCode,
    /// Encoded reply body, header excluded.
    pub body_data: Bytes,
}

/// Column names of the sent-message table.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct SentMessageColumns {
    pub message_id: String,
    pub request_id: String,
    pub reply_queue: String,
    pub status_code: String,
    pub body_data: String,
}

impl Default for SentMessageColumns {
    fn default() -> Self {
        Self {
            message_id: "MESSAGE_ID".into(),
            request_id: "REQUEST_ID".into(),
            reply_queue: "REPLY_QUEUE".into(),
            status_code: "STATUS_CODE".into(),
            body_data: "BODY_DATA".into(),
        }
    }
}

impl SentMessageColumns {
    fn names(&self) -> [&str; 5] {
        [
            &self.message_id,
            &self.request_id,
            &self.reply_queue,
            &self.status_code,
            &self.body_data,
        ]
    }
}

/// Maps [`SentMessageRecord`]s onto rows of a configurable table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessageTable {
    table: String,
    columns: SentMessageColumns,
}

impl Default for SentMessageTable {
    fn default() -> Self {
        Self {
            table: "SENT_MESSAGE".into(),
            columns: SentMessageColumns::default(),
        }
    }
}

impl SentMessageTable {
    /// Use `table` and `columns` instead of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyName`] if the table or any column name is
    /// empty.
    pub fn new(table: impl Into<String>, columns: SentMessageColumns) -> Result<Self, ConfigError> {
        let table = table.into();
        if table.is_empty() {
            return Err(ConfigError::EmptyName("sent message table name"));
        }
        if columns.names().iter().any(|name| name.is_empty()) {
            return Err(ConfigError::EmptyName("sent message column name"));
        }
        Ok(Self { table, columns })
    }

    #[must_use]
    pub fn table(&self) -> &str { &self.table }

    #[must_use]
    pub fn columns(&self) -> &SentMessageColumns { &self.columns }

    fn key(message_id: &str, request_id: &str) -> Key { vec![message_id.to_owned(), request_id.to_owned()] }

    #[must_use]
    pub fn to_row(&self, record: &SentMessageRecord) -> Row {
        let c = &self.columns;
        Row::new()
            .with(&c.message_id, record.message_id.as_str())
            .with(&c.request_id, record.request_id.as_str())
            .with(&c.reply_queue, record.reply_queue.clone().unwrap_or_default())
            .with(&c.status_code, record.status_code.to_string())
            .with(&c.body_data, Value::Binary(record.body_data.clone()))
    }

    /// Rebuild a record from a stored row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] naming the first missing or malformed
    /// column.
    pub fn from_row(&self, row: &Row) -> Result<SentMessageRecord, StoreError> {
        let c = &self.columns;
        let text = |column: &str| {
            row.text(column).ok_or_else(|| self.corrupt(column))
        };
        let status_code = text(&c.status_code)?
            .parse()
            .map_err(|_| self.corrupt(&c.status_code))?;
        let reply_queue = Some(text(&c.reply_queue)?)
            .filter(|queue| !queue.is_empty())
            .map(str::to_owned);
        Ok(SentMessageRecord {
            message_id: text(&c.message_id)?.to_owned(),
            request_id: text(&c.request_id)?.to_owned(),
            reply_queue,
            status_code,
            body_data: row
                .binary(&c.body_data)
                .cloned()
                .ok_or_else(|| self.corrupt(&c.body_data))?,
        })
    }

    fn corrupt(&self, column: &str) -> StoreError {
        StoreError::Corrupt {
            table: self.table.clone(),
            column: column.to_owned(),
        }
    }

    /// Look up the record for `(message_id, request_id)` within `tx`.
    ///
    /// # Errors
    ///
    /// Propagates store failures and [`StoreError::Corrupt`] rows.
    pub async fn find(
        &self,
        tx: &mut dyn Transaction,
        message_id: &str,
        request_id: &str,
    ) -> Result<Option<SentMessageRecord>, StoreError> {
        let row = tx.get(&self.table, &Self::key(message_id, request_id)).await?;
        row.map(|row| self.from_row(&row)).transpose()
    }

    /// Stage `record` for insertion within `tx`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] when a record with the same key is
    /// already visible to `tx`.
    pub async fn insert(&self, tx: &mut dyn Transaction, record: &SentMessageRecord) -> Result<(), StoreError> {
        tx.insert(
            &self.table,
            Self::key(&record.message_id, &record.request_id),
            self.to_row(record),
        )
        .await
    }
}
