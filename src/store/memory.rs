//! Mutex-guarded in-process store.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;

use super::{Key, Row, StoreError, Transaction, TransactionalStore};

type Table = BTreeMap<Key, Row>;
type Tables = HashMap<String, Table>;

/// Pending write recorded by a [`MemoryTransaction`] until commit.
#[derive(Clone, Debug)]
enum Change {
    Insert { table: String, key: Key, row: Row },
    Put { table: String, key: Key, row: Row },
    Delete { table: String, key: Key },
}

impl Change {
    fn target(&self) -> (&str, &Key) {
        match self {
            Change::Insert { table, key, .. }
            | Change::Put { table, key, .. }
            | Change::Delete { table, key } => (table, key),
        }
    }

    /// Row left behind by this change; `None` for a delete.
    fn row(&self) -> Option<&Row> {
        match self {
            Change::Insert { row, .. } | Change::Put { row, .. } => Some(row),
            Change::Delete { .. } => None,
        }
    }
}

/// [`TransactionalStore`] keeping every table in memory.
///
/// Clones share the same tables.
///
/// # Examples
///
/// ```
/// use mqframe::store::{MemoryStore, Row, TransactionalStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), mqframe::store::StoreError> {
/// let store = MemoryStore::new();
/// let mut tx = store.begin().await?;
/// tx.insert("BOOK", vec!["1".into()], Row::new().with("TITLE", "Dune")).await?;
/// tx.commit().await?;
/// assert_eq!(store.len("BOOK"), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_commit: Arc<AtomicBool>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Committed rows of `table` in key order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<(Key, Row)> {
        lock(&self.tables)
            .ok()
            .and_then(|tables| tables.get(table).map(|t| t.iter().map(|(k, r)| (k.clone(), r.clone())).collect()))
            .unwrap_or_default()
    }

    /// Number of committed rows in `table`.
    #[must_use]
    pub fn len(&self, table: &str) -> usize {
        lock(&self.tables)
            .ok()
            .and_then(|tables| tables.get(table).map(BTreeMap::len))
            .unwrap_or_default()
    }

    /// Make the next commit fail without applying anything.
    pub fn fail_next_commit(&self) { self.fail_commit.store(true, Ordering::SeqCst); }
}

fn lock(tables: &Mutex<Tables>) -> Result<MutexGuard<'_, Tables>, StoreError> {
    tables
        .lock()
        .map_err(|_| StoreError::Failure("store lock poisoned".to_owned()))
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            changes: Vec::new(),
        }))
    }
}

struct MemoryTransaction {
    store: MemoryStore,
    changes: Vec<Change>,
}

impl MemoryTransaction {
    fn pending(&self, table: &str, key: &[String]) -> Option<&Change> {
        self.changes.iter().rev().find(|change| {
            let (t, k) = change.target();
            t == table && k.as_slice() == key
        })
    }

    fn visible(&self, table: &str, key: &[String]) -> Result<Option<Row>, StoreError> {
        if let Some(change) = self.pending(table, key) {
            return Ok(change.row().cloned());
        }
        let tables = lock(&self.store.tables)?;
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }
}

/// Reject an insert whose key already exists once earlier writes are applied.
fn check_inserts(tables: &Tables, changes: &[Change]) -> Result<(), StoreError> {
    for (index, change) in changes.iter().enumerate() {
        let Change::Insert { table, key, .. } = change else {
            continue;
        };
        let earlier = changes[..index].iter().rev().find(|c| c.target() == (table.as_str(), key));
        let exists = match earlier {
            Some(c) => c.row().is_some(),
            None => tables.get(table).is_some_and(|t| t.contains_key(key)),
        };
        if exists {
            return Err(StoreError::DuplicateKey {
                table: table.clone(),
                key: key.clone(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&mut self, table: &str, key: &[String]) -> Result<Option<Row>, StoreError> {
        self.visible(table, key)
    }

    async fn insert(&mut self, table: &str, key: Key, row: Row) -> Result<(), StoreError> {
        if self.visible(table, &key)?.is_some() {
            return Err(StoreError::DuplicateKey {
                table: table.to_owned(),
                key,
            });
        }
        self.changes.push(Change::Insert {
            table: table.to_owned(),
            key,
            row,
        });
        Ok(())
    }

    async fn put(&mut self, table: &str, key: Key, row: Row) -> Result<(), StoreError> {
        self.changes.push(Change::Put {
            table: table.to_owned(),
            key,
            row,
        });
        Ok(())
    }

    async fn delete(&mut self, table: &str, key: &[String]) -> Result<bool, StoreError> {
        let existed = self.visible(table, key)?.is_some();
        if existed {
            self.changes.push(Change::Delete {
                table: table.to_owned(),
                key: key.to_vec(),
            });
        }
        Ok(existed)
    }

    async fn scan(&mut self, table: &str) -> Result<Vec<(Key, Row)>, StoreError> {
        let mut rows = lock(&self.store.tables)?.get(table).cloned().unwrap_or_default();
        for change in &self.changes {
            let (t, key) = change.target();
            if t != table {
                continue;
            }
            match change.row() {
                Some(row) => rows.insert(key.clone(), row.clone()),
                None => rows.remove(key),
            };
        }
        Ok(rows.into_iter().collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { store, changes } = *self;
        if store.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Failure("injected commit failure".to_owned()));
        }
        let mut tables = lock(&store.tables)?;
        check_inserts(&tables, &changes)?;
        let count = changes.len();
        for change in changes {
            match change {
                Change::Insert { table, key, row } | Change::Put { table, key, row } => {
                    tables.entry(table).or_default().insert(key, row);
                }
                Change::Delete { table, key } => {
                    if let Some(rows) = tables.get_mut(&table) {
                        rows.remove(&key);
                    }
                }
            }
        }
        log::trace!("committed {count} changes");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        log::trace!("rolled back {} changes", self.changes.len());
        Ok(())
    }
}
