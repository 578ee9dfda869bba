//! The `RegisterBook` request: book records followed by a summary.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use mqframe::{
    action::{Action, ActionError},
    header::{HeaderLayout, StatusCode},
    record::{FixedLayout, MemoryFormatRepository, Record, RecordType},
    request::Request,
    response::Response,
    store::{Row, Transaction},
};

/// Business table the action writes one row per book to.
pub const BOOK_TABLE: &str = "BOOK";

/// Header layout plus the `RegisterBook` body layouts.
///
/// ```text
/// RegisterBook_RECEIVE  book:    recordKind(1)="1" title(20) pages(4)
///                       summary: recordKind(1)="9" bookCount(3)
/// RegisterBook_SEND     summary: bookCount(3)
/// ```
///
/// # Panics
///
/// Panics if the static layouts below are edited into invalid ones.
#[must_use]
pub fn book_formats() -> Arc<MemoryFormatRepository> {
    let receive = FixedLayout::builder("RegisterBook_RECEIVE")
        .classifier("recordKind")
        .record_type(
            RecordType::new("book")
                .when("1")
                .text("recordKind", 1)
                .text("title", 20)
                .number("pages", 4),
        )
        .record_type(
            RecordType::new("summary")
                .when("9")
                .text("recordKind", 1)
                .number("bookCount", 3),
        )
        .build()
        .expect("receive layout");
    let send = FixedLayout::builder("RegisterBook_SEND")
        .record_type(RecordType::new("summary").number("bookCount", 3))
        .build()
        .expect("send layout");
    Arc::new(
        MemoryFormatRepository::new()
            .with(HeaderLayout::standard())
            .with(receive)
            .with(send),
    )
}

#[must_use]
pub fn book(title: &str, pages: u32) -> Record {
    Record::typed("book")
        .with("title", title)
        .with("pages", pages.to_string())
}

#[must_use]
pub fn summary(count: usize) -> Record { Record::typed("summary").with("bookCount", count.to_string()) }

/// Stores each book and answers with the number stored.
///
/// The summary's `bookCount` must match the books sent. Clones share their
/// counters, so a test can keep one clone while the router owns another.
#[derive(Clone, Debug, Default)]
pub struct RegisterBook {
    runs: Arc<AtomicUsize>,
    fail_next: Arc<AtomicBool>,
}

impl RegisterBook {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Times the handler ran, rolled-back runs included.
    #[must_use]
    pub fn runs(&self) -> usize { self.runs.load(Ordering::SeqCst) }

    /// Make the next run fail after writing its rows.
    pub fn fail_next(&self) { self.fail_next.store(true, Ordering::SeqCst); }
}

#[async_trait]
impl Action for RegisterBook {
    fn auto_read(&self) -> bool { false }

    async fn handle(
        &self,
        _record: Option<Record>,
        request: &mut Request,
        tx: &mut dyn Transaction,
    ) -> Result<Response, ActionError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let records = request.read_records()?;
        let (books, rest): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|r| r.record_type() == Some("book"));
        let [totals] = rest.as_slice() else {
            return Err(ActionError::InvalidDataFormat("expected one summary record".into()));
        };
        let declared = totals.get("bookCount").unwrap_or_default();
        if declared != books.len().to_string() {
            return Err(ActionError::InvalidDataFormat(format!(
                "summary declares {declared} books, body has {}",
                books.len()
            )));
        }

        let delivery = request.message().message_id().to_owned();
        for (index, book) in books.iter().enumerate() {
            let row = Row::new()
                .with("TITLE", book.get("title").unwrap_or_default())
                .with("PAGES", book.get("pages").unwrap_or_default());
            tx.insert(BOOK_TABLE, vec![delivery.clone(), index.to_string()], row)
                .await?;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ActionError::rejected(StatusCode::FAILURE, "registration failed"));
        }
        Ok(Response::ok().with_record(Record::new().with("bookCount", books.len().to_string())))
    }
}
