//! Shared fixtures for `mqframe` tests.
//!
//! [`Harness`] runs a [`MessagingServer`](mqframe::MessagingServer) over
//! in-memory queues and an in-memory store with the [`RegisterBook`] action
//! registered, so tests can drive whole request/reply exchanges.
//!
//! ```rust
//! use mqframe_testing::{Harness, book, summary};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let harness = Harness::start(1);
//! let reply = harness
//!     .exchange("C-1", None, &[book("Dune", 412), summary(1)])
//!     .await;
//! assert_eq!(harness.rows(), 1);
//! # drop(reply);
//! harness.stop().await.expect("clean shutdown");
//! # }
//! ```

pub mod books;
pub mod harness;
pub mod logging;
pub mod metrics;

pub use books::{BOOK_TABLE, RegisterBook, book, book_formats, summary};
pub use harness::{Harness, REPLY_QUEUE, REQUEST_QUEUE};
pub use logging::{LoggerHandle, logger};
pub use metrics::{counter_value, recorder};
