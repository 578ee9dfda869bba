#![doc(html_root_url = "https://docs.rs/mqframe/latest")]
//! Synchronous request/response messaging over point-to-point queues.
//!
//! A client sends a request message carrying a fixed-length framework header
//! and blocks on a reply queue. The server reads the header, dispatches the
//! body to the action registered for the request id, and answers with a
//! reply correlated to the request. When the client resends a request whose
//! reply was lost, the stored reply of the original is replayed instead of
//! running the action again.
//!
//! The queue and the database are collaborators behind
//! [`transport::QueueTransport`] and [`store::TransactionalStore`]; in-memory
//! implementations of both ship with the crate.

pub mod action;
pub mod client;
pub mod config;
pub mod error;
pub mod header;
pub mod metrics;
pub mod panic;
pub mod prelude;
pub mod reader;
pub mod record;
pub mod request;
pub mod resend;
pub mod response;
pub mod server;
pub mod store;
pub mod transport;

pub use action::{Action, ActionError, Router};
pub use client::{ClientError, SyncMessenger};
pub use error::ConfigError;
pub use header::{FwHeader, StatusCode};
pub use request::Request;
pub use response::Response;
pub use server::{MessagingServer, ServerError};

pub use crate::metrics::{CLIENT_RESENDS, ERRORS_TOTAL, REPLIES_SENT, REQUESTS_PROCESSED, WORKERS_ACTIVE};
