//! Convenience imports for writing actions and wiring a server.
//!
//! # Examples
//!
//! ```
//! use mqframe::prelude::*;
//!
//! let router = Router::new();
//! assert!(router.is_empty());
//! ```

pub use crate::{
    action::{Action, ActionError, Router},
    client::{SendSettings, SyncMessenger, SyncReply, SyncRequest},
    header::{FwHeader, HeaderCodec, StatusCode},
    record::{Record, RecordFormatter},
    request::Request,
    response::Response,
    server::{MessagingServer, RequestProcessor, ServerConfig},
    store::Transaction,
};
