//! Business actions and their dispatch.
//!
//! Each request id is routed to exactly one [`Action`]. [`ActionRunner`]
//! performs the optional single-record read, invokes the handler and turns a
//! handler panic into an ordinary [`ActionError`].

use std::{collections::HashMap, panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;

use crate::{
    error::ConfigError,
    header::StatusCode,
    panic::panic_message,
    record::{FormatError, Record},
    request::Request,
    response::Response,
    store::{StoreError, Transaction},
};

/// Failure of a business action.
///
/// Any error rolls back the action's transaction.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ActionError {
    /// The body does not have the shape the action expects.
    #[error("invalid data format: {0}")]
    InvalidDataFormat(String),
    /// A record could not be decoded or encoded.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// The store rejected a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The action refused the request.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    /// The action panicked.
    #[error("action panicked: {0}")]
    Panic(String),
}

impl ActionError {
    /// Business rejection with an explicit reply status.
    #[must_use]
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        ActionError::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Status of the generic reply sent when no hook supplies one.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ActionError::InvalidDataFormat(_) | ActionError::Format(_) => StatusCode::INVALID_FORMAT,
            ActionError::Rejected { status, .. } => *status,
            ActionError::Store(_) | ActionError::Panic(_) => StatusCode::FAILURE,
        }
    }
}

/// Business handler for one request id.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use mqframe::{
///     action::{Action, ActionError},
///     record::Record,
///     request::Request,
///     response::Response,
///     store::Transaction,
/// };
///
/// struct Echo;
///
/// #[async_trait]
/// impl Action for Echo {
///     async fn handle(
///         &self,
///         record: Option<Record>,
///         _request: &mut Request,
///         _tx: &mut dyn Transaction,
///     ) -> Result<Response, ActionError> {
///         Ok(record.into_iter().fold(Response::ok(), Response::with_record))
///     }
/// }
/// ```
#[async_trait]
pub trait Action: Send + Sync {
    /// Whether [`ActionRunner`] reads the single body record before
    /// [`Action::handle`] runs.
    ///
    /// Return `false` to parse multi-record bodies through
    /// [`Request::read_record`] instead.
    fn auto_read(&self) -> bool { true }

    /// Handle one request inside the business transaction `tx`.
    ///
    /// `record` is the auto-read body record, or `None` when auto-read is
    /// disabled, the body is empty, or no body layout exists.
    async fn handle(
        &self,
        record: Option<Record>,
        request: &mut Request,
        tx: &mut dyn Transaction,
    ) -> Result<Response, ActionError>;

    /// Called after the transaction rolled back.
    ///
    /// A returned response replaces the generic error reply.
    fn on_rollback(&self, _error: &ActionError, _request: &Request) -> Option<Response> { None }

    /// Called after the transaction committed.
    fn on_commit(&self, _response: &Response, _request: &Request) {}
}

/// Request id to [`Action`] table.
#[derive(Clone, Default)]
pub struct Router {
    routes: HashMap<String, Arc<dyn Action>>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `action` for `request_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateRoute`] if `request_id` already has an
    /// action, or [`ConfigError::EmptyRequestId`] for an empty id.
    pub fn route<A: Action + 'static>(self, request_id: impl Into<String>, action: A) -> Result<Self, ConfigError> {
        self.route_shared(request_id, Arc::new(action))
    }

    /// [`Router::route`] for an action that is already shared.
    ///
    /// # Errors
    ///
    /// As for [`Router::route`].
    pub fn route_shared(mut self, request_id: impl Into<String>, action: Arc<dyn Action>) -> Result<Self, ConfigError> {
        let request_id = request_id.into();
        if request_id.is_empty() {
            return Err(ConfigError::EmptyRequestId);
        }
        if self.routes.contains_key(&request_id) {
            return Err(ConfigError::DuplicateRoute(request_id));
        }
        self.routes.insert(request_id, action);
        Ok(self)
    }

    /// Exact, case-sensitive lookup.
    #[must_use]
    pub fn get(&self, request_id: &str) -> Option<&Arc<dyn Action>> { self.routes.get(request_id) }

    #[must_use]
    pub fn len(&self) -> usize { self.routes.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }
}

/// Invokes actions on behalf of the resend coordinator.
#[derive(Clone, Copy, Debug, Default)]
pub struct ActionRunner;

impl ActionRunner {
    /// Run `action` against `request` within `tx`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidDataFormat`] when auto-read finds more
    /// than one record, otherwise whatever the action returns. A panic in the
    /// action is reported as [`ActionError::Panic`].
    pub async fn run(
        &self,
        action: &dyn Action,
        request: &mut Request,
        tx: &mut dyn Transaction,
    ) -> Result<Response, ActionError> {
        let record = if action.auto_read() {
            read_single(request)?
        } else {
            None
        };
        match AssertUnwindSafe(action.handle(record, request, tx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let text = panic_message(payload.as_ref()).to_owned();
                tracing::error!(panic = %text, "action panicked");
                Err(ActionError::Panic(text))
            }
        }
    }
}

fn read_single(request: &mut Request) -> Result<Option<Record>, ActionError> {
    if request.body_formatter().is_none() {
        return Ok(None);
    }
    let record = request.read_record()?;
    if request.has_remaining() {
        return Err(ActionError::InvalidDataFormat(format!(
            "{} expects a single record but the body holds more",
            request.request_id()
        )));
    }
    Ok(record)
}

#[cfg(test)]
mod tests;
