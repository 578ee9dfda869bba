//! Deciding whether a request runs its action or replays a stored reply.
//!
//! Requests that carry a resend flag are tracked in the sent-message table,
//! keyed by their correlation key and request id. A row is written in the
//! same transaction as the action's own changes, so it exists exactly when
//! the action committed. A later send with the same key is answered from the
//! row without running the action again.
//!
//! | resend flag | stored row | result                          |
//! |-------------|------------|---------------------------------|
//! | absent      | not read   | run, do not store               |
//! | `0`         | missing    | run, store                      |
//! | `0`         | present    | replay (duplicate first send)   |
//! | `1`         | present    | replay                          |
//! | `1`         | missing    | run, store                      |

use std::{sync::Arc, time::Duration};

use bytes::Bytes;

use crate::{
    action::{Action, ActionError, ActionRunner},
    header::{ResendFlag, StatusCode},
    metrics::{self, ErrorKind},
    request::Request,
    response::Response,
    store::{SentMessageRecord, SentMessageTable, StoreError, Transaction, TransactionalStore},
};

/// Re-reads attempted after losing an insert race.
pub const DEFAULT_RACE_RETRIES: u32 = 3;
/// Delay between race re-reads.
pub const DEFAULT_RACE_BACKOFF: Duration = Duration::from_millis(10);

/// How a [`Reply`] was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The action ran and committed.
    Fresh,
    /// A stored reply was returned without running the action.
    Replayed,
    /// The action or its transaction failed and was rolled back.
    Failed,
}

impl Outcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Fresh => "fresh",
            Outcome::Replayed => "replayed",
            Outcome::Failed => "failed",
        }
    }
}

/// Status and encoded body to send back for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    status: StatusCode,
    body: Bytes,
    outcome: Outcome,
}

impl Reply {
    #[must_use]
    pub fn status_code(&self) -> StatusCode { self.status }

    #[must_use]
    pub fn body(&self) -> &Bytes { &self.body }

    #[must_use]
    pub fn outcome(&self) -> Outcome { self.outcome }

    fn replayed(record: SentMessageRecord) -> Self {
        Self {
            status: record.status_code,
            body: record.body_data,
            outcome: Outcome::Replayed,
        }
    }
}

/// Retry policy for duplicate-key races on the sent-message table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResendConfig {
    race_retries: u32,
    race_backoff: Duration,
}

impl Default for ResendConfig {
    fn default() -> Self {
        Self {
            race_retries: DEFAULT_RACE_RETRIES,
            race_backoff: DEFAULT_RACE_BACKOFF,
        }
    }
}

impl ResendConfig {
    #[must_use]
    pub fn race_retries(mut self, retries: u32) -> Self {
        self.race_retries = retries;
        self
    }

    #[must_use]
    pub fn race_backoff(mut self, backoff: Duration) -> Self {
        self.race_backoff = backoff;
        self
    }
}

/// Runs actions under resend control.
pub struct ResendCoordinator {
    store: Arc<dyn TransactionalStore>,
    table: SentMessageTable,
    runner: ActionRunner,
    config: ResendConfig,
}

impl ResendCoordinator {
    #[must_use]
    pub fn new(store: Arc<dyn TransactionalStore>, table: SentMessageTable) -> Self {
        Self {
            store,
            table,
            runner: ActionRunner,
            config: ResendConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ResendConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn table(&self) -> &SentMessageTable { &self.table }

    /// Produce the reply for `request`, running `action` at most once per
    /// tracked key.
    ///
    /// Failures never escape: they roll back and become a [`Reply`] whose
    /// outcome is [`Outcome::Failed`].
    pub async fn process(&self, action: &dyn Action, request: &mut Request) -> Reply {
        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(err) => return self.failed(action, request, ActionError::Store(err)),
        };
        let Some(flag) = request.resend_flag() else {
            return self.execute(tx, action, request, false).await;
        };
        match self
            .table
            .find(tx.as_mut(), request.correlation_key(), request.request_id())
            .await
        {
            Ok(Some(record)) => {
                discard(tx).await;
                if flag == ResendFlag::FirstSend {
                    tracing::warn!(
                        request_id = request.request_id(),
                        correlation = request.correlation_key(),
                        "duplicate first send replayed"
                    );
                }
                Reply::replayed(record)
            }
            Ok(None) => self.execute(tx, action, request, true).await,
            Err(err) => {
                discard(tx).await;
                self.failed(action, request, ActionError::Store(err))
            }
        }
    }

    async fn execute(
        &self,
        mut tx: Box<dyn Transaction>,
        action: &dyn Action,
        request: &mut Request,
        track: bool,
    ) -> Reply {
        let (response, body) = match self.run(action, request, tx.as_mut()).await {
            Ok(done) => done,
            Err(err) => {
                discard(tx).await;
                return self.failed(action, request, err);
            }
        };
        if track {
            let record = SentMessageRecord {
                message_id: request.correlation_key().to_owned(),
                request_id: request.request_id().to_owned(),
                reply_queue: request.message().reply_to().map(str::to_owned),
                status_code: response.status_code(),
                body_data: body.clone(),
            };
            if let Err(err) = self.table.insert(tx.as_mut(), &record).await {
                discard(tx).await;
                return self.settle(action, request, err).await;
            }
        }
        match tx.commit().await {
            Ok(()) => {
                action.on_commit(&response, request);
                Reply {
                    status: response.status_code(),
                    body,
                    outcome: Outcome::Fresh,
                }
            }
            Err(err) if track => self.settle(action, request, err).await,
            Err(err) => self.failed(action, request, ActionError::Store(err)),
        }
    }

    async fn run(
        &self,
        action: &dyn Action,
        request: &mut Request,
        tx: &mut dyn Transaction,
    ) -> Result<(Response, Bytes), ActionError> {
        let response = self.runner.run(action, request, tx).await?;
        let body = response.encode_body(request.reply_formatter())?;
        Ok((response, body))
    }

    /// Resolve a failed insert or commit of the tracking row.
    ///
    /// A duplicate key on the sent-message table means a concurrent delivery
    /// of the same request committed first; its row is re-read and replayed.
    async fn settle(&self, action: &dyn Action, request: &Request, err: StoreError) -> Reply {
        let raced = matches!(&err, StoreError::DuplicateKey { table, .. } if table == self.table.table());
        if !raced {
            return self.failed(action, request, ActionError::Store(err));
        }
        for attempt in 0..=self.config.race_retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.race_backoff).await;
            }
            match self.reread(request).await {
                Ok(Some(record)) => {
                    tracing::info!(
                        request_id = request.request_id(),
                        correlation = request.correlation_key(),
                        attempt,
                        "concurrent send committed first, replaying"
                    );
                    return Reply::replayed(record);
                }
                Ok(None) => {}
                Err(read_err) => return self.failed(action, request, ActionError::Store(read_err)),
            }
        }
        self.failed(action, request, ActionError::Store(err))
    }

    async fn reread(&self, request: &Request) -> Result<Option<SentMessageRecord>, StoreError> {
        let mut tx = self.store.begin().await?;
        let found = self
            .table
            .find(tx.as_mut(), request.correlation_key(), request.request_id())
            .await;
        discard(tx).await;
        found
    }

    fn failed(&self, action: &dyn Action, request: &Request, err: ActionError) -> Reply {
        let kind = match &err {
            ActionError::Store(_) => ErrorKind::Store,
            ActionError::InvalidDataFormat(_) | ActionError::Format(_) => ErrorKind::Format,
            _ => ErrorKind::Action,
        };
        metrics::inc_errors(kind);
        tracing::warn!(
            request_id = request.request_id(),
            correlation = request.correlation_key(),
            error = %err,
            "request rolled back"
        );
        let response = action
            .on_rollback(&err, request)
            .unwrap_or_else(|| Response::with_status(err.status_code()));
        let body = response
            .encode_body(request.reply_formatter())
            .unwrap_or_else(|encode_err| {
                log::error!("failed to encode error reply for {}: {encode_err}", request.request_id());
                Bytes::new()
            });
        Reply {
            status: response.status_code(),
            body,
            outcome: Outcome::Failed,
        }
    }
}

async fn discard(tx: Box<dyn Transaction>) {
    if let Err(err) = tx.rollback().await {
        log::warn!("rollback failed: {err}");
    }
}
