//! Worker loop shared by every [`MessagingServer`](super::MessagingServer)
//! worker task.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::RequestProcessor;
use crate::{
    metrics::{self, ErrorKind},
    reader::{HeaderReader, ReadError, RequestScope},
};

/// Read and process requests until the reader is closed.
///
/// Closing is only observed once the current receive returns, either with a
/// message or at its timeout. A fatal read error cancels `shutdown` so the
/// remaining workers stop too.
pub(super) async fn worker_loop(
    id: usize,
    reader: Arc<HeaderReader>,
    processor: Arc<RequestProcessor>,
    shutdown: CancellationToken,
) -> Result<(), ReadError> {
    metrics::inc_workers();
    tracing::debug!(worker = id, "worker started");
    let mut scope = RequestScope::new();
    let result = loop {
        match reader.read(&mut scope).await {
            Ok(Some(request)) => {
                if let Err(err) = processor.handle(request).await {
                    metrics::inc_errors(ErrorKind::Transport);
                    tracing::error!(worker = id, error = %err, "reply failed");
                }
            }
            Ok(None) if reader.is_closed() => break Ok(()),
            Ok(None) => {}
            Err(ReadError::Message(err)) => {
                metrics::inc_errors(ErrorKind::Format);
                if let Err(reply_err) = processor.reject(&err).await {
                    tracing::error!(worker = id, error = %reply_err, "error reply failed");
                }
            }
            Err(err) => {
                metrics::inc_errors(ErrorKind::Transport);
                tracing::error!(worker = id, error = %err, "request queue failed; stopping");
                shutdown.cancel();
                break Err(err);
            }
        }
    };
    metrics::dec_workers();
    tracing::debug!(worker = id, "worker stopped");
    result
}
