//! Tokio-based request server.
//!
//! [`MessagingServer`] runs a fixed number of workers against one request
//! queue. Each worker owns its [`RequestScope`](crate::reader::RequestScope)
//! and drives the shared [`HeaderReader`] and [`RequestProcessor`].

mod config;
mod error;
mod processor;
mod worker;

use std::sync::Arc;

use tokio_util::{sync::CancellationToken, task::TaskTracker};

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::ServerError;
pub use processor::RequestProcessor;

use crate::reader::HeaderReader;

/// Serves requests from a queue until cancelled.
pub struct MessagingServer {
    reader: Arc<HeaderReader>,
    processor: Arc<RequestProcessor>,
    config: ServerConfig,
}

impl MessagingServer {
    #[must_use]
    pub fn new(reader: HeaderReader, processor: RequestProcessor, config: ServerConfig) -> Self {
        Self {
            reader: Arc::new(reader),
            processor: Arc::new(processor.with_reply_ttl(config.reply_ttl())),
            config,
        }
    }

    /// Shared reader, for closing it from outside [`MessagingServer::run`].
    #[must_use]
    pub fn reader(&self) -> &Arc<HeaderReader> { &self.reader }

    /// Run the workers until `shutdown` is cancelled or the reader is closed.
    ///
    /// Cancelling closes the reader; each worker finishes the request it is
    /// handling and exits at its next empty read.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Read`] when a worker hit a fatal read error. The
    /// error also cancels `shutdown`, so every other worker stops as well.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let tracker = TaskTracker::new();
        // Also cancelled once the workers are joined, so the close watcher
        // ends when the reader was closed through `reader()`.
        let watch = shutdown.child_token();
        {
            let reader = Arc::clone(&self.reader);
            let token = watch.clone();
            tracker.spawn(async move {
                token.cancelled().await;
                reader.close();
            });
        }
        let handles: Vec<_> = (0..self.config.workers())
            .map(|id| {
                tracker.spawn(worker::worker_loop(
                    id,
                    Arc::clone(&self.reader),
                    Arc::clone(&self.processor),
                    shutdown.clone(),
                ))
            })
            .collect();
        tracing::info!(
            workers = self.config.workers(),
            queue = self.reader.message_reader().config().queue(),
            "server started"
        );
        tracker.close();

        let mut failure = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failure.get_or_insert(err);
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "worker task panicked");
                    shutdown.cancel();
                }
            }
        }
        watch.cancel();
        tracker.wait().await;
        tracing::info!("server stopped");
        failure.map_or(Ok(()), |err| Err(ServerError::Read(err)))
    }
}

#[cfg(test)]
mod tests;
