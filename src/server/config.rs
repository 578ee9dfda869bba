//! Configuration for [`MessagingServer`](super::MessagingServer).

use std::time::Duration;

use crate::error::ConfigError;

/// Worker count and reply settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    workers: usize,
    reply_ttl: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            reply_ttl: None,
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Clone, Copy, Debug, Default)]
#[must_use]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Number of workers reading the request queue concurrently.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Time to live stamped on every reply.
    pub fn reply_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.config.reply_ttl = ttl;
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCount`] when no workers were requested.
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        if self.config.workers == 0 {
            return Err(ConfigError::ZeroCount("workers"));
        }
        Ok(self.config)
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder { ServerConfigBuilder::default() }

    #[must_use]
    pub fn workers(&self) -> usize { self.workers }

    #[must_use]
    pub fn reply_ttl(&self) -> Option<Duration> { self.reply_ttl }
}
