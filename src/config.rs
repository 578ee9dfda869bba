//! Settings file support.
//!
//! [`Settings`] mirrors the component configurations as a TOML document.
//! Every section and key is optional; missing values take the component
//! defaults. The conversion methods run the component builders, so a
//! settings file is validated exactly like code-built configuration.
//!
//! ```toml
//! [reader]
//! queue = "ORDERS.REQ"
//! timeout_ms = 2000
//!
//! [server]
//! workers = 4
//! reply_ttl_ms = 30000
//!
//! [resend]
//! table = "SENT_MESSAGE"
//! race_retries = 3
//!
//! [client]
//! destination = "ORDERS.REQ"
//! reply_queue = "ORDERS.REPLY"
//! retries = 2
//! ```

use std::{path::Path, sync::Arc, time::Duration};

use serde::Deserialize;

use crate::{
    client::{DEFAULT_GENERATOR_TARGET, DEFAULT_REPLY_TIMEOUT_MS, SendSettings},
    error::ConfigError,
    header::{DEFAULT_HEADER_LAYOUT, HeaderCodec},
    reader::{DEFAULT_READ_TIMEOUT_MS, ReaderConfig},
    record::FormatRepository,
    resend::{DEFAULT_RACE_BACKOFF, DEFAULT_RACE_RETRIES, ResendConfig},
    server::ServerConfig,
    store::{SentMessageColumns, SentMessageTable},
};

/// Queue used when `[reader] queue` is not set.
pub const DEFAULT_REQUEST_QUEUE: &str = "MQFRAME.REQUEST";

/// Top-level settings document.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub reader: ReaderSettings,
    pub header: HeaderSettings,
    pub server: ServerSettings,
    pub resend: ResendSettings,
    /// Absent unless the process also sends requests.
    pub client: Option<ClientSettings>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderSettings {
    pub queue: String,
    /// Zero or negative waits indefinitely.
    pub timeout_ms: i64,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            queue: DEFAULT_REQUEST_QUEUE.to_owned(),
            timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HeaderSettings {
    /// Name of the header layout in the format repository.
    pub layout: String,
}

impl Default for HeaderSettings {
    fn default() -> Self {
        Self {
            layout: DEFAULT_HEADER_LAYOUT.to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub workers: usize,
    pub reply_ttl_ms: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            workers: ServerConfig::default().workers(),
            reply_ttl_ms: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ResendSettings {
    pub table: String,
    pub columns: SentMessageColumns,
    pub race_retries: u32,
    pub race_backoff_ms: u64,
}

impl Default for ResendSettings {
    fn default() -> Self {
        Self {
            table: SentMessageTable::default().table().to_owned(),
            columns: SentMessageColumns::default(),
            race_retries: DEFAULT_RACE_RETRIES,
            race_backoff_ms: u64::try_from(DEFAULT_RACE_BACKOFF.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSettings {
    pub destination: String,
    pub reply_queue: String,
    pub timeout_ms: i64,
    pub retries: u32,
    pub ttl_ms: Option<u64>,
    pub resend_control: bool,
    pub generator_target: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            destination: String::new(),
            reply_queue: String::new(),
            timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            retries: 0,
            ttl_ms: None,
            resend_control: true,
            generator_target: DEFAULT_GENERATOR_TARGET.to_owned(),
        }
    }
}

impl Settings {
    /// Parse a settings document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] for malformed TOML, unknown keys or
    /// values of the wrong type.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> { Ok(toml::from_str(source)?) }

    /// Read and parse the settings file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// for [`Settings::from_toml`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_toml(&source)?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// # Errors
    ///
    /// Propagates [`ReaderConfig`] validation errors.
    pub fn reader_config(&self) -> Result<ReaderConfig, ConfigError> {
        ReaderConfig::builder(self.reader.queue.as_str())
            .timeout_millis(self.reader.timeout_ms)
            .build()
    }

    /// # Errors
    ///
    /// Propagates [`HeaderCodec`] validation errors.
    pub fn header_codec(&self, formats: Arc<dyn FormatRepository>) -> Result<HeaderCodec, ConfigError> {
        HeaderCodec::builder(formats)
            .layout_name(self.header.layout.as_str())
            .build()
    }

    /// # Errors
    ///
    /// Propagates [`ServerConfig`] validation errors.
    pub fn server_config(&self) -> Result<ServerConfig, ConfigError> {
        ServerConfig::builder()
            .workers(self.server.workers)
            .reply_ttl(self.server.reply_ttl_ms.map(Duration::from_millis))
            .build()
    }

    #[must_use]
    pub fn resend_config(&self) -> ResendConfig {
        ResendConfig::default()
            .race_retries(self.resend.race_retries)
            .race_backoff(Duration::from_millis(self.resend.race_backoff_ms))
    }

    /// # Errors
    ///
    /// Propagates [`SentMessageTable`] validation errors.
    pub fn sent_table(&self) -> Result<SentMessageTable, ConfigError> {
        SentMessageTable::new(self.resend.table.as_str(), self.resend.columns.clone())
    }

    /// Send settings from the `[client]` section, if present.
    ///
    /// # Errors
    ///
    /// Propagates [`SendSettings`] validation errors.
    pub fn send_settings(&self) -> Result<Option<SendSettings>, ConfigError> {
        self.client
            .as_ref()
            .map(|client| {
                SendSettings::builder(client.destination.as_str(), client.reply_queue.as_str())
                    .timeout_millis(client.timeout_ms)
                    .retries(client.retries)
                    .time_to_live(client.ttl_ms.map(Duration::from_millis))
                    .resend_control(client.resend_control)
                    .generator_target(client.generator_target.as_str())
                    .build()
            })
            .transpose()
    }
}
