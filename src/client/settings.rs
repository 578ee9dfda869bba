//! Per-destination send settings.

use std::time::Duration;

use crate::error::ConfigError;

/// Default wait for a reply.
pub const DEFAULT_REPLY_TIMEOUT_MS: i64 = 5000;

/// Generator target used when none is configured.
pub const DEFAULT_GENERATOR_TARGET: &str = "SYNC_MESSAGE";

/// How requests to one destination are sent and awaited.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use mqframe::client::SendSettings;
///
/// let settings = SendSettings::builder("ORDERS.REQ", "ORDERS.REPLY")
///     .timeout_millis(2000)
///     .retries(2)
///     .build()
///     .expect("valid settings");
/// assert_eq!(settings.timeout(), Some(Duration::from_secs(2)));
/// assert!(settings.resend_control());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendSettings {
    destination: String,
    reply_queue: String,
    timeout: Option<Duration>,
    retries: u32,
    time_to_live: Option<Duration>,
    resend_control: bool,
    generator_target: String,
}

/// Builder for [`SendSettings`].
#[derive(Clone, Debug)]
#[must_use]
pub struct SendSettingsBuilder {
    settings: SendSettings,
}

impl SendSettingsBuilder {
    /// Reply wait in milliseconds. Zero or negative waits indefinitely.
    pub fn timeout_millis(mut self, millis: i64) -> Self {
        self.settings.timeout = u64::try_from(millis)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        self
    }

    /// Resends allowed after the first send times out.
    pub fn retries(mut self, retries: u32) -> Self {
        self.settings.retries = retries;
        self
    }

    /// Time to live stamped on each request message.
    pub fn time_to_live(mut self, ttl: Option<Duration>) -> Self {
        self.settings.time_to_live = ttl;
        self
    }

    /// Whether requests carry a resend flag. Without it a timeout is final.
    pub fn resend_control(mut self, enabled: bool) -> Self {
        self.settings.resend_control = enabled;
        self
    }

    /// Sequence the correlation ids are drawn from.
    pub fn generator_target(mut self, target: impl Into<String>) -> Self {
        self.settings.generator_target = target.into();
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyQueueName`] for a blank destination or
    /// reply queue and [`ConfigError::EmptyName`] for a blank generator
    /// target.
    pub fn build(self) -> Result<SendSettings, ConfigError> {
        let settings = self.settings;
        if settings.destination.trim().is_empty() {
            return Err(ConfigError::EmptyQueueName("destination"));
        }
        if settings.reply_queue.trim().is_empty() {
            return Err(ConfigError::EmptyQueueName("reply"));
        }
        if settings.generator_target.trim().is_empty() {
            return Err(ConfigError::EmptyName("generator target"));
        }
        Ok(settings)
    }
}

impl SendSettings {
    pub fn builder(destination: impl Into<String>, reply_queue: impl Into<String>) -> SendSettingsBuilder {
        SendSettingsBuilder {
            settings: SendSettings {
                destination: destination.into(),
                reply_queue: reply_queue.into(),
                timeout: u64::try_from(DEFAULT_REPLY_TIMEOUT_MS).ok().map(Duration::from_millis),
                retries: 0,
                time_to_live: None,
                resend_control: true,
                generator_target: DEFAULT_GENERATOR_TARGET.to_owned(),
            },
        }
    }

    #[must_use]
    pub fn destination(&self) -> &str { &self.destination }

    #[must_use]
    pub fn reply_queue(&self) -> &str { &self.reply_queue }

    /// `None` waits indefinitely.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> { self.timeout }

    #[must_use]
    pub fn retries(&self) -> u32 { self.retries }

    #[must_use]
    pub fn time_to_live(&self) -> Option<Duration> { self.time_to_live }

    #[must_use]
    pub fn resend_control(&self) -> bool { self.resend_control }

    #[must_use]
    pub fn generator_target(&self) -> &str { &self.generator_target }
}
