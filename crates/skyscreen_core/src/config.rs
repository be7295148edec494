//! # Sync Configuration
//!
//! Picks and builds the signalling backend at runtime. Loaded once at
//! startup from TOML:
//!
//! ```toml
//! mode = "message_bus"
//! host = "127.0.0.1"
//! port = 5555
//! reconnect_interval_ms = 100
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SkyError, SkyResult};
use crate::sync::{
    MessageBusPublisher, MessageBusSubscriber, NoSync, NoneRequired, ReaderSync, SyncMode,
    WriterSync,
};

/// Well-known port of the frame-ready bus.
pub const DEFAULT_SYNC_PORT: u16 = 5555;

/// Default host the bus binds and connects to.
pub const DEFAULT_SYNC_HOST: &str = "127.0.0.1";

/// Signalling backend selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Backend kind.
    pub mode: SyncMode,
    /// Host the publisher binds / the subscriber connects to.
    pub host: String,
    /// Bus port.
    pub port: u16,
    /// Delay between subscriber connection attempts.
    pub reconnect_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::MessageBus,
            host: DEFAULT_SYNC_HOST.to_string(),
            port: DEFAULT_SYNC_PORT,
            reconnect_interval_ms: 100,
        }
    }
}

impl SyncConfig {
    /// Config for a given mode with default endpoint settings.
    #[must_use]
    pub fn with_mode(mode: SyncMode) -> Self {
        Self { mode, ..Self::default() }
    }

    /// Sets the bus port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidConfig`] on malformed input.
    pub fn from_toml_str(text: &str) -> SkyResult<Self> {
        toml::from_str(text).map_err(|e| SkyError::InvalidConfig(e.to_string()))
    }

    /// Reconnect delay as a duration.
    #[must_use]
    pub const fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Builds the writer half of the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::Transport`] if the bus port cannot be bound.
    pub fn writer_sync(&self) -> SkyResult<Box<dyn WriterSync>> {
        let sync: Box<dyn WriterSync> = match self.mode {
            SyncMode::NoSync => Box::new(NoSync::new()),
            SyncMode::MessageBus => {
                Box::new(MessageBusPublisher::bind((self.host.as_str(), self.port))?)
            }
            SyncMode::NoneRequired => Box::new(NoneRequired::new()),
        };
        Ok(sync)
    }

    /// Builds the reader half of the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`SkyError::InvalidAddress`] if the bus host does not resolve.
    pub fn reader_sync(&self) -> SkyResult<Box<dyn ReaderSync>> {
        let sync: Box<dyn ReaderSync> = match self.mode {
            SyncMode::NoSync => Box::new(NoSync::new()),
            SyncMode::MessageBus => Box::new(MessageBusSubscriber::connect(
                (self.host.as_str(), self.port),
                self.reconnect_interval(),
            )?),
            SyncMode::NoneRequired => Box::new(NoneRequired::new()),
        };
        Ok(sync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = SyncConfig::from_toml_str("port = 6000").unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.mode, SyncMode::MessageBus);
        assert_eq!(config.host, DEFAULT_SYNC_HOST);
    }

    #[test]
    fn test_bad_toml_is_invalid_config() {
        let err = SyncConfig::from_toml_str("mode = \"carrier_pigeon\"").unwrap_err();
        assert!(matches!(err, SkyError::InvalidConfig(_)));
    }

    #[test]
    fn test_builds_selected_backend() {
        let config = SyncConfig::with_mode(SyncMode::NoSync);
        assert_eq!(config.writer_sync().unwrap().mode(), SyncMode::NoSync);
        assert_eq!(config.reader_sync().unwrap().mode(), SyncMode::NoSync);

        let config = SyncConfig::with_mode(SyncMode::MessageBus).with_port(0);
        assert_eq!(config.writer_sync().unwrap().mode(), SyncMode::MessageBus);
    }
}
