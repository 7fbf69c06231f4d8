//! Server configuration from the environment
//!
//! Every setting has a default; unset variables are not an error, invalid
//! values are.

use std::time::Duration;
use testws_services::TickPublisherConfig;
use thiserror::Error;

/// Errors produced while reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// Runtime configuration for the server binary
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the listener binds on
    pub port: u16,
    /// Quote publisher settings
    pub publisher: TickPublisherConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            publisher: TickPublisherConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from environment variables
    ///
    /// Recognizes `SERVER_PORT`, `QUOTE_SYMBOL`, and `QUOTE_INTERVAL_MS`;
    /// the interval must be a positive number of milliseconds.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(port) = lookup("SERVER_PORT") {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid("SERVER_PORT", port))?;
        }
        if let Some(symbol) = lookup("QUOTE_SYMBOL") {
            config.publisher.symbol = symbol;
        }
        if let Some(interval) = lookup("QUOTE_INTERVAL_MS") {
            // The publisher's interval timer requires a non-zero period.
            let millis: u64 = match interval.parse() {
                Ok(millis) if millis > 0 => millis,
                _ => return Err(ConfigError::Invalid("QUOTE_INTERVAL_MS", interval)),
            };
            config.publisher.period = Duration::from_millis(millis);
        }

        Ok(config)
    }
}
