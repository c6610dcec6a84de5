#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Constant;

const DEFAULT_RECONNECT_DELAY_DURATION: Duration = Duration::from_secs(3);

/// Configuration for WebSocket client behavior.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Reconnection strategy configuration
    pub reconnect: ReconnectConfig,
}

impl Config {
    /// Configuration that reconnects after `delay` instead of the default.
    #[must_use]
    pub fn with_reconnect_delay(delay: Duration) -> Self {
        Self {
            reconnect: ReconnectConfig { delay },
        }
    }
}

/// Configuration for automatic reconnection behavior.
///
/// Reconnection uses a fixed delay: every attempt waits the same amount of time,
/// attempts are unbounded, and no jitter is applied.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait between a transport closing and the next connection attempt
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY_DURATION,
        }
    }
}

impl From<ReconnectConfig> for Constant {
    fn from(config: ReconnectConfig) -> Self {
        Constant::new(config.delay)
    }
}
