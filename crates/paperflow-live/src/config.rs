//! Channel configuration.

use std::time::Duration;

/// Configuration for a [`LiveChannel`](crate::LiveChannel).
///
/// Defaults match the backend's expectations: retry every 3 seconds up to
/// 5 times, heartbeat every 30 seconds.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:8030/ws`.
    pub endpoint: String,
    /// Connect immediately on construction.
    pub auto_connect: bool,
    /// Fixed delay between reconnect attempts.
    pub reconnect_interval: Duration,
    /// Give up after this many consecutive failed reconnect attempts.
    pub max_reconnect_attempts: u32,
    /// Interval between heartbeat pings while the connection is open.
    pub heartbeat_interval: Duration,
}

impl ChannelConfig {
    /// Create a config for the given endpoint with default timings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auto_connect: true,
            reconnect_interval: Duration::from_millis(3000),
            max_reconnect_attempts: 5,
            heartbeat_interval: Duration::from_millis(30_000),
        }
    }

    /// Disable the automatic connect on construction.
    pub fn manual_connect(mut self) -> Self {
        self.auto_connect = false;
        self
    }

    /// Override the reconnect interval.
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Override the maximum number of reconnect attempts.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Override the heartbeat interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}
