// ── Runtime engine configuration ──
//
// Describes how to reach the simulator and how to draw wires. Never
// touches disk; the CLI builds one from a config profile.

use std::time::Duration;

use url::Url;

use crate::wiring::PortTable;

/// Default delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default time to wait for the first topology snapshot.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Simulator websocket endpoint (`ws://host:8000/simengine`).
    pub url: Url,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// How long callers wait for a snapshot before giving up.
    pub timeout: Duration,
    /// Send `subscribe` + `get_sys_status` whenever the feed opens.
    pub subscribe: bool,
    pub ports: PortTable,
}

impl EngineConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            timeout: DEFAULT_TIMEOUT,
            subscribe: true,
            ports: PortTable::default(),
        }
    }
}
