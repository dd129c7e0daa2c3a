//! Server configuration.

use std::time::Duration;

use parley_presence::DEFAULT_DELIVERY_TIMEOUT;
use parley_session::SessionConfig;
use parley_transport::DEFAULT_MAX_FRAME_LEN;

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

/// Everything the listener and its workers can be tuned with.
///
/// Built through [`ParleyServerBuilder`](crate::ParleyServerBuilder);
/// every field has a default.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on. Default: `127.0.0.1:5000`.
    pub bind_addr: String,

    /// Longest accepted frame, in bytes. Longer frames are discarded and
    /// answered with `UNKNOWN_ENTRY`. Default: 8 KiB.
    pub max_frame_len: usize,

    /// Frames that may wait in a connection's outbound queue before
    /// senders block. Default: 64.
    pub outbound_capacity: usize,

    /// How long a sender waits on a full recipient queue before the
    /// message is dropped. Default: 2 seconds.
    pub delivery_timeout: Duration,

    /// How often presence entries with expired sessions are reaped.
    /// Default: 30 seconds.
    pub sweep_interval: Duration,

    /// Empty the active-user set when the server starts. Entries left by a
    /// previous process have no connection behind them. Default: `true`.
    pub clear_stale_on_start: bool,

    /// Session TTL, token size and key layout.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            outbound_capacity: 64,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            sweep_interval: Duration::from_secs(30),
            clear_stale_on_start: true,
            session: SessionConfig::default(),
        }
    }
}
