//! Error types for the presence layer.

use parley_transport::ConnectionId;

/// Errors that can occur when enqueueing a frame for a connection.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The connection's writer has stopped; the connection is gone.
    #[error("outbound queue for {0} is closed")]
    Closed(ConnectionId),

    /// The queue stayed full for the whole delivery timeout.
    #[error("outbound queue for {0} stayed full")]
    Timeout(ConnectionId),
}
