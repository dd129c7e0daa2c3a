//! Unified error type for the Parley server.

use parley_presence::DeliveryError;
use parley_protocol::ProtocolError;
use parley_session::SessionError;
use parley_store::StoreError;
use parley_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A malformed request.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, token, store access through sessions).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A direct store access failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A connection's own outbound queue is gone.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// The store could not be reached at startup.
    #[error("key-value store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}
