//! Transport abstraction layer for Parley.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! how frames reach the server. A frame is one protocol line; transports
//! strip the line terminator on receive and append it on send.
//!
//! # Feature Flags
//!
//! - `tcp` (default): newline-delimited frames over plain TCP via
//!   `tokio-util`'s `LinesCodec`

mod error;
#[cfg(feature = "tcp")]
mod tcp;

pub use error::TransportError;
#[cfg(feature = "tcp")]
pub use tcp::{DEFAULT_MAX_FRAME_LEN, TcpConnection, TcpTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Process-unique id of one accepted connection.
///
/// Ids are handed out in accept order and never reused. Presence entries
/// carry one so a departing connection can tell whether the entry for its
/// user is still its own. Prints as `conn-<n>` in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Listens for clients and yields one [`Connection`] per accepted stream.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Next accepted client. Errors here are per-accept; the listener stays up.
    fn accept(&mut self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// A single connection that exchanges text frames.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    fn send(&self, frame: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the peer closed the stream.
    fn recv(&self) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    /// Flushes pending output and closes the write side.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Process-unique id, assigned on accept.
    fn id(&self) -> ConnectionId;

    /// Returns the remote peer's address.
    fn peer_addr(&self) -> SocketAddr;
}
