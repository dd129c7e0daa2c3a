//! The handle other tasks use to push frames to a connection.

use std::time::Duration;

use parley_protocol::Response;
use parley_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::DeliveryError;

/// Receiving end of a connection's outbound queue, drained by its writer.
pub type OutboundReceiver = mpsc::Receiver<Response>;

/// A connection's outbound queue, tagged with the connection it feeds.
///
/// This is the "connection handle" stored in the presence registry. It is
/// cheap to clone (an `mpsc::Sender` plus an id); every clone feeds the same
/// single writer task, so frames to one connection never interleave.
#[derive(Debug, Clone)]
pub struct Outbound {
    conn_id: ConnectionId,
    sender: mpsc::Sender<Response>,
}

impl Outbound {
    /// Creates a bounded outbound queue for `conn_id`.
    ///
    /// `capacity` is the number of frames that may wait for the writer
    /// before senders start to block.
    pub fn channel(conn_id: ConnectionId, capacity: usize) -> (Self, OutboundReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { conn_id, sender }, receiver)
    }

    /// The connection this handle writes to.
    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Returns `true` once the writer has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Enqueues a frame, waiting for room in the queue.
    ///
    /// Used for replies on the worker's own connection, where waiting on a
    /// slow client only slows that client down.
    pub async fn send(&self, response: Response) -> Result<(), DeliveryError> {
        self.sender
            .send(response)
            .await
            .map_err(|_| DeliveryError::Closed(self.conn_id))
    }

    /// Enqueues a frame, giving up after `timeout` if the queue stays full.
    pub async fn send_timeout(
        &self,
        response: Response,
        timeout: Duration,
    ) -> Result<(), DeliveryError> {
        self.sender
            .send_timeout(response, timeout)
            .await
            .map_err(|e| match e {
                mpsc::error::SendTimeoutError::Timeout(_) => {
                    DeliveryError::Timeout(self.conn_id)
                }
                mpsc::error::SendTimeoutError::Closed(_) => {
                    DeliveryError::Closed(self.conn_id)
                }
            })
    }
}
