//! Per-connection worker: read loop, writer task, and teardown.
//!
//! Each accepted connection gets its own task running [`handle_connection`].
//! The flow is:
//!   1. Spawn a writer task that drains the connection's outbound queue
//!   2. Loop: receive a frame → route it through the [`CommandRouter`]
//!   3. On disconnect or a fatal error: release the logged-in user, let the
//!      writer flush, close the socket

use std::sync::Arc;

use parley_presence::{Outbound, OutboundReceiver};
use parley_protocol::{Codec, Response};
use parley_store::KeyValueStore;
use parley_transport::{Connection, ConnectionId, TransportError};

use crate::router::{CommandRouter, ConnectionSession};
use crate::ParleyError;

/// Drop guard that releases the connection's user when the worker exits.
///
/// The normal path calls [`finish`](Self::finish). If the worker unwinds
/// or is cancelled first, `Drop` runs the same release on a fresh task,
/// since `Drop` cannot await.
struct SessionGuard<S: KeyValueStore, C: Codec> {
    session: ConnectionSession,
    router: Arc<CommandRouter<S, C>>,
}

impl<S: KeyValueStore, C: Codec> SessionGuard<S, C> {
    /// Releases the user, if any, and disarms the guard.
    async fn finish(&mut self) {
        if let Some(username) = self.session.take_user() {
            release(&self.router, &username, self.session.conn_id()).await;
        }
    }
}

impl<S: KeyValueStore, C: Codec> Drop for SessionGuard<S, C> {
    fn drop(&mut self) {
        let Some(username) = self.session.take_user() else {
            return;
        };
        let conn_id = self.session.conn_id();
        let router = Arc::clone(&self.router);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                release(&router, &username, conn_id).await;
            });
        }
    }
}

async fn release<S: KeyValueStore, C: Codec>(
    router: &CommandRouter<S, C>,
    username: &str,
    conn_id: ConnectionId,
) {
    if let Err(e) = router.authenticator().release(username, conn_id).await {
        tracing::warn!(%conn_id, %username, error = %e, "release on disconnect failed");
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<T, S, C>(
    conn: T,
    router: Arc<CommandRouter<S, C>>,
    outbound_capacity: usize,
) -> Result<(), ParleyError>
where
    T: Connection<Error = TransportError>,
    S: KeyValueStore,
    C: Codec + Clone,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (outbound, receiver) = Outbound::channel(conn_id, outbound_capacity);
    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        receiver,
        router.codec().clone(),
    ));

    let mut guard = SessionGuard {
        session: ConnectionSession::new(outbound),
        router: Arc::clone(&router),
    };

    let result = read_loop(conn.as_ref(), &router, &mut guard.session).await;

    guard.finish().await;
    // Dropping the guard drops this worker's outbound sender, so the writer
    // ends once it has flushed everything queued.
    drop(guard);
    if let Err(e) = writer.await {
        tracing::warn!(%conn_id, error = %e, "writer task failed");
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }

    tracing::debug!(%conn_id, "connection finished");
    result
}

async fn read_loop<T, S, C>(
    conn: &T,
    router: &CommandRouter<S, C>,
    session: &mut ConnectionSession,
) -> Result<(), ParleyError>
where
    T: Connection<Error = TransportError>,
    S: KeyValueStore,
    C: Codec,
{
    let conn_id = conn.id();

    loop {
        let frame = match conn.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!(%conn_id, user = ?session.user(), "connection closed by peer");
                return Ok(());
            }
            Err(e) if e.is_recoverable() => {
                tracing::debug!(%conn_id, error = %e, "discarded frame");
                session.outbound().send(Response::UnknownEntry).await?;
                continue;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Err(e.into());
            }
        };

        if frame.trim().is_empty() {
            continue;
        }

        if let Err(e) = router.dispatch(session, &frame).await {
            tracing::warn!(%conn_id, error = %e, "request handling failed, closing connection");
            return Err(e);
        }
    }
}

/// Writes every queued response to the socket, in order.
async fn write_loop<T, C>(conn: Arc<T>, mut receiver: OutboundReceiver, codec: C)
where
    T: Connection<Error = TransportError>,
    C: Codec,
{
    while let Some(response) = receiver.recv().await {
        if let Err(e) = conn.send(&codec.encode(&response)).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed, stopping writer");
            break;
        }
    }
}
