//! `ParleyServer` builder and server loop.
//!
//! This is the entry point for running a Parley chat server. It ties
//! together all the layers: transport → protocol → session → presence.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parley_presence::{MessageDelivery, PresenceRegistry};
use parley_protocol::{Codec, TextCodec};
use parley_session::{SessionAuthenticator, SessionConfig};
use parley_store::KeyValueStore;
use parley_transport::{TcpTransport, Transport};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::router::CommandRouter;
use crate::spawner::{TokioSpawner, WorkerSpawner};
use crate::ParleyError;

/// Builder for configuring and starting a Parley server.
///
/// # Example
///
/// ```rust,no_run
/// use parley::prelude::*;
///
/// # async fn start() -> Result<(), ParleyError> {
/// let server = ParleyServer::builder()
///     .bind("0.0.0.0:5000")
///     .build(MemoryStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParleyServerBuilder {
    config: ServerConfig,
}

impl ParleyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    pub fn with_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the longest accepted frame, in bytes.
    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.config.max_frame_len = len;
        self
    }

    /// Sets the per-connection outbound queue capacity.
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.config.outbound_capacity = capacity;
        self
    }

    /// Sets how long a direct message may wait on a full recipient queue.
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.config.delivery_timeout = timeout;
        self
    }

    /// Sets how often expired sessions are reaped from presence.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Whether to empty the active-user set at startup.
    pub fn clear_stale_on_start(mut self, clear: bool) -> Self {
        self.config.clear_stale_on_start = clear;
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    /// Builds the server with one Tokio task per connection.
    pub async fn build<S: KeyValueStore>(
        self,
        store: S,
    ) -> Result<ParleyServer<S, TokioSpawner>, ParleyError> {
        self.build_with_spawner(store, TokioSpawner).await
    }

    /// Builds the server with a custom [`WorkerSpawner`].
    ///
    /// # Errors
    /// - [`ParleyError::StoreUnavailable`] if the store does not answer a
    ///   ping.
    /// - [`ParleyError::Transport`] if the address cannot be bound.
    pub async fn build_with_spawner<S: KeyValueStore, W: WorkerSpawner>(
        self,
        store: S,
        spawner: W,
    ) -> Result<ParleyServer<S, W>, ParleyError> {
        store.ping().await.map_err(ParleyError::StoreUnavailable)?;

        let config = self.config;
        let presence = Arc::new(PresenceRegistry::new());
        let auth = SessionAuthenticator::new(store, Arc::clone(&presence), config.session.clone());
        if config.clear_stale_on_start {
            auth.clear_active_users().await?;
        }
        let delivery = MessageDelivery::new(presence, config.delivery_timeout);
        let router = Arc::new(CommandRouter::new(auth, delivery, TextCodec));

        let transport = TcpTransport::bind(config.bind_addr.as_str())
            .await?
            .with_max_frame_len(config.max_frame_len);

        Ok(ParleyServer {
            transport,
            router,
            spawner,
            config,
        })
    }
}

/// A Parley chat server bound to its address.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct ParleyServer<S, W = TokioSpawner, C = TextCodec> {
    transport: TcpTransport,
    router: Arc<CommandRouter<S, C>>,
    spawner: W,
    config: ServerConfig,
}

impl ParleyServer<(), TokioSpawner> {
    /// Creates a new builder.
    pub fn builder() -> ParleyServerBuilder {
        ParleyServerBuilder::new()
    }
}

impl<S, W, C> ParleyServer<S, W, C>
where
    S: KeyValueStore,
    W: WorkerSpawner,
    C: Codec + Clone,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ParleyError> {
        Ok(self.transport.local_addr()?)
    }

    /// The authenticator, for account management before the server runs.
    pub fn authenticator(&self) -> &SessionAuthenticator<S> {
        self.router.authenticator()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ParleyError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Accept failures are logged and the loop continues. Workers already
    /// running are not interrupted by shutdown; they end when their
    /// clients disconnect.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ParleyError>
    where
        F: Future<Output = ()> + Send,
    {
        let ParleyServer {
            mut transport,
            router,
            spawner,
            config,
        } = self;
        tokio::pin!(shutdown);

        let sweeper = spawn_sweeper(Arc::clone(&router), config.sweep_interval);
        tracing::info!(addr = %config.bind_addr, "Parley server running");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Parley server shutting down");
                    break;
                }
                accepted = transport.accept() => match accepted {
                    Ok(conn) => {
                        let router = Arc::clone(&router);
                        let capacity = config.outbound_capacity;
                        spawner
                            .spawn(async move {
                                if let Err(e) = handle_connection(conn, router, capacity).await {
                                    tracing::debug!(error = %e, "connection ended with error");
                                }
                            })
                            .await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        sweeper.abort();
        Ok(())
    }
}

/// Periodically drops presence entries whose session expired.
fn spawn_sweeper<S, C>(router: Arc<CommandRouter<S, C>>, interval: Duration) -> JoinHandle<()>
where
    S: KeyValueStore,
    C: Codec,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = router.authenticator().reap_expired().await {
                tracing::warn!(error = %e, "presence sweep failed");
            }
        }
    })
}
