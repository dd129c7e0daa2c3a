//! # Parley
//!
//! Session and direct-messaging chat server.
//!
//! Clients speak a line-based, colon-delimited text protocol over TCP:
//! they log in against credentials held in a key-value store, receive a
//! session token, and use it to send direct messages (`@bob hi`) and slash
//! commands (`/u`) to other connected users.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn start() -> Result<(), ParleyError> {
//! let store = RedisStore::connect("redis://127.0.0.1:6379").await?;
//! let server = ParleyServer::builder()
//!     .bind("0.0.0.0:5000")
//!     .build(store)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod router;
mod server;
mod spawner;

pub use config::{DEFAULT_BIND_ADDR, ServerConfig};
pub use error::ParleyError;
pub use router::{CommandRouter, ConnectionSession};
pub use server::{ParleyServer, ParleyServerBuilder};
pub use spawner::{BoundedSpawner, TokioSpawner, WorkerSpawner};

pub mod prelude {
    pub use crate::{
        BoundedSpawner, ParleyError, ParleyServer, ParleyServerBuilder, ServerConfig,
        TokioSpawner, WorkerSpawner,
    };
    pub use parley_session::{SessionConfig, TokenEntropy, hash_password};
    pub use parley_store::{KeyValueStore, MemoryStore, StoreError};
    #[cfg(feature = "redis")]
    pub use parley_store::RedisStore;
}
