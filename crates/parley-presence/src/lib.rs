//! Presence tracking and direct-message delivery for Parley.
//!
//! - [`PresenceRegistry`]: username → live connection handle, the one
//!   piece of mutable state every connection task shares
//! - [`Outbound`]: the handle itself: a bounded queue into a
//!   connection's writer task
//! - [`MessageDelivery`]: resolves a recipient and enqueues a direct
//!   message, or tells the sender the recipient is not online
//!
//! # How it fits in the stack
//!
//! ```text
//! Router (above)  ← registers users on login, sends at-messages
//!     ↕
//! Presence (this crate)  ← who is online, and their outbound queues
//!     ↕
//! Protocol / Transport (below)  ← Response frames, ConnectionId
//! ```

mod delivery;
mod error;
mod outbound;
mod registry;

pub use delivery::{DEFAULT_DELIVERY_TIMEOUT, Delivery, MessageDelivery};
pub use error::DeliveryError;
pub use outbound::{Outbound, OutboundReceiver};
pub use registry::PresenceRegistry;
