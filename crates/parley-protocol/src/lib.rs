//! Wire protocol for Parley.
//!
//! This crate defines the "language" clients and the server speak:
//!
//! - **Types** ([`Request`], [`MessageBody`], [`Response`], [`Verb`]):
//!   what travels on the wire.
//! - **Codec** ([`Codec`] trait, [`TextCodec`]): how a colon-delimited
//!   frame becomes a typed value and back.
//! - **Errors** ([`ProtocolError`]): malformed requests, each with the
//!   rejection frame that reports it.
//!
//! # Architecture
//!
//! ```text
//! Transport (lines) → Protocol (Request) → Router (session, delivery)
//! ```
//!
//! The protocol layer knows nothing about sessions or connections.

mod codec;
mod error;
mod types;

pub use codec::{Codec, TextCodec};
pub use error::ProtocolError;
pub use types::{MessageBody, Request, Response, SlashCommand, Verb};
