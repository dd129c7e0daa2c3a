//! Error types for the protocol layer.
//!
//! Every variant is a malformed request: it is reported back to the
//! sender and the connection stays open.

use crate::{Response, Verb};

/// Errors that can occur while decoding a request frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The first field is not a known verb.
    #[error("unknown verb {0:?}")]
    UnknownVerb(String),

    /// The frame has fewer fields than its verb requires.
    #[error("{verb} expects {expected} fields, got {got}")]
    MissingFields {
        verb: Verb,
        expected: usize,
        got: usize,
    },

    /// A message body that is neither a slash command nor an at-message.
    #[error("unknown message body")]
    UnknownBody,

    /// An `@` body that does not match `@<recipient> <text>`.
    #[error("malformed at-message")]
    MalformedAtMessage,
}

impl ProtocolError {
    /// The rejection frame sent back to the client.
    pub fn response(&self) -> Response {
        match self {
            Self::MalformedAtMessage => Response::WrongEntry,
            Self::UnknownVerb(_) | Self::MissingFields { .. } | Self::UnknownBody => {
                Response::UnknownEntry
            }
        }
    }
}
