//! Codec trait and the colon-delimited text codec.
//!
//! A "codec" converts between frames (one line of text) and typed
//! [`Request`]/[`Response`] values. The server only talks to the
//! [`Codec`] trait, so the framing can change without touching routing.

use crate::{ProtocolError, Request, Response, Verb};

/// Converts request frames into [`Request`]s and [`Response`]s into frames.
///
/// `Send + Sync + 'static` because a single codec is shared by every
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// Decodes one request frame.
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] for an unknown verb or missing fields.
    fn decode(&self, frame: &str) -> Result<Request, ProtocolError>;

    /// Encodes one response into a frame.
    fn encode(&self, response: &Response) -> String;
}

// ---------------------------------------------------------------------------
// TextCodec
// ---------------------------------------------------------------------------

/// The colon-delimited ASCII codec.
///
/// The frame is split on `:` at most `arity` times after the verb, so the
/// last field keeps any colons it contains. Only the message body is
/// colon-safe in practice, since every other last field is a hash or token.
///
/// ## Example
///
/// ```rust
/// use parley_protocol::{Codec, Request, TextCodec};
///
/// let request = TextCodec.decode("MESSAGE:alice:t0k3n:@bob see you at 10:30").unwrap();
/// assert_eq!(
///     request,
///     Request::Message {
///         username: "alice".into(),
///         token: "t0k3n".into(),
///         body: "@bob see you at 10:30".into(),
///     }
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn decode(&self, frame: &str) -> Result<Request, ProtocolError> {
        let (raw_verb, rest) = match frame.split_once(':') {
            Some((verb, rest)) => (verb, Some(rest)),
            None => (frame, None),
        };
        let verb = Verb::parse(raw_verb.trim())
            .ok_or_else(|| ProtocolError::UnknownVerb(raw_verb.to_string()))?;

        let fields: Vec<&str> = match rest {
            Some(rest) => rest.splitn(verb.arity(), ':').collect(),
            None => Vec::new(),
        };
        if fields.len() < verb.arity() {
            return Err(ProtocolError::MissingFields {
                verb,
                expected: verb.arity(),
                got: fields.len(),
            });
        }

        let request = match verb {
            Verb::Login => Request::Login {
                username: fields[0].to_string(),
                password_hash: fields[1].to_string(),
            },
            Verb::Logout => Request::Logout {
                username: fields[0].to_string(),
                token: fields[1].to_string(),
            },
            Verb::Message => Request::Message {
                username: fields[0].to_string(),
                token: fields[1].to_string(),
                body: fields[2].to_string(),
            },
        };
        Ok(request)
    }

    fn encode(&self, response: &Response) -> String {
        response.to_string()
    }
}
