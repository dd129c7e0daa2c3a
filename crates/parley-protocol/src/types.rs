//! Core protocol types for Parley's wire format.
//!
//! Requests are what a client sends; [`Response`]s are what the server
//! writes back, either as a reply to the sender or as a direct message
//! pushed to another connection.

use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Verb
// ---------------------------------------------------------------------------

/// The first colon-delimited field of a request frame.
///
/// The set of verbs is closed: anything that does not parse into one of
/// these variants is an unknown request, reported to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Login,
    Logout,
    Message,
}

impl Verb {
    /// Parses a verb, ignoring ASCII case.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("LOGIN") {
            Some(Self::Login)
        } else if raw.eq_ignore_ascii_case("LOGOUT") {
            Some(Self::Logout)
        } else if raw.eq_ignore_ascii_case("MESSAGE") {
            Some(Self::Message)
        } else {
            None
        }
    }

    /// Number of fields that follow the verb.
    pub fn arity(self) -> usize {
        match self {
            Self::Login | Self::Logout => 2,
            Self::Message => 3,
        }
    }

    /// The canonical (upper-case) spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::Message => "MESSAGE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A decoded client request.
///
/// The message body is kept raw here. It is only classified into a
/// [`MessageBody`] after the session token has been validated, so a bad
/// token is always reported as such whatever the body looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `LOGIN:<username>:<password_hash>`
    Login {
        username: String,
        password_hash: String,
    },

    /// `LOGOUT:<username>:<token>`
    Logout { username: String, token: String },

    /// `MESSAGE:<username>:<token>:<body>`
    Message {
        username: String,
        token: String,
        body: String,
    },
}

impl Request {
    /// The verb this request was sent with.
    pub fn verb(&self) -> Verb {
        match self {
            Self::Login { .. } => Verb::Login,
            Self::Logout { .. } => Verb::Logout,
            Self::Message { .. } => Verb::Message,
        }
    }

    /// The username named in the request.
    pub fn username(&self) -> &str {
        match self {
            Self::Login { username, .. }
            | Self::Logout { username, .. }
            | Self::Message { username, .. } => username,
        }
    }
}

// ---------------------------------------------------------------------------
// MessageBody
// ---------------------------------------------------------------------------

/// A bot-style command sent as `/<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    /// `/u`: list the active users.
    ActiveUsers,
    /// Any other name. Executing it does nothing.
    Unrecognized(String),
}

impl SlashCommand {
    fn from_name(name: &str) -> Self {
        match name {
            "u" => Self::ActiveUsers,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

/// The classified body of a `MESSAGE` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// `/<name>`
    Slash(SlashCommand),
    /// `@<recipient> <text>`
    At { recipient: String, text: String },
}

impl MessageBody {
    /// Classifies a raw message body.
    ///
    /// # Errors
    /// - [`ProtocolError::MalformedAtMessage`] for an `@` body that does not
    ///   match `@<recipient>\s+<text>`
    /// - [`ProtocolError::UnknownBody`] for any body that is neither a slash
    ///   command nor an at-message
    pub fn parse(body: &str) -> Result<Self, ProtocolError> {
        if let Some(rest) = body.strip_prefix('/') {
            return Ok(Self::Slash(SlashCommand::from_name(rest)));
        }

        if let Some(rest) = body.strip_prefix('@') {
            let split = rest
                .find(char::is_whitespace)
                .ok_or(ProtocolError::MalformedAtMessage)?;
            let (recipient, text) = rest.split_at(split);
            let text = text.trim_start();

            if recipient.is_empty() || recipient.contains(':') || text.is_empty() {
                return Err(ProtocolError::MalformedAtMessage);
            }
            return Ok(Self::At {
                recipient: recipient.to_string(),
                text: text.to_string(),
            });
        }

        Err(ProtocolError::UnknownBody)
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Every frame the server can write to a client.
///
/// `Display` renders the exact wire text (without the line terminator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `SESSION_START:<token>`
    SessionStart(String),
    /// `AUTH_FAILED:<username>`
    AuthFailed(String),
    /// `SESSION_END`
    SessionEnd,
    /// `INVALID_SESSION:Token expired`
    InvalidSession,
    /// `UNKNOWN_ENTRY:Unknown message type.`
    UnknownEntry,
    /// `WRONG_ENTRY:No message to send.`
    WrongEntry,
    /// `ACTIVE_USERS:<a,b,c>`
    ActiveUsers(Vec<String>),
    /// `<sender>: <body>`
    Direct { sender: String, body: String },
    /// `NOT_FOUND: No user found!`
    NotFound,
    /// `REQUEST_PROCESSED:Nothing to do!`
    NothingToDo,
    /// `INTERNAL_ERROR:<reason>`
    InternalError(String),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionStart(token) => write!(f, "SESSION_START:{token}"),
            Self::AuthFailed(username) => write!(f, "AUTH_FAILED:{username}"),
            Self::SessionEnd => f.write_str("SESSION_END"),
            Self::InvalidSession => f.write_str("INVALID_SESSION:Token expired"),
            Self::UnknownEntry => f.write_str("UNKNOWN_ENTRY:Unknown message type."),
            Self::WrongEntry => f.write_str("WRONG_ENTRY:No message to send."),
            Self::ActiveUsers(users) => write!(f, "ACTIVE_USERS:{}", users.join(",")),
            Self::Direct { sender, body } => write!(f, "{sender}: {body}"),
            Self::NotFound => f.write_str("NOT_FOUND: No user found!"),
            Self::NothingToDo => f.write_str("REQUEST_PROCESSED:Nothing to do!"),
            Self::InternalError(reason) => write!(f, "INTERNAL_ERROR:{reason}"),
        }
    }
}
