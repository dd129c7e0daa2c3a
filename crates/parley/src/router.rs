//! Request routing: one decoded frame in, zero or more frames out.
//!
//! The router is shared by every connection. Per-connection protocol state
//! lives in a [`ConnectionSession`] owned by that connection's worker and
//! passed in on each call. All replies go through the session's
//! [`Outbound`], never directly to the socket.

use parley_presence::{MessageDelivery, Outbound};
use parley_protocol::{Codec, MessageBody, Request, Response, SlashCommand, TextCodec};
use parley_session::{SessionAuthenticator, SessionCheck, SessionError};
use parley_store::KeyValueStore;
use parley_transport::ConnectionId;

use crate::ParleyError;

/// Protocol state of one connection.
///
/// `UNAUTHENTICATED` while `user` is `None`, `AUTHENTICATED` otherwise.
#[derive(Debug)]
pub struct ConnectionSession {
    outbound: Outbound,
    user: Option<String>,
}

impl ConnectionSession {
    pub fn new(outbound: Outbound) -> Self {
        Self {
            outbound,
            user: None,
        }
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.outbound.conn_id()
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// The user this connection is logged in as, if any.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub(crate) fn take_user(&mut self) -> Option<String> {
        self.user.take()
    }

    fn is_user(&self, username: &str) -> bool {
        self.user.as_deref() == Some(username)
    }
}

/// Maps requests to the session, delivery and presence operations they
/// stand for.
pub struct CommandRouter<S, C = TextCodec> {
    auth: SessionAuthenticator<S>,
    delivery: MessageDelivery,
    codec: C,
}

impl<S, C> CommandRouter<S, C>
where
    S: KeyValueStore,
    C: Codec,
{
    pub fn new(auth: SessionAuthenticator<S>, delivery: MessageDelivery, codec: C) -> Self {
        Self {
            auth,
            delivery,
            codec,
        }
    }

    pub fn authenticator(&self) -> &SessionAuthenticator<S> {
        &self.auth
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Handles one frame from `session`'s connection.
    ///
    /// Every rejected request yields exactly one reply frame. A store
    /// failure is reported as `INTERNAL_ERROR` and the connection stays
    /// usable.
    ///
    /// # Errors
    /// Only when the connection's own outbound queue is closed, meaning its
    /// writer is gone and the worker should stop.
    pub async fn dispatch(
        &self,
        session: &mut ConnectionSession,
        frame: &str,
    ) -> Result<(), ParleyError> {
        let request = match self.codec.decode(frame) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(conn_id = %session.conn_id(), error = %e, "rejected frame");
                return reply(session, e.response()).await;
            }
        };

        let verb = request.verb();
        let result = match request {
            Request::Login {
                username,
                password_hash,
            } => self.handle_login(session, username, &password_hash).await,
            Request::Logout { username, token } => {
                self.handle_logout(session, &username, &token).await
            }
            Request::Message {
                username,
                token,
                body,
            } => self.handle_message(session, &username, &token, &body).await,
        };

        match result {
            Err(ParleyError::Session(e)) => {
                tracing::warn!(conn_id = %session.conn_id(), %verb, error = %e, "request failed");
                reply(session, Response::InternalError(e.to_string())).await
            }
            other => other,
        }
    }

    async fn handle_login(
        &self,
        session: &mut ConnectionSession,
        username: String,
        password_hash: &str,
    ) -> Result<(), ParleyError> {
        let token = match self.auth.login(&username, password_hash).await {
            Ok(token) => token,
            Err(SessionError::AuthFailed(name)) => {
                return reply(session, Response::AuthFailed(name)).await;
            }
            Err(e) => return Err(e.into()),
        };

        // A failed release leaves the old session to expire; the new one stands.
        if let Some(previous) = session.take_user() {
            if previous != username {
                if let Err(e) = self.auth.release(&previous, session.conn_id()).await {
                    tracing::warn!(
                        conn_id = %session.conn_id(),
                        %previous,
                        error = %e,
                        "failed to release previous user"
                    );
                }
            }
        }

        // Session is stored; now make the user routable.
        self.auth
            .presence()
            .register(&username, session.outbound.clone())
            .await;
        tracing::info!(conn_id = %session.conn_id(), %username, "user logged in");
        session.user = Some(username);

        reply(session, Response::SessionStart(token)).await
    }

    async fn handle_logout(
        &self,
        session: &mut ConnectionSession,
        username: &str,
        token: &str,
    ) -> Result<(), ParleyError> {
        let own = session.is_user(username);

        match self.auth.check(username, token).await? {
            SessionCheck::Valid | SessionCheck::Absent => {
                self.auth.logout(username).await?;
            }
            SessionCheck::Mismatch if own => {
                if self.owns_presence(session, username).await {
                    return reply(session, Response::InvalidSession).await;
                }
                // Superseded by a newer login elsewhere; nothing stored is ours.
                tracing::debug!(conn_id = %session.conn_id(), %username, "superseded logout");
            }
            SessionCheck::Mismatch => {
                return reply(session, Response::InvalidSession).await;
            }
        }

        if own {
            session.user = None;
        }
        reply(session, Response::SessionEnd).await
    }

    async fn handle_message(
        &self,
        session: &mut ConnectionSession,
        username: &str,
        token: &str,
        body: &str,
    ) -> Result<(), ParleyError> {
        if !session.is_user(username) || !self.auth.validate(username, token).await? {
            tracing::debug!(conn_id = %session.conn_id(), %username, "invalid session");
            return reply(session, Response::InvalidSession).await;
        }

        match MessageBody::parse(body) {
            Ok(MessageBody::Slash(command)) => self.execute_slash(session, command).await,
            Ok(MessageBody::At { recipient, text }) => {
                self.delivery
                    .send(&session.outbound, username, &recipient, &text)
                    .await?;
                Ok(())
            }
            Err(e) => reply(session, e.response()).await,
        }
    }

    async fn owns_presence(&self, session: &ConnectionSession, username: &str) -> bool {
        self.auth
            .presence()
            .lookup(username)
            .await
            .is_some_and(|handle| handle.conn_id() == session.conn_id())
    }

    async fn execute_slash(
        &self,
        session: &ConnectionSession,
        command: SlashCommand,
    ) -> Result<(), ParleyError> {
        match command {
            SlashCommand::ActiveUsers => {
                let users = self.auth.active_users().await?;
                reply(session, Response::ActiveUsers(users)).await
            }
            SlashCommand::Unrecognized(name) => {
                tracing::debug!(conn_id = %session.conn_id(), command = %name, "unrecognized slash command");
                reply(session, Response::NothingToDo).await
            }
        }
    }
}

async fn reply(session: &ConnectionSession, response: Response) -> Result<(), ParleyError> {
    session.outbound.send(response).await?;
    Ok(())
}
