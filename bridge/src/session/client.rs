use std::sync::Arc;

use log::{debug, error, warn};

use xbridge_shared::{
    ConnectionHandle, LoopHandle, SessionEventData, SessionHandle, SessionId, Transport,
};

use crate::msg_pool::{Msg, MsgPool};

use super::{
    session_core::SessionCore, Session, SessionAction, SessionError, SessionRole, SessionState,
};

/// Outbound session: connects to a remote portal and sends requests
pub struct Client {
    core: SessionCore,
    uri: String,
    session: Option<SessionHandle>,
    connection: Option<ConnectionHandle>,
}

impl Client {
    /// Creates the transport session and starts connecting on `event_loop`.
    /// Failure leaves the Client in the `Error` state with nothing to tear
    /// down.
    pub(crate) fn connect(
        transport: Arc<dyn Transport>,
        id: SessionId,
        uri: &str,
        event_loop: LoopHandle,
    ) -> Self {
        let mut client = Self {
            core: SessionCore::new(id, SessionState::Creating, transport),
            uri: uri.to_string(),
            session: None,
            connection: None,
        };

        let session = match client.core.transport.create_session(uri, id) {
            Ok(session) => session,
            Err(err) => {
                error!("failed to create session to {}: {}", uri, err);
                client.core.state = SessionState::Error;
                return client;
            }
        };

        match client.core.transport.connect(session, event_loop, id) {
            Ok(connection) => {
                debug!("client {:?} connecting to {}", id, uri);
                client.session = Some(session);
                client.connection = Some(connection);
                client.core.state = SessionState::Connecting;
            }
            Err(err) => {
                error!("failed to connect session to {}: {}", uri, err);
                if let Err(err) = client.core.transport.destroy_session(session) {
                    warn!("failed to destroy session to {}: {}", uri, err);
                }
                client.core.state = SessionState::Error;
            }
        }

        client
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn session_handle(&self) -> Option<SessionHandle> {
        self.session
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.connection
    }

    pub(crate) fn on_established(&mut self) {
        if self.core.state == SessionState::Connecting {
            self.core.state = SessionState::Established;
        } else {
            warn!(
                "client {:?} established while {:?}",
                self.core.id, self.core.state
            );
        }
    }

    /// Declares `out_len` bytes of the Msg's output half and sends them. The
    /// whole input half is made available for the reply.
    pub(crate) fn send(
        &mut self,
        pool: &MsgPool,
        msg: &mut Msg,
        out_len: usize,
    ) -> Result<(), SessionError> {
        let id = self.core.id;
        if self.core.state.is_error() {
            return Err(SessionError::Unusable { id });
        }
        if self.core.state.is_closing() {
            return Err(SessionError::Closing { id });
        }
        let connection = self.connection.ok_or(SessionError::NoConnection { id })?;
        if !msg.set_out_len(out_len) {
            return Err(SessionError::MsgTooLarge {
                len: out_len,
                capacity: msg.out_capacity(),
            });
        }
        msg.reset_in_len();

        self.core
            .transport
            .send_request(connection, pool.outgoing(msg))
            .map_err(|err| {
                error!("failed to send request on client {:?}: {}", id, err);
                SessionError::Transport(err)
            })
    }
}

impl Session for Client {
    fn id(&self) -> SessionId {
        self.core.id
    }

    fn role(&self) -> SessionRole {
        SessionRole::Client
    }

    fn state(&self) -> SessionState {
        self.core.state
    }

    fn close(&mut self) -> Result<(), SessionError> {
        let id = self.core.id;
        if self.core.state.is_error() {
            return Err(SessionError::Unusable { id });
        }
        if self.core.state.is_closing() {
            debug!("client {:?} already closing", id);
            return Ok(());
        }
        self.core.state = SessionState::Closing;

        match self.connection {
            Some(connection) => self.core.transport.disconnect(connection).map_err(|err| {
                error!("failed to disconnect client {:?}: {}", id, err);
                SessionError::Transport(err)
            }),
            None => {
                warn!("client {:?} closing without a connection", id);
                Ok(())
            }
        }
    }

    fn interpret_event(
        &mut self,
        session: SessionHandle,
        event: &SessionEventData,
    ) -> Option<SessionId> {
        let action = SessionAction::for_event(event.kind);
        match action {
            SessionAction::Close => {
                // failures are logged by close
                let _ = self.close();
            }
            SessionAction::DestroyConnection => {
                self.core.apply(action, session, event, self.connection);
                if event.connection.is_none() || event.connection == self.connection {
                    self.connection = None;
                }
            }
            _ => self.core.apply(action, session, event, self.connection),
        }
        if self.core.state == SessionState::TornDown {
            self.session = None;
        }

        action.notifies().then_some(self.core.id)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if !self.core.state.is_closing() {
            warn!("client {:?} dropped while {:?}", self.core.id, self.core.state);
            // failures are logged by close
            let _ = self.close();
        }
        if let Err(err) = self.core.transport.destroy_session(session) {
            error!("failed to destroy session of client {:?}: {}", self.core.id, err);
        }
    }
}
