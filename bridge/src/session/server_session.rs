use std::sync::Arc;

use log::{debug, error, warn};

use xbridge_shared::{
    ConnectionHandle, LoopHandle, SessionEventData, SessionHandle, SessionId, Transport,
    TransportError,
};

use crate::msg_pool::{Msg, MsgPool};

use super::{
    session_core::SessionCore, PortalSessions, Session, SessionAction, SessionError, SessionRole,
    SessionState,
};

/// Inbound session that arrived through a ServerPortal
pub struct ServerSession {
    core: SessionCore,
    session: SessionHandle,
    portal: SessionId,
    portal_sessions: PortalSessions,
    event_loop: LoopHandle,
    connection: Option<ConnectionHandle>,
    ignore_first_disconnect: bool,
    delete_after_teardown: bool,
}

impl ServerSession {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        id: SessionId,
        session: SessionHandle,
        portal: SessionId,
        portal_sessions: PortalSessions,
        event_loop: LoopHandle,
    ) -> Self {
        portal_sessions.enter();
        Self {
            core: SessionCore::new(id, SessionState::Creating, transport),
            session,
            portal,
            portal_sessions,
            event_loop,
            connection: None,
            ignore_first_disconnect: false,
            delete_after_teardown: false,
        }
    }

    pub fn session_handle(&self) -> SessionHandle {
        self.session
    }

    pub fn portal(&self) -> SessionId {
        self.portal
    }

    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.connection
    }

    pub fn ignores_first_disconnect(&self) -> bool {
        self.ignore_first_disconnect
    }

    /// Rejected sessions are dropped by the context once torn down
    pub fn delete_after_teardown(&self) -> bool {
        self.delete_after_teardown
    }

    pub(crate) fn accept(&mut self) -> Result<(), SessionError> {
        self.decide("accept")?;
        self.core
            .transport
            .accept(self.session, None)
            .map_err(|err| self.failed("accept", err))?;
        self.core.state = SessionState::Listening;
        Ok(())
    }

    /// Accepts the session on behalf of the portal listening on `uri`. The
    /// connection on this context then disconnects once, which is absorbed.
    pub(crate) fn forward(&mut self, uri: &str) -> Result<(), SessionError> {
        self.decide("forward")?;
        self.core
            .transport
            .accept(self.session, Some(uri))
            .map_err(|err| self.failed("forward", err))?;
        debug!("session {:?} forwarded to {}", self.core.id, uri);
        self.ignore_first_disconnect = true;
        self.core.state = SessionState::Listening;
        Ok(())
    }

    pub(crate) fn reject(&mut self, reason: u32, user_context: &[u8]) -> Result<(), SessionError> {
        self.decide("reject")?;
        self.core
            .transport
            .reject(self.session, reason, user_context)
            .map_err(|err| self.failed("reject", err))?;
        self.delete_after_teardown = true;
        self.core.state = SessionState::Closing;
        Ok(())
    }

    pub(crate) fn send_response(
        &mut self,
        pool: &MsgPool,
        msg: &mut Msg,
        out_len: usize,
    ) -> Result<(), SessionError> {
        let id = self.core.id;
        if self.core.state.is_closing() {
            return Err(SessionError::Closing { id });
        }
        if self.core.state == SessionState::Creating {
            return Err(SessionError::InvalidState {
                id,
                operation: "send a response",
                state: self.core.state,
            });
        }
        if !msg.set_out_len(out_len) {
            return Err(SessionError::MsgTooLarge {
                len: out_len,
                capacity: msg.out_capacity(),
            });
        }
        msg.reset_in_len();

        self.core
            .transport
            .send_response(self.session, pool.outgoing(msg))
            .map_err(|err| {
                error!("failed to send response on session {:?}: {}", id, err);
                SessionError::Transport(err)
            })
    }

    fn decide(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.core.state != SessionState::Creating {
            return Err(SessionError::InvalidState {
                id: self.core.id,
                operation,
                state: self.core.state,
            });
        }
        Ok(())
    }

    fn failed(&self, operation: &str, err: TransportError) -> SessionError {
        error!("failed to {} session {:?}: {}", operation, self.core.id, err);
        SessionError::Transport(err)
    }

    fn teardown(&mut self) {
        let was_torn_down = self.core.state == SessionState::TornDown;
        self.core.teardown(self.session);
        if !was_torn_down {
            self.portal_sessions.leave();
        }
    }
}

impl Session for ServerSession {
    fn id(&self) -> SessionId {
        self.core.id
    }

    fn role(&self) -> SessionRole {
        SessionRole::ServerSession
    }

    fn state(&self) -> SessionState {
        self.core.state
    }

    fn close(&mut self) -> Result<(), SessionError> {
        let id = self.core.id;
        if self.core.state.is_closing() {
            debug!("session {:?} already closing", id);
            return Ok(());
        }
        self.core.state = SessionState::Closing;

        let connection = self.connection.or_else(|| {
            self.core
                .transport
                .connection(self.session, self.event_loop)
        });
        match connection {
            Some(connection) => self.core.transport.disconnect(connection).map_err(|err| {
                error!("failed to disconnect session {:?}: {}", id, err);
                SessionError::Transport(err)
            }),
            None => {
                warn!("session {:?} closing without a connection", id);
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
            SessionAction::Ignore => {
                if let Some(connection) = event.connection {
                    self.connection = Some(connection);
                    if self.core.state == SessionState::Listening {
                        self.core.state = SessionState::Established;
                    }
                }
            }
            SessionAction::Close if self.ignore_first_disconnect => {
                debug!(
                    "session {:?} absorbing the disconnect of its forwarded connection",
                    self.core.id
                );
                self.ignore_first_disconnect = false;
                self.connection = None;
            }
            SessionAction::Close => {
                let _ = self.close();
            }
            SessionAction::DestroyConnection => {
                self.core.apply(action, session, event, self.connection);
                if event.connection.is_none() || event.connection == self.connection {
                    self.connection = None;
                }
            }
            SessionAction::Teardown => self.teardown(),
            _ => self.core.apply(action, session, event, self.connection),
        }

        action.notifies().then_some(self.core.id)
    }
}
