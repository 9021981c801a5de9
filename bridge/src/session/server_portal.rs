use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use log::{debug, error, info, warn};

use xbridge_shared::{
    LoopHandle, ServerHandle, SessionEventData, SessionHandle, SessionId, Transport,
};

use super::{
    session_core::SessionCore, Session, SessionAction, SessionError, SessionRole, SessionState,
};

/// Count of live sessions that arrived through one portal. Shared with those
/// sessions, which may be torn down on another context's thread after a
/// forward.
#[derive(Clone, Default, Debug)]
pub struct PortalSessions(Arc<AtomicUsize>);

impl PortalSessions {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn enter(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn leave(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            });
    }
}

/// Listening side: binds a URI and receives inbound sessions
pub struct ServerPortal {
    core: SessionCore,
    uri: String,
    server: Option<ServerHandle>,
    port: u16,
    sessions: PortalSessions,
    flag_to_delete: bool,
}

impl ServerPortal {
    /// Starts listening on `uri`. Failure leaves the portal in the `Error`
    /// state.
    pub(crate) fn bind(
        transport: Arc<dyn Transport>,
        id: SessionId,
        uri: &str,
        event_loop: LoopHandle,
    ) -> Self {
        let mut portal = Self {
            core: SessionCore::new(id, SessionState::Creating, transport),
            uri: uri.to_string(),
            server: None,
            port: 0,
            sessions: PortalSessions::default(),
            flag_to_delete: false,
        };

        match portal.core.transport.bind(uri, event_loop, id) {
            Ok((server, port)) => {
                info!("portal {:?} listening on {} (port {})", id, uri, port);
                portal.server = Some(server);
                portal.port = port;
                portal.core.state = SessionState::Listening;
            }
            Err(err) => {
                error!("failed to bind portal on {}: {}", uri, err);
                portal.core.state = SessionState::Error;
            }
        }

        portal
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Port actually bound, which may differ from the URI's when it asked for 0
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn session_count(&self) -> usize {
        self.sessions.count()
    }

    /// Close was requested while sessions were still alive
    pub fn flag_to_delete(&self) -> bool {
        self.flag_to_delete
    }

    pub(crate) fn sessions(&self) -> &PortalSessions {
        &self.sessions
    }

    /// Closed, and no session arriving through it remains
    pub(crate) fn ready_to_delete(&self) -> bool {
        self.core.state == SessionState::Closing && self.sessions.count() == 0
    }

    /// Marks the deferred closing notification as delivered
    pub(crate) fn finish(&mut self) {
        debug!("portal {:?} finished", self.core.id);
        self.flag_to_delete = false;
        self.core.state = SessionState::TornDown;
    }
}

impl Session for ServerPortal {
    fn id(&self) -> SessionId {
        self.core.id
    }

    fn role(&self) -> SessionRole {
        SessionRole::ServerPortal
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
            debug!("portal {:?} already closing", id);
            return Ok(());
        }
        self.core.state = SessionState::Closing;
        if self.sessions.count() > 0 {
            self.flag_to_delete = true;
        }

        match self.server.take() {
            Some(server) => self.core.transport.unbind(server).map_err(|err| {
                error!("failed to unbind portal {:?}: {}", id, err);
                SessionError::Transport(err)
            }),
            None => Ok(()),
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
                let _ = self.close();
            }
            // only inbound sessions are torn down, never the listener itself
            SessionAction::Teardown => {
                if let Err(err) = self.core.transport.destroy_session(session) {
                    error!(
                        "failed to destroy session {:?} on portal {:?}: {}",
                        session, self.core.id, err
                    );
                }
            }
            _ => self.core.apply(action, session, event, None),
        }

        action.notifies().then_some(self.core.id)
    }
}

impl Drop for ServerPortal {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            warn!("portal {:?} dropped while bound, unbinding", self.core.id);
            if let Err(err) = self.core.transport.unbind(server) {
                error!("failed to unbind portal {:?}: {}", self.core.id, err);
            }
        }
    }
}
