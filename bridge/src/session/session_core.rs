use std::sync::Arc;

use log::{debug, error, warn};

use xbridge_shared::{ConnectionHandle, SessionEventData, SessionHandle, SessionId, Transport};

use super::{SessionAction, SessionState};

/// State shared by all three roles
pub(crate) struct SessionCore {
    pub(crate) id: SessionId,
    pub(crate) state: SessionState,
    pub(crate) transport: Arc<dyn Transport>,
}

impl SessionCore {
    pub(crate) fn new(id: SessionId, state: SessionState, transport: Arc<dyn Transport>) -> Self {
        Self {
            id,
            state,
            transport,
        }
    }

    /// Applies the role-independent actions. `Close` is left to the role.
    pub(crate) fn apply(
        &mut self,
        action: SessionAction,
        session: SessionHandle,
        event: &SessionEventData,
        known_connection: Option<ConnectionHandle>,
    ) {
        match action {
            SessionAction::MarkClosing | SessionAction::Rejected => self.mark_closing(),
            SessionAction::DestroyConnection => {
                match event.connection.or(known_connection) {
                    Some(connection) => {
                        if let Err(err) = self.transport.destroy_connection(connection) {
                            error!(
                                "failed to destroy connection {:?} of session {:?}: {}",
                                connection, self.id, err
                            );
                        }
                    }
                    None => warn!(
                        "connection teardown on session {:?} without a connection",
                        self.id
                    ),
                }
            }
            SessionAction::Teardown => self.teardown(session),
            SessionAction::Unhandled => warn!(
                "unhandled event {} ({}) on session {:?}",
                event.kind.name(),
                event.reason,
                self.id
            ),
            SessionAction::Ignore | SessionAction::Close => {}
        }
    }

    pub(crate) fn mark_closing(&mut self) {
        if !self.state.is_closing() {
            self.state = SessionState::Closing;
        }
    }

    pub(crate) fn teardown(&mut self, session: SessionHandle) {
        if self.state == SessionState::TornDown {
            debug!("session {:?} already torn down", self.id);
            return;
        }
        if !self.state.is_closing() {
            warn!(
                "session {:?} torn down without closing first, state was {:?}",
                self.id, self.state
            );
        }
        if let Err(err) = self.transport.destroy_session(session) {
            error!("failed to destroy session {:?}: {}", self.id, err);
        }
        self.state = SessionState::TornDown;
    }
}
