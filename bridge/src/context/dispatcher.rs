use std::sync::Arc;

use log::{error, warn};
use parking_lot::Mutex;

use xbridge_shared::{
    Event, EventQueueError, IdentityKey, KeyGenerator, LoopHandle, MsgId, NewSessionRequest,
    RawFd, SessionEventData, SessionHandle, SessionId, Transport, TransportCallbacks,
};

use crate::session::{
    ServerSession, Session, SessionRegistry, SessionState, SharedServerSession,
};

use super::state::ContextState;

/// Reason carried by a message error the bridge raises itself, when no Msg
/// can hold an incoming payload
pub const NO_BUFFER_REASON: u32 = u32::MAX;

/// Receives the transport's callbacks for one run of a context's loop and
/// turns the ones the consumer must see into queue records
pub(crate) struct Dispatcher<'a> {
    state: &'a mut ContextState,
    transport: &'a Arc<dyn Transport>,
    registry: &'a SessionRegistry,
    keys: &'a KeyGenerator,
    event_loop: LoopHandle,
    overflow: Option<EventQueueError>,
}

impl<'a> Dispatcher<'a> {
    pub(crate) fn new(
        state: &'a mut ContextState,
        transport: &'a Arc<dyn Transport>,
        registry: &'a SessionRegistry,
        keys: &'a KeyGenerator,
        event_loop: LoopHandle,
    ) -> Self {
        Self {
            state,
            transport,
            registry,
            keys,
            event_loop,
            overflow: None,
        }
    }

    /// The first append that did not fit, if any
    pub(crate) fn finish(self) -> Option<EventQueueError> {
        self.overflow
    }

    /// Appends `event` and stops the loop. Returns false when the record was
    /// dropped.
    fn surface(&mut self, event: Event) -> bool {
        let pushed = match self.state.push_event(&event) {
            Ok(()) => true,
            Err(err) => {
                error!("dropping {:?} record: {}", event.kind(), err);
                if self.overflow.is_none() {
                    self.overflow = Some(err);
                }
                false
            }
        };
        self.transport.stop_loop(self.event_loop, true);
        pushed
    }

    /// Surfaces a record naming a parked Msg. The Msg goes back to its pool
    /// when the record is dropped.
    fn surface_parked(&mut self, msg: MsgId, event: Event) {
        if !self.surface(event) {
            self.state.release_parked(msg);
        }
    }

    fn interpret_server_event(
        &mut self,
        shared: SharedServerSession,
        handle: SessionHandle,
        event: &SessionEventData,
    ) {
        let (id, notify, torn_down, delete) = {
            let mut session = shared.lock();
            let notify = session.interpret_event(handle, event);
            (
                session.id(),
                notify,
                session.state() == SessionState::TornDown,
                session.delete_after_teardown(),
            )
        };

        if torn_down {
            self.registry.remove(handle);
            self.state.pending.remove(&handle);
            if delete {
                self.state.server_sessions.remove(&id);
            }
        }
        if let Some(session) = notify {
            self.surface(Event::SessionError {
                session,
                error_type: event.kind,
                reason: event.reason,
            });
        }
    }

    fn reject_unannounced(&self, session: SessionHandle) {
        if let Err(err) = self.transport.reject(session, 0, &[]) {
            error!("failed to reject session {:?}: {}", session, err);
        }
    }
}

impl TransportCallbacks for Dispatcher<'_> {
    fn on_session_event(
        &mut self,
        owner: Option<SessionId>,
        session: SessionHandle,
        event: SessionEventData,
    ) {
        if let Some(shared) = self.state.server_session(self.registry, session) {
            self.interpret_server_event(shared, session, &event);
            return;
        }

        let notify = match owner {
            Some(owner) => {
                if let Some(client) = self.state.clients.get_mut(&owner) {
                    client.interpret_event(session, &event)
                } else if let Some(portal) = self.state.portals.get_mut(&owner) {
                    portal.interpret_event(session, &event)
                } else {
                    warn!("{} event for unknown owner {:?}", event.kind.name(), owner);
                    None
                }
            }
            None => {
                warn!("{} event for unknown session {:?}", event.kind.name(), session);
                None
            }
        };

        if let Some(id) = notify {
            self.surface(Event::SessionError {
                session: id,
                error_type: event.kind,
                reason: event.reason,
            });
        }
    }

    fn on_session_established(&mut self, owner: SessionId, session: SessionHandle) {
        match self.state.clients.get_mut(&owner) {
            Some(client) => {
                client.on_established();
                self.surface(Event::SessionEstablished { session: owner });
            }
            None => warn!(
                "session {:?} established for unknown client {:?}",
                session, owner
            ),
        }
    }

    fn on_new_session(
        &mut self,
        portal: SessionId,
        session: SessionHandle,
        request: NewSessionRequest<'_>,
    ) {
        let portal_sessions = match self.state.portals.get(&portal) {
            Some(listening) => listening.sessions().clone(),
            None => {
                warn!("new session {:?} on unknown portal {:?}", session, portal);
                return;
            }
        };

        let id = self.keys.session_id();
        let event = match Event::new_session(portal, id, request.uri, &request.src_addr) {
            Ok(event) => event,
            Err(err) => {
                error!("rejecting new session on portal {:?}: {}", portal, err);
                self.reject_unannounced(session);
                return;
            }
        };

        // the consumer can only decide on sessions it has been told about
        if !self.surface(event) {
            warn!("rejecting new session {:?} on portal {:?}", session, portal);
            self.reject_unannounced(session);
            return;
        }

        let server_session = ServerSession::new(
            Arc::clone(self.transport),
            id,
            session,
            portal,
            portal_sessions,
            self.event_loop,
        );
        self.state
            .server_sessions
            .insert(id, Arc::new(Mutex::new(server_session)));
        self.state.pending.insert(session, id);
    }

    fn on_request(&mut self, session: SessionHandle, payload: &[u8]) {
        let Some(shared) = self.state.server_session(self.registry, session) else {
            warn!("request on unknown session {:?}", session);
            return;
        };
        let id = shared.lock().id();

        match self.state.buffer_for(payload) {
            Some(msg) => {
                let msg_id = msg.id();
                let size = msg.in_len() as u32;
                self.state.parked.insert(msg_id, msg);
                self.surface_parked(
                    msg_id,
                    Event::RequestReceived {
                        msg: msg_id,
                        size,
                        session: id,
                    },
                );
            }
            None => {
                warn!(
                    "no Msg can hold a {} byte request on session {:?}",
                    payload.len(),
                    id
                );
                self.surface(Event::MsgErrorServer {
                    msg: MsgId::from_u64(0),
                    session: id,
                    reason: NO_BUFFER_REASON,
                });
            }
        }
    }

    fn on_reply(&mut self, owner: SessionId, msg: MsgId, payload: &[u8]) {
        let Some(mut reply) = self.state.in_flight.remove(&msg) else {
            warn!("reply on client {:?} for unknown msg {:?}", owner, msg);
            return;
        };

        let written = match self.state.pools.get_mut(&reply.pool()) {
            Some(pool) => pool.write_in(&mut reply, payload),
            None => {
                warn!("reply for msg {:?} of a destroyed pool", msg);
                return;
            }
        };
        let size = reply.in_len() as u32;
        self.state.parked.insert(msg, reply);

        let event = match written {
            Ok(()) => Event::ReplyReceived { msg, size },
            Err(err) => {
                error!("reply on client {:?}: {}", owner, err);
                Event::MsgErrorClient {
                    msg,
                    reason: NO_BUFFER_REASON,
                }
            }
        };
        self.surface_parked(msg, event);
    }

    fn on_msg_error(
        &mut self,
        owner: Option<SessionId>,
        session: SessionHandle,
        msg: MsgId,
        reason: u32,
    ) {
        if let Some(failed) = self.state.in_flight.remove(&msg) {
            self.state.parked.insert(msg, failed);
        }

        if owner.is_some_and(|owner| self.state.clients.contains_key(&owner)) {
            self.surface_parked(msg, Event::MsgErrorClient { msg, reason });
            return;
        }
        match self.state.server_session(self.registry, session) {
            Some(shared) => {
                let id = shared.lock().id();
                self.surface_parked(
                    msg,
                    Event::MsgErrorServer {
                        msg,
                        session: id,
                        reason,
                    },
                );
            }
            None => {
                warn!(
                    "message error {} for msg {:?} on unknown session {:?}",
                    reason, msg, session
                );
                self.state.release_parked(msg);
            }
        }
    }

    fn on_send_complete(&mut self, session: SessionHandle, msg: MsgId) {
        match self.state.in_flight.remove(&msg) {
            Some(sent) => {
                self.state.parked.insert(msg, sent);
                self.surface_parked(msg, Event::MsgSendComplete { msg });
            }
            None => warn!(
                "send completion on session {:?} for unknown msg {:?}",
                session, msg
            ),
        }
    }

    fn on_fd_ready(&mut self, fd: RawFd, events: u32) {
        self.surface(Event::FdReady { fd, events });
    }
}
