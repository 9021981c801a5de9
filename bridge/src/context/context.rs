use std::sync::Arc;

use log::{debug, info, warn};

use xbridge_shared::{
    Event, EventQueue, EventReader, KeyGenerator, LoopHandle, MsgId, PoolId, RawFd,
    SessionEventKind, SessionId, Transport,
};

use crate::{
    config::{ContextConfig, MsgPoolConfig},
    msg_pool::{Msg, MsgPool},
    session::{
        Client, ServerPortal, ServerSession, Session, SessionError, SessionRegistry, SessionRole,
        SessionState,
    },
};

use super::{dispatcher::Dispatcher, state::ContextState, ContextError, LoopBreaker, SendError};

/// Records surfaced since the last reset, as raw queue bytes
#[derive(Clone, Copy, Debug)]
pub struct PendingEvents<'a> {
    pub bytes: &'a [u8],
    pub count: usize,
}

/// One event loop with its event queue, Msg pools and the sessions created on
/// it. Everything here runs on the thread that drives the loop.
pub struct Context {
    transport: Arc<dyn Transport>,
    registry: Arc<SessionRegistry>,
    keys: Arc<KeyGenerator>,
    event_loop: LoopHandle,
    state: ContextState,
}

impl Context {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<SessionRegistry>,
        keys: Arc<KeyGenerator>,
        config: &ContextConfig,
    ) -> Result<Self, ContextError> {
        let queue = EventQueue::new(config.event_queue_size)?;
        let event_loop = transport
            .create_loop()
            .map_err(ContextError::LoopCreation)?;
        debug!(
            "created context on loop {:?} with a {} byte event queue",
            event_loop, config.event_queue_size
        );

        Ok(Self {
            transport,
            registry,
            keys,
            event_loop,
            state: ContextState::new(queue),
        })
    }

    pub fn event_loop(&self) -> LoopHandle {
        self.event_loop
    }

    pub fn queue_capacity(&self) -> usize {
        self.state.queue.capacity()
    }

    // Event loop

    /// Runs the loop for at most `timeout_us` microseconds (negative waits
    /// forever) and returns the number of pending records. Returns at once if
    /// records are still pending from an earlier run.
    pub fn run_event_loop(&mut self, timeout_us: i64) -> Result<usize, ContextError> {
        self.finish_portals()?;
        if self.state.events_num > 0 {
            debug!(
                "{} events pending, not entering the loop",
                self.state.events_num
            );
            return Ok(self.state.events_num);
        }

        let timeout_ms = timeout_ms(timeout_us);
        let transport = Arc::clone(&self.transport);
        let mut dispatcher = Dispatcher::new(
            &mut self.state,
            &transport,
            &self.registry,
            &self.keys,
            self.event_loop,
        );
        let result = transport.run_loop(self.event_loop, timeout_ms, &mut dispatcher);
        let overflow = dispatcher.finish();

        result?;
        if let Some(err) = overflow {
            return Err(ContextError::Queue(err));
        }
        self.finish_portals()?;
        Ok(self.state.events_num)
    }

    pub fn break_event_loop(&self, is_self_thread: bool) {
        self.transport.stop_loop(self.event_loop, is_self_thread);
    }

    pub fn loop_breaker(&self) -> LoopBreaker {
        LoopBreaker::new(Arc::clone(&self.transport), self.event_loop)
    }

    /// Readiness of `fd` is reported as `FdReady` records
    pub fn add_event_loop_fd(&mut self, fd: RawFd, events: u32) -> Result<(), ContextError> {
        self.transport.add_fd(self.event_loop, fd, events)?;
        Ok(())
    }

    pub fn remove_event_loop_fd(&mut self, fd: RawFd) -> Result<(), ContextError> {
        self.transport.remove_fd(self.event_loop, fd)?;
        Ok(())
    }

    // Event queue

    pub fn pending(&self) -> PendingEvents<'_> {
        PendingEvents {
            bytes: self.state.pending_bytes(),
            count: self.state.events_num,
        }
    }

    /// Forgets every pending record. Call once the consumer has read them.
    pub fn reset_counters(&mut self) {
        self.state.reset_counters();
    }

    /// Decodes the pending records, then resets
    pub fn drain(&mut self) -> Result<Vec<Event>, ContextError> {
        let events = EventReader::new(self.state.pending_bytes())
            .collect::<Result<Vec<_>, _>>()?;
        self.state.reset_counters();
        Ok(events)
    }

    // Msg pools

    pub fn create_msg_pool(&mut self, config: MsgPoolConfig) -> Result<PoolId, ContextError> {
        let id = self.keys.pool_id();
        let pool = MsgPool::new(Arc::clone(&self.transport), id, config)?;
        self.state.pools.insert(id, pool);
        Ok(id)
    }

    /// Fails while the transport still owns Msgs of the pool
    pub fn destroy_msg_pool(&mut self, id: PoolId) -> Result<(), ContextError> {
        if !self.state.pools.contains_key(&id) {
            return Err(ContextError::UnknownPool { id });
        }
        let in_flight = self
            .state
            .in_flight
            .keys()
            .filter(|msg| msg.pool() == id)
            .count();
        if in_flight > 0 {
            return Err(ContextError::PoolBusy { id, in_flight });
        }

        self.state.parked.retain(|msg, _| msg.pool() != id);
        self.state.pools.remove(&id);
        Ok(())
    }

    pub fn msg_pool(&self, id: PoolId) -> Option<&MsgPool> {
        self.state.pools.get(&id)
    }

    pub fn msg_pool_mut(&mut self, id: PoolId) -> Option<&mut MsgPool> {
        self.state.pools.get_mut(&id)
    }

    /// `None` when every Msg of the pool is out
    pub fn acquire_msg(&mut self, pool: PoolId) -> Result<Option<Msg>, ContextError> {
        let pool = self
            .state
            .pools
            .get_mut(&pool)
            .ok_or(ContextError::UnknownPool { id: pool })?;
        Ok(pool.acquire())
    }

    pub fn release_msg(&mut self, msg: Msg) -> Result<(), ContextError> {
        let id = msg.pool();
        let pool = self
            .state
            .pools
            .get_mut(&id)
            .ok_or(ContextError::UnknownPool { id })?;
        pool.release(msg)
            .map_err(|msg| ContextError::UnknownPool { id: msg.pool() })
    }

    /// Takes a Msg the transport handed back with a received request or
    /// reply, a send completion or a message error
    pub fn take_msg(&mut self, id: MsgId) -> Option<Msg> {
        self.state.parked.remove(&id)
    }

    // Sessions

    pub fn create_client(&mut self, uri: &str) -> Result<SessionId, ContextError> {
        let id = self.keys.session_id();
        let client = Client::connect(Arc::clone(&self.transport), id, uri, self.event_loop);
        if client.state().is_error() {
            return Err(ContextError::SessionCreation {
                role: SessionRole::Client,
                uri: uri.to_string(),
            });
        }
        self.state.clients.insert(id, client);
        Ok(id)
    }

    pub fn create_portal(&mut self, uri: &str) -> Result<SessionId, ContextError> {
        let id = self.keys.session_id();
        let portal = ServerPortal::bind(Arc::clone(&self.transport), id, uri, self.event_loop);
        if portal.state().is_error() {
            return Err(ContextError::SessionCreation {
                role: SessionRole::ServerPortal,
                uri: uri.to_string(),
            });
        }
        self.state.portals.insert(id, portal);
        Ok(id)
    }

    pub fn client(&self, id: SessionId) -> Option<&Client> {
        self.state.clients.get(&id)
    }

    pub fn portal(&self, id: SessionId) -> Option<&ServerPortal> {
        self.state.portals.get(&id)
    }

    pub fn session_state(&self, id: SessionId) -> Option<SessionState> {
        if let Some(client) = self.state.clients.get(&id) {
            return Some(client.state());
        }
        if let Some(portal) = self.state.portals.get(&id) {
            return Some(portal.state());
        }
        self.state
            .server_sessions
            .get(&id)
            .map(|session| session.lock().state())
    }

    pub fn accept_session(&mut self, id: SessionId) -> Result<(), ContextError> {
        self.decide_session(id, |session| session.accept())
    }

    /// Accepts the session on behalf of the portal listening on `uri`
    pub fn forward_session(&mut self, id: SessionId, uri: &str) -> Result<(), ContextError> {
        self.decide_session(id, |session| session.forward(uri))
    }

    pub fn reject_session(
        &mut self,
        id: SessionId,
        reason: u32,
        user_context: &[u8],
    ) -> Result<(), ContextError> {
        self.decide_session(id, |session| session.reject(reason, user_context))
    }

    /// Starts closing a session of any role
    pub fn close_session(&mut self, id: SessionId) -> Result<(), ContextError> {
        if let Some(client) = self.state.clients.get_mut(&id) {
            client.close()?;
            return Ok(());
        }
        if let Some(portal) = self.state.portals.get_mut(&id) {
            portal.close()?;
            return self.finish_portals();
        }
        let session = self
            .state
            .server_sessions
            .get(&id)
            .ok_or(ContextError::UnknownSession { id })?;
        session.lock().close()?;
        Ok(())
    }

    /// Forgets a session. Call after its teardown was surfaced.
    pub fn destroy_session(&mut self, id: SessionId) -> Result<(), ContextError> {
        let state = self.session_state(id);
        match state {
            None => return Err(ContextError::UnknownSession { id }),
            Some(state) if state != SessionState::TornDown && !state.is_error() => {
                warn!("destroying session {:?} while {:?}", id, state);
            }
            Some(_) => {}
        }

        if self.state.clients.remove(&id).is_some() || self.state.portals.remove(&id).is_some() {
            return Ok(());
        }
        if let Some(session) = self.state.server_sessions.remove(&id) {
            let handle = session.lock().session_handle();
            self.state.pending.remove(&handle);
            self.registry.remove(handle);
        }
        Ok(())
    }

    pub fn send_request(
        &mut self,
        client: SessionId,
        mut msg: Msg,
        out_len: usize,
    ) -> Result<(), SendError> {
        let Some(session) = self.state.clients.get_mut(&client) else {
            let error = self.unknown_or_wrong_role(client, "send a request");
            return Err(SendError { msg, error });
        };
        let Some(pool) = self.state.pools.get(&msg.pool()) else {
            let error = ContextError::UnknownPool { id: msg.pool() };
            return Err(SendError { msg, error });
        };

        match session.send(pool, &mut msg, out_len) {
            Ok(()) => {
                self.state.in_flight.insert(msg.id(), msg);
                Ok(())
            }
            Err(err) => Err(SendError {
                msg,
                error: err.into(),
            }),
        }
    }

    pub fn send_response(
        &mut self,
        session: SessionId,
        mut msg: Msg,
        out_len: usize,
    ) -> Result<(), SendError> {
        let Some(shared) = self.state.server_sessions.get(&session).cloned() else {
            let error = self.unknown_or_wrong_role(session, "send a response");
            return Err(SendError { msg, error });
        };
        let Some(pool) = self.state.pools.get(&msg.pool()) else {
            let error = ContextError::UnknownPool { id: msg.pool() };
            return Err(SendError { msg, error });
        };

        let sent = shared.lock().send_response(pool, &mut msg, out_len);
        match sent {
            Ok(()) => {
                self.state.in_flight.insert(msg.id(), msg);
                Ok(())
            }
            Err(err) => Err(SendError {
                msg,
                error: err.into(),
            }),
        }
    }

    fn decide_session<F>(&mut self, id: SessionId, decide: F) -> Result<(), ContextError>
    where
        F: FnOnce(&mut ServerSession) -> Result<(), SessionError>,
    {
        let Some(shared) = self.state.server_sessions.get(&id).cloned() else {
            return Err(self.unknown_or_wrong_role(id, "accept, forward or reject"));
        };

        let handle = {
            let mut session = shared.lock();
            decide(&mut *session)?;
            session.session_handle()
        };
        self.state.pending.remove(&handle);
        self.registry.insert(handle, shared);
        Ok(())
    }

    fn unknown_or_wrong_role(&self, id: SessionId, operation: &'static str) -> ContextError {
        let role = if self.state.clients.contains_key(&id) {
            SessionRole::Client
        } else if self.state.portals.contains_key(&id) {
            SessionRole::ServerPortal
        } else if self.state.server_sessions.contains_key(&id) {
            SessionRole::ServerSession
        } else {
            return ContextError::UnknownSession { id };
        };
        ContextError::WrongRole {
            id,
            role,
            operation,
        }
    }

    /// Surfaces the deferred closing notification of portals whose last
    /// session is gone
    fn finish_portals(&mut self) -> Result<(), ContextError> {
        let ready: Vec<SessionId> = self
            .state
            .portals
            .iter()
            .filter(|(_, portal)| portal.ready_to_delete())
            .map(|(id, _)| *id)
            .collect();

        for id in ready {
            self.state.push_event(&Event::SessionError {
                session: id,
                error_type: SessionEventKind::Teardown,
                reason: 0,
            })?;
            if let Some(portal) = self.state.portals.get_mut(&id) {
                portal.finish();
            }
        }
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if !self.state.in_flight.is_empty() {
            warn!(
                "context on loop {:?} dropped with {} msgs in flight",
                self.event_loop,
                self.state.in_flight.len()
            );
        }
        // sessions go before the pools whose Msgs they may still carry
        for (id, session) in self.state.server_sessions.drain() {
            let mut session = session.lock();
            if !session.state().is_closing() {
                // failures are logged by close
                let _ = session.close();
            }
            if self.registry.remove(session.session_handle()).is_some() {
                debug!("unregistered session {:?} of a dropped context", id);
            }
        }
        self.state.clients.clear();
        self.state.portals.clear();
        self.state.in_flight.clear();
        self.state.parked.clear();
        self.state.pools.clear();

        match self.transport.destroy_loop(self.event_loop) {
            Ok(()) => info!("destroyed context on loop {:?}", self.event_loop),
            Err(err) => warn!("failed to destroy loop {:?}: {}", self.event_loop, err),
        }
    }
}

/// Microseconds to the transport's milliseconds, any negative meaning forever
fn timeout_ms(timeout_us: i64) -> i32 {
    if timeout_us < 0 {
        return -1;
    }
    i32::try_from(timeout_us / 1000).unwrap_or(i32::MAX)
}
