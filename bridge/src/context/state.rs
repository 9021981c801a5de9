use std::collections::{BTreeMap, HashMap};

use log::warn;

use xbridge_shared::{Event, EventQueue, EventQueueError, MsgId, PoolId, SessionHandle, SessionId};

use crate::{
    msg_pool::{Msg, MsgPool},
    session::{Client, ServerPortal, SessionRegistry, SharedServerSession},
};

/// Everything a context's callbacks mutate
pub(crate) struct ContextState {
    pub(crate) queue: EventQueue,
    /// Records appended since the last reset
    pub(crate) events_num: usize,
    pub(crate) pools: BTreeMap<PoolId, MsgPool>,
    pub(crate) clients: HashMap<SessionId, Client>,
    pub(crate) portals: HashMap<SessionId, ServerPortal>,
    pub(crate) server_sessions: HashMap<SessionId, SharedServerSession>,
    /// Inbound sessions surfaced but not yet accepted, forwarded or rejected
    pub(crate) pending: HashMap<SessionHandle, SessionId>,
    /// Msgs owned by the transport until it reports back
    pub(crate) in_flight: HashMap<MsgId, Msg>,
    /// Msgs handed back by the transport, waiting for the consumer
    pub(crate) parked: HashMap<MsgId, Msg>,
}

impl ContextState {
    pub(crate) fn new(queue: EventQueue) -> Self {
        Self {
            queue,
            events_num: 0,
            pools: BTreeMap::new(),
            clients: HashMap::new(),
            portals: HashMap::new(),
            server_sessions: HashMap::new(),
            pending: HashMap::new(),
            in_flight: HashMap::new(),
            parked: HashMap::new(),
        }
    }

    pub(crate) fn push_event(&mut self, event: &Event) -> Result<(), EventQueueError> {
        self.queue.append(event)?;
        self.events_num += 1;
        Ok(())
    }

    pub(crate) fn reset_counters(&mut self) {
        self.events_num = 0;
        self.queue.reset();
    }

    /// Bytes of the records appended since the last reset
    pub(crate) fn pending_bytes(&self) -> &[u8] {
        self.queue.unread()
    }

    /// Registered sessions first, then this context's undecided ones
    pub(crate) fn server_session(
        &self,
        registry: &SessionRegistry,
        handle: SessionHandle,
    ) -> Option<SharedServerSession> {
        registry.get(handle).or_else(|| {
            self.pending
                .get(&handle)
                .and_then(|id| self.server_sessions.get(id))
                .cloned()
        })
    }

    /// Returns a parked Msg to its pool, for when no record could name it
    pub(crate) fn release_parked(&mut self, id: MsgId) {
        let Some(msg) = self.parked.remove(&id) else {
            return;
        };
        match self.pools.get_mut(&msg.pool()) {
            Some(pool) => {
                if let Err(msg) = pool.release(msg) {
                    warn!("msg {:?} does not belong to pool {:?}", msg.id(), msg.pool());
                }
            }
            None => warn!("msg {:?} outlived its pool", id),
        }
    }

    /// A Msg from the pool with the smallest input half that fits `payload`,
    /// holding a copy of it
    pub(crate) fn buffer_for(&mut self, payload: &[u8]) -> Option<Msg> {
        let pool = self
            .pools
            .values_mut()
            .filter(|pool| pool.config().in_size >= payload.len() && pool.available() > 0)
            .min_by_key(|pool| pool.config().in_size)?;

        let mut msg = pool.acquire()?;
        if let Err(err) = pool.write_in(&mut msg, payload) {
            warn!("{}", err);
            let _ = pool.release(msg);
            return None;
        }
        Some(msg)
    }
}
