use std::{collections::HashMap, sync::Arc};

use log::{debug, warn};
use parking_lot::Mutex;

use xbridge_shared::SessionHandle;

use super::ServerSession;

pub type SharedServerSession = Arc<Mutex<ServerSession>>;

/// Maps transport session handles to the ServerSessions they belong to, for
/// callbacks that arrive without an owner. Shared by every context of a
/// Bridge; the lock is only held for one lookup, insert or removal.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionHandle, SharedServerSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false, keeping the existing entry, if `handle` is already
    /// registered
    pub fn insert(&self, handle: SessionHandle, session: SharedServerSession) -> bool {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&handle) {
            warn!("session {:?} is already registered", handle);
            return false;
        }
        debug!("registering session {:?}", handle);
        sessions.insert(handle, session);
        true
    }

    pub fn get(&self, handle: SessionHandle) -> Option<SharedServerSession> {
        self.sessions.lock().get(&handle).cloned()
    }

    pub fn remove(&self, handle: SessionHandle) -> Option<SharedServerSession> {
        let removed = self.sessions.lock().remove(&handle);
        if removed.is_some() {
            debug!("removed session {:?} from registry", handle);
        }
        removed
    }

    pub fn contains(&self, handle: SessionHandle) -> bool {
        self.sessions.lock().contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
