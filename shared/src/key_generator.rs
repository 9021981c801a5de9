use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::types::{IdentityKey, PoolId, SessionId};

/// Hands out process-wide unique, non-zero identities. Zero is reserved for
/// records that are not addressed to any object (descriptor readiness).
pub struct KeyGenerator {
    next_session: AtomicU64,
    next_pool: AtomicU32,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self {
            next_session: AtomicU64::new(1),
            next_pool: AtomicU32::new(1),
        }
    }

    pub fn session_id(&self) -> SessionId {
        SessionId::from_u64(self.next_session.fetch_add(1, Ordering::Relaxed))
    }

    pub fn pool_id(&self) -> PoolId {
        PoolId::new(self.next_pool.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}
