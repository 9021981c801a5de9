use log::warn;

use xbridge_shared::{MemoryKey, RegisteredRegion, Transport};

use super::MsgPoolError;

/// How a pool's region was obtained, decided once at construction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocationStrategy {
    /// Allocated by the transport, registered as part of the allocation
    TransportRegistered,
    /// Allocated on the heap and registered explicitly
    HeapRegistered,
}

pub(crate) enum PoolMemory {
    Registered(RegisteredRegion),
    Heap { buf: Box<[u8]>, key: MemoryKey },
}

impl PoolMemory {
    /// Prefers the transport's registered allocator, falling back to a heap
    /// region registered afterwards. On failure nothing stays allocated.
    pub(crate) fn allocate(transport: &dyn Transport, len: usize) -> Result<Self, MsgPoolError> {
        match transport.alloc_registered(len) {
            Ok(region) if region.buf.len() >= len => return Ok(PoolMemory::Registered(region)),
            Ok(region) => {
                warn!(
                    "registered allocator returned {} bytes, {} requested",
                    region.buf.len(),
                    len
                );
                if let Err(error) = transport.free_registered(region) {
                    warn!("failed to free short registered region: {}", error);
                }
            }
            Err(error) => {
                warn!("registered allocation of {} bytes failed: {}", len, error);
            }
        }
        warn!("falling back to heap allocation with explicit registration, this might slow down message handling");

        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| MsgPoolError::AllocationFailed { len })?;
        buf.resize(len, 0);
        let buf = buf.into_boxed_slice();

        let key = transport
            .register_memory(&buf)
            .map_err(|source| MsgPoolError::RegistrationFailed { len, source })?;

        Ok(PoolMemory::Heap { buf, key })
    }

    pub(crate) fn strategy(&self) -> AllocationStrategy {
        match self {
            PoolMemory::Registered(_) => AllocationStrategy::TransportRegistered,
            PoolMemory::Heap { .. } => AllocationStrategy::HeapRegistered,
        }
    }

    pub(crate) fn key(&self) -> MemoryKey {
        match self {
            PoolMemory::Registered(region) => region.key,
            PoolMemory::Heap { key, .. } => *key,
        }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            PoolMemory::Registered(region) => &region.buf,
            PoolMemory::Heap { buf, .. } => buf,
        }
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            PoolMemory::Registered(region) => &mut region.buf,
            PoolMemory::Heap { buf, .. } => buf,
        }
    }

    /// Returns the region through the same path it was obtained by
    pub(crate) fn release(self, transport: &dyn Transport) {
        match self {
            PoolMemory::Registered(region) => {
                if let Err(error) = transport.free_registered(region) {
                    warn!("failed to free registered Msg pool region: {}", error);
                }
            }
            PoolMemory::Heap { buf, key } => {
                if let Err(error) = transport.deregister_memory(key) {
                    warn!("failed to deregister Msg pool region: {}", error);
                }
                drop(buf);
            }
        }
    }
}
