cfg_if! {
    if #[cfg(unix)] {
        /// Descriptor type accepted by the event loop for foreign I/O sources
        pub type RawFd = std::os::fd::RawFd;
    } else {
        /// Descriptor type accepted by the event loop for foreign I/O sources
        pub type RawFd = i32;
    }
}

/// Keys that cross the boundary as the 8-byte identity of an event record
pub trait IdentityKey: Copy {
    fn to_u64(&self) -> u64;
    fn from_u64(value: u64) -> Self;
}

// SessionId
/// Consumer-visible identity of a Client, ServerSession or ServerPortal
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct SessionId(u64);

impl IdentityKey for SessionId {
    fn to_u64(&self) -> u64 {
        self.0
    }

    fn from_u64(value: u64) -> Self {
        SessionId(value)
    }
}

// PoolId
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct PoolId(u32);

impl PoolId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn to_u32(&self) -> u32 {
        self.0
    }
}

// MsgId
/// Identity of one Msg slot: owning pool in the high 32 bits, slot index in
/// the low 32 bits. Never zero, since pool ids start at 1.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct MsgId(u64);

impl MsgId {
    pub fn new(pool: PoolId, index: u32) -> Self {
        Self(((pool.to_u32() as u64) << 32) | index as u64)
    }

    pub fn pool(&self) -> PoolId {
        PoolId::new((self.0 >> 32) as u32)
    }

    pub fn index(&self) -> u32 {
        self.0 as u32
    }
}

impl IdentityKey for MsgId {
    fn to_u64(&self) -> u64 {
        self.0
    }

    fn from_u64(value: u64) -> Self {
        MsgId(value)
    }
}

macro_rules! transport_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
        pub struct $name(u64);

        impl $name {
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub fn to_raw(&self) -> u64 {
                self.0
            }
        }
    };
}

transport_handle!(
    /// Opaque transport event loop
    LoopHandle
);
transport_handle!(
    /// Opaque transport session, the key of the session registry
    SessionHandle
);
transport_handle!(
    /// Opaque transport connection underlying a session
    ConnectionHandle
);
transport_handle!(
    /// Opaque transport listener
    ServerHandle
);
transport_handle!(
    /// Registration key of a memory region usable for zero-copy operations
    MemoryKey
);
