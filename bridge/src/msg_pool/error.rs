use thiserror::Error;

use xbridge_shared::{MsgId, TransportError};

/// Errors that can occur while building or using a MsgPool
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MsgPoolError {
    /// The pool shape is empty, or its region size does not fit in memory
    #[error("Invalid Msg pool shape: {msg_num} msgs of {in_size} + {out_size} bytes")]
    InvalidConfig {
        msg_num: usize,
        in_size: usize,
        out_size: usize,
    },

    /// Neither the registered allocator nor the heap could supply the region
    #[error("Failed to allocate Msg pool region of {len} bytes")]
    AllocationFailed { len: usize },

    /// The heap fallback region could not be registered with the transport
    #[error("Failed to register Msg pool region of {len} bytes: {source}")]
    RegistrationFailed { len: usize, source: TransportError },

    /// A received payload does not fit in the input half of its Msg
    #[error("Payload of {len} bytes does not fit in the {capacity} byte input buffer of msg {msg:?}")]
    PayloadTooLarge {
        msg: MsgId,
        len: usize,
        capacity: usize,
    },
}
