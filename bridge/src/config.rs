use std::default::Default;

use crate::msg_pool::MsgPoolError;

/// Event queue capacity in bytes for contexts created without a ContextConfig
pub const DEFAULT_EVENT_QUEUE_SIZE: usize = 30000;

/// Contains Config properties which will be used by the Bridge
#[derive(Clone)]
pub struct BridgeConfig {
    /// Most verbose level forwarded to the `log` facade, also pushed down to
    /// the transport's own logger
    pub log_threshold: log::LevelFilter,
    /// Used for contexts created without an explicit configuration
    pub context: ContextConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_threshold: log::LevelFilter::Info,
            context: ContextConfig::default(),
        }
    }
}

/// Contains Config properties which will be used by a Context
#[derive(Clone, Debug)]
pub struct ContextConfig {
    /// Capacity in bytes of the event queue. Must hold the worst-case burst
    /// of records produced by one loop iteration.
    pub event_queue_size: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            event_queue_size: DEFAULT_EVENT_QUEUE_SIZE,
        }
    }
}

/// Shape of a Msg pool: `msg_num` buffer pairs of `in_size` + `out_size` bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsgPoolConfig {
    pub msg_num: usize,
    pub in_size: usize,
    pub out_size: usize,
}

impl MsgPoolConfig {
    pub fn new(msg_num: usize, in_size: usize, out_size: usize) -> Self {
        Self {
            msg_num,
            in_size,
            out_size,
        }
    }

    /// Size of the single contiguous region backing the pool
    pub fn region_len(&self) -> Result<usize, MsgPoolError> {
        let invalid = || MsgPoolError::InvalidConfig {
            msg_num: self.msg_num,
            in_size: self.in_size,
            out_size: self.out_size,
        };

        let pair = self.in_size.checked_add(self.out_size).ok_or_else(invalid)?;
        if self.msg_num == 0 || pair == 0 || u32::try_from(self.msg_num).is_err() {
            return Err(invalid());
        }
        pair.checked_mul(self.msg_num).ok_or_else(invalid)
    }
}
