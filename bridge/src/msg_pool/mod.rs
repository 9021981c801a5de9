mod error;
mod memory;
mod msg;
mod msg_pool;

pub use error::MsgPoolError;
pub use memory::AllocationStrategy;
pub use msg::Msg;
pub use msg_pool::MsgPool;
