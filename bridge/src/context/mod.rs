mod context;
mod dispatcher;
mod error;
mod loop_breaker;
mod state;

pub use context::{Context, PendingEvents};
pub use dispatcher::NO_BUFFER_REASON;
pub use error::{ContextError, SendError};
pub use loop_breaker::LoopBreaker;
