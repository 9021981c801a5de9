use thiserror::Error;

use xbridge_shared::{EventQueueError, TransportError};

use crate::{context::ContextError, msg_pool::MsgPoolError, session::SessionError};

/// Any error the bridge reports
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Msg pool error: {0}")]
    MsgPool(#[from] MsgPoolError),

    #[error("Event queue error: {0}")]
    Queue(#[from] EventQueueError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
