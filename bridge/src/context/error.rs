use thiserror::Error;

use xbridge_shared::{DecodeError, EventQueueError, PoolId, SessionId, TransportError};

use crate::{
    msg_pool::{Msg, MsgPoolError},
    session::{SessionError, SessionRole},
};

/// Errors that can occur while operating a Context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The transport could not create the context's event loop
    #[error("Failed to create event loop: {0}")]
    LoopCreation(TransportError),

    /// The event queue could not be built, or overflowed while the loop ran
    #[error("Event queue error: {0}")]
    Queue(#[from] EventQueueError),

    /// Pending queue bytes could not be decoded
    #[error("Failed to decode pending events: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Msg pool error: {0}")]
    MsgPool(#[from] MsgPoolError),

    /// A client or portal could not obtain its transport handles
    #[error("Failed to create {role:?} for {uri}. See the log for the transport error")]
    SessionCreation { role: SessionRole, uri: String },

    #[error("No session {id:?} in this context")]
    UnknownSession { id: SessionId },

    #[error("No Msg pool {id:?} in this context")]
    UnknownPool { id: PoolId },

    /// The operation only applies to another role
    #[error("Session {id:?} is a {role:?}, cannot {operation}")]
    WrongRole {
        id: SessionId,
        role: SessionRole,
        operation: &'static str,
    },

    /// Msgs of the pool are still owned by the transport
    #[error("Cannot destroy Msg pool {id:?}: {in_flight} msgs are still in flight")]
    PoolBusy { id: PoolId, in_flight: usize },
}

/// A send that did not happen, handing the Msg back to the caller
#[derive(Debug, Error)]
#[error("Failed to send msg {:?}: {}", .msg.id(), .error)]
pub struct SendError {
    pub msg: Msg,
    pub error: ContextError,
}
