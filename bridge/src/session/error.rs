use thiserror::Error;

use xbridge_shared::{SessionId, TransportError};

use super::SessionState;

/// Errors that can occur while operating a Session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Construction failed, the session cannot be used
    #[error("Session {id:?} failed during construction and cannot be used")]
    Unusable { id: SessionId },

    /// The close sequence has started, no more messages may be sent
    #[error("Session {id:?} is closing")]
    Closing { id: SessionId },

    /// No transport connection is known for the session
    #[error("Session {id:?} has no connection")]
    NoConnection { id: SessionId },

    /// The requested output length exceeds the Msg's output half
    #[error("Cannot send {len} bytes from an output buffer of {capacity} bytes")]
    MsgTooLarge { len: usize, capacity: usize },

    /// The operation is not valid in the session's current state
    #[error("Session {id:?} cannot {operation} while {state:?}")]
    InvalidState {
        id: SessionId,
        operation: &'static str,
        state: SessionState,
    },

    /// The transport rejected the call
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
