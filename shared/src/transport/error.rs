use thiserror::Error;

/// Errors reported by the transport collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A transport call was rejected, with the transport's native error code
    #[error("Transport call `{call}` failed: '{message}' ({code})")]
    CallFailed {
        call: &'static str,
        code: i32,
        message: String,
    },

    /// The transport has no implementation for the requested call
    #[error("Transport does not support `{call}`")]
    Unsupported { call: &'static str },
}

impl TransportError {
    pub fn call_failed(call: &'static str, code: i32, message: impl Into<String>) -> Self {
        TransportError::CallFailed {
            call,
            code,
            message: message.into(),
        }
    }

    /// Native error code, zero when the transport did not provide one
    pub fn code(&self) -> i32 {
        match self {
            TransportError::CallFailed { code, .. } => *code,
            TransportError::Unsupported { .. } => 0,
        }
    }
}
