/// Lifecycle of a Session. `Error` and `TornDown` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Inbound session surfaced to the consumer, not yet accepted or rejected
    Creating,
    /// Outbound connect requested
    Connecting,
    /// Bound portal, or accepted inbound session waiting for its connection
    Listening,
    Established,
    /// Close sequence started, waiting for the teardown callback
    Closing,
    TornDown,
    /// Construction failed, every operation fails
    Error,
}

impl SessionState {
    pub fn is_closing(self) -> bool {
        matches!(self, SessionState::Closing | SessionState::TornDown)
    }

    pub fn is_error(self) -> bool {
        self == SessionState::Error
    }
}

/// Which of the three participant roles a Session plays
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionRole {
    Client,
    ServerSession,
    ServerPortal,
}
