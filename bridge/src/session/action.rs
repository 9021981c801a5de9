use xbridge_shared::SessionEventKind;

/// What a Session does with one lifecycle event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionAction {
    /// Local side started closing
    MarkClosing,
    /// Destroy the transport connection object
    DestroyConnection,
    Ignore,
    /// Run the session's own close sequence
    Close,
    /// Destroy the transport session object, the consumer may now release
    /// its side
    Teardown,
    /// Peer refused the session
    Rejected,
    /// Nothing the bridge resolves itself
    Unhandled,
}

impl SessionAction {
    pub fn for_event(kind: SessionEventKind) -> Self {
        match kind {
            SessionEventKind::ConnectionClosed => SessionAction::MarkClosing,
            SessionEventKind::ConnectionTeardown => SessionAction::DestroyConnection,
            SessionEventKind::NewConnection => SessionAction::Ignore,
            SessionEventKind::ConnectionDisconnected => SessionAction::Close,
            SessionEventKind::Teardown => SessionAction::Teardown,
            SessionEventKind::Reject => SessionAction::Rejected,
            SessionEventKind::ConnectionError => SessionAction::Close,
            SessionEventKind::ConnectionEstablished
            | SessionEventKind::ConnectionRefused
            | SessionEventKind::Error
            | SessionEventKind::Unknown(_) => SessionAction::Unhandled,
        }
    }

    /// Whether the event crosses the boundary to the consumer
    pub fn notifies(self) -> bool {
        matches!(
            self,
            SessionAction::Teardown | SessionAction::Rejected | SessionAction::Unhandled
        )
    }
}
