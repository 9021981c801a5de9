/// Session lifecycle events reported by the transport. The numeric codes are
/// the transport's own and are forwarded verbatim as the `error_type` of a
/// `SessionError` record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    Reject,
    Teardown,
    NewConnection,
    ConnectionEstablished,
    ConnectionTeardown,
    ConnectionClosed,
    ConnectionDisconnected,
    ConnectionRefused,
    ConnectionError,
    Error,
    Unknown(u32),
}

impl SessionEventKind {
    pub fn code(self) -> u32 {
        match self {
            SessionEventKind::Reject => 0,
            SessionEventKind::Teardown => 1,
            SessionEventKind::NewConnection => 2,
            SessionEventKind::ConnectionEstablished => 3,
            SessionEventKind::ConnectionTeardown => 4,
            SessionEventKind::ConnectionClosed => 5,
            SessionEventKind::ConnectionDisconnected => 6,
            SessionEventKind::ConnectionRefused => 7,
            SessionEventKind::ConnectionError => 8,
            SessionEventKind::Error => 9,
            SessionEventKind::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => SessionEventKind::Reject,
            1 => SessionEventKind::Teardown,
            2 => SessionEventKind::NewConnection,
            3 => SessionEventKind::ConnectionEstablished,
            4 => SessionEventKind::ConnectionTeardown,
            5 => SessionEventKind::ConnectionClosed,
            6 => SessionEventKind::ConnectionDisconnected,
            7 => SessionEventKind::ConnectionRefused,
            8 => SessionEventKind::ConnectionError,
            9 => SessionEventKind::Error,
            other => SessionEventKind::Unknown(other),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SessionEventKind::Reject => "session reject",
            SessionEventKind::Teardown => "session teardown",
            SessionEventKind::NewConnection => "new connection",
            SessionEventKind::ConnectionEstablished => "connection established",
            SessionEventKind::ConnectionTeardown => "connection teardown",
            SessionEventKind::ConnectionClosed => "connection closed",
            SessionEventKind::ConnectionDisconnected => "connection disconnected",
            SessionEventKind::ConnectionRefused => "connection refused",
            SessionEventKind::ConnectionError => "connection error",
            SessionEventKind::Error => "session error",
            SessionEventKind::Unknown(_) => "unknown",
        }
    }
}
