use super::error::DecodeError;

/// Record kinds of the event queue wire format. The discriminants are the
/// values written in the leading 4 bytes of every record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventKind {
    SessionError = 0,
    MsgErrorServer = 1,
    MsgErrorClient = 2,
    SessionEstablished = 3,
    RequestReceived = 4,
    ReplyReceived = 5,
    NewSession = 6,
    MsgSendComplete = 7,
    FdReady = 8,
}

impl EventKind {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Result<Self, DecodeError> {
        let kind = match code {
            0 => EventKind::SessionError,
            1 => EventKind::MsgErrorServer,
            2 => EventKind::MsgErrorClient,
            3 => EventKind::SessionEstablished,
            4 => EventKind::RequestReceived,
            5 => EventKind::ReplyReceived,
            6 => EventKind::NewSession,
            7 => EventKind::MsgSendComplete,
            8 => EventKind::FdReady,
            _ => return Err(DecodeError::UnknownEventKind { code }),
        };
        Ok(kind)
    }
}
