use bytes::Buf;

use crate::types::{IdentityKey, MsgId, SessionId};

use super::{
    encoder::HEADER_SIZE, error::DecodeError, event::Event, event_kind::EventKind,
    session_event::SessionEventKind,
};

/// Reads event records back out of event queue bytes, the way a consumer on
/// the other side of the boundary does.
pub struct EventReader<'a> {
    buf: &'a [u8],
    consumed: usize,
    failed: bool,
}

impl<'a> EventReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            consumed: 0,
            failed: false,
        }
    }

    /// Bytes belonging to fully decoded records
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Reads the next record, or `None` when the bytes are exhausted. A failed
    /// read does not move past the start of the broken record.
    pub fn read_event(&mut self) -> Result<Option<Event>, DecodeError> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        let mut cursor = self.buf;
        let event = read_record(&mut cursor)?;

        let used = self.buf.len() - cursor.len();
        self.buf = cursor;
        self.consumed += used;
        Ok(Some(event))
    }
}

impl<'a> Iterator for EventReader<'a> {
    type Item = Result<Event, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => None,
            Err(error) => {
                self.failed = true;
                Some(Err(error))
            }
        }
    }
}

fn read_record(cursor: &mut &[u8]) -> Result<Event, DecodeError> {
    need(cursor, HEADER_SIZE)?;
    let kind = EventKind::from_code(cursor.get_u32())?;
    let identity = cursor.get_u64();

    let event = match kind {
        EventKind::SessionError => {
            need(cursor, 8)?;
            Event::SessionError {
                session: SessionId::from_u64(identity),
                error_type: SessionEventKind::from_code(cursor.get_u32()),
                reason: cursor.get_u32(),
            }
        }
        EventKind::MsgErrorServer => {
            need(cursor, 12)?;
            Event::MsgErrorServer {
                msg: MsgId::from_u64(identity),
                session: SessionId::from_u64(cursor.get_u64()),
                reason: cursor.get_u32(),
            }
        }
        EventKind::MsgErrorClient => {
            need(cursor, 4)?;
            Event::MsgErrorClient {
                msg: MsgId::from_u64(identity),
                reason: cursor.get_u32(),
            }
        }
        EventKind::SessionEstablished => Event::SessionEstablished {
            session: SessionId::from_u64(identity),
        },
        EventKind::RequestReceived => {
            need(cursor, 12)?;
            Event::RequestReceived {
                msg: MsgId::from_u64(identity),
                size: cursor.get_u32(),
                session: SessionId::from_u64(cursor.get_u64()),
            }
        }
        EventKind::ReplyReceived => {
            need(cursor, 4)?;
            Event::ReplyReceived {
                msg: MsgId::from_u64(identity),
                size: cursor.get_u32(),
            }
        }
        EventKind::NewSession => {
            need(cursor, 8)?;
            let session = SessionId::from_u64(cursor.get_u64());
            let uri = read_string(cursor, "uri")?;
            let src_ip = read_string(cursor, "src_ip")?;
            Event::NewSession {
                portal: SessionId::from_u64(identity),
                session,
                uri,
                src_ip,
            }
        }
        EventKind::MsgSendComplete => Event::MsgSendComplete {
            msg: MsgId::from_u64(identity),
        },
        EventKind::FdReady => {
            need(cursor, 8)?;
            Event::FdReady {
                fd: cursor.get_i32(),
                events: cursor.get_u32(),
            }
        }
    };

    Ok(event)
}

fn need(cursor: &&[u8], needed: usize) -> Result<(), DecodeError> {
    if cursor.remaining() < needed {
        return Err(DecodeError::Truncated {
            needed,
            remaining: cursor.remaining(),
        });
    }
    Ok(())
}

// Length-prefixed, not terminated: the prefix is the only source of truth
fn read_string(cursor: &mut &[u8], field: &'static str) -> Result<String, DecodeError> {
    need(cursor, 4)?;
    let len = cursor.get_u32() as usize;
    need(cursor, len)?;
    let bytes = cursor[..len].to_vec();
    cursor.advance(len);
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidString { field })
}
