use bytes::BufMut;

use crate::types::IdentityKey;

use super::{error::EncodeError, event::Event};

/// Size of the fields every record starts with: 4-byte kind, 8-byte identity
pub const HEADER_SIZE: usize = 4 + 8;
const LEN_PREFIX_SIZE: usize = 4;

impl Event {
    /// Exact number of bytes `Encoder::write` produces for this record
    pub fn encoded_len(&self) -> usize {
        let payload = match self {
            Event::SessionError { .. } => 4 + 4,
            Event::MsgErrorServer { .. } => 8 + 4,
            Event::MsgErrorClient { .. } => 4,
            Event::SessionEstablished { .. } => 0,
            Event::RequestReceived { .. } => 4 + 8,
            Event::ReplyReceived { .. } => 4,
            Event::NewSession { uri, src_ip, .. } => {
                8 + LEN_PREFIX_SIZE + uri.len() + LEN_PREFIX_SIZE + src_ip.len()
            }
            Event::MsgSendComplete { .. } => 0,
            Event::FdReady { .. } => 4 + 4,
        };
        HEADER_SIZE + payload
    }
}

/// Writes event records in network byte order. Holds no state besides the
/// size of the last record it produced.
#[derive(Default)]
pub struct Encoder {
    last_size: usize,
}

impl Encoder {
    pub fn new() -> Self {
        Self { last_size: 0 }
    }

    /// Size of the last successfully written record, zero after a failure
    pub fn last_size(&self) -> usize {
        self.last_size
    }

    /// Writes `event` at the start of `dst` and returns the number of bytes
    /// written. On error nothing is written.
    pub fn write(&mut self, event: &Event, dst: &mut [u8]) -> Result<usize, EncodeError> {
        self.last_size = 0;

        let needed = event.encoded_len();
        if needed > dst.len() {
            return Err(EncodeError::InsufficientCapacity {
                needed,
                available: dst.len(),
            });
        }
        if let Event::NewSession { uri, src_ip, .. } = event {
            prefix_len("uri", uri)?;
            prefix_len("src_ip", src_ip)?;
        }

        let mut buf = dst;
        buf.put_u32(event.kind().code());
        buf.put_u64(event.identity());

        match event {
            Event::SessionError {
                error_type, reason, ..
            } => {
                buf.put_u32(error_type.code());
                buf.put_u32(*reason);
            }
            Event::MsgErrorServer {
                session, reason, ..
            } => {
                buf.put_u64(session.to_u64());
                buf.put_u32(*reason);
            }
            Event::MsgErrorClient { reason, .. } => {
                buf.put_u32(*reason);
            }
            Event::RequestReceived { size, session, .. } => {
                buf.put_u32(*size);
                buf.put_u64(session.to_u64());
            }
            Event::ReplyReceived { size, .. } => {
                buf.put_u32(*size);
            }
            Event::NewSession {
                session,
                uri,
                src_ip,
                ..
            } => {
                buf.put_u64(session.to_u64());
                put_string(&mut buf, uri);
                put_string(&mut buf, src_ip);
            }
            Event::FdReady { fd, events } => {
                buf.put_i32(*fd);
                buf.put_u32(*events);
            }
            Event::SessionEstablished { .. } | Event::MsgSendComplete { .. } => {}
        }

        self.last_size = needed;
        Ok(needed)
    }
}

fn prefix_len(field: &'static str, value: &str) -> Result<u32, EncodeError> {
    u32::try_from(value.len()).map_err(|_| EncodeError::StringTooLong {
        field,
        len: value.len(),
    })
}

// Length checked by `prefix_len` before anything is written
fn put_string(buf: &mut &mut [u8], value: &str) {
    buf.put_u32(value.len() as u32);
    buf.put_slice(value.as_bytes());
}
