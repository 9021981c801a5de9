use std::net::IpAddr;

use crate::types::{IdentityKey, MsgId, RawFd, SessionId};

use super::{error::EncodeError, event_kind::EventKind, session_event::SessionEventKind};

/// Source address of an inbound session as reported by the transport
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceAddr {
    Ip(IpAddr),
    /// Raw address family value the bridge does not know how to render
    Unsupported { family: u16 },
}

/// One record of the event queue, addressed to a consumer-side object
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    SessionError {
        session: SessionId,
        error_type: SessionEventKind,
        reason: u32,
    },
    MsgErrorServer {
        msg: MsgId,
        session: SessionId,
        reason: u32,
    },
    MsgErrorClient {
        msg: MsgId,
        reason: u32,
    },
    SessionEstablished {
        session: SessionId,
    },
    RequestReceived {
        msg: MsgId,
        size: u32,
        session: SessionId,
    },
    ReplyReceived {
        msg: MsgId,
        size: u32,
    },
    NewSession {
        portal: SessionId,
        session: SessionId,
        uri: String,
        src_ip: String,
    },
    MsgSendComplete {
        msg: MsgId,
    },
    FdReady {
        fd: RawFd,
        events: u32,
    },
}

impl Event {
    /// Builds a `NewSession` record, rendering the source address as text.
    /// Fails for address families other than IPv4/IPv6.
    pub fn new_session(
        portal: SessionId,
        session: SessionId,
        uri: &str,
        src_addr: &SourceAddr,
    ) -> Result<Self, EncodeError> {
        let src_ip = match src_addr {
            SourceAddr::Ip(ip) => ip.to_string(),
            SourceAddr::Unsupported { family } => {
                return Err(EncodeError::UnsupportedAddressFamily { family: *family });
            }
        };
        Ok(Event::NewSession {
            portal,
            session,
            uri: uri.to_string(),
            src_ip,
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::SessionError { .. } => EventKind::SessionError,
            Event::MsgErrorServer { .. } => EventKind::MsgErrorServer,
            Event::MsgErrorClient { .. } => EventKind::MsgErrorClient,
            Event::SessionEstablished { .. } => EventKind::SessionEstablished,
            Event::RequestReceived { .. } => EventKind::RequestReceived,
            Event::ReplyReceived { .. } => EventKind::ReplyReceived,
            Event::NewSession { .. } => EventKind::NewSession,
            Event::MsgSendComplete { .. } => EventKind::MsgSendComplete,
            Event::FdReady { .. } => EventKind::FdReady,
        }
    }

    /// The 8-byte identity the record is addressed to. Descriptor readiness
    /// belongs to the context itself and carries zero.
    pub fn identity(&self) -> u64 {
        match self {
            Event::SessionError { session, .. } => session.to_u64(),
            Event::SessionEstablished { session } => session.to_u64(),
            Event::NewSession { portal, .. } => portal.to_u64(),
            Event::MsgErrorServer { msg, .. }
            | Event::MsgErrorClient { msg, .. }
            | Event::RequestReceived { msg, .. }
            | Event::ReplyReceived { msg, .. }
            | Event::MsgSendComplete { msg } => msg.to_u64(),
            Event::FdReady { .. } => 0,
        }
    }
}
