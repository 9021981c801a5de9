//! # xbridge shared
//! Event wire format, event queue and transport interface shared between the
//! `xbridge` crate and the consumers decoding its event queue.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

mod event_queue;
mod events;
mod key_generator;
mod logging;
mod transport;
mod types;

pub use event_queue::{EventQueue, EventQueueError};
pub use events::{
    DecodeError, EncodeError, Encoder, Event, EventKind, EventReader, SessionEventKind,
    SourceAddr, HEADER_SIZE,
};
pub use key_generator::KeyGenerator;
pub use logging::{LogSink, TransportLogLevel, TransportLogRecord};
pub use transport::{
    NewSessionRequest, OutgoingMsg, RegisteredRegion, SessionEventData, Transport,
    TransportCallbacks, TransportError,
};
pub use types::{
    ConnectionHandle, IdentityKey, LoopHandle, MemoryKey, MsgId, PoolId, RawFd, ServerHandle,
    SessionHandle, SessionId,
};
