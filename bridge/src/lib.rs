//! # xbridge
//! Drives an asynchronous, callback-based transport on behalf of a consumer
//! that cannot take callbacks. Each [`Context`] runs one transport event loop
//! and records the events the consumer must see in a compact binary queue,
//! decodable with [`xbridge_shared::EventReader`]. Everything else is
//! resolved on the callback thread.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use xbridge_shared::{
        DecodeError, Event, EventKind, EventReader, IdentityKey, MsgId, PoolId, RawFd,
        SessionEventKind, SessionId, SourceAddr, Transport, TransportCallbacks, TransportError,
    };
}

mod bridge;
mod config;
mod context;
mod error;
mod logging;
pub mod msg_pool;
pub mod session;

pub use bridge::Bridge;
pub use config::{BridgeConfig, ContextConfig, MsgPoolConfig, DEFAULT_EVENT_QUEUE_SIZE};
pub use context::{
    Context, ContextError, LoopBreaker, PendingEvents, SendError, NO_BUFFER_REASON,
};
pub use error::BridgeError;
pub use logging::{transport_log_sink, TRANSPORT_LOG_TARGET};
