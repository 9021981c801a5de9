//! Interface of the asynchronous transport the bridge drives. The transport
//! itself lives outside this workspace: calls go in through [`Transport`],
//! notifications come back through [`TransportCallbacks`] while
//! [`Transport::run_loop`] is executing.

mod error;
pub use error::TransportError;

use crate::{
    events::{SessionEventKind, SourceAddr},
    logging::{LogSink, TransportLogLevel},
    types::{
        ConnectionHandle, LoopHandle, MemoryKey, MsgId, RawFd, ServerHandle, SessionHandle,
        SessionId,
    },
};

/// Memory handed out by the transport's registered allocator
pub struct RegisteredRegion {
    pub buf: Box<[u8]>,
    pub key: MemoryKey,
}

/// Outgoing half of a Msg, borrowed from its pool's registered region
#[derive(Clone, Copy, Debug)]
pub struct OutgoingMsg<'a> {
    pub id: MsgId,
    pub data: &'a [u8],
    pub key: MemoryKey,
    /// Room the peer's reply may use in the Msg's input half
    pub in_capacity: usize,
}

/// Session lifecycle notification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionEventData {
    pub kind: SessionEventKind,
    /// Transport status code, zero when no reason was given
    pub reason: u32,
    pub connection: Option<ConnectionHandle>,
}

impl SessionEventData {
    pub fn new(kind: SessionEventKind) -> Self {
        Self {
            kind,
            reason: 0,
            connection: None,
        }
    }

    pub fn with_connection(mut self, connection: ConnectionHandle) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn with_reason(mut self, reason: u32) -> Self {
        self.reason = reason;
        self
    }
}

/// Inbound session arriving at a listening portal
#[derive(Clone, Copy, Debug)]
pub struct NewSessionRequest<'a> {
    pub uri: &'a str,
    pub src_addr: SourceAddr,
}

pub trait Transport: Send + Sync {
    // Event loop

    fn create_loop(&self) -> Result<LoopHandle, TransportError>;

    fn destroy_loop(&self, event_loop: LoopHandle) -> Result<(), TransportError>;

    /// Runs the loop, delivering callbacks, until the timeout elapses or a stop
    /// is requested. `timeout_ms == -1` waits forever.
    fn run_loop(
        &self,
        event_loop: LoopHandle,
        timeout_ms: i32,
        callbacks: &mut dyn TransportCallbacks,
    ) -> Result<(), TransportError>;

    fn stop_loop(&self, event_loop: LoopHandle, is_self_thread: bool);

    fn add_fd(&self, event_loop: LoopHandle, fd: RawFd, events: u32)
        -> Result<(), TransportError>;

    fn remove_fd(&self, event_loop: LoopHandle, fd: RawFd) -> Result<(), TransportError>;

    // Sessions

    /// `owner` is echoed back in callbacks for this session
    fn create_session(&self, uri: &str, owner: SessionId) -> Result<SessionHandle, TransportError>;

    fn destroy_session(&self, session: SessionHandle) -> Result<(), TransportError>;

    fn connect(
        &self,
        session: SessionHandle,
        event_loop: LoopHandle,
        owner: SessionId,
    ) -> Result<ConnectionHandle, TransportError>;

    /// Connection of `session` bound to `event_loop`, if any
    fn connection(&self, session: SessionHandle, event_loop: LoopHandle)
        -> Option<ConnectionHandle>;

    fn disconnect(&self, connection: ConnectionHandle) -> Result<(), TransportError>;

    fn destroy_connection(&self, connection: ConnectionHandle) -> Result<(), TransportError>;

    /// Starts listening on `uri`, returning the listener and its actual port
    fn bind(
        &self,
        uri: &str,
        event_loop: LoopHandle,
        owner: SessionId,
    ) -> Result<(ServerHandle, u16), TransportError>;

    fn unbind(&self, server: ServerHandle) -> Result<(), TransportError>;

    /// Accepts an inbound session, redirecting it to `forward_to` when given
    fn accept(&self, session: SessionHandle, forward_to: Option<&str>)
        -> Result<(), TransportError>;

    fn reject(
        &self,
        session: SessionHandle,
        reason: u32,
        user_context: &[u8],
    ) -> Result<(), TransportError>;

    fn send_request(
        &self,
        connection: ConnectionHandle,
        msg: OutgoingMsg<'_>,
    ) -> Result<(), TransportError>;

    fn send_response(
        &self,
        session: SessionHandle,
        msg: OutgoingMsg<'_>,
    ) -> Result<(), TransportError>;

    // Memory

    /// Allocates memory that is already registered for zero-copy use
    fn alloc_registered(&self, len: usize) -> Result<RegisteredRegion, TransportError>;

    fn free_registered(&self, region: RegisteredRegion) -> Result<(), TransportError>;

    /// Registers caller-owned memory. The memory must not move or be freed
    /// until deregistered.
    fn register_memory(&self, region: &[u8]) -> Result<MemoryKey, TransportError>;

    fn deregister_memory(&self, key: MemoryKey) -> Result<(), TransportError>;

    // Logging

    fn set_log_level(&self, level: TransportLogLevel);

    /// Installs (or with `None`, removes) the receiver of the transport's own
    /// log lines
    fn set_log_sink(&self, sink: Option<LogSink>);
}

/// Notifications delivered on the thread running [`Transport::run_loop`]
pub trait TransportCallbacks {
    /// `owner` is the identity passed at creation, `None` for inbound
    /// sessions, which are found through the session registry instead
    fn on_session_event(
        &mut self,
        owner: Option<SessionId>,
        session: SessionHandle,
        event: SessionEventData,
    );

    fn on_session_established(&mut self, owner: SessionId, session: SessionHandle);

    fn on_new_session(
        &mut self,
        portal: SessionId,
        session: SessionHandle,
        request: NewSessionRequest<'_>,
    );

    fn on_request(&mut self, session: SessionHandle, payload: &[u8]);

    fn on_reply(&mut self, owner: SessionId, msg: MsgId, payload: &[u8]);

    fn on_msg_error(
        &mut self,
        owner: Option<SessionId>,
        session: SessionHandle,
        msg: MsgId,
        reason: u32,
    );

    fn on_send_complete(&mut self, session: SessionHandle, msg: MsgId);

    fn on_fd_ready(&mut self, fd: RawFd, events: u32);
}
