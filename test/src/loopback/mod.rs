//! In-memory transport for end-to-end testing
//! Records every call, and delivers scripted callbacks while a loop runs

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use xbridge_shared::{
    ConnectionHandle, LogSink, LoopHandle, MemoryKey, MsgId, NewSessionRequest, OutgoingMsg,
    RawFd, RegisteredRegion, ServerHandle, SessionEventData, SessionEventKind, SessionHandle,
    SessionId, SourceAddr, Transport, TransportCallbacks, TransportError, TransportLogLevel,
    TransportLogRecord,
};

/// Native error code reported by injected failures
pub const INJECTED_ERROR_CODE: i32 = -22;

const FIRST_BOUND_PORT: u16 = 47000;

/// One call made into the transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    CreateLoop(LoopHandle),
    DestroyLoop(LoopHandle),
    RunLoop { timeout_ms: i32 },
    StopLoop { is_self_thread: bool },
    AddFd { fd: RawFd, events: u32 },
    RemoveFd { fd: RawFd },
    CreateSession { uri: String, owner: SessionId },
    DestroySession(SessionHandle),
    Connect(SessionHandle),
    Disconnect(ConnectionHandle),
    DestroyConnection(ConnectionHandle),
    Bind { uri: String },
    Unbind(ServerHandle),
    Accept { session: SessionHandle, forward_to: Option<String> },
    Reject { session: SessionHandle, reason: u32, user_context: Vec<u8> },
    SendRequest { connection: ConnectionHandle, msg: MsgId, data: Vec<u8> },
    SendResponse { session: SessionHandle, msg: MsgId, data: Vec<u8> },
    AllocRegistered { len: usize },
    FreeRegistered(MemoryKey),
    RegisterMemory { len: usize },
    DeregisterMemory(MemoryKey),
    SetLogLevel(TransportLogLevel),
}

/// Callback delivered by the next `run_loop`
#[derive(Clone, Debug)]
pub enum Scripted {
    SessionEvent {
        owner: Option<SessionId>,
        session: SessionHandle,
        event: SessionEventData,
    },
    Established { owner: SessionId, session: SessionHandle },
    NewSession {
        portal: SessionId,
        session: SessionHandle,
        uri: String,
        src_addr: SourceAddr,
    },
    Request { session: SessionHandle, payload: Vec<u8> },
    Reply { owner: SessionId, msg: MsgId, payload: Vec<u8> },
    MsgError {
        owner: Option<SessionId>,
        session: SessionHandle,
        msg: MsgId,
        reason: u32,
    },
    SendComplete { session: SessionHandle, msg: MsgId },
    FdReady { fd: RawFd, events: u32 },
}

struct LoopbackState {
    next_handle: u64,
    next_port: u16,
    calls: Vec<Call>,
    script: VecDeque<Scripted>,
    stop_requested: bool,
    failing: HashSet<&'static str>,
    registered_allocator: bool,
    owners: HashMap<SessionId, SessionHandle>,
    connections: HashMap<SessionHandle, ConnectionHandle>,
    log_sink: Option<LogSink>,
}

/// Scripted `Transport` with no I/O behind it
pub struct LoopbackTransport {
    state: Mutex<LoopbackState>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoopbackState {
                next_handle: 1,
                next_port: FIRST_BOUND_PORT,
                calls: Vec::new(),
                script: VecDeque::new(),
                stop_requested: false,
                failing: HashSet::new(),
                registered_allocator: true,
                owners: HashMap::new(),
                connections: HashMap::new(),
                log_sink: None,
            }),
        }
    }

    /// Every later call named `call` fails
    pub fn fail(&self, call: &'static str) {
        self.state.lock().unwrap().failing.insert(call);
    }

    pub fn heal(&self, call: &'static str) {
        self.state.lock().unwrap().failing.remove(call);
    }

    /// Behave like a platform without the registered allocator
    pub fn disable_registered_allocator(&self) {
        self.state.lock().unwrap().registered_allocator = false;
    }

    pub fn push(&self, scripted: Scripted) {
        self.state.lock().unwrap().script.push_back(scripted);
    }

    pub fn push_session_event(
        &self,
        owner: Option<SessionId>,
        session: SessionHandle,
        kind: SessionEventKind,
    ) {
        self.push(Scripted::SessionEvent {
            owner,
            session,
            event: SessionEventData::new(kind),
        });
    }

    /// Script callbacks not yet delivered
    pub fn scripted(&self) -> usize {
        self.state.lock().unwrap().script.len()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls<F: Fn(&Call) -> bool>(&self, filter: F) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|call| filter(call)).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Handle of the session created for `owner`
    pub fn session_of(&self, owner: SessionId) -> Option<SessionHandle> {
        self.state.lock().unwrap().owners.get(&owner).copied()
    }

    pub fn connection_of(&self, session: SessionHandle) -> Option<ConnectionHandle> {
        self.state.lock().unwrap().connections.get(&session).copied()
    }

    /// Handle for a session arriving from a peer, with its connection
    pub fn inbound_session(&self) -> (SessionHandle, ConnectionHandle) {
        let mut state = self.state.lock().unwrap();
        let session = SessionHandle::from_raw(state.next());
        let connection = ConnectionHandle::from_raw(state.next());
        state.connections.insert(session, connection);
        (session, connection)
    }

    /// Feeds a line to the installed log sink, as the transport's own logger
    pub fn emit_log(&self, level: TransportLogLevel, message: &str) {
        let sink = self.state.lock().unwrap().log_sink.clone();
        if let Some(sink) = sink {
            sink(&TransportLogRecord {
                level,
                file: "loopback.c",
                line: 42,
                function: "emit_log",
                message,
            });
        }
    }

    pub fn has_log_sink(&self) -> bool {
        self.state.lock().unwrap().log_sink.is_some()
    }

    fn record(&self, call: Call, name: &'static str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.failing.contains(name) {
            return Err(TransportError::call_failed(
                name,
                INJECTED_ERROR_CODE,
                "injected failure",
            ));
        }
        Ok(())
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackState {
    fn next(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl Transport for LoopbackTransport {
    fn create_loop(&self) -> Result<LoopHandle, TransportError> {
        let event_loop = LoopHandle::from_raw(self.state.lock().unwrap().next());
        self.record(Call::CreateLoop(event_loop), "create_loop")?;
        Ok(event_loop)
    }

    fn destroy_loop(&self, event_loop: LoopHandle) -> Result<(), TransportError> {
        self.record(Call::DestroyLoop(event_loop), "destroy_loop")
    }

    fn run_loop(
        &self,
        _event_loop: LoopHandle,
        timeout_ms: i32,
        callbacks: &mut dyn TransportCallbacks,
    ) -> Result<(), TransportError> {
        self.record(Call::RunLoop { timeout_ms }, "run_loop")?;

        loop {
            // never hold the lock while a callback runs, callbacks call back in
            let next = {
                let mut state = self.state.lock().unwrap();
                if state.stop_requested {
                    state.stop_requested = false;
                    None
                } else {
                    state.script.pop_front()
                }
            };
            let Some(next) = next else {
                return Ok(());
            };

            match next {
                Scripted::SessionEvent {
                    owner,
                    session,
                    event,
                } => callbacks.on_session_event(owner, session, event),
                Scripted::Established { owner, session } => {
                    callbacks.on_session_established(owner, session)
                }
                Scripted::NewSession {
                    portal,
                    session,
                    uri,
                    src_addr,
                } => callbacks.on_new_session(
                    portal,
                    session,
                    NewSessionRequest {
                        uri: &uri,
                        src_addr,
                    },
                ),
                Scripted::Request { session, payload } => callbacks.on_request(session, &payload),
                Scripted::Reply {
                    owner,
                    msg,
                    payload,
                } => callbacks.on_reply(owner, msg, &payload),
                Scripted::MsgError {
                    owner,
                    session,
                    msg,
                    reason,
                } => callbacks.on_msg_error(owner, session, msg, reason),
                Scripted::SendComplete { session, msg } => callbacks.on_send_complete(session, msg),
                Scripted::FdReady { fd, events } => callbacks.on_fd_ready(fd, events),
            }
        }
    }

    fn stop_loop(&self, _event_loop: LoopHandle, is_self_thread: bool) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::StopLoop { is_self_thread });
        state.stop_requested = true;
    }

    fn add_fd(&self, _event_loop: LoopHandle, fd: RawFd, events: u32) -> Result<(), TransportError> {
        self.record(Call::AddFd { fd, events }, "add_fd")
    }

    fn remove_fd(&self, _event_loop: LoopHandle, fd: RawFd) -> Result<(), TransportError> {
        self.record(Call::RemoveFd { fd }, "remove_fd")
    }

    fn create_session(&self, uri: &str, owner: SessionId) -> Result<SessionHandle, TransportError> {
        self.record(
            Call::CreateSession {
                uri: uri.to_string(),
                owner,
            },
            "create_session",
        )?;
        let mut state = self.state.lock().unwrap();
        let session = SessionHandle::from_raw(state.next());
        state.owners.insert(owner, session);
        Ok(session)
    }

    fn destroy_session(&self, session: SessionHandle) -> Result<(), TransportError> {
        self.record(Call::DestroySession(session), "destroy_session")
    }

    fn connect(
        &self,
        session: SessionHandle,
        _event_loop: LoopHandle,
        _owner: SessionId,
    ) -> Result<ConnectionHandle, TransportError> {
        self.record(Call::Connect(session), "connect")?;
        let mut state = self.state.lock().unwrap();
        let connection = ConnectionHandle::from_raw(state.next());
        state.connections.insert(session, connection);
        Ok(connection)
    }

    fn connection(&self, session: SessionHandle, _event_loop: LoopHandle) -> Option<ConnectionHandle> {
        self.connection_of(session)
    }

    fn disconnect(&self, connection: ConnectionHandle) -> Result<(), TransportError> {
        self.record(Call::Disconnect(connection), "disconnect")
    }

    fn destroy_connection(&self, connection: ConnectionHandle) -> Result<(), TransportError> {
        self.record(Call::DestroyConnection(connection), "destroy_connection")?;
        self.state
            .lock()
            .unwrap()
            .connections
            .retain(|_, known| *known != connection);
        Ok(())
    }

    fn bind(
        &self,
        uri: &str,
        _event_loop: LoopHandle,
        _owner: SessionId,
    ) -> Result<(ServerHandle, u16), TransportError> {
        self.record(Call::Bind { uri: uri.to_string() }, "bind")?;
        let mut state = self.state.lock().unwrap();
        let server = ServerHandle::from_raw(state.next());
        let port = state.next_port;
        state.next_port += 1;
        Ok((server, port))
    }

    fn unbind(&self, server: ServerHandle) -> Result<(), TransportError> {
        self.record(Call::Unbind(server), "unbind")
    }

    fn accept(&self, session: SessionHandle, forward_to: Option<&str>) -> Result<(), TransportError> {
        self.record(
            Call::Accept {
                session,
                forward_to: forward_to.map(str::to_string),
            },
            "accept",
        )
    }

    fn reject(
        &self,
        session: SessionHandle,
        reason: u32,
        user_context: &[u8],
    ) -> Result<(), TransportError> {
        self.record(
            Call::Reject {
                session,
                reason,
                user_context: user_context.to_vec(),
            },
            "reject",
        )
    }

    fn send_request(
        &self,
        connection: ConnectionHandle,
        msg: OutgoingMsg<'_>,
    ) -> Result<(), TransportError> {
        self.record(
            Call::SendRequest {
                connection,
                msg: msg.id,
                data: msg.data.to_vec(),
            },
            "send_request",
        )
    }

    fn send_response(
        &self,
        session: SessionHandle,
        msg: OutgoingMsg<'_>,
    ) -> Result<(), TransportError> {
        self.record(
            Call::SendResponse {
                session,
                msg: msg.id,
                data: msg.data.to_vec(),
            },
            "send_response",
        )
    }

    fn alloc_registered(&self, len: usize) -> Result<RegisteredRegion, TransportError> {
        self.record(Call::AllocRegistered { len }, "alloc_registered")?;
        let mut state = self.state.lock().unwrap();
        if !state.registered_allocator {
            return Err(TransportError::Unsupported {
                call: "alloc_registered",
            });
        }
        Ok(RegisteredRegion {
            buf: vec![0; len].into_boxed_slice(),
            key: MemoryKey::from_raw(state.next()),
        })
    }

    fn free_registered(&self, region: RegisteredRegion) -> Result<(), TransportError> {
        self.record(Call::FreeRegistered(region.key), "free_registered")
    }

    fn register_memory(&self, region: &[u8]) -> Result<MemoryKey, TransportError> {
        self.record(Call::RegisterMemory { len: region.len() }, "register_memory")?;
        Ok(MemoryKey::from_raw(self.state.lock().unwrap().next()))
    }

    fn deregister_memory(&self, key: MemoryKey) -> Result<(), TransportError> {
        self.record(Call::DeregisterMemory(key), "deregister_memory")
    }

    fn set_log_level(&self, level: TransportLogLevel) {
        self.state.lock().unwrap().calls.push(Call::SetLogLevel(level));
    }

    fn set_log_sink(&self, sink: Option<LogSink>) {
        self.state.lock().unwrap().log_sink = sink;
    }
}
