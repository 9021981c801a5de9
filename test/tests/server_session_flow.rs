//! Portal and server session lifecycle driven through the loopback transport

use xbridge::{
    session::{SessionError, SessionState},
    ContextConfig, ContextError, MsgPoolConfig, NO_BUFFER_REASON,
};
use xbridge_shared::{
    Event, EventQueueError, IdentityKey, MsgId, SessionEventData, SessionEventKind, SourceAddr,
};
use xbridge_test::{assert_session_error, Call, Harness, Scripted, PEER_ADDR, PORTAL_URI};

const WORKER_URI: &str = "rdma://10.0.0.7:5678/worker";

fn init_logging() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

#[test]
fn portal_reports_its_bound_port() {
    init_logging();
    let mut harness = Harness::new();

    let portal = harness.open_portal();

    let listening = harness.context.portal(portal).unwrap();
    assert_eq!(listening.port(), 47000);
    assert_eq!(listening.uri(), PORTAL_URI);
    assert_eq!(listening.session_count(), 0);
    assert_eq!(
        harness.context.session_state(portal),
        Some(SessionState::Listening)
    );
}

#[test]
fn failed_bind_is_a_creation_error() {
    init_logging();
    let mut harness = Harness::new();
    harness.transport.fail("bind");

    let error = harness.context.create_portal(PORTAL_URI).unwrap_err();

    assert!(format!("{}", error).contains("Failed to create ServerPortal"));
}

#[test]
fn new_session_waits_for_a_decision() {
    init_logging();
    let mut harness = Harness::new();
    let portal = harness.open_portal();

    let (session, handle, _) = harness.inbound_session(portal);

    assert_eq!(
        harness.context.session_state(session),
        Some(SessionState::Creating)
    );
    assert!(!harness.bridge.registry().contains(handle));
    assert_eq!(harness.context.portal(portal).unwrap().session_count(), 1);
}

#[test]
fn unsupported_source_address_rejects_the_session() {
    init_logging();
    let mut harness = Harness::new();
    let portal = harness.open_portal();
    let (handle, _) = harness.transport.inbound_session();

    harness.transport.push(Scripted::NewSession {
        portal,
        session: handle,
        uri: PORTAL_URI.to_string(),
        src_addr: SourceAddr::Unsupported { family: 27 },
    });

    assert_eq!(harness.run(), 0);
    assert_eq!(
        harness
            .transport
            .count_calls(|call| matches!(call, Call::Reject { session, .. } if *session == handle)),
        1
    );
    assert_eq!(harness.context.portal(portal).unwrap().session_count(), 0);
}

#[test]
fn accepted_session_serves_a_request() {
    init_logging();
    let mut harness = Harness::new();
    let pool = harness
        .context
        .create_msg_pool(MsgPoolConfig::new(2, 64, 64))
        .unwrap();
    let portal = harness.open_portal();
    let (session, handle, connection) = harness.inbound_session(portal);

    harness.context.accept_session(session).unwrap();
    assert!(harness.bridge.registry().contains(handle));
    assert_eq!(
        harness.transport.count_calls(|call| *call
            == Call::Accept {
                session: handle,
                forward_to: None
            }),
        1
    );

    harness.transport.push(Scripted::SessionEvent {
        owner: None,
        session: handle,
        event: SessionEventData::new(SessionEventKind::NewConnection).with_connection(connection),
    });
    assert_eq!(harness.run(), 0);
    assert_eq!(
        harness.context.session_state(session),
        Some(SessionState::Established)
    );

    harness.transport.push(Scripted::Request {
        session: handle,
        payload: b"ping".to_vec(),
    });
    let events = harness.run_and_drain();
    let msg_id = match events.as_slice() {
        [Event::RequestReceived {
            msg,
            size: 4,
            session: surfaced,
        }] if *surfaced == session => *msg,
        other => panic!("Expected one request record, got {:?}", other),
    };

    let msg = harness.context.take_msg(msg_id).unwrap();
    let pool_ref = harness.context.msg_pool_mut(pool).unwrap();
    assert_eq!(pool_ref.in_buf(&msg), b"ping");
    pool_ref.out_buf_mut(&msg)[..4].copy_from_slice(b"pong");
    harness.context.send_response(session, msg, 4).unwrap();
    assert_eq!(
        harness.transport.count_calls(|call| *call
            == Call::SendResponse {
                session: handle,
                msg: msg_id,
                data: b"pong".to_vec()
            }),
        1
    );

    harness.transport.push(Scripted::SendComplete {
        session: handle,
        msg: msg_id,
    });
    assert_eq!(
        harness.run_and_drain(),
        vec![Event::MsgSendComplete { msg: msg_id }]
    );
    let msg = harness.context.take_msg(msg_id).unwrap();
    harness.context.release_msg(msg).unwrap();
    assert_eq!(harness.context.msg_pool(pool).unwrap().available(), 2);
}

#[test]
fn request_without_a_buffer_is_a_server_msg_error() {
    init_logging();
    let mut harness = Harness::new();
    let portal = harness.open_portal();
    let (session, handle, _) = harness.inbound_session(portal);
    harness.context.accept_session(session).unwrap();

    harness.transport.push(Scripted::Request {
        session: handle,
        payload: vec![1; 16],
    });

    assert_eq!(
        harness.run_and_drain(),
        vec![Event::MsgErrorServer {
            msg: MsgId::from_u64(0),
            session,
            reason: NO_BUFFER_REASON
        }]
    );
}

#[test]
fn request_picks_the_smallest_fitting_pool() {
    init_logging();
    let mut harness = Harness::new();
    let large = harness
        .context
        .create_msg_pool(MsgPoolConfig::new(1, 1024, 16))
        .unwrap();
    let small = harness
        .context
        .create_msg_pool(MsgPoolConfig::new(1, 32, 16))
        .unwrap();
    let portal = harness.open_portal();
    let (session, handle, _) = harness.inbound_session(portal);
    harness.context.accept_session(session).unwrap();

    harness.transport.push(Scripted::Request {
        session: handle,
        payload: vec![7; 20],
    });
    let first = harness.run_and_drain();
    harness.transport.push(Scripted::Request {
        session: handle,
        payload: vec![7; 20],
    });
    let second = harness.run_and_drain();

    let pool_of = |events: &[Event]| match events {
        [Event::RequestReceived { msg, .. }] => msg.pool(),
        other => panic!("Expected one request record, got {:?}", other),
    };
    assert_eq!(pool_of(&first), small);
    assert_eq!(pool_of(&second), large);
}

#[test]
fn accept_happens_once() {
    init_logging();
    let mut harness = Harness::new();
    let portal = harness.open_portal();
    let (session, _, _) = harness.inbound_session(portal);
    harness.context.accept_session(session).unwrap();

    let error = harness.context.accept_session(session).unwrap_err();

    assert!(matches!(
        error,
        ContextError::Session(SessionError::InvalidState {
            operation: "accept",
            ..
        })
    ));
}

#[test]
fn failed_accept_leaves_the_session_undecided() {
    init_logging();
    let mut harness = Harness::new();
    let portal = harness.open_portal();
    let (session, handle, _) = harness.inbound_session(portal);
    harness.transport.fail("accept");

    assert!(harness.context.accept_session(session).is_err());
    assert!(!harness.bridge.registry().contains(handle));
    assert_eq!(
        harness.context.session_state(session),
        Some(SessionState::Creating)
    );

    harness.transport.heal("accept");
    harness.context.accept_session(session).unwrap();
    assert!(harness.bridge.registry().contains(handle));
}

#[test]
fn listening_session_disconnect_routes_through_close() {
    init_logging();
    let mut harness = Harness::new();
    let portal = harness.open_portal();
    let (session, handle, connection) = harness.inbound_session(portal);
    harness.context.accept_session(session).unwrap();

    harness
        .transport
        .push_session_event(None, handle, SessionEventKind::ConnectionDisconnected);

    assert_eq!(harness.run(), 0);
    assert_eq!(
        harness.context.session_state(session),
        Some(SessionState::Closing)
    );
    assert_eq!(
        harness
            .transport
            .count_calls(|call| *call == Call::Disconnect(connection)),
        1
    );
}

#[test]
fn close_twice_disconnects_once() {
    init_logging();
    let mut harness = Harness::new();
    let portal = harness.open_portal();
    let (session, handle, connection) = harness.inbound_session(portal);
    harness.context.accept_session(session).unwrap();
    harness.transport.push(Scripted::SessionEvent {
        owner: None,
        session: handle,
        event: SessionEventData::new(SessionEventKind::NewConnection).with_connection(connection),
    });
    assert_eq!(harness.run(), 0);

    harness.context.close_session(session).unwrap();
    harness.context.close_session(session).unwrap();

    assert_eq!(
        harness
            .transport
            .count_calls(|call| *call == Call::Disconnect(connection)),
        1
    );
    assert_eq!(
        harness.context.session_state(session),
        Some(SessionState::Closing)
    );
}

#[test]
fn reject_registers_then_forgets_on_teardown() {
    init_logging();
    let mut harness = Harness::new();
    let portal = harness.open_portal();
    let (session, handle, _) = harness.inbound_session(portal);

    harness.context.reject_session(session, 7, b"busy").unwrap();
    assert!(harness.bridge.registry().contains(handle));
    assert_eq!(
        harness.transport.count_calls(|call| *call
            == Call::Reject {
                session: handle,
                reason: 7,
                user_context: b"busy".to_vec()
            }),
        1
    );
    assert_eq!(
        harness.context.session_state(session),
        Some(SessionState::Closing)
    );

    harness
        .transport
        .push_session_event(None, handle, SessionEventKind::Teardown);
    let events = harness.run_and_drain();

    assert_eq!(events.len(), 1);
    assert_session_error!(events[0], session, SessionEventKind::Teardown);
    assert!(harness.bridge.registry().is_empty());
    assert_eq!(harness.context.session_state(session), None);
    assert_eq!(harness.context.portal(portal).unwrap().session_count(), 0);
}

#[test]
fn forwarded_session_absorbs_the_first_disconnect() {
    init_logging();
    let mut harness = Harness::new();
    let portal = harness.open_portal();
    let (session, handle, _) = harness.inbound_session(portal);

    harness.context.forward_session(session, WORKER_URI).unwrap();
    assert_eq!(
        harness.transport.count_calls(|call| *call
            == Call::Accept {
                session: handle,
                forward_to: Some(WORKER_URI.to_string())
            }),
        1
    );

    harness
        .transport
        .push_session_event(None, handle, SessionEventKind::ConnectionDisconnected);
    assert_eq!(harness.run(), 0);
    assert_eq!(
        harness
            .transport
            .count_calls(|call| matches!(call, Call::Disconnect(_))),
        0
    );
    assert_eq!(
        harness.context.session_state(session),
        Some(SessionState::Listening)
    );

    harness
        .transport
        .push_session_event(None, handle, SessionEventKind::ConnectionDisconnected);
    assert_eq!(harness.run(), 0);
    assert_eq!(
        harness
            .transport
            .count_calls(|call| matches!(call, Call::Disconnect(_))),
        1
    );
    assert_eq!(
        harness.context.session_state(session),
        Some(SessionState::Closing)
    );
}

#[test]
fn forwarded_session_is_served_by_another_context() {
    init_logging();
    let mut harness = Harness::new();
    let mut worker = harness.bridge.create_context().unwrap();
    worker
        .create_msg_pool(MsgPoolConfig::new(1, 64, 64))
        .unwrap();
    let portal = harness.open_portal();
    let (session, handle, _) = harness.inbound_session(portal);
    harness.context.forward_session(session, WORKER_URI).unwrap();

    harness.transport.push(Scripted::Request {
        session: handle,
        payload: b"job".to_vec(),
    });
    assert_eq!(worker.run_event_loop(0).unwrap(), 1);

    match worker.drain().unwrap().as_slice() {
        [Event::RequestReceived {
            size: 3,
            session: surfaced,
            ..
        }] => assert_eq!(*surfaced, session),
        other => panic!("Expected one request record, got {:?}", other),
    }
}

// ========== Portal close ==========

#[test]
fn idle_portal_close_notifies_at_once() {
    init_logging();
    let mut harness = Harness::new();
    let portal = harness.open_portal();

    harness.context.close_session(portal).unwrap();

    assert_eq!(
        harness
            .transport
            .count_calls(|call| matches!(call, Call::Unbind(_))),
        1
    );
    let events = harness.drain();
    assert_eq!(events.len(), 1);
    assert_session_error!(events[0], portal, SessionEventKind::Teardown);
    assert_eq!(
        harness.context.session_state(portal),
        Some(SessionState::TornDown)
    );
}

#[test]
fn portal_close_waits_for_its_sessions() {
    init_logging();
    let mut harness = Harness::new();
    let portal = harness.open_portal();
    let (session, handle, _) = harness.inbound_session(portal);
    harness.context.accept_session(session).unwrap();

    harness.context.close_session(portal).unwrap();
    assert!(harness.context.portal(portal).unwrap().flag_to_delete());
    assert_eq!(harness.run(), 0);

    harness
        .transport
        .push_session_event(None, handle, SessionEventKind::ConnectionDisconnected);
    harness
        .transport
        .push_session_event(None, handle, SessionEventKind::Teardown);
    let events = harness.run_and_drain();

    assert_eq!(events.len(), 2);
    assert_session_error!(events[0], session, SessionEventKind::Teardown);
    assert_session_error!(events[1], portal, SessionEventKind::Teardown);
    assert!(!harness.context.portal(portal).unwrap().flag_to_delete());
    assert!(harness.bridge.registry().is_empty());
}

#[test]
fn portal_close_twice_unbinds_and_notifies_once() {
    init_logging();
    let mut harness = Harness::new();
    let portal = harness.open_portal();
    let (session, handle, _) = harness.inbound_session(portal);
    harness.context.accept_session(session).unwrap();

    harness.context.close_session(portal).unwrap();
    harness.context.close_session(portal).unwrap();
    assert_eq!(
        harness
            .transport
            .count_calls(|call| matches!(call, Call::Unbind(_))),
        1
    );

    harness
        .transport
        .push_session_event(None, handle, SessionEventKind::Teardown);
    let events = harness.run_and_drain();
    assert_eq!(events.len(), 2);
    assert_session_error!(events[1], portal, SessionEventKind::Teardown);

    harness.context.close_session(portal).unwrap();
    assert_eq!(harness.run(), 0);
    assert!(harness.drain().is_empty());
}

// ========== Queue overflow ==========

#[test]
fn new_session_that_does_not_fit_is_rejected() {
    init_logging();
    let mut harness = Harness::with_queue_size(40);
    let portal = harness.open_portal();
    let (handle, _) = harness.transport.inbound_session();
    harness.transport.push(Scripted::NewSession {
        portal,
        session: handle,
        uri: PORTAL_URI.to_string(),
        src_addr: SourceAddr::Ip(PEER_ADDR.parse().unwrap()),
    });

    let error = harness.context.run_event_loop(0).unwrap_err();

    assert!(matches!(
        error,
        ContextError::Queue(EventQueueError::Overflow { needed: 57, .. })
    ));
    assert_eq!(
        harness
            .transport
            .count_calls(|call| matches!(call, Call::Reject { session, .. } if *session == handle)),
        1
    );
    assert_eq!(harness.context.portal(portal).unwrap().session_count(), 0);

    harness.context.close_session(portal).unwrap();
    let events = harness.drain();
    assert_eq!(events.len(), 1);
    assert_session_error!(events[0], portal, SessionEventKind::Teardown);
    assert_eq!(
        harness.context.session_state(portal),
        Some(SessionState::TornDown)
    );
}

#[test]
fn request_that_does_not_fit_returns_its_msg() {
    init_logging();
    let mut harness = Harness::new();
    let mut worker = harness
        .bridge
        .create_context_with(&ContextConfig {
            event_queue_size: 20,
        })
        .unwrap();
    let pool = worker
        .create_msg_pool(MsgPoolConfig::new(1, 64, 64))
        .unwrap();
    let portal = harness.open_portal();
    let (session, handle, _) = harness.inbound_session(portal);
    harness.context.forward_session(session, WORKER_URI).unwrap();

    harness.transport.push(Scripted::Request {
        session: handle,
        payload: b"job".to_vec(),
    });
    let error = worker.run_event_loop(0).unwrap_err();

    assert!(matches!(
        error,
        ContextError::Queue(EventQueueError::Overflow { needed: 24, .. })
    ));
    assert_eq!(worker.pending().count, 0);
    assert_eq!(worker.msg_pool(pool).unwrap().available(), 1);
}

#[test]
fn dropped_context_unbinds_and_destroys_its_loop() {
    init_logging();
    let Harness {
        transport,
        bridge: _bridge,
        mut context,
    } = Harness::new();
    let event_loop = context.event_loop();
    context.create_portal(PORTAL_URI).unwrap();

    drop(context);

    assert_eq!(
        transport.count_calls(|call| matches!(call, Call::Unbind(_))),
        1
    );
    assert_eq!(
        transport.count_calls(|call| *call == Call::DestroyLoop(event_loop)),
        1
    );
}
