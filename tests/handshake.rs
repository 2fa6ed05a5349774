//! Negotiation and logon driven through the real codecs.
//!
//! Server packets are built by hand, decoded by `FrameDecoder`, and fed to
//! the state machine; client packets come from `RequestEncoder`.

mod common;

use bytes::BytesMut;
use common::*;
use pretty_assertions::assert_eq;
use qail_oracle::OraError;
use qail_oracle::driver::{AuthPhase, ConnectionAction, ConnectionState, Task};
use qail_oracle::protocol::constants::packet_type;
use qail_oracle::protocol::{
    AuthError, BackendMessage, Capabilities, FrameDecoder, Parameter, ProtocolInfo, RequestEncoder,
    ResponseContext,
};

fn decode_one(decoder: &mut FrameDecoder, mut buf: BytesMut) -> Vec<BackendMessage> {
    let messages = decoder.decode(&mut buf).unwrap().unwrap();
    assert!(buf.is_empty());
    messages
}

#[tokio::test]
async fn test_full_logon_over_the_codecs() {
    let mut machine = machine();
    let mut encoder = RequestEncoder::new(Capabilities::default());
    let mut decoder = FrameDecoder::new(Capabilities::default());

    assert!(matches!(machine.connected(), ConnectionAction::SendConnect));
    let connect = encoder.connect("(DESCRIPTION=(CONNECT_DATA=(SERVICE_NAME=XE)))", 8192);
    assert_eq!(connect[4], packet_type::CONNECT);

    let messages = decode_one(&mut decoder, accept_packet(315, 8192));
    let ConnectionAction::SendProtocol(caps) = machine.handle_message(messages[0].clone()) else {
        panic!("expected protocol request");
    };
    assert!(caps.uses_large_sdu());
    encoder.set_capabilities(caps.clone());
    decoder.set_capabilities(caps);
    assert_eq!(machine.state(), ConnectionState::ProtocolNegotiation);
    assert_eq!(encoder.protocol()[4], packet_type::DATA);

    let messages = decode_one(&mut decoder, data_packet(&protocol_body(), true));
    assert!(matches!(
        machine.handle_message(messages[0].clone()),
        ConnectionAction::SendDataTypes(_)
    ));

    let messages = decode_one(&mut decoder, data_packet(&data_types_body(), true));
    let ConnectionAction::SendAuthPhaseOne(auth) = machine.handle_message(messages[0].clone())
    else {
        panic!("expected auth phase one");
    };
    assert_eq!(
        machine.state(),
        ConnectionState::Authenticating(AuthPhase::One)
    );
    assert!(!encoder.auth_phase_one(&auth).is_empty());

    decoder.set_context(ResponseContext::Authentication);
    let mut body = auth_parameters_body(&challenge());
    body.extend_from_slice(&status_body());
    let mut actions = Vec::new();
    for message in decode_one(&mut decoder, data_packet(&body, true)) {
        actions.push(machine.handle_message(message));
    }
    let Some(ConnectionAction::SendAuthPhaseTwo { auth, verifier }) = actions.pop() else {
        panic!("expected auth phase two, got {actions:?}");
    };
    assert_eq!(verifier.session_key, CLIENT_SESSKEY_12C);
    assert!(!encoder.auth_phase_two(&auth, &verifier).is_empty());

    let mut body = auth_parameters_body(&[
        ("AUTH_SVR_RESPONSE", SVR_RESPONSE_12C, 0),
        ("AUTH_SESSION_ID", "77", 0),
    ]);
    body.extend_from_slice(&status_body());
    let mut actions = Vec::new();
    for message in decode_one(&mut decoder, data_packet(&body, true)) {
        actions.push(machine.handle_message(message));
    }
    let Some(ConnectionAction::AuthenticationComplete(session)) = actions.pop() else {
        panic!("expected logon to complete, got {actions:?}");
    };
    assert_eq!(session.get("AUTH_SESSION_ID"), Some("77"));
    assert_eq!(machine.state(), ConnectionState::ReadyForStatement);

    // First request on the new session.
    decoder.set_context(ResponseContext::Statement);
    let (task, rx) = Task::ping();
    let (_, action) = machine.enqueue(task);
    assert!(matches!(action, ConnectionAction::SendPing));
    for message in decode_one(&mut decoder, data_packet(&status_body(), true)) {
        machine.handle_message(message);
    }
    assert!(rx.await.unwrap().is_ok());
}

#[test]
fn test_refuse_closes_with_listener_code() {
    let mut machine = machine();
    let mut decoder = FrameDecoder::default();
    machine.connected();
    let messages = decode_one(
        &mut decoder,
        refuse_packet("(DESCRIPTION=(ERR=12514)(VSNNUM=0))"),
    );
    match machine.handle_message(messages[0].clone()) {
        ConnectionAction::CloseConnection {
            error: Some(OraError::Refused { code, .. }),
        } => assert_eq!(code, Some(12514)),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(machine.state(), ConnectionState::Errored);
}

#[test]
fn test_old_server_is_rejected() {
    let mut machine = machine();
    let mut decoder = FrameDecoder::default();
    machine.connected();
    let messages = decode_one(&mut decoder, accept_packet(299, 8192));
    assert!(matches!(
        machine.handle_message(messages[0].clone()),
        ConnectionAction::CloseConnection {
            error: Some(OraError::UnsupportedServerVersion(299))
        }
    ));
}

/// Negotiated and waiting for the phase-one answer.
fn awaiting_challenge() -> qail_oracle::driver::ConnectionStateMachine {
    let mut machine = machine();
    machine.connected();
    let messages = decode_one(&mut FrameDecoder::default(), accept_packet(315, 8192));
    machine.handle_message(messages[0].clone());
    machine.handle_message(BackendMessage::Protocol(ProtocolInfo {
        server_version: 6,
        banner: String::new(),
        charset_id: 873,
        ncharset_id: None,
        compile_caps: None,
        runtime_caps: None,
    }));
    machine.handle_message(BackendMessage::DataTypes);
    machine
}

#[test]
fn test_bad_server_response_fails_logon() {
    let mut machine = awaiting_challenge();
    machine.handle_message(BackendMessage::Parameter(Parameter::Authentication(
        session(&challenge()),
    )));
    machine.handle_message(status());
    let zeros = "00".repeat(48);
    machine.handle_message(BackendMessage::Parameter(Parameter::Authentication(
        session(&[("AUTH_SVR_RESPONSE", zeros.as_str(), 0)]),
    )));
    assert!(matches!(
        machine.handle_message(status()),
        ConnectionAction::CloseConnection {
            error: Some(OraError::Auth(_))
        }
    ));
}

#[test]
fn test_missing_session_key_fails_before_phase_two() {
    let mut machine = awaiting_challenge();
    let pairs: Vec<_> = challenge()
        .into_iter()
        .filter(|(key, _, _)| *key != "AUTH_SESSKEY")
        .collect();
    machine.handle_message(BackendMessage::Parameter(Parameter::Authentication(
        session(&pairs),
    )));
    match machine.handle_message(status()) {
        ConnectionAction::CloseConnection {
            error: Some(OraError::Auth(e)),
        } => assert_eq!(e, AuthError::MissingParameter("AUTH_SESSKEY")),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(machine.state(), ConnectionState::Errored);
}

#[test]
fn test_stray_end_of_response_does_not_advance_logon() {
    let mut machine = awaiting_challenge();
    assert!(matches!(
        machine.handle_message(BackendMessage::EndOfResponse),
        ConnectionAction::Wait
    ));
    assert_eq!(
        machine.state(),
        ConnectionState::Authenticating(AuthPhase::One)
    );
}

#[test]
fn test_logon_error_is_fatal() {
    let mut machine = awaiting_challenge();
    let action = machine.handle_message(BackendMessage::Error(qail_oracle::BackendError {
        number: 1017,
        message: Some("ORA-01017: invalid username/password; logon denied".into()),
        ..Default::default()
    }));
    match action {
        ConnectionAction::CloseConnection {
            error: Some(OraError::Server(e)),
        } => assert_eq!(e.number, 1017),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_authenticated_fixture() {
    let machine = authenticated();
    assert!(!machine.has_in_flight());
    assert_eq!(machine.queued(), 0);
}
