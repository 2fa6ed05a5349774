//! Server-side packet builders and fixtures shared by the integration tests.

#![allow(dead_code)]

use bytes::{BufMut, BytesMut};
use qail_oracle::driver::{ConnectionAction, ConnectionState, ConnectionStateMachine};
use qail_oracle::protocol::constants::{message_type, packet_type, verifier_type};
use qail_oracle::protocol::{
    Accept, AuthContext, BackendMessage, Parameter, ProtocolInfo, SessionData, Status, UbWriter,
};
use rand::RngCore;

pub const VFR_DATA: &str = "000102030405060708090A0B0C0D0E0F";
pub const CSK_SALT: &str = "F0F1F2F3F4F5F6F7F8F9FAFBFCFDFEFF";
pub const SERVER_SESSKEY_12C: &str =
    "72CB10ABAB129310C6AFB261479D05CF59B856AF15559A796EF2E967A64FDE1E";
pub const CLIENT_SESSKEY_12C: &str =
    "FD84F1E4351AA1507974681DDC1ED8C9CE37E7AB2FF7F4FE859422FD201E74DD";
pub const SVR_RESPONSE_12C: &str = "38E044503EC504BED63BCDC831ADFE90148728F4924529914FBDF0214765C4700CD3B07CB04FA23DBE5412CA84A6210D";

/// Deterministic RNG: yields 0, 1, 2, ... across calls.
pub struct CountingRng(pub u8);

impl RngCore for CountingRng {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for byte in dest {
            *byte = self.0;
            self.0 = self.0.wrapping_add(1);
        }
    }
}

pub fn machine() -> ConnectionStateMachine {
    ConnectionStateMachine::with_rng(AuthContext::new("scott", "tiger"), Box::new(CountingRng(0)))
}

/// Phase-one answer for a 12c verifier.
pub fn challenge() -> Vec<(&'static str, &'static str, u32)> {
    vec![
        ("AUTH_VFR_DATA", VFR_DATA, verifier_type::V12C),
        ("AUTH_PBKDF2_VGEN_COUNT", "4096", 0),
        ("AUTH_SESSKEY", SERVER_SESSKEY_12C, 0),
        ("AUTH_PBKDF2_CSK_SALT", CSK_SALT, 0),
        ("AUTH_PBKDF2_SDER_COUNT", "3", 0),
    ]
}

pub fn session(pairs: &[(&str, &str, u32)]) -> SessionData {
    let mut session = SessionData::default();
    for (key, value, flags) in pairs {
        session.insert(*key, *value, *flags);
    }
    session
}

pub fn status() -> BackendMessage {
    BackendMessage::Status(Status {
        call_status: 0,
        end_to_end_sequence: 0,
    })
}

/// Drive a state machine through negotiation and logon at the message level.
pub fn authenticated() -> ConnectionStateMachine {
    let mut machine = machine();
    assert!(matches!(machine.connected(), ConnectionAction::SendConnect));
    let action = logon(&mut machine);
    assert!(matches!(action, ConnectionAction::AuthenticationComplete(_)));
    assert_eq!(machine.state(), ConnectionState::ReadyForStatement);
    machine
}

/// Feed every server message from ACCEPT to the phase-two status; returns the last action.
pub fn logon(machine: &mut ConnectionStateMachine) -> ConnectionAction {
    machine.handle_message(BackendMessage::Accept(Accept {
        protocol_version: 315,
        protocol_options: 0,
        nsi_flags: 0,
        sdu: 8192,
        flags2: 0,
    }));
    machine.handle_message(BackendMessage::Protocol(ProtocolInfo {
        server_version: 6,
        banner: "x86_64/Linux 2.4.xx".into(),
        charset_id: 873,
        ncharset_id: None,
        compile_caps: None,
        runtime_caps: None,
    }));
    machine.handle_message(BackendMessage::DataTypes);
    machine.handle_message(BackendMessage::Parameter(Parameter::Authentication(
        session(&challenge()),
    )));
    machine.handle_message(status());
    machine.handle_message(BackendMessage::Parameter(Parameter::Authentication(
        session(&[("AUTH_SVR_RESPONSE", SVR_RESPONSE_12C, 0)]),
    )));
    machine.handle_message(status())
}

/// Wrap a payload in a packet header; `large` selects the 4-byte length.
pub fn packet(kind: u8, payload: &[u8], large: bool) -> BytesMut {
    let mut out = BytesMut::new();
    let length = 8 + payload.len();
    if large {
        out.put_u32(length as u32);
    } else {
        out.put_u16(length as u16);
        out.put_u16(0);
    }
    out.put_u8(kind);
    out.put_u8(0);
    out.put_u16(0);
    out.put_slice(payload);
    out
}

pub fn data_packet(body: &[u8], large: bool) -> BytesMut {
    let mut payload = vec![0u8, 0];
    payload.extend_from_slice(body);
    packet(packet_type::DATA, &payload, large)
}

pub fn accept_packet(version: u16, sdu: u32) -> BytesMut {
    let mut payload = BytesMut::new();
    payload.put_u16(version);
    payload.put_u16(0);
    payload.put_slice(&[0u8; 10]);
    payload.put_u8(0); // nsi flags
    payload.put_slice(&[0u8; 9]);
    payload.put_u32(sdu);
    packet(packet_type::ACCEPT, &payload, false)
}

pub fn refuse_packet(data: &str) -> BytesMut {
    let mut payload = BytesMut::new();
    payload.put_u8(4);
    payload.put_u8(0);
    payload.put_u16(data.len() as u16);
    payload.put_slice(data.as_bytes());
    packet(packet_type::REFUSE, &payload, false)
}

pub fn protocol_body() -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_u8(message_type::PROTOCOL);
    body.put_u8(6);
    body.put_u8(0);
    body.put_slice(b"x86_64/Linux 2.4.xx\0");
    body.put_u16_le(873);
    body.put_u8(0); // server flags
    body.put_u16_le(0); // no elements
    body.put_u16(0); // no fdo
    body.put_u8(0); // compile caps
    body.put_u8(0); // runtime caps
    body.to_vec()
}

pub fn data_types_body() -> Vec<u8> {
    vec![message_type::DATA_TYPES, 0, 0]
}

pub fn status_body() -> Vec<u8> {
    vec![message_type::STATUS, 0, 0, 0, 0, 0, 0]
}

pub fn auth_parameters_body(pairs: &[(&str, &str, u32)]) -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_u8(message_type::PARAMETER);
    body.put_ub2(pairs.len() as u16);
    for (key, value, flags) in pairs {
        body.put_key_value(key, value.as_bytes(), *flags);
    }
    body.to_vec()
}
