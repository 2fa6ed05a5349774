//! Backend (server → client) messages.
//!
//! One closed enum for everything the server can send. Transport packets
//! (ACCEPT, REFUSE, MARKER, ...) decode to a single message; DATA packets
//! carry a run of TTC messages, demultiplexed by `FrameDecoder`.

use std::sync::Arc;

use bytes::Bytes;

use super::auth::SessionData;
use super::constants::{control_type, server_piggyback, version};
use super::describe::{ColumnMetadata, ColumnValue};
use super::error::{DecodeError, DecodeResult};
use super::error_info::BackendError;
use super::ub::UbReader;

/// Backend message types
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    Accept(Accept),
    Refuse(Refuse),
    Redirect(String),
    /// Marker packet type (BREAK, RESET, INTERRUPT)
    Marker(u8),
    Control(u16),
    /// Server asks for the last packet again
    Resend,
    Protocol(ProtocolInfo),
    DataTypes,
    Parameter(Parameter),
    Status(Status),
    Error(BackendError),
    Warning(BackendError),
    DescribeInfo(Arc<[ColumnMetadata]>),
    RowHeader,
    BitVector,
    RowData(Vec<ColumnValue>),
    LobData(Bytes),
    ServerPiggyback(ServerPiggyback),
    FlushOutBinds,
    EndOfResponse,
}

/// ACCEPT packet contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accept {
    pub protocol_version: u16,
    pub protocol_options: u16,
    pub nsi_flags: u8,
    pub sdu: u32,
    pub flags2: u32,
}

/// REFUSE packet contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refuse {
    pub user_reason: u8,
    pub system_reason: u8,
    pub data: String,
}

impl Refuse {
    /// Listener error code from `(ERR=12514)` in the refuse data.
    pub fn error_code(&self) -> Option<u32> {
        let start = self.data.find("(ERR=")? + "(ERR=".len();
        let digits: String = self.data[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }
}

/// Protocol negotiation response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub server_version: u8,
    pub banner: String,
    pub charset_id: u16,
    pub ncharset_id: Option<u16>,
    pub compile_caps: Option<Bytes>,
    pub runtime_caps: Option<Bytes>,
}

/// End-of-call status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub call_status: u32,
    pub end_to_end_sequence: u16,
}

/// Keyword values returned by execute
pub mod keyword {
    pub const CURRENT_SCHEMA: u16 = 168;
    pub const EDITION: u16 = 172;
}

/// PARAMETER message; the shape depends on the request that is answered.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Authentication(SessionData),
    Statement(Vec<(u16, Option<Bytes>)>),
    Lob(LobParameters),
}

/// Values returned by a LOB operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LobParameters {
    pub source_locator: Option<Bytes>,
    pub dest_locator: Option<Bytes>,
    pub amount: Option<i64>,
    pub flag: Option<bool>,
}

/// Server-side piggyback that carries state the client keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerPiggyback {
    Ltxid(Bytes),
    SessionState { session_id: u32, serial_num: u16 },
    /// Consumed for framing, nothing to keep
    Skipped(u8),
}

impl BackendMessage {
    pub(crate) fn decode_accept(payload: &mut Bytes) -> DecodeResult<Self> {
        let protocol_version = payload.read_u16_be()?;
        let protocol_options = payload.read_u16_be()?;
        payload.skip(10)?;
        let nsi_flags = payload.read_u8()?;
        payload.skip(9)?;
        let sdu = payload.read_u32_be()?;
        let flags2 = if protocol_version >= version::MIN_OOB_CHECK {
            payload.skip(5)?;
            payload.read_u32_be()?
        } else {
            0
        };
        Ok(BackendMessage::Accept(Accept {
            protocol_version,
            protocol_options,
            nsi_flags,
            sdu,
            flags2,
        }))
    }

    pub(crate) fn decode_refuse(payload: &mut Bytes) -> DecodeResult<Self> {
        let user_reason = payload.read_u8()?;
        let system_reason = payload.read_u8()?;
        let length = payload.read_u16_be()? as usize;
        let data = payload.read_raw(length.min(payload.len()))?;
        Ok(BackendMessage::Refuse(Refuse {
            user_reason,
            system_reason,
            data: String::from_utf8_lossy(&data).into_owned(),
        }))
    }

    pub(crate) fn decode_redirect(payload: &mut Bytes) -> DecodeResult<Self> {
        let length = payload.read_u16_be()? as usize;
        let data = payload.read_raw(length.min(payload.len()))?;
        Ok(BackendMessage::Redirect(
            String::from_utf8_lossy(&data).into_owned(),
        ))
    }

    pub(crate) fn decode_marker(payload: &mut Bytes) -> DecodeResult<Self> {
        payload.skip(2)?;
        Ok(BackendMessage::Marker(payload.read_u8()?))
    }

    pub(crate) fn decode_control(payload: &mut Bytes) -> DecodeResult<Self> {
        match payload.read_u16_be()? {
            kind @ (control_type::INBAND_NOTIFICATION | control_type::RESET_OOB) => {
                Ok(BackendMessage::Control(kind))
            }
            other => Err(DecodeError::UnknownControlType(other)),
        }
    }

    pub(crate) fn decode_protocol(payload: &mut Bytes) -> DecodeResult<Self> {
        let server_version = payload.read_u8()?;
        payload.skip(1)?;
        let banner = payload.read_null_terminated("server banner")?;
        let charset_id = payload.read_u16_le()?;
        payload.skip(1)?; // server flags
        let elements = payload.read_u16_le()? as usize;
        payload.skip(elements * 5)?;
        let fdo_length = payload.read_u16_be()? as usize;
        let fdo = payload.read_raw(fdo_length)?;
        let ncharset_id = fdo_ncharset(&fdo);
        let compile_caps = payload.read_bytes()?;
        let runtime_caps = payload.read_bytes()?;
        Ok(BackendMessage::Protocol(ProtocolInfo {
            server_version,
            banner,
            charset_id,
            ncharset_id,
            compile_caps,
            runtime_caps,
        }))
    }

    pub(crate) fn decode_data_types(payload: &mut Bytes) -> DecodeResult<Self> {
        loop {
            if payload.read_u16_be()? == 0 {
                break;
            }
            if payload.read_u16_be()? != 0 {
                payload.skip(4)?;
            }
        }
        Ok(BackendMessage::DataTypes)
    }

    pub(crate) fn decode_status(payload: &mut Bytes) -> DecodeResult<Self> {
        let call_status = payload.read_u32_be()?;
        let end_to_end_sequence = payload.read_u16_be()?;
        Ok(BackendMessage::Status(Status {
            call_status,
            end_to_end_sequence,
        }))
    }

    pub(crate) fn decode_auth_parameters(payload: &mut Bytes) -> DecodeResult<Self> {
        let count = payload.read_ub2()?;
        let mut session = SessionData::default();
        for _ in 0..count {
            payload.skip_ub4()?;
            let key = payload.read_str("auth key")?.unwrap_or_default();
            let value = if payload.read_ub4()? > 0 {
                payload.read_str("auth value")?.unwrap_or_default()
            } else {
                String::new()
            };
            let flags = payload.read_ub4()?;
            session.insert(key, value, flags);
        }
        Ok(BackendMessage::Parameter(Parameter::Authentication(session)))
    }

    pub(crate) fn decode_statement_parameters(payload: &mut Bytes) -> DecodeResult<Self> {
        let count = payload.read_ub2()?; // al8o4l
        for _ in 0..count {
            payload.skip_ub4()?;
        }
        let length = payload.read_ub2()?; // al8txl
        payload.skip(length as usize)?;
        let count = payload.read_ub2()?;
        let mut keywords = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if payload.read_ub2()? > 0 {
                payload.skip_bytes_chunked()?; // key text
            }
            let value = if payload.read_ub2()? > 0 {
                payload.read_bytes()?
            } else {
                None
            };
            keywords.push((payload.read_ub2()?, value));
        }
        let length = payload.read_ub2()?; // registration
        payload.skip(length as usize)?;
        Ok(BackendMessage::Parameter(Parameter::Statement(keywords)))
    }

    pub(crate) fn decode_lob_parameters(
        payload: &mut Bytes,
        source_len: usize,
        dest_len: usize,
        operation: u32,
        send_amount: bool,
    ) -> DecodeResult<Self> {
        use super::constants::lob_op;

        let mut params = LobParameters::default();
        if source_len > 0 {
            params.source_locator = Some(payload.read_raw(source_len)?);
        }
        if dest_len > 0 {
            params.dest_locator = Some(payload.read_raw(dest_len)?);
        }
        if operation == lob_op::CREATE_TEMP {
            payload.skip_ub2()?; // charset
            payload.skip(3)?;
        }
        if send_amount {
            params.amount = Some(payload.read_sb8()?);
        }
        if operation == lob_op::CREATE_TEMP {
            params.flag = Some(payload.read_ub2()? > 0);
        }
        Ok(BackendMessage::Parameter(Parameter::Lob(params)))
    }

    pub(crate) fn decode_server_piggyback(payload: &mut Bytes) -> DecodeResult<Self> {
        let opcode = payload.read_ub1()?;
        let piggyback = match opcode {
            server_piggyback::LTXID => match payload.read_ub4()? {
                0 => ServerPiggyback::Skipped(opcode),
                _ => ServerPiggyback::Ltxid(payload.read_bytes()?.unwrap_or_default()),
            },
            server_piggyback::QUERY_CACHE_INVALIDATION | server_piggyback::TRACE_EVENT => {
                ServerPiggyback::Skipped(opcode)
            }
            server_piggyback::OS_PID_MTS => {
                payload.skip_ub2()?;
                payload.skip_bytes_chunked()?;
                ServerPiggyback::Skipped(opcode)
            }
            server_piggyback::SYNC => {
                payload.skip_ub2()?; // DTY count
                payload.skip_ub1()?; // DTY length
                let elements = payload.read_ub2()?;
                payload.skip_ub1()?;
                skip_key_values(payload, elements)?;
                payload.skip_ub4()?; // overall flags
                ServerPiggyback::Skipped(opcode)
            }
            server_piggyback::EXT_SYNC => {
                payload.skip_ub2()?;
                payload.skip_ub1()?;
                ServerPiggyback::Skipped(opcode)
            }
            server_piggyback::AC_REPLAY_CONTEXT => {
                payload.skip_ub2()?;
                payload.skip_ub1()?;
                payload.skip_ub4()?; // flags
                payload.skip_ub4()?; // error code
                payload.skip_ub1()?; // queue
                if payload.read_ub4()? > 0 {
                    payload.skip_bytes_chunked()?; // replay context
                }
                ServerPiggyback::Skipped(opcode)
            }
            server_piggyback::SESS_RET => {
                payload.skip_ub2()?;
                payload.skip_ub1()?;
                let elements = payload.read_ub2()?;
                if elements > 0 {
                    payload.skip_ub1()?;
                    skip_key_values(payload, elements)?;
                }
                payload.skip_ub4()?; // session flags
                let session_id = payload.read_ub4()?;
                let serial_num = payload.read_ub2()?;
                ServerPiggyback::SessionState {
                    session_id,
                    serial_num,
                }
            }
            other => {
                tracing::warn!(opcode = other, "Unknown server piggyback");
                return Err(DecodeError::FieldNotDecodable("server piggyback opcode"));
            }
        };
        Ok(BackendMessage::ServerPiggyback(piggyback))
    }
}

fn skip_key_values(payload: &mut Bytes, count: u16) -> DecodeResult<()> {
    for _ in 0..count {
        if payload.read_ub2()? > 0 {
            payload.skip_bytes_chunked()?;
        }
        if payload.read_ub2()? > 0 {
            payload.skip_bytes_chunked()?;
        }
        payload.skip_ub2()?; // flags
    }
    Ok(())
}

/// National character set id, buried in the FDO block.
fn fdo_ncharset(fdo: &[u8]) -> Option<u16> {
    let ix = 6 + *fdo.get(5)? as usize + *fdo.get(6)? as usize;
    let high = *fdo.get(ix + 3)?;
    let low = *fdo.get(ix + 4)?;
    Some(u16::from_be_bytes([high, low]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ub::UbWriter;
    use bytes::{BufMut, BytesMut};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_refuse_error_code() {
        let refuse = Refuse {
            user_reason: 0,
            system_reason: 0,
            data: "(DESCRIPTION=(TMP=)(VSNNUM=0)(ERR=12514)(ERROR_STACK=))".to_string(),
        };
        assert_eq!(refuse.error_code(), Some(12514));
        assert_eq!(
            Refuse { data: String::new(), ..refuse }.error_code(),
            None
        );
    }

    #[test]
    fn test_accept_with_flags2() {
        let mut buf = BytesMut::new();
        buf.put_u16(319);
        buf.put_u16(0);
        buf.put_slice(&[0; 10]);
        buf.put_u8(0);
        buf.put_slice(&[0; 9]);
        buf.put_u32(8192);
        buf.put_slice(&[0; 5]);
        buf.put_u32(0x1200_0000);
        let msg = BackendMessage::decode_accept(&mut buf.freeze()).unwrap();
        assert_eq!(
            msg,
            BackendMessage::Accept(Accept {
                protocol_version: 319,
                protocol_options: 0,
                nsi_flags: 0,
                sdu: 8192,
                flags2: 0x1200_0000,
            })
        );
    }

    #[test]
    fn test_unknown_control_type() {
        let mut buf = Bytes::from_static(&[0, 42]);
        assert_eq!(
            BackendMessage::decode_control(&mut buf).unwrap_err(),
            DecodeError::UnknownControlType(42)
        );
    }

    #[test]
    fn test_auth_parameters_keep_flags() {
        let mut buf = BytesMut::new();
        buf.put_ub2(1);
        buf.put_ub4(13);
        buf.put_bytes_with_length(b"AUTH_VFR_DATA");
        buf.put_ub4(4);
        buf.put_bytes_with_length(b"ABCD");
        buf.put_ub4(0x4815);
        let msg = BackendMessage::decode_auth_parameters(&mut buf.freeze()).unwrap();
        let BackendMessage::Parameter(Parameter::Authentication(session)) = msg else {
            panic!("expected auth parameters");
        };
        assert_eq!(session.get("AUTH_VFR_DATA"), Some("ABCD"));
        assert_eq!(session.flags("AUTH_VFR_DATA"), Some(0x4815));
    }

    #[test]
    fn test_fdo_ncharset_is_bounds_checked() {
        assert_eq!(fdo_ncharset(&[0; 4]), None);
        let mut fdo = vec![0u8; 12];
        fdo[9] = 0x07;
        fdo[10] = 0xd0;
        assert_eq!(fdo_ncharset(&fdo), Some(2000));
    }

    #[test]
    fn test_session_return_piggyback() {
        let mut buf = BytesMut::new();
        buf.put_u8(server_piggyback::SESS_RET);
        buf.put_ub2(0);
        buf.put_u8(0);
        buf.put_ub2(0);
        buf.put_ub4(0);
        buf.put_ub4(77);
        buf.put_ub2(1234);
        let msg = BackendMessage::decode_server_piggyback(&mut buf.freeze()).unwrap();
        assert_eq!(
            msg,
            BackendMessage::ServerPiggyback(ServerPiggyback::SessionState {
                session_id: 77,
                serial_num: 1234,
            })
        );
    }
}
