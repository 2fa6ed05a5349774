//! Oracle Request Encoder
//!
//! Turns requests into TNS packets. Pure, synchronous computation: the
//! async driver writes the returned bytes as-is (and keeps them for RESEND).
//!
//! Function requests share one sequence counter with the piggybacks that
//! precede them. Bodies larger than the SDU are split across DATA packets.

use bytes::{BufMut, BytesMut};

use super::auth::{AuthContext, Purity, VerifierResponse};
use super::capabilities::Capabilities;
use super::constants::{
    bind_flags, ccap, charset, data_flags, exec_option, function, gso, lob_op, message_type,
    nsi, packet_type, version, CLIENT_VERSION_CODE, DEFAULT_TDU, DRIVER_NAME,
    LOB_PREFETCH_FLAG, MAX_CONNECT_DATA, MAX_LONG_LENGTH, MAX_UROWID_LENGTH,
    PACKET_HEADER_SIZE, PROTOCOL_CHARACTERISTICS, TYPE_REP_ORACLE, TYPE_REP_UNIVERSAL,
};
use super::request::{Bind, CleanupContext, LobOperation, LobRequest, StatementKind, StatementRequest};
use super::ub::UbWriter;
use crate::types::DataType;

/// Offset of the connect data inside a CONNECT packet.
const CONNECT_DATA_OFFSET: u16 = 74;
/// Header plus data flags in front of every DATA payload.
const DATA_OVERHEAD: usize = PACKET_HEADER_SIZE + 2;

/// Types announced in the data types request. NUMBER and DATE keep the
/// Oracle representation; everything else is universal.
const DATA_TYPE_TABLE: &[u16] = &[
    1, 2, 8, 12, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 11, 96, 100, 101, 102, 112, 113,
    114, 180, 181, 182, 183, 208, 231, 252,
];

/// Encodes client requests for one connection.
#[derive(Debug, Default)]
pub struct RequestEncoder {
    capabilities: Capabilities,
    sequence: u8,
}

impl RequestEncoder {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            sequence: 0,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.capabilities = capabilities;
    }

    /// Wraps at 255 and never yields 0.
    fn next_sequence(&mut self) -> u8 {
        self.sequence = self.sequence.wrapping_add(1);
        if self.sequence == 0 {
            self.sequence = 1;
        }
        self.sequence
    }

    fn function_header(&mut self, body: &mut BytesMut, code: u8) {
        let sequence = self.next_sequence();
        body.put_u8(message_type::FUNCTION);
        body.put_u8(code);
        body.put_u8(sequence);
        if self.capabilities.sends_token() {
            body.put_ub8(0);
        }
    }

    fn piggyback_header(&mut self, body: &mut BytesMut, code: u8) {
        let sequence = self.next_sequence();
        body.put_u8(message_type::PIGGYBACK);
        body.put_u8(code);
        body.put_u8(sequence);
        if self.capabilities.sends_token() {
            body.put_ub8(0);
        }
    }

    fn put_packet_header(&self, out: &mut BytesMut, length: usize, kind: u8) {
        if self.capabilities.uses_large_sdu() {
            out.put_u32(length as u32);
        } else {
            out.put_u16(length as u16);
            out.put_u16(0); // checksum
        }
        out.put_u8(kind);
        out.put_u8(0); // flags
        out.put_u16(0);
    }

    /// Frame a DATA body, splitting at the SDU.
    fn data_packets(&self, body: &[u8], flags: u16) -> BytesMut {
        let max_payload = (self.capabilities.sdu as usize)
            .saturating_sub(DATA_OVERHEAD)
            .max(1);
        let packet_count = body.len().div_ceil(max_payload).max(1);
        let mut out = BytesMut::with_capacity(body.len() + packet_count * DATA_OVERHEAD);
        let mut chunks = body.chunks(max_payload).peekable();
        if chunks.peek().is_none() {
            self.put_packet_header(&mut out, DATA_OVERHEAD, packet_type::DATA);
            out.put_u16(flags | self.end_of_request_flag());
            return out;
        }
        while let Some(chunk) = chunks.next() {
            let mut chunk_flags = flags;
            if chunks.peek().is_none() {
                chunk_flags |= self.end_of_request_flag();
            }
            self.put_packet_header(&mut out, DATA_OVERHEAD + chunk.len(), packet_type::DATA);
            out.put_u16(chunk_flags);
            out.put_slice(chunk);
        }
        out
    }

    fn end_of_request_flag(&self) -> u16 {
        if self.capabilities.supports_end_of_response {
            data_flags::END_OF_REQUEST
        } else {
            0
        }
    }

    /// Write pending cleanup as piggybacks ahead of a function request.
    fn piggybacks(&mut self, body: &mut BytesMut, cleanup: &mut CleanupContext) {
        let cleanup = cleanup.take();
        if !cleanup.cursors_to_close.is_empty() {
            self.piggyback_header(body, function::CLOSE_CURSORS);
            body.put_u8(1); // pointer
            body.put_ub4(cleanup.cursors_to_close.len() as u32);
            for cursor_id in &cleanup.cursors_to_close {
                body.put_ub4(*cursor_id as u32);
            }
        }
        if !cleanup.temp_lobs_to_close.is_empty() {
            self.piggyback_header(body, function::LOB_OP);
            body.put_u8(1); // pointer
            body.put_ub4(cleanup.temp_lobs_total_size as u32);
            body.put_u8(0); // dest locator
            body.put_ub4(0);
            body.put_ub4(0); // source locator
            body.put_ub4(0);
            body.put_u8(0); // source offset
            body.put_u8(0); // dest offset
            body.put_u8(0); // charset
            body.put_ub4(lob_op::FREE_TEMP | lob_op::ARRAY);
            body.put_u8(0); // scn
            body.put_ub4(0);
            body.put_ub8(0);
            body.put_ub8(0);
            body.put_u8(0);
            for _ in 0..3 {
                body.put_u8(0); // array LOB fields
                body.put_ub4(0);
            }
            for locator in &cleanup.temp_lobs_to_close {
                body.put_slice(locator);
            }
        }
    }

    // ==================== Connection setup ====================

    /// Encode a CONNECT packet.
    /// Wire format:
    /// - versions, service options, SDU/TDU (u16, clamped)
    /// - connect data length and offset (74)
    /// - NSI flags, large SDU/TDU (u32)
    /// - connect data, or a following DATA packet when longer than 230 bytes
    pub fn connect(&self, connect_data: &str, sdu: u32) -> BytesMut {
        let data = connect_data.as_bytes();
        let inline = data.len() <= MAX_CONNECT_DATA;
        let mut body = BytesMut::with_capacity(66 + data.len());
        body.put_u16(version::DESIRED);
        body.put_u16(version::MINIMUM);
        body.put_u16(gso::DONT_CARE);
        body.put_u16(sdu.min(u16::MAX as u32) as u16);
        body.put_u16(DEFAULT_TDU.min(u16::MAX as u32) as u16);
        body.put_u16(PROTOCOL_CHARACTERISTICS);
        body.put_u16(0); // line turnaround
        body.put_u16(1);
        body.put_u16(data.len() as u16);
        body.put_u16(CONNECT_DATA_OFFSET);
        body.put_u32(0); // max receivable data
        body.put_u8(nsi::SUPPORT_SECURITY_RENEG | nsi::DISABLE_NA);
        body.put_u8(nsi::SUPPORT_SECURITY_RENEG | nsi::DISABLE_NA);
        body.put_slice(&[0u8; 24]);
        body.put_u32(sdu);
        body.put_u32(DEFAULT_TDU);
        body.put_u32(0); // connect flags 1
        body.put_u32(0); // connect flags 2
        if inline {
            body.put_slice(data);
        }

        // CONNECT always goes out with the short header.
        let mut out = BytesMut::with_capacity(PACKET_HEADER_SIZE + body.len());
        out.put_u16((PACKET_HEADER_SIZE + body.len()) as u16);
        out.put_u16(0);
        out.put_u8(packet_type::CONNECT);
        out.put_u8(0);
        out.put_u16(0);
        out.put_slice(&body);
        if !inline {
            out.put_u16((DATA_OVERHEAD + data.len()) as u16);
            out.put_u16(0);
            out.put_u8(packet_type::DATA);
            out.put_u8(0);
            out.put_u16(0);
            out.put_u16(0);
            out.put_slice(data);
        }
        out
    }

    /// Encode the protocol negotiation request.
    pub fn protocol(&self) -> BytesMut {
        let mut body = BytesMut::new();
        body.put_u8(message_type::PROTOCOL);
        body.put_u8(6); // protocol version 8.1 and up
        body.put_u8(0); // array terminator
        body.put_slice(DRIVER_NAME.as_bytes());
        body.put_u8(0);
        self.data_packets(&body, 0)
    }

    /// Encode the data types negotiation request.
    pub fn data_types(&self) -> BytesMut {
        let mut body = BytesMut::new();
        body.put_u8(message_type::DATA_TYPES);
        body.put_u16_le(charset::UTF8);
        body.put_u16_le(charset::UTF8);
        body.put_u8(0x03); // multi-byte, conversion length
        body.put_bytes_with_length(&self.capabilities.compile_caps);
        body.put_bytes_with_length(&self.capabilities.runtime_caps);
        for &data_type in DATA_TYPE_TABLE {
            let representation = if data_type == DataType::Number as u16
                || data_type == DataType::Date as u16
            {
                TYPE_REP_ORACLE
            } else {
                TYPE_REP_UNIVERSAL
            };
            body.put_u16(data_type);
            body.put_u16(data_type);
            body.put_u16(representation as u16);
            body.put_u16(0);
        }
        body.put_u16(0);
        self.data_packets(&body, 0)
    }

    // ==================== Authentication ====================

    fn auth_header(&mut self, body: &mut BytesMut, code: u8, auth: &AuthContext, mode: u32, pairs: u32) {
        self.function_header(body, code);
        let user = auth.username.as_bytes();
        body.put_u8(u8::from(!user.is_empty()));
        body.put_ub4(user.len() as u32);
        body.put_ub4(mode);
        body.put_u8(1); // pointer (authivl)
        body.put_ub4(pairs);
        body.put_u8(1); // pointer (authovl)
        body.put_u8(1); // pointer (authovln)
        body.put_slice(user);
    }

    /// Encode authentication phase one: client identification.
    pub fn auth_phase_one(&mut self, auth: &AuthContext) -> BytesMut {
        let identity = &auth.identity;
        let mut pid = itoa::Buffer::new();
        let pid = pid.format(identity.pid);
        let pairs: [(&str, &[u8]); 5] = [
            ("AUTH_TERMINAL", identity.terminal.as_bytes()),
            ("AUTH_PROGRAM_NM", identity.program.as_bytes()),
            ("AUTH_MACHINE", identity.machine.as_bytes()),
            ("AUTH_PID", pid.as_bytes()),
            ("AUTH_SID", identity.os_user.as_bytes()),
        ];
        let mut body = BytesMut::new();
        self.auth_header(
            &mut body,
            function::AUTH_PHASE_ONE,
            auth,
            auth.phase_one_mode(),
            pairs.len() as u32,
        );
        for (key, value) in pairs {
            body.put_key_value(key, value, 0);
        }
        self.data_packets(&body, 0)
    }

    /// Encode authentication phase two: the verifier.
    pub fn auth_phase_two(&mut self, auth: &AuthContext, verifier: &VerifierResponse) -> BytesMut {
        let mut client_version = itoa::Buffer::new();
        let client_version = client_version.format(CLIENT_VERSION_CODE);
        let mut purity = itoa::Buffer::new();
        let purity = purity.format(auth.purity as u32);
        let mut pairs: Vec<(&str, &[u8], u32)> = vec![
            ("AUTH_SESSKEY", verifier.session_key.as_bytes(), 1),
            ("AUTH_PASSWORD", verifier.encoded_password.as_bytes(), 0),
        ];
        if let Some(speedy) = &verifier.speedy_key {
            pairs.push(("AUTH_PBKDF2_SPEEDY_KEY", speedy.as_bytes(), 0));
        }
        if let Some(new_password) = &verifier.encoded_new_password {
            pairs.push(("AUTH_NEWPASSWORD", new_password.as_bytes(), 0));
        }
        pairs.push(("SESSION_CLIENT_CHARSET", b"873", 0));
        pairs.push(("SESSION_CLIENT_DRIVER_NAME", DRIVER_NAME.as_bytes(), 0));
        pairs.push(("SESSION_CLIENT_VERSION", client_version.as_bytes(), 0));
        if auth.purity != Purity::Default {
            pairs.push(("AUTH_KPPL_PURITY", purity.as_bytes(), 1));
        }

        let mut body = BytesMut::new();
        self.auth_header(
            &mut body,
            function::AUTH_PHASE_TWO,
            auth,
            auth.phase_two_mode(),
            pairs.len() as u32,
        );
        for (key, value, flags) in pairs {
            body.put_key_value(key, value, flags);
        }
        self.data_packets(&body, 0)
    }

    // ==================== Statements ====================

    fn execute_options(request: &StatementRequest) -> (u32, u32, u32) {
        let mut options = 0u32;
        let mut dml_options = 0u32;
        let mut iterations = 1u32;
        if !request.sql.is_empty() {
            dml_options = exec_option::FLAGS_IMPLICIT_RESULTSET;
            options |= exec_option::EXECUTE;
        }
        if request.needs_parse() {
            options |= exec_option::PARSE;
        }
        if request.kind.is_query() {
            if request.options.prefetch_rows > 0 {
                options |= exec_option::FETCH;
            }
            iterations = if request.cursor_id == 0 {
                request.options.prefetch_rows
            } else {
                0
            };
        }
        if request.kind == StatementKind::PlSql {
            if !request.binds.is_empty() {
                options |= exec_option::PLSQL_BIND;
            }
        } else {
            options |= exec_option::NOT_PLSQL;
        }
        if !request.binds.is_empty() {
            options |= exec_option::BIND;
        }
        if request.options.auto_commit {
            options |= exec_option::COMMIT;
        }
        (options, dml_options, iterations)
    }

    /// Encode an execute request, with bind metadata and values.
    pub fn execute(&mut self, request: &StatementRequest, cleanup: &mut CleanupContext) -> BytesMut {
        let (options, dml_options, iterations) = Self::execute_options(request);
        let parse = request.needs_parse();
        let sql = request.sql.as_bytes();
        let is_query = request.kind.is_query();
        let caps_at_12_2 = self.capabilities.field_version_at_least(ccap::FIELD_VERSION_12_2);
        let caps_at_12_2_ext1 =
            self.capabilities.field_version_at_least(ccap::FIELD_VERSION_12_2_EXT1);

        let mut body = BytesMut::with_capacity(128 + sql.len());
        self.piggybacks(&mut body, cleanup);
        self.function_header(&mut body, function::EXECUTE);
        body.put_ub4(options);
        body.put_ub4(request.cursor_id as u32);
        if parse {
            body.put_u8(1); // pointer (cursor)
            body.put_ub4(sql.len() as u32);
        } else {
            body.put_u8(0);
            body.put_ub4(0);
        }
        body.put_u8(1); // pointer (vector)
        body.put_ub4(13); // al8i4 length
        body.put_u8(0); // al8o4
        body.put_u8(0); // al8o4l
        body.put_ub4(0); // prefetch buffer size
        body.put_ub4(iterations); // prefetch rows
        body.put_ub4(MAX_LONG_LENGTH);
        if request.binds.is_empty() {
            body.put_u8(0);
            body.put_ub4(0);
        } else {
            body.put_u8(1);
            body.put_ub4(request.binds.len() as u32);
        }
        body.put_slice(&[0u8; 5]); // al8app, al8txn, al8txl, al8kv, al8kvl
        body.put_u8(0); // defines
        body.put_ub4(0);
        body.put_ub4(0); // registration id
        body.put_u8(0); // al8objlist
        body.put_u8(1); // al8objlen pointer
        body.put_u8(0); // al8blv
        body.put_ub4(0);
        body.put_u8(0); // al8dnam
        body.put_ub4(0);
        body.put_ub4(0); // al8regid_msb
        body.put_u8(0); // DML row counts
        body.put_ub4(0);
        body.put_u8(0);
        if caps_at_12_2 {
            body.put_u8(0); // sql id
            body.put_ub4(0);
            body.put_u8(0); // sql id length
            body.put_ub4(0);
            body.put_u8(0);
            if caps_at_12_2_ext1 {
                body.put_u8(0); // chunk ids
                body.put_ub4(0);
            }
        }
        if parse {
            body.put_bytes_with_length(sql);
            body.put_ub4(1); // al8i4[0] parse
        } else {
            body.put_ub4(0);
        }
        if is_query {
            body.put_ub4(if request.cursor_id == 0 { 0 } else { iterations });
        } else {
            body.put_ub4(1); // execution count
        }
        for _ in 0..5 {
            body.put_ub4(0); // al8i4[2..7]
        }
        body.put_ub4(u32::from(is_query)); // al8i4[7]
        body.put_ub4(0);
        body.put_ub4(dml_options); // al8i4[9]
        for _ in 0..3 {
            body.put_ub4(0);
        }
        if !request.binds.is_empty() {
            self.bind_metadata(&mut body, &request.binds);
            body.put_u8(message_type::ROW_DATA);
            for bind in &request.binds {
                match &bind.value {
                    Some(value) if !value.is_empty() => body.put_bytes_with_length(value),
                    _ => body.put_u8(0),
                }
            }
        }
        self.data_packets(&body, 0)
    }

    fn bind_metadata(&self, body: &mut BytesMut, binds: &[Bind]) {
        let max_string_size = self.capabilities.max_string_size;
        for bind in binds {
            let (data_type, mut buffer_size) = match bind.data_type {
                DataType::Rowid | DataType::Urowid => (DataType::Varchar, MAX_UROWID_LENGTH),
                other => (other, bind.buffer_size),
            };
            if buffer_size > max_string_size {
                buffer_size = MAX_LONG_LENGTH;
            }
            let cont_flag = match data_type {
                DataType::Blob | DataType::Clob => LOB_PREFETCH_FLAG,
                _ => 0,
            };
            body.put_u8(data_type as u8);
            body.put_u8(bind_flags::USE_INDICATORS);
            body.put_u8(0); // precision
            body.put_u8(0); // scale
            body.put_ub4(buffer_size);
            body.put_ub4(0); // max array elements
            body.put_ub8(cont_flag);
            body.put_ub4(0); // OID
            body.put_ub4(0); // version
            body.put_ub4(if bind.csfrm != 0 { charset::UTF8 as u32 } else { 0 });
            body.put_u8(bind.csfrm);
            body.put_ub4(0); // max chars
            if self.capabilities.field_version_at_least(ccap::FIELD_VERSION_12_2) {
                body.put_ub4(0); // oaccolid
            }
        }
    }

    /// Encode a fetch for an open cursor.
    pub fn fetch(&mut self, cursor_id: u16, array_size: u32, cleanup: &mut CleanupContext) -> BytesMut {
        let mut body = BytesMut::new();
        self.piggybacks(&mut body, cleanup);
        self.function_header(&mut body, function::FETCH);
        body.put_ub4(cursor_id as u32);
        body.put_ub4(array_size);
        self.data_packets(&body, 0)
    }

    // ==================== LOBs ====================

    /// Encode a LOB operation.
    pub fn lob_operation(&mut self, request: &LobRequest, cleanup: &mut CleanupContext) -> BytesMut {
        let (source_offset, dest_offset, amount) = match &request.operation {
            LobOperation::GetLength => (0, 0, 0),
            LobOperation::Read { offset, amount } => (*offset, 0, *amount),
            LobOperation::Write { offset, .. } => (*offset, 0, 0),
            LobOperation::Trim { new_size } => (0, 0, *new_size),
            LobOperation::Copy {
                source_offset,
                dest_offset,
                amount,
                ..
            } => (*source_offset, *dest_offset, *amount),
        };
        let dest = request.dest();
        let send_amount = request.sends_amount();

        let mut body = BytesMut::new();
        self.piggybacks(&mut body, cleanup);
        self.function_header(&mut body, function::LOB_OP);
        body.put_u8(1); // source pointer
        body.put_ub4(request.locator.len() as u32);
        match dest {
            Some(dest) => {
                body.put_u8(1);
                body.put_ub4(dest.len() as u32);
            }
            None => {
                body.put_u8(0);
                body.put_ub4(0);
            }
        }
        body.put_ub4(0); // short source offset
        body.put_ub4(0); // short dest offset
        body.put_u8(0); // charset pointer
        body.put_u8(0); // short amount pointer
        body.put_u8(0); // null LOB pointer
        body.put_ub4(request.opcode());
        body.put_u8(0); // scn array pointer
        body.put_u8(0); // scn array length
        body.put_ub8(source_offset);
        body.put_ub8(dest_offset);
        body.put_u8(u8::from(send_amount));
        for _ in 0..3 {
            body.put_u16(0); // array LOB
        }
        body.put_slice(&request.locator);
        if let Some(dest) = dest {
            body.put_slice(dest);
        }
        if let LobOperation::Write { data, .. } = &request.operation {
            body.put_u8(message_type::LOB_DATA);
            body.put_bytes_with_length(data);
        }
        if send_amount {
            body.put_ub8(amount);
        }
        self.data_packets(&body, 0)
    }

    // ==================== Session ====================

    pub fn ping(&mut self, cleanup: &mut CleanupContext) -> BytesMut {
        let mut body = BytesMut::new();
        self.piggybacks(&mut body, cleanup);
        self.function_header(&mut body, function::PING);
        self.data_packets(&body, 0)
    }

    pub fn logoff(&mut self, cleanup: &mut CleanupContext) -> BytesMut {
        let mut body = BytesMut::new();
        self.piggybacks(&mut body, cleanup);
        self.function_header(&mut body, function::LOGOFF);
        self.data_packets(&body, 0)
    }

    /// Empty DATA packet flagged EOF; the server closes the session.
    pub fn close(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(DATA_OVERHEAD);
        self.put_packet_header(&mut out, DATA_OVERHEAD, packet_type::DATA);
        out.put_u16(data_flags::EOF);
        out
    }

    pub fn marker(&self, marker_type: u8) -> BytesMut {
        let mut out = BytesMut::with_capacity(PACKET_HEADER_SIZE + 3);
        self.put_packet_header(&mut out, PACKET_HEADER_SIZE + 3, packet_type::MARKER);
        out.put_slice(&[1, 0, marker_type]);
        out
    }
}
