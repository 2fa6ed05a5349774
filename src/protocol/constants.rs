//! TNS and TTC protocol constants.
//!
//! Grouped by the field they appear in so call sites read as
//! `packet_type::DATA`, `function::EXECUTE`, `auth_mode::SYSDBA`.

/// Every TNS packet starts with an 8-byte header.
pub const PACKET_HEADER_SIZE: usize = 8;

/// Protocol versions exchanged in CONNECT/ACCEPT.
pub mod version {
    pub const DESIRED: u16 = 319;
    pub const MINIMUM: u16 = 300;
    pub const MIN_ACCEPTED: u16 = 315;
    /// From this version on, packet lengths are 4 bytes instead of 2.
    pub const MIN_LARGE_SDU: u16 = 315;
    /// From this version on, ACCEPT carries a second flags word.
    pub const MIN_OOB_CHECK: u16 = 318;
    pub const MIN_END_OF_RESPONSE: u16 = 319;
}

/// Packet type byte at header offset 4.
pub mod packet_type {
    pub const CONNECT: u8 = 1;
    pub const ACCEPT: u8 = 2;
    pub const REFUSE: u8 = 4;
    pub const REDIRECT: u8 = 5;
    pub const DATA: u8 = 6;
    pub const RESEND: u8 = 11;
    pub const MARKER: u8 = 12;
    pub const CONTROL: u8 = 14;
}

/// Flags carried in the first two bytes of a DATA packet payload.
pub mod data_flags {
    pub const END_OF_REQUEST: u16 = 0x0800;
    pub const EOF: u16 = 0x0040;
}

pub mod marker_type {
    pub const BREAK: u8 = 1;
    pub const RESET: u8 = 2;
    pub const INTERRUPT: u8 = 3;
}

pub mod control_type {
    pub const INBAND_NOTIFICATION: u16 = 8;
    pub const RESET_OOB: u16 = 9;
}

/// TTC message type, the first byte of each message inside a DATA packet.
pub mod message_type {
    pub const PROTOCOL: u8 = 1;
    pub const DATA_TYPES: u8 = 2;
    pub const FUNCTION: u8 = 3;
    pub const ERROR: u8 = 4;
    pub const ROW_HEADER: u8 = 6;
    pub const ROW_DATA: u8 = 7;
    pub const PARAMETER: u8 = 8;
    pub const STATUS: u8 = 9;
    pub const IO_VECTOR: u8 = 11;
    pub const LOB_DATA: u8 = 14;
    pub const WARNING: u8 = 15;
    pub const DESCRIBE_INFO: u8 = 16;
    pub const PIGGYBACK: u8 = 17;
    pub const FLUSH_OUT_BINDS: u8 = 19;
    pub const BIT_VECTOR: u8 = 21;
    pub const SERVER_SIDE_PIGGYBACK: u8 = 23;
    pub const IMPLICIT_RESULTSET: u8 = 27;
    pub const RENEGOTIATE: u8 = 28;
    pub const END_OF_RESPONSE: u8 = 29;
}

/// TTC function codes.
pub mod function {
    pub const AUTH_PHASE_ONE: u8 = 118;
    pub const AUTH_PHASE_TWO: u8 = 115;
    pub const CLOSE_CURSORS: u8 = 105;
    pub const COMMIT: u8 = 14;
    pub const EXECUTE: u8 = 94;
    pub const FETCH: u8 = 5;
    pub const LOB_OP: u8 = 96;
    pub const LOGOFF: u8 = 9;
    pub const PING: u8 = 147;
    pub const ROLLBACK: u8 = 15;
}

pub mod server_piggyback {
    pub const QUERY_CACHE_INVALIDATION: u8 = 1;
    pub const OS_PID_MTS: u8 = 2;
    pub const TRACE_EVENT: u8 = 3;
    pub const SESS_RET: u8 = 4;
    pub const SYNC: u8 = 5;
    pub const LTXID: u8 = 7;
    pub const AC_REPLAY_CONTEXT: u8 = 8;
    pub const EXT_SYNC: u8 = 9;
}

/// Mode bits sent in the authentication request.
pub mod auth_mode {
    pub const LOGON: u32 = 0x0000_0001;
    pub const CHANGE_PASSWORD: u32 = 0x0000_0002;
    pub const SYSDBA: u32 = 0x0000_0020;
    pub const SYSOPER: u32 = 0x0000_0040;
    pub const PRELIM: u32 = 0x0000_0080;
    pub const WITH_PASSWORD: u32 = 0x0000_0100;
    pub const SYSASM: u32 = 0x0040_0000;
    pub const SYSBKP: u32 = 0x0100_0000;
    pub const SYSDGD: u32 = 0x0200_0000;
    pub const SYSKMT: u32 = 0x0400_0000;
    pub const SYSRAC: u32 = 0x0800_0000;
}

pub mod verifier_type {
    pub const V11G_1: u32 = 0xb152;
    pub const V11G_2: u32 = 0x1b25;
    pub const V12C: u32 = 0x4815;
}

/// Flags from NSI negotiation in CONNECT/ACCEPT.
pub mod nsi {
    pub const DISABLE_NA: u8 = 0x04;
    pub const NA_REQUIRED: u8 = 0x10;
    pub const SUPPORT_SECURITY_RENEG: u8 = 0x80;
}

/// Second ACCEPT flags word.
pub mod accept_flags {
    pub const FAST_AUTH: u32 = 0x1000_0000;
    pub const HAS_END_OF_RESPONSE: u32 = 0x0200_0000;
}

pub mod gso {
    pub const DONT_CARE: u16 = 0x0001;
    pub const CAN_RECV_ATTENTION: u16 = 0x0400;
}

/// Compile-time capability array indices and values.
pub mod ccap {
    pub const SQL_VERSION: usize = 0;
    pub const LOGON_TYPES: usize = 4;
    pub const CTB_FEATURE_BACKPORT: usize = 5;
    pub const FIELD_VERSION: usize = 7;
    pub const SERVER_DEFINE_CONV: usize = 8;
    pub const TTC1: usize = 15;
    pub const OCI1: usize = 16;
    pub const TDS_VERSION: usize = 17;
    pub const RPC_VERSION: usize = 18;
    pub const RPC_SIG: usize = 19;
    pub const DBF_VERSION: usize = 21;
    pub const LOB: usize = 23;
    pub const TTC2: usize = 26;
    pub const UB2_DTY: usize = 27;
    pub const OCI2: usize = 31;
    pub const CLIENT_FN: usize = 34;
    pub const TTC3: usize = 37;
    pub const SESS_SIGNATURE_VERSION: usize = 39;
    pub const TTC4: usize = 40;
    pub const LOB2: usize = 42;
    pub const TTC5: usize = 44;
    pub const VECTOR_FEATURES: usize = 52;
    pub const MAX: usize = 53;

    pub const SQL_VERSION_MAX: u8 = 6;
    pub const FIELD_VERSION_12_2: u8 = 8;
    pub const FIELD_VERSION_12_2_EXT1: u8 = 9;
    pub const FIELD_VERSION_19_1_EXT_1: u8 = 13;
    pub const FIELD_VERSION_20_1: u8 = 14;
    pub const FIELD_VERSION_23_1: u8 = 17;
    pub const FIELD_VERSION_23_1_EXT_1: u8 = 18;
    pub const FIELD_VERSION_MAX: u8 = FIELD_VERSION_23_1_EXT_1;

    pub const O5LOGON: u8 = 8;
    pub const O5LOGON_NP: u8 = 2;
    pub const O7LOGON: u8 = 32;
    pub const O8LOGON_LONG_IDENTIFIER: u8 = 64;
    pub const O9LOGON_LONG_PASSWORD: u8 = 0x80;
    pub const END_OF_CALL_STATUS: u8 = 0x01;
    pub const IND_RCD: u8 = 0x08;
    pub const FAST_BVEC: u8 = 0x20;
    pub const FAST_SESSION_PROPAGATE: u8 = 0x10;
    pub const APP_CTX_PIGGYBACK: u8 = 0x80;
    pub const TDS_VERSION_MAX: u8 = 3;
    pub const RPC_VERSION_MAX: u8 = 7;
    pub const RPC_SIG_VALUE: u8 = 3;
    pub const DBF_VERSION_MAX: u8 = 1;
    pub const LTXID: u8 = 0x08;
    pub const CLIENT_FN_MAX: u8 = 12;
    pub const LOB_UB8_SIZE: u8 = 0x01;
    pub const LOB_ENCS: u8 = 0x02;
    pub const LOB_PREFETCH: u8 = 0x08;
    pub const LOB_TEMP_SIZE: u8 = 0x10;
    pub const LOB_PREFETCH_DATA: u8 = 0x40;
    pub const LOB_12C: u8 = 0x80;
    pub const LOB2_QUASI: u8 = 0x01;
    pub const LOB2_2GB_PREFETCH: u8 = 0x04;
    pub const IMPLICIT_RESULTS: u8 = 0x10;
    pub const BIG_CHUNK_CLR: u8 = 0x20;
    pub const KEEP_OUT_ORDER: u8 = 0x80;
    pub const ZLNP: u8 = 0x04;
    pub const INBAND_NOTIFICATION: u8 = 0x04;
    pub const END_OF_REQUEST: u8 = 0x20;
    pub const EXPLICIT_BOUNDARY: u8 = 0x40;
    pub const SESSION_STATE_OPS: u8 = 0x10;
    pub const TOKEN_SUPPORTED: u8 = 0x02;
}

/// Runtime capability array indices and values.
pub mod rcap {
    pub const COMPAT: usize = 0;
    pub const TTC: usize = 6;
    pub const MAX: usize = 11;

    pub const COMPAT_81: u8 = 2;
    pub const TTC_ZERO_COPY: u8 = 0x01;
    pub const TTC_32K: u8 = 0x04;
}

/// LOB operation codes.
pub mod lob_op {
    pub const GET_LENGTH: u32 = 0x0001;
    pub const READ: u32 = 0x0002;
    pub const TRIM: u32 = 0x0020;
    pub const WRITE: u32 = 0x0040;
    pub const CREATE_TEMP: u32 = 0x0110;
    pub const FREE_TEMP: u32 = 0x0111;
    pub const COPY: u32 = 0x0004;
    pub const ARRAY: u32 = 0x80000;
}

/// Execute option bits.
pub mod exec_option {
    pub const PARSE: u32 = 0x01;
    pub const BIND: u32 = 0x08;
    pub const DEFINE: u32 = 0x10;
    pub const EXECUTE: u32 = 0x20;
    pub const FETCH: u32 = 0x40;
    pub const COMMIT: u32 = 0x100;
    pub const PLSQL_BIND: u32 = 0x400;
    pub const NOT_PLSQL: u32 = 0x8000;
    pub const DESCRIBE: u32 = 0x20000;
    pub const NO_COMPRESSED_FETCH: u32 = 0x40000;

    pub const FLAGS_DML_ROWCOUNTS: u32 = 0x4000;
    pub const FLAGS_IMPLICIT_RESULTSET: u32 = 0x8000;
    pub const FLAGS_NO_CANCEL_ON_EOF: u32 = 0x80;
}

pub mod bind_flags {
    pub const USE_INDICATORS: u8 = 0x01;
    pub const ARRAY: u8 = 0x40;
}

/// Character set ids.
pub mod charset {
    pub const UTF8: u16 = 873;
    pub const UTF16: u16 = 2000;
}

pub mod csfrm {
    pub const IMPLICIT: u8 = 1;
    pub const NCHAR: u8 = 2;
}

/// Chunked bytes: a length byte of this value is followed by UB4-length chunks.
pub const LONG_LENGTH_INDICATOR: u8 = 0xFE;
/// Null value marker in column data.
pub const NULL_LENGTH_INDICATOR: u8 = 0xFF;
/// Longest byte string written with a single length byte.
pub const MAX_SHORT_LENGTH: usize = 252;
/// Chunk size for long byte strings.
pub const CHUNK_SIZE: usize = 32767;
/// Connect data beyond this length goes into a separate DATA packet.
pub const MAX_CONNECT_DATA: usize = 230;
pub const MAX_LONG_LENGTH: u32 = 0x7fff_ffff;
/// ROWID and UROWID binds travel as VARCHAR of this size.
pub const MAX_UROWID_LENGTH: u32 = 5267;
/// Continuation flag on BLOB/CLOB bind metadata.
pub const LOB_PREFETCH_FLAG: u64 = 0x0200_0000;
pub const DEFAULT_SDU: u32 = 8192;
pub const DEFAULT_TDU: u32 = 65535;
pub const PROTOCOL_CHARACTERISTICS: u16 = 0x4f98;
pub const CHECKSUM_NONE: u16 = 0;
pub const ERROR_NO_DATA_FOUND: u32 = 1403;
pub const ERROR_FLAG_WARNING: u8 = 0x20;
pub const TYPE_REP_UNIVERSAL: u8 = 1;
pub const TYPE_REP_ORACLE: u8 = 10;
pub const DURATION_SESSION: u8 = 10;
/// Name the server shows in V$SESSION_CONNECT_INFO.
pub const DRIVER_NAME: &str = "qail-oracle : 0.14.20";
/// Sent as SESSION_CLIENT_VERSION, encoded like Oracle client version numbers.
pub const CLIENT_VERSION_CODE: u32 = 0x0e14_0000;
