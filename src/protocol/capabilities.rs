//! Negotiated connection capabilities.
//!
//! Built once per negotiation step and replaced, never mutated in place:
//! `Capabilities::default()` → `with_accept` → `with_protocol`.

use super::constants::{ccap, charset, rcap, version, DEFAULT_SDU};

/// Connection parameters that select encoding widths and feature use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub protocol_version: u16,
    pub protocol_options: u16,
    pub sdu: u32,
    pub ttc_field_version: u8,
    pub max_string_size: u32,
    pub charset_id: u16,
    pub ncharset_id: u16,
    pub supports_fast_auth: bool,
    pub supports_end_of_response: bool,
    pub compile_caps: [u8; ccap::MAX],
    pub runtime_caps: [u8; rcap::MAX],
}

impl Default for Capabilities {
    fn default() -> Self {
        let mut compile_caps = [0u8; ccap::MAX];
        compile_caps[ccap::SQL_VERSION] = ccap::SQL_VERSION_MAX;
        compile_caps[ccap::LOGON_TYPES] = ccap::O5LOGON
            | ccap::O5LOGON_NP
            | ccap::O7LOGON
            | ccap::O8LOGON_LONG_IDENTIFIER
            | ccap::O9LOGON_LONG_PASSWORD;
        compile_caps[ccap::FIELD_VERSION] = ccap::FIELD_VERSION_MAX;
        compile_caps[ccap::SERVER_DEFINE_CONV] = 1;
        compile_caps[ccap::TTC1] = ccap::FAST_BVEC | ccap::END_OF_CALL_STATUS | ccap::IND_RCD;
        compile_caps[ccap::OCI1] = ccap::FAST_SESSION_PROPAGATE | ccap::APP_CTX_PIGGYBACK;
        compile_caps[ccap::TDS_VERSION] = ccap::TDS_VERSION_MAX;
        compile_caps[ccap::RPC_VERSION] = ccap::RPC_VERSION_MAX;
        compile_caps[ccap::RPC_SIG] = ccap::RPC_SIG_VALUE;
        compile_caps[ccap::DBF_VERSION] = ccap::DBF_VERSION_MAX;
        compile_caps[ccap::LOB] =
            ccap::LOB_UB8_SIZE | ccap::LOB_ENCS | ccap::LOB_TEMP_SIZE | ccap::LOB_12C;
        compile_caps[ccap::UB2_DTY] = 1;
        compile_caps[ccap::LOB2] = ccap::LOB2_QUASI | ccap::LOB2_2GB_PREFETCH;
        compile_caps[ccap::TTC3] = ccap::IMPLICIT_RESULTS
            | ccap::BIG_CHUNK_CLR
            | ccap::KEEP_OUT_ORDER
            | ccap::LTXID;
        compile_caps[ccap::TTC2] = ccap::ZLNP;
        compile_caps[ccap::CLIENT_FN] = ccap::CLIENT_FN_MAX;
        compile_caps[ccap::SESS_SIGNATURE_VERSION] = ccap::FIELD_VERSION_12_2;
        compile_caps[ccap::TTC4] = ccap::INBAND_NOTIFICATION | ccap::EXPLICIT_BOUNDARY;
        compile_caps[ccap::TTC5] = ccap::TOKEN_SUPPORTED;

        let mut runtime_caps = [0u8; rcap::MAX];
        runtime_caps[rcap::COMPAT] = rcap::COMPAT_81;
        runtime_caps[rcap::TTC] = rcap::TTC_ZERO_COPY | rcap::TTC_32K;

        Self {
            protocol_version: 0,
            protocol_options: 0,
            sdu: DEFAULT_SDU,
            ttc_field_version: ccap::FIELD_VERSION_MAX,
            max_string_size: 4000,
            charset_id: charset::UTF8,
            ncharset_id: charset::UTF16,
            supports_fast_auth: false,
            supports_end_of_response: false,
            compile_caps,
            runtime_caps,
        }
    }
}

impl Capabilities {
    /// Apply the values from an ACCEPT packet.
    pub fn with_accept(
        &self,
        protocol_version: u16,
        protocol_options: u16,
        sdu: u32,
        flags2: u32,
    ) -> Self {
        use super::constants::accept_flags;

        let mut next = self.clone();
        next.protocol_version = protocol_version;
        next.protocol_options = protocol_options;
        next.sdu = sdu;
        next.supports_fast_auth = flags2 & accept_flags::FAST_AUTH != 0;
        next.supports_end_of_response = protocol_version >= version::MIN_END_OF_RESPONSE
            && flags2 & accept_flags::HAS_END_OF_RESPONSE != 0;
        if next.supports_end_of_response {
            next.compile_caps[ccap::TTC4] |= ccap::END_OF_REQUEST;
        }
        next
    }

    /// Apply the server's capability arrays from the protocol response.
    pub fn with_protocol(
        &self,
        server_compile_caps: Option<&[u8]>,
        server_runtime_caps: Option<&[u8]>,
        ncharset_id: Option<u16>,
    ) -> Self {
        let mut next = self.clone();
        if let Some(server_field_version) =
            server_compile_caps.and_then(|caps| caps.get(ccap::FIELD_VERSION).copied())
        {
            next.ttc_field_version = next.ttc_field_version.min(server_field_version);
            next.compile_caps[ccap::FIELD_VERSION] = next.ttc_field_version;
        }
        if let Some(ttc) = server_runtime_caps.and_then(|caps| caps.get(rcap::TTC).copied()) {
            next.max_string_size = if ttc & rcap::TTC_32K != 0 { 32767 } else { 4000 };
        }
        if let Some(ncharset_id) = ncharset_id {
            next.ncharset_id = ncharset_id;
        }
        next
    }

    /// Packet length field is 4 bytes once this version is negotiated.
    pub fn uses_large_sdu(&self) -> bool {
        self.protocol_version >= version::MIN_LARGE_SDU
    }

    pub fn field_version_at_least(&self, field_version: u8) -> bool {
        self.ttc_field_version >= field_version
    }

    /// Function requests carry a trailing token from 23.1 EXT1 on.
    pub fn sends_token(&self) -> bool {
        self.field_version_at_least(ccap::FIELD_VERSION_23_1_EXT_1)
    }
}
