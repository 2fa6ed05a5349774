//! Server error block (TTC message type 4) and warning message (type 15).

use bytes::Bytes;

use super::capabilities::Capabilities;
use super::constants::{ccap, ERROR_FLAG_WARNING, ERROR_NO_DATA_FOUND};
use super::error::DecodeResult;
use super::ub::UbReader;

/// Position of a row affected by the failing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowId {
    pub rba: u32,
    pub partition_id: u16,
    pub block_num: u32,
    pub slot_num: u16,
}

/// Error or warning reported by the server for the current call.
///
/// Number 0 with no message means the call succeeded; the block still carries
/// the cursor id and row count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendError {
    pub number: u32,
    pub message: Option<String>,
    pub call_status: u32,
    pub cursor_id: u16,
    pub position: i16,
    pub row_count: u64,
    pub is_warning: bool,
    pub rowid: Option<RowId>,
    pub batch_error_codes: Vec<u32>,
    pub batch_error_offsets: Vec<u32>,
}

impl BackendError {
    /// ORA-01403 ends a fetch and is not a failure.
    pub fn is_no_data_found(&self) -> bool {
        self.number == ERROR_NO_DATA_FOUND
    }

    /// Failure the caller should see.
    pub fn is_failure(&self) -> bool {
        self.number != 0 && !self.is_no_data_found() && !self.is_warning
    }

    pub fn decode(buf: &mut Bytes, caps: &Capabilities) -> DecodeResult<Self> {
        let call_status = buf.read_ub4()?;
        buf.skip_ub2()?; // end to end seq#
        buf.skip_ub4()?; // current row number
        buf.skip_ub2()?; // error number
        buf.skip_ub2()?; // array elem error
        buf.skip_ub2()?; // array elem error
        let cursor_id = buf.read_ub2()?;
        let position = buf.read_sb2()?;
        buf.skip(5)?; // sql type, fatal?, flags, user cursor options, UPI parameter
        let flags = buf.read_u8()?;

        let rba = buf.read_ub4()?;
        let partition_id = buf.read_ub2()?;
        buf.skip_ub1()?;
        let block_num = buf.read_ub4()?;
        let slot_num = buf.read_ub2()?;
        let rowid = (rba != 0 || block_num != 0 || slot_num != 0).then_some(RowId {
            rba,
            partition_id,
            block_num,
            slot_num,
        });

        buf.skip_ub4()?; // OS error
        buf.skip_ub1()?; // statement number
        buf.skip_ub1()?; // call number
        buf.skip_ub2()?; // padding
        buf.skip_ub4()?; // success iters
        if buf.read_ub4()? > 0 {
            buf.skip_bytes_chunked()?; // oerrdd
        }

        let mut batch_error_codes = Vec::new();
        let count = buf.read_ub2()?;
        if count > 0 {
            buf.skip_ub1()?;
            for _ in 0..count {
                batch_error_codes.push(buf.read_ub2()? as u32);
            }
        }
        let mut batch_error_offsets = Vec::new();
        let count = buf.read_ub4()?;
        if count > 0 {
            buf.skip_ub1()?;
            for _ in 0..count {
                batch_error_offsets.push(buf.read_ub4()?);
            }
        }
        let count = buf.read_ub2()?;
        if count > 0 {
            buf.skip_ub1()?;
            for _ in 0..count {
                buf.skip_ub2()?;
                buf.read_str("batch error message")?;
                buf.skip(2)?; // end marker
            }
        }

        let number = buf.read_ub4()?;
        let row_count = buf.read_ub8()?;
        if caps.field_version_at_least(ccap::FIELD_VERSION_20_1) {
            buf.skip_ub4()?; // sql type
            buf.skip_ub4()?; // server checksum
        }
        let message = if number != 0 {
            buf.read_str("error message")?.map(|m| m.trim_end().to_string())
        } else {
            None
        };

        Ok(Self {
            number,
            message,
            call_status,
            cursor_id,
            position,
            row_count,
            is_warning: flags & ERROR_FLAG_WARNING != 0,
            rowid,
            batch_error_codes,
            batch_error_offsets,
        })
    }

    /// Standalone warning message.
    pub fn decode_warning(buf: &mut Bytes) -> DecodeResult<Self> {
        let number = buf.read_ub2()? as u32;
        let length = buf.read_ub2()?;
        buf.skip_ub2()?; // flags
        let message = if number != 0 && length > 0 {
            buf.read_str("warning message")?
        } else {
            None
        };
        Ok(Self {
            number,
            message,
            is_warning: true,
            ..Self::default()
        })
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => f.write_str(message),
            None => write!(f, "ORA-{:05}", self.number),
        }
    }
}
