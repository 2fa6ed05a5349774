//! Packet framing and the stateful message decoder.
//!
//! Header layout (8 bytes):
//! - length: u32 BE once the large-SDU version is negotiated, else u16 BE + u16 checksum
//! - packet type: u8 at offset 4
//! - flags: u8 at offset 5
//! - reserved: u16

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};

use super::backend::BackendMessage;
use super::capabilities::Capabilities;
use super::constants::{message_type, packet_type, PACKET_HEADER_SIZE};
use super::describe::{self, ColumnMetadata};
use super::error::{DecodeError, DecodeResult};
use super::error_info::BackendError;
use super::ub::UbReader;

/// Parsed packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub length: usize,
    pub packet_type: u8,
    pub flags: u8,
}

impl PacketHeader {
    /// Peek at a header. `Ok(None)` until 8 bytes are buffered.
    pub fn peek(buf: &[u8], large_sdu: bool) -> DecodeResult<Option<Self>> {
        if buf.len() < PACKET_HEADER_SIZE {
            return Ok(None);
        }
        let length = if large_sdu {
            u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize
        } else {
            u16::from_be_bytes([buf[0], buf[1]]) as usize
        };
        if length < PACKET_HEADER_SIZE {
            return Err(DecodeError::InvalidPacketLength(length));
        }
        Ok(Some(Self {
            length,
            packet_type: buf[4],
            flags: buf[5],
        }))
    }
}

/// What the next PARAMETER message answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseContext {
    Authentication,
    #[default]
    Statement,
    LobOperation {
        source_len: usize,
        dest_len: usize,
        operation: u32,
        send_amount: bool,
    },
}

/// The one decoder for server packets.
///
/// Every call to `decode` yields all messages of one complete packet.
/// Column metadata and the pending bit vector persist across packets
/// because rows of a query arrive after its describe info.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    capabilities: Capabilities,
    context: ResponseContext,
    columns: Option<Arc<[ColumnMetadata]>>,
    bit_vector: Option<Bytes>,
}

impl FrameDecoder {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Install renegotiated capabilities before decoding the next packet.
    pub fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.capabilities = capabilities;
    }

    pub fn set_context(&mut self, context: ResponseContext) {
        self.context = context;
    }

    /// Columns for rows of a cursor whose describe info was seen earlier.
    pub fn set_columns(&mut self, columns: Option<Arc<[ColumnMetadata]>>) {
        self.columns = columns;
        self.bit_vector = None;
    }

    pub fn columns(&self) -> Option<&Arc<[ColumnMetadata]>> {
        self.columns.as_ref()
    }

    /// Split one complete packet off `buf` and decode it.
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched if the packet is not
    /// fully buffered yet.
    pub fn decode(&mut self, buf: &mut BytesMut) -> DecodeResult<Option<Vec<BackendMessage>>> {
        let Some(header) = PacketHeader::peek(buf, self.capabilities.uses_large_sdu())? else {
            return Ok(None);
        };
        if buf.len() < header.length {
            return Ok(None);
        }
        let mut payload = buf.split_to(header.length).freeze();
        payload.advance(PACKET_HEADER_SIZE);
        tracing::trace!(
            packet_type = header.packet_type,
            length = header.length,
            "Received packet"
        );

        let messages = match header.packet_type {
            packet_type::ACCEPT => vec![BackendMessage::decode_accept(&mut payload)?],
            packet_type::REFUSE => vec![BackendMessage::decode_refuse(&mut payload)?],
            packet_type::REDIRECT => vec![BackendMessage::decode_redirect(&mut payload)?],
            packet_type::MARKER => vec![BackendMessage::decode_marker(&mut payload)?],
            packet_type::CONTROL => vec![BackendMessage::decode_control(&mut payload)?],
            packet_type::RESEND => vec![BackendMessage::Resend],
            packet_type::DATA => self.decode_data(&mut payload)?,
            other => return Err(DecodeError::UnknownMessageId(other)),
        };
        Ok(Some(messages))
    }

    fn decode_data(&mut self, payload: &mut Bytes) -> DecodeResult<Vec<BackendMessage>> {
        payload.read_u16_be()?; // data flags
        if !payload.has_remaining() {
            return Err(DecodeError::FieldNotDecodable("empty data packet"));
        }
        let mut messages = Vec::new();
        while payload.has_remaining() {
            let message = match payload.read_u8()? {
                message_type::PROTOCOL => BackendMessage::decode_protocol(payload)?,
                message_type::DATA_TYPES => BackendMessage::decode_data_types(payload)?,
                message_type::PARAMETER => self.decode_parameter(payload)?,
                message_type::STATUS => BackendMessage::decode_status(payload)?,
                message_type::ERROR => {
                    BackendMessage::Error(BackendError::decode(payload, &self.capabilities)?)
                }
                message_type::WARNING => {
                    BackendMessage::Warning(BackendError::decode_warning(payload)?)
                }
                message_type::DESCRIBE_INFO => {
                    let columns: Arc<[ColumnMetadata]> =
                        describe::decode_describe_info(payload, &self.capabilities)?.into();
                    self.columns = Some(columns.clone());
                    self.bit_vector = None;
                    BackendMessage::DescribeInfo(columns)
                }
                message_type::ROW_HEADER => {
                    if let Some(bits) = describe::decode_row_header(payload)? {
                        self.bit_vector = Some(bits);
                    }
                    BackendMessage::RowHeader
                }
                message_type::BIT_VECTOR => {
                    let count = self.columns.as_ref().map_or(0, |c| c.len());
                    self.bit_vector = Some(describe::decode_bit_vector(payload, count)?);
                    BackendMessage::BitVector
                }
                message_type::ROW_DATA => {
                    let columns = self
                        .columns
                        .clone()
                        .ok_or(DecodeError::FieldNotDecodable("row data without columns"))?;
                    let values =
                        describe::decode_row_data(payload, &columns, self.bit_vector.as_ref())?;
                    self.bit_vector = None;
                    BackendMessage::RowData(values)
                }
                message_type::LOB_DATA => {
                    BackendMessage::LobData(payload.read_bytes()?.unwrap_or_default())
                }
                message_type::SERVER_SIDE_PIGGYBACK => {
                    BackendMessage::decode_server_piggyback(payload)?
                }
                message_type::FLUSH_OUT_BINDS => {
                    messages.push(BackendMessage::FlushOutBinds);
                    break;
                }
                message_type::END_OF_RESPONSE => {
                    messages.push(BackendMessage::EndOfResponse);
                    break;
                }
                other => return Err(DecodeError::UnknownMessageId(other)),
            };
            messages.push(message);
        }
        Ok(messages)
    }

    fn decode_parameter(&self, payload: &mut Bytes) -> DecodeResult<BackendMessage> {
        match self.context {
            ResponseContext::Authentication => BackendMessage::decode_auth_parameters(payload),
            ResponseContext::Statement => BackendMessage::decode_statement_parameters(payload),
            ResponseContext::LobOperation {
                source_len,
                dest_len,
                operation,
                send_amount,
            } => BackendMessage::decode_lob_parameters(
                payload,
                source_len,
                dest_len,
                operation,
                send_amount,
            ),
        }
    }
}
