//! Framing and value codecs seen from outside the crate.

mod common;

use bytes::BytesMut;
use common::*;
use pretty_assertions::assert_eq;
use qail_oracle::protocol::constants::{marker_type, packet_type};
use qail_oracle::protocol::{
    BackendMessage, Capabilities, FrameDecoder, RequestEncoder, Status, UbReader, UbWriter,
};
use qail_oracle::types::{DataType, FromOracle, Timestamp, ToOracle};

fn large_caps() -> Capabilities {
    Capabilities::default().with_accept(315, 0, 8192, 0)
}

#[test]
fn test_packet_arriving_in_pieces() {
    let mut decoder = FrameDecoder::new(large_caps());
    let packet = data_packet(&status_body(), true);
    let mut buf = BytesMut::new();
    for (n, byte) in packet.iter().enumerate() {
        buf.extend_from_slice(&[*byte]);
        let decoded = decoder.decode(&mut buf).unwrap();
        if n + 1 < packet.len() {
            assert_eq!(decoded, None);
        } else {
            assert_eq!(
                decoded,
                Some(vec![BackendMessage::Status(Status {
                    call_status: 0,
                    end_to_end_sequence: 0,
                })])
            );
        }
    }
    assert!(buf.is_empty());
}

#[test]
fn test_back_to_back_packets() {
    let mut decoder = FrameDecoder::new(large_caps());
    let mut buf = data_packet(&status_body(), true);
    buf.extend_from_slice(&data_packet(&status_body(), true));
    assert!(decoder.decode(&mut buf).unwrap().is_some());
    assert!(decoder.decode(&mut buf).unwrap().is_some());
    assert_eq!(decoder.decode(&mut buf).unwrap(), None);
}

#[test]
fn test_marker_written_by_encoder_is_readable() {
    let encoder = RequestEncoder::new(large_caps());
    let mut decoder = FrameDecoder::new(large_caps());
    let mut buf = encoder.marker(marker_type::RESET);
    assert_eq!(buf[4], packet_type::MARKER);
    assert_eq!(
        decoder.decode(&mut buf).unwrap(),
        Some(vec![BackendMessage::Marker(marker_type::RESET)])
    );
}

#[test]
fn test_long_connect_data_follows_in_data_packet() {
    let encoder = RequestEncoder::new(Capabilities::default());
    let connect_data = format!(
        "(DESCRIPTION=(ADDRESS=(PROTOCOL=tcp)(HOST={})(PORT=1521))(CONNECT_DATA=(SERVICE_NAME=XE)))",
        "h".repeat(200)
    );
    let out = encoder.connect(&connect_data, 8192);
    let first = u16::from_be_bytes([out[0], out[1]]) as usize;
    assert_eq!(out[4], packet_type::CONNECT);
    assert_eq!(out[first + 4], packet_type::DATA);
    assert!(out.ends_with(connect_data.as_bytes()));

    let short = encoder.connect("(DESCRIPTION=)", 8192);
    assert_eq!(u16::from_be_bytes([short[0], short[1]]) as usize, short.len());
}

#[test]
fn test_ub_widths() {
    let mut buf = BytesMut::new();
    for value in [0u32, 1, 255, 256, 65_535, 65_536, u32::MAX] {
        buf.put_ub4(value);
    }
    buf.put_ub8(u64::MAX);
    let lengths: Vec<u8> = {
        let mut copy = buf.clone().freeze();
        let mut out = Vec::new();
        while !copy.is_empty() {
            let width = copy[0];
            out.push(width);
            let _ = copy.read_ub8().unwrap();
        }
        out
    };
    assert_eq!(lengths, vec![0, 1, 1, 2, 2, 4, 4, 8]);

    let mut reader = buf.freeze();
    assert_eq!(reader.read_ub4().unwrap(), 0);
    assert_eq!(reader.read_ub4().unwrap(), 1);
    assert_eq!(reader.read_ub4().unwrap(), 255);
    assert_eq!(reader.read_ub4().unwrap(), 256);
    assert_eq!(reader.read_ub4().unwrap(), 65_535);
    assert_eq!(reader.read_ub4().unwrap(), 65_536);
    assert_eq!(reader.read_ub4().unwrap(), u32::MAX);
    assert_eq!(reader.read_ub8().unwrap(), u64::MAX);
}

#[test]
fn test_integers_survive_number_encoding() {
    for value in [0i64, 1, -1, 100, -100, 123_456_789, -987_654_321, 1_000_000_000_000_000_000] {
        let (bytes, data_type) = value.to_oracle().unwrap();
        assert_eq!(data_type, DataType::Number);
        assert_eq!(i64::from_oracle(&bytes, data_type).unwrap(), value, "{value}");
    }
}

#[test]
fn test_date_column_decodes_to_timestamp() {
    // 2024-12-25 17:30:00
    let bytes = [120, 124, 12, 25, 18, 31, 1];
    let ts = Timestamp::from_oracle(&bytes, DataType::Date).unwrap();
    assert_eq!(ts, Timestamp::new(2024, 12, 25, 17, 30, 0));
}
