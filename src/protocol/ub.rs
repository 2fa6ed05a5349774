//! UB varint codec.
//!
//! TTC integers are written as a length byte followed by that many
//! big-endian bytes ("UB2", "UB4", "UB8" name the widest value allowed).
//! Byte strings use a single length byte, or a sentinel followed by
//! UB4-length chunks for anything longer than `MAX_SHORT_LENGTH`.
//!
//! Reading is exposed as an extension trait on `bytes::Buf` and writing on
//! `bytes::BufMut`, so decoders work directly on the `Bytes` of a packet.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::{CHUNK_SIZE, LONG_LENGTH_INDICATOR, MAX_SHORT_LENGTH, NULL_LENGTH_INDICATOR};
use super::error::{DecodeError, DecodeResult};

/// Bounds-checked reads over a packet payload.
pub trait UbReader: Buf {
    /// Fail unless `n` more bytes are available.
    fn need(&self, n: usize) -> DecodeResult<()> {
        let actual = self.remaining();
        if actual < n {
            return Err(DecodeError::ExpectedAtLeast { expected: n, actual });
        }
        Ok(())
    }

    fn read_u8(&mut self) -> DecodeResult<u8> {
        self.need(1)?;
        Ok(self.get_u8())
    }

    fn read_u16_be(&mut self) -> DecodeResult<u16> {
        self.need(2)?;
        Ok(self.get_u16())
    }

    fn read_u16_le(&mut self) -> DecodeResult<u16> {
        self.need(2)?;
        Ok(self.get_u16_le())
    }

    fn read_u32_be(&mut self) -> DecodeResult<u32> {
        self.need(4)?;
        Ok(self.get_u32())
    }

    fn skip(&mut self, n: usize) -> DecodeResult<()> {
        self.need(n)?;
        self.advance(n);
        Ok(())
    }

    fn read_raw(&mut self, n: usize) -> DecodeResult<Bytes> {
        self.need(n)?;
        Ok(self.copy_to_bytes(n))
    }

    /// Length byte of a UB integer. The top bit marks chunked data elsewhere
    /// and is not part of the width.
    fn read_ub_length(&mut self) -> DecodeResult<u8> {
        Ok(self.read_u8()? & 0x7f)
    }

    /// Read a UB integer whose length byte must fit `width`.
    ///
    /// Lengths 0..=4 are valid for every width, 8 only for UB8.
    fn read_ub(&mut self, width: u8) -> DecodeResult<u64> {
        let length = self.read_ub_length()?;
        let valid = match width {
            2 => length <= 2,
            4 => length <= 4,
            _ => length <= 4 || length == 8,
        };
        if !valid {
            return Err(DecodeError::CorruptLength { length, width });
        }
        self.need(length as usize)?;
        let mut value = 0u64;
        for _ in 0..length {
            value = (value << 8) | self.get_u8() as u64;
        }
        Ok(value)
    }

    fn read_ub1(&mut self) -> DecodeResult<u8> {
        self.read_u8()
    }

    fn read_ub2(&mut self) -> DecodeResult<u16> {
        Ok(self.read_ub(2)? as u16)
    }

    fn read_ub4(&mut self) -> DecodeResult<u32> {
        Ok(self.read_ub(4)? as u32)
    }

    fn read_ub8(&mut self) -> DecodeResult<u64> {
        self.read_ub(8)
    }

    fn skip_ub1(&mut self) -> DecodeResult<()> {
        self.skip(1)
    }

    fn skip_ub2(&mut self) -> DecodeResult<()> {
        self.read_ub(2).map(|_| ())
    }

    fn skip_ub4(&mut self) -> DecodeResult<()> {
        self.read_ub(4).map(|_| ())
    }

    fn skip_ub8(&mut self) -> DecodeResult<()> {
        self.read_ub(8).map(|_| ())
    }

    /// Signed variant: the top bit of the length byte carries the sign.
    fn read_sb(&mut self, width: u8) -> DecodeResult<i64> {
        let raw = self.read_u8()?;
        let negative = raw & 0x80 != 0;
        let length = raw & 0x7f;
        if length > width || length > 8 {
            return Err(DecodeError::CorruptLength { length, width });
        }
        self.need(length as usize)?;
        let mut magnitude = 0u64;
        for _ in 0..length {
            magnitude = (magnitude << 8) | self.get_u8() as u64;
        }
        let value = i64::try_from(magnitude)
            .map_err(|_| DecodeError::CorruptLength { length, width })?;
        Ok(if negative { -value } else { value })
    }

    fn read_sb2(&mut self) -> DecodeResult<i16> {
        Ok(self.read_sb(2)? as i16)
    }

    fn read_sb4(&mut self) -> DecodeResult<i32> {
        Ok(self.read_sb(4)? as i32)
    }

    fn read_sb8(&mut self) -> DecodeResult<i64> {
        self.read_sb(8)
    }

    /// Length-prefixed byte string. `None` for the null and empty encodings.
    fn read_bytes(&mut self) -> DecodeResult<Option<Bytes>> {
        let length = self.read_u8()?;
        match length {
            0 | NULL_LENGTH_INDICATOR => Ok(None),
            LONG_LENGTH_INDICATOR => {
                let mut out = BytesMut::new();
                loop {
                    let chunk_len = self.read_ub4()? as usize;
                    if chunk_len == 0 {
                        break;
                    }
                    let chunk = self.read_raw(chunk_len)?;
                    out.extend_from_slice(&chunk);
                }
                Ok(Some(out.freeze()))
            }
            n => Ok(Some(self.read_raw(n as usize)?)),
        }
    }

    /// Length-prefixed UTF-8 string.
    fn read_str(&mut self, field: &'static str) -> DecodeResult<Option<String>> {
        match self.read_bytes()? {
            None => Ok(None),
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| DecodeError::InvalidUtf8(field)),
        }
    }

    fn skip_bytes_chunked(&mut self) -> DecodeResult<()> {
        let length = self.read_u8()?;
        if length != LONG_LENGTH_INDICATOR {
            return self.skip(length as usize);
        }
        loop {
            let chunk_len = self.read_ub4()? as usize;
            if chunk_len == 0 {
                return Ok(());
            }
            self.skip(chunk_len)?;
        }
    }

    /// NUL-terminated string (banner in the protocol response).
    fn read_null_terminated(&mut self, field: &'static str) -> DecodeResult<String> {
        let mut out = Vec::new();
        loop {
            match self.read_u8()? {
                0 => break,
                b => out.push(b),
            }
        }
        String::from_utf8(out).map_err(|_| DecodeError::InvalidUtf8(field))
    }
}

impl<B: Buf + ?Sized> UbReader for B {}

/// Writes for request bodies.
pub trait UbWriter: BufMut {
    /// Minimal-width UB integer.
    fn put_ub(&mut self, value: u64) {
        if value == 0 {
            self.put_u8(0);
        } else if value <= u8::MAX as u64 {
            self.put_u8(1);
            self.put_u8(value as u8);
        } else if value <= u16::MAX as u64 {
            self.put_u8(2);
            self.put_u16(value as u16);
        } else if value <= u32::MAX as u64 {
            self.put_u8(4);
            self.put_u32(value as u32);
        } else {
            self.put_u8(8);
            self.put_u64(value);
        }
    }

    fn put_ub2(&mut self, value: u16) {
        self.put_ub(value as u64);
    }

    fn put_ub4(&mut self, value: u32) {
        self.put_ub(value as u64);
    }

    fn put_ub8(&mut self, value: u64) {
        self.put_ub(value);
    }

    /// Byte string with a one-byte length, chunked when it does not fit.
    fn put_bytes_with_length(&mut self, bytes: &[u8]) {
        if bytes.len() <= MAX_SHORT_LENGTH {
            self.put_u8(bytes.len() as u8);
            self.put_slice(bytes);
            return;
        }
        self.put_u8(LONG_LENGTH_INDICATOR);
        for chunk in bytes.chunks(CHUNK_SIZE) {
            self.put_ub4(chunk.len() as u32);
            self.put_slice(chunk);
        }
        self.put_ub4(0);
    }

    /// Authentication key/value/flags triple.
    fn put_key_value(&mut self, key: &str, value: &[u8], flags: u32) {
        self.put_ub4(key.len() as u32);
        self.put_bytes_with_length(key.as_bytes());
        self.put_ub4(value.len() as u32);
        if !value.is_empty() {
            self.put_bytes_with_length(value);
        }
        self.put_ub4(flags);
    }
}

impl<B: BufMut + ?Sized> UbWriter for B {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encoded(value: u64) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_ub(value);
        buf.freeze()
    }

    #[test]
    fn test_sb8_rejects_magnitude_past_i64() {
        let mut buf = Bytes::from_static(&[0x88, 0x80, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            buf.read_sb8(),
            Err(DecodeError::CorruptLength { length: 8, width: 8 })
        ));

        let mut buf = Bytes::from_static(&[0x88, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(buf.read_sb8().unwrap(), -i64::MAX);
    }

    #[test]
    fn test_ub4_round_trip_boundaries() {
        for value in [0u32, 255, 256, 65535, 65536, u32::MAX] {
            let mut buf = encoded(value as u64);
            assert_eq!(buf.read_ub4().unwrap(), value);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_ub8_round_trip_beyond_32_bits() {
        for value in [4_294_967_296u64, u64::MAX] {
            let mut buf = encoded(value);
            assert_eq!(buf.read_ub8().unwrap(), value);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_writer_picks_minimal_width() {
        assert_eq!(&encoded(0)[..], &[0]);
        assert_eq!(&encoded(255)[..], &[1, 255]);
        assert_eq!(&encoded(256)[..], &[2, 1, 0]);
        assert_eq!(&encoded(65536)[..], &[4, 0, 1, 0, 0]);
    }

    #[test]
    fn test_length_top_bit_is_cleared() {
        let mut buf = Bytes::from_static(&[0x81, 0x2a]);
        assert_eq!(buf.read_ub4().unwrap(), 42);
    }

    #[test]
    fn test_three_byte_length() {
        let mut buf = Bytes::from_static(&[3, 0x01, 0x02, 0x03]);
        assert_eq!(buf.read_ub4().unwrap(), 0x010203);
    }

    #[test]
    fn test_invalid_length_is_corruption() {
        let mut buf = Bytes::from_static(&[5, 1, 2, 3, 4, 5]);
        assert_eq!(
            buf.read_ub4(),
            Err(DecodeError::CorruptLength { length: 5, width: 4 })
        );
        let mut buf = Bytes::from_static(&[3, 1, 2, 3]);
        assert_eq!(
            buf.read_ub2(),
            Err(DecodeError::CorruptLength { length: 3, width: 2 })
        );
    }

    #[test]
    fn test_truncated_integer() {
        let mut buf = Bytes::from_static(&[4, 1, 2]);
        assert_eq!(
            buf.read_ub4(),
            Err(DecodeError::ExpectedAtLeast { expected: 4, actual: 2 })
        );
    }

    #[test]
    fn test_signed_values() {
        let mut buf = Bytes::from_static(&[0x82, 0x01, 0x00, 0x01, 0x05]);
        assert_eq!(buf.read_sb4().unwrap(), -256);
        assert_eq!(buf.read_sb2().unwrap(), 5);
    }

    #[test]
    fn test_chunked_bytes() {
        let mut buf = Bytes::from_static(&[0xFE, 1, 2, b'a', b'b', 1, 1, b'c', 0]);
        assert_eq!(buf.read_bytes().unwrap(), Some(Bytes::from_static(b"abc")));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_long_bytes_are_written_chunked() {
        let payload = vec![7u8; 300];
        let mut buf = BytesMut::new();
        buf.put_bytes_with_length(&payload);
        assert_eq!(buf[0], LONG_LENGTH_INDICATOR);
        let mut frozen = buf.freeze();
        assert_eq!(frozen.read_bytes().unwrap().unwrap().len(), 300);
        assert!(frozen.is_empty());
    }

    #[test]
    fn test_null_and_empty_bytes() {
        let mut buf = Bytes::from_static(&[0xFF, 0]);
        assert_eq!(buf.read_bytes().unwrap(), None);
        assert_eq!(buf.read_bytes().unwrap(), None);
    }

    #[test]
    fn test_key_value_layout() {
        let mut buf = BytesMut::new();
        buf.put_key_value("AUTH_PID", b"42", 0);
        assert_eq!(
            &buf[..],
            &[1, 8, 8, b'A', b'U', b'T', b'H', b'_', b'P', b'I', b'D', 1, 2, 2, b'4', b'2', 0]
        );
    }
}
