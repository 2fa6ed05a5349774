//! NUMBER, BINARY_FLOAT, BINARY_DOUBLE and BOOLEAN support.
//!
//! BINARY_DOUBLE/BINARY_FLOAT use the canonical sortable layout: the IEEE-754
//! bits big-endian, with the top bit set for non-negative values and every
//! byte complemented for negative ones, so unsigned byte order is numeric order.
//!
//! NUMBER is base-100 with an excess-65 exponent byte. It is carried as a
//! decimal string to avoid losing precision, like `Numeric` in the pg types.

use super::{DataType, FromOracle, ToOracle, TypeError};

/// Largest count of base-100 mantissa digits in a NUMBER.
const MAX_NUMBER_PAIRS: usize = 20;
/// Terminator appended to negative NUMBER mantissas shorter than the maximum.
const NEGATIVE_TERMINATOR: u8 = 102;

/// NUMBER value (stored as a decimal string for precision)
#[derive(Debug, Clone, PartialEq)]
pub struct Numeric(pub String);

impl Numeric {
    /// Create from string representation
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Parse as f64 (may lose precision for very large numbers)
    pub fn to_f64(&self) -> Result<f64, std::num::ParseFloatError> {
        self.0.parse()
    }

    /// Parse as i64; fails for fractional values
    pub fn to_i64(&self) -> Result<i64, std::num::ParseIntError> {
        self.0.parse()
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromOracle for Numeric {
    fn from_oracle(bytes: &[u8], data_type: DataType) -> Result<Self, TypeError> {
        match data_type {
            DataType::Number | DataType::BinaryInteger => Ok(Numeric(decode_number(bytes)?)),
            got => Err(TypeError::UnexpectedType { expected: "number", got }),
        }
    }
}

impl ToOracle for Numeric {
    fn to_oracle(&self) -> Result<(Vec<u8>, DataType), TypeError> {
        Ok((encode_number(&self.0)?, DataType::Number))
    }
}

/// Decode a NUMBER into its decimal text.
pub fn decode_number(bytes: &[u8]) -> Result<String, TypeError> {
    let (&first, mantissa) = bytes
        .split_first()
        .ok_or_else(|| TypeError::InvalidData("Empty NUMBER".to_string()))?;
    let positive = first & 0x80 != 0;
    let exponent_byte = if positive { first } else { !first };
    let mut point = (exponent_byte as i32 - 193) * 2 + 2;

    if mantissa.is_empty() {
        return Ok(if positive { "0" } else { "-1e126" }.to_string());
    }
    let mantissa = match mantissa.split_last() {
        Some((&NEGATIVE_TERMINATOR, rest)) if !positive => rest,
        _ => mantissa,
    };

    let mut digits: Vec<u8> = Vec::with_capacity(mantissa.len() * 2);
    for (i, &byte) in mantissa.iter().enumerate() {
        let value = if positive {
            byte.wrapping_sub(1)
        } else {
            101u8.wrapping_sub(byte)
        };
        if value > 99 {
            return Err(TypeError::InvalidData(format!("Invalid NUMBER digit byte {}", byte)));
        }
        let (high, low) = (value / 10, value % 10);
        if high == 0 && digits.is_empty() {
            point -= 1;
        } else {
            digits.push(high);
        }
        if low != 0 || i + 1 < mantissa.len() {
            digits.push(low);
        }
    }

    let mut out = String::with_capacity(digits.len() + 4);
    if !positive {
        out.push('-');
    }
    let push_digits = |out: &mut String, ds: &[u8]| {
        out.extend(ds.iter().map(|d| (b'0' + d) as char));
    };
    if point <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat_n('0', (-point) as usize));
        push_digits(&mut out, &digits);
    } else if point as usize >= digits.len() {
        push_digits(&mut out, &digits);
        out.extend(std::iter::repeat_n('0', point as usize - digits.len()));
    } else {
        push_digits(&mut out, &digits[..point as usize]);
        out.push('.');
        push_digits(&mut out, &digits[point as usize..]);
    }
    Ok(out)
}

/// Encode decimal text (optionally signed, optionally with an exponent) as NUMBER.
pub fn encode_number(text: &str) -> Result<Vec<u8>, TypeError> {
    let invalid = || TypeError::InvalidData(format!("Invalid number: {}", text));

    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (mantissa, exponent) = match rest.find(['e', 'E']) {
        Some(i) => (&rest[..i], rest[i + 1..].parse::<i32>().map_err(|_| invalid())?),
        None => (rest, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes())
        .map(|b| b - b'0')
        .collect();
    let mut point = i32::try_from(int_part.len())
        .ok()
        .and_then(|len| len.checked_add(exponent))
        .ok_or_else(|| TypeError::InvalidData(format!("Number out of range: {}", text)))?;

    let leading = digits.iter().take_while(|&&d| d == 0).count();
    digits.drain(..leading);
    point -= leading as i32;
    while digits.last() == Some(&0) {
        digits.pop();
    }
    if digits.is_empty() {
        return Ok(vec![0x80]);
    }

    // Align to base-100 pairs
    if point.rem_euclid(2) == 1 {
        digits.insert(0, 0);
        point += 1;
    }
    if digits.len() % 2 == 1 {
        digits.push(0);
    }
    let pairs = digits.len() / 2;
    if pairs > MAX_NUMBER_PAIRS {
        return Err(TypeError::InvalidData(format!(
            "Number exceeds 40 significant digits: {}",
            text
        )));
    }
    let exponent = point / 2;
    if !(-63..=63).contains(&exponent) {
        return Err(TypeError::InvalidData(format!("Number out of range: {}", text)));
    }

    let exponent_byte = (192 + exponent) as u8;
    let mut out = Vec::with_capacity(pairs + 2);
    out.push(if negative { !exponent_byte } else { exponent_byte });
    for pair in digits.chunks(2) {
        let value = pair[0] * 10 + pair[1];
        out.push(if negative { 101 - value } else { value + 1 });
    }
    if negative && pairs < MAX_NUMBER_PAIRS {
        out.push(NEGATIVE_TERMINATOR);
    }
    Ok(out)
}

// ==================== Canonical floating point ====================

/// Encode a BINARY_DOUBLE.
pub fn encode_binary_double(value: f64) -> [u8; 8] {
    let mut bytes = value.to_bits().to_be_bytes();
    if bytes[0] & 0x80 == 0 {
        bytes[0] |= 0x80;
    } else {
        bytes.iter_mut().for_each(|b| *b = !*b);
    }
    bytes
}

/// Decode a BINARY_DOUBLE.
pub fn decode_binary_double(bytes: &[u8]) -> Result<f64, TypeError> {
    let mut raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| TypeError::InvalidData("Expected 8 bytes for BINARY_DOUBLE".to_string()))?;
    if raw[0] & 0x80 != 0 {
        raw[0] &= 0x7f;
    } else {
        raw.iter_mut().for_each(|b| *b = !*b);
    }
    Ok(f64::from_bits(u64::from_be_bytes(raw)))
}

/// Encode a BINARY_FLOAT.
pub fn encode_binary_float(value: f32) -> [u8; 4] {
    let mut bytes = value.to_bits().to_be_bytes();
    if bytes[0] & 0x80 == 0 {
        bytes[0] |= 0x80;
    } else {
        bytes.iter_mut().for_each(|b| *b = !*b);
    }
    bytes
}

/// Decode a BINARY_FLOAT.
pub fn decode_binary_float(bytes: &[u8]) -> Result<f32, TypeError> {
    let mut raw: [u8; 4] = bytes
        .try_into()
        .map_err(|_| TypeError::InvalidData("Expected 4 bytes for BINARY_FLOAT".to_string()))?;
    if raw[0] & 0x80 != 0 {
        raw[0] &= 0x7f;
    } else {
        raw.iter_mut().for_each(|b| *b = !*b);
    }
    Ok(f32::from_bits(u32::from_be_bytes(raw)))
}

impl FromOracle for f64 {
    fn from_oracle(bytes: &[u8], data_type: DataType) -> Result<Self, TypeError> {
        match data_type {
            DataType::BinaryDouble => decode_binary_double(bytes),
            DataType::BinaryFloat => decode_binary_float(bytes).map(f64::from),
            DataType::Number | DataType::BinaryInteger => decode_number(bytes)?
                .parse()
                .map_err(|e| TypeError::InvalidData(format!("Invalid float: {}", e))),
            got => Err(TypeError::UnexpectedType { expected: "float", got }),
        }
    }
}

impl ToOracle for f64 {
    fn to_oracle(&self) -> Result<(Vec<u8>, DataType), TypeError> {
        Ok((encode_binary_double(*self).to_vec(), DataType::BinaryDouble))
    }
}

impl FromOracle for f32 {
    fn from_oracle(bytes: &[u8], data_type: DataType) -> Result<Self, TypeError> {
        match data_type {
            DataType::BinaryFloat => decode_binary_float(bytes),
            got => Err(TypeError::UnexpectedType { expected: "binary_float", got }),
        }
    }
}

impl ToOracle for f32 {
    fn to_oracle(&self) -> Result<(Vec<u8>, DataType), TypeError> {
        Ok((encode_binary_float(*self).to_vec(), DataType::BinaryFloat))
    }
}

// ==================== Integers ====================

impl FromOracle for i64 {
    fn from_oracle(bytes: &[u8], data_type: DataType) -> Result<Self, TypeError> {
        match data_type {
            DataType::Number | DataType::BinaryInteger => decode_number(bytes)?
                .parse()
                .map_err(|e| TypeError::InvalidData(format!("Invalid integer: {}", e))),
            got => Err(TypeError::UnexpectedType { expected: "integer", got }),
        }
    }
}

impl ToOracle for i64 {
    fn to_oracle(&self) -> Result<(Vec<u8>, DataType), TypeError> {
        let mut buf = itoa::Buffer::new();
        Ok((encode_number(buf.format(*self))?, DataType::Number))
    }
}

impl FromOracle for i32 {
    fn from_oracle(bytes: &[u8], data_type: DataType) -> Result<Self, TypeError> {
        let wide = i64::from_oracle(bytes, data_type)?;
        i32::try_from(wide).map_err(|_| TypeError::InvalidData(format!("{} overflows i32", wide)))
    }
}

impl ToOracle for i32 {
    fn to_oracle(&self) -> Result<(Vec<u8>, DataType), TypeError> {
        (*self as i64).to_oracle()
    }
}

// ==================== Boolean ====================

impl FromOracle for bool {
    fn from_oracle(bytes: &[u8], data_type: DataType) -> Result<Self, TypeError> {
        match data_type {
            DataType::Boolean => Ok(bytes.last() == Some(&1)),
            got => Err(TypeError::UnexpectedType { expected: "boolean", got }),
        }
    }
}

impl ToOracle for bool {
    fn to_oracle(&self) -> Result<(Vec<u8>, DataType), TypeError> {
        let bytes = if *self { vec![1, 1] } else { vec![0] };
        Ok((bytes, DataType::Boolean))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_binary_double_round_trip() {
        for value in [0.0f64, -0.0, 1.5, -1.5, f64::MAX, f64::MIN, f64::MIN_POSITIVE] {
            let decoded = decode_binary_double(&encode_binary_double(value)).unwrap();
            assert_eq!(decoded.to_bits(), value.to_bits());
        }
    }

    #[test]
    fn test_binary_double_sorts_like_numbers() {
        let values = [f64::MIN, -1.5, -0.0, 0.0, 1.5, f64::MAX];
        let encoded: Vec<[u8; 8]> = values.iter().map(|v| encode_binary_double(*v)).collect();
        for pair in encoded.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_binary_float_round_trip() {
        for value in [0.0f32, -0.0, 1.5, -1.5, f32::MAX, f32::MIN] {
            let decoded = decode_binary_float(&encode_binary_float(value)).unwrap();
            assert_eq!(decoded.to_bits(), value.to_bits());
        }
    }

    #[test]
    fn test_binary_double_known_bytes() {
        assert_eq!(encode_binary_double(1.0), [0xBF, 0xF0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            encode_binary_double(-1.0),
            [0x40, 0x0F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_binary_double_wrong_length() {
        assert!(decode_binary_double(&[0x80; 4]).is_err());
    }

    #[test]
    fn test_number_known_encodings() {
        let cases: [(&str, &[u8]); 7] = [
            ("0", &[0x80]),
            ("1", &[0xC1, 0x02]),
            ("-1", &[0x3E, 0x64, 0x66]),
            ("100", &[0xC2, 0x02]),
            ("0.5", &[0xC0, 0x33]),
            ("123.45", &[0xC2, 0x02, 0x18, 0x2E]),
            ("-123.45", &[0x3D, 0x64, 0x4E, 0x38, 0x66]),
        ];
        for (text, bytes) in cases {
            assert_eq!(encode_number(text).unwrap(), bytes.to_vec(), "encode {}", text);
            assert_eq!(decode_number(bytes).unwrap(), text, "decode {}", text);
        }
    }

    #[test]
    fn test_number_small_fraction() {
        let bytes = encode_number("0.001").unwrap();
        assert_eq!(decode_number(&bytes).unwrap(), "0.001");
    }

    #[test]
    fn test_number_rejects_garbage() {
        assert!(encode_number("12a").is_err());
        assert!(encode_number("").is_err());
        assert!(encode_number("1e2147483647").is_err());
        assert!(matches!(
            Numeric::new("not a number").to_oracle(),
            Err(TypeError::InvalidData(_))
        ));
    }

    #[test]
    fn test_integer_via_number() {
        let (bytes, ty) = 9_000_000_000i64.to_oracle().unwrap();
        assert_eq!(ty, DataType::Number);
        assert_eq!(i64::from_oracle(&bytes, ty).unwrap(), 9_000_000_000);
    }

    #[test]
    fn test_bool_wire_format() {
        assert_eq!(true.to_oracle().unwrap().0, vec![1, 1]);
        assert_eq!(false.to_oracle().unwrap().0, vec![0]);
        assert!(bool::from_oracle(&[1, 1], DataType::Boolean).unwrap());
        assert!(!bool::from_oracle(&[0], DataType::Boolean).unwrap());
    }
}
