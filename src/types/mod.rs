//! Type conversion traits and implementations for Oracle types.
//!
//! This module converts Rust values to and from the raw column spans the
//! protocol layer routes by `DataType`. The protocol layer never interprets
//! value bytes itself.

pub mod numeric;
pub mod temporal;

pub use numeric::Numeric;
pub use temporal::{TimeZoneOffset, Timestamp};

use thiserror::Error;

/// Oracle internal data type numbers, as they appear in describe info and binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    Varchar = 1,
    Number = 2,
    BinaryInteger = 3,
    Long = 8,
    Rowid = 11,
    Date = 12,
    Raw = 23,
    LongRaw = 24,
    Char = 96,
    BinaryFloat = 100,
    BinaryDouble = 101,
    Cursor = 102,
    Object = 109,
    Clob = 112,
    Blob = 113,
    Bfile = 114,
    Json = 119,
    Vector = 127,
    Timestamp = 180,
    TimestampTz = 181,
    IntervalYm = 182,
    IntervalDs = 183,
    Urowid = 208,
    TimestampLtz = 231,
    Boolean = 252,
}

impl DataType {
    pub fn from_u8(value: u8) -> Option<Self> {
        use DataType::*;
        Some(match value {
            1 => Varchar,
            2 => Number,
            3 => BinaryInteger,
            8 => Long,
            11 => Rowid,
            12 => Date,
            23 => Raw,
            24 => LongRaw,
            96 => Char,
            100 => BinaryFloat,
            101 => BinaryDouble,
            102 => Cursor,
            109 => Object,
            112 => Clob,
            113 => Blob,
            114 => Bfile,
            119 => Json,
            127 => Vector,
            180 => Timestamp,
            181 => TimestampTz,
            182 => IntervalYm,
            183 => IntervalDs,
            208 => Urowid,
            231 => TimestampLtz,
            252 => Boolean,
            _ => return None,
        })
    }

    /// Columns of these types carry a locator rather than the value.
    pub fn is_lob(self) -> bool {
        matches!(self, DataType::Clob | DataType::Blob | DataType::Bfile)
    }

    /// Default bind buffer size for a value of this type.
    pub fn buffer_size(self) -> u32 {
        match self {
            DataType::BinaryDouble => 8,
            DataType::BinaryFloat => 4,
            DataType::Number | DataType::BinaryInteger => 22,
            DataType::Date => 7,
            DataType::Timestamp => 11,
            DataType::TimestampTz | DataType::TimestampLtz => 13,
            DataType::Boolean => 4,
            _ => 0,
        }
    }
}

/// Error type for type conversion failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Wrong column type for the requested Rust type
    #[error("Expected {expected} type, got {got:?}")]
    UnexpectedType { expected: &'static str, got: DataType },
    /// Invalid binary data
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// Null value where non-null expected
    #[error("Unexpected NULL value")]
    UnexpectedNull,
    /// TIMESTAMP WITH TIME ZONE carrying a named region instead of an offset
    #[error("Named time zone regions are not supported")]
    UnsupportedTimeZoneRegion,
}

/// Trait for converting Oracle wire values to Rust types.
pub trait FromOracle: Sized {
    /// Convert from the raw column bytes (without the length prefix).
    fn from_oracle(bytes: &[u8], data_type: DataType) -> Result<Self, TypeError>;
}

/// Trait for converting Rust types to Oracle wire values.
pub trait ToOracle {
    /// Returns (bytes, data_type); the encoder adds the length prefix.
    fn to_oracle(&self) -> Result<(Vec<u8>, DataType), TypeError>;
}

// ==================== String Types ====================

impl FromOracle for String {
    fn from_oracle(bytes: &[u8], data_type: DataType) -> Result<Self, TypeError> {
        match data_type {
            DataType::Varchar | DataType::Char | DataType::Long | DataType::Urowid => {
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| TypeError::InvalidData(format!("Invalid UTF-8: {}", e)))
            }
            DataType::Number | DataType::BinaryInteger => {
                numeric::decode_number(bytes)
            }
            got => Err(TypeError::UnexpectedType { expected: "string", got }),
        }
    }
}

impl ToOracle for str {
    fn to_oracle(&self) -> Result<(Vec<u8>, DataType), TypeError> {
        Ok((self.as_bytes().to_vec(), DataType::Varchar))
    }
}

impl ToOracle for String {
    fn to_oracle(&self) -> Result<(Vec<u8>, DataType), TypeError> {
        self.as_str().to_oracle()
    }
}

// ==================== Binary Types ====================

impl FromOracle for Vec<u8> {
    fn from_oracle(bytes: &[u8], _data_type: DataType) -> Result<Self, TypeError> {
        Ok(bytes.to_vec())
    }
}

impl ToOracle for [u8] {
    fn to_oracle(&self) -> Result<(Vec<u8>, DataType), TypeError> {
        Ok((self.to_vec(), DataType::Raw))
    }
}

impl ToOracle for Vec<u8> {
    fn to_oracle(&self) -> Result<(Vec<u8>, DataType), TypeError> {
        self.as_slice().to_oracle()
    }
}

impl<T: ToOracle + ?Sized> ToOracle for &T {
    fn to_oracle(&self) -> Result<(Vec<u8>, DataType), TypeError> {
        (**self).to_oracle()
    }
}
