//! DATE and TIMESTAMP type conversions for Oracle.
//!
//! Oracle stores dates as 7 bytes (century, year, month, day, hour, minute,
//! second), TIMESTAMP adds a 4-byte nanosecond fraction and TIMESTAMP WITH
//! TIME ZONE adds two offset bytes. Fields of a zoned value are UTC.

use super::{DataType, FromOracle, ToOracle, TypeError};

const TZ_HOUR_OFFSET: i32 = 20;
const TZ_MINUTE_OFFSET: i32 = 60;
/// Set on byte 11 when the value carries a region id instead of an offset.
const HAS_REGION_ID: u8 = 0x80;

const DATE_LEN: usize = 7;
const TIMESTAMP_LEN: usize = 11;
const TIMESTAMP_TZ_LEN: usize = 13;

const MIN_YEAR: i32 = -4712;
const MAX_YEAR: i32 = 9999;

/// Fixed UTC offset of a TIMESTAMP WITH TIME ZONE value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeZoneOffset {
    pub hours: i8,
    pub minutes: i8,
}

/// Calendar timestamp with optional fraction and offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub nanosecond: u32,
    pub offset: Option<TimeZoneOffset>,
}

impl Timestamp {
    /// Create a whole-second timestamp without offset.
    pub fn new(year: i32, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            nanosecond: 0,
            offset: None,
        }
    }

    pub fn with_nanosecond(mut self, nanosecond: u32) -> Self {
        self.nanosecond = nanosecond;
        self
    }

    pub fn with_offset(mut self, hours: i8, minutes: i8) -> Self {
        self.offset = Some(TimeZoneOffset { hours, minutes });
        self
    }

    /// Shortest wire length that holds every present component.
    pub fn encoded_len(&self) -> usize {
        if self.offset.is_some() {
            TIMESTAMP_TZ_LEN
        } else if self.nanosecond != 0 {
            TIMESTAMP_LEN
        } else {
            DATE_LEN
        }
    }

    /// Encode to the 7, 11 or 13 byte wire form.
    pub fn encode(&self) -> Result<Vec<u8>, TypeError> {
        self.validate()?;
        let length = self.encoded_len();
        let mut buf = Vec::with_capacity(length);
        buf.push((self.year.div_euclid(100) + 100) as u8);
        buf.push((self.year.rem_euclid(100) + 100) as u8);
        buf.push(self.month);
        buf.push(self.day);
        buf.push(self.hour + 1);
        buf.push(self.minute + 1);
        buf.push(self.second + 1);
        if length >= TIMESTAMP_LEN {
            buf.extend_from_slice(&self.nanosecond.to_be_bytes());
        }
        if let Some(offset) = self.offset {
            buf.push((offset.hours as i32 + TZ_HOUR_OFFSET) as u8);
            buf.push((offset.minutes as i32 + TZ_MINUTE_OFFSET) as u8);
        }
        Ok(buf)
    }

    fn validate(&self) -> Result<(), TypeError> {
        let invalid = |what: &str| -> Result<(), TypeError> {
            Err(TypeError::InvalidData(format!("Invalid {}: {:?}", what, self)))
        };
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return invalid("year");
        }
        if !(1..=12).contains(&self.month) || !(1..=31).contains(&self.day) {
            return invalid("date");
        }
        if self.hour > 23 || self.minute > 59 || self.second > 59 {
            return invalid("time of day");
        }
        if self.nanosecond > 999_999_999 {
            return invalid("fraction");
        }
        if let Some(offset) = self.offset
            && (!(-12..=14).contains(&offset.hours) || !(-59..=59).contains(&offset.minutes))
        {
            return invalid("offset");
        }
        Ok(())
    }

    /// Decode any DATE/TIMESTAMP wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, TypeError> {
        let length = bytes.len();
        if !matches!(length, DATE_LEN..=TIMESTAMP_LEN | TIMESTAMP_TZ_LEN) {
            return Err(TypeError::InvalidData(format!(
                "Invalid timestamp length {}",
                length
            )));
        }

        let year = (bytes[0] as i32 - 100) * 100 + bytes[1] as i32 - 100;
        let (month, day) = (bytes[2], bytes[3]);
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(TypeError::InvalidData(format!(
                "Invalid date {}-{}",
                month, day
            )));
        }
        let (hour, minute, second) = (bytes[4], bytes[5], bytes[6]);
        if !(1..=24).contains(&hour) || !(1..=60).contains(&minute) || !(1..=60).contains(&second) {
            return Err(TypeError::InvalidData("Invalid time of day".to_string()));
        }

        let nanosecond = if length >= TIMESTAMP_LEN {
            u32::from_be_bytes([bytes[7], bytes[8], bytes[9], bytes[10]])
        } else {
            0
        };

        let mut offset = None;
        if length >= TIMESTAMP_TZ_LEN {
            if bytes[11] & HAS_REGION_ID != 0 {
                return Err(TypeError::UnsupportedTimeZoneRegion);
            }
            if bytes[11] != 0 && bytes[12] != 0 {
                offset = Some(TimeZoneOffset {
                    hours: (bytes[11] as i32 - TZ_HOUR_OFFSET) as i8,
                    minutes: (bytes[12] as i32 - TZ_MINUTE_OFFSET) as i8,
                });
            }
        }

        Ok(Self {
            year,
            month,
            day,
            hour: hour - 1,
            minute: minute - 1,
            second: second - 1,
            nanosecond,
            offset,
        })
    }
}

impl FromOracle for Timestamp {
    fn from_oracle(bytes: &[u8], data_type: DataType) -> Result<Self, TypeError> {
        match data_type {
            DataType::Date
            | DataType::Timestamp
            | DataType::TimestampTz
            | DataType::TimestampLtz => Timestamp::decode(bytes),
            got => Err(TypeError::UnexpectedType { expected: "timestamp", got }),
        }
    }
}

impl ToOracle for Timestamp {
    fn to_oracle(&self) -> Result<(Vec<u8>, DataType), TypeError> {
        let data_type = if self.offset.is_some() {
            DataType::TimestampTz
        } else {
            DataType::Timestamp
        };
        Ok((self.encode()?, data_type))
    }
}

#[cfg(feature = "chrono")]
impl Timestamp {
    /// Convert to chrono, ignoring any offset (fields are UTC when zoned).
    pub fn to_naive(&self) -> Option<chrono::NaiveDateTime> {
        chrono::NaiveDate::from_ymd_opt(self.year, self.month as u32, self.day as u32)?
            .and_hms_nano_opt(
                self.hour as u32,
                self.minute as u32,
                self.second as u32,
                self.nanosecond,
            )
    }

    pub fn from_naive(value: &chrono::NaiveDateTime) -> Self {
        use chrono::{Datelike, Timelike};
        Self::new(
            value.year(),
            value.month() as u8,
            value.day() as u8,
            value.hour() as u8,
            value.minute() as u8,
            value.second() as u8,
        )
        .with_nanosecond(value.nanosecond())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_date_round_trip() {
        let ts = Timestamp::new(2024, 12, 25, 17, 30, 0);
        let bytes = ts.encode().unwrap();
        assert_eq!(bytes, vec![120, 124, 12, 25, 18, 31, 1]);
        assert_eq!(Timestamp::decode(&bytes).unwrap(), ts);
    }

    #[test]
    fn test_fraction_round_trip() {
        let ts = Timestamp::new(1999, 1, 2, 3, 4, 5).with_nanosecond(123_456_789);
        let bytes = ts.encode().unwrap();
        assert_eq!(bytes.len(), 11);
        assert_eq!(Timestamp::decode(&bytes).unwrap(), ts);
    }

    #[test]
    fn test_zoned_round_trip() {
        let ts = Timestamp::new(2030, 6, 30, 23, 59, 59)
            .with_nanosecond(1)
            .with_offset(-5, -30);
        let bytes = ts.encode().unwrap();
        assert_eq!(bytes.len(), 13);
        assert_eq!(&bytes[11..], &[15, 30]);
        assert_eq!(Timestamp::decode(&bytes).unwrap(), ts);
    }

    #[test]
    fn test_zero_offset_keeps_zone() {
        let ts = Timestamp::new(2000, 1, 1, 0, 0, 0).with_offset(0, 0);
        assert_eq!(Timestamp::decode(&ts.encode().unwrap()).unwrap(), ts);
    }

    #[test]
    fn test_region_id_is_rejected() {
        let mut bytes = Timestamp::new(2000, 1, 1, 0, 0, 0).with_offset(1, 0).encode().unwrap();
        bytes[11] |= HAS_REGION_ID;
        assert_eq!(
            Timestamp::decode(&bytes),
            Err(TypeError::UnsupportedTimeZoneRegion)
        );
    }

    #[test]
    fn test_negative_year() {
        let ts = Timestamp::new(-44, 3, 15, 12, 0, 0);
        assert_eq!(Timestamp::decode(&ts.encode().unwrap()).unwrap(), ts);
    }

    #[test]
    fn test_truncated_input() {
        assert!(Timestamp::decode(&[120, 124, 12]).is_err());
        assert!(Timestamp::decode(&[120, 124, 12, 25, 18, 31, 1, 0, 0, 0, 0, 20]).is_err());
        assert!(Timestamp::decode(&[120, 124, 12, 25, 18, 31, 1, 0, 0, 0, 0, 20, 60, 0]).is_err());
    }

    #[test]
    fn test_out_of_range_fields_fail_to_encode() {
        assert!(Timestamp::new(2024, 1, 1, 255, 0, 0).encode().is_err());
        assert!(Timestamp::new(2024, 1, 1, 0, 60, 0).encode().is_err());
        assert!(Timestamp::new(2024, 13, 1, 0, 0, 0).encode().is_err());
        assert!(Timestamp::new(10_000, 1, 1, 0, 0, 0).encode().is_err());
        assert!(Timestamp::new(2024, 1, 1, 0, 0, 0).with_nanosecond(1_000_000_000).encode().is_err());
        assert!(Timestamp::new(2024, 1, 1, 0, 0, 0).with_offset(20, 0).encode().is_err());
    }
}
