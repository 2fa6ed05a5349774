//! Describe info, row header, bit vector and row data messages.
//!
//! Column values are left as raw spans tagged with their `DataType`;
//! turning them into Rust values is the `types` layer's job.

use bytes::Bytes;

use super::capabilities::Capabilities;
use super::constants::ccap;
use super::error::{DecodeError, DecodeResult};
use super::ub::UbReader;
use crate::types::DataType;

/// One column of a described query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: DataType,
    pub precision: i8,
    pub scale: i8,
    pub buffer_size: u32,
    pub max_size: u32,
    pub nullable: bool,
    pub csfrm: u8,
    pub schema: Option<String>,
    pub type_name: Option<String>,
    pub domain_schema: Option<String>,
    pub domain_name: Option<String>,
}

impl ColumnMetadata {
    /// A nullable column with no size information.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            precision: 0,
            scale: 0,
            buffer_size: data_type.buffer_size(),
            max_size: 0,
            nullable: true,
            csfrm: 0,
            schema: None,
            type_name: None,
            domain_schema: None,
            domain_name: None,
        }
    }

    fn decode(buf: &mut Bytes, caps: &Capabilities) -> DecodeResult<Self> {
        let type_number = buf.read_ub1()?;
        let data_type =
            DataType::from_u8(type_number).ok_or(DecodeError::UnsupportedDataType(type_number))?;
        buf.skip_ub1()?; // flags
        let precision = buf.read_u8()? as i8;
        let scale = buf.read_u8()? as i8;
        let buffer_size = buf.read_ub4()?;
        buf.skip_ub4()?; // max array elements
        buf.skip_ub8()?; // cont flags
        if buf.read_ub4()? > 0 {
            buf.read_bytes()?; // OID
        }
        buf.skip_ub2()?; // version
        buf.skip_ub2()?; // charset id
        let csfrm = buf.read_ub1()?;
        let mut max_size = buf.read_ub4()?;
        if data_type == DataType::Raw {
            max_size = buffer_size;
        }
        if caps.field_version_at_least(ccap::FIELD_VERSION_12_2) {
            buf.skip_ub4()?; // oaccolid
        }
        let nullable = buf.read_ub1()? != 0;
        buf.skip_ub1()?; // v7 name length
        let name = read_counted_str(buf, "column name")?.unwrap_or_default();
        let schema = read_counted_str(buf, "column schema")?;
        let type_name = read_counted_str(buf, "column type name")?;
        buf.skip_ub2()?; // column position
        buf.skip_ub4()?; // uds flags
        let (domain_schema, domain_name) = if caps.field_version_at_least(ccap::FIELD_VERSION_23_1)
        {
            (
                read_counted_str(buf, "domain schema")?,
                read_counted_str(buf, "domain name")?,
            )
        } else {
            (None, None)
        };

        Ok(Self {
            name,
            data_type,
            precision,
            scale,
            buffer_size,
            max_size,
            nullable,
            csfrm,
            schema,
            type_name,
            domain_schema,
            domain_name,
        })
    }
}

/// UB4 count followed by a string when the count is nonzero.
fn read_counted_str(buf: &mut Bytes, field: &'static str) -> DecodeResult<Option<String>> {
    if buf.read_ub4()? == 0 {
        return Ok(None);
    }
    buf.read_str(field)
}

/// Decode a DESCRIBE_INFO body into its columns.
pub fn decode_describe_info(
    buf: &mut Bytes,
    caps: &Capabilities,
) -> DecodeResult<Vec<ColumnMetadata>> {
    buf.skip_bytes_chunked()?;
    buf.skip_ub4()?; // max row size
    let count = buf.read_ub4()?;
    if count > 0 {
        buf.skip_ub1()?;
    }
    let mut columns = Vec::with_capacity(count.min(1000) as usize);
    for _ in 0..count {
        columns.push(ColumnMetadata::decode(buf, caps)?);
    }
    if buf.read_ub4()? > 0 {
        buf.skip_bytes_chunked()?; // current date
    }
    buf.skip_ub4()?; // dcbflag
    buf.skip_ub4()?; // dcbmdbz
    buf.skip_ub4()?; // dcbmnpr
    buf.skip_ub4()?; // dcbmxpr
    if buf.read_ub4()? > 0 {
        buf.skip_bytes_chunked()?; // dcbqcky
    }
    Ok(columns)
}

/// Decode a ROW_HEADER body. Returns the bit vector if one is attached.
pub fn decode_row_header(buf: &mut Bytes) -> DecodeResult<Option<Bytes>> {
    buf.skip_ub1()?; // flags
    buf.skip_ub2()?; // request count
    buf.skip_ub4()?; // iteration number
    buf.skip_ub4()?; // iteration count
    buf.skip_ub2()?; // buffer length
    let bit_vector = match buf.read_ub4()? {
        0 => None,
        n => {
            buf.skip_ub1()?;
            Some(buf.read_raw(n as usize)?)
        }
    };
    if buf.read_ub4()? > 0 {
        buf.skip_bytes_chunked()?; // rxhrid
    }
    Ok(bit_vector)
}

/// Decode a BIT_VECTOR body sized for `column_count` columns.
pub fn decode_bit_vector(buf: &mut Bytes, column_count: usize) -> DecodeResult<Bytes> {
    buf.skip_ub2()?; // columns sent
    buf.read_raw(column_count.div_ceil(8))
}

/// A clear bit means the column repeats the previous row's value.
pub fn is_duplicate(bit_vector: Option<&Bytes>, column: usize) -> bool {
    match bit_vector {
        Some(bits) => bits
            .get(column / 8)
            .is_some_and(|byte| byte & (1 << (column % 8)) == 0),
        None => false,
    }
}

/// Server-side handle to a LOB value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobLocator {
    pub size: u64,
    pub chunk_size: u32,
    pub locator: Bytes,
}

/// Raw value of one column in one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Null,
    Bytes(Bytes),
    Lob(LobLocator),
    /// Same as the previous row's value.
    Duplicate,
}

/// Decode a ROW_DATA body.
pub fn decode_row_data(
    buf: &mut Bytes,
    columns: &[ColumnMetadata],
    bit_vector: Option<&Bytes>,
) -> DecodeResult<Vec<ColumnValue>> {
    let mut values = Vec::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        if is_duplicate(bit_vector, index) {
            values.push(ColumnValue::Duplicate);
            continue;
        }
        values.push(decode_column_value(buf, column)?);
    }
    Ok(values)
}

fn decode_column_value(buf: &mut Bytes, column: &ColumnMetadata) -> DecodeResult<ColumnValue> {
    match column.data_type {
        DataType::Clob | DataType::Blob | DataType::Bfile => {
            if buf.read_ub4()? == 0 {
                return Ok(ColumnValue::Null);
            }
            let (size, chunk_size) = if column.data_type == DataType::Bfile {
                (0, 0)
            } else {
                (buf.read_ub8()?, buf.read_ub4()?)
            };
            let locator = buf.read_bytes()?.unwrap_or_default();
            Ok(ColumnValue::Lob(LobLocator {
                size,
                chunk_size,
                locator,
            }))
        }
        DataType::Object
        | DataType::Json
        | DataType::Vector
        | DataType::Cursor
        | DataType::Rowid => Err(DecodeError::UnsupportedDataType(column.data_type as u8)),
        DataType::Long | DataType::LongRaw | DataType::Urowid => bytes_value(buf),
        _ if column.buffer_size == 0 => Ok(ColumnValue::Null),
        _ => bytes_value(buf),
    }
}

fn bytes_value(buf: &mut Bytes) -> DecodeResult<ColumnValue> {
    Ok(match buf.read_bytes()? {
        Some(bytes) => ColumnValue::Bytes(bytes),
        None => ColumnValue::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ub::UbWriter;
    use bytes::{BufMut, BytesMut};
    use pretty_assertions::assert_eq;

    fn column(name: &str, data_type: DataType) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_string(),
            data_type,
            precision: 0,
            scale: 0,
            buffer_size: 22,
            max_size: 22,
            nullable: true,
            csfrm: 0,
            schema: None,
            type_name: None,
            domain_schema: None,
            domain_name: None,
        }
    }

    fn put_metadata(buf: &mut BytesMut, name: &str, data_type: DataType) {
        buf.put_u8(data_type as u8);
        buf.put_u8(0);
        buf.put_u8(10);
        buf.put_u8(2);
        buf.put_ub4(22);
        buf.put_ub4(0);
        buf.put_ub8(0);
        buf.put_ub4(0);
        buf.put_ub2(0);
        buf.put_ub2(873);
        buf.put_u8(1);
        buf.put_ub4(22);
        buf.put_ub4(0); // oaccolid
        buf.put_u8(1);
        buf.put_u8(0);
        buf.put_ub4(name.len() as u32);
        buf.put_bytes_with_length(name.as_bytes());
        buf.put_ub4(0);
        buf.put_ub4(0);
        buf.put_ub2(1);
        buf.put_ub4(0);
        buf.put_ub4(0); // domain schema
        buf.put_ub4(0); // domain name
    }

    #[test]
    fn test_describe_info() {
        let mut buf = BytesMut::new();
        buf.put_u8(0); // chunked block
        buf.put_ub4(100);
        buf.put_ub4(2);
        buf.put_u8(0);
        put_metadata(&mut buf, "ID", DataType::Number);
        put_metadata(&mut buf, "NAME", DataType::Varchar);
        for _ in 0..6 {
            buf.put_ub4(0);
        }
        let mut bytes = buf.freeze();
        let columns = decode_describe_info(&mut bytes, &Capabilities::default()).unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "ID");
        assert_eq!(columns[0].precision, 10);
        assert_eq!(columns[0].scale, 2);
        assert_eq!(columns[1].data_type, DataType::Varchar);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_row_data_with_duplicates_and_nulls() {
        let columns = [column("A", DataType::Number), column("B", DataType::Varchar), column("C", DataType::Varchar)];
        let mut buf = BytesMut::new();
        buf.put_bytes_with_length(&[0xc1, 0x02]);
        buf.put_u8(0xff);
        let bits = Bytes::from_static(&[0b0000_0011]);
        let values = decode_row_data(&mut buf.freeze(), &columns, Some(&bits)).unwrap();
        assert_eq!(
            values,
            vec![
                ColumnValue::Bytes(Bytes::from_static(&[0xc1, 0x02])),
                ColumnValue::Null,
                ColumnValue::Duplicate,
            ]
        );
    }

    #[test]
    fn test_lob_column_yields_locator() {
        let columns = [column("DOC", DataType::Clob)];
        let mut buf = BytesMut::new();
        buf.put_ub4(40);
        buf.put_ub8(1234);
        buf.put_ub4(8132);
        buf.put_bytes_with_length(&[9; 40]);
        let values = decode_row_data(&mut buf.freeze(), &columns, None).unwrap();
        assert_eq!(
            values,
            vec![ColumnValue::Lob(LobLocator {
                size: 1234,
                chunk_size: 8132,
                locator: Bytes::from(vec![9; 40]),
            })]
        );
    }

    #[test]
    fn test_unsupported_column_type() {
        let columns = [column("J", DataType::Json)];
        let err = decode_row_data(&mut Bytes::from_static(&[1, 0]), &columns, None).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedDataType(119));
    }

    #[test]
    fn test_row_header_bit_vector() {
        let mut buf = BytesMut::new();
        buf.put_u8(0);
        buf.put_ub2(0);
        buf.put_ub4(0);
        buf.put_ub4(1);
        buf.put_ub2(0);
        buf.put_ub4(1);
        buf.put_u8(1);
        buf.put_u8(0b101);
        buf.put_ub4(0);
        let bits = decode_row_header(&mut buf.freeze()).unwrap().unwrap();
        assert!(!is_duplicate(Some(&bits), 0));
        assert!(is_duplicate(Some(&bits), 1));
        assert!(!is_duplicate(Some(&bits), 2));
    }
}
