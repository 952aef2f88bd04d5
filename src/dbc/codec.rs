//! WDBC binary codec.
//!
//! Layout: 20-byte header (`WDBC`, record_count, field_count, record_size,
//! string_block_size, all little-endian u32 after the magic), then
//! `record_count` fixed-size records, then the string block. Strings are
//! stored as u32 offsets into the block; offset 0 is the empty string and
//! the block always starts with a single NUL byte.
//!
//! The writer interns strings by value - equal strings must collapse to one
//! offset for byte-for-byte fidelity with the baseline files.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;

use crate::dbc::schema::{FieldType, Schema};

pub const MAGIC: [u8; 4] = *b"WDBC";
pub const HEADER_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub record_count: u32,
    pub field_count: u32,
    pub record_size: u32,
    pub string_block_size: u32,
}

/// One decoded cell, aligned with [`Schema::columns`] order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    UInt32(u32),
    UInt8(u8),
    Int8(i8),
    Float(f32),
    Text(String),
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            bail!("Record truncated at byte {}", self.pos);
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }
}

/// Resolve a string offset against the string block.
fn string_at(block: &[u8], offset: u32) -> Result<String> {
    if offset == 0 {
        return Ok(String::new());
    }
    let offset = offset as usize;
    if offset >= block.len() {
        bail!(
            "String offset {} outside string block of {} bytes",
            offset,
            block.len()
        );
    }
    let end = block[offset..]
        .iter()
        .position(|&b| b == 0)
        .map(|p| offset + p)
        .unwrap_or(block.len());
    Ok(String::from_utf8_lossy(&block[offset..end]).into_owned())
}

/// Parse the header, validating magic and bounds.
pub fn read_header(bytes: &[u8]) -> Result<Header> {
    if bytes.len() < HEADER_SIZE {
        bail!("File too small for a WDBC header ({} bytes)", bytes.len());
    }
    if bytes[0..4] != MAGIC {
        bail!("Bad magic: expected WDBC");
    }
    let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    Ok(Header {
        record_count: word(4),
        field_count: word(8),
        record_size: word(12),
        string_block_size: word(16),
    })
}

/// Decode a whole file into rows of values aligned with the schema's
/// expanded columns.
pub fn read(schema: &Schema, bytes: &[u8]) -> Result<Vec<Vec<Value>>> {
    let header = read_header(bytes).with_context(|| format!("In {}", schema.file))?;

    let expected_size = schema.record_size();
    if header.record_size != expected_size {
        bail!(
            "{}: record size {} disagrees with schema ({} bytes)",
            schema.file,
            header.record_size,
            expected_size
        );
    }
    if header.field_count != schema.field_count() {
        eprintln!(
            "Warning: {}: field count {} disagrees with schema ({})",
            schema.file,
            header.field_count,
            schema.field_count()
        );
    }

    let records_len = header.record_count as usize * header.record_size as usize;
    let block_start = HEADER_SIZE + records_len;
    let block_end = block_start + header.string_block_size as usize;
    if bytes.len() < block_end {
        bail!(
            "{}: file truncated: {} bytes, header implies {}",
            schema.file,
            bytes.len(),
            block_end
        );
    }
    let block = &bytes[block_start..block_end];

    let mut rows = Vec::with_capacity(header.record_count as usize);
    for record_index in 0..header.record_count as usize {
        let start = HEADER_SIZE + record_index * header.record_size as usize;
        let mut cursor = Cursor::new(&bytes[start..start + header.record_size as usize]);
        let mut row = Vec::new();

        for field in &schema.fields {
            for _ in 0..field.count {
                match field.ftype {
                    FieldType::Int32 => row.push(Value::Int32(cursor.i32()?)),
                    FieldType::UInt32 => row.push(Value::UInt32(cursor.u32()?)),
                    FieldType::UInt8 => row.push(Value::UInt8(cursor.u8()?)),
                    FieldType::Int8 => row.push(Value::Int8(cursor.u8()? as i8)),
                    FieldType::Float => row.push(Value::Float(cursor.f32()?)),
                    FieldType::String => {
                        let offset = cursor.u32()?;
                        row.push(Value::Text(string_at(block, offset)?));
                    }
                    FieldType::Loc => {
                        for _ in 0..16 {
                            let offset = cursor.u32()?;
                            row.push(Value::Text(string_at(block, offset)?));
                        }
                        row.push(Value::UInt32(cursor.u32()?));
                    }
                }
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

/// String interner for the writer. Starts with `"" -> 0`; insertion appends
/// bytes plus a NUL and returns the pre-append offset.
struct StringBlock {
    buf: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl StringBlock {
    fn new() -> Self {
        let mut offsets = HashMap::new();
        offsets.insert(String::new(), 0);
        Self {
            buf: vec![0],
            offsets,
        }
    }

    fn intern(&mut self, s: &str) -> u32 {
        if let Some(&offset) = self.offsets.get(s) {
            return offset;
        }
        let offset = self.buf.len() as u32;
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
        self.offsets.insert(s.to_string(), offset);
        offset
    }
}

fn expect_text<'a>(schema: &Schema, value: &'a Value) -> Result<&'a str> {
    match value {
        Value::Text(s) => Ok(s),
        other => bail!("{}: expected string value, got {:?}", schema.file, other),
    }
}

/// Encode rows into a complete file. Rows must align with the schema's
/// expanded columns; the emitted record byte count is checked against the
/// schema-computed record size.
pub fn write(schema: &Schema, rows: &[Vec<Value>]) -> Result<Vec<u8>> {
    let column_count = schema.columns().len();
    let record_size = schema.record_size() as usize;
    let mut block = StringBlock::new();
    let mut records: Vec<u8> = Vec::with_capacity(rows.len() * record_size);

    for (index, row) in rows.iter().enumerate() {
        if row.len() != column_count {
            bail!(
                "{}: row {} has {} values, schema expands to {} columns",
                schema.file,
                index,
                row.len(),
                column_count
            );
        }

        let record_start = records.len();
        let mut cells = row.iter();
        for field in &schema.fields {
            for _ in 0..field.count {
                match field.ftype {
                    FieldType::Int32 => match cells.next() {
                        Some(Value::Int32(v)) => records.extend_from_slice(&v.to_le_bytes()),
                        other => bail!("{}: expected int32, got {:?}", schema.file, other),
                    },
                    FieldType::UInt32 => match cells.next() {
                        Some(Value::UInt32(v)) => records.extend_from_slice(&v.to_le_bytes()),
                        other => bail!("{}: expected uint32, got {:?}", schema.file, other),
                    },
                    FieldType::UInt8 => match cells.next() {
                        Some(Value::UInt8(v)) => records.push(*v),
                        other => bail!("{}: expected uint8, got {:?}", schema.file, other),
                    },
                    FieldType::Int8 => match cells.next() {
                        Some(Value::Int8(v)) => records.push(*v as u8),
                        other => bail!("{}: expected int8, got {:?}", schema.file, other),
                    },
                    FieldType::Float => match cells.next() {
                        Some(Value::Float(v)) => records.extend_from_slice(&v.to_le_bytes()),
                        other => bail!("{}: expected float, got {:?}", schema.file, other),
                    },
                    FieldType::String => {
                        let value = cells
                            .next()
                            .with_context(|| format!("{}: row {} too short", schema.file, index))?;
                        let offset = block.intern(expect_text(schema, value)?);
                        records.extend_from_slice(&offset.to_le_bytes());
                    }
                    FieldType::Loc => {
                        for _ in 0..16 {
                            let value = cells.next().with_context(|| {
                                format!("{}: row {} too short", schema.file, index)
                            })?;
                            let offset = block.intern(expect_text(schema, value)?);
                            records.extend_from_slice(&offset.to_le_bytes());
                        }
                        match cells.next() {
                            Some(Value::UInt32(flags)) => {
                                records.extend_from_slice(&flags.to_le_bytes())
                            }
                            other => {
                                bail!("{}: expected locale flags, got {:?}", schema.file, other)
                            }
                        }
                    }
                }
            }
        }

        let written = records.len() - record_start;
        if written != record_size {
            bail!(
                "{}: row {} encoded to {} bytes, schema says {}",
                schema.file,
                index,
                written,
                record_size
            );
        }
    }

    let mut out = Vec::with_capacity(HEADER_SIZE + records.len() + block.buf.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    out.extend_from_slice(&schema.field_count().to_le_bytes());
    out.extend_from_slice(&(record_size as u32).to_le_bytes());
    out.extend_from_slice(&(block.buf.len() as u32).to_le_bytes());
    out.extend_from_slice(&records);
    out.extend_from_slice(&block.buf);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(json: &str) -> Schema {
        serde_json::from_str(json).unwrap()
    }

    fn sample_schema() -> Schema {
        schema(
            r#"{"file": "T.dbc", "primaryKeys": ["ID"],
                "fields": [{"name": "ID", "type": "uint32"},
                           {"name": "Tag", "type": "string"},
                           {"name": "Name", "type": "Loc"},
                           {"name": "Scale", "type": "float"}]}"#,
        )
    }

    fn loc_row(id: u32, tag: &str, enus: &str, scale: f32) -> Vec<Value> {
        let mut row = vec![Value::UInt32(id), Value::Text(tag.to_string())];
        row.push(Value::Text(enus.to_string()));
        for _ in 0..15 {
            row.push(Value::Text(String::new()));
        }
        row.push(Value::UInt32(0xFF01FE));
        row.push(Value::Float(scale));
        row
    }

    #[test]
    fn test_write_read_round_trip() {
        let schema = sample_schema();
        let rows = vec![
            loc_row(1, "alpha", "First", 1.0),
            loc_row(2, "beta", "Second", 0.5),
        ];

        let bytes = write(&schema, &rows).unwrap();
        let decoded = read(&schema, &bytes).unwrap();
        assert_eq!(decoded, rows);

        // Re-encoding decoded rows is byte-identical.
        let again = write(&schema, &decoded).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_header_fields() {
        let schema = sample_schema();
        let rows = vec![loc_row(7, "x", "y", 2.0)];
        let bytes = write(&schema, &rows).unwrap();
        let header = read_header(&bytes).unwrap();

        assert_eq!(header.record_count, 1);
        assert_eq!(header.field_count, 1 + 1 + 17 + 1);
        assert_eq!(header.record_size, 4 + 4 + 68 + 4);
    }

    #[test]
    fn test_empty_strings_are_offset_zero() {
        let schema = schema(
            r#"{"file": "S.dbc", "fields": [{"name": "Name", "type": "string"}]}"#,
        );
        let rows = vec![vec![Value::Text(String::new())]; 3];
        let bytes = write(&schema, &rows).unwrap();

        let header = read_header(&bytes).unwrap();
        // Block holds only the leading NUL.
        assert_eq!(header.string_block_size, 1);
        for record_index in 0..3 {
            let at = HEADER_SIZE + record_index * 4;
            assert_eq!(&bytes[at..at + 4], &[0, 0, 0, 0]);
        }
    }

    #[test]
    fn test_repeated_strings_share_one_entry() {
        let schema = schema(
            r#"{"file": "S.dbc", "fields": [{"name": "Name", "type": "string"}]}"#,
        );
        let rows = vec![
            vec![Value::Text("shared".to_string())],
            vec![Value::Text("shared".to_string())],
            vec![Value::Text("other".to_string())],
        ];
        let bytes = write(&schema, &rows).unwrap();
        let header = read_header(&bytes).unwrap();

        // 1 (leading NUL) + "shared\0" + "other\0"
        assert_eq!(header.string_block_size as usize, 1 + 7 + 6);

        let offset_of = |record: usize| {
            let at = HEADER_SIZE + record * 4;
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        assert_eq!(offset_of(0), 1);
        assert_eq!(offset_of(1), 1);
        assert_eq!(offset_of(2), 8);
    }

    #[test]
    fn test_record_size_mismatch_is_fatal() {
        let schema_a = schema(
            r#"{"file": "A.dbc", "fields": [{"name": "ID", "type": "uint32"}]}"#,
        );
        let schema_b = schema(
            r#"{"file": "B.dbc", "fields": [{"name": "ID", "type": "uint32"},
                                            {"name": "X", "type": "uint32"}]}"#,
        );
        let bytes = write(&schema_a, &[vec![Value::UInt32(1)]]).unwrap();
        let err = read(&schema_b, &bytes).unwrap_err();
        assert!(err.to_string().contains("record size"));
    }

    #[test]
    fn test_truncated_file_is_an_error() {
        let schema = sample_schema();
        let rows = vec![loc_row(1, "a", "b", 1.0)];
        let mut bytes = write(&schema, &rows).unwrap();
        bytes.truncate(bytes.len() - 3);

        assert!(read(&schema, &bytes).is_err());
    }

    #[test]
    fn test_bad_magic_is_an_error() {
        let schema = sample_schema();
        let mut bytes = write(&schema, &[]).unwrap();
        bytes[0] = b'X';
        assert!(read(&schema, &bytes).is_err());
    }

    #[test]
    fn test_string_offset_out_of_range() {
        let schema = schema(
            r#"{"file": "S.dbc", "fields": [{"name": "Name", "type": "string"}]}"#,
        );
        // Hand-build a file whose single record points past the block.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&1u32.to_le_bytes()); // record_count
        bytes.extend_from_slice(&1u32.to_le_bytes()); // field_count
        bytes.extend_from_slice(&4u32.to_le_bytes()); // record_size
        bytes.extend_from_slice(&1u32.to_le_bytes()); // string_block_size
        bytes.extend_from_slice(&99u32.to_le_bytes()); // offset 99
        bytes.push(0); // block

        assert!(read(&schema, &bytes).is_err());
    }

    #[test]
    fn test_byte_sized_fields() {
        let schema = schema(
            r#"{"file": "B.dbc", "fields": [{"name": "A", "type": "uint8"},
                                            {"name": "B", "type": "int8"},
                                            {"name": "C", "type": "uint32"}]}"#,
        );
        let rows = vec![vec![Value::UInt8(250), Value::Int8(-3), Value::UInt32(9)]];
        let bytes = write(&schema, &rows).unwrap();
        assert_eq!(read_header(&bytes).unwrap().record_size, 6);
        assert_eq!(read(&schema, &bytes).unwrap(), rows);
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let schema = schema(
            r#"{"file": "S.dbc", "fields": [{"name": "ID", "type": "uint32"}]}"#,
        );
        let rows = vec![vec![Value::Text("oops".to_string())]];
        assert!(write(&schema, &rows).is_err());
    }
}
