use crate::common::{Result, StorageError};

use super::{DataType, Schema};

/// One row as an opaque byte sequence conforming to a `Schema`.
///
/// Layout: `[NullBitmap?][FixedArea][VarArea]` (see `Schema`). A tuple is
/// immutable once built; accessors borrow the schema because the bytes do
/// not carry it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tuple {
    data: Vec<u8>,
}

impl Tuple {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Serialized byte form (a copy).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Rebuilds a tuple from its serialized form.
    pub fn deserialize(src: &[u8]) -> Self {
        Self {
            data: src.to_vec(),
        }
    }

    /// Whether column `idx` is NULL. Always false when the schema carries
    /// no null bitmap.
    pub fn is_null(&self, schema: &Schema, idx: usize) -> bool {
        if !schema.use_null_bitmap() || self.data.len() < schema.null_bitmap_size() {
            return false;
        }
        (self.data[idx / 8] >> (idx % 8)) & 1 == 1
    }

    pub fn get_i32(&self, schema: &Schema, idx: usize) -> Result<i32> {
        let cell = self.fixed_cell(schema, idx, DataType::Int32)?;
        Ok(i32::from_le_bytes(cell.try_into().unwrap()))
    }

    pub fn get_i64(&self, schema: &Schema, idx: usize) -> Result<i64> {
        let cell = self.fixed_cell(schema, idx, DataType::Int64)?;
        Ok(i64::from_le_bytes(cell.try_into().unwrap()))
    }

    pub fn get_f32(&self, schema: &Schema, idx: usize) -> Result<f32> {
        let cell = self.fixed_cell(schema, idx, DataType::Float)?;
        Ok(f32::from_le_bytes(cell.try_into().unwrap()))
    }

    pub fn get_f64(&self, schema: &Schema, idx: usize) -> Result<f64> {
        let cell = self.fixed_cell(schema, idx, DataType::Double)?;
        Ok(f64::from_le_bytes(cell.try_into().unwrap()))
    }

    /// Days since 1970-01-01.
    pub fn get_date(&self, schema: &Schema, idx: usize) -> Result<i32> {
        let cell = self.fixed_cell(schema, idx, DataType::Date)?;
        Ok(i32::from_le_bytes(cell.try_into().unwrap()))
    }

    /// Fixed-length string with the trailing zero padding trimmed.
    pub fn get_char(&self, schema: &Schema, idx: usize) -> Result<String> {
        let col = self.checked_column(schema, idx)?;
        if !matches!(col.data_type(), DataType::Char(_)) {
            return Err(type_mismatch(idx, col.data_type(), "CHAR"));
        }
        self.check_not_null(schema, idx)?;
        let cell = self.cell_bytes(schema, idx)?;
        let trimmed = cell.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
        Ok(String::from_utf8_lossy(&cell[..trimmed]).into_owned())
    }

    pub fn get_varchar(&self, schema: &Schema, idx: usize) -> Result<String> {
        let col = self.checked_column(schema, idx)?;
        if !matches!(col.data_type(), DataType::VarChar(_)) {
            return Err(type_mismatch(idx, col.data_type(), "VARCHAR"));
        }
        self.check_not_null(schema, idx)?;
        let meta = self.cell_bytes(schema, idx)?;
        let off = u16::from_le_bytes(meta[0..2].try_into().unwrap()) as usize;
        let len = u16::from_le_bytes(meta[2..4].try_into().unwrap()) as usize;
        if off + len > self.data.len() {
            return Err(StorageError::Corruption(format!(
                "varchar column {} range [{off}, {}) outside tuple of {} bytes",
                idx,
                off + len,
                self.data.len()
            )));
        }
        Ok(String::from_utf8_lossy(&self.data[off..off + len]).into_owned())
    }

    fn checked_column<'s>(&self, schema: &'s Schema, idx: usize) -> Result<&'s super::Column> {
        schema.column(idx).ok_or_else(|| {
            StorageError::OutOfRange(format!(
                "column {idx} out of range for {}-column schema",
                schema.column_count()
            ))
        })
    }

    fn check_not_null(&self, schema: &Schema, idx: usize) -> Result<()> {
        if self.is_null(schema, idx) {
            return Err(StorageError::NotFound(format!("column {idx} is NULL")));
        }
        Ok(())
    }

    fn cell_bytes(&self, schema: &Schema, idx: usize) -> Result<&[u8]> {
        let off = schema.fixed_offset_of(idx);
        let size = schema.fixed_cell_size_of(idx);
        self.data.get(off..off + size).ok_or_else(|| {
            StorageError::Corruption(format!(
                "tuple of {} bytes shorter than fixed cell of column {idx}",
                self.data.len()
            ))
        })
    }

    fn fixed_cell(&self, schema: &Schema, idx: usize, want: DataType) -> Result<&[u8]> {
        let col = self.checked_column(schema, idx)?;
        if col.data_type() != want {
            return Err(StorageError::InvalidArgument(format!(
                "column {idx} is {}, requested {want}",
                col.data_type()
            )));
        }
        self.check_not_null(schema, idx)?;
        self.cell_bytes(schema, idx)
    }
}

fn type_mismatch(idx: usize, actual: DataType, requested: &str) -> StorageError {
    StorageError::InvalidArgument(format!("column {idx} is {actual}, requested {requested}"))
}

/// Row construction: set every column (or null it), then `build`.
///
/// Variable-length payloads land in the var area in the order they are set.
pub struct TupleBuilder<'a> {
    schema: &'a Schema,
    row: Vec<u8>,
    var: Vec<u8>,
    set: Vec<bool>,
}

impl<'a> TupleBuilder<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            row: vec![0u8; schema.fixed_area_size()],
            var: Vec::new(),
            set: vec![false; schema.column_count()],
        }
    }

    /// Marks column `idx` NULL. Requires an active null bitmap and a
    /// nullable column.
    pub fn set_null(&mut self, idx: usize) -> Result<()> {
        let col = self.checked_column(idx)?;
        if !self.schema.use_null_bitmap() {
            return Err(StorageError::InvalidArgument(
                "set_null: schema has no null bitmap".to_string(),
            ));
        }
        if !col.is_nullable() {
            return Err(StorageError::InvalidArgument(format!(
                "set_null: column {idx} is not nullable"
            )));
        }
        self.row[idx / 8] |= 1 << (idx % 8);
        self.set[idx] = true;
        Ok(())
    }

    pub fn set_i32(&mut self, idx: usize, v: i32) -> Result<()> {
        self.write_fixed(idx, DataType::Int32, &v.to_le_bytes())
    }

    pub fn set_i64(&mut self, idx: usize, v: i64) -> Result<()> {
        self.write_fixed(idx, DataType::Int64, &v.to_le_bytes())
    }

    pub fn set_f32(&mut self, idx: usize, v: f32) -> Result<()> {
        self.write_fixed(idx, DataType::Float, &v.to_le_bytes())
    }

    pub fn set_f64(&mut self, idx: usize, v: f64) -> Result<()> {
        self.write_fixed(idx, DataType::Double, &v.to_le_bytes())
    }

    /// Days since 1970-01-01.
    pub fn set_date(&mut self, idx: usize, days: i32) -> Result<()> {
        self.write_fixed(idx, DataType::Date, &days.to_le_bytes())
    }

    /// Fixed-length string: zero-padded to N, silently truncated past N.
    pub fn set_char(&mut self, idx: usize, v: &str) -> Result<()> {
        let col = self.checked_column(idx)?;
        if !matches!(col.data_type(), DataType::Char(_)) {
            return Err(type_mismatch(idx, col.data_type(), "CHAR"));
        }
        let off = self.schema.fixed_offset_of(idx);
        let n = self.schema.fixed_cell_size_of(idx);
        let copy = v.len().min(n);
        self.row[off..off + copy].copy_from_slice(&v.as_bytes()[..copy]);
        self.row[off + copy..off + n].fill(0);
        self.set[idx] = true;
        Ok(())
    }

    /// Variable-length string, bounded by the column's declared maximum.
    pub fn set_varchar(&mut self, idx: usize, v: &str) -> Result<()> {
        let col = self.checked_column(idx)?;
        let DataType::VarChar(max_len) = col.data_type() else {
            return Err(type_mismatch(idx, col.data_type(), "VARCHAR"));
        };
        if v.len() > max_len as usize {
            return Err(StorageError::OutOfRange(format!(
                "varchar of {} bytes exceeds column {idx} maximum {max_len}",
                v.len()
            )));
        }
        let off = self.schema.fixed_area_size() + self.var.len();
        if off + v.len() > u16::MAX as usize {
            return Err(StorageError::OutOfRange(format!(
                "row grows past {} bytes", u16::MAX
            )));
        }

        let cell = self.schema.fixed_offset_of(idx);
        self.row[cell..cell + 2].copy_from_slice(&(off as u16).to_le_bytes());
        self.row[cell + 2..cell + 4].copy_from_slice(&(v.len() as u16).to_le_bytes());
        self.var.extend_from_slice(v.as_bytes());
        self.set[idx] = true;
        Ok(())
    }

    /// Assembles the final row. Every column must have been set or nulled.
    pub fn build(self) -> Result<Tuple> {
        if let Some(idx) = self.set.iter().position(|&s| !s) {
            return Err(StorageError::InvalidArgument(format!(
                "build: column {idx} not set"
            )));
        }
        let mut data = self.row;
        data.extend_from_slice(&self.var);
        Ok(Tuple { data })
    }

    fn checked_column(&self, idx: usize) -> Result<&'a super::Column> {
        self.schema.column(idx).ok_or_else(|| {
            StorageError::OutOfRange(format!(
                "column {idx} out of range for {}-column schema",
                self.schema.column_count()
            ))
        })
    }

    fn write_fixed(&mut self, idx: usize, want: DataType, bytes: &[u8]) -> Result<()> {
        let col = self.checked_column(idx)?;
        if col.data_type() != want {
            return Err(StorageError::InvalidArgument(format!(
                "column {idx} is {}, assigned {want}",
                col.data_type()
            )));
        }
        let off = self.schema.fixed_offset_of(idx);
        self.row[off..off + bytes.len()].copy_from_slice(bytes);
        self.set[idx] = true;
        Ok(())
    }
}
