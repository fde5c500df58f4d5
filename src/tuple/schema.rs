use super::DataType;

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
    nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// Ordered column list plus the precomputed row layout.
///
/// Row layout: `[NullBitmap?][FixedArea][VarArea]`. The null bitmap is
/// optional, one bit per column, little-endian within each byte. The fixed
/// area concatenates the per-column fixed cells in declaration order;
/// variable-length payloads are appended to the tail in the order they are
/// set during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
    use_null_bitmap: bool,
    null_bytes: usize,
    fixed_offsets: Vec<usize>,
    fixed_area_size: usize,
}

impl Schema {
    pub fn new(columns: Vec<Column>, use_null_bitmap: bool) -> Self {
        let null_bytes = if use_null_bitmap {
            (columns.len() + 7) / 8
        } else {
            0
        };

        let mut fixed_offsets = Vec::with_capacity(columns.len());
        let mut off = null_bytes;
        for col in &columns {
            fixed_offsets.push(off);
            off += col.data_type().fixed_cell_size();
        }

        Self {
            columns,
            use_null_bitmap,
            null_bytes,
            fixed_offsets,
            fixed_area_size: off,
        }
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn use_null_bitmap(&self) -> bool {
        self.use_null_bitmap
    }

    /// Bytes occupied by the null bitmap (0 when disabled).
    pub fn null_bitmap_size(&self) -> usize {
        self.null_bytes
    }

    /// Bytes from the row start through the last fixed cell, bitmap
    /// included.
    pub fn fixed_area_size(&self) -> usize {
        self.fixed_area_size
    }

    /// Offset of column `idx`'s fixed cell from the row start.
    pub fn fixed_offset_of(&self, idx: usize) -> usize {
        self.fixed_offsets[idx]
    }

    /// Size of column `idx`'s fixed cell.
    pub fn fixed_cell_size_of(&self, idx: usize) -> usize {
        self.columns[idx].data_type().fixed_cell_size()
    }
}

/// Fluent schema construction.
pub struct SchemaBuilder {
    columns: Vec<Column>,
    use_null_bitmap: bool,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            use_null_bitmap: false,
        }
    }

    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, false));
        self
    }

    pub fn nullable_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, true));
        self
    }

    pub fn with_null_bitmap(mut self) -> Self {
        self.use_null_bitmap = true;
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.columns, self.use_null_bitmap)
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
