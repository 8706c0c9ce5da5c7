use crate::{
    Error, Extractor, Value,
    buffers::BufferKind,
    handles::{ColumnDescription, Statement},
    preparation::Preparation,
};

/// Consumes the values of a contiguous span of result set columns.
///
/// The statement engine walks the extraction units of a statement in order. Each unit receives
/// the zero based position of its first column, which is the sum of the spans of all units
/// before it.
pub trait Extraction {
    /// Number of consecutive result columns this unit consumes.
    fn num_of_columns_handled(&self) -> usize;

    /// Called once after compilation, if values are transported using bound buffers. Prepares the
    /// buffers for the columns of this unit, starting at zero based `position`.
    fn prepare(&self, position: usize, preparer: &mut ColumnPreparer<'_>) -> Result<(), Error>;

    /// Consumes the values of the current row, starting at zero based `position`.
    fn extract(&mut self, position: usize, extractor: &mut Extractor<'_>) -> Result<(), Error>;
}

/// Allocates column buffers and binds them to the statement. Handed to
/// [`Extraction::prepare`].
pub struct ColumnPreparer<'a> {
    statement: &'a mut dyn Statement,
    preparation: &'a mut Preparation,
}

impl<'a> ColumnPreparer<'a> {
    /// # Safety
    ///
    /// Columns bound to `statement` must be unbound before `preparation` is dropped.
    pub(crate) unsafe fn new(
        statement: &'a mut dyn Statement,
        preparation: &'a mut Preparation,
    ) -> Self {
        Self {
            statement,
            preparation,
        }
    }

    /// Binds a buffer to the column at zero based `position`. `None` picks the buffer matching
    /// the column description.
    pub fn prepare(&mut self, position: usize, kind: Option<BufferKind>) -> Result<(), Error> {
        let kind = match kind {
            Some(kind) => kind,
            None => self.preparation.kind(&*self.statement, position)?,
        };
        // Upheld by the contract of `new`.
        unsafe { self.preparation.bind_column(&mut *self.statement, position, kind) }
    }
}

/// Collects all values of a single column.
#[derive(Debug, Clone, Default)]
pub struct Column {
    description: Option<ColumnDescription>,
    kind: Option<BufferKind>,
    values: Vec<Value>,
}

impl Column {
    /// Column using the buffer matching its description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Column fetched using the buffer `kind`, regardless of its description.
    pub fn with_kind(kind: BufferKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Column matching a description reported by the driver.
    pub fn from_description(description: ColumnDescription, max_field_size: usize) -> Self {
        let kind = BufferKind::from_data_type(description.data_type, max_field_size);
        Self {
            description: Some(description),
            kind: Some(kind),
            values: Vec::new(),
        }
    }

    /// Description of the column, if the unit has been created from one.
    pub fn description(&self) -> Option<&ColumnDescription> {
        self.description.as_ref()
    }

    pub fn kind(&self) -> Option<BufferKind> {
        self.kind
    }

    /// Values extracted so far, one per row.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Forget all values extracted so far.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl Extraction for Column {
    fn num_of_columns_handled(&self) -> usize {
        1
    }

    fn prepare(&self, position: usize, preparer: &mut ColumnPreparer<'_>) -> Result<(), Error> {
        preparer.prepare(position, self.kind)
    }

    fn extract(&mut self, position: usize, extractor: &mut Extractor<'_>) -> Result<(), Error> {
        let value = extractor.value(position, self.kind)?;
        self.values.push(value);
        Ok(())
    }
}

/// Collects the values of several consecutive columns, row by row.
#[derive(Debug, Clone)]
pub struct Rows {
    columns: usize,
    rows: Vec<Vec<Value>>,
}

impl Rows {
    /// Consumes `columns` consecutive columns.
    pub fn new(columns: usize) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Rows extracted so far.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }
}

impl Extraction for Rows {
    fn num_of_columns_handled(&self) -> usize {
        self.columns
    }

    fn prepare(&self, position: usize, preparer: &mut ColumnPreparer<'_>) -> Result<(), Error> {
        for offset in 0..self.columns {
            preparer.prepare(position + offset, None)?;
        }
        Ok(())
    }

    fn extract(&mut self, position: usize, extractor: &mut Extractor<'_>) -> Result<(), Error> {
        let row = (0..self.columns)
            .map(|offset| extractor.value(position + offset, None))
            .collect::<Result<Vec<_>, _>>()?;
        self.rows.push(row);
        Ok(())
    }
}
