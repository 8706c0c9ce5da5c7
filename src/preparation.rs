//! Result set shape of a prepared statement and the column buffers bound to it.

use log::debug;

use crate::{
    Error,
    buffers::{BufferKind, ColumnBuffer},
    handles::{ColumnDescription, Statement},
};

/// Determines how values of the result set are transferred from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataExtraction {
    /// Column buffers are bound before the first fetch. `SQLFetch` copies the values into them.
    Bound,
    /// Values are pulled explicitly for each column of the current row using `SQLGetData`.
    Manual,
}

/// The compiled form of an SQL statement: its text, the number of result columns and, in
/// [`DataExtraction::Bound`] mode, the buffers bound to these columns.
#[derive(Debug)]
pub struct Preparation {
    sql: String,
    max_field_size: usize,
    extraction: DataExtraction,
    num_columns: usize,
    /// Indexed by zero based column position.
    kinds: Vec<Option<BufferKind>>,
    /// Indexed by zero based column position. Boxed, so the addresses bound to the statement stay
    /// stable.
    buffers: Vec<Option<Box<ColumnBuffer>>>,
}

impl Preparation {
    /// Queries the number of result columns of `statement`, which must already be prepared with
    /// `sql`.
    pub fn new(
        statement: &(impl Statement + ?Sized),
        sql: &str,
        max_field_size: usize,
        extraction: DataExtraction,
    ) -> Result<Self, Error> {
        let num_columns = statement.num_result_cols().into_result(statement)?;
        let num_columns = usize::try_from(num_columns).unwrap_or(0);
        debug!("Prepared statement with {num_columns} result columns ({extraction:?}).");
        Ok(Self {
            sql: sql.to_owned(),
            max_field_size,
            extraction,
            num_columns,
            kinds: vec![None; num_columns],
            buffers: (0..num_columns).map(|_| None).collect(),
        })
    }

    /// SQL text as passed to the driver.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Upper bound for the length of variable sized column buffers.
    pub fn max_field_size(&self) -> usize {
        self.max_field_size
    }

    pub fn extraction(&self) -> DataExtraction {
        self.extraction
    }

    /// Number of columns in the result set. `0` for statements without one.
    pub fn columns(&self) -> usize {
        self.num_columns
    }

    /// `true` if executing the statement produces a result set.
    pub fn has_result_set(&self) -> bool {
        self.num_columns != 0
    }

    /// Buffer kind used for the column at the zero based `position`. Describes the column with
    /// the driver the first time it is asked for and no kind has been set explicitly.
    pub fn kind(
        &mut self,
        statement: &(impl Statement + ?Sized),
        position: usize,
    ) -> Result<BufferKind, Error> {
        self.check_position(position);
        if let Some(kind) = self.kinds[position] {
            return Ok(kind);
        }
        let description = describe_column(statement, position)?;
        let kind = BufferKind::from_data_type(description.data_type, self.max_field_size);
        self.kinds[position] = Some(kind);
        Ok(kind)
    }

    /// Use `kind` for the column at the zero based `position`.
    pub fn set_kind(&mut self, position: usize, kind: BufferKind) {
        self.check_position(position);
        self.kinds[position] = Some(kind);
    }

    /// Allocates a buffer for the column at the zero based `position` and binds it to
    /// `statement`.
    ///
    /// # Safety
    ///
    /// The buffer is owned by `self`. Columns must be unbound from `statement` before `self` is
    /// dropped, or `statement` must not be fetched from any more.
    pub unsafe fn bind_column(
        &mut self,
        statement: &mut (impl Statement + ?Sized),
        position: usize,
        kind: BufferKind,
    ) -> Result<(), Error> {
        self.set_kind(position, kind);
        let mut buffer = Box::new(ColumnBuffer::new(kind));
        let column_number = column_number(position);
        unsafe { statement.bind_col(column_number, &mut *buffer) }.into_result(&*statement)?;
        self.buffers[position] = Some(buffer);
        Ok(())
    }

    /// Buffer bound to the column at the zero based `position`, if any.
    pub fn buffer(&self, position: usize) -> Option<&ColumnBuffer> {
        self.buffers.get(position)?.as_deref()
    }

    /// Number of columns with a bound buffer.
    pub fn num_bound_columns(&self) -> usize {
        self.buffers.iter().flatten().count()
    }

    fn check_position(&self, position: usize) {
        assert!(
            position < self.num_columns,
            "Column position {position} is out of bounds. The result set has {} columns.",
            self.num_columns
        );
    }
}

/// One based ODBC column number for a zero based position.
pub(crate) fn column_number(position: usize) -> u16 {
    u16::try_from(position + 1).expect("ODBC supports at most u16::MAX columns.")
}

/// Describes the column at the zero based `position`.
pub fn describe_column(
    statement: &(impl Statement + ?Sized),
    position: usize,
) -> Result<ColumnDescription, Error> {
    let mut description = ColumnDescription::default();
    statement
        .describe_col(column_number(position), &mut description)
        .into_result(statement)?;
    Ok(description)
}
