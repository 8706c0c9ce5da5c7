use crate::{
    Error, Value,
    buffers::{BufferKind, ColumnBuffer, Indicator},
    handles::{ColumnDescription, Statement},
    preparation::{DataExtraction, Preparation, column_number, describe_column},
};

/// Reads the values of the current row. Handed to [`crate::Extraction::extract`] by the statement
/// engine after each successful fetch.
pub struct Extractor<'a> {
    statement: &'a mut dyn Statement,
    preparation: &'a mut Preparation,
}

impl<'a> Extractor<'a> {
    pub(crate) fn new(statement: &'a mut dyn Statement, preparation: &'a mut Preparation) -> Self {
        Self {
            statement,
            preparation,
        }
    }

    /// Number of columns in the result set.
    pub fn columns(&self) -> usize {
        self.preparation.columns()
    }

    pub fn extraction(&self) -> DataExtraction {
        self.preparation.extraction()
    }

    /// Asks the driver to describe the column at zero based `position`.
    pub fn describe(&self, position: usize) -> Result<ColumnDescription, Error> {
        describe_column(&*self.statement, position)
    }

    /// Value of the column at zero based `position` in the current row.
    ///
    /// In [`DataExtraction::Bound`] mode the value is read from the buffer filled by the last
    /// fetch. Columns without a bound buffer, as well as all columns in
    /// [`DataExtraction::Manual`] mode, are retrieved using `SQLGetData`. Each column must only be
    /// retrieved once per row in this case.
    ///
    /// `kind` overrides the buffer derived from the column description.
    pub fn value(&mut self, position: usize, kind: Option<BufferKind>) -> Result<Value, Error> {
        if self.preparation.extraction() == DataExtraction::Bound {
            if let Some(buffer) = self.preparation.buffer(position) {
                return buffer.value(position);
            }
        }
        let kind = match kind {
            Some(kind) => kind,
            None => self.preparation.kind(&*self.statement, position)?,
        };
        if kind.is_variadic() {
            self.get_variadic(position, kind)
        } else {
            let mut target = ColumnBuffer::new(kind);
            self.statement
                .get_data(column_number(position), &mut target)
                .into_result(&*self.statement)?;
            target.value(position)
        }
    }

    /// Fetches a variable sized value in one or more parts.
    fn get_variadic(&mut self, position: usize, kind: BufferKind) -> Result<Value, Error> {
        let column_number = column_number(position);
        // Part of the buffer which holds payload. The remainder holds the terminating zero.
        let capacity = kind.element_size() - kind.terminating_zeroes();
        assert!(capacity > 0, "Buffer for variadic columns must not be empty.");
        let mut part = ColumnBuffer::new(kind);
        let mut payload = Vec::new();
        loop {
            let fetched = self
                .statement
                .get_data(column_number, &mut part)
                .into_result_option(&*self.statement)?;
            // `None` signals that all the data has been retrieved by earlier calls.
            if fetched.is_none() {
                break;
            }
            match part.indicator() {
                Indicator::Null => return Ok(Value::Null),
                Indicator::Length(len) if len <= capacity => {
                    payload.extend_from_slice(&part.as_bytes()[..len]);
                    break;
                }
                // Truncated. Keep what we got and ask for the rest.
                Indicator::Length(_) | Indicator::NoTotal => {
                    payload.extend_from_slice(&part.as_bytes()[..capacity]);
                }
            }
        }
        Ok(kind.to_value(&payload))
    }
}
