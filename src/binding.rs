use crate::{Binder, Error, Value};

/// Supplies the values for a contiguous span of parameter markers of a statement.
///
/// The statement engine walks the binding units of a statement in order. Each unit receives the
/// zero based position of its first parameter, which is the sum of the spans of all units before
/// it.
pub trait Binding {
    /// Number of consecutive parameters this unit provides values for.
    fn num_of_columns_handled(&self) -> usize;

    /// `false` if the unit has no (further) values to bind. Units handling multiple rows use this
    /// to signal that execution should stop.
    fn can_bind(&self) -> bool;

    /// Hands the values of the next row to `binder`, starting at zero based `position`.
    fn bind(&mut self, position: usize, binder: &mut Binder) -> Result<(), Error>;

    /// Start over with the first row.
    fn reset(&mut self) {}
}

/// Binds one or more rows of values. Each row is bound for one execution of the statement.
///
/// ```
/// use odbc_statement::{Binding, Use, Value};
///
/// let mut ids = Use::rows(vec![vec![Value::I32(1)], vec![Value::I32(2)]]);
/// assert_eq!(1, ids.num_of_columns_handled());
/// assert!(ids.can_bind());
/// ```
#[derive(Debug, Clone)]
pub struct Use {
    rows: Vec<Vec<Value>>,
    columns: usize,
    next_row: usize,
}

impl Use {
    /// Binds a single row of values.
    pub fn new<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::rows(vec![values.into_iter().map(Into::into).collect()])
    }

    /// Binds multiple rows. Every row must contain the same number of values.
    ///
    /// # Panics
    ///
    /// If the rows do not all have the same length.
    pub fn rows(rows: Vec<Vec<Value>>) -> Self {
        let columns = rows.first().map(Vec::len).unwrap_or(0);
        assert!(
            rows.iter().all(|row| row.len() == columns),
            "All rows bound by `Use` must have the same number of values."
        );
        Self {
            rows,
            columns,
            next_row: 0,
        }
    }

    /// Number of rows, which have been handed to a binder so far.
    pub fn rows_bound(&self) -> usize {
        self.next_row
    }
}

impl Binding for Use {
    fn num_of_columns_handled(&self) -> usize {
        self.columns
    }

    fn can_bind(&self) -> bool {
        self.next_row < self.rows.len()
    }

    fn bind(&mut self, position: usize, binder: &mut Binder) -> Result<(), Error> {
        let row = self
            .rows
            .get(self.next_row)
            .expect("`Use::bind` must only be called if `can_bind` is true.");
        for (offset, value) in row.iter().enumerate() {
            binder.bind(position + offset, value.clone());
        }
        self.next_row += 1;
        Ok(())
    }

    fn reset(&mut self) {
        self.next_row = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::{Binding, Use};
    use crate::{Binder, ParameterBinding, Value};

    #[test]
    fn binds_rows_one_after_another() {
        let mut unit = Use::rows(vec![
            vec![Value::I32(1), Value::from("a")],
            vec![Value::I32(2), Value::from("b")],
        ]);
        let mut binder = Binder::new(ParameterBinding::Immediate);

        unit.bind(3, &mut binder).unwrap();
        assert_eq!(b"a", binder.parameter(4).unwrap().as_bytes());
        unit.bind(3, &mut binder).unwrap();
        assert_eq!(b"b", binder.parameter(4).unwrap().as_bytes());

        assert!(!unit.can_bind());
        assert_eq!(2, unit.rows_bound());

        unit.reset();
        assert!(unit.can_bind());
    }

    #[test]
    #[should_panic]
    fn rows_of_different_length() {
        Use::rows(vec![vec![Value::I32(1)], vec![]]);
    }

    #[test]
    fn empty_use_is_never_ready() {
        let unit = Use::rows(Vec::new());
        assert!(!unit.can_bind());
        assert_eq!(0, unit.num_of_columns_handled());
    }
}
