use log::{debug, warn};

use crate::{
    Binder, Binding, Column, ColumnPreparer, DataExtraction, Error, Extraction, Extractor,
    ParameterBinding, Preparation,
    error::DiagnosticRecords,
    handles::{ColumnDescription, Record, SqlResult, State, Statement, log_diagnostics},
    preparation::describe_column,
    session::{AUTO_BIND, AUTO_EXTRACT, MAX_FIELD_SIZE, Session, check_max_field_size},
};

/// Upper bound for the number of calls to `SQLNativeSql` made by
/// [`StatementEngine::native_sql`]. A driver reporting the required length truthfully needs two.
pub const MAX_NATIVE_SQL_ATTEMPTS: usize = 8;

/// Position of the cursor of an executed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No cursor is open. State after compilation and `clear`.
    Closed,
    /// The statement has been executed, and no row is waiting to be extracted.
    Executed,
    /// A row has been fetched and waits to be extracted with `next`.
    RowReady,
    /// The last fetch reported that there are no more rows.
    Exhausted,
}

/// `true` if the diagnostics reported by a failing `SQLCloseCursor` mean no harm. This is the case
/// if every record reports "invalid cursor state" (SQLSTATE 24000), which some ODBC 3.x drivers
/// emit for statements which never opened a cursor.
pub fn is_benign_close_error(records: &[Record]) -> bool {
    !records.is_empty()
        && records
            .iter()
            .all(|record| record.state == State::INVALID_CURSOR_STATE)
}

/// State established by [`StatementEngine::compile`].
struct Compiled {
    preparation: Preparation,
    binder: Binder,
}

/// Drives the lifecycle of a single prepared statement: compilation, binding parameters,
/// execution, fetching rows and extracting their values.
///
/// ```no_run
/// use odbc_statement::{
///     Column, Extraction, OdbcSession, SessionOptions, StatementEngine, Use, Value,
///     create_environment,
/// };
///
/// let environment = unsafe { create_environment()? };
/// let session = OdbcSession::connect(&environment, "DSN=Books;", SessionOptions::default())?;
/// let mut engine = StatementEngine::new(&session)?;
///
/// let mut titles = Column::new();
/// engine.compile("SELECT title FROM books WHERE year > ?", &mut [&mut titles])?;
/// let mut year = Use::new([Value::I32(1970)]);
/// engine.execute(&mut [&mut year], &mut [&mut titles])?;
/// for title in titles.values() {
///     println!("{title}");
/// }
/// # Ok::<(), odbc_statement::Error>(())
/// ```
pub struct StatementEngine<'s, S: Session> {
    /// Declared before `compiled`, so the handle is freed before the buffers bound to it.
    statement: S::Statement,
    session: &'s S,
    sql: String,
    compiled: Option<Compiled>,
    descriptions: Vec<ColumnDescription>,
    /// Units created if the caller compiles a query without extraction units.
    synthesized: Vec<Column>,
    state: CursorState,
    is_benign_close_error: fn(&[Record]) -> bool,
}

impl<'s, S: Session> StatementEngine<'s, S> {
    /// Allocates a statement handle on `session`. Parameters are bound column wise if the
    /// session has `autoBind` set, otherwise a row array size of one is used.
    pub fn new(session: &'s S) -> Result<Self, Error> {
        let mut statement = session.allocate_statement()?;
        if session.feature(AUTO_BIND)? {
            statement
                .set_param_bind_by_column()
                .into_result(&statement)?;
        } else {
            statement.set_row_array_size(1).into_result(&statement)?;
        }
        Ok(Self {
            statement,
            session,
            sql: String::new(),
            compiled: None,
            descriptions: Vec::new(),
            synthesized: Vec::new(),
            state: CursorState::Closed,
            is_benign_close_error,
        })
    }

    /// Replaces the predicate deciding which failures of closing the cursor are swallowed by
    /// [`Self::clear`]. Default is [`is_benign_close_error`].
    pub fn set_benign_close_error(&mut self, predicate: fn(&[Record]) -> bool) {
        self.is_benign_close_error = predicate;
    }

    /// Closes any open cursor and prepares `sql` for execution.
    ///
    /// If the statement produces a result set and `extractions` is empty, one [`Column`] unit is
    /// created for each result column. Its values are available through [`Self::columns`]. In
    /// bound extraction mode, column buffers are bound for all units, so `extractions` must be
    /// the same units later passed to [`Self::next`].
    pub fn compile(
        &mut self,
        sql: &str,
        extractions: &mut [&mut dyn Extraction],
    ) -> Result<(), Error> {
        if sql.trim().is_empty() {
            return Err(Error::InvalidStatement {
                reason: "Empty statements are illegal.".to_owned(),
            });
        }

        let extraction = if self.session.feature(AUTO_EXTRACT)? {
            DataExtraction::Bound
        } else {
            DataExtraction::Manual
        };
        let max_field_size = check_max_field_size(self.session.property(MAX_FIELD_SIZE)?)?;
        let binding = if self.session.feature(AUTO_BIND)? {
            ParameterBinding::Immediate
        } else {
            ParameterBinding::AtExecution
        };

        self.clear()?;
        if self.compiled.is_some() {
            self.statement
                .unbind_cols()
                .into_result(&self.statement)?;
            self.statement
                .reset_parameters()
                .into_result(&self.statement)?;
            // Nothing is bound to the buffers of the last preparation any more.
            self.compiled = None;
        }
        self.descriptions.clear();
        self.synthesized.clear();
        self.sql = sql.to_owned();
        debug!("Compiling statement ({extraction:?}, {binding:?}): {sql}");

        let result = self.statement.prepare(sql);
        self.check_error(result, "SQLPrepare()")?;
        let preparation = Preparation::new(&self.statement, sql, max_field_size, extraction)?;
        let has_result_set = preparation.has_result_set();

        if has_result_set && extractions.is_empty() {
            self.fill_columns()?;
            self.synthesized = self
                .descriptions
                .iter()
                .map(|description| Column::from_description(description.clone(), max_field_size))
                .collect();
        }

        let compiled = self.compiled.insert(Compiled {
            preparation,
            binder: Binder::new(binding),
        });
        if extraction == DataExtraction::Bound && has_result_set {
            // Buffers are unbound before the preparation is replaced, and the statement is freed
            // before the preparation is dropped.
            let mut preparer =
                unsafe { ColumnPreparer::new(&mut self.statement, &mut compiled.preparation) };
            if extractions.is_empty() {
                prepare_all(
                    self.synthesized.iter().map(|unit| unit as &dyn Extraction),
                    &mut preparer,
                )?;
            } else {
                prepare_all(
                    extractions.iter().map(|unit| &**unit as &dyn Extraction),
                    &mut preparer,
                )?;
            }
        }
        Ok(())
    }

    /// `true` if there is at least one binding unit and the first one is ready to bind.
    pub fn can_bind(&self, bindings: &[&mut dyn Binding]) -> bool {
        bindings.first().is_some_and(|unit| unit.can_bind())
    }

    /// Closes any open cursor, binds the next row of each ready binding unit and executes the
    /// statement. Parameters bound at execution time are sent to the driver once it asks for them.
    ///
    /// # Panics
    ///
    /// If the parameters handled by the units do not add up to the number of parameter markers in
    /// the statement.
    pub fn bind_and_execute(&mut self, bindings: &mut [&mut dyn Binding]) -> Result<(), Error> {
        self.clear()?;
        let Some(Compiled { binder, .. }) = self.compiled.as_mut() else {
            return Err(self.misuse("Statement must be compiled before it is executed."));
        };

        let num_params = self.statement.num_params().into_result(&self.statement)?;
        binder.reset();
        let mut position = 0;
        for unit in bindings.iter_mut() {
            if !unit.can_bind() {
                break;
            }
            unit.bind(position, binder)?;
            position += unit.num_of_columns_handled();
        }
        assert_eq!(
            usize::from(num_params),
            position,
            "Binding units must handle every parameter of the statement."
        );
        binder.bind_to(&mut self.statement)?;

        debug!("Executing statement: {}", self.sql);
        match self.statement.execute() {
            SqlResult::NeedData => self.put_data()?,
            other => {
                self.check_error(other, "SQLExecute()")?;
            }
        }
        self.state = CursorState::Executed;
        Ok(())
    }

    /// Sends the values of parameters bound at execution time, until the driver does not ask for
    /// any more.
    fn put_data(&mut self) -> Result<(), Error> {
        loop {
            let result = self.statement.param_data();
            let Some(Some(token)) = self.check_error(result, "SQLParamData()")? else {
                return Ok(());
            };
            let Some((size, data)) = self.compiled.as_ref().and_then(|Compiled { binder, .. }| {
                Some((binder.data_size(token)?, binder.data(token)?))
            }) else {
                return Err(self.misuse("Driver asked for data of an unknown parameter."));
            };
            debug!("Sending {size} bytes of a parameter bound at execution time.");
            let result = self.statement.put_binary_batch(data);
            self.check_error(result, "SQLPutData()")?;
        }
    }

    /// Closes the cursor. Failures considered benign by [`is_benign_close_error`] (or the
    /// predicate set with [`Self::set_benign_close_error`]) are ignored.
    pub fn clear(&mut self) -> Result<(), Error> {
        let result = self.statement.close_cursor();
        self.state = CursorState::Closed;
        if result.is_err() {
            let records = Record::all_from(&self.statement);
            if (self.is_benign_close_error)(&records) {
                debug!(
                    "Ignoring error closing the cursor: {}",
                    DiagnosticRecords(records)
                );
                return Ok(());
            }
            return Err(self.statement_error("SQLCloseCursor()", records));
        }
        self.check_error(result, "SQLCloseCursor()")?;
        Ok(())
    }

    /// `true` if a row is ready to be extracted with [`Self::next`]. Fetches the next row, unless
    /// the previous call already did so and the row has not been extracted yet.
    pub fn has_next(&mut self) -> Result<bool, Error> {
        if !self.has_result_set() {
            return Ok(false);
        }
        match self.state {
            CursorState::RowReady => return Ok(true),
            CursorState::Exhausted => return Ok(false),
            CursorState::Closed | CursorState::Executed => (),
        }
        let result = self.statement.fetch();
        let has_row = self.check_error(result, "SQLFetch()")?.is_some();
        self.state = if has_row {
            CursorState::RowReady
        } else {
            CursorState::Exhausted
        };
        Ok(has_row)
    }

    /// Extracts the values of the current row. `extractions` must be the units passed to
    /// [`Self::compile`]. If these had been empty, the values end up in [`Self::columns`].
    ///
    /// # Panics
    ///
    /// If the columns handled by the extraction units do not add up to the number of result
    /// columns.
    pub fn next(&mut self, extractions: &mut [&mut dyn Extraction]) -> Result<(), Error> {
        let (CursorState::RowReady, Some(Compiled { preparation, .. })) =
            (self.state, self.compiled.as_mut())
        else {
            return Err(self.misuse("Iterator error: attempted to advance without a ready row."));
        };
        let columns_extracted: usize = if extractions.is_empty() {
            self.synthesized.len()
        } else {
            extractions
                .iter()
                .map(|unit| unit.num_of_columns_handled())
                .sum()
        };
        assert_eq!(
            preparation.columns(),
            columns_extracted,
            "Extraction units must handle every column of the result set."
        );

        let mut extractor = Extractor::new(&mut self.statement, preparation);
        if extractions.is_empty() {
            extract_all(
                self.synthesized
                    .iter_mut()
                    .map(|unit| unit as &mut dyn Extraction),
                &mut extractor,
            )?;
        } else {
            extract_all(
                extractions
                    .iter_mut()
                    .map(|unit| &mut **unit as &mut dyn Extraction),
                &mut extractor,
            )?;
        }
        self.state = CursorState::Executed;
        Ok(())
    }

    /// Executes the statement once for every row of the binding units and extracts all rows of
    /// the result sets. Returns the number of rows extracted.
    pub fn execute(
        &mut self,
        bindings: &mut [&mut dyn Binding],
        extractions: &mut [&mut dyn Extraction],
    ) -> Result<usize, Error> {
        let mut rows = 0;
        loop {
            self.bind_and_execute(bindings)?;
            while self.has_next()? {
                self.next(extractions)?;
                rows += 1;
            }
            if !self.can_bind(bindings) {
                break;
            }
        }
        Ok(rows)
    }

    /// The compiled SQL text translated by the driver into the dialect of the data source.
    ///
    /// The translation is requested with a buffer twice the size of the SQL text. If the driver
    /// reports a larger size, it is requested again with a buffer of exactly that size.
    pub fn native_sql(&self) -> Result<String, Error> {
        let mut buffer = vec![0; (self.sql.len() * 2).max(1)];
        for _ in 0..MAX_NATIVE_SQL_ATTEMPTS {
            let required = self
                .session
                .native_sql(&self.sql, &mut buffer)
                .into_connection_result(self.session)?;
            // Terminating zero
            if required < buffer.len() {
                buffer.truncate(required);
                return Ok(String::from_utf8_lossy(&buffer).into_owned());
            }
            buffer.resize(required + 1, 0);
        }
        Err(Error::Connection {
            function: "SQLNativeSql",
            diagnostics: DiagnosticRecords::default(),
        })
    }

    /// Maps `result` of the call described by `context` to an error. "No data" and "need data" are
    /// not considered errors and map to `Ok(None)`.
    pub fn check_error<T>(&self, result: SqlResult<T>, context: &str) -> Result<Option<T>, Error> {
        match result {
            SqlResult::Success(value) => Ok(Some(value)),
            SqlResult::SuccessWithInfo(value) => {
                log_diagnostics(&self.statement);
                Ok(Some(value))
            }
            SqlResult::NoData | SqlResult::NeedData => Ok(None),
            SqlResult::StillExecuting => panic!(
                "SqlResult must not be converted to result while the function is still executing."
            ),
            SqlResult::Error { .. } => {
                let records = Record::all_from(&self.statement);
                Err(self.statement_error(context, records))
            }
        }
    }

    /// Describes each column of the result set. The descriptions are available through
    /// [`Self::column_descriptions`].
    pub fn fill_columns(&mut self) -> Result<(), Error> {
        let count = self
            .statement
            .num_result_cols()
            .into_result(&self.statement)?;
        let count = usize::try_from(count).unwrap_or(0);
        self.descriptions = (0..count)
            .map(|position| describe_column(&self.statement, position))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    /// `true` if the compiled statement produces a result set.
    pub fn has_result_set(&self) -> bool {
        self.compiled
            .as_ref()
            .is_some_and(|compiled| compiled.preparation.has_result_set())
    }

    /// Units created by [`Self::compile`] for statements compiled without extraction units.
    pub fn columns(&self) -> &[Column] {
        &self.synthesized
    }

    /// Descriptions filled by [`Self::fill_columns`].
    pub fn column_descriptions(&self) -> &[ColumnDescription] {
        &self.descriptions
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// The SQL text passed to the last call of [`Self::compile`].
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Preparation of the last compiled statement.
    pub fn preparation(&self) -> Option<&Preparation> {
        self.compiled.as_ref().map(|compiled| &compiled.preparation)
    }

    /// Low level statement handle.
    pub fn statement(&self) -> &S::Statement {
        &self.statement
    }

    fn statement_error(&self, context: &str, records: Vec<Record>) -> Error {
        let native_sql = match self.native_sql() {
            Ok(native_sql) => Some(native_sql),
            Err(error) => {
                warn!("Could not translate statement into native SQL: {error}");
                None
            }
        };
        Error::Statement {
            context: context.to_owned(),
            requested_sql: self.sql.clone(),
            native_sql,
            diagnostics: DiagnosticRecords(records),
        }
    }

    fn misuse(&self, context: &str) -> Error {
        Error::Statement {
            context: context.to_owned(),
            requested_sql: self.sql.clone(),
            native_sql: None,
            diagnostics: DiagnosticRecords::default(),
        }
    }
}

fn prepare_all<'u>(
    units: impl Iterator<Item = &'u dyn Extraction>,
    preparer: &mut ColumnPreparer<'_>,
) -> Result<(), Error> {
    let mut position = 0;
    for unit in units {
        unit.prepare(position, preparer)?;
        position += unit.num_of_columns_handled();
    }
    Ok(())
}

fn extract_all<'u>(
    units: impl Iterator<Item = &'u mut dyn Extraction>,
    extractor: &mut Extractor<'_>,
) -> Result<(), Error> {
    let mut position = 0;
    for unit in units {
        unit.extract(position, extractor)?;
        position += unit.num_of_columns_handled();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::is_benign_close_error;
    use crate::handles::{Record, State};

    fn record(state: State) -> Record {
        Record {
            state,
            ..Record::default()
        }
    }

    #[test]
    fn invalid_cursor_state_is_benign() {
        assert!(is_benign_close_error(&[record(State::INVALID_CURSOR_STATE)]));
        assert!(is_benign_close_error(&[
            record(State::INVALID_CURSOR_STATE),
            record(State::INVALID_CURSOR_STATE)
        ]));
    }

    #[test]
    fn other_states_are_not_benign() {
        assert!(!is_benign_close_error(&[]));
        assert!(!is_benign_close_error(&[record(State::FUNCTION_SEQUENCE_ERROR)]));
        assert!(!is_benign_close_error(&[
            record(State::INVALID_CURSOR_STATE),
            record(State(*b"HY000"))
        ]));
        // Only an exact match counts
        assert!(!is_benign_close_error(&[record(State(*b"24001"))]));
    }
}
