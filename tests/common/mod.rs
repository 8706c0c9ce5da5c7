//! Scripted in memory driver. Lets the tests decide what the "data source" reports and inspect
//! every call the statement engine makes.
#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    ffi::c_void,
    ptr::copy_nonoverlapping,
    rc::Rc,
};

use odbc_statement::{
    ColumnDescription, DataType, Error, Nullability, Session, SessionOptions, Value,
    handles::{
        CDataMut, DelayedInput, DiagnosticResult, Diagnostics, InputParameter, SqlChar,
        SqlResult, State, Statement,
    },
    sys::{CDataType, NULL_DATA, Pointer, len_data_at_exec},
};

/// Routes log output of the crate through the test harness.
pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A parameter as it has been bound to the mock statement.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundParameter {
    /// Value bound before execution. `None` for `NULL`.
    Immediate(Option<Vec<u8>>),
    /// Value announced for execution time.
    AtExecution { token: usize, length: usize },
}

/// Everything the mock driver knows and remembers.
pub struct Driver {
    pub options: SessionOptions,
    /// Result set shape. Empty for statements without a result set.
    pub columns: Vec<(String, DataType)>,
    pub rows: Vec<Vec<Value>>,
    pub num_params: u16,
    /// Translation returned by `SQLNativeSql`. `None` echoes the statement text.
    pub native_sql: Option<String>,
    /// A broken driver which always asks for a larger buffer than it got.
    pub native_sql_never_fits: bool,
    /// Forces `SQLCloseCursor` to fail with these states.
    pub close_cursor_failure: Option<Vec<State>>,
    /// Forces `SQLFetch` to fail with this state.
    pub fetch_failure: Option<State>,
    /// Forces `SQLFetch` to succeed with this warning.
    pub fetch_warning: Option<State>,
    /// Forces `SQLPrepare` to fail with this state.
    pub prepare_failure: Option<State>,
    /// Forces `SQLExecute` to fail with this state.
    pub execute_failure: Option<State>,
    /// Forces `SQLParamData` to fail with this state.
    pub param_data_failure: Option<State>,
    /// Forces `SQLPutData` to fail with this state.
    pub put_data_failure: Option<State>,

    /// Names of the ODBC functions called on the statement, in order.
    pub calls: Vec<&'static str>,
    pub native_sql_calls: usize,
    pub prepared: Option<String>,
    pub parameters: HashMap<u16, BoundParameter>,
    /// Token and bytes of each `SQLPutData` call.
    pub put_data: Vec<(usize, Vec<u8>)>,
    statement_diagnostics: Vec<(State, String)>,
    bound_columns: HashMap<u16, BoundColumn>,
    pending: VecDeque<usize>,
    current_token: Option<usize>,
    executed: bool,
    /// Index of the current row. `None` if no row has been fetched yet.
    row: Option<usize>,
    /// Bytes already retrieved using `SQLGetData` per column of the current row.
    get_data_offsets: HashMap<u16, usize>,
}

struct BoundColumn {
    cdata_type: CDataType,
    value: *mut c_void,
    buffer_length: isize,
    indicator: *mut isize,
}

impl Driver {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            columns: Vec::new(),
            rows: Vec::new(),
            num_params: 0,
            native_sql: None,
            native_sql_never_fits: false,
            close_cursor_failure: None,
            fetch_failure: None,
            fetch_warning: None,
            prepare_failure: None,
            execute_failure: None,
            param_data_failure: None,
            put_data_failure: None,
            calls: Vec::new(),
            native_sql_calls: 0,
            prepared: None,
            parameters: HashMap::new(),
            put_data: Vec::new(),
            statement_diagnostics: Vec::new(),
            bound_columns: HashMap::new(),
            pending: VecDeque::new(),
            current_token: None,
            executed: false,
            row: None,
            get_data_offsets: HashMap::new(),
        }
    }

    /// Result set returned by the next statement.
    pub fn with_result_set(
        mut self,
        columns: &[(&str, DataType)],
        rows: Vec<Vec<Value>>,
    ) -> Self {
        self.columns = columns
            .iter()
            .map(|(name, data_type)| (name.to_string(), *data_type))
            .collect();
        self.rows = rows;
        self
    }

    pub fn with_params(mut self, num_params: u16) -> Self {
        self.num_params = num_params;
        self
    }

    /// Number of times the statement function `name` has been called.
    pub fn count(&self, name: &str) -> usize {
        self.calls.iter().filter(|&&call| call == name).count()
    }

    pub fn num_bound_columns(&self) -> usize {
        self.bound_columns.len()
    }

    fn call(&mut self, name: &'static str) {
        self.calls.push(name);
        self.statement_diagnostics.clear();
    }

    fn fail<T>(&mut self, function: &'static str, state: State, message: &str) -> SqlResult<T> {
        self.statement_diagnostics.push((state, message.to_owned()));
        SqlResult::Error { function }
    }
}

/// Bytes of `value` in the representation of `cdata_type`. `None` for `NULL`.
pub fn encode(value: &Value, cdata_type: CDataType) -> Option<Vec<u8>> {
    let bytes = match (value, cdata_type) {
        (Value::Null, _) => return None,
        (value, CDataType::Bit) => vec![u8::from(value.as_i64().unwrap() != 0)],
        (value, CDataType::SLong) => (value.as_i64().unwrap() as i32).to_ne_bytes().to_vec(),
        (value, CDataType::SBigInt) => value.as_i64().unwrap().to_ne_bytes().to_vec(),
        (value, CDataType::Double) => value.as_f64().unwrap().to_ne_bytes().to_vec(),
        (Value::Binary(bytes), _) => bytes.clone(),
        (value, _) => value.to_string().into_bytes(),
    };
    Some(bytes)
}

fn is_fixed_size(cdata_type: CDataType) -> bool {
    matches!(
        cdata_type,
        CDataType::Bit | CDataType::SLong | CDataType::SBigInt | CDataType::Double
    )
}

/// Writes as much of `bytes` as fits into the buffer, like a driver would. Returns the number of
/// payload bytes written.
unsafe fn write(
    bytes: Option<&[u8]>,
    cdata_type: CDataType,
    value: *mut c_void,
    buffer_length: isize,
    indicator: *mut isize,
) -> usize {
    let Some(bytes) = bytes else {
        unsafe { *indicator = NULL_DATA };
        return 0;
    };
    let zeroes = if cdata_type == CDataType::Char { 1 } else { 0 };
    let capacity = if is_fixed_size(cdata_type) {
        bytes.len()
    } else {
        (buffer_length as usize).saturating_sub(zeroes)
    };
    let written = bytes.len().min(capacity);
    unsafe {
        copy_nonoverlapping(bytes.as_ptr(), value as *mut u8, written);
        if zeroes == 1 {
            *(value as *mut u8).add(written) = 0;
        }
        *indicator = bytes.len() as isize;
    }
    written
}

fn write_message(text: &str, buf: &mut [SqlChar], state: State) -> DiagnosticResult {
    let len = text.len().min(buf.len());
    buf[..len].copy_from_slice(&text.as_bytes()[..len]);
    DiagnosticResult {
        state,
        native_error: 0,
        text_length: text.len() as i16,
    }
}

pub type SharedDriver = Rc<RefCell<Driver>>;

pub struct MockSession {
    pub driver: SharedDriver,
}

impl MockSession {
    pub fn new(driver: Driver) -> Self {
        Self {
            driver: Rc::new(RefCell::new(driver)),
        }
    }

    pub fn driver(&self) -> std::cell::RefMut<'_, Driver> {
        self.driver.borrow_mut()
    }
}

impl Diagnostics for MockSession {
    fn diagnostic_record(
        &self,
        rec_number: i16,
        message_text: &mut [SqlChar],
    ) -> Option<DiagnosticResult> {
        let driver = self.driver.borrow();
        if driver.native_sql_never_fits && rec_number == 1 {
            Some(write_message(
                "String data, right truncated",
                message_text,
                State::STRING_DATA_RIGHT_TRUNCATION,
            ))
        } else {
            None
        }
    }
}

impl Session for MockSession {
    type Statement = MockStatement;

    fn allocate_statement(&self) -> Result<MockStatement, Error> {
        Ok(MockStatement {
            driver: self.driver.clone(),
        })
    }

    fn native_sql(&self, statement_text: &str, out: &mut [u8]) -> SqlResult<usize> {
        let mut driver = self.driver.borrow_mut();
        driver.native_sql_calls += 1;
        let native = driver
            .native_sql
            .clone()
            .unwrap_or_else(|| statement_text.to_owned());
        let written = native.len().min(out.len().saturating_sub(1));
        out[..written].copy_from_slice(&native.as_bytes()[..written]);
        if written < out.len() {
            out[written] = 0;
        }
        if driver.native_sql_never_fits {
            SqlResult::SuccessWithInfo(out.len() * 2)
        } else {
            SqlResult::Success(native.len())
        }
    }

    fn feature(&self, name: &str) -> Result<bool, Error> {
        self.driver.borrow().options.feature(name)
    }

    fn property(&self, name: &str) -> Result<usize, Error> {
        self.driver.borrow().options.property(name)
    }
}

pub struct MockStatement {
    driver: SharedDriver,
}

impl Diagnostics for MockStatement {
    fn diagnostic_record(
        &self,
        rec_number: i16,
        message_text: &mut [SqlChar],
    ) -> Option<DiagnosticResult> {
        let driver = self.driver.borrow();
        let index = usize::try_from(rec_number - 1).ok()?;
        let (state, message) = driver.statement_diagnostics.get(index)?;
        Some(write_message(message, message_text, *state))
    }
}

impl Statement for MockStatement {
    fn set_param_bind_by_column(&mut self) -> SqlResult<()> {
        self.driver.borrow_mut().call("SQLSetStmtAttr(ParamBindType)");
        SqlResult::Success(())
    }

    fn set_row_array_size(&mut self, size: usize) -> SqlResult<()> {
        assert_eq!(1, size);
        self.driver.borrow_mut().call("SQLSetStmtAttr(RowArraySize)");
        SqlResult::Success(())
    }

    fn prepare(&mut self, statement_text: &str) -> SqlResult<()> {
        let mut driver = self.driver.borrow_mut();
        driver.call("SQLPrepare");
        driver.executed = false;
        if let Some(state) = driver.prepare_failure {
            return driver.fail("SQLPrepare", state, "Syntax error or access violation");
        }
        driver.prepared = Some(statement_text.to_owned());
        SqlResult::Success(())
    }

    fn execute(&mut self) -> SqlResult<()> {
        let mut driver = self.driver.borrow_mut();
        driver.call("SQLExecute");
        if let Some(state) = driver.execute_failure {
            return driver.fail("SQLExecute", state, "Integrity constraint violation");
        }
        let mut deferred: Vec<(u16, usize)> = driver
            .parameters
            .iter()
            .filter_map(|(&number, parameter)| match parameter {
                BoundParameter::AtExecution { token, .. } => Some((number, *token)),
                BoundParameter::Immediate(_) => None,
            })
            .collect();
        deferred.sort();
        driver.row = None;
        if deferred.is_empty() {
            driver.executed = true;
            SqlResult::Success(())
        } else {
            driver.pending = deferred.into_iter().map(|(_, token)| token).collect();
            SqlResult::NeedData
        }
    }

    fn fetch(&mut self) -> SqlResult<()> {
        let mut driver = self.driver.borrow_mut();
        driver.call("SQLFetch");
        if let Some(state) = driver.fetch_failure {
            return driver.fail("SQLFetch", state, "Communication link failure");
        }
        if !driver.executed {
            return driver.fail(
                "SQLFetch",
                State::FUNCTION_SEQUENCE_ERROR,
                "Function sequence error",
            );
        }
        let next = driver.row.map_or(0, |row| row + 1);
        driver.row = Some(next);
        driver.get_data_offsets.clear();
        if next >= driver.rows.len() {
            return SqlResult::NoData;
        }
        for (&number, column) in &driver.bound_columns {
            let value = &driver.rows[next][usize::from(number) - 1];
            let bytes = encode(value, column.cdata_type);
            unsafe {
                write(
                    bytes.as_deref(),
                    column.cdata_type,
                    column.value,
                    column.buffer_length,
                    column.indicator,
                );
            }
        }
        if let Some(state) = driver.fetch_warning {
            driver
                .statement_diagnostics
                .push((state, "String data, right truncated".to_owned()));
            return SqlResult::SuccessWithInfo(());
        }
        SqlResult::Success(())
    }

    fn close_cursor(&mut self) -> SqlResult<()> {
        let mut driver = self.driver.borrow_mut();
        driver.call("SQLCloseCursor");
        if let Some(states) = driver.close_cursor_failure.clone() {
            for state in states {
                driver
                    .statement_diagnostics
                    .push((state, "Closing the cursor failed".to_owned()));
            }
            return SqlResult::Error {
                function: "SQLCloseCursor",
            };
        }
        let cursor_open = driver.executed && !driver.columns.is_empty();
        driver.executed = false;
        driver.row = None;
        if cursor_open {
            SqlResult::Success(())
        } else {
            // Like many ODBC 3.x drivers do for statements without an open cursor.
            driver.fail("SQLCloseCursor", State::INVALID_CURSOR_STATE, "Invalid cursor state")
        }
    }

    fn num_result_cols(&self) -> SqlResult<i16> {
        let driver = self.driver.borrow();
        SqlResult::Success(driver.columns.len() as i16)
    }

    fn num_params(&self) -> SqlResult<u16> {
        SqlResult::Success(self.driver.borrow().num_params)
    }

    fn describe_col(
        &self,
        column_number: u16,
        column_description: &mut ColumnDescription,
    ) -> SqlResult<()> {
        let driver = self.driver.borrow();
        let (name, data_type) = &driver.columns[usize::from(column_number) - 1];
        *column_description = ColumnDescription::new(name, *data_type, Nullability::Nullable);
        SqlResult::Success(())
    }

    unsafe fn bind_col(&mut self, column_number: u16, target: &mut dyn CDataMut) -> SqlResult<()> {
        let mut driver = self.driver.borrow_mut();
        driver.call("SQLBindCol");
        let column = BoundColumn {
            cdata_type: target.cdata_type(),
            value: target.mut_value_ptr(),
            buffer_length: target.buffer_length(),
            indicator: target.mut_indicator_ptr(),
        };
        driver.bound_columns.insert(column_number, column);
        SqlResult::Success(())
    }

    fn unbind_cols(&mut self) -> SqlResult<()> {
        let mut driver = self.driver.borrow_mut();
        driver.call("SQLFreeStmt(Unbind)");
        driver.bound_columns.clear();
        SqlResult::Success(())
    }

    unsafe fn bind_input_parameter(
        &mut self,
        parameter_number: u16,
        parameter: &dyn InputParameter,
    ) -> SqlResult<()> {
        let mut driver = self.driver.borrow_mut();
        driver.call("SQLBindParameter");
        let indicator = unsafe { *parameter.indicator_ptr() };
        let value = if indicator == NULL_DATA {
            None
        } else {
            let len = parameter.buffer_length() as usize;
            let mut bytes = vec![0; len];
            unsafe {
                copy_nonoverlapping(parameter.value_ptr() as *const u8, bytes.as_mut_ptr(), len)
            };
            Some(bytes)
        };
        driver
            .parameters
            .insert(parameter_number, BoundParameter::Immediate(value));
        SqlResult::Success(())
    }

    unsafe fn bind_delayed_input_parameter(
        &mut self,
        parameter_number: u16,
        parameter: &mut dyn DelayedInput,
    ) -> SqlResult<()> {
        let mut driver = self.driver.borrow_mut();
        driver.call("SQLBindParameter");
        let indicator = unsafe { *parameter.indicator_ptr() };
        let token = parameter.stream_ptr() as usize;
        let length = (len_data_at_exec(0) - indicator) as usize;
        driver
            .parameters
            .insert(parameter_number, BoundParameter::AtExecution { token, length });
        SqlResult::Success(())
    }

    fn reset_parameters(&mut self) -> SqlResult<()> {
        let mut driver = self.driver.borrow_mut();
        driver.call("SQLFreeStmt(ResetParams)");
        driver.parameters.clear();
        SqlResult::Success(())
    }

    fn param_data(&mut self) -> SqlResult<Option<Pointer>> {
        let mut driver = self.driver.borrow_mut();
        driver.call("SQLParamData");
        if let Some(state) = driver.param_data_failure {
            return driver.fail("SQLParamData", state, "Operation canceled");
        }
        match driver.pending.pop_front() {
            Some(token) => {
                driver.current_token = Some(token);
                SqlResult::Success(Some(token as Pointer))
            }
            None => {
                driver.current_token = None;
                driver.executed = true;
                SqlResult::Success(None)
            }
        }
    }

    fn put_binary_batch(&mut self, batch: &[u8]) -> SqlResult<()> {
        let mut driver = self.driver.borrow_mut();
        driver.call("SQLPutData");
        let Some(token) = driver.current_token else {
            return driver.fail(
                "SQLPutData",
                State::FUNCTION_SEQUENCE_ERROR,
                "No parameter pending",
            );
        };
        if let Some(state) = driver.put_data_failure {
            return driver.fail("SQLPutData", state, "String data, length mismatch");
        }
        driver.put_data.push((token, batch.to_vec()));
        SqlResult::Success(())
    }

    fn get_data(&mut self, col_or_param_num: u16, target: &mut dyn CDataMut) -> SqlResult<()> {
        let mut driver = self.driver.borrow_mut();
        driver.call("SQLGetData");
        let Some(row) = driver.row.filter(|&row| row < driver.rows.len()) else {
            return driver.fail("SQLGetData", State(*b"24000"), "Invalid cursor state");
        };
        let value = driver.rows[row][usize::from(col_or_param_num) - 1].clone();
        let cdata_type = target.cdata_type();
        let Some(bytes) = encode(&value, cdata_type) else {
            unsafe { *target.mut_indicator_ptr() = NULL_DATA };
            return SqlResult::Success(());
        };
        let offset = driver
            .get_data_offsets
            .get(&col_or_param_num)
            .copied()
            .unwrap_or(0);
        if offset != 0 && offset >= bytes.len() {
            return SqlResult::NoData;
        }
        let remaining = &bytes[offset..];
        let written = unsafe {
            write(
                Some(remaining),
                cdata_type,
                target.mut_value_ptr(),
                target.buffer_length(),
                target.mut_indicator_ptr(),
            )
        };
        let offset = if written == remaining.len() {
            // Complete. The next call reports no data.
            bytes.len().max(1)
        } else {
            offset + written
        };
        driver.get_data_offsets.insert(col_or_param_num, offset);
        if written < remaining.len() {
            driver.statement_diagnostics.push((
                State::STRING_DATA_RIGHT_TRUNCATION,
                "String data, right truncated".to_owned(),
            ));
            SqlResult::SuccessWithInfo(())
        } else {
            SqlResult::Success(())
        }
    }
}
