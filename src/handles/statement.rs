use super::{
    Connection, DelayedInput, InputParameter,
    as_handle::AsHandle,
    bind::CDataMut,
    buffer::{buf_ptr, clamp_int, clamp_small_int, mut_buf_ptr},
    column_description::{ColumnDescription, Nullability},
    data_type::DataType,
    diagnostics::Diagnostics,
    drop_handle,
    sql_result::{ExtSqlReturn, SqlResult},
};
use odbc_sys::{
    FreeStmtOption, HStmt, Handle, HandleType, Len, ParamType, Pointer, SQLBindCol,
    SQLBindParameter, SQLCloseCursor, SQLDescribeCol, SQLExecute, SQLFetch, SQLFreeStmt,
    SQLGetData, SQLNumParams, SQLNumResultCols, SQLParamData, SQLPrepare, SQLPutData,
    SQLSetStmtAttr, SqlDataType, StatementAttribute,
};
use std::{ffi::c_void, ptr::null_mut, sync::Arc};

/// The ODBC calls the statement engine issues against a statement handle. Each call reports its
/// outcome as an [`SqlResult`], diagnostics are available through the [`Diagnostics`] super trait
/// until the next call.
///
/// [`StatementImpl`] is the implementation talking to an actual ODBC driver.
pub trait Statement: Diagnostics {
    /// Bind parameters column wise. Set for sessions binding parameters immediately.
    fn set_param_bind_by_column(&mut self) -> SqlResult<()>;

    /// Number of rows fetched with each call to `fetch`.
    fn set_row_array_size(&mut self, size: usize) -> SqlResult<()>;

    /// Send an SQL statement to the data source for preparation. The application can include one
    /// or more parameter markers (`?`) in the SQL statement.
    fn prepare(&mut self, statement_text: &str) -> SqlResult<()>;

    /// Executes a statement prepared by `prepare`. [`SqlResult::NeedData`] indicates that
    /// parameters bound at execution time must be supplied using `param_data` and
    /// `put_binary_batch`.
    fn execute(&mut self) -> SqlResult<()>;

    /// Advances the cursor to the next row. [`SqlResult::NoData`] indicates the end of the result
    /// set. Bound columns are filled with the values of the new row.
    fn fetch(&mut self) -> SqlResult<()>;

    /// Close an open cursor.
    fn close_cursor(&mut self) -> SqlResult<()>;

    /// Number of columns in result set. `0` for statements without a result set.
    fn num_result_cols(&self) -> SqlResult<i16>;

    /// Number of parameter markers in the prepared statement.
    fn num_params(&self) -> SqlResult<u16>;

    /// Fetch a column description using the column index.
    ///
    /// # Parameters
    ///
    /// * `column_number`: Column index. `0` is the bookmark column. The other column indices start
    ///   with `1`.
    /// * `column_description`: Holds the description of the column after the call. This method does
    ///   not provide strong exception safety as the value of this argument is undefined in case of
    ///   an error.
    fn describe_col(
        &self,
        column_number: u16,
        column_description: &mut ColumnDescription,
    ) -> SqlResult<()>;

    /// Binds an application buffer to a column of the result set. `fetch` writes into it.
    ///
    /// # Safety
    ///
    /// `target` must not be moved and must stay valid until the columns are unbound or the
    /// statement is dropped.
    unsafe fn bind_col(&mut self, column_number: u16, target: &mut dyn CDataMut) -> SqlResult<()>;

    /// Release all column buffers bound by `bind_col`.
    fn unbind_cols(&mut self) -> SqlResult<()>;

    /// Binds an input buffer to a parameter marker.
    ///
    /// # Safety
    ///
    /// `parameter` must not be moved and must stay valid until the statement is executed and the
    /// parameters are reset.
    unsafe fn bind_input_parameter(
        &mut self,
        parameter_number: u16,
        parameter: &dyn InputParameter,
    ) -> SqlResult<()>;

    /// Binds a parameter whose value is streamed to the data source at execution time.
    ///
    /// # Safety
    ///
    /// `parameter` must not be moved and must stay valid until the statement is executed and the
    /// parameters are reset.
    unsafe fn bind_delayed_input_parameter(
        &mut self,
        parameter_number: u16,
        parameter: &mut dyn DelayedInput,
    ) -> SqlResult<()>;

    /// Forget all parameter buffers bound to the statement.
    fn reset_parameters(&mut self) -> SqlResult<()>;

    /// Continues execution of a statement which returned [`SqlResult::NeedData`]. `Some` holds the
    /// stream pointer of the next parameter which needs data, `None` indicates that all data has
    /// been supplied and the statement has been executed.
    fn param_data(&mut self) -> SqlResult<Option<Pointer>>;

    /// Sends a batch of bytes for the parameter most recently returned by `param_data`.
    fn put_binary_batch(&mut self, batch: &[u8]) -> SqlResult<()>;

    /// Retrieves data for a single column of the current row.
    fn get_data(&mut self, col_or_param_num: u16, target: &mut dyn CDataMut) -> SqlResult<()>;
}

/// Wraps a valid (i.e. successfully allocated) ODBC statement handle. Keeps the connection it has
/// been allocated from alive.
pub struct StatementImpl {
    handle: HStmt,
    /// We do not do anything with the parent, besides keeping it alive.
    _parent: Arc<Connection>,
}

unsafe impl AsHandle for StatementImpl {
    fn as_handle(&self) -> Handle {
        self.handle.as_handle()
    }

    fn handle_type(&self) -> HandleType {
        HandleType::Stmt
    }
}

impl Drop for StatementImpl {
    fn drop(&mut self) {
        unsafe {
            drop_handle(self.handle.as_handle(), HandleType::Stmt);
        }
    }
}

impl StatementImpl {
    /// # Safety
    ///
    /// `handle` must be a valid (successfully allocated) statement handle of `parent`.
    pub unsafe fn new(handle: HStmt, parent: Arc<Connection>) -> Self {
        Self {
            handle,
            _parent: parent,
        }
    }

    /// The raw underlying statement handle.
    pub fn as_sys(&self) -> HStmt {
        self.handle
    }
}

impl Statement for StatementImpl {
    fn set_param_bind_by_column(&mut self) -> SqlResult<()> {
        // SQL_PARAM_BIND_BY_COLUMN
        let by_column: usize = 0;
        unsafe {
            SQLSetStmtAttr(
                self.handle,
                StatementAttribute::ParamBindType,
                by_column as Pointer,
                0,
            )
        }
        .into_sql_result("SQLSetStmtAttr")
    }

    fn set_row_array_size(&mut self, size: usize) -> SqlResult<()> {
        assert!(size > 0);
        unsafe {
            SQLSetStmtAttr(
                self.handle,
                StatementAttribute::RowArraySize,
                size as Pointer,
                0,
            )
        }
        .into_sql_result("SQLSetStmtAttr")
    }

    fn prepare(&mut self, statement_text: &str) -> SqlResult<()> {
        unsafe {
            SQLPrepare(
                self.handle,
                buf_ptr(statement_text.as_bytes()),
                clamp_int(statement_text.len()),
            )
        }
        .into_sql_result("SQLPrepare")
    }

    fn execute(&mut self) -> SqlResult<()> {
        unsafe { SQLExecute(self.handle) }.into_sql_result("SQLExecute")
    }

    fn fetch(&mut self) -> SqlResult<()> {
        unsafe { SQLFetch(self.handle) }.into_sql_result("SQLFetch")
    }

    fn close_cursor(&mut self) -> SqlResult<()> {
        unsafe { SQLCloseCursor(self.handle) }.into_sql_result("SQLCloseCursor")
    }

    fn num_result_cols(&self) -> SqlResult<i16> {
        let mut out: i16 = 0;
        unsafe { SQLNumResultCols(self.handle, &mut out) }
            .into_sql_result("SQLNumResultCols")
            .on_success(|| out)
    }

    fn num_params(&self) -> SqlResult<u16> {
        let mut out: i16 = 0;
        unsafe { SQLNumParams(self.handle, &mut out) }
            .into_sql_result("SQLNumParams")
            .on_success(|| out.try_into().unwrap_or(0))
    }

    fn describe_col(
        &self,
        column_number: u16,
        column_description: &mut ColumnDescription,
    ) -> SqlResult<()> {
        let name = &mut column_description.name;
        // Use maximum available capacity.
        name.resize(name.capacity(), 0);
        let mut name_length: i16 = 0;
        let mut data_type = SqlDataType::UNKNOWN_TYPE;
        let mut column_size = 0;
        let mut decimal_digits = 0;
        let mut nullable = odbc_sys::Nullability::UNKNOWN;

        let res = unsafe {
            SQLDescribeCol(
                self.handle,
                column_number,
                mut_buf_ptr(name),
                clamp_small_int(name.len()),
                &mut name_length,
                &mut data_type,
                &mut column_size,
                &mut decimal_digits,
                &mut nullable,
            )
            .into_sql_result("SQLDescribeCol")
        };

        if res.is_err() {
            return res;
        }

        column_description.nullability = Nullability::new(nullable);

        if name_length + 1 > clamp_small_int(name.len()) {
            // Buffer is to small to hold name, retry with larger buffer
            name.resize(name_length as usize + 1, 0);
            self.describe_col(column_number, column_description)
        } else {
            name.resize(name_length as usize, 0);
            column_description.data_type = DataType::new(data_type, column_size, decimal_digits);
            res
        }
    }

    unsafe fn bind_col(&mut self, column_number: u16, target: &mut dyn CDataMut) -> SqlResult<()> {
        unsafe {
            SQLBindCol(
                self.handle,
                column_number,
                target.cdata_type(),
                target.mut_value_ptr(),
                target.buffer_length(),
                target.mut_indicator_ptr(),
            )
        }
        .into_sql_result("SQLBindCol")
    }

    fn unbind_cols(&mut self) -> SqlResult<()> {
        unsafe { SQLFreeStmt(self.handle, FreeStmtOption::Unbind) }.into_sql_result("SQLFreeStmt")
    }

    unsafe fn bind_input_parameter(
        &mut self,
        parameter_number: u16,
        parameter: &dyn InputParameter,
    ) -> SqlResult<()> {
        let data_type = parameter.data_type();
        unsafe {
            SQLBindParameter(
                self.handle,
                parameter_number,
                ParamType::Input,
                parameter.cdata_type(),
                data_type.data_type(),
                data_type.column_size(),
                data_type.decimal_digits(),
                // We cast const to mut here, but we specify the input_output_type as input.
                parameter.value_ptr() as *mut c_void,
                parameter.buffer_length(),
                // We cast const to mut here, but we specify the input_output_type as input.
                parameter.indicator_ptr() as *mut isize,
            )
        }
        .into_sql_result("SQLBindParameter")
    }

    unsafe fn bind_delayed_input_parameter(
        &mut self,
        parameter_number: u16,
        parameter: &mut dyn DelayedInput,
    ) -> SqlResult<()> {
        let data_type = parameter.data_type();
        let parameter_type = data_type.data_type();
        let paramater_value_ptr = parameter.stream_ptr();
        unsafe {
            SQLBindParameter(
                self.handle,
                parameter_number,
                ParamType::Input,
                parameter.cdata_type(),
                parameter_type,
                data_type.column_size(),
                data_type.decimal_digits(),
                paramater_value_ptr,
                0,
                // We cast const to mut here, but we specify the input_output_type as input.
                parameter.indicator_ptr() as *mut isize,
            )
        }
        .into_sql_result("SQLBindParameter")
    }

    fn reset_parameters(&mut self) -> SqlResult<()> {
        unsafe { SQLFreeStmt(self.handle, FreeStmtOption::ResetParams) }
            .into_sql_result("SQLFreeStmt")
    }

    fn param_data(&mut self) -> SqlResult<Option<Pointer>> {
        let mut param_id: Pointer = null_mut();
        match unsafe { SQLParamData(self.handle, &mut param_id as *mut Pointer) }
            .into_sql_result("SQLParamData")
        {
            SqlResult::NeedData => SqlResult::Success(Some(param_id)),
            other => other.on_success(|| None),
        }
    }

    fn put_binary_batch(&mut self, batch: &[u8]) -> SqlResult<()> {
        // Slices never exceed `isize::MAX` bytes.
        let len = batch.len() as Len;
        unsafe { SQLPutData(self.handle, batch.as_ptr() as Pointer, len) }
            .into_sql_result("SQLPutData")
    }

    fn get_data(&mut self, col_or_param_num: u16, target: &mut dyn CDataMut) -> SqlResult<()> {
        unsafe {
            SQLGetData(
                self.handle,
                col_or_param_num,
                target.cdata_type(),
                target.mut_value_ptr(),
                target.buffer_length(),
                target.mut_indicator_ptr(),
            )
        }
        .into_sql_result("SQLGetData")
    }
}
