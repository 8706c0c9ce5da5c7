use super::{
    Environment, StatementImpl,
    as_handle::AsHandle,
    buffer::{buf_ptr, clamp_int, clamp_small_int, mut_buf_ptr},
    drop_handle,
    logging::log_diagnostics,
    sql_result::{ExtSqlReturn, SqlResult},
};
use log::warn;
use odbc_sys::{
    DriverConnectOption, HDbc, Handle, HandleType, SQLAllocHandle, SQLDisconnect,
    SQLDriverConnect, SQLNativeSql, SqlReturn,
};
use std::{ptr::null_mut, sync::Arc};

/// The connection handle references storage of all information about the connection to the data
/// source, including status, transaction state, and error information.
///
/// The connection is disconnected and freed once the last statement allocated from it is gone.
pub struct Connection {
    handle: HDbc,
    connected: bool,
    /// Keeps the environment alive as long as the connection exists.
    _parent: Arc<Environment>,
}

unsafe impl AsHandle for Connection {
    fn as_handle(&self) -> Handle {
        self.handle.as_handle()
    }

    fn handle_type(&self) -> HandleType {
        HandleType::Dbc
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.connected {
            match unsafe { SQLDisconnect(self.handle) } {
                SqlReturn::SUCCESS => (),
                SqlReturn::SUCCESS_WITH_INFO => log_diagnostics(self),
                other => warn!("Disconnecting from the data source failed: {other:?}"),
            }
        }
        unsafe {
            drop_handle(self.handle.as_handle(), HandleType::Dbc);
        }
    }
}

impl Connection {
    /// # Safety
    ///
    /// Call this method only with a valid (successfully allocated) ODBC connection handle.
    pub unsafe fn new(handle: HDbc, parent: Arc<Environment>) -> Self {
        Self {
            handle,
            connected: false,
            _parent: parent,
        }
    }

    /// Establishes a connection to a data source using a connection string, without prompting
    /// the user.
    pub fn connect_with_connection_string(&mut self, connection_string: &str) -> SqlResult<()> {
        let res = unsafe {
            SQLDriverConnect(
                self.handle,
                null_mut(),
                buf_ptr(connection_string.as_bytes()),
                clamp_small_int(connection_string.len()),
                null_mut(),
                0,
                null_mut(),
                DriverConnectOption::NoPrompt,
            )
        }
        .into_sql_result("SQLDriverConnect");
        if !res.is_err() {
            self.connected = true;
        }
        res
    }

    /// Allocate a new statement handle. The statement keeps the connection alive.
    pub fn allocate_statement(self: &Arc<Self>) -> SqlResult<StatementImpl> {
        let mut out = Handle::null();
        unsafe { SQLAllocHandle(HandleType::Stmt, self.as_handle(), &mut out) }
            .into_sql_result("SQLAllocHandle")
            .on_success(|| unsafe { StatementImpl::new(out.as_hstmt(), self.clone()) })
    }

    /// Asks the driver to translate `statement_text` into the SQL dialect of the data source. The
    /// translation is written into `out`, truncated if `out` is too small. The success value is
    /// the length of the complete translation, excluding the terminating zero.
    pub fn native_sql(&self, statement_text: &str, out: &mut [u8]) -> SqlResult<usize> {
        let mut actual_length = 0;
        unsafe {
            SQLNativeSql(
                self.handle,
                buf_ptr(statement_text.as_bytes()),
                clamp_int(statement_text.len()),
                mut_buf_ptr(out),
                clamp_int(out.len()),
                &mut actual_length,
            )
        }
        .into_sql_result("SQLNativeSql")
        .on_success(|| actual_length.try_into().unwrap_or(0))
    }
}
