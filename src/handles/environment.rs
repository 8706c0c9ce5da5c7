use super::{
    Connection, as_handle::AsHandle, drop_handle, logging::log_diagnostics,
    sql_result::{ExtSqlReturn, SqlResult},
};
use log::debug;
use odbc_sys::{
    AttrOdbcVersion, EnvironmentAttribute, HEnv, Handle, HandleType, SQLAllocHandle,
    SQLSetEnvAttr, SqlReturn,
};
use std::sync::Arc;

/// An `Environment` is a global context, in which to access data.
///
/// Associated with an `Environment` is any information that is global in nature, such as:
///
/// * The `Environment`'s state
/// * The current environment-level diagnostics
/// * The handles of connections currently allocated on the environment
/// * The current stetting of each environment attribute
#[derive(Debug)]
pub struct Environment {
    /// Invariant: Should always point to a valid ODBC Environment
    handle: HEnv,
}

/// See: <https://docs.microsoft.com/en-us/sql/odbc/reference/develop-app/multithreading>
unsafe impl Send for Environment {}
/// See: <https://docs.microsoft.com/en-us/sql/odbc/reference/develop-app/multithreading>
unsafe impl Sync for Environment {}

unsafe impl AsHandle for Environment {
    fn as_handle(&self) -> Handle {
        self.handle.as_handle()
    }

    fn handle_type(&self) -> HandleType {
        HandleType::Env
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        unsafe {
            drop_handle(self.handle.as_handle(), HandleType::Env);
        }
    }
}

impl Environment {
    /// An allocated ODBC Environment handle. `None` if the driver manager could not allocate it.
    /// Diagnostics are not available in that case, since they would be retrieved using the
    /// environment handle itself.
    ///
    /// # Safety
    ///
    /// There may only be one Odbc environment in any process at any time. Take care using this
    /// function in unit tests, as these run in parallel by default in Rust.
    pub unsafe fn new() -> Option<Self> {
        let mut handle = Handle::null();
        let info = match unsafe { SQLAllocHandle(HandleType::Env, Handle::null(), &mut handle) } {
            SqlReturn::SUCCESS => false,
            SqlReturn::SUCCESS_WITH_INFO => true,
            SqlReturn::ERROR => return None,
            other => panic!("Unexpected Return value for allocating ODBC Environment: {other:?}"),
        };

        debug!("ODBC Environment created.");

        let env = Environment {
            handle: handle.as_henv(),
        };
        if info {
            log_diagnostics(&env);
        }
        Some(env)
    }

    /// Declares which Version of the ODBC API we want to use. This is the first thing that should
    /// be done with any ODBC environment.
    pub fn declare_version(&self, version: AttrOdbcVersion) -> SqlResult<()> {
        unsafe {
            SQLSetEnvAttr(
                self.handle,
                EnvironmentAttribute::OdbcVersion,
                version.into(),
                0,
            )
        }
        .into_sql_result("SQLSetEnvAttr")
    }

    /// Allocate a new connection handle. The connection keeps the environment alive.
    pub fn allocate_connection(self: &Arc<Self>) -> SqlResult<Connection> {
        let mut handle = Handle::null();
        unsafe { SQLAllocHandle(HandleType::Dbc, self.as_handle(), &mut handle) }
            .into_sql_result("SQLAllocHandle")
            .on_success(|| unsafe { Connection::new(handle.as_hdbc(), self.clone()) })
    }
}
