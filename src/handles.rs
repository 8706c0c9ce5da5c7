//! Provides basic abstraction over valid (i.e. allocated ODBC handles).
//!
//! Two decisions are already baked into this module:
//!
//! * Treat warnings by logging them with `log`.
//! * Use the narrow (UTF-8) variants of the ODBC API for statement text and diagnostics.

mod as_handle;
mod bind;
mod buffer;
mod column_description;
mod connection;
mod data_type;
mod diagnostics;
mod environment;
mod logging;
mod sql_result;
mod statement;

pub use {
    as_handle::AsHandle,
    bind::{CData, CDataMut, DelayedInput, HasDataType, InputParameter},
    column_description::{ColumnDescription, Nullability},
    connection::Connection,
    data_type::DataType,
    diagnostics::{DiagnosticResult, Diagnostics, Record, State},
    environment::Environment,
    logging::log_diagnostics,
    sql_result::{ExtSqlReturn, SqlResult},
    statement::{Statement, StatementImpl},
};

use odbc_sys::{Handle, HandleType, SQLFreeHandle, SqlReturn};
use std::thread::panicking;

/// Character type used in all string arguments passed to the ODBC driver manager.
pub type SqlChar = u8;

/// Helper function freeing a handle and panicking on errors. Yet if the drop is triggered during
/// another panic, the function will simply ignore errors from failed drops.
///
/// # Safety
///
/// `handle` must be a valid handle of type `handle_type` which is not used afterwards.
unsafe fn drop_handle(handle: Handle, handle_type: HandleType) {
    match unsafe { SQLFreeHandle(handle_type, handle) } {
        SqlReturn::SUCCESS => (),
        other => {
            // Avoid panicking, if we already have a panic. We don't want to mask the
            // original error.
            if !panicking() {
                panic!("Unexpected return value of SQLFreeHandle: {other:?}")
            }
        }
    }
}
