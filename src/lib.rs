//! # odbc-statement
//!
//! Executes prepared SQL statements through ODBC (Open Database Connectivity). A
//! [`StatementEngine`] manages the lifecycle of a single statement on a [`Session`]: preparing the
//! SQL text, binding parameters, executing, fetching rows and extracting their values.
//!
//! Parameters are supplied by [`Binding`] units, result columns are consumed by [`Extraction`]
//! units. Each unit handles a contiguous span of parameters or columns. Session features decide
//! how values travel to and from the driver:
//!
//! * `autoBind` binds parameter values before execution. Without it parameter values are streamed
//!   to the driver at execution time.
//! * `autoExtract` binds column buffers before fetching. Without it each value is retrieved
//!   explicitly using `SQLGetData`.
//! * `maxFieldSize` bounds the size of buffers for variable sized columns.
//!
//! Errors reported by the driver are translated into [`Error`]. Warnings are logged using the
//! `log` crate.

mod binder;
mod binding;
mod conversion;
mod error;
mod extraction;
mod extractor;
mod preparation;
mod session;
mod statement;
mod value;

pub mod buffers;
pub mod handles;

pub use self::{
    binder::{Binder, ParameterBinding, ParameterBuffer},
    binding::{Binding, Use},
    conversion::decimal_text_to_i64,
    error::{DiagnosticRecords, Error},
    extraction::{Column, ColumnPreparer, Extraction, Rows},
    extractor::Extractor,
    handles::{ColumnDescription, DataType, Nullability},
    preparation::{DataExtraction, Preparation},
    session::{
        AUTO_BIND, AUTO_EXTRACT, MAX_FIELD_SIZE, OdbcSession, Session, SessionOptions,
        create_environment,
    },
    statement::{CursorState, MAX_NATIVE_SQL_ATTEMPTS, StatementEngine, is_benign_close_error},
    value::Value,
};

// Reexports
/// Reexports `odbc-sys` as sys to enable applications to always use the same version as this crate.
pub use odbc_sys as sys;
