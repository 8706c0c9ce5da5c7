use std::fmt;

use thiserror::Error as ThisError;

use crate::handles::{Diagnostics, Record as DiagnosticRecord, SqlResult, log_diagnostics};

/// Diagnostic records attached to an [`Error::Statement`] or [`Error::Connection`]. Displays one
/// record per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticRecords(pub Vec<DiagnosticRecord>);

impl DiagnosticRecords {
    /// `true` if the driver did not leave any diagnostic record.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the individual records.
    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticRecord> {
        self.0.iter()
    }
}

impl fmt::Display for DiagnosticRecords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "No diagnostic records available.");
        }
        for (index, record) in self.0.iter().enumerate() {
            if index != 0 {
                writeln!(f)?;
            }
            write!(f, "{record}")?;
        }
        Ok(())
    }
}

#[derive(Debug, ThisError)]
/// Error type used by the statement engine and the low level ODBC wrappers.
pub enum Error {
    /// The SQL text handed to [`crate::StatementEngine::compile`] can not be prepared. No driver
    /// call has been made.
    #[error("Invalid SQL statement: {reason}")]
    InvalidStatement {
        /// Human readable description of what is wrong with the statement text.
        reason: String,
    },
    /// A step of the statement lifecycle failed. Carries the SQL text as requested by the
    /// application and, if the driver could provide it, the SQL text the driver would actually
    /// send to the data source.
    #[error(
        "{context}\nRequested SQL statement: {requested_sql}\nNative SQL statement: {}\n\
        {diagnostics}",
        native_sql.as_deref().unwrap_or("<unavailable>")
    )]
    Statement {
        /// Operation which failed, e.g. `SQLExecute()`.
        context: String,
        /// SQL text passed to `compile`.
        requested_sql: String,
        /// SQL text translated by the driver. `None` if the translation itself failed.
        native_sql: Option<String>,
        /// Diagnostic records fetched from the statement handle.
        diagnostics: DiagnosticRecords,
    },
    /// A call against the connection handle failed.
    #[error("ODBC emitted an error calling '{function}' on the connection:\n{diagnostics}")]
    Connection {
        /// ODBC API call which failed.
        function: &'static str,
        /// Diagnostic records fetched from the connection handle.
        diagnostics: DiagnosticRecords,
    },
    /// Allocating the environment itself fails. Further diagnostics are not available, as they
    /// would be retrieved using the envirorment handle. Exclusively emitted by
    /// [`crate::OdbcSession::connect`].
    #[error("Failed to allocate ODBC Environment.")]
    FailedAllocatingEnvironment,
    /// This should never happen, given that ODBC driver manager and ODBC driver do not have any
    /// Bugs. Since we may link vs a bunch of these, better to be on the safe side.
    #[error(
        "No Diagnostics available. The ODBC function call to {} returned an error. Sadly neither \
        the ODBC driver manager, nor the driver were polite enough to leave a diagnostic record \
        specifying what exactly went wrong.",
        function
    )]
    NoDiagnostics {
        /// ODBC API call which returned error without producing a diagnostic record.
        function: &'static str,
    },
    /// SQL Error had been returned by a low level ODBC function call. A Diagnostic record is
    /// obtained and associated with this error.
    #[error("ODBC emitted an error calling '{function}':\n{record}")]
    Diagnostics {
        /// Diagnostic record returned by the ODBC driver manager
        record: DiagnosticRecord,
        /// ODBC API call which produced the diagnostic record
        function: &'static str,
    },
    /// The session has been asked for a feature or property it does not know.
    #[error("Unknown session feature or property: '{name}'")]
    UnknownSessionSetting {
        /// Name which has been asked for.
        name: String,
    },
    /// A session property has been set to a value it can not take.
    #[error("Invalid value for session property '{name}': {value}")]
    InvalidSessionSetting { name: String, value: usize },
    #[error(
        "A value (at least one) is too large to be written into the allocated buffer without \
        truncation. Size in bytes indicated by ODBC driver: {indicator:?}"
    )]
    TooLargeValueForBuffer {
        /// Length of the complete value in bytes as reported by the ODBC driver. If the length is
        /// not known, this is `None`.
        indicator: Option<usize>,
        /// Index of the buffer in which the truncation occurred.
        buffer_index: usize,
    },
}

impl Error {
    /// `true` for [`Error::Statement`].
    pub fn is_statement_error(&self) -> bool {
        matches!(self, Error::Statement { .. })
    }
}

// Define that here rather than in `sql_result` mod to keep the `handles` module entirely agnostic
// about the top level `Error` type.
impl<T> SqlResult<T> {
    /// [`Self::Success`] and [`Self::SuccessWithInfo`] are mapped to Ok. In case of
    /// [`Self::SuccessWithInfo`] any diagnostics are logged. [`Self::Error`] is mapped to error.
    pub fn into_result(self, handle: &(impl Diagnostics + ?Sized)) -> Result<T, Error> {
        self.into_result_with(handle, None, None)
    }

    /// Like [`Self::into_result`], but [`SqlResult::NoData`] is mapped to `None`, and any success
    /// is mapped to `Some`.
    pub fn into_result_option(
        self,
        handle: &(impl Diagnostics + ?Sized),
    ) -> Result<Option<T>, Error> {
        self.map(Some).into_result_with(handle, Some(None), None)
    }

    /// Most flexible way of converting an `SqlResult` to an idiomatic `Result`.
    ///
    /// # Parameters
    ///
    /// * `handle`: This handle is used to extract diagnostics in case `self` is
    ///   [`SqlResult::SuccessWithInfo`] or [`SqlResult::Error`].
    /// * `no_data`: Controls the behaviour for [`SqlResult::NoData`]. `None` indicates that the
    ///   result is never expected to be [`SqlResult::NoData`] and would panic in that case.
    ///   `Some(value)` would cause [`SqlResult::NoData`] to be mapped to `Ok(value)`.
    /// * `need_data`: Controls the behaviour for [`SqlResult::NeedData`]. `None` indicates that the
    ///   result is never expected to be [`SqlResult::NeedData`] and would panic in that case.
    ///   `Some(value)` would cause [`SqlResult::NeedData`] to be mapped to `Ok(value)`.
    pub fn into_result_with(
        self,
        handle: &(impl Diagnostics + ?Sized),
        no_data: Option<T>,
        need_data: Option<T>,
    ) -> Result<T, Error> {
        match self {
            // The function has been executed successfully. Holds result.
            SqlResult::Success(value) => Ok(value),
            // The function has been executed successfully. There have been warnings. Holds result.
            SqlResult::SuccessWithInfo(value) => {
                log_diagnostics(handle);
                Ok(value)
            }
            SqlResult::Error { function } => {
                let mut record = DiagnosticRecord::with_capacity(512);
                if record.fill_from(handle, 1) {
                    log_diagnostics(handle);
                    Err(Error::Diagnostics { record, function })
                } else {
                    // Anecdotal ways to reach this code paths:
                    //
                    // * Specifying invalid drivers (e.g. missing .so the driver itself depends on)
                    Err(Error::NoDiagnostics { function })
                }
            }
            SqlResult::NoData => {
                Ok(no_data.expect("Unexepcted SQL_NO_DATA returned by ODBC function"))
            }
            SqlResult::NeedData => {
                Ok(need_data.expect("Unexepcted SQL_NEED_DATA returned by ODBC function"))
            }
            SqlResult::StillExecuting => panic!(
                "SqlResult must not be converted to result while the function is still executing."
            ),
        }
    }

    /// Like [`Self::into_result`], but failures are reported as [`Error::Connection`] carrying
    /// every diagnostic record of `handle`.
    pub fn into_connection_result(
        self,
        handle: &(impl Diagnostics + ?Sized),
    ) -> Result<T, Error> {
        match self {
            SqlResult::Error { function } => Err(Error::Connection {
                function,
                diagnostics: DiagnosticRecords(DiagnosticRecord::all_from(handle)),
            }),
            other => other.into_result(handle),
        }
    }
}
