use std::sync::Arc;

use odbc_sys::AttrOdbcVersion;

use crate::{
    Error,
    handles::{self, AsHandle, Connection, Environment, SqlResult, StatementImpl},
};

/// Name of the feature selecting [`crate::ParameterBinding::Immediate`] if set, or
/// [`crate::ParameterBinding::AtExecution`] otherwise.
pub const AUTO_BIND: &str = "autoBind";
/// Name of the feature selecting [`crate::DataExtraction::Bound`] if set, or
/// [`crate::DataExtraction::Manual`] otherwise.
pub const AUTO_EXTRACT: &str = "autoExtract";
/// Name of the property bounding the size of variable sized column buffers in bytes.
pub const MAX_FIELD_SIZE: &str = "maxFieldSize";

/// The connection a [`crate::StatementEngine`] executes its statement on.
///
/// Diagnostics reported by [`Self::native_sql`] are retrieved using the [`handles::Diagnostics`]
/// super trait.
pub trait Session: handles::Diagnostics {
    /// Statement handle allocated on this session.
    type Statement: handles::Statement + 'static;

    /// Allocates a new statement handle.
    fn allocate_statement(&self) -> Result<Self::Statement, Error>;

    /// Asks the driver to translate `statement_text` into the SQL dialect of the data source. The
    /// translation is written into `out` and truncated if `out` is too small. Returns the length
    /// of the complete translation in bytes, excluding the terminating zero.
    fn native_sql(&self, statement_text: &str, out: &mut [u8]) -> SqlResult<usize>;

    /// Value of the named boolean feature. Known features are [`AUTO_BIND`] and
    /// [`AUTO_EXTRACT`].
    fn feature(&self, name: &str) -> Result<bool, Error>;

    /// Value of the named property. The known property is [`MAX_FIELD_SIZE`].
    fn property(&self, name: &str) -> Result<usize, Error>;
}

/// Features and properties of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Bind parameter values before execution, rather than streaming them at execution time.
    pub auto_bind: bool,
    /// Bind column buffers before fetching, rather than retrieving each value with `SQLGetData`.
    pub auto_extract: bool,
    /// Upper bound for the size of variable sized column buffers in bytes.
    pub max_field_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            auto_bind: true,
            auto_extract: true,
            max_field_size: 1024,
        }
    }
}

impl SessionOptions {
    /// Value of a feature addressed by name.
    pub fn feature(&self, name: &str) -> Result<bool, Error> {
        match name {
            AUTO_BIND => Ok(self.auto_bind),
            AUTO_EXTRACT => Ok(self.auto_extract),
            _ => Err(unknown(name)),
        }
    }

    /// Sets a feature addressed by name.
    pub fn set_feature(&mut self, name: &str, value: bool) -> Result<(), Error> {
        match name {
            AUTO_BIND => self.auto_bind = value,
            AUTO_EXTRACT => self.auto_extract = value,
            _ => return Err(unknown(name)),
        }
        Ok(())
    }

    /// Value of a property addressed by name.
    pub fn property(&self, name: &str) -> Result<usize, Error> {
        match name {
            MAX_FIELD_SIZE => Ok(self.max_field_size),
            _ => Err(unknown(name)),
        }
    }

    /// Sets a property addressed by name. [`MAX_FIELD_SIZE`] must be at least one.
    pub fn set_property(&mut self, name: &str, value: usize) -> Result<(), Error> {
        match name {
            MAX_FIELD_SIZE => self.max_field_size = check_max_field_size(value)?,
            _ => return Err(unknown(name)),
        }
        Ok(())
    }
}

/// Variable sized column buffers must be able to hold at least one byte.
pub(crate) fn check_max_field_size(value: usize) -> Result<usize, Error> {
    if value == 0 {
        return Err(Error::InvalidSessionSetting {
            name: MAX_FIELD_SIZE.to_owned(),
            value,
        });
    }
    Ok(value)
}

fn unknown(name: &str) -> Error {
    Error::UnknownSessionSetting {
        name: name.to_owned(),
    }
}

/// Allocates an ODBC environment and declares the ODBC version this crate has been built for.
///
/// # Safety
///
/// There may only be one ODBC environment in any process at any time. Take care using this
/// function in unit tests, as these run in parallel by default in Rust. Creating one environment in
/// your binary and sharing it between sessions is safe.
pub unsafe fn create_environment() -> Result<Arc<Environment>, Error> {
    let environment = unsafe { Environment::new() }.ok_or(Error::FailedAllocatingEnvironment)?;
    environment
        .declare_version(odbc_version())
        .into_result(&environment)?;
    Ok(Arc::new(environment))
}

#[cfg(all(feature = "odbc_version_3_80", not(feature = "odbc_version_3_5")))]
fn odbc_version() -> AttrOdbcVersion {
    AttrOdbcVersion::Odbc3_80
}

#[cfg(not(all(feature = "odbc_version_3_80", not(feature = "odbc_version_3_5"))))]
fn odbc_version() -> AttrOdbcVersion {
    AttrOdbcVersion::Odbc3
}

/// A [`Session`] backed by an ODBC connection.
pub struct OdbcSession {
    connection: Arc<Connection>,
    options: SessionOptions,
}

impl OdbcSession {
    /// Connects to a data source using a connection string.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use odbc_statement::{OdbcSession, SessionOptions, create_environment};
    ///
    /// // I herby solemnly swear that this is the only ODBC environment in the entire process.
    /// let environment = unsafe { create_environment()? };
    /// let session = OdbcSession::connect(
    ///     &environment,
    ///     "Driver={SQLite3};Database=test.db;",
    ///     SessionOptions::default(),
    /// )?;
    /// # Ok::<(), odbc_statement::Error>(())
    /// ```
    pub fn connect(
        environment: &Arc<Environment>,
        connection_string: &str,
        options: SessionOptions,
    ) -> Result<Self, Error> {
        let mut connection = environment
            .allocate_connection()
            .into_result(environment.as_ref())?;
        connection
            .connect_with_connection_string(connection_string)
            .into_connection_result(&connection)?;
        Ok(Self {
            connection: Arc::new(connection),
            options,
        })
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut SessionOptions {
        &mut self.options
    }
}

unsafe impl AsHandle for OdbcSession {
    fn as_handle(&self) -> odbc_sys::Handle {
        self.connection.as_handle()
    }

    fn handle_type(&self) -> odbc_sys::HandleType {
        self.connection.handle_type()
    }
}

impl Session for OdbcSession {
    type Statement = StatementImpl;

    fn allocate_statement(&self) -> Result<StatementImpl, Error> {
        self.connection
            .allocate_statement()
            .into_result(self.connection.as_ref())
    }

    fn native_sql(&self, statement_text: &str, out: &mut [u8]) -> SqlResult<usize> {
        self.connection.native_sql(statement_text, out)
    }

    fn feature(&self, name: &str) -> Result<bool, Error> {
        self.options.feature(name)
    }

    fn property(&self, name: &str) -> Result<usize, Error> {
        self.options.property(name)
    }
}

#[cfg(test)]
mod tests {
    use super::SessionOptions;
    use crate::Error;

    #[test]
    fn default_options() {
        let options = SessionOptions::default();
        assert!(options.feature("autoBind").unwrap());
        assert!(options.feature("autoExtract").unwrap());
        assert_eq!(1024, options.property("maxFieldSize").unwrap());
    }

    #[test]
    fn set_options_by_name() {
        let mut options = SessionOptions::default();
        options.set_feature("autoBind", false).unwrap();
        options.set_property("maxFieldSize", 16).unwrap();

        assert!(!options.auto_bind);
        assert_eq!(16, options.max_field_size);
    }

    #[test]
    fn unknown_names() {
        let mut options = SessionOptions::default();

        let error = options.set_feature("autoCommit", true).unwrap_err();
        assert!(matches!(error, Error::UnknownSessionSetting { name } if name == "autoCommit"));
        assert!(options.property("maxRows").is_err());
        // Features and properties live in separate name spaces
        assert!(options.feature("maxFieldSize").is_err());
    }

    #[test]
    fn max_field_size_must_not_be_zero() {
        let mut options = SessionOptions::default();

        let error = options.set_property("maxFieldSize", 0).unwrap_err();

        assert!(matches!(
            error,
            Error::InvalidSessionSetting { name, value: 0 } if name == "maxFieldSize"
        ));
        // The previous value is kept
        assert_eq!(1024, options.max_field_size);
        options.set_property("maxFieldSize", 1).unwrap();
        assert_eq!(1, options.max_field_size);
    }
}
