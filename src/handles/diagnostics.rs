use super::{
    SqlChar,
    as_handle::AsHandle,
    buffer::{clamp_small_int, mut_buf_ptr},
};
use odbc_sys::{SQLGetDiagRec, SQLSTATE_SIZE, SqlReturn};
use std::fmt;

/// A buffer large enough to hold an `SOLState` for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct State(pub [u8; SQLSTATE_SIZE]);

impl State {
    /// Returned by `SQLCloseCursor` if no cursor is open on the statement. Some ODBC 3.x drivers
    /// emit this when closing a cursor of a statement which never produced a result set.
    pub const INVALID_CURSOR_STATE: State = State(*b"24000");
    /// String or binary data returned for a column resulted in the truncation of nonblank character
    /// or non-NULL binary data. If it was a string value, it was right-truncated.
    pub const STRING_DATA_RIGHT_TRUNCATION: State = State(*b"01004");
    /// Function sequence error. E.g. fetching from a statement which has not been executed.
    pub const FUNCTION_SEQUENCE_ERROR: State = State(*b"HY010");

    /// Drops terminating zero and changes char type, if required
    pub fn from_chars_with_nul(code: &[SqlChar; SQLSTATE_SIZE + 1]) -> Self {
        let mut ascii = [0; SQLSTATE_SIZE];
        ascii.copy_from_slice(&code[..SQLSTATE_SIZE]);
        State(ascii)
    }

    /// View status code as string slice for displaying. Must always succeed as ODBC status code
    /// always consist of ASCII characters.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("?????")
    }
}

/// Result of [`Diagnostics::diagnostic_record`].
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticResult {
    /// A five-character SQLSTATE code for the diagnostic record `rec_number`. The first two
    /// characters indicate the class; the next three indicate the subclass.
    pub state: State,
    /// Native error code specific to the data source.
    pub native_error: i32,
    /// The length of the diagnostic message reported by ODBC (excluding the terminating zero).
    pub text_length: i16,
}

/// Report diagnostics from the last call to an ODBC function using a handle.
pub trait Diagnostics {
    /// Call this method to retrieve diagnostic information for the last call to an ODBC function.
    ///
    /// # Arguments
    ///
    /// * `rec_number` - Indicates the status record from which the application seeks information.
    ///   Status records are numbered from 1. Function panics for values smaller < 1.
    /// * `message_text` - Buffer in which to return the diagnostic message text string. If the
    ///   number of characters to return is greater than the buffer length, the message is
    ///   truncated.
    ///
    /// # Result
    ///
    /// * `Some(rec)` - The function successfully returned diagnostic information.
    /// * `None` - `rec_number` was greater than the number of diagnostic records that existed for
    ///   the specified Handle.
    fn diagnostic_record(
        &self,
        rec_number: i16,
        message_text: &mut [SqlChar],
    ) -> Option<DiagnosticResult>;

    /// Builds on top of [`Self::diagnostic_record`], if the message does not fit in the buffer, it
    /// will grow the message buffer and extract it again.
    fn diagnostic_record_vec(
        &self,
        rec_number: i16,
        message_text: &mut Vec<SqlChar>,
    ) -> Option<DiagnosticResult> {
        // Use all the memory available in the buffer, but don't allocate any extra.
        let cap = message_text.capacity();
        message_text.resize(cap, 0);

        let mut result = self.diagnostic_record(rec_number, message_text)?;
        let mut text_length = usize::try_from(result.text_length).unwrap_or(0);

        if text_length > message_text.len() {
            // Resize with +1 to account for terminating zero
            message_text.resize(text_length + 1, 0);
            // Call diagnostics again with the larger buffer. Should be a success this time if
            // driver isn't buggy.
            result = self.diagnostic_record(rec_number, message_text)?;
        }
        text_length = text_length.min(message_text.len());

        // Some drivers pad the message with null-chars (which is still a valid C string, but not
        // a valid Rust string).
        while text_length > 0 && message_text[text_length - 1] == 0 {
            text_length -= 1;
        }
        message_text.resize(text_length, 0);

        Some(result)
    }
}

impl<T: AsHandle + ?Sized> Diagnostics for T {
    fn diagnostic_record(
        &self,
        rec_number: i16,
        message_text: &mut [SqlChar],
    ) -> Option<DiagnosticResult> {
        // Diagnostic records in ODBC are indexed starting with 1
        assert!(rec_number > 0);

        let mut text_length = 0;
        let mut state = [0; SQLSTATE_SIZE + 1];
        let mut native_error = 0;
        let ret = unsafe {
            SQLGetDiagRec(
                self.handle_type(),
                self.as_handle(),
                rec_number,
                state.as_mut_ptr(),
                &mut native_error,
                mut_buf_ptr(message_text),
                clamp_small_int(message_text.len()),
                &mut text_length,
            )
        };

        let result = DiagnosticResult {
            state: State::from_chars_with_nul(&state),
            native_error,
            text_length,
        };

        match ret {
            SqlReturn::SUCCESS | SqlReturn::SUCCESS_WITH_INFO => Some(result),
            SqlReturn::NO_DATA => None,
            SqlReturn::ERROR => panic!("rec_number argument of diagnostics must be > 0."),
            unexpected => panic!("SQLGetDiagRec returned: {unexpected:?}"),
        }
    }
}

/// ODBC Diagnostic Record
///
/// Use `std::fmt::Display` to retrieve status code and other information.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Record {
    /// Five character SQLSTATE
    pub state: State,
    /// Error code returned by Driver manager or driver
    pub native_error: i32,
    /// Buffer containing the error message. The buffer already has the correct size, and there is
    /// no terminating zero at the end.
    pub message: Vec<SqlChar>,
}

impl Record {
    /// Creates an empty diagnostic record with at least the specified capacity for the message.
    /// Using a buffer with a size different from zero then filling the diagnostic record may safe a
    /// second function call to `SQLGetDiagRec`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            message: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Fill this diagnostic `Record` from any ODBC handle.
    ///
    /// # Return
    ///
    /// `true` if a record has been found, `false` if not.
    pub fn fill_from(&mut self, handle: &(impl Diagnostics + ?Sized), record_number: i16) -> bool {
        match handle.diagnostic_record_vec(record_number, &mut self.message) {
            Some(result) => {
                self.state = result.state;
                self.native_error = result.native_error;
                true
            }
            None => false,
        }
    }

    /// Every diagnostic record currently associated with `handle`, in the order reported by the
    /// driver.
    pub fn all_from(handle: &(impl Diagnostics + ?Sized)) -> Vec<Record> {
        let mut records = Vec::new();
        let mut rec_number = 1;
        loop {
            let mut record = Record::with_capacity(512);
            if !record.fill_from(handle, rec_number) {
                break;
            }
            records.push(record);
            if rec_number == i16::MAX {
                break;
            }
            rec_number += 1;
        }
        records
    }

    /// Diagnostic message as text. Invalid UTF-8 sequences are replaced.
    pub fn message_text(&self) -> String {
        String::from_utf8_lossy(&self.message).into_owned()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "State: {}, Native error: {}, Message: {}",
            self.state.as_str(),
            self.native_error,
            self.message_text(),
        )
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
