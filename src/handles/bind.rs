//! Traits describing the memory handed to the driver for parameters and result set columns.

use odbc_sys::CDataType;
use std::ffi::c_void;

use super::DataType;

/// A value buffer plus indicator, described in terms of its C type.
///
/// # Safety
///
/// Pointers must stay valid as long as the buffer is bound. For variable sized types the
/// indicator must not exceed [`Self::buffer_length`].
pub unsafe trait CData {
    /// C type of the value buffer. The driver converts values from and to this type.
    fn cdata_type(&self) -> CDataType;

    /// Length of the value in bytes, or `NULL_DATA`.
    fn indicator_ptr(&self) -> *const isize;

    /// Start of the value buffer.
    fn value_ptr(&self) -> *const c_void;

    /// Capacity of the value buffer in bytes.
    fn buffer_length(&self) -> isize;
}

/// A buffer the driver writes into, either during `fetch` for bound columns, or during `get_data`.
///
/// # Safety
///
/// Any bytes the driver writes must leave the buffer in a valid state.
pub unsafe trait CDataMut: CData {
    /// Receives the length of the value written by the driver.
    fn mut_indicator_ptr(&mut self) -> *mut isize;

    /// Receives the value.
    fn mut_value_ptr(&mut self) -> *mut c_void;
}

/// A parameter whose bytes are sent with `SQLPutData` once execution asks for them.
///
/// # Safety
///
/// [`Self::stream_ptr`] must identify the parameter when `SQLParamData` hands it back. The
/// indicator must stay valid as long as the parameter is bound.
pub unsafe trait DelayedInput: HasDataType {
    /// C type of the bytes sent at execution time.
    fn cdata_type(&self) -> CDataType;

    /// [`odbc_sys::len_data_at_exec`] of the number of bytes to be sent.
    fn indicator_ptr(&self) -> *const isize;

    /// Token returned by `SQLParamData` when the driver asks for this parameter.
    fn stream_ptr(&mut self) -> *mut c_void;
}

/// Knows the SQL type of the placeholder it is bound to.
pub trait HasDataType {
    /// SQL type announced to the driver.
    fn data_type(&self) -> DataType;
}

/// A parameter value bound before execution.
pub trait InputParameter: HasDataType + CData {}

impl<T> InputParameter for T where T: HasDataType + CData + ?Sized {}
