//! Outbound parameter buffers and the protocol used to hand them to the driver.

use std::ffi::c_void;

use log::debug;
use odbc_sys::{CDataType, NULL_DATA, Pointer, len_data_at_exec};

use crate::{
    Error, Value,
    buffers::AlignedBytes,
    handles::{CData, DataType, DelayedInput, HasDataType, Statement},
};

/// Determines how parameter values are transferred to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterBinding {
    /// Value buffers are bound before execution. The driver reads them during `SQLExecute`.
    Immediate,
    /// Parameters are bound with a token. Execution returns "need data" and the values are
    /// streamed to the driver using `SQLParamData` and `SQLPutData`.
    AtExecution,
}

/// A single parameter value in the representation handed to the driver. Boxed by the [`Binder`],
/// so its address stays stable while bound. The address doubles as the token identifying the
/// parameter during deferred data transfer.
#[derive(Debug)]
pub struct ParameterBuffer {
    bytes: AlignedBytes,
    indicator: isize,
    cdata_type: CDataType,
    data_type: DataType,
}

impl ParameterBuffer {
    fn new(value: &Value) -> Self {
        let (bytes, cdata_type, data_type) = match value {
            Value::Null => (
                AlignedBytes::zeroed(0),
                CDataType::Char,
                DataType::Varchar { length: 1 },
            ),
            Value::Bool(b) => (
                AlignedBytes::from_slice(&[u8::from(*b)]),
                CDataType::Bit,
                DataType::Bit,
            ),
            Value::I32(i) => (
                AlignedBytes::from_slice(&i.to_ne_bytes()),
                CDataType::SLong,
                DataType::Integer,
            ),
            Value::I64(i) => (
                AlignedBytes::from_slice(&i.to_ne_bytes()),
                CDataType::SBigInt,
                DataType::Bigint,
            ),
            Value::F64(f) => (
                AlignedBytes::from_slice(&f.to_ne_bytes()),
                CDataType::Double,
                DataType::Double,
            ),
            Value::Text(text) => (
                AlignedBytes::from_slice(text.as_bytes()),
                CDataType::Char,
                // Drivers reject a column size of zero.
                DataType::Varchar {
                    length: text.len().max(1),
                },
            ),
            Value::Binary(bytes) => (
                AlignedBytes::from_slice(bytes),
                CDataType::Binary,
                DataType::Varbinary {
                    length: bytes.len().max(1),
                },
            ),
        };
        let indicator = if value.is_null() {
            NULL_DATA
        } else {
            bytes.len().try_into().unwrap_or(isize::MAX)
        };
        Self {
            bytes,
            indicator,
            cdata_type,
            data_type,
        }
    }

    /// `true` if the parameter is bound with the `NULL_DATA` indicator.
    pub fn is_null(&self) -> bool {
        self.indicator == NULL_DATA
    }

    /// Bytes which are transferred to the driver.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// Token identifying this parameter during deferred data transfer.
    pub fn token(&self) -> Pointer {
        self as *const Self as Pointer
    }

    /// Switches the indicator to announce a stream of known length.
    fn defer(&mut self) {
        let len = self.bytes.len().try_into().unwrap_or(isize::MAX);
        self.indicator = len_data_at_exec(len);
    }
}

impl HasDataType for ParameterBuffer {
    fn data_type(&self) -> DataType {
        self.data_type
    }
}

unsafe impl CData for ParameterBuffer {
    fn cdata_type(&self) -> CDataType {
        self.cdata_type
    }

    fn indicator_ptr(&self) -> *const isize {
        &self.indicator as *const isize
    }

    fn value_ptr(&self) -> *const c_void {
        self.bytes.as_slice().as_ptr() as *const c_void
    }

    fn buffer_length(&self) -> isize {
        self.bytes.len().try_into().unwrap_or(isize::MAX)
    }
}

unsafe impl DelayedInput for ParameterBuffer {
    fn cdata_type(&self) -> CDataType {
        self.cdata_type
    }

    fn indicator_ptr(&self) -> *const isize {
        &self.indicator as *const isize
    }

    fn stream_ptr(&mut self) -> *mut c_void {
        self as *mut Self as *mut c_void
    }
}

/// Owns the values of the parameters of one compiled statement and binds them to the statement
/// handle according to the [`ParameterBinding`] mode.
#[derive(Debug)]
pub struct Binder {
    mode: ParameterBinding,
    /// Indexed by zero based parameter position.
    parameters: Vec<Option<Box<ParameterBuffer>>>,
}

impl Binder {
    pub fn new(mode: ParameterBinding) -> Self {
        Self {
            mode,
            parameters: Vec::new(),
        }
    }

    pub fn mode(&self) -> ParameterBinding {
        self.mode
    }

    /// Stores `value` as the parameter at the zero based `position`. Replaces any value bound
    /// previously at that position.
    pub fn bind(&mut self, position: usize, value: impl Into<Value>) {
        if self.parameters.len() <= position {
            self.parameters.resize_with(position + 1, || None);
        }
        self.parameters[position] = Some(Box::new(ParameterBuffer::new(&value.into())));
    }

    /// Number of parameter positions covered by the stored values.
    pub fn num_parameters(&self) -> usize {
        self.parameters.len()
    }

    /// Parameter stored at the zero based `position`.
    pub fn parameter(&self, position: usize) -> Option<&ParameterBuffer> {
        self.parameters.get(position)?.as_deref()
    }

    /// Forgets all stored values.
    pub fn reset(&mut self) {
        self.parameters.clear();
    }

    /// Binds all stored values to `statement`. Parameters previously bound to the statement are
    /// reset first.
    ///
    /// In [`ParameterBinding::AtExecution`] mode the values are not handed to the driver yet.
    /// Instead each parameter is bound with its token and the length of the value. Use
    /// [`Self::data_size`] and [`Self::data`] to answer the driver once it asks for the data.
    /// `NULL` is always bound immediately.
    pub fn bind_to(&mut self, statement: &mut (impl Statement + ?Sized)) -> Result<(), Error> {
        statement.reset_parameters().into_result(&*statement)?;
        for (index, parameter) in self.parameters.iter_mut().enumerate() {
            let Some(parameter) = parameter else {
                continue;
            };
            let parameter_number = u16::try_from(index + 1)
                .map_err(|_| Error::InvalidStatement {
                    reason: format!("Parameter position {} exceeds the ODBC limit.", index + 1),
                })?;
            let deferred = match self.mode {
                ParameterBinding::Immediate => false,
                ParameterBinding::AtExecution => !parameter.is_null(),
            };
            if deferred {
                parameter.defer();
                // Boxed parameters stay at their address until the binder is reset.
                unsafe {
                    statement.bind_delayed_input_parameter(parameter_number, &mut **parameter)
                }
                .into_result(&*statement)?;
            } else {
                unsafe { statement.bind_input_parameter(parameter_number, &**parameter) }
                    .into_result(&*statement)?;
            }
        }
        debug!(
            "Bound {} parameters ({:?}).",
            self.parameters.iter().flatten().count(),
            self.mode
        );
        Ok(())
    }

    fn by_token(&self, token: Pointer) -> Option<&ParameterBuffer> {
        self.parameters
            .iter()
            .flatten()
            .map(Box::as_ref)
            .find(|parameter| parameter.token() == token)
    }

    /// Length in bytes of the parameter the driver identified by `token`.
    pub fn data_size(&self, token: Pointer) -> Option<usize> {
        self.by_token(token).map(|parameter| parameter.as_bytes().len())
    }

    /// Bytes of the parameter the driver identified by `token`.
    pub fn data(&self, token: Pointer) -> Option<&[u8]> {
        self.by_token(token).map(ParameterBuffer::as_bytes)
    }
}
