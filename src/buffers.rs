//! Buffers bound to (or filled by) the driver in order to transport values of result set columns.

use std::{ffi::c_void, mem::size_of};

use odbc_sys::{CDataType, NO_TOTAL, NULL_DATA};

use crate::{Error, Value, conversion::decimal_text_to_i64, handles::{CData, CDataMut, DataType}};

/// Indicates existence and length of a value.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Indicator {
    /// Field does not exist
    Null,
    /// Field exists, but its length had not be reported by the driver.
    NoTotal,
    /// Fields exists. Value indicates number of bytes required to store the value. In case of
    /// truncated data, this is the true length of the data, before truncation occurred.
    Length(usize),
}

impl Indicator {
    /// Creates an indicator from an `isize` indicator value returned by ODBC.
    pub fn from_isize(indicator: isize) -> Self {
        match indicator {
            NULL_DATA => Indicator::Null,
            NO_TOTAL => Indicator::NoTotal,
            other => Indicator::Length(other.try_into().expect(
                "Length indicator must be non-negative. If you are on a 64Bit platfrom and the \
                isize value has been returned by the driver, the driver might assume SQLLEN to be \
                32Bits. Please ask your vendor for a version of the driver which is correctly \
                build using 64Bits for SQLLEN.",
            )),
        }
    }

    /// Does this indicator imply truncation for a value of the given length?
    ///
    /// `length_in_buffer` is specified in bytes without terminating zeroes.
    pub fn is_truncated(self, length_in_buffer: usize) -> bool {
        match self {
            Indicator::Null => false,
            Indicator::NoTotal => true,
            Indicator::Length(complete_length) => complete_length > length_in_buffer,
        }
    }

    /// If the indicator is [`Indicator::Length`] this is [`Some`].
    pub fn length(self) -> Option<usize> {
        if let Indicator::Length(len) = self {
            Some(len)
        } else {
            None
        }
    }
}

/// C representation a column is fetched as. Chosen from the [`DataType`] reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// 32 Bit signed integer.
    I32,
    /// 64 Bit signed integer.
    I64,
    /// Double precision floating point.
    F64,
    /// Single byte, either `0` or `1`.
    Bit,
    /// Narrow character data.
    Text {
        /// Maximum length in bytes, excluding the terminating zero.
        max_str_len: usize,
    },
    /// Binary data.
    Binary {
        /// Maximum length in bytes.
        length: usize,
    },
    /// `NUMERIC` or `DECIMAL` fetched as text.
    Numeric {
        /// Total number of digits.
        precision: usize,
        /// Number of digits after the radix character.
        scale: i16,
    },
}

impl BufferKind {
    /// Pick the buffer for a column. `max_field_size` bounds the length of variable sized
    /// columns. It is also used, if the driver does not report any length at all. Variable sized
    /// buffers hold at least one byte.
    pub fn from_data_type(data_type: DataType, max_field_size: usize) -> Self {
        let max_field_size = max_field_size.max(1);
        let bounded = |length: usize| {
            if length == 0 || length > max_field_size {
                max_field_size
            } else {
                length
            }
        };
        match data_type {
            DataType::Integer | DataType::SmallInt | DataType::Tinyint => BufferKind::I32,
            DataType::Bigint => BufferKind::I64,
            DataType::Float { .. } | DataType::Real | DataType::Double => BufferKind::F64,
            DataType::Bit => BufferKind::Bit,
            DataType::Numeric { precision, scale } | DataType::Decimal { precision, scale } => {
                BufferKind::Numeric { precision, scale }
            }
            DataType::Binary { length }
            | DataType::Varbinary { length }
            | DataType::LongVarbinary { length } => BufferKind::Binary {
                length: bounded(length),
            },
            DataType::Char { length }
            | DataType::Varchar { length }
            | DataType::LongVarchar { length } => BufferKind::Text {
                max_str_len: bounded(length),
            },
            // Each UTF-16 character may take up to four bytes once converted to narrow text.
            DataType::WChar { length }
            | DataType::WVarchar { length }
            | DataType::WLongVarchar { length } => BufferKind::Text {
                max_str_len: bounded(length.saturating_mul(4)),
            },
            // yyyy-mm-dd
            DataType::Date => BufferKind::Text { max_str_len: 10 },
            // hh:mm:ss.fff
            DataType::Time { precision } => BufferKind::Text {
                max_str_len: 8 + fraction_len(precision),
            },
            // yyyy-mm-dd hh:mm:ss.fff
            DataType::Timestamp { precision } => BufferKind::Text {
                max_str_len: 19 + fraction_len(precision),
            },
            DataType::Unknown => BufferKind::Text {
                max_str_len: max_field_size,
            },
            DataType::Other { column_size, .. } => BufferKind::Text {
                max_str_len: bounded(column_size),
            },
        }
    }

    /// The C type the driver converts values into.
    pub fn cdata_type(self) -> CDataType {
        match self {
            BufferKind::I32 => CDataType::SLong,
            BufferKind::I64 => CDataType::SBigInt,
            BufferKind::F64 => CDataType::Double,
            BufferKind::Bit => CDataType::Bit,
            BufferKind::Text { .. } | BufferKind::Numeric { .. } => CDataType::Char,
            BufferKind::Binary { .. } => CDataType::Binary,
        }
    }

    /// Size of the value buffer in bytes, including terminating zeroes.
    pub fn element_size(self) -> usize {
        match self {
            BufferKind::I32 => size_of::<i32>(),
            BufferKind::I64 => size_of::<i64>(),
            BufferKind::F64 => size_of::<f64>(),
            BufferKind::Bit => 1,
            BufferKind::Text { max_str_len } => max_str_len + 1,
            BufferKind::Binary { length } => length,
            // Sign, radix character and terminating zero
            BufferKind::Numeric { precision, .. } => precision + 3,
        }
    }

    /// `true` for text and binary data, which may be retrieved in multiple parts.
    pub fn is_variadic(self) -> bool {
        matches!(self, BufferKind::Text { .. } | BufferKind::Binary { .. })
    }

    /// Number of terminating zeroes the driver appends to each part of a value.
    pub fn terminating_zeroes(self) -> usize {
        match self.cdata_type() {
            CDataType::Char => 1,
            _ => 0,
        }
    }

    /// Interprets the bytes of a value which has been written by the driver. `payload` excludes
    /// terminating zeroes.
    pub fn to_value(self, payload: &[u8]) -> Value {
        match self {
            BufferKind::I32 => Value::I32(i32::from_ne_bytes(fixed(payload))),
            BufferKind::I64 => Value::I64(i64::from_ne_bytes(fixed(payload))),
            BufferKind::F64 => Value::F64(f64::from_ne_bytes(fixed(payload))),
            BufferKind::Bit => Value::Bool(payload.first().is_some_and(|&b| b != 0)),
            BufferKind::Text { .. } => Value::Text(String::from_utf8_lossy(payload).into_owned()),
            BufferKind::Binary { .. } => Value::Binary(payload.to_vec()),
            BufferKind::Numeric { scale, .. } => match decimal_text_to_i64(payload, 0) {
                Some(n) if scale <= 0 => Value::I64(n),
                _ => Value::Text(String::from_utf8_lossy(payload).trim().to_owned()),
            },
        }
    }
}

fn fraction_len(precision: i16) -> usize {
    match usize::try_from(precision) {
        Ok(0) | Err(_) => 0,
        // Radix character plus digits
        Ok(digits) => digits + 1,
    }
}

fn fixed<const N: usize>(payload: &[u8]) -> [u8; N] {
    let mut bytes = [0; N];
    let len = payload.len().min(N);
    bytes[..len].copy_from_slice(&payload[..len]);
    bytes
}

/// Heap allocated bytes aligned for any of the fixed sized C types. The address of the bytes is
/// stable, as long as the buffer is not resized.
#[derive(Debug, Clone)]
pub struct AlignedBytes {
    storage: Vec<u64>,
    len: usize,
}

impl AlignedBytes {
    /// `len` zeroed bytes.
    pub fn zeroed(len: usize) -> Self {
        Self {
            storage: vec![0; len.div_ceil(size_of::<u64>())],
            len,
        }
    }

    /// Copy of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buffer = Self::zeroed(bytes.len());
        buffer.as_mut_slice().copy_from_slice(bytes);
        buffer
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // Storage holds at least `len` initialized bytes.
        unsafe { std::slice::from_raw_parts(self.storage.as_ptr() as *const u8, self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.storage.as_mut_ptr() as *mut u8, self.len) }
    }
}

/// Holds a single value of a result set column. Either bound to the statement, so `fetch` fills
/// it, or used as target for `get_data`.
#[derive(Debug)]
pub struct ColumnBuffer {
    kind: BufferKind,
    value: AlignedBytes,
    indicator: isize,
}

impl ColumnBuffer {
    pub fn new(kind: BufferKind) -> Self {
        Self {
            kind,
            value: AlignedBytes::zeroed(kind.element_size()),
            indicator: NULL_DATA,
        }
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Indicator written by the driver for the current value.
    pub fn indicator(&self) -> Indicator {
        Indicator::from_isize(self.indicator)
    }

    /// Raw bytes of the value buffer, including any terminating zero.
    pub fn as_bytes(&self) -> &[u8] {
        self.value.as_slice()
    }

    /// Value currently held by the buffer.
    ///
    /// # Parameters
    ///
    /// * `buffer_index`: Zero based index of the buffer. Used to give context, in case the value
    ///   has been truncated.
    pub fn value(&self, buffer_index: usize) -> Result<Value, Error> {
        let indicator = self.indicator();
        if indicator == Indicator::Null {
            return Ok(Value::Null);
        }
        let capacity = self.kind.element_size() - self.kind.terminating_zeroes();
        let payload_len = match self.kind {
            BufferKind::I32 | BufferKind::I64 | BufferKind::F64 | BufferKind::Bit => capacity,
            _ => {
                if indicator.is_truncated(capacity) {
                    return Err(Error::TooLargeValueForBuffer {
                        indicator: indicator.length(),
                        buffer_index,
                    });
                }
                indicator.length().unwrap_or(capacity)
            }
        };
        Ok(self.kind.to_value(&self.value.as_slice()[..payload_len]))
    }
}

unsafe impl CData for ColumnBuffer {
    fn cdata_type(&self) -> CDataType {
        self.kind.cdata_type()
    }

    fn indicator_ptr(&self) -> *const isize {
        &self.indicator as *const isize
    }

    fn value_ptr(&self) -> *const c_void {
        self.value.as_slice().as_ptr() as *const c_void
    }

    fn buffer_length(&self) -> isize {
        self.value.len().try_into().unwrap_or(isize::MAX)
    }
}

unsafe impl CDataMut for ColumnBuffer {
    fn mut_indicator_ptr(&mut self) -> *mut isize {
        &mut self.indicator as *mut isize
    }

    fn mut_value_ptr(&mut self) -> *mut c_void {
        self.value.as_mut_slice().as_mut_ptr() as *mut c_void
    }
}
