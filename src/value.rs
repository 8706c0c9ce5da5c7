use std::fmt;

/// A single parameter or field value exchanged with the data source.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// Single bit, `BIT` in most data sources.
    Bool(bool),
    /// 32 Bit signed integer. Also used for `SMALLINT` and `TINYINT` columns.
    I32(i32),
    /// 64 Bit signed integer. Also used for `NUMERIC` and `DECIMAL` columns with scale 0.
    I64(i64),
    /// Double precision floating point.
    F64(f64),
    /// Character data. Also used for all types without a more specific representation, e.g.
    /// timestamps or decimals with a fractional part.
    Text(String),
    /// Binary data.
    Binary(Vec<u8>),
}

impl Value {
    /// `true` if the value is `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer representation, if the value is an integer or a boolean.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Bool(b) => Some(b.into()),
            Value::I32(i) => Some(i.into()),
            Value::I64(i) => Some(i),
            _ => None,
        }
    }

    /// Floating point representation of any numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::I32(i) => Some(i.into()),
            // Intentionally lossy for very large integers.
            Value::I64(i) => Some(i as f64),
            Value::F64(f) => Some(f),
            _ => None,
        }
    }

    /// Borrow character data.
    pub fn as_text(&self) -> Option<&str> {
        if let Value::Text(text) = self {
            Some(text)
        } else {
            None
        }
    }

    /// Borrow binary data.
    pub fn as_binary(&self) -> Option<&[u8]> {
        if let Value::Binary(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::I32(i) => write!(f, "{i}"),
            Value::I64(i) => write!(f, "{i}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::Text(text) => write!(f, "{text}"),
            Value::Binary(bytes) => {
                write!(f, "0x")?;
                for byte in bytes {
                    write!(f, "{byte:02X}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::I32(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Binary(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Binary(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
