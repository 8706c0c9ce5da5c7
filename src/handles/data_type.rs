use odbc_sys::SqlDataType;

/// Enumeration over valid SQL Data Types supported by ODBC
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DataType {
    /// The type is not known.
    #[default]
    Unknown,
    /// `Char(n)`. Character string of fixed length.
    Char {
        /// Column size in characters (excluding terminating zero).
        length: usize,
    },
    /// `Varchar(n)`. Variable length character string.
    Varchar {
        /// Maximum length of the character string (excluding terminating zero).
        length: usize,
    },
    /// `LONG VARCHAR`. Variable length character data. Maximum length is data source dependent.
    LongVarchar { length: usize },
    /// `NChar(n)`. Fixed length UTF-16 character string.
    WChar { length: usize },
    /// `NVarchar(n)`. Variable length UTF-16 character string.
    WVarchar { length: usize },
    /// `LONGWVARCHAR`. Variable length UTF-16 character data of data source dependent maximum size.
    WLongVarchar { length: usize },
    /// `Numeric(p,s)`. Signed, exact, numeric value with a precision p and scale s.
    Numeric {
        /// Total number of digits.
        precision: usize,
        /// Number of decimal digits.
        scale: i16,
    },
    /// `Decimal(p,s)`. Signed, exact, numeric value with a precision of at least p and scale s.
    Decimal {
        /// Total number of digits.
        precision: usize,
        /// Number of decimal digits.
        scale: i16,
    },
    /// `Integer`. 32 Bit Integer
    Integer,
    /// `Smallint`. 16 Bit Integer
    SmallInt,
    /// `TINYINT`. Exact numeric value with precision 3 and scale 0.
    Tinyint,
    /// `BIGINT`. 64 Bit Integer.
    Bigint,
    /// `Float(p)`. Signed, approximate, numeric value with a binary precision of at least p.
    Float { precision: usize },
    /// `Real`. Signed, approximate, numeric value with a binary precision 24.
    Real,
    /// `Double Precision`. Signed, approximate, numeric value with a binary precision 53.
    Double,
    /// `BIT`. Single bit binary data.
    Bit,
    /// `Date`. Year, month, and day fields.
    Date,
    /// `Time`. Hour, minute, and second fields. Precision p indicates the seconds precision.
    Time { precision: i16 },
    /// `Timestamp`. Date and Time fields.
    Timestamp { precision: i16 },
    /// `BINARY(n)`. Type for fixed sized binary data.
    Binary { length: usize },
    /// `VARBINARY(n)`. Type for variable sized binary data.
    Varbinary { length: usize },
    /// `LONG VARBINARY`. Variable length binary data of data source dependent maximum size.
    LongVarbinary { length: usize },
    /// The driver returned a type, but it is not among the other types of these enumeration. This
    /// is a catchall, in case the library is incomplete, or the data source supports custom or
    /// non-standard types.
    Other {
        /// Type of the column
        data_type: SqlDataType,
        /// Size of column element
        column_size: usize,
        decimal_digits: i16,
    },
}

impl DataType {
    /// Construct a `DataType` from the values reported by `SQLDescribeCol`.
    pub fn new(data_type: SqlDataType, column_size: usize, decimal_digits: i16) -> Self {
        match data_type {
            SqlDataType::UNKNOWN_TYPE => DataType::Unknown,
            SqlDataType::EXT_LONG_VARCHAR => DataType::LongVarchar {
                length: column_size,
            },
            SqlDataType::CHAR => DataType::Char {
                length: column_size,
            },
            SqlDataType::VARCHAR => DataType::Varchar {
                length: column_size,
            },
            SqlDataType::EXT_W_CHAR => DataType::WChar {
                length: column_size,
            },
            SqlDataType::EXT_W_VARCHAR => DataType::WVarchar {
                length: column_size,
            },
            SqlDataType::EXT_W_LONG_VARCHAR => DataType::WLongVarchar {
                length: column_size,
            },
            SqlDataType::NUMERIC => DataType::Numeric {
                precision: column_size,
                scale: decimal_digits,
            },
            SqlDataType::DECIMAL => DataType::Decimal {
                precision: column_size,
                scale: decimal_digits,
            },
            SqlDataType::INTEGER => DataType::Integer,
            SqlDataType::SMALLINT => DataType::SmallInt,
            SqlDataType::EXT_TINY_INT => DataType::Tinyint,
            SqlDataType::EXT_BIG_INT => DataType::Bigint,
            SqlDataType::FLOAT => DataType::Float {
                precision: column_size,
            },
            SqlDataType::REAL => DataType::Real,
            SqlDataType::DOUBLE => DataType::Double,
            SqlDataType::EXT_BIT => DataType::Bit,
            SqlDataType::DATE => DataType::Date,
            SqlDataType::TIME => DataType::Time {
                precision: decimal_digits,
            },
            SqlDataType::TIMESTAMP => DataType::Timestamp {
                precision: decimal_digits,
            },
            SqlDataType::EXT_BINARY => DataType::Binary {
                length: column_size,
            },
            SqlDataType::EXT_VAR_BINARY => DataType::Varbinary {
                length: column_size,
            },
            SqlDataType::EXT_LONG_VAR_BINARY => DataType::LongVarbinary {
                length: column_size,
            },
            other => DataType::Other {
                data_type: other,
                column_size,
                decimal_digits,
            },
        }
    }

    /// The SQL data type as reported by or passed to the ODBC driver.
    pub fn data_type(&self) -> SqlDataType {
        match self {
            DataType::Unknown => SqlDataType::UNKNOWN_TYPE,
            DataType::Char { .. } => SqlDataType::CHAR,
            DataType::Varchar { .. } => SqlDataType::VARCHAR,
            DataType::LongVarchar { .. } => SqlDataType::EXT_LONG_VARCHAR,
            DataType::WChar { .. } => SqlDataType::EXT_W_CHAR,
            DataType::WVarchar { .. } => SqlDataType::EXT_W_VARCHAR,
            DataType::WLongVarchar { .. } => SqlDataType::EXT_W_LONG_VARCHAR,
            DataType::Numeric { .. } => SqlDataType::NUMERIC,
            DataType::Decimal { .. } => SqlDataType::DECIMAL,
            DataType::Integer => SqlDataType::INTEGER,
            DataType::SmallInt => SqlDataType::SMALLINT,
            DataType::Tinyint => SqlDataType::EXT_TINY_INT,
            DataType::Bigint => SqlDataType::EXT_BIG_INT,
            DataType::Float { .. } => SqlDataType::FLOAT,
            DataType::Real => SqlDataType::REAL,
            DataType::Double => SqlDataType::DOUBLE,
            DataType::Bit => SqlDataType::EXT_BIT,
            DataType::Date => SqlDataType::DATE,
            DataType::Time { .. } => SqlDataType::TIME,
            DataType::Timestamp { .. } => SqlDataType::TIMESTAMP,
            DataType::Binary { .. } => SqlDataType::EXT_BINARY,
            DataType::Varbinary { .. } => SqlDataType::EXT_VAR_BINARY,
            DataType::LongVarbinary { .. } => SqlDataType::EXT_LONG_VAR_BINARY,
            DataType::Other { data_type, .. } => *data_type,
        }
    }

    /// The column size as passed to `SQLBindParameter`. Only meaningful for variable sized types
    /// and decimals, `0` otherwise.
    pub fn column_size(&self) -> usize {
        match self {
            DataType::Char { length }
            | DataType::Varchar { length }
            | DataType::LongVarchar { length }
            | DataType::WChar { length }
            | DataType::WVarchar { length }
            | DataType::WLongVarchar { length }
            | DataType::Binary { length }
            | DataType::Varbinary { length }
            | DataType::LongVarbinary { length } => *length,
            DataType::Numeric { precision, .. }
            | DataType::Decimal { precision, .. }
            | DataType::Float { precision } => *precision,
            DataType::Other { column_size, .. } => *column_size,
            _ => 0,
        }
    }

    /// Decimal digits as passed to `SQLBindParameter`.
    pub fn decimal_digits(&self) -> i16 {
        match self {
            DataType::Numeric { scale, .. } | DataType::Decimal { scale, .. } => *scale,
            DataType::Time { precision } | DataType::Timestamp { precision } => *precision,
            DataType::Other { decimal_digits, .. } => *decimal_digits,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use odbc_sys::SqlDataType;

    use super::DataType;

    #[test]
    fn describe_decimal() {
        let dt = DataType::new(SqlDataType::DECIMAL, 10, 2);
        assert_eq!(
            DataType::Decimal {
                precision: 10,
                scale: 2
            },
            dt
        );
        assert_eq!(SqlDataType::DECIMAL, dt.data_type());
        assert_eq!(10, dt.column_size());
        assert_eq!(2, dt.decimal_digits());
    }

    #[test]
    fn unknown_sql_type_is_kept_as_other() {
        let dt = DataType::new(SqlDataType(-154), 16, 0);
        assert_eq!(SqlDataType(-154), dt.data_type());
        assert_eq!(16, dt.column_size());
    }
}
