use super::data_type::DataType;

/// Indication of whether a column is nullable or not.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum Nullability {
    /// Indicates that we do not know whether the column is Nullable or not.
    #[default]
    Unknown,
    /// The column may hold NULL values.
    Nullable,
    /// The column can not hold NULL values.
    NoNulls,
}

impl Nullability {
    /// Construct a new instance from a `Nullability` returned by `SQLDescribeCol`.
    pub fn new(nullability: odbc_sys::Nullability) -> Self {
        match nullability {
            odbc_sys::Nullability::UNKNOWN => Nullability::Unknown,
            odbc_sys::Nullability::NO_NULLS => Nullability::NoNulls,
            odbc_sys::Nullability::NULLABLE => Nullability::Nullable,
            other => panic!("ODBC returned invalid value for Nullable: {}", other.0),
        }
    }
}

/// Describes the type and attributes of a column.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct ColumnDescription {
    /// Column name. May be empty if unavailable.
    pub name: Vec<u8>,
    /// Type of the column
    pub data_type: DataType,
    /// Indicates whether the column is nullable or not.
    pub nullability: Nullability,
}

impl ColumnDescription {
    /// In production, an 'empty' [`ColumnDescription`] is expected to be constructed via the
    /// [`Default`] trait. It is then filled using [`crate::handles::Statement::describe_col`].
    pub fn new(name: &str, data_type: DataType, nullability: Nullability) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            data_type,
            nullability,
        }
    }

    /// Converts the column name into UTF-8 and returns the result as a `String`. Invalid sequences
    /// are replaced.
    pub fn name_to_string(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// `true` if the column is `Nullable` or it is not know whether the column is nullable. `false`
    /// if and only if the column is `NoNulls`.
    pub fn could_be_nullable(&self) -> bool {
        match self.nullability {
            Nullability::Nullable | Nullability::Unknown => true,
            Nullability::NoNulls => false,
        }
    }
}
