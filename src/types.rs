use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values that can appear in a result row or be bound as a procedure parameter.
///
/// `Null` is the database-null marker. It is distinct from a column that is absent
/// from the row, which lookups report as `None`.
/// ```rust
/// use sproc_middleware::prelude::*;
///
/// let values = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Null,
/// ];
/// assert!(values[2].is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short variant name, used in conversion error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RowValues::Int(_) => "Int",
            RowValues::Float(_) => "Float",
            RowValues::Text(_) => "Text",
            RowValues::Bool(_) => "Bool",
            RowValues::Timestamp(_) => "Timestamp",
            RowValues::Null => "Null",
            RowValues::JSON(_) => "JSON",
            RowValues::Blob(_) => "Blob",
        }
    }
}

/// Parse the timestamp layouts SQL Server emits as text.
pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const LAYOUTS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(s.trim(), layout).ok())
}

/// Declared scalar type of a record member, table column or output parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Real,
    Float,
    Bit,
    NVarChar,
    DateTime2,
    VarBinary,
    /// JSON document stored as text
    Json,
}

impl SqlType {
    /// Type name used when declaring a SQL Server variable of this type.
    #[must_use]
    pub fn mssql_decl(self) -> &'static str {
        match self {
            SqlType::TinyInt => "TINYINT",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Int => "INT",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::Float => "FLOAT",
            SqlType::Bit => "BIT",
            SqlType::NVarChar | SqlType::Json => "NVARCHAR(MAX)",
            SqlType::DateTime2 => "DATETIME2",
            SqlType::VarBinary => "VARBINARY(MAX)",
        }
    }

    /// Infer a declared type from a value; `Null` has none.
    #[must_use]
    pub fn of_value(value: &RowValues) -> Option<SqlType> {
        match value {
            RowValues::Int(_) => Some(SqlType::BigInt),
            RowValues::Float(_) => Some(SqlType::Float),
            RowValues::Text(_) => Some(SqlType::NVarChar),
            RowValues::Bool(_) => Some(SqlType::Bit),
            RowValues::Timestamp(_) => Some(SqlType::DateTime2),
            RowValues::JSON(_) => Some(SqlType::Json),
            RowValues::Blob(_) => Some(SqlType::VarBinary),
            RowValues::Null => None,
        }
    }

    /// Inclusive range for the integer types.
    pub(crate) fn integer_bounds(self) -> Option<(i64, i64)> {
        match self {
            SqlType::TinyInt => Some((i64::from(u8::MIN), i64::from(u8::MAX))),
            SqlType::SmallInt => Some((i64::from(i16::MIN), i64::from(i16::MAX))),
            SqlType::Int => Some((i64::from(i32::MIN), i64::from(i32::MAX))),
            SqlType::BigInt => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}
