//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::blocking::{BlockingProcedureExecutor, RecordIter, RowIter};
pub use crate::config::ExecutorOptions;
pub use crate::connection::ProcedureConnection;
pub use crate::contract::StoredProcedures;
pub use crate::conversion::{
    FromRowValue, SqlTyped, ToRowValue, coerce, coerce_strict, normalize,
};
pub use crate::error::SprocError;
pub use crate::executor::ProcedureExecutor;
pub use crate::mapping::{
    MapStrategy, Member, MemberKind, Record, map_by_fields, map_by_name, map_positional,
};
pub use crate::params::{ParamDirection, ParamValue, ProcParam, ProcedureCall};
pub use crate::results::{CustomDbRow, ExecOutcome, ProcedureResult, ResultSet};
pub use crate::stream::{RecordStream, RowStream};
pub use crate::table::{TableColumn, TableValue};
pub use crate::transaction::Transaction;
pub use crate::types::{RowValues, SqlType};

#[cfg(feature = "mssql")]
pub use crate::mssql::{MssqlConnection, MssqlOptions};
