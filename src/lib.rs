//! Stored-procedure data access with typed row mapping.
//!
//! A [`ProcedureExecutor`](executor::ProcedureExecutor) owns one connection and at
//! most one transaction, runs stored procedures in non-query, streaming or
//! multi-result mode, and maps rows onto [`Record`](mapping::Record) types through
//! their static member tables. [`BlockingProcedureExecutor`](blocking::BlockingProcedureExecutor)
//! offers the same operations for synchronous callers.
//!
//! Most applications only need the prelude:
//!
//! ```rust
//! use sproc_middleware::prelude::*;
//!
//! sproc_middleware::record! {
//!     #[derive(Debug, Default)]
//!     pub struct User {
//!         pub id: i32 => "Id",
//!         pub name: Option<String> => "Name",
//!     }
//! }
//!
//! let user: User = map_by_name(
//!     &[RowValues::Int(1), RowValues::Null],
//!     &["Id".to_string(), "Name".to_string()],
//! )?;
//! assert_eq!(user.id, 1);
//! assert_eq!(user.name, None);
//! # Ok::<(), SprocError>(())
//! ```

pub mod blocking;
pub mod config;
pub mod connection;
pub mod contract;
pub mod conversion;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod params;
pub mod prelude;
pub mod results;
pub mod stream;
pub mod table;
pub mod transaction;
pub mod types;

#[cfg(feature = "mssql")]
pub mod mssql;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use error::SprocError;
