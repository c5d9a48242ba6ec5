//! SQL Server backend over Tiberius.
//!
//! - `config`: connection options and the client type alias
//! - `client`: raw client creation
//! - `params`: binding `RowValues` as `@Pn` parameters
//! - `query`: rendering a procedure call as an `EXEC` batch and reading results
//! - `connection`: the `ProcedureConnection` implementation

mod client;
mod config;
mod connection;
mod params;
mod query;

pub use client::create_mssql_client;
pub use config::{MssqlClient, MssqlOptions};
pub use connection::MssqlConnection;
