//! Typed fetch operations offered to application code.

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::connection::ProcedureConnection;
use crate::conversion::{FromRowValue, coerce_strict};
use crate::error::SprocError;
use crate::executor::ProcedureExecutor;
use crate::mapping::Record;
use crate::params::ProcParam;
use crate::results::{ExecOutcome, ProcedureResult, ResultSet};
use crate::types::RowValues;

/// Stored-procedure call surface.
///
/// Every operation delegates to the executor and the row mapper; none adds
/// behavior of its own.
#[async_trait]
pub trait StoredProcedures: Send {
    /// Run a procedure and return the affected row count.
    async fn execute(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<usize, SprocError>;

    /// Run a procedure and return the affected row count with output parameter values.
    async fn execute_with_outputs(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ExecOutcome, SprocError>;

    /// First column of the first row, converted to `T`. No rows reads as NULL.
    async fn get_scalar<T: FromRowValue + Send>(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<T, SprocError>;

    /// First row mapped by name, or `None` if the procedure returned no rows.
    async fn get_record<T: Record + Send>(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<Option<T>, SprocError>;

    /// Every row of the first result set mapped by name.
    async fn get_table<T: Record + Send>(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<Vec<T>, SprocError>;

    /// The first result set, unmapped.
    async fn get_raw_table(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ResultSet, SprocError>;

    /// Every result set plus output parameter values.
    async fn get_data(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ProcedureResult, SprocError>;
}

#[async_trait]
impl<C: ProcedureConnection> StoredProcedures for ProcedureExecutor<C> {
    async fn execute(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<usize, SprocError> {
        self.exec_non_query(procedure, params).await
    }

    async fn execute_with_outputs(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ExecOutcome, SprocError> {
        self.exec_with_outputs(procedure, params).await
    }

    async fn get_scalar<T: FromRowValue + Send>(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<T, SprocError> {
        let mut rows = self.query_rows(procedure, params).await?;
        let first = rows.next().await.transpose()?;
        rows.close();
        let raw = first
            .and_then(|row| row.rows.into_iter().next())
            .unwrap_or(RowValues::Null);
        coerce_strict::<T>(raw)
    }

    async fn get_record<T: Record + Send>(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<Option<T>, SprocError> {
        let mut records = self.query_records::<T>(procedure, params).await?;
        let first = records.next().await.transpose()?;
        records.close();
        Ok(first)
    }

    async fn get_table<T: Record + Send>(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<Vec<T>, SprocError> {
        self.query_record_vec::<T>(procedure, params).await
    }

    async fn get_raw_table(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ResultSet, SprocError> {
        self.query_result_set(procedure, params).await
    }

    async fn get_data(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ProcedureResult, SprocError> {
        self.query_data(procedure, params).await
    }
}
