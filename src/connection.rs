//! The connectivity seam the executor drives.

use async_trait::async_trait;

use crate::error::SprocError;
use crate::params::ProcedureCall;
use crate::results::{ExecOutcome, ProcedureResult};
use crate::stream::RowStream;
use crate::transaction::Transaction;

/// One physical connection able to run stored procedures.
///
/// Implementations surface driver failures unchanged and never retry. Callers
/// (the executor) guarantee `open` has succeeded before any command method runs
/// and that at most one transaction is active.
#[async_trait]
pub trait ProcedureConnection: Send {
    fn is_open(&self) -> bool;

    async fn open(&mut self) -> Result<(), SprocError>;

    async fn begin_transaction(&mut self, tx: &Transaction) -> Result<(), SprocError>;

    async fn commit_transaction(&mut self, tx: Transaction) -> Result<(), SprocError>;

    async fn rollback_transaction(&mut self, tx: Transaction) -> Result<(), SprocError>;

    /// Run the call for its side effects and return the affected row count plus
    /// output parameter values.
    async fn execute(
        &mut self,
        call: &ProcedureCall,
        tx: Option<&Transaction>,
    ) -> Result<ExecOutcome, SprocError>;

    /// Run the call and stream the rows of its first result set.
    async fn query<'a>(
        &'a mut self,
        call: &ProcedureCall,
        tx: Option<&Transaction>,
    ) -> Result<RowStream<'a>, SprocError>;

    /// Run the call and materialize every result set plus output parameters.
    async fn query_multiple(
        &mut self,
        call: &ProcedureCall,
        tx: Option<&Transaction>,
    ) -> Result<ProcedureResult, SprocError>;

    /// Release the physical connection. Calling it on a closed connection is a no-op.
    async fn close(&mut self) -> Result<(), SprocError>;
}
