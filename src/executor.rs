//! The procedure executor: connection lifecycle, transactions and call dispatch.

use std::future::Future;
use std::time::Duration;

use futures_util::TryStreamExt;
use tracing::debug;

use crate::config::ExecutorOptions;
use crate::connection::ProcedureConnection;
use crate::error::SprocError;
use crate::mapping::{MapStrategy, Record};
use crate::params::{ProcParam, ProcedureCall};
use crate::results::{ExecOutcome, ProcedureResult, ResultSet};
use crate::stream::{RecordStream, RowStream};
use crate::transaction::Transaction;

/// Runs stored procedures over one exclusively owned connection.
///
/// The connection is opened on first use and stays open until [`close`](Self::close)
/// or drop. At most one transaction is active at a time; while it is, every call
/// runs inside it. `&mut self` on every operation serializes use of the connection.
///
/// ```rust,no_run
/// use sproc_middleware::prelude::*;
/// use sproc_middleware::mssql::{MssqlConnection, MssqlOptions};
///
/// # async fn demo() -> Result<(), SprocError> {
/// let opts = MssqlOptions::new("localhost".into(), "app".into(), "sa".into(), "secret".into());
/// let mut exec = ProcedureExecutor::new(MssqlConnection::new(opts));
/// let affected = exec
///     .exec_non_query("DeactivateUser", vec![ProcParam::input("Id", 7)])
///     .await?;
/// assert_eq!(affected, 1);
/// exec.close().await
/// # }
/// ```
#[derive(Debug)]
pub struct ProcedureExecutor<C: ProcedureConnection> {
    conn: C,
    options: ExecutorOptions,
    active_tx: Option<Transaction>,
    tx_counter: u64,
}

impl<C: ProcedureConnection> ProcedureExecutor<C> {
    /// Wrap a connection with default options.
    pub fn new(conn: C) -> Self {
        Self::with_options(conn, ExecutorOptions::default())
    }

    pub fn with_options(conn: C, options: ExecutorOptions) -> Self {
        Self {
            conn,
            options,
            active_tx: None,
            tx_counter: 0,
        }
    }

    /// Borrow the underlying connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// The active transaction, if any.
    pub fn transaction(&self) -> Option<&Transaction> {
        self.active_tx.as_ref()
    }

    pub fn in_transaction(&self) -> bool {
        self.active_tx.is_some()
    }

    async fn ensure_open(&mut self) -> Result<(), SprocError> {
        if !self.conn.is_open() {
            debug!("opening procedure connection");
            let timeout = self.options.command_timeout();
            with_timeout(timeout, "connection open", self.conn.open()).await?;
        }
        Ok(())
    }

    fn build_call(
        &self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ProcedureCall, SprocError> {
        let call = ProcedureCall::new(procedure, params, self.options.command_timeout())?;
        debug!(
            procedure = call.procedure(),
            params = call.params().len(),
            in_transaction = self.active_tx.is_some(),
            "dispatching stored procedure"
        );
        Ok(call)
    }

    /// Run a procedure for its side effects and return the affected row count.
    ///
    /// # Errors
    ///
    /// Parameter validation errors, connection failures, driver errors, or
    /// `SprocError::CommandExecutionError` on timeout.
    pub async fn exec_non_query(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<usize, SprocError> {
        Ok(self.exec_with_outputs(procedure, params).await?.affected)
    }

    /// Like [`exec_non_query`](Self::exec_non_query), also returning the final
    /// values of `Output` and `InputOutput` parameters.
    ///
    /// # Errors
    ///
    /// Same as [`exec_non_query`](Self::exec_non_query).
    pub async fn exec_with_outputs(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ExecOutcome, SprocError> {
        let call = self.build_call(procedure, params)?;
        self.ensure_open().await?;
        let tx = self.active_tx.as_ref();
        with_timeout(call.timeout(), call.procedure(), self.conn.execute(&call, tx)).await
    }

    /// Run a procedure and stream its first result set as raw rows.
    ///
    /// # Errors
    ///
    /// Same as [`exec_non_query`](Self::exec_non_query); row errors arrive through the stream.
    pub async fn query_rows(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<RowStream<'_>, SprocError> {
        let call = self.build_call(procedure, params)?;
        self.ensure_open().await?;
        let tx = self.active_tx.as_ref();
        with_timeout(call.timeout(), call.procedure(), self.conn.query(&call, tx)).await
    }

    /// Run a procedure and stream its first result set mapped by column name.
    ///
    /// # Errors
    ///
    /// Same as [`query_rows`](Self::query_rows); mapping errors arrive through the stream.
    pub async fn query_records<T: Record>(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<RecordStream<'_, T>, SprocError> {
        self.query_records_with(MapStrategy::ByName, procedure, params)
            .await
    }

    /// Like [`query_records`](Self::query_records) with an explicit mapping strategy.
    ///
    /// # Errors
    ///
    /// Same as [`query_rows`](Self::query_rows).
    pub async fn query_records_with<T: Record>(
        &mut self,
        strategy: MapStrategy,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<RecordStream<'_, T>, SprocError> {
        let rows = self.query_rows(procedure, params).await?;
        Ok(RecordStream::new(rows, strategy))
    }

    /// Run a procedure and materialize its first result set.
    ///
    /// # Errors
    ///
    /// Same as [`query_rows`](Self::query_rows), plus any row error.
    pub async fn query_result_set(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ResultSet, SprocError> {
        self.query_rows(procedure, params)
            .await?
            .collect_result_set()
            .await
    }

    /// Run a procedure and materialize its first result set as records.
    ///
    /// # Errors
    ///
    /// Same as [`query_records`](Self::query_records), plus any mapping error.
    pub async fn query_record_vec<T: Record>(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<Vec<T>, SprocError> {
        self.query_records::<T>(procedure, params)
            .await?
            .try_collect()
            .await
    }

    /// Run a procedure and collect every result set plus output parameter values.
    ///
    /// # Errors
    ///
    /// Same as [`exec_non_query`](Self::exec_non_query).
    pub async fn query_data(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ProcedureResult, SprocError> {
        let call = self.build_call(procedure, params)?;
        self.ensure_open().await?;
        let tx = self.active_tx.as_ref();
        with_timeout(
            call.timeout(),
            call.procedure(),
            self.conn.query_multiple(&call, tx),
        )
        .await
    }

    /// Start a transaction; subsequent calls run inside it.
    ///
    /// Begin, commit and rollback are bounded by the command timeout like any call.
    ///
    /// # Errors
    ///
    /// `SprocError::TransactionStateError` if one is already active, the driver
    /// error, or `SprocError::CommandExecutionError` on timeout.
    pub async fn begin_transaction(&mut self) -> Result<(), SprocError> {
        if let Some(tx) = &self.active_tx {
            return Err(SprocError::TransactionStateError(format!(
                "transaction {} is already active",
                tx.id()
            )));
        }
        self.ensure_open().await?;
        self.tx_counter += 1;
        let tx = Transaction::new(self.tx_counter);
        let timeout = self.options.command_timeout();
        with_timeout(timeout, "begin transaction", self.conn.begin_transaction(&tx)).await?;
        debug!(tx = tx.id(), "transaction started");
        self.active_tx = Some(tx);
        Ok(())
    }

    /// Commit and release the active transaction.
    ///
    /// The transaction is released even if the commit fails or times out.
    ///
    /// # Errors
    ///
    /// `SprocError::TransactionStateError` with no active transaction, the driver
    /// error, or `SprocError::CommandExecutionError` on timeout.
    pub async fn commit_transaction(&mut self) -> Result<(), SprocError> {
        let tx = self.take_transaction("commit")?;
        let id = tx.id();
        let timeout = self.options.command_timeout();
        with_timeout(timeout, "commit", self.conn.commit_transaction(tx)).await?;
        debug!(tx = id, "transaction committed");
        Ok(())
    }

    /// Roll back and release the active transaction.
    ///
    /// # Errors
    ///
    /// `SprocError::TransactionStateError` with no active transaction, the driver
    /// error, or `SprocError::CommandExecutionError` on timeout.
    pub async fn rollback_transaction(&mut self) -> Result<(), SprocError> {
        let tx = self.take_transaction("rollback")?;
        let id = tx.id();
        let timeout = self.options.command_timeout();
        with_timeout(timeout, "rollback", self.conn.rollback_transaction(tx)).await?;
        debug!(tx = id, "transaction rolled back");
        Ok(())
    }

    fn take_transaction(&mut self, action: &str) -> Result<Transaction, SprocError> {
        self.active_tx.take().ok_or_else(|| {
            SprocError::TransactionStateError(format!("{action} called with no active transaction"))
        })
    }

    /// Roll back any active transaction and close the connection.
    ///
    /// # Errors
    ///
    /// The first driver error; the connection is closed even if the rollback fails.
    pub async fn close(mut self) -> Result<(), SprocError> {
        let rollback = match self.active_tx.take() {
            Some(tx) => {
                debug!(tx = tx.id(), "rolling back transaction left open at close");
                let timeout = self.options.command_timeout();
                with_timeout(timeout, "rollback", self.conn.rollback_transaction(tx)).await
            }
            None => Ok(()),
        };
        let closed = self.conn.close().await;
        rollback.and(closed)
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    what: &str,
    fut: impl Future<Output = Result<T, SprocError>>,
) -> Result<T, SprocError> {
    tokio::time::timeout(timeout, fut).await.map_err(|_| {
        SprocError::CommandExecutionError(format!("{what} timed out after {timeout:?}"))
    })?
}
