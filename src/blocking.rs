//! Blocking facade over [`ProcedureExecutor`].
//!
//! Each call blocks the current thread on a private current-thread runtime for as
//! long as the async variant would suspend. Do not use it from inside an async
//! context.

use tokio::runtime::{Builder, Runtime};

use futures_util::StreamExt;

use crate::config::ExecutorOptions;
use crate::connection::ProcedureConnection;
use crate::contract::StoredProcedures;
use crate::conversion::FromRowValue;
use crate::error::SprocError;
use crate::executor::ProcedureExecutor;
use crate::mapping::{MapStrategy, Record};
use crate::params::ProcParam;
use crate::results::{CustomDbRow, ExecOutcome, ProcedureResult, ResultSet};
use crate::stream::{RecordStream, RowStream};

/// Synchronous twin of [`ProcedureExecutor`] with the same semantics.
pub struct BlockingProcedureExecutor<C: ProcedureConnection> {
    runtime: Runtime,
    inner: ProcedureExecutor<C>,
}

impl<C: ProcedureConnection> BlockingProcedureExecutor<C> {
    /// # Errors
    ///
    /// Returns `SprocError::ConfigError` if the runtime cannot be built.
    pub fn new(conn: C) -> Result<Self, SprocError> {
        Self::with_options(conn, ExecutorOptions::default())
    }

    /// # Errors
    ///
    /// Returns `SprocError::ConfigError` if the runtime cannot be built.
    pub fn with_options(conn: C, options: ExecutorOptions) -> Result<Self, SprocError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SprocError::ConfigError(format!("failed to build runtime: {e}")))?;
        Ok(Self {
            runtime,
            inner: ProcedureExecutor::with_options(conn, options),
        })
    }

    /// The wrapped async executor.
    pub fn executor(&self) -> &ProcedureExecutor<C> {
        &self.inner
    }

    /// # Errors
    ///
    /// See [`ProcedureExecutor::exec_non_query`].
    pub fn exec_non_query(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<usize, SprocError> {
        self.runtime
            .block_on(self.inner.exec_non_query(procedure, params))
    }

    /// # Errors
    ///
    /// See [`ProcedureExecutor::exec_with_outputs`].
    pub fn exec_with_outputs(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ExecOutcome, SprocError> {
        self.runtime
            .block_on(self.inner.exec_with_outputs(procedure, params))
    }

    /// # Errors
    ///
    /// See [`ProcedureExecutor::query_rows`].
    pub fn query_rows(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<RowIter<'_>, SprocError> {
        let runtime = &self.runtime;
        let stream = runtime.block_on(self.inner.query_rows(procedure, params))?;
        Ok(RowIter { runtime, stream })
    }

    /// # Errors
    ///
    /// See [`ProcedureExecutor::query_records`].
    pub fn query_records<T: Record>(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<RecordIter<'_, T>, SprocError> {
        self.query_records_with(MapStrategy::ByName, procedure, params)
    }

    /// # Errors
    ///
    /// See [`ProcedureExecutor::query_records_with`].
    pub fn query_records_with<T: Record>(
        &mut self,
        strategy: MapStrategy,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<RecordIter<'_, T>, SprocError> {
        let runtime = &self.runtime;
        let stream = runtime.block_on(
            self.inner
                .query_records_with::<T>(strategy, procedure, params),
        )?;
        Ok(RecordIter { runtime, stream })
    }

    /// # Errors
    ///
    /// See [`ProcedureExecutor::query_data`].
    pub fn query_data(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ProcedureResult, SprocError> {
        self.runtime.block_on(self.inner.query_data(procedure, params))
    }

    /// # Errors
    ///
    /// See [`StoredProcedures::get_scalar`].
    pub fn get_scalar<T: FromRowValue + Send>(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<T, SprocError> {
        self.runtime
            .block_on(self.inner.get_scalar::<T>(procedure, params))
    }

    /// # Errors
    ///
    /// See [`StoredProcedures::get_record`].
    pub fn get_record<T: Record + Send>(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<Option<T>, SprocError> {
        self.runtime
            .block_on(self.inner.get_record::<T>(procedure, params))
    }

    /// # Errors
    ///
    /// See [`StoredProcedures::get_table`].
    pub fn get_table<T: Record + Send>(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<Vec<T>, SprocError> {
        self.runtime
            .block_on(self.inner.get_table::<T>(procedure, params))
    }

    /// # Errors
    ///
    /// See [`StoredProcedures::get_raw_table`].
    pub fn get_raw_table(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ResultSet, SprocError> {
        self.runtime
            .block_on(self.inner.get_raw_table(procedure, params))
    }

    /// # Errors
    ///
    /// See [`StoredProcedures::get_data`].
    pub fn get_data(
        &mut self,
        procedure: &str,
        params: Vec<ProcParam>,
    ) -> Result<ProcedureResult, SprocError> {
        self.runtime.block_on(self.inner.get_data(procedure, params))
    }

    /// # Errors
    ///
    /// See [`ProcedureExecutor::begin_transaction`].
    pub fn begin_transaction(&mut self) -> Result<(), SprocError> {
        self.runtime.block_on(self.inner.begin_transaction())
    }

    /// # Errors
    ///
    /// See [`ProcedureExecutor::commit_transaction`].
    pub fn commit_transaction(&mut self) -> Result<(), SprocError> {
        self.runtime.block_on(self.inner.commit_transaction())
    }

    /// # Errors
    ///
    /// See [`ProcedureExecutor::rollback_transaction`].
    pub fn rollback_transaction(&mut self) -> Result<(), SprocError> {
        self.runtime.block_on(self.inner.rollback_transaction())
    }

    /// # Errors
    ///
    /// See [`ProcedureExecutor::close`].
    pub fn close(self) -> Result<(), SprocError> {
        let Self { runtime, inner } = self;
        runtime.block_on(inner.close())
    }
}

/// Blocking iterator over raw rows; holds the cursor like [`RowStream`].
pub struct RowIter<'a> {
    runtime: &'a Runtime,
    stream: RowStream<'a>,
}

impl RowIter<'_> {
    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.stream.columns()
    }

    /// Release the cursor without reading the remaining rows.
    pub fn close(self) {
        self.stream.close();
    }
}

impl Iterator for RowIter<'_> {
    type Item = Result<CustomDbRow, SprocError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}

/// Blocking iterator over mapped records; holds the cursor like [`RecordStream`].
pub struct RecordIter<'a, T> {
    runtime: &'a Runtime,
    stream: RecordStream<'a, T>,
}

impl<T: Record> RecordIter<'_, T> {
    /// Release the cursor without reading the remaining rows.
    pub fn close(self) {
        self.stream.close();
    }
}

impl<T: Record> Iterator for RecordIter<'_, T> {
    type Item = Result<T, SprocError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}
