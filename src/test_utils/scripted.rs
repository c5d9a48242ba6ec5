use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use crate::connection::ProcedureConnection;
use crate::error::SprocError;
use crate::params::{ProcParam, ProcedureCall};
use crate::results::{
    CustomDbRow, ExecOutcome, ProcedureResult, ResultSet, build_column_index,
};
use crate::stream::RowStream;
use crate::transaction::Transaction;
use crate::types::RowValues;

/// Canned outcome of one procedure.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResponse {
    sets: Vec<(Vec<String>, Vec<Vec<RowValues>>)>,
    affected: usize,
    outputs: HashMap<String, RowValues>,
    delay: Option<Duration>,
    fail_at_row: Option<usize>,
    error: Option<String>,
}

impl ScriptedResponse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result set.
    #[must_use]
    pub fn rows(mut self, columns: &[&str], rows: Vec<Vec<RowValues>>) -> Self {
        let columns = columns.iter().map(|c| (*c).to_string()).collect();
        self.sets.push((columns, rows));
        self
    }

    #[must_use]
    pub fn affected(mut self, affected: usize) -> Self {
        self.affected = affected;
        self
    }

    #[must_use]
    pub fn output(mut self, name: &str, value: impl Into<RowValues>) -> Self {
        self.outputs
            .insert(name.trim_start_matches('@').to_string(), value.into());
        self
    }

    /// Sleep before answering.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Yield an error in place of the row at `index` of the first result set.
    #[must_use]
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at_row = Some(index);
        self
    }

    /// Fail the command itself.
    #[must_use]
    pub fn failing(mut self, message: &str) -> Self {
        self.error = Some(message.to_string());
        self
    }
}

/// How a recorded call was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    NonQuery,
    Stream,
    Multiple,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub procedure: String,
    pub params: Vec<ProcParam>,
    pub mode: CallMode,
    /// Id of the transaction the call ran in.
    pub transaction: Option<u64>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEvent {
    Begin(u64),
    Commit(u64),
    Rollback(u64),
}

/// Everything a [`ScriptedConnection`] observed.
///
/// Shared through an `Arc` so it stays readable after the executor that owns the
/// connection has been closed.
#[derive(Debug, Default)]
pub struct Journal {
    calls: Mutex<Vec<RecordedCall>>,
    tx_events: Mutex<Vec<TxEvent>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    cursors_opened: AtomicUsize,
    cursors_released: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Journal {
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    #[must_use]
    pub fn tx_events(&self) -> Vec<TxEvent> {
        lock(&self.tx_events).clone()
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn cursors_opened(&self) -> usize {
        self.cursors_opened.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn cursors_released(&self) -> usize {
        self.cursors_released.load(Ordering::SeqCst)
    }
}

/// In-memory [`ProcedureConnection`] answering from per-procedure scripts.
///
/// Procedure names match case-insensitively. A call to a procedure without a
/// script fails with `CommandExecutionError`.
#[derive(Debug, Default)]
pub struct ScriptedConnection {
    scripts: HashMap<String, ScriptedResponse>,
    journal: Arc<Journal>,
    open: bool,
    fail_open: bool,
    tx_delay: Option<Duration>,
}

impl ScriptedConnection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_procedure(mut self, procedure: &str, response: ScriptedResponse) -> Self {
        self.scripts.insert(procedure.to_ascii_lowercase(), response);
        self
    }

    /// Make every `open` fail with `ConnectionError`.
    #[must_use]
    pub fn with_failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Sleep before answering begin, commit and rollback.
    #[must_use]
    pub fn with_transaction_delay(mut self, delay: Duration) -> Self {
        self.tx_delay = Some(delay);
        self
    }

    async fn tx_pause(&self) {
        if let Some(delay) = self.tx_delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Handle on the journal that outlives the connection.
    #[must_use]
    pub fn journal(&self) -> Arc<Journal> {
        self.journal.clone()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.journal.calls()
    }

    #[must_use]
    pub fn tx_events(&self) -> Vec<TxEvent> {
        self.journal.tx_events()
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.journal.open_count()
    }

    #[must_use]
    pub fn close_count(&self) -> usize {
        self.journal.close_count()
    }

    #[must_use]
    pub fn cursors_opened(&self) -> usize {
        self.journal.cursors_opened()
    }

    #[must_use]
    pub fn cursors_released(&self) -> usize {
        self.journal.cursors_released()
    }

    async fn dispatch(
        &mut self,
        call: &ProcedureCall,
        tx: Option<&Transaction>,
        mode: CallMode,
    ) -> Result<ScriptedResponse, SprocError> {
        if !self.open {
            return Err(SprocError::ConnectionError(
                "scripted connection is not open".to_string(),
            ));
        }
        lock(&self.journal.calls).push(RecordedCall {
            procedure: call.procedure().to_string(),
            params: call.params().to_vec(),
            mode,
            transaction: tx.map(Transaction::id),
            timeout: call.timeout(),
        });
        let response = self
            .scripts
            .get(&call.procedure().to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| {
                SprocError::CommandExecutionError(format!(
                    "no script for procedure {}",
                    call.procedure()
                ))
            })?;
        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &response.error {
            return Err(SprocError::CommandExecutionError(message.clone()));
        }
        Ok(response)
    }
}

/// Counts a cursor release when the row source is dropped.
struct CursorGuard(Arc<AtomicUsize>);

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProcedureConnection for ScriptedConnection {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> Result<(), SprocError> {
        if self.fail_open {
            return Err(SprocError::ConnectionError(
                "scripted open failure".to_string(),
            ));
        }
        self.open = true;
        self.journal.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn begin_transaction(&mut self, tx: &Transaction) -> Result<(), SprocError> {
        self.tx_pause().await;
        lock(&self.journal.tx_events).push(TxEvent::Begin(tx.id()));
        Ok(())
    }

    async fn commit_transaction(&mut self, tx: Transaction) -> Result<(), SprocError> {
        self.tx_pause().await;
        lock(&self.journal.tx_events).push(TxEvent::Commit(tx.id()));
        Ok(())
    }

    async fn rollback_transaction(&mut self, tx: Transaction) -> Result<(), SprocError> {
        self.tx_pause().await;
        lock(&self.journal.tx_events).push(TxEvent::Rollback(tx.id()));
        Ok(())
    }

    async fn execute(
        &mut self,
        call: &ProcedureCall,
        tx: Option<&Transaction>,
    ) -> Result<ExecOutcome, SprocError> {
        let response = self.dispatch(call, tx, CallMode::NonQuery).await?;
        Ok(ExecOutcome {
            affected: response.affected,
            outputs: response.outputs,
        })
    }

    async fn query<'a>(
        &'a mut self,
        call: &ProcedureCall,
        tx: Option<&Transaction>,
    ) -> Result<RowStream<'a>, SprocError> {
        let response = self.dispatch(call, tx, CallMode::Stream).await?;
        let (columns, rows) = response.sets.into_iter().next().unwrap_or_default();
        let columns = Arc::new(columns);
        let index = Arc::new(build_column_index(&columns));

        let items: Vec<Result<CustomDbRow, SprocError>> = rows
            .into_iter()
            .enumerate()
            .map(|(i, values)| {
                if response.fail_at_row == Some(i) {
                    Err(SprocError::CommandExecutionError(format!(
                        "scripted failure at row {i}"
                    )))
                } else {
                    Ok(CustomDbRow::with_index(columns.clone(), index.clone(), values))
                }
            })
            .collect();

        self.journal.cursors_opened.fetch_add(1, Ordering::SeqCst);
        let guard = CursorGuard(self.journal.cursors_released.clone());
        let rows = stream::unfold((items.into_iter(), guard), |(mut items, guard)| async move {
            items.next().map(|item| (item, (items, guard)))
        })
        .boxed();
        Ok(RowStream::new(columns, rows))
    }

    async fn query_multiple(
        &mut self,
        call: &ProcedureCall,
        tx: Option<&Transaction>,
    ) -> Result<ProcedureResult, SprocError> {
        let response = self.dispatch(call, tx, CallMode::Multiple).await?;
        let mut result = ProcedureResult {
            result_sets: Vec::with_capacity(response.sets.len()),
            outputs: response.outputs,
        };
        for (columns, rows) in response.sets {
            let mut set = ResultSet::new(columns);
            for row in rows {
                set.add_row_values(row)?;
            }
            result.result_sets.push(set);
        }
        Ok(result)
    }

    async fn close(&mut self) -> Result<(), SprocError> {
        if self.open {
            self.open = false;
            self.journal.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
