use async_trait::async_trait;
use tiberius::Query;
use tracing::debug;

use super::client::create_mssql_client;
use super::config::{MssqlClient, MssqlOptions};
use super::query::{execute_call, query_all, stream_call};
use crate::connection::ProcedureConnection;
use crate::error::SprocError;
use crate::params::ProcedureCall;
use crate::results::{ExecOutcome, ProcedureResult};
use crate::stream::RowStream;
use crate::transaction::Transaction;

/// A SQL Server connection opened lazily from [`MssqlOptions`].
///
/// Transactions are plain `BEGIN/COMMIT/ROLLBACK TRANSACTION` statements on the
/// session, so every command sent while one is active runs inside it.
pub struct MssqlConnection {
    options: MssqlOptions,
    client: Option<MssqlClient>,
}

impl MssqlConnection {
    #[must_use]
    pub fn new(options: MssqlOptions) -> Self {
        Self {
            options,
            client: None,
        }
    }

    #[must_use]
    pub fn options(&self) -> &MssqlOptions {
        &self.options
    }

    fn client(&mut self) -> Result<&mut MssqlClient, SprocError> {
        self.client.as_mut().ok_or_else(|| {
            SprocError::ConnectionError("SQL Server connection is not open".to_string())
        })
    }

    async fn simple(&mut self, sql: &'static str) -> Result<(), SprocError> {
        Query::new(sql).execute(self.client()?).await?;
        Ok(())
    }
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("options", &self.options)
            .field("open", &self.client.is_some())
            .finish()
    }
}

#[async_trait]
impl ProcedureConnection for MssqlConnection {
    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    async fn open(&mut self) -> Result<(), SprocError> {
        if self.client.is_none() {
            let client = create_mssql_client(&self.options).await?;
            debug!(
                server = %self.options.server,
                database = %self.options.database,
                "SQL Server connection opened"
            );
            self.client = Some(client);
        }
        Ok(())
    }

    async fn begin_transaction(&mut self, _tx: &Transaction) -> Result<(), SprocError> {
        self.simple("BEGIN TRANSACTION").await
    }

    async fn commit_transaction(&mut self, _tx: Transaction) -> Result<(), SprocError> {
        self.simple("COMMIT TRANSACTION").await
    }

    async fn rollback_transaction(&mut self, _tx: Transaction) -> Result<(), SprocError> {
        self.simple("ROLLBACK TRANSACTION").await
    }

    async fn execute(
        &mut self,
        call: &ProcedureCall,
        _tx: Option<&Transaction>,
    ) -> Result<ExecOutcome, SprocError> {
        execute_call(self.client()?, call).await
    }

    async fn query<'a>(
        &'a mut self,
        call: &ProcedureCall,
        _tx: Option<&Transaction>,
    ) -> Result<RowStream<'a>, SprocError> {
        stream_call(self.client()?, call).await
    }

    async fn query_multiple(
        &mut self,
        call: &ProcedureCall,
        _tx: Option<&Transaction>,
    ) -> Result<ProcedureResult, SprocError> {
        query_all(self.client()?, call).await
    }

    async fn close(&mut self) -> Result<(), SprocError> {
        if let Some(client) = self.client.take() {
            client.close().await?;
            debug!("SQL Server connection closed");
        }
        Ok(())
    }
}
