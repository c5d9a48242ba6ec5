use tiberius::{Client, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncWriteCompatExt;

use super::config::{MssqlClient, MssqlOptions};
use crate::error::SprocError;

/// Open a new SQL Server connection
///
/// Named instances are resolved through the SQL Browser service.
///
/// # Errors
/// Returns `SprocError::ConnectionError` if the TCP or TDS handshake fails.
pub async fn create_mssql_client(opts: &MssqlOptions) -> Result<MssqlClient, SprocError> {
    let config = opts.tiberius_config();

    let tcp = if opts.instance_name.is_some() {
        TcpStream::connect_named(&config).await.map_err(|e| {
            SprocError::ConnectionError(format!("SQL Browser lookup failed: {e}"))
        })?
    } else {
        TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| SprocError::ConnectionError(format!("TCP connection error: {e}")))?
    };
    tcp.set_nodelay(true)
        .map_err(|e| SprocError::ConnectionError(format!("TCP configuration error: {e}")))?;

    // Make compatible with Tiberius
    let tcp = tcp.compat_write();

    Client::connect(config, tcp)
        .await
        .map_err(|e| SprocError::ConnectionError(format!("SQL Server connection error: {e}")))
}
