use serde::Deserialize;
use tiberius::{AuthMethod, Config as TiberiusConfig};
use tokio::net::TcpStream;
use tokio_util::compat::Compat;

use crate::error::SprocError;

/// Type alias for SQL Server client
pub type MssqlClient = tiberius::Client<Compat<TcpStream>>;

/// Options for connecting to SQL Server.
///
/// Deserializes from JSON with the same field names; `port` defaults to 1433 and
/// `trust_cert` to `false`.
#[derive(Clone, Deserialize)]
pub struct MssqlOptions {
    pub server: String,
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub trust_cert: bool,
}

impl std::fmt::Debug for MssqlOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlOptions")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("port", &self.port)
            .field("instance_name", &self.instance_name)
            .field("trust_cert", &self.trust_cert)
            .finish_non_exhaustive()
    }
}

impl MssqlOptions {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            server,
            database,
            user,
            password,
            port: None,
            instance_name: None,
            trust_cert: false,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_instance_name(mut self, instance_name: Option<String>) -> Self {
        self.instance_name = instance_name;
        self
    }

    /// Accept the server certificate without validation (development servers).
    #[must_use]
    pub fn with_trust_cert(mut self, trust_cert: bool) -> Self {
        self.trust_cert = trust_cert;
        self
    }

    /// Read options from `SPROC_MSSQL_SERVER`, `SPROC_MSSQL_DATABASE`,
    /// `SPROC_MSSQL_USER`, `SPROC_MSSQL_PASSWORD` and the optional
    /// `SPROC_MSSQL_PORT`, `SPROC_MSSQL_INSTANCE`, `SPROC_MSSQL_TRUST_CERT`.
    ///
    /// # Errors
    ///
    /// Returns `SprocError::ConfigError` if a required variable is missing or the
    /// port is not a number.
    pub fn from_env() -> Result<Self, SprocError> {
        fn required(key: &str) -> Result<String, SprocError> {
            std::env::var(key).map_err(|_| SprocError::ConfigError(format!("{key} is not set")))
        }
        let port = match std::env::var("SPROC_MSSQL_PORT") {
            Ok(p) => Some(p.parse::<u16>().map_err(|e| {
                SprocError::ConfigError(format!("SPROC_MSSQL_PORT is not a port: {e}"))
            })?),
            Err(_) => None,
        };
        Ok(Self::new(
            required("SPROC_MSSQL_SERVER")?,
            required("SPROC_MSSQL_DATABASE")?,
            required("SPROC_MSSQL_USER")?,
            required("SPROC_MSSQL_PASSWORD")?,
        )
        .with_port(port)
        .with_instance_name(std::env::var("SPROC_MSSQL_INSTANCE").ok())
        .with_trust_cert(
            std::env::var("SPROC_MSSQL_TRUST_CERT").is_ok_and(|v| v == "1" || v == "true"),
        ))
    }

    pub(crate) fn tiberius_config(&self) -> TiberiusConfig {
        let mut config = TiberiusConfig::new();
        config.host(&self.server);
        config.database(&self.database);
        config.port(self.port.unwrap_or(1433));
        config.authentication(AuthMethod::sql_server(&self.user, &self.password));
        if let Some(instance) = &self.instance_name {
            config.instance_name(instance);
        }
        if self.trust_cert {
            config.trust_cert();
        }
        config
    }
}
