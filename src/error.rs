use thiserror::Error;

#[derive(Debug, Error)]
pub enum SprocError {
    /// The record type cannot be used as a mapping target or source.
    #[error("Record shape error: {0}")]
    TypeShapeError(String),

    /// A raw value could not be coerced to the declared member type.
    #[error("Value conversion error: {0}")]
    ConversionError(String),

    /// Commit, rollback or begin issued in the wrong transaction state.
    #[error("Transaction state error: {0}")]
    TransactionStateError(String),

    /// The procedure call failed in the connectivity layer (including timeouts).
    #[error("Command execution error: {0}")]
    CommandExecutionError(String),

    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),
}

impl SprocError {
    /// True for failures raised by the database collaborator rather than by mapping
    /// or caller misuse.
    #[must_use]
    pub fn is_command_failure(&self) -> bool {
        match self {
            SprocError::CommandExecutionError(_) | SprocError::ConnectionError(_) => true,
            #[cfg(feature = "mssql")]
            SprocError::MssqlError(_) => true,
            _ => false,
        }
    }

    /// Prefix a conversion error with the member it was raised for.
    pub(crate) fn for_member(self, member: &str) -> Self {
        match self {
            SprocError::ConversionError(msg) => {
                SprocError::ConversionError(format!("member `{member}`: {msg}"))
            }
            other => other,
        }
    }
}
