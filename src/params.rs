//! Procedure parameters and the immutable call description.

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SprocError;
use crate::table::TableValue;
use crate::types::{RowValues, SqlType};

lazy_static! {
    // One to four dot separated parts: server.database.schema.name
    static ref PROCEDURE_NAME: Regex = Regex::new(
        r"^(?:\[(?:[^\]]|\]\])+\]|[A-Za-z_#][A-Za-z0-9_@$#]*)(?:\.(?:\[(?:[^\]]|\]\])+\]|[A-Za-z_][A-Za-z0-9_@$#]*)){0,3}$"
    )
    .expect("procedure name pattern is valid");
    static ref PARAMETER_NAME: Regex =
        Regex::new(r"^@?[A-Za-z_][A-Za-z0-9_@$#]*$").expect("parameter name pattern is valid");
}

/// Direction of a procedure parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamDirection {
    #[default]
    Input,
    InputOutput,
    Output,
}

impl ParamDirection {
    /// Check if this parameter sends a value to the procedure
    #[must_use]
    pub fn is_input(self) -> bool {
        matches!(self, ParamDirection::Input | ParamDirection::InputOutput)
    }

    /// Check if this parameter receives a value from the procedure
    #[must_use]
    pub fn is_output(self) -> bool {
        matches!(self, ParamDirection::Output | ParamDirection::InputOutput)
    }
}

/// Scalar or table-valued parameter payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(RowValues),
    Table(TableValue),
}

impl From<RowValues> for ParamValue {
    fn from(value: RowValues) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<TableValue> for ParamValue {
    fn from(value: TableValue) -> Self {
        ParamValue::Table(value)
    }
}

/// A named procedure parameter.
///
/// Names are stored without the leading `@`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcParam {
    name: String,
    value: ParamValue,
    direction: ParamDirection,
    sql_type: Option<SqlType>,
}

impl ProcParam {
    /// Input parameter.
    ///
    /// ```rust
    /// use sproc_middleware::prelude::*;
    ///
    /// let id = ProcParam::input("@Id", 7);
    /// assert_eq!(id.name(), "Id");
    /// assert_eq!(id.direction(), ParamDirection::Input);
    /// ```
    pub fn input(name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        Self::scalar(name, value.into(), ParamDirection::Input)
    }

    /// Parameter whose value is sent in and read back after the call.
    pub fn input_output(name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        Self::scalar(name, value.into(), ParamDirection::InputOutput)
    }

    /// Output-only parameter of the given declared type.
    pub fn output(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self::scalar(name, RowValues::Null, ParamDirection::Output).with_type(sql_type)
    }

    /// Table-valued input parameter. The table should carry its SQL type name.
    pub fn table(name: impl Into<String>, table: TableValue) -> Self {
        Self {
            name: strip_at(name.into()),
            value: ParamValue::Table(table),
            direction: ParamDirection::Input,
            sql_type: None,
        }
    }

    fn scalar(name: impl Into<String>, value: RowValues, direction: ParamDirection) -> Self {
        Self {
            name: strip_at(name.into()),
            value: ParamValue::Scalar(value),
            direction,
            sql_type: None,
        }
    }

    /// Override the declared type used for output variables.
    #[must_use]
    pub fn with_type(mut self, sql_type: SqlType) -> Self {
        self.sql_type = Some(sql_type);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    #[must_use]
    pub fn direction(&self) -> ParamDirection {
        self.direction
    }

    /// The scalar value, or `None` for table-valued parameters.
    #[must_use]
    pub fn scalar_value(&self) -> Option<&RowValues> {
        match &self.value {
            ParamValue::Scalar(v) => Some(v),
            ParamValue::Table(_) => None,
        }
    }

    /// Declared type: explicit override, else inferred from the value, else `NVarChar`.
    #[must_use]
    pub fn declared_type(&self) -> SqlType {
        self.sql_type
            .or_else(|| self.scalar_value().and_then(SqlType::of_value))
            .unwrap_or(SqlType::NVarChar)
    }
}

fn strip_at(name: String) -> String {
    match name.strip_prefix('@') {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

/// True for a one to four part SQL object name, bare or bracketed.
pub(crate) fn is_object_name(name: &str) -> bool {
    PROCEDURE_NAME.is_match(name)
}

/// Check a procedure name before it is rendered into a command.
///
/// # Errors
///
/// Returns `SprocError::ParameterError` if the name is not a one to four part identifier.
pub fn validate_procedure_name(name: &str) -> Result<(), SprocError> {
    if is_object_name(name) {
        Ok(())
    } else {
        Err(SprocError::ParameterError(format!(
            "invalid stored procedure name: {name:?}"
        )))
    }
}

/// An immutable stored-procedure invocation.
#[derive(Debug, Clone)]
pub struct ProcedureCall {
    procedure: String,
    params: Vec<ProcParam>,
    timeout: Duration,
}

impl ProcedureCall {
    /// Validate and freeze a call.
    ///
    /// # Errors
    ///
    /// Returns `SprocError::ParameterError` for an invalid procedure or parameter name,
    /// a duplicated parameter name, or a table-valued parameter that is not input-only.
    pub fn new(
        procedure: impl Into<String>,
        params: Vec<ProcParam>,
        timeout: Duration,
    ) -> Result<Self, SprocError> {
        let procedure = procedure.into();
        validate_procedure_name(&procedure)?;
        for (i, param) in params.iter().enumerate() {
            if !PARAMETER_NAME.is_match(&param.name) {
                return Err(SprocError::ParameterError(format!(
                    "invalid parameter name {:?} for {procedure}",
                    param.name
                )));
            }
            if params[..i]
                .iter()
                .any(|p| p.name.eq_ignore_ascii_case(&param.name))
            {
                return Err(SprocError::ParameterError(format!(
                    "parameter @{} supplied twice for {procedure}",
                    param.name
                )));
            }
            if matches!(param.value, ParamValue::Table(_)) && param.direction.is_output() {
                return Err(SprocError::ParameterError(format!(
                    "table-valued parameter @{} must be input-only",
                    param.name
                )));
            }
        }
        Ok(Self {
            procedure,
            params,
            timeout,
        })
    }

    #[must_use]
    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    /// Parameters in caller order.
    #[must_use]
    pub fn params(&self) -> &[ProcParam] {
        &self.params
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedure_names() {
        for ok in ["GetUser", "dbo.GetUser", "[dbo].[Get User]", "srv.db.dbo.p_1", "#temp_proc"] {
            assert!(validate_procedure_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", "GetUser; DROP TABLE x", "a.b.c.d.e", "1abc", "dbo..x", "[x"] {
            assert!(validate_procedure_name(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn duplicate_and_invalid_params_rejected() {
        let dup = ProcedureCall::new(
            "p",
            vec![ProcParam::input("Id", 1), ProcParam::input("@id", 2)],
            Duration::from_secs(1),
        );
        assert!(matches!(dup, Err(SprocError::ParameterError(_))));

        let bad = ProcedureCall::new(
            "p",
            vec![ProcParam::input("x; --", 1)],
            Duration::from_secs(1),
        );
        assert!(matches!(bad, Err(SprocError::ParameterError(_))));
    }

    #[test]
    fn declared_types() {
        assert_eq!(ProcParam::input("a", 1).declared_type(), SqlType::BigInt);
        assert_eq!(ProcParam::output("b", SqlType::Int).declared_type(), SqlType::Int);
        assert_eq!(
            ProcParam::input_output("c", RowValues::Null).declared_type(),
            SqlType::NVarChar
        );
        assert!(ProcParam::output("b", SqlType::Int).direction().is_output());
    }
}
