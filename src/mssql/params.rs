use tiberius::{Command, Query};

use crate::types::{RowValues, SqlType};

/// SQL Server accepts at most 2100 parameters per request.
pub(crate) const MAX_BOUND_PARAMS: usize = 2100;

/// Build a query with every value bound as `@P1..@Pn`, in order.
///
/// Values are moved into the query so it owns its data.
pub(crate) fn bind_query_params(sql: String, params: Vec<RowValues>) -> Query<'static> {
    let mut query = Query::new(sql);

    for param in params {
        match param {
            RowValues::Int(i) => query.bind(i),
            RowValues::Float(f) => query.bind(f),
            RowValues::Text(s) => query.bind(s),
            RowValues::Bool(b) => query.bind(b),
            RowValues::Timestamp(dt) => query.bind(dt),
            RowValues::Null => query.bind(Option::<String>::None),
            RowValues::JSON(json) => query.bind(json.to_string()),
            RowValues::Blob(bytes) => query.bind(bytes),
        }
    }

    query
}

/// Build an `sp_executesql` command running `sql` with the same `@P1..@Pn` binds.
///
/// Going through a command instead of a plain batch keeps the per-statement
/// `RowsAffected` items visible to the caller.
pub(crate) fn bind_command_params(sql: String, params: Vec<RowValues>) -> Command<'static> {
    let mut command = Command::new("sp_executesql");
    command.bind_param("@stmt", sql);
    if !params.is_empty() {
        command.bind_param("@params", param_declarations(&params));
    }

    for (i, param) in params.into_iter().enumerate() {
        let name = format!("@P{}", i + 1);
        match param {
            RowValues::Int(i) => command.bind_param(name, i),
            RowValues::Float(f) => command.bind_param(name, f),
            RowValues::Text(s) => command.bind_param(name, s),
            RowValues::Bool(b) => command.bind_param(name, b),
            RowValues::Timestamp(dt) => command.bind_param(name, dt),
            RowValues::Null => command.bind_param(name, Option::<String>::None),
            RowValues::JSON(json) => command.bind_param(name, json.to_string()),
            RowValues::Blob(bytes) => command.bind_param(name, bytes),
        }
    }

    command
}

/// The `@params` declaration list `sp_executesql` expects for `params`.
fn param_declarations(params: &[RowValues]) -> String {
    params
        .iter()
        .enumerate()
        .map(|(i, value)| {
            // NULL carries no type of its own; text converts to any target.
            let decl = SqlType::of_value(value).map_or("NVARCHAR(MAX)", SqlType::mssql_decl);
            format!("@P{} {decl}", i + 1)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_follow_bind_order() {
        let params = vec![
            RowValues::Int(7),
            RowValues::Text("Ann".into()),
            RowValues::Null,
            RowValues::Blob(vec![1, 2]),
            RowValues::Bool(true),
        ];
        assert_eq!(
            param_declarations(&params),
            "@P1 BIGINT, @P2 NVARCHAR(MAX), @P3 NVARCHAR(MAX), @P4 VARBINARY(MAX), @P5 BIT"
        );
    }

    #[test]
    fn no_params_means_no_declarations() {
        assert_eq!(param_declarations(&[]), "");
    }
}
