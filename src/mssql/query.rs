use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::future;
use futures_util::stream::{StreamExt, TryStreamExt};
use tiberius::{ColumnData, CommandItem, FromSql, QueryItem, Row};

use super::config::MssqlClient;
use super::params::{MAX_BOUND_PARAMS, bind_command_params, bind_query_params};
use crate::error::SprocError;
use crate::params::{ParamDirection, ParamValue, ProcedureCall, is_object_name};
use crate::results::{CustomDbRow, ExecOutcome, ProcedureResult, ResultSet};
use crate::stream::RowStream;
use crate::table::TableValue;
use crate::types::RowValues;

/// SQL Server accepts at most 1000 row constructors per `INSERT ... VALUES`.
const MAX_VALUES_ROWS: usize = 1000;

/// A call rendered as one parameterized T-SQL batch.
#[derive(Debug)]
pub(crate) struct ExecBatch {
    pub sql: String,
    pub binds: Vec<RowValues>,
    /// Names of the output parameters selected at the end of the batch, in order.
    pub outputs: Vec<String>,
}

/// Quote an identifier with brackets.
fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Render `call` as `EXEC` with named arguments.
///
/// Input scalars bind directly. Output and input/output parameters go through a
/// declared variable passed with `OUTPUT`. Table-valued parameters are declared as
/// their table type and filled with parameterized inserts. With `select_outputs`
/// the batch ends with one row holding every output variable.
pub(crate) fn render_exec_batch(
    call: &ProcedureCall,
    select_outputs: bool,
) -> Result<ExecBatch, SprocError> {
    let mut prelude = String::new();
    let mut binds: Vec<RowValues> = Vec::new();
    let mut args = Vec::with_capacity(call.params().len());
    let mut output_vars = Vec::new();
    let mut fills_tables = false;

    for (i, param) in call.params().iter().enumerate() {
        let name = param.name();
        match param.value() {
            ParamValue::Table(table) => {
                let var = format!("@__tvp{i}");
                render_table(&mut prelude, &mut binds, &var, name, table)?;
                fills_tables |= !table.is_empty();
                args.push(format!("@{name} = {var}"));
            }
            ParamValue::Scalar(value) => match param.direction() {
                ParamDirection::Input => {
                    binds.push(value.clone());
                    args.push(format!("@{name} = @P{}", binds.len()));
                }
                direction => {
                    let var = format!("@__out{i}");
                    let decl = param.declared_type().mssql_decl();
                    if direction == ParamDirection::InputOutput {
                        binds.push(value.clone());
                        let _ = writeln!(prelude, "DECLARE {var} {decl} = @P{};", binds.len());
                    } else {
                        let _ = writeln!(prelude, "DECLARE {var} {decl};");
                    }
                    args.push(format!("@{name} = {var} OUTPUT"));
                    output_vars.push((var, name.to_string()));
                }
            },
        }
    }

    if binds.len() > MAX_BOUND_PARAMS {
        return Err(SprocError::ParameterError(format!(
            "{} needs {} bound values, SQL Server allows {MAX_BOUND_PARAMS}",
            call.procedure(),
            binds.len()
        )));
    }

    let mut sql = String::new();
    if fills_tables {
        // Keep table-variable inserts out of the affected row count.
        sql.push_str("SET NOCOUNT ON;\n");
        sql.push_str(&prelude);
        sql.push_str("SET NOCOUNT OFF;\n");
    } else {
        sql.push_str(&prelude);
    }
    if args.is_empty() {
        let _ = writeln!(sql, "EXEC {};", call.procedure());
    } else {
        let _ = writeln!(sql, "EXEC {} {};", call.procedure(), args.join(", "));
    }

    let mut outputs = Vec::new();
    if select_outputs && !output_vars.is_empty() {
        let columns: Vec<String> = output_vars
            .iter()
            .map(|(var, name)| format!("{var} AS {}", quote_ident(name)))
            .collect();
        let _ = writeln!(sql, "SELECT {};", columns.join(", "));
        outputs = output_vars.into_iter().map(|(_, name)| name).collect();
    }

    Ok(ExecBatch {
        sql,
        binds,
        outputs,
    })
}

fn render_table(
    out: &mut String,
    binds: &mut Vec<RowValues>,
    var: &str,
    param: &str,
    table: &TableValue,
) -> Result<(), SprocError> {
    let type_name = table.type_name().ok_or_else(|| {
        SprocError::ParameterError(format!("table-valued parameter @{param} has no type name"))
    })?;
    if !is_object_name(type_name) {
        return Err(SprocError::ParameterError(format!(
            "invalid table type name {type_name:?} for @{param}"
        )));
    }
    let _ = writeln!(out, "DECLARE {var} AS {type_name};");
    if table.is_empty() {
        return Ok(());
    }
    if table.columns().is_empty() {
        return Err(SprocError::ParameterError(format!(
            "table-valued parameter @{param} has rows but no columns"
        )));
    }

    let columns: Vec<String> = table.columns().iter().map(|c| quote_ident(&c.name)).collect();
    for chunk in table.rows().chunks(MAX_VALUES_ROWS) {
        let mut tuples = Vec::with_capacity(chunk.len());
        for row in chunk {
            let mut slots = Vec::with_capacity(row.len());
            for cell in row {
                binds.push(cell.clone());
                slots.push(format!("@P{}", binds.len()));
            }
            tuples.push(format!("({})", slots.join(", ")));
        }
        let _ = writeln!(
            out,
            "INSERT INTO {var} ({}) VALUES {};",
            columns.join(", "),
            tuples.join(", ")
        );
    }
    Ok(())
}

/// Sums the counts of data-modifying statements in a command's item stream.
///
/// Every statement ends with a DONE count. One that closes a result set belongs
/// to the SELECT that produced the rows and is left out.
#[derive(Debug, Default)]
struct AffectedRows {
    total: u64,
    result_open: bool,
}

impl AffectedRows {
    fn result_set_started(&mut self) {
        self.result_open = true;
    }

    fn statement_done(&mut self, rows: u64) {
        if !std::mem::take(&mut self.result_open) {
            self.total += rows;
        }
    }

    fn total(&self) -> Result<usize, SprocError> {
        usize::try_from(self.total).map_err(|e| {
            SprocError::CommandExecutionError(format!("Invalid rows affected count: {e}"))
        })
    }
}

/// Run the call for its side effects.
///
/// The batch runs through `sp_executesql` so each statement's count arrives on
/// its own; output parameters come back through the trailing output row.
pub(crate) async fn execute_call(
    client: &mut MssqlClient,
    call: &ProcedureCall,
) -> Result<ExecOutcome, SprocError> {
    let batch = render_exec_batch(call, true)?;
    let output_names = batch.outputs;
    let mut stream = bind_command_params(batch.sql, batch.binds)
        .exec(client)
        .await?;

    let mut affected = AffectedRows::default();
    let mut last_row: Option<Vec<RowValues>> = None;
    while let Some(item) = stream.try_next().await? {
        match item {
            CommandItem::Metadata(_) => {
                affected.result_set_started();
                last_row = None;
            }
            CommandItem::Row(row) => {
                if last_row.is_none() && !output_names.is_empty() {
                    last_row = Some(extract_row(&row)?);
                }
            }
            CommandItem::RowsAffected(rows) => affected.statement_done(rows),
            CommandItem::ReturnStatus(_) | CommandItem::ReturnValue(_) => {}
        }
    }

    let mut outcome = ExecOutcome {
        affected: affected.total()?,
        outputs: HashMap::new(),
    };
    if !output_names.is_empty() {
        let values = last_row.ok_or_else(|| {
            SprocError::CommandExecutionError("output parameter row missing".to_string())
        })?;
        outcome.outputs = zip_outputs(output_names, values);
    }
    Ok(outcome)
}

/// Run the call and stream the first result set.
pub(crate) async fn stream_call<'a>(
    client: &'a mut MssqlClient,
    call: &ProcedureCall,
) -> Result<RowStream<'a>, SprocError> {
    let batch = render_exec_batch(call, false)?;
    let query = bind_query_params(batch.sql, batch.binds);
    let mut stream = query.query(client).await?;

    let column_names: Vec<String> = stream
        .columns()
        .await?
        .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let column_names = Arc::new(column_names);
    let column_index = Arc::new(crate::results::build_column_index(&column_names));

    let names = column_names.clone();
    let rows = stream
        .into_row_stream()
        .try_take_while(|row| future::ready(Ok(row.result_index() == 0)))
        .map(move |row| -> Result<CustomDbRow, SprocError> {
            let row = row?;
            Ok(CustomDbRow::with_index(
                names.clone(),
                column_index.clone(),
                extract_row(&row)?,
            ))
        })
        .boxed();

    Ok(RowStream::new(column_names, rows))
}

/// Run the call, collect every result set, and split off output values.
pub(crate) async fn query_all(
    client: &mut MssqlClient,
    call: &ProcedureCall,
) -> Result<ProcedureResult, SprocError> {
    let batch = render_exec_batch(call, true)?;
    let outputs = batch.outputs;
    let query = bind_query_params(batch.sql, batch.binds);
    let mut stream = query.query(client).await?;

    let mut result_sets: Vec<ResultSet> = Vec::new();
    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(meta) => {
                let names = meta.columns().iter().map(|c| c.name().to_string()).collect();
                result_sets.push(ResultSet::new(names));
            }
            QueryItem::Row(row) => {
                let set = result_sets.last_mut().ok_or_else(|| {
                    SprocError::CommandExecutionError(
                        "row received before result metadata".to_string(),
                    )
                })?;
                set.add_row_values(extract_row(&row)?)?;
            }
        }
    }

    let mut result = ProcedureResult::default();
    if !outputs.is_empty() {
        let output_set = result_sets.pop().ok_or_else(|| {
            SprocError::CommandExecutionError("output parameter row missing".to_string())
        })?;
        let values = output_set
            .results
            .into_iter()
            .next()
            .map(|row| row.rows)
            .unwrap_or_default();
        result.outputs = zip_outputs(outputs, values);
    }
    result.result_sets = result_sets;
    Ok(result)
}

/// Pair output names with the selected output row; missing cells read as NULL.
fn zip_outputs(names: Vec<String>, values: Vec<RowValues>) -> HashMap<String, RowValues> {
    names
        .into_iter()
        .zip(values.into_iter().chain(std::iter::repeat(RowValues::Null)))
        .collect()
}

fn extract_row(row: &Row) -> Result<Vec<RowValues>, SprocError> {
    row.cells()
        .map(|(column, data)| {
            column_value(data).map_err(|e| {
                SprocError::ConversionError(format!("column `{}`: {e}", column.name()))
            })
        })
        .collect()
}

/// Convert one cell by its wire type.
///
/// Only a NULL cell becomes `RowValues::Null`. `uniqueidentifier`, `time` and
/// `xml` read as text, `date` as midnight of that day, and `datetimeoffset` as
/// its UTC instant.
fn column_value(data: &ColumnData<'static>) -> tiberius::Result<RowValues> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| RowValues::Int(i64::from(v))),
        ColumnData::I16(v) => v.map(|v| RowValues::Int(i64::from(v))),
        ColumnData::I32(v) => v.map(|v| RowValues::Int(i64::from(v))),
        ColumnData::I64(v) => v.map(RowValues::Int),
        ColumnData::F32(v) => v.map(|v| RowValues::Float(f64::from(v))),
        ColumnData::F64(v) => v.map(RowValues::Float),
        ColumnData::Bit(v) => v.map(RowValues::Bool),
        ColumnData::Numeric(v) => v.map(|n| RowValues::Float(f64::from(n))),
        ColumnData::String(v) => v.as_deref().map(|s| RowValues::Text(s.to_string())),
        ColumnData::Guid(v) => v.map(|g| RowValues::Text(g.to_string())),
        ColumnData::Binary(v) => v.as_deref().map(|b| RowValues::Blob(b.to_vec())),
        ColumnData::Xml(v) => v.as_deref().map(|x| RowValues::Text(x.to_string())),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?.map(RowValues::Timestamp)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)?
            .map(|d| RowValues::Timestamp(d.and_time(NaiveTime::default()))),
        ColumnData::Time(_) => NaiveTime::from_sql(data)?.map(|t| RowValues::Text(t.to_string())),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)?
            .map(|dt| RowValues::Timestamp(dt.naive_utc())),
    };
    Ok(value.unwrap_or(RowValues::Null))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use tiberius::{IntoSql, Uuid};

    use super::*;
    use crate::params::ProcParam;
    use crate::table::TableColumn;
    use crate::types::SqlType;

    fn call(params: Vec<ProcParam>) -> ProcedureCall {
        ProcedureCall::new("dbo.SaveUsers", params, Duration::from_secs(30)).unwrap()
    }

    fn column(name: &str, sql_type: SqlType, nullable: bool) -> TableColumn {
        TableColumn {
            name: name.into(),
            sql_type,
            nullable,
        }
    }

    #[test]
    fn renders_parameters_in_caller_order() {
        let batch = render_exec_batch(
            &call(vec![
                ProcParam::input("Id", 7),
                ProcParam::input_output("@Count", 2),
                ProcParam::output("Total", SqlType::Int),
            ]),
            true,
        )
        .unwrap();
        assert_eq!(
            batch.sql,
            "DECLARE @__out1 BIGINT = @P2;\n\
             DECLARE @__out2 INT;\n\
             EXEC dbo.SaveUsers @Id = @P1, @Count = @__out1 OUTPUT, @Total = @__out2 OUTPUT;\n\
             SELECT @__out1 AS [Count], @__out2 AS [Total];\n"
        );
        assert_eq!(batch.binds, vec![RowValues::Int(7), RowValues::Int(2)]);
        assert_eq!(batch.outputs, vec!["Count".to_string(), "Total".to_string()]);
    }

    #[test]
    fn stream_mode_skips_output_select() {
        let call = call(vec![ProcParam::output("Total", SqlType::Int)]);
        let batch = render_exec_batch(&call, false).unwrap();
        assert!(!batch.sql.contains("SELECT"));
        assert!(batch.outputs.is_empty());
    }

    #[test]
    fn non_query_batch_selects_new_id_after_the_exec() {
        let call = call(vec![
            ProcParam::input("Name", "Ann"),
            ProcParam::output("NewId", SqlType::BigInt),
        ]);
        let batch = render_exec_batch(&call, true).unwrap();
        assert_eq!(
            batch.sql,
            "DECLARE @__out1 BIGINT;\n\
             EXEC dbo.SaveUsers @Name = @P1, @NewId = @__out1 OUTPUT;\n\
             SELECT @__out1 AS [NewId];\n"
        );
        assert_eq!(batch.outputs, vec!["NewId".to_string()]);
    }

    #[test]
    fn renders_table_valued_parameter() {
        let mut table = TableValue::with_columns(vec![
            column("Id", SqlType::Int, false),
            column("Name", SqlType::NVarChar, true),
        ])
        .with_type_name("dbo.UserList");
        table
            .add_row(vec![RowValues::Int(1), RowValues::Text("Ann".into())])
            .unwrap();
        table.add_row(vec![RowValues::Int(2), RowValues::Null]).unwrap();

        let batch = render_exec_batch(
            &call(vec![ProcParam::table("Users", table), ProcParam::input("Force", true)]),
            false,
        )
        .unwrap();
        assert_eq!(
            batch.sql,
            "SET NOCOUNT ON;\n\
             DECLARE @__tvp0 AS dbo.UserList;\n\
             INSERT INTO @__tvp0 ([Id], [Name]) VALUES (@P1, @P2), (@P3, @P4);\n\
             SET NOCOUNT OFF;\n\
             EXEC dbo.SaveUsers @Users = @__tvp0, @Force = @P5;\n"
        );
        assert_eq!(batch.binds.len(), 5);
        assert_eq!(batch.binds[3], RowValues::Null);
    }

    #[test]
    fn table_without_type_name_is_rejected() {
        let call = call(vec![ProcParam::table("Users", TableValue::default())]);
        let result = render_exec_batch(&call, false);
        assert!(matches!(result, Err(SprocError::ParameterError(_))));
    }

    #[test]
    fn table_rows_without_columns_are_rejected() {
        let mut table = TableValue::default().with_type_name("dbo.UserList");
        table.add_row(Vec::new()).unwrap();
        let result = render_exec_batch(&call(vec![ProcParam::table("Users", table)]), false);
        assert!(
            matches!(result, Err(SprocError::ParameterError(msg)) if msg.contains("no columns"))
        );
    }

    #[test]
    fn quotes_brackets_in_identifiers() {
        assert_eq!(quote_ident("a]b"), "[a]]b]");
    }

    #[test]
    fn select_counts_stay_out_of_affected_rows() {
        // SELECT of 5 rows, UPDATE of 1 row, then the output row select.
        let mut affected = AffectedRows::default();
        affected.result_set_started();
        affected.statement_done(5);
        affected.statement_done(1);
        affected.result_set_started();
        affected.statement_done(1);
        assert_eq!(affected.total().unwrap(), 1);
    }

    #[test]
    fn every_modifying_statement_is_counted() {
        let mut affected = AffectedRows::default();
        affected.statement_done(2);
        affected.statement_done(0);
        affected.statement_done(3);
        assert_eq!(affected.total().unwrap(), 5);
    }

    #[test]
    fn empty_result_set_still_closes_its_select() {
        let mut affected = AffectedRows::default();
        affected.result_set_started();
        affected.statement_done(0);
        affected.statement_done(4);
        assert_eq!(affected.total().unwrap(), 4);
    }

    #[test]
    fn missing_output_cells_read_as_null() {
        let outputs = zip_outputs(
            vec!["NewId".to_string(), "Status".to_string()],
            vec![RowValues::Int(42)],
        );
        assert_eq!(outputs["NewId"], RowValues::Int(42));
        assert_eq!(outputs["Status"], RowValues::Null);
    }

    #[test]
    fn typed_nulls_read_as_null() {
        for data in [
            ColumnData::I32(None),
            ColumnData::Guid(None),
            ColumnData::String(None),
            ColumnData::Xml(None),
            ColumnData::Date(None),
            ColumnData::DateTimeOffset(None),
        ] {
            assert_eq!(column_value(&data).unwrap(), RowValues::Null, "{data:?}");
        }
    }

    #[test]
    fn guid_reads_as_text() {
        let value = column_value(&ColumnData::Guid(Some(Uuid::nil()))).unwrap();
        assert_eq!(
            value,
            RowValues::Text("00000000-0000-0000-0000-000000000000".to_string())
        );
    }

    #[test]
    fn date_and_time_columns_keep_their_values() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let midnight = day.and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(
            column_value(&day.into_sql()).unwrap(),
            RowValues::Timestamp(midnight)
        );

        let time = NaiveTime::from_hms_opt(13, 45, 0).unwrap();
        assert_eq!(
            column_value(&time.into_sql()).unwrap(),
            RowValues::Text("13:45:00".to_string())
        );

        let stamp = day.and_hms_opt(8, 30, 0).unwrap();
        assert_eq!(
            column_value(&stamp.into_sql()).unwrap(),
            RowValues::Timestamp(stamp)
        );
    }

    #[test]
    fn datetimeoffset_reads_as_utc() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap();
        let utc = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(
            column_value(&local.into_sql()).unwrap(),
            RowValues::Timestamp(utc)
        );
    }

    #[test]
    fn numeric_kinds_widen() {
        assert_eq!(column_value(&ColumnData::U8(Some(7))).unwrap(), RowValues::Int(7));
        assert_eq!(
            column_value(&ColumnData::F32(Some(1.5))).unwrap(),
            RowValues::Float(1.5)
        );
        assert_eq!(
            column_value(&ColumnData::Bit(Some(true))).unwrap(),
            RowValues::Bool(true)
        );
    }
}
