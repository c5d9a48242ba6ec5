//! Runs against a real SQL Server when `SPROC_MSSQL_*` variables are set;
//! otherwise every test returns early.
#![cfg(feature = "mssql")]

use sproc_middleware::prelude::*;

sproc_middleware::record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Widget {
        id: i32 => "Id",
        name: String => "Name",
        weight: Option<f64> => "Weight",
    }
}

fn options() -> Option<MssqlOptions> {
    match MssqlOptions::from_env() {
        Ok(opts) => Some(opts),
        Err(e) => {
            eprintln!("skipping live SQL Server test: {e}");
            None
        }
    }
}

async fn setup(exec: &mut ProcedureExecutor<MssqlConnection>) -> Result<(), SprocError> {
    // Procedures are created through sp_executesql so the batch stays a procedure call.
    let ddl = [
        "IF TYPE_ID('dbo.sproc_widget_list') IS NULL CREATE TYPE dbo.sproc_widget_list AS TABLE (Id INT NOT NULL, Name NVARCHAR(100) NOT NULL, Weight FLOAT NULL)",
        "IF OBJECT_ID('dbo.sproc_widgets') IS NULL CREATE TABLE dbo.sproc_widgets (Id INT NOT NULL PRIMARY KEY, Name NVARCHAR(100) NOT NULL, Weight FLOAT NULL)",
        "CREATE OR ALTER PROCEDURE dbo.sproc_save_widgets @Widgets dbo.sproc_widget_list READONLY, @Saved INT OUTPUT AS BEGIN DELETE FROM dbo.sproc_widgets; INSERT INTO dbo.sproc_widgets SELECT Id, Name, Weight FROM @Widgets; SET @Saved = @@ROWCOUNT; END",
        "CREATE OR ALTER PROCEDURE dbo.sproc_list_widgets @MinId INT AS SELECT Id, Name, Weight FROM dbo.sproc_widgets WHERE Id >= @MinId ORDER BY Id",
        "CREATE OR ALTER PROCEDURE dbo.sproc_rename_widget @Id INT, @Name NVARCHAR(100), @Previous NVARCHAR(100) OUTPUT AS BEGIN SELECT Id, Name FROM dbo.sproc_widgets; SET @Previous = (SELECT Name FROM dbo.sproc_widgets WHERE Id = @Id); UPDATE dbo.sproc_widgets SET Name = @Name WHERE Id = @Id; END",
    ];
    for stmt in ddl {
        exec.exec_non_query("sp_executesql", vec![ProcParam::input("stmt", stmt)])
            .await?;
    }
    Ok(())
}

#[tokio::test]
async fn widgets_round_trip_through_procedures() -> Result<(), SprocError> {
    let Some(opts) = options() else {
        return Ok(());
    };
    let mut exec = ProcedureExecutor::new(MssqlConnection::new(opts));
    setup(&mut exec).await?;

    let widgets = vec![
        Widget {
            id: 1,
            name: "bolt".into(),
            weight: Some(1.5),
        },
        Widget {
            id: 2,
            name: "nut".into(),
            weight: None,
        },
    ];
    let table = TableValue::from_fields(&widgets)?.with_type_name("dbo.sproc_widget_list");
    let saved = exec
        .get_data(
            "dbo.sproc_save_widgets",
            vec![ProcParam::table("Widgets", table), ProcParam::output("Saved", SqlType::Int)],
        )
        .await?;
    assert_eq!(saved.output("Saved"), Some(&RowValues::Int(2)));

    let listed = exec
        .get_table::<Widget>("dbo.sproc_list_widgets", vec![ProcParam::input("MinId", 1)])
        .await?;
    assert_eq!(listed, widgets);

    // A rolled back save leaves the committed rows in place.
    exec.begin_transaction().await?;
    let temp = Widget {
        id: 9,
        name: "temp".into(),
        weight: None,
    };
    let table = TableValue::from_fields(&[temp])?.with_type_name("dbo.sproc_widget_list");
    exec.get_data(
        "dbo.sproc_save_widgets",
        vec![ProcParam::table("Widgets", table), ProcParam::output("Saved", SqlType::Int)],
    )
    .await?;
    exec.rollback_transaction().await?;

    let first_id: Option<i64> = exec
        .get_scalar("dbo.sproc_list_widgets", vec![ProcParam::input("MinId", 1)])
        .await?;
    assert_eq!(first_id, Some(1));

    // The procedure selects every widget before updating one; only the update counts.
    let renamed = exec
        .exec_with_outputs(
            "dbo.sproc_rename_widget",
            vec![
                ProcParam::input("Id", 2),
                ProcParam::input("Name", "washer"),
                ProcParam::output("Previous", SqlType::NVarChar),
            ],
        )
        .await?;
    assert_eq!(renamed.affected, 1);
    assert_eq!(renamed.output("Previous"), Some(&RowValues::Text("nut".into())));

    exec.close().await
}

