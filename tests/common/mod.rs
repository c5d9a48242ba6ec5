#![allow(dead_code)]

use sproc_middleware::prelude::*;
use sproc_middleware::test_utils::{ScriptedConnection, ScriptedResponse};

sproc_middleware::record! {
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct User {
        pub id: i32 => "Id",
        pub name: String => "Name",
        pub email: Option<String> => "Email",
    }
}

pub fn user_row(id: i64, name: &str, email: Option<&str>) -> Vec<RowValues> {
    vec![
        RowValues::Int(id),
        RowValues::Text(name.to_string()),
        email.map_or(RowValues::Null, |e| RowValues::Text(e.to_string())),
    ]
}

/// `GetUser` returns one user, `ListUsers` three, `DeactivateUser` affects one row.
pub fn user_scripts() -> ScriptedConnection {
    ScriptedConnection::new()
        .with_procedure(
            "GetUser",
            ScriptedResponse::new().rows(
                &["Id", "Name", "Email", "LastLogin"],
                vec![vec![
                    RowValues::Int(7),
                    RowValues::Text("Ann".into()),
                    RowValues::Null,
                    RowValues::Text("2024-01-02 03:04:05".into()),
                ]],
            ),
        )
        .with_procedure(
            "ListUsers",
            ScriptedResponse::new().rows(
                &["Id", "Name", "Email"],
                vec![
                    user_row(1, "Ann", None),
                    user_row(2, "Bob", Some("bob@example.com")),
                    user_row(3, "Cy", None),
                ],
            ),
        )
        .with_procedure("DeactivateUser", ScriptedResponse::new().affected(1))
}
