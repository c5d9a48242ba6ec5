mod common;

use common::{User, user_scripts};
use sproc_middleware::prelude::*;
use sproc_middleware::test_utils::{ScriptedConnection, ScriptedResponse, TxEvent};

#[test]
fn blocking_executor_mirrors_async_operations() {
    let mut exec = BlockingProcedureExecutor::new(user_scripts()).unwrap();

    assert_eq!(exec.exec_non_query("DeactivateUser", vec![]).unwrap(), 1);

    let user = exec
        .get_record::<User>("GetUser", vec![ProcParam::input("Id", 7)])
        .unwrap()
        .unwrap();
    assert_eq!(user.name, "Ann");

    let users: Vec<User> = exec
        .query_records::<User>("ListUsers", vec![])
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(users.len(), 3);

    let table = exec.get_table::<User>("ListUsers", vec![]).unwrap();
    assert_eq!(table, users);
    assert_eq!(exec.get_raw_table("ListUsers", vec![]).unwrap().len(), 3);
}

#[test]
fn blocking_row_iterator_releases_on_drop() {
    let mut exec = BlockingProcedureExecutor::new(user_scripts()).unwrap();
    {
        let mut rows = exec.query_rows("ListUsers", vec![]).unwrap();
        assert_eq!(rows.columns().len(), 3);
        let first = rows.next().unwrap().unwrap();
        assert_eq!(first.get("Id"), Some(&RowValues::Int(1)));
    }
    assert_eq!(exec.executor().connection().cursors_released(), 1);
}

#[test]
fn blocking_transactions_and_scalars() {
    let conn = ScriptedConnection::new()
        .with_procedure(
            "NextOrderNumber",
            ScriptedResponse::new().rows(&["Next"], vec![vec![RowValues::Int(1001)]]),
        )
        .with_procedure(
            "PlaceOrder",
            ScriptedResponse::new().affected(1).output("OrderId", 55),
        );
    let journal = conn.journal();
    let mut exec = BlockingProcedureExecutor::new(conn).unwrap();

    exec.begin_transaction().unwrap();
    let next: i64 = exec.get_scalar("NextOrderNumber", vec![]).unwrap();
    assert_eq!(next, 1001);
    let placed = exec
        .get_data(
            "PlaceOrder",
            vec![
                ProcParam::input("Number", next),
                ProcParam::output("OrderId", SqlType::Int),
            ],
        )
        .unwrap();
    assert_eq!(placed.output("OrderId"), Some(&RowValues::Int(55)));
    let outcome = exec
        .exec_with_outputs("PlaceOrder", vec![ProcParam::output("OrderId", SqlType::Int)])
        .unwrap();
    assert_eq!(outcome.affected, 1);
    assert_eq!(outcome.output("OrderId"), Some(&RowValues::Int(55)));
    exec.commit_transaction().unwrap();
    assert!(matches!(
        exec.rollback_transaction(),
        Err(SprocError::TransactionStateError(_))
    ));
    exec.close().unwrap();

    assert_eq!(journal.tx_events(), [TxEvent::Begin(1), TxEvent::Commit(1)]);
    assert!(journal.calls().iter().all(|c| c.transaction == Some(1)));
    assert_eq!(journal.close_count(), 1);
}
