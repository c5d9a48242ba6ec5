mod common;

use std::time::Duration;

use common::user_scripts;
use sproc_middleware::prelude::*;
use sproc_middleware::test_utils::TxEvent;

#[tokio::test]
async fn calls_inside_a_transaction_carry_it() {
    let mut exec = ProcedureExecutor::new(user_scripts());

    exec.begin_transaction().await.unwrap();
    assert!(exec.in_transaction());
    exec.exec_non_query("DeactivateUser", vec![ProcParam::input("Id", 1)])
        .await
        .unwrap();
    exec.commit_transaction().await.unwrap();
    assert!(!exec.in_transaction());
    exec.exec_non_query("DeactivateUser", vec![ProcParam::input("Id", 2)])
        .await
        .unwrap();

    let conn = exec.connection();
    assert_eq!(conn.tx_events(), [TxEvent::Begin(1), TxEvent::Commit(1)]);
    assert_eq!(conn.calls()[0].transaction, Some(1));
    assert_eq!(conn.calls()[1].transaction, None);
}

#[tokio::test]
async fn second_commit_is_a_state_error() {
    let mut exec = ProcedureExecutor::new(user_scripts());
    exec.begin_transaction().await.unwrap();
    exec.commit_transaction().await.unwrap();

    let err = exec.commit_transaction().await.unwrap_err();
    assert!(matches!(err, SprocError::TransactionStateError(_)));
    assert_eq!(exec.connection().tx_events().len(), 2);
}

#[tokio::test]
async fn rollback_without_transaction_is_a_state_error() {
    let mut exec = ProcedureExecutor::new(user_scripts());
    let err = exec.rollback_transaction().await.unwrap_err();
    assert!(matches!(err, SprocError::TransactionStateError(_)));
}

#[tokio::test]
async fn only_one_transaction_at_a_time() {
    let mut exec = ProcedureExecutor::new(user_scripts());
    exec.begin_transaction().await.unwrap();

    let err = exec.begin_transaction().await.unwrap_err();
    assert!(matches!(err, SprocError::TransactionStateError(_)));
    assert_eq!(exec.transaction().map(Transaction::id), Some(1));

    exec.rollback_transaction().await.unwrap();
    exec.begin_transaction().await.unwrap();
    assert_eq!(exec.transaction().map(Transaction::id), Some(2));
    assert_eq!(
        exec.connection().tx_events(),
        [TxEvent::Begin(1), TxEvent::Rollback(1), TxEvent::Begin(2)]
    );
}

#[tokio::test]
async fn begin_opens_the_connection() {
    let mut exec = ProcedureExecutor::new(user_scripts());
    exec.begin_transaction().await.unwrap();
    assert_eq!(exec.connection().open_count(), 1);
}

#[tokio::test]
async fn close_rolls_back_an_open_transaction() {
    let conn = user_scripts();
    let journal = conn.journal();
    let mut exec = ProcedureExecutor::new(conn);
    exec.begin_transaction().await.unwrap();
    exec.exec_non_query("DeactivateUser", vec![]).await.unwrap();

    exec.close().await.unwrap();

    assert_eq!(journal.tx_events(), [TxEvent::Begin(1), TxEvent::Rollback(1)]);
    assert_eq!(journal.close_count(), 1);
}

#[tokio::test]
async fn close_without_transaction_only_closes() {
    let conn = user_scripts();
    let journal = conn.journal();
    let mut exec = ProcedureExecutor::new(conn);
    exec.exec_non_query("DeactivateUser", vec![]).await.unwrap();

    exec.close().await.unwrap();

    assert!(journal.tx_events().is_empty());
    assert_eq!(journal.close_count(), 1);
}

#[tokio::test]
async fn slow_begin_times_out_without_starting_a_transaction() {
    let conn = user_scripts().with_transaction_delay(Duration::from_secs(5));
    let options = ExecutorOptions::new().with_command_timeout(Duration::from_millis(50));
    let mut exec = ProcedureExecutor::with_options(conn, options);

    let err = exec.begin_transaction().await.unwrap_err();
    assert!(matches!(&err, SprocError::CommandExecutionError(msg) if msg.contains("timed out")));
    assert!(!exec.in_transaction());
    assert!(exec.connection().tx_events().is_empty());

    exec.exec_non_query("DeactivateUser", vec![]).await.unwrap();
    assert_eq!(exec.connection().calls()[0].transaction, None);
}
