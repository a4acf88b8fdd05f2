use crate::open;
use cask_core::{ConnectOptions, Connection, DbError, Driver, Value, params};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

async fn count<D: Driver>(connection: &Connection<D>) -> i64 {
    let mut cursor = connection.cursor().expect("Could not create a cursor");
    let row = cursor
        .execute("SELECT COUNT(*) FROM accounts", params![])
        .await
        .expect("Failed to count the accounts")
        .fetchone()
        .await
        .expect("Failed to fetch the count")
        .expect("A count always returns a row");
    cursor.close().await.expect("Failed to close the cursor");
    match row[0] {
        Value::Integer(v) => v,
        ref v => panic!("Unexpected count {:?}", v),
    }
}

pub async fn transactions<D: Driver + Clone>(driver: &D, options: &ConnectOptions) {
    let _lock = MUTEX.lock().await;
    let connection = open(driver, options.clone().isolation_level(Some(""))).await;
    assert_eq!(connection.isolation_level().as_deref(), Some(""));
    assert_eq!(connection.begin_statement(), "BEGIN");
    assert!(!connection.in_transaction());

    // Setup
    connection
        .execute("DROP TABLE IF EXISTS accounts", params![])
        .await
        .expect("Failed to drop the accounts table");
    connection
        .execute(
            "CREATE TABLE accounts (id INTEGER PRIMARY KEY, owner TEXT)",
            params![],
        )
        .await
        .expect("Failed to create the accounts table");
    assert!(
        !connection.in_transaction(),
        "Statements do not open a transaction on their own"
    );

    // Rollback discards and reopens
    connection.begin().await.expect("Failed to begin");
    assert!(connection.in_transaction());
    connection
        .execute("INSERT INTO accounts (owner) VALUES (?)", params!["alice"])
        .await
        .expect("Failed to insert alice");
    assert_eq!(count(&connection).await, 1);
    connection.rollback().await.expect("Failed to roll back");
    assert_eq!(count(&connection).await, 0);
    assert!(
        connection.in_transaction(),
        "A rollback opens a new transaction unless in autocommit"
    );

    // Commit persists and closes
    connection
        .execute("INSERT INTO accounts (owner) VALUES (?)", params!["bob"])
        .await
        .expect("Failed to insert bob");
    connection.commit().await.expect("Failed to commit");
    assert!(!connection.in_transaction());
    connection
        .commit()
        .await
        .expect("Committing without a transaction does nothing");
    connection.rollback().await.expect("Failed to roll back");
    assert!(connection.in_transaction());
    assert_eq!(count(&connection).await, 1);
    connection.commit().await.expect("Failed to commit");

    // Nested begin
    connection.begin().await.expect("Failed to begin");
    let error = connection
        .begin()
        .await
        .expect_err("Cannot begin inside a transaction");
    assert!(matches!(
        DbError::of(&error),
        Some(DbError::Transaction(..))
    ));
    connection
        .rollback()
        .await
        .expect("A failed begin does not break the connection");
    connection.commit().await.expect("Failed to commit");

    // Isolation level
    connection
        .set_isolation_level(Some("IMMEDIATE"))
        .await
        .expect("Failed to set the isolation level");
    assert_eq!(connection.begin_statement(), "BEGIN IMMEDIATE");
    assert!(!connection.in_transaction(), "Setting a mode issues nothing");
    connection.begin().await.expect("Failed to begin immediate");
    connection
        .execute("INSERT INTO accounts (owner) VALUES (?)", params!["carol"])
        .await
        .expect("Failed to insert carol");
    connection
        .set_isolation_level(None)
        .await
        .expect("Failed to switch to autocommit");
    assert_eq!(connection.isolation_level(), None);
    assert!(
        !connection.in_transaction(),
        "Switching to autocommit commits the open transaction"
    );
    assert_eq!(count(&connection).await, 2);

    // Autocommit
    connection
        .execute("INSERT INTO accounts (owner) VALUES (?)", params!["dave"])
        .await
        .expect("Failed to insert dave");
    connection
        .rollback()
        .await
        .expect("Rolling back in autocommit does nothing");
    assert!(!connection.in_transaction());
    assert_eq!(count(&connection).await, 3);
    connection.begin().await.expect("Failed to begin in autocommit");
    assert!(connection.in_transaction());
    connection
        .execute("DELETE FROM accounts", params![])
        .await
        .expect("Failed to delete the accounts");
    connection.rollback().await.expect("Failed to roll back");
    assert!(
        !connection.in_transaction(),
        "In autocommit a rollback does not reopen"
    );
    assert_eq!(count(&connection).await, 3);
    connection
        .close()
        .await
        .expect("Failed to close the connection");

    // A rollback that cannot reopen breaks the connection
    let connection = open(driver, options.clone().isolation_level(Some("BOGUS"))).await;
    assert_eq!(connection.begin_statement(), "BEGIN BOGUS");
    let error = connection
        .begin()
        .await
        .expect_err("The begin statement is invalid");
    assert!(matches!(
        DbError::of(&error),
        Some(DbError::Transaction(..))
    ));
    let error = connection
        .rollback()
        .await
        .expect_err("The rollback cannot reopen the transaction");
    assert!(matches!(
        DbError::of(&error),
        Some(DbError::Transaction(..))
    ));
    let error = connection
        .commit()
        .await
        .expect_err("The connection is broken");
    assert!(matches!(
        DbError::of(&error),
        Some(DbError::Transaction(..))
    ));
    connection
        .close()
        .await
        .expect("A broken connection can still be closed");
}
