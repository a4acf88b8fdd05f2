use crate::open;
use cask_core::{ConnectOptions, CursorStatus, DbError, Driver, Value, params};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn lifecycle<D: Driver + Clone>(driver: &D, options: &ConnectOptions) {
    let _lock = MUTEX.lock().await;
    let connection = open(driver, options.clone()).await;

    // Setup
    connection
        .execute("DROP TABLE IF EXISTS lifecycle", params![])
        .await
        .expect("Failed to drop the lifecycle table");
    connection
        .execute(
            "CREATE TABLE lifecycle (id INTEGER PRIMARY KEY, num INTEGER)",
            params![],
        )
        .await
        .expect("Failed to create the lifecycle table");
    connection
        .executemany(
            "INSERT INTO lifecycle (num) VALUES (?)",
            (0..10).map(|i| params![i * i]),
        )
        .await
        .expect("Failed to insert the squares");

    let mut cursor = connection.cursor().expect("Could not create a cursor");
    assert_eq!(cursor.status().await, CursorStatus::Idle);
    assert!(
        cursor
            .fetchone()
            .await
            .expect("Fetching from an idle cursor is not an error")
            .is_none()
    );
    assert!(
        cursor
            .fetchall()
            .await
            .expect("Fetching from an idle cursor is not an error")
            .is_empty()
    );

    // Executing again replaces the statement
    cursor
        .execute("SELECT num FROM lifecycle ORDER BY id", params![])
        .await
        .expect("Failed to select the squares");
    assert_eq!(cursor.status().await, CursorStatus::Active);
    let row = cursor
        .fetchone()
        .await
        .expect("Failed to fetch a square")
        .expect("Expected a square");
    assert_eq!(row[0], Value::Integer(0));
    cursor
        .execute("SELECT num FROM lifecycle WHERE id > ? ORDER BY id", params![8])
        .await
        .expect("Failed to select the last squares");
    assert_eq!(cursor.status().await, CursorStatus::Active);
    let rows = cursor.fetchall().await.expect("Failed to fetch the last squares");
    assert_eq!(
        rows.into_iter().map(|r| r[0].clone()).collect::<Vec<_>>(),
        [Value::Integer(64), Value::Integer(81)]
    );
    assert_eq!(cursor.status().await, CursorStatus::Active);

    // Inserts report the rowid, later statements keep it
    cursor
        .execute("INSERT INTO lifecycle (num) VALUES (?)", params![100])
        .await
        .expect("Failed to insert the next square");
    assert_eq!(cursor.lastrowid(), Some(11));
    assert_eq!(cursor.rows_affected().rows_affected, 1);
    cursor
        .execute("UPDATE lifecycle SET num = num WHERE id > ?", params![5])
        .await
        .expect("Failed to update");
    assert_eq!(cursor.rows_affected().rows_affected, 6);
    assert_eq!(cursor.lastrowid(), Some(11));

    // Returning and common table expression inserts report the rowid too
    cursor
        .execute(
            "INSERT INTO lifecycle (num) VALUES (?), (?) RETURNING id",
            params![121, 144],
        )
        .await
        .expect("Failed to insert the squares returning their id");
    assert_eq!(cursor.lastrowid(), Some(13));
    assert_eq!(cursor.rows_affected().rows_affected, 2);
    let rows = cursor
        .fetchall()
        .await
        .expect("Failed to fetch the returned ids");
    assert_eq!(
        rows.into_iter().map(|r| r[0].clone()).collect::<Vec<_>>(),
        [Value::Integer(12), Value::Integer(13)]
    );
    cursor
        .execute(
            "WITH next(n) AS (SELECT ?) INSERT INTO lifecycle (num) SELECT n FROM next",
            params![169],
        )
        .await
        .expect("Failed to insert through a common table expression");
    assert_eq!(cursor.lastrowid(), Some(14));
    assert_eq!(cursor.rows_affected().rows_affected, 1);
    cursor
        .execute("DELETE FROM lifecycle WHERE id > ?", params![11])
        .await
        .expect("Failed to delete the extra squares");
    assert_eq!(cursor.rows_affected().rows_affected, 3);
    assert_eq!(cursor.lastrowid(), Some(14));

    // A failed execute leaves the cursor idle
    cursor
        .execute("SELECT num FROM lifecycle", params![])
        .await
        .expect("Failed to select the squares");
    let error = cursor
        .execute("SELECT num FROM nowhere", params![])
        .await
        .expect_err("The table does not exist");
    assert!(matches!(DbError::of(&error), Some(DbError::Query(..))));
    assert_eq!(cursor.status().await, CursorStatus::Idle);
    assert!(
        cursor
            .fetchone()
            .await
            .expect("Fetching after a failure is not an error")
            .is_none()
    );
    let error = cursor
        .execute("SELECT ?", params![1, 2])
        .await
        .expect_err("Too many parameters");
    assert!(matches!(DbError::of(&error), Some(DbError::Query(..))));
    assert_eq!(cursor.status().await, CursorStatus::Idle);

    // Closing
    cursor
        .execute("SELECT num FROM lifecycle", params![])
        .await
        .expect("Failed to select the squares");
    cursor.close().await.expect("Failed to close the cursor");
    assert_eq!(cursor.status().await, CursorStatus::Closed);
    cursor
        .close()
        .await
        .expect("Closing a closed cursor does nothing");
    let error = cursor
        .execute("SELECT 1", params![])
        .await
        .expect_err("A closed cursor cannot execute");
    assert_eq!(DbError::of(&error), Some(&DbError::Closed("cursor")));
    assert!(
        cursor
            .fetchone()
            .await
            .expect("Fetching from a closed cursor is not an error")
            .is_none()
    );
    connection
        .close()
        .await
        .expect("Failed to close the connection");
}

pub async fn closed_connection<D: Driver + Clone>(driver: &D, options: &ConnectOptions) {
    let _lock = MUTEX.lock().await;
    let connection = open(driver, options.clone()).await;
    let mut active = connection.cursor().expect("Could not create a cursor");
    let mut idle = connection.cursor().expect("Could not create a cursor");
    active
        .execute("SELECT 1 UNION ALL SELECT 2", params![])
        .await
        .expect("Failed to select");
    assert_eq!(connection.open_cursors(), 2);

    connection
        .close()
        .await
        .expect("Failed to close the connection");
    assert!(connection.is_closed());
    assert_eq!(connection.open_cursors(), 0);
    assert_eq!(active.status().await, CursorStatus::Closed);
    assert_eq!(idle.status().await, CursorStatus::Closed);
    let error = idle
        .execute("SELECT 1", params![])
        .await
        .expect_err("The cursor was closed with the connection");
    assert_eq!(DbError::of(&error), Some(&DbError::Closed("cursor")));
    let error = connection
        .cursor()
        .expect_err("A closed connection cannot create cursors");
    assert_eq!(DbError::of(&error), Some(&DbError::Closed("connection")));
    let error = connection
        .execute("SELECT 1", params![])
        .await
        .expect_err("A closed connection cannot execute");
    assert_eq!(DbError::of(&error), Some(&DbError::Closed("connection")));
    assert!(connection.commit().await.is_err());
    connection
        .close()
        .await
        .expect("Closing a closed connection does nothing");
    active.close().await.expect("Closing again does nothing");
    idle.close().await.expect("Closing again does nothing");
}
