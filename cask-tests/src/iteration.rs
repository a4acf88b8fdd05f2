use crate::open;
use cask_core::{
    ConnectOptions, Driver, Value, params,
    stream::{StreamExt, TryStreamExt},
};
use std::{pin::pin, sync::LazyLock};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn iteration<D: Driver + Clone>(driver: &D, options: &ConnectOptions) {
    let _lock = MUTEX.lock().await;
    let connection = open(driver, options.clone()).await;

    // Setup
    connection
        .execute("DROP TABLE IF EXISTS iteration", params![])
        .await
        .expect("Failed to drop the iteration table");
    connection
        .execute("CREATE TABLE iteration (num int, name text)", params![])
        .await
        .expect("Failed to create the iteration table");
    connection
        .executemany(
            "INSERT INTO iteration (num, name) VALUES (?, ?)",
            (1..=5).map(|i| params![i, format!("row {}", i)]),
        )
        .await
        .expect("Failed to insert the rows");

    let mut cursor = connection.cursor().expect("Could not create a cursor");

    // Execute and iterate in one expression
    let rows = cursor
        .execute("SELECT num, name FROM iteration ORDER BY num", params![])
        .rows()
        .try_collect::<Vec<_>>()
        .await
        .expect("Failed to stream the rows");
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["num"], Value::Integer(1));
    assert_eq!(rows[4]["name"], Value::Text("row 5".into()));

    // The stream is lazy, what is not consumed stays in the cursor
    {
        let mut stream = pin!(
            cursor
                .execute(
                    "SELECT num FROM iteration WHERE num > ? ORDER BY num",
                    params![2],
                )
                .rows()
        );
        let row = stream
            .try_next()
            .await
            .expect("Failed to stream a row")
            .expect("Expected a row");
        assert_eq!(row[0], Value::Integer(3));
    }
    let row = cursor
        .fetchone()
        .await
        .expect("Failed to fetch after the stream")
        .expect("The stream consumed only one row");
    assert_eq!(row[0], Value::Integer(4));
    let remaining = cursor
        .rows()
        .map(|r| r.map(|r| r[0].clone()))
        .try_collect::<Vec<_>>()
        .await
        .expect("Failed to stream the remaining rows");
    assert_eq!(remaining, [Value::Integer(5)]);
    assert!(
        cursor
            .rows()
            .try_collect::<Vec<_>>()
            .await
            .expect("An exhausted stream yields nothing")
            .is_empty()
    );

    // Errors surface as the first item
    let result = cursor
        .execute("SELECT missing FROM iteration", params![])
        .rows()
        .try_collect::<Vec<_>>()
        .await;
    assert!(result.is_err());

    cursor.close().await.expect("Failed to close the cursor");
    connection
        .close()
        .await
        .expect("Failed to close the connection");
}
