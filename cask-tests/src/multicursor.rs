use crate::open;
use cask_core::{ConnectOptions, CursorStatus, Driver, Value, params};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn multicursor<D: Driver + Clone>(driver: &D, options: &ConnectOptions) {
    let _lock = MUTEX.lock().await;
    let connection = open(driver, options.clone()).await;

    // Setup
    connection
        .execute("DROP TABLE IF EXISTS multicursor", params![])
        .await
        .expect("Failed to drop the multicursor table");
    connection
        .execute("CREATE TABLE multicursor (num int)", params![])
        .await
        .expect("Failed to create the multicursor table");
    connection
        .executemany(
            "INSERT INTO multicursor (num) VALUES (?)",
            [params![1], params![2], params![3]],
        )
        .await
        .expect("Failed to insert the numbers");

    let mut first = connection.cursor().expect("Could not create the first cursor");
    let mut second = connection.cursor().expect("Could not create the second cursor");
    assert_eq!(connection.open_cursors(), 2);
    first
        .execute("SELECT * FROM multicursor ORDER BY num", params![])
        .await
        .expect("The first cursor could not execute");
    second
        .execute("SELECT * FROM multicursor ORDER BY num", params![])
        .await
        .expect("The second cursor could not execute");
    assert_eq!(first.status().await, CursorStatus::Active);
    assert_eq!(second.status().await, CursorStatus::Active);

    // Interleaved fetches do not disturb each other
    let mut fetched = Vec::new();
    for _ in 0..4 {
        for cursor in [&mut first, &mut second] {
            let row = cursor.fetchone().await.expect("Failed to fetch a number");
            fetched.push(row.map(|r| r[0].clone()));
        }
    }
    assert_eq!(
        fetched,
        [
            Some(Value::Integer(1)),
            Some(Value::Integer(1)),
            Some(Value::Integer(2)),
            Some(Value::Integer(2)),
            Some(Value::Integer(3)),
            Some(Value::Integer(3)),
            None,
            None,
        ]
    );

    // A third cursor starts from the beginning while the others are exhausted
    let mut third = connection.cursor().expect("Could not create the third cursor");
    third
        .execute("SELECT num FROM multicursor WHERE num > ? ORDER BY num", params![1])
        .await
        .expect("The third cursor could not execute");
    let rows = third.fetchall().await.expect("Failed to fetch from the third cursor");
    assert_eq!(
        rows.into_iter().map(|r| r[0].clone()).collect::<Vec<_>>(),
        [Value::Integer(2), Value::Integer(3)]
    );

    drop(third);
    assert_eq!(connection.open_cursors(), 2, "A dropped cursor deregisters");
    first.close().await.expect("Failed to close the first cursor");
    assert_eq!(connection.open_cursors(), 1, "A closed cursor deregisters");
    second.close().await.expect("Failed to close the second cursor");
    connection
        .close()
        .await
        .expect("Failed to close the connection");
}
