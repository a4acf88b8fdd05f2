use crate::open;
use cask_core::{ConnectOptions, ConversionRegistry, Driver, PARSE_DECLTYPES, Value, params};
use indoc::indoc;
use rust_decimal::Decimal;
use std::sync::{Arc, LazyLock};
use time::{Date, PrimitiveDateTime, macros::{date, datetime}};
use tokio::sync::Mutex;
use uuid::Uuid;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn defaults<D: Driver + Clone>(driver: &D, options: &ConnectOptions) {
    let _lock = MUTEX.lock().await;
    let connection = open(
        driver,
        options
            .clone()
            .detect_types(PARSE_DECLTYPES)
            .registry(Arc::new(ConversionRegistry::with_defaults())),
    )
    .await;

    // Setup
    connection
        .execute("DROP TABLE IF EXISTS events", params![])
        .await
        .expect("Failed to drop the events table");
    connection
        .execute(
            indoc! {"
                CREATE TABLE events (
                    day date,
                    at timestamp,
                    id uuid,
                    amount decimal
                )
            "},
            params![],
        )
        .await
        .expect("Failed to create the events table");

    let id = Uuid::parse_str("5e915574-bb30-4430-98cf-c5854f61fbbd").expect("Invalid uuid");
    let amount = Decimal::new(12345, 2);
    connection
        .executemany(
            "INSERT INTO events (day, at, id, amount) VALUES (?, ?, ?, ?)",
            [
                vec![
                    Value::object(date!(2024-02-29)),
                    Value::object(datetime!(2024-02-29 12:30:45)),
                    Value::object(id),
                    Value::object(amount),
                ],
                vec![
                    Value::object(date!(1970-01-01)),
                    Value::object(datetime!(1999-12-31 23:59:59.25)),
                    Value::Null,
                    Value::Null,
                ],
            ],
        )
        .await
        .expect("Failed to insert the events");

    // Stored as text
    let mut cursor = connection.cursor().expect("Could not create a cursor");
    cursor
        .execute(
            "SELECT CAST(day AS TEXT), CAST(at AS TEXT), CAST(id AS TEXT) FROM events ORDER BY rowid",
            params![],
        )
        .await
        .expect("Failed to select the stored events");
    let rows = cursor.fetchall().await.expect("Failed to fetch the stored events");
    assert_eq!(
        rows[0].to_vec(),
        [
            Value::Text("2024-02-29".into()),
            Value::Text("2024-02-29 12:30:45".into()),
            Value::Text("5e915574-bb30-4430-98cf-c5854f61fbbd".into()),
        ]
    );
    assert_eq!(rows[1][0], Value::Text("1970-01-01".into()));

    // Converted back by declared type
    cursor
        .execute("SELECT day, at, id, amount FROM events ORDER BY rowid", params![])
        .await
        .expect("Failed to select the events");
    let rows = cursor.fetchall().await.expect("Failed to fetch the events");
    assert_eq!(rows[0]["day"].downcast_ref::<Date>(), Some(&date!(2024-02-29)));
    assert_eq!(
        rows[0]["at"].downcast_ref::<PrimitiveDateTime>(),
        Some(&datetime!(2024-02-29 12:30:45))
    );
    assert_eq!(rows[0]["id"].downcast_ref::<Uuid>(), Some(&id));
    assert_eq!(rows[0]["amount"].downcast_ref::<Decimal>(), Some(&amount));
    assert_eq!(rows[1]["day"].downcast_ref::<Date>(), Some(&date!(1970-01-01)));
    assert_eq!(
        rows[1]["at"].downcast_ref::<PrimitiveDateTime>(),
        Some(&datetime!(1999-12-31 23:59:59.25))
    );
    assert_eq!(rows[1]["id"], Value::Null);
    assert_eq!(rows[1]["amount"], Value::Null);

    cursor.close().await.expect("Failed to close the cursor");
    connection
        .close()
        .await
        .expect("Failed to close the connection");
}
