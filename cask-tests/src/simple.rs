use crate::open;
use cask_core::{ConnectOptions, Driver, Value, params};
use indoc::indoc;
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn simple<D: Driver + Clone>(driver: &D, options: &ConnectOptions) {
    let _lock = MUTEX.lock().await;
    let connection = open(driver, options.clone().isolation_level(None)).await;

    // Setup
    connection
        .execute("DROP TABLE IF EXISTS simple_books", params![])
        .await
        .expect("Failed to drop the simple_books table");
    connection
        .execute(
            indoc! {"
                CREATE TABLE simple_books (
                    id INTEGER PRIMARY KEY,
                    title TEXT NOT NULL,
                    year INTEGER,
                    rating REAL,
                    cover BLOB
                )
            "},
            params![],
        )
        .await
        .expect("Failed to create the simple_books table");

    // Insert
    let mut cursor = connection.cursor().expect("Could not create a cursor");
    cursor
        .execute(
            "INSERT INTO simple_books (title, year, rating, cover) VALUES (?, ?, ?, ?)",
            params!["Dune", 1965, 4.25, vec![0xCAu8, 0xFE]],
        )
        .await
        .expect("Failed to insert the first book");
    assert_eq!(cursor.rows_affected().rows_affected, 1);
    assert_eq!(cursor.lastrowid(), Some(1));
    let affected = connection
        .executemany(
            "INSERT INTO simple_books (title, year, rating) VALUES (?, ?, ?)",
            [
                params!["Neuromancer", 1984, 3.9],
                params!["Hyperion", 1989, Value::Null],
                params!["Solaris", Value::Null, 4.0],
            ],
        )
        .await
        .expect("Failed to insert the other books");
    assert_eq!(affected.rows_affected, 3);
    assert_eq!(affected.last_affected_id, Some(4));

    // Fetch one
    cursor
        .execute(
            "SELECT id, title, year, rating, cover FROM simple_books WHERE id = ?",
            params![1],
        )
        .await
        .expect("Failed to query the first book");
    assert_eq!(cursor.rows_affected().rows_affected, 0);
    assert_eq!(cursor.lastrowid(), Some(1), "A select keeps the last rowid");
    let row = cursor
        .fetchone()
        .await
        .expect("Failed to fetch the first book")
        .expect("The first book was not found");
    assert_eq!(row.len(), 5);
    assert_eq!(
        row.names().collect::<Vec<_>>(),
        ["id", "title", "year", "rating", "cover"]
    );
    assert_eq!(row[0], Value::Integer(1));
    assert_eq!(row["title"], Value::Text("Dune".into()));
    assert_eq!(row[2], row["year"]);
    assert_eq!(row["rating"], Value::Real(4.25));
    assert_eq!(row["cover"], Value::Blob([0xCA, 0xFE].into()));
    assert_eq!(row.columns()[1].decltype.as_deref(), Some("TEXT"));
    assert_eq!(row.columns()[1].annotation, None);
    let description = cursor
        .description()
        .expect("The description is known after a fetch")
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(description, ["id", "title", "year", "rating", "cover"]);
    let tail = row.slice(1..3).expect("Failed to slice the row");
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0], Value::Text("Dune".into()));
    assert_eq!(tail["year"], Value::Integer(1965));
    assert_eq!(tail.get_column("id"), None);
    assert!(row.slice(3..6).is_err());
    assert!(
        cursor
            .fetchone()
            .await
            .expect("Failed to fetch past the end")
            .is_none()
    );

    // Fetch many
    cursor
        .execute(
            "SELECT title, year FROM simple_books ORDER BY id",
            params![],
        )
        .await
        .expect("Failed to query the books");
    let first = cursor.fetchmany(2).await.expect("Failed to fetch two books");
    assert_eq!(first.len(), 2);
    assert_eq!(first[0]["title"], Value::Text("Dune".into()));
    assert_eq!(first[1]["title"], Value::Text("Neuromancer".into()));
    let rest = cursor.fetchall().await.expect("Failed to fetch the rest");
    assert_eq!(
        rest.iter().map(|r| r[0].clone()).collect::<Vec<_>>(),
        [
            Value::Text("Hyperion".into()),
            Value::Text("Solaris".into())
        ]
    );
    assert_eq!(rest[1]["year"], Value::Null);
    assert!(
        cursor
            .fetchmany(3)
            .await
            .expect("Failed to fetch from an exhausted cursor")
            .is_empty()
    );

    // Update
    cursor
        .execute(
            "UPDATE simple_books SET rating = rating + 1 WHERE rating IS NOT NULL",
            params![],
        )
        .await
        .expect("Failed to update the ratings");
    assert_eq!(cursor.rows_affected().rows_affected, 3);
    assert!(
        cursor
            .fetchone()
            .await
            .expect("An update returns no rows")
            .is_none()
    );
    let affected = connection
        .execute("DELETE FROM simple_books WHERE year IS NULL", params![])
        .await
        .expect("Failed to delete the books without a year");
    assert_eq!(affected.rows_affected, 1);

    // Values
    cursor
        .execute(
            "SELECT ?, ?, ?, ?, ?",
            params![Value::Null, -7i64, 0.5f64, "text", Vec::<u8>::new()],
        )
        .await
        .expect("Failed to select literal values");
    let row = cursor
        .fetchone()
        .await
        .expect("Failed to fetch the literal values")
        .expect("A select of literals returns a row");
    assert_eq!(
        row.to_vec(),
        [
            Value::Null,
            Value::Integer(-7),
            Value::Real(0.5),
            Value::Text("text".into()),
            Value::Blob(Box::default()),
        ]
    );

    cursor.close().await.expect("Failed to close the cursor");
    connection
        .close()
        .await
        .expect("Failed to close the connection");
}
