#[cfg(test)]
mod tests {
    use cask::{
        ConnectOptions, DbError, PARSE_COLNAMES, PARSE_DECLTYPES, Value, params, register_adapter,
        register_converter,
    };
    use cask_tests::init_logs;
    use indoc::indoc;
    use rust_decimal::Decimal;
    use std::{str::FromStr, sync::Mutex};
    use time::macros::date;

    static MUTEX: Mutex<()> = Mutex::new(());

    #[derive(Debug, PartialEq)]
    struct Temperature(f64);

    #[tokio::test]
    async fn global_registry() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        register_adapter(|t: &Temperature| Ok(Value::Text(format!("{}C", t.0))));
        register_converter("celsius", |s| {
            let Some(degrees) = s.strip_suffix('C') else {
                return Err(DbError::conversion(format!("`{}` has no unit", s)));
            };
            Ok(Value::object(Temperature(degrees.parse()?)))
        });
        let connection = cask::connect(
            ConnectOptions::new(":memory:").detect_types(PARSE_DECLTYPES | PARSE_COLNAMES),
        )
        .await
        .expect("Could not open the in memory database");
        connection
            .execute(
                indoc! {"
                    CREATE TABLE readings (
                        day date,
                        temperature celsius,
                        price decimal
                    )
                "},
                params![],
            )
            .await
            .expect("Failed to create the readings table");
        connection
            .executemany(
                "INSERT INTO readings (day, temperature, price) VALUES (?, ?, ?)",
                [
                    vec![
                        Value::object(date!(2024 - 01 - 15)),
                        Value::object(Temperature(21.5)),
                        Value::object(Decimal::from_str("1.10").unwrap()),
                    ],
                    vec![
                        Value::object(date!(2024 - 01 - 16)),
                        Value::object(Temperature(-3.0)),
                        Value::Null,
                    ],
                ],
            )
            .await
            .expect("Failed to insert the readings");
        let mut cursor = connection.cursor().expect("Could not create a cursor");
        let rows = cursor
            .execute(
                "SELECT day, temperature, price, temperature || '' AS raw FROM readings ORDER BY day",
                params![],
            )
            .await
            .expect("Failed to select the readings")
            .fetchall()
            .await
            .expect("Failed to fetch the readings");
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0]["day"].downcast_ref::<time::Date>(),
            Some(&date!(2024 - 01 - 15))
        );
        assert_eq!(
            rows[0]["temperature"].downcast_ref::<Temperature>(),
            Some(&Temperature(21.5))
        );
        assert_eq!(
            rows[0]["price"].downcast_ref::<Decimal>(),
            Some(&Decimal::from_str("1.10").unwrap())
        );
        assert_eq!(rows[0]["raw"], Value::Text("21.5C".into()));
        assert_eq!(
            rows[1]["temperature"].downcast_ref::<Temperature>(),
            Some(&Temperature(-3.0))
        );
        assert_eq!(rows[1]["price"], Value::Null);
        cursor.close().await.expect("Failed to close the cursor");
        connection
            .close()
            .await
            .expect("Failed to close the connection");
    }

    #[tokio::test]
    async fn connect_url() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let connection = cask::connect_url("sqlite://:memory:?isolation_level=autocommit")
            .await
            .expect("Could not open the in memory database");
        assert_eq!(connection.isolation_level(), None);
        let row = connection
            .cursor()
            .expect("Could not create a cursor")
            .execute("SELECT ? + 1", params![41])
            .await
            .expect("Failed to select the answer")
            .fetchone()
            .await
            .expect("Failed to fetch the answer")
            .expect("Expected a row");
        assert_eq!(row[0], Value::Integer(42));
        assert!(!connection.in_transaction());
        connection
            .close()
            .await
            .expect("Failed to close the connection");
        assert!(connection.cursor().is_err());
    }
}
