use crate::open;
use cask_core::{
    ConnectOptions, ConversionRegistry, DbError, Driver, Error, PARSE_COLNAMES, PARSE_DECLTYPES,
    PARSE_NONE, Value, params,
};
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

#[derive(Debug, Clone, PartialEq)]
struct Point {
    x: f64,
    y: f64,
}

impl Point {
    fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug)]
struct Unregistered;

#[derive(Debug)]
struct Faulty;

fn parse_point(s: &str) -> cask_core::Result<Point> {
    let Some((x, y)) = s.split_once(';') else {
        return Err(DbError::conversion(format!("`{}` is not a point", s)));
    };
    Ok(Point::new(x.parse()?, y.parse()?))
}

fn registry() -> Arc<ConversionRegistry> {
    let registry = ConversionRegistry::with_defaults();
    registry.register_adapter(|p: &Point| Ok(Value::Text(format!("{};{}", p.x, p.y))));
    registry.register_adapter(|_: &Faulty| Err(Error::msg("faulty adapter")));
    registry.register_converter("point", |s| parse_point(s).map(Value::object));
    registry.register_converter("swapped", |s| {
        parse_point(s).map(|p| Value::object(Point::new(p.y, p.x)))
    });
    registry.register_converter("nothing", |_| Ok(Value::Null));
    registry.register_converter("strict", |s| {
        Err(DbError::conversion(format!("`{}` is rejected", s)))
    });
    Arc::new(registry)
}

pub async fn type_adapters<D: Driver + Clone>(driver: &D, options: &ConnectOptions) {
    let _lock = MUTEX.lock().await;
    let registry = registry();
    let connection = open(
        driver,
        options
            .clone()
            .detect_types(PARSE_COLNAMES)
            .registry(registry.clone()),
    )
    .await;

    // Setup
    for table in ["points", "typed_points", "empty_points"] {
        connection
            .execute(format!("DROP TABLE IF EXISTS {}", table), params![])
            .await
            .expect("Failed to drop a points table");
    }
    connection
        .execute("CREATE TABLE points (p)", params![])
        .await
        .expect("Failed to create the points table");
    connection
        .execute("CREATE TABLE typed_points (p point)", params![])
        .await
        .expect("Failed to create the typed_points table");
    connection
        .execute("CREATE TABLE empty_points (p nothing)", params![])
        .await
        .expect("Failed to create the empty_points table");
    for table in ["points", "typed_points", "empty_points"] {
        connection
            .executemany(
                format!("INSERT INTO {} (p) VALUES (?)", table),
                [
                    vec![Value::object(Point::new(1.0, 2.0))],
                    vec![Value::object(Point::new(5.5, 3.3))],
                ],
            )
            .await
            .expect("Failed to insert the points");
    }

    // Adapter output is what gets stored
    let mut cursor = connection.cursor().expect("Could not create a cursor");
    cursor
        .execute("SELECT p FROM points", params![])
        .await
        .expect("Failed to select the raw points");
    let rows = cursor.fetchall().await.expect("Failed to fetch the raw points");
    assert_eq!(
        rows.iter().map(|r| r[0].clone()).collect::<Vec<_>>(),
        [Value::Text("1;2".into()), Value::Text("5.5;3.3".into())]
    );

    // Column name annotation
    cursor
        .execute(r#"SELECT p AS "p [point]" FROM points"#, params![])
        .await
        .expect("Failed to select the annotated points");
    let rows = cursor.fetchall().await.expect("Failed to fetch the points");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].columns()[0].name, "p [point]");
    assert_eq!(rows[0].columns()[0].annotation.as_deref(), Some("point"));
    assert_eq!(rows[0]["p [point]"].downcast_ref::<Point>(), Some(&Point::new(1.0, 2.0)));
    assert_eq!(rows[1][0].downcast_ref::<Point>(), Some(&Point::new(5.5, 3.3)));

    // Unknown annotation and malformed names keep the raw value
    cursor
        .execute(
            r#"SELECT p AS "p [unknown]", p AS "p [point", p AS "p point]" FROM points"#,
            params![],
        )
        .await
        .expect("Failed to select the badly annotated points");
    let row = cursor
        .fetchone()
        .await
        .expect("Failed to fetch a badly annotated point")
        .expect("Expected a point");
    assert!(row.values().all(|v| *v == Value::Text("1;2".into())));
    assert_eq!(row.columns()[1].annotation, None);

    // Declared types are ignored without the flag
    cursor
        .execute("SELECT p FROM typed_points", params![])
        .await
        .expect("Failed to select the typed points");
    let row = cursor
        .fetchone()
        .await
        .expect("Failed to fetch a typed point")
        .expect("Expected a point");
    assert_eq!(row[0], Value::Text("1;2".into()));
    assert_eq!(row.columns()[0].decltype.as_deref(), Some("point"));
    cursor.close().await.expect("Failed to close the cursor");
    connection
        .close()
        .await
        .expect("Failed to close the connection");

    // Declared type converter
    let connection = open(
        driver,
        options
            .clone()
            .detect_types(PARSE_DECLTYPES)
            .registry(registry.clone()),
    )
    .await;
    let mut cursor = connection.cursor().expect("Could not create a cursor");
    cursor
        .execute(r#"SELECT p, p AS "q [swapped]" FROM typed_points"#, params![])
        .await
        .expect("Failed to select the typed points");
    let rows = cursor.fetchall().await.expect("Failed to fetch the typed points");
    assert_eq!(rows[0]["p"].downcast_ref::<Point>(), Some(&Point::new(1.0, 2.0)));
    assert_eq!(
        rows[1]["q [swapped]"].downcast_ref::<Point>(),
        Some(&Point::new(5.5, 3.3)),
        "Without the column names flag the annotation is not considered"
    );
    assert_eq!(rows[0].columns()[1].annotation, None);
    cursor.close().await.expect("Failed to close the cursor");
    connection
        .close()
        .await
        .expect("Failed to close the connection");

    // Both flags: the declared type wins, the annotation is the fallback
    let connection = open(
        driver,
        options
            .clone()
            .detect_types(PARSE_DECLTYPES | PARSE_COLNAMES)
            .registry(registry.clone()),
    )
    .await;
    let mut cursor = connection.cursor().expect("Could not create a cursor");
    cursor
        .execute(r#"SELECT p AS "p [swapped]" FROM typed_points"#, params![])
        .await
        .expect("Failed to select the typed points");
    let row = cursor
        .fetchone()
        .await
        .expect("Failed to fetch a typed point")
        .expect("Expected a point");
    assert_eq!(row[0].downcast_ref::<Point>(), Some(&Point::new(1.0, 2.0)));
    cursor
        .execute(r#"SELECT p AS "p [swapped]" FROM points"#, params![])
        .await
        .expect("Failed to select the untyped points");
    let row = cursor
        .fetchone()
        .await
        .expect("Failed to fetch an untyped point")
        .expect("Expected a point");
    assert_eq!(row[0].downcast_ref::<Point>(), Some(&Point::new(2.0, 1.0)));
    cursor
        .execute(r#"SELECT p AS "p [point]" FROM empty_points"#, params![])
        .await
        .expect("Failed to select the empty points");
    let row = cursor
        .fetchone()
        .await
        .expect("Failed to fetch an empty point")
        .expect("Expected a point");
    assert_eq!(
        row[0].downcast_ref::<Point>(),
        Some(&Point::new(1.0, 2.0)),
        "A declared type converter returning null falls back to the annotation"
    );

    // Converters never see NULL
    cursor
        .execute(r#"SELECT NULL AS "p [strict]""#, params![])
        .await
        .expect("Failed to select null");
    let row = cursor
        .fetchone()
        .await
        .expect("A null value does not reach the converter")
        .expect("Expected a row");
    assert_eq!(row[0], Value::Null);

    // Converter errors are returned as they are
    cursor
        .execute(r#"SELECT 'value' AS "p [strict]""#, params![])
        .await
        .expect("Failed to select a value");
    let error = cursor
        .fetchone()
        .await
        .expect_err("The strict converter rejects everything");
    assert!(matches!(DbError::of(&error), Some(DbError::Conversion(..))));

    // Adapter errors are returned as they are
    let error = cursor
        .execute("SELECT ?", vec![Value::object(Faulty)])
        .await
        .expect_err("The faulty adapter always fails");
    assert_eq!(error.to_string(), "faulty adapter");
    assert_eq!(DbError::of(&error), None);

    // Objects without an adapter cannot be bound
    let error = cursor
        .execute("SELECT ?", vec![Value::object(Unregistered)])
        .await
        .expect_err("An object without adapter cannot be bound");
    assert!(matches!(DbError::of(&error), Some(DbError::Query(..))));
    cursor.close().await.expect("Failed to close the cursor");
    connection
        .close()
        .await
        .expect("Failed to close the connection");

    // Registering again replaces the converter
    registry.register_converter("point", |_| Ok(Value::Text("replaced".into())));
    let connection = open(
        driver,
        options
            .clone()
            .detect_types(PARSE_NONE | PARSE_COLNAMES)
            .registry(registry.clone()),
    )
    .await;
    let mut cursor = connection.cursor().expect("Could not create a cursor");
    let row = cursor
        .execute(r#"SELECT p AS "p [point]" FROM points"#, params![])
        .await
        .expect("Failed to select the points")
        .fetchone()
        .await
        .expect("Failed to fetch a point")
        .expect("Expected a point");
    assert_eq!(row[0], Value::Text("replaced".into()));
    registry.register_converter("point", |s| parse_point(s).map(Value::object));
    cursor.close().await.expect("Failed to close the cursor");
    connection
        .close()
        .await
        .expect("Failed to close the connection");
}
