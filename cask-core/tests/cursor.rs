#[cfg(test)]
mod tests {
    use cask_core::{
        ColumnInfo, Columns, ConnectOptions, Connection, ConversionRegistry, CursorStatus, DbError,
        Driver, NativeHandle, NativeStatement, PARSE_DECLTYPES, RawRow, Result,
        RowsAffected, Value, params, stream::TryStreamExt,
    };
    use cask_tests::{init_logs, silent_logs};
    use std::{
        collections::VecDeque,
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
    };

    /// Scripted engine recording what the core asks of it.
    #[derive(Default)]
    struct Engine {
        live: AtomicUsize,
        finalized: AtomicUsize,
        transaction: AtomicBool,
        fail_begin: AtomicBool,
        closed: AtomicBool,
        fail_close: AtomicBool,
        log: Mutex<Vec<String>>,
    }

    impl Engine {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[derive(Clone, Default)]
    struct MockDriver(Arc<Engine>);

    struct MockHandle(Arc<Engine>);

    struct MockStatement {
        engine: Arc<Engine>,
        rows: VecDeque<RawRow>,
        affected: RowsAffected,
        fail_run: bool,
        fail_finalize: bool,
        finalized: bool,
    }

    impl Driver for MockDriver {
        type Handle = MockHandle;
        type Statement = MockStatement;

        const NAME: &'static str = "mock";

        async fn open(&self, _options: &ConnectOptions) -> Result<MockHandle> {
            Ok(MockHandle(self.0.clone()))
        }
    }

    impl NativeHandle for MockHandle {
        type Statement = MockStatement;

        async fn prepare(&self, sql: &str, params: Vec<Value>) -> Result<MockStatement> {
            if sql == "FAIL" {
                return Err(DbError::query("near \"FAIL\": syntax error"));
            }
            let mut statement = MockStatement {
                engine: self.0.clone(),
                rows: VecDeque::new(),
                affected: Default::default(),
                fail_run: sql == "RUNFAIL",
                fail_finalize: sql == "STICKY",
                finalized: false,
            };
            if sql == "SELECT" {
                let count = match params.first() {
                    Some(Value::Integer(v)) => *v,
                    _ => 0,
                };
                let columns: Columns = Arc::new([ColumnInfo::new("n", Some("int".into()))]);
                statement.rows = (1..=count)
                    .map(|i| RawRow::new(columns.clone(), Box::new([Value::Integer(i)])))
                    .collect();
            }
            if sql == "INSERT" {
                statement.affected = RowsAffected {
                    rows_affected: 1,
                    last_affected_id: Some(42),
                };
            }
            self.0.live.fetch_add(1, Ordering::SeqCst);
            Ok(statement)
        }

        async fn exec(&self, sql: &str) -> Result<()> {
            self.0.log.lock().unwrap().push(sql.to_string());
            if sql.starts_with("BEGIN") {
                if self.0.fail_begin.load(Ordering::SeqCst) {
                    return Err(DbError::query("database is locked"));
                }
                if self.0.transaction.swap(true, Ordering::SeqCst) {
                    return Err(DbError::query(
                        "cannot start a transaction within a transaction",
                    ));
                }
            } else {
                self.0.transaction.store(false, Ordering::SeqCst);
            }
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            if self.0.fail_close.load(Ordering::SeqCst) {
                return Err(DbError::connection("unable to close due to unfinalized statements"));
            }
            self.0.closed.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn in_transaction(&self) -> bool {
            self.0.transaction.load(Ordering::SeqCst)
        }
    }

    impl NativeStatement for MockStatement {
        async fn run(&mut self) -> Result<RowsAffected> {
            if self.fail_run {
                return Err(DbError::query("constraint failed"));
            }
            Ok(self.affected)
        }

        async fn reset(&mut self) -> Result<()> {
            Ok(())
        }

        async fn get(&mut self) -> Result<Option<RawRow>> {
            Ok(self.rows.pop_front())
        }

        async fn finalize(&mut self) -> Result<()> {
            if self.finalized {
                return Ok(());
            }
            self.finalized = true;
            self.engine.live.fetch_sub(1, Ordering::SeqCst);
            self.engine.finalized.fetch_add(1, Ordering::SeqCst);
            if self.fail_finalize {
                return Err(DbError::query("finalize failed"));
            }
            Ok(())
        }
    }

    impl Drop for MockStatement {
        fn drop(&mut self) {
            if !self.finalized {
                self.engine.live.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    async fn connect(driver: &MockDriver) -> Connection<MockDriver> {
        Connection::connect(driver.clone(), ConnectOptions::default())
            .await
            .expect("Could not connect the mock driver")
    }

    #[tokio::test]
    async fn at_most_one_statement() {
        init_logs();
        let driver = MockDriver::default();
        let connection = connect(&driver).await;
        let mut cursor = connection.cursor().unwrap();
        cursor.execute("SELECT", params![3]).await.unwrap();
        assert_eq!(driver.0.live.load(Ordering::SeqCst), 1);
        cursor.execute("SELECT", params![2]).await.unwrap();
        assert_eq!(driver.0.live.load(Ordering::SeqCst), 1);
        assert_eq!(driver.0.finalized.load(Ordering::SeqCst), 1);
        assert_eq!(cursor.fetchall().await.unwrap().len(), 2);
        assert_eq!(cursor.status().await, CursorStatus::Active);
        cursor.close().await.unwrap();
        cursor.close().await.unwrap();
        assert_eq!(driver.0.live.load(Ordering::SeqCst), 0);
        assert_eq!(driver.0.finalized.load(Ordering::SeqCst), 2);
        assert_eq!(cursor.status().await, CursorStatus::Closed);
    }

    #[tokio::test]
    async fn failed_execute_leaves_idle() {
        init_logs();
        let driver = MockDriver::default();
        let connection = connect(&driver).await;
        let mut cursor = connection.cursor().unwrap();
        cursor.execute("SELECT", params![2]).await.unwrap();
        silent_logs! {
            let error = cursor.execute("FAIL", params![]).await.unwrap_err();
            assert!(matches!(DbError::of(&error), Some(DbError::Query(..))));
            assert_eq!(cursor.status().await, CursorStatus::Idle);
            assert_eq!(driver.0.live.load(Ordering::SeqCst), 0);
            let error = cursor.execute("RUNFAIL", params![]).await.unwrap_err();
            assert_eq!(DbError::of(&error), Some(&DbError::Query("constraint failed".into())));
            assert_eq!(cursor.status().await, CursorStatus::Idle);
            assert_eq!(driver.0.live.load(Ordering::SeqCst), 0, "The failed statement is finalized");
        }
        assert!(cursor.fetchone().await.unwrap().is_none());
        cursor.execute("SELECT", params![1]).await.unwrap();
        assert_eq!(cursor.fetchall().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn close_keeps_going() {
        init_logs();
        let driver = MockDriver::default();
        let connection = connect(&driver).await;
        let mut sticky = connection.cursor().unwrap();
        let mut active = connection.cursor().unwrap();
        let idle = connection.cursor().unwrap();
        sticky.execute("STICKY", params![]).await.unwrap();
        active.execute("SELECT", params![5]).await.unwrap();
        assert_eq!(connection.open_cursors(), 3);
        silent_logs! {
            connection.close().await.unwrap();
        }
        assert_eq!(connection.open_cursors(), 0);
        assert_eq!(driver.0.live.load(Ordering::SeqCst), 0);
        assert!(driver.0.closed.load(Ordering::SeqCst));
        assert_eq!(sticky.status().await, CursorStatus::Closed);
        assert_eq!(active.status().await, CursorStatus::Closed);
        assert_eq!(idle.status().await, CursorStatus::Closed);
        assert!(active.fetchone().await.unwrap().is_none());
        silent_logs! {
            let error = active.execute("SELECT", params![1]).await.unwrap_err();
            assert_eq!(DbError::of(&error), Some(&DbError::Closed("cursor")));
            let error = connection.cursor().unwrap_err();
            assert_eq!(DbError::of(&error), Some(&DbError::Closed("connection")));
        }
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_retries_the_handle() {
        init_logs();
        let driver = MockDriver::default();
        let connection = connect(&driver).await;
        let mut cursor = connection.cursor().unwrap();
        cursor.execute("SELECT", params![2]).await.unwrap();
        driver.0.fail_close.store(true, Ordering::SeqCst);
        silent_logs! {
            let error = connection.close().await.unwrap_err();
            assert!(matches!(DbError::of(&error), Some(DbError::Connection(..))));
            assert!(connection.is_closed());
            assert!(!driver.0.closed.load(Ordering::SeqCst));
            assert_eq!(cursor.status().await, CursorStatus::Closed);
            assert!(connection.close().await.is_err(), "The handle is still open");
        }
        driver.0.fail_close.store(false, Ordering::SeqCst);
        connection.close().await.unwrap();
        assert!(driver.0.closed.load(Ordering::SeqCst));
        driver.0.closed.store(false, Ordering::SeqCst);
        connection.close().await.unwrap();
        assert!(
            !driver.0.closed.load(Ordering::SeqCst),
            "A released handle is not closed again"
        );
    }

    #[tokio::test]
    async fn transaction_statements() {
        init_logs();
        let driver = MockDriver::default();
        let connection = connect(&driver).await;
        assert!(driver.0.log().is_empty(), "Connecting issues nothing");
        connection.commit().await.unwrap();
        assert!(driver.0.log().is_empty(), "Nothing to commit");
        connection.rollback().await.unwrap();
        assert_eq!(driver.0.log(), ["BEGIN"]);
        connection.rollback().await.unwrap();
        assert_eq!(driver.0.log(), ["BEGIN", "ROLLBACK", "BEGIN"]);
        connection.commit().await.unwrap();
        connection
            .set_isolation_level(Some("IMMEDIATE"))
            .await
            .unwrap();
        connection.begin().await.unwrap();
        connection.set_isolation_level(None).await.unwrap();
        assert_eq!(
            driver.0.log(),
            ["BEGIN", "ROLLBACK", "BEGIN", "COMMIT", "BEGIN IMMEDIATE", "COMMIT"]
        );
        connection.rollback().await.unwrap();
        connection.begin().await.unwrap();
        connection.rollback().await.unwrap();
        assert_eq!(
            &driver.0.log()[6..],
            ["BEGIN", "ROLLBACK"],
            "Autocommit only rolls back"
        );
        assert!(!connection.in_transaction());
    }

    #[tokio::test]
    async fn broken_rollback() {
        init_logs();
        let driver = MockDriver::default();
        let connection = connect(&driver).await;
        connection.begin().await.unwrap();
        driver.0.fail_begin.store(true, Ordering::SeqCst);
        silent_logs! {
            let error = connection.rollback().await.unwrap_err();
            assert!(matches!(DbError::of(&error), Some(DbError::Transaction(..))));
            assert!(!connection.in_transaction());
            driver.0.fail_begin.store(false, Ordering::SeqCst);
            for error in [
                connection.begin().await.unwrap_err(),
                connection.commit().await.unwrap_err(),
                connection.rollback().await.unwrap_err(),
            ] {
                assert!(matches!(DbError::of(&error), Some(DbError::Transaction(..))));
            }
        }
        assert_eq!(driver.0.log(), ["BEGIN", "ROLLBACK", "BEGIN"]);
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn executemany_aggregates() {
        init_logs();
        let driver = MockDriver::default();
        let connection = connect(&driver).await;
        let affected = connection
            .executemany("INSERT", (0..3).map(|i| params![i]))
            .await
            .unwrap();
        assert_eq!(affected.rows_affected, 3);
        assert_eq!(affected.last_affected_id, Some(42));
        assert_eq!(driver.0.finalized.load(Ordering::SeqCst), 3);
        assert_eq!(driver.0.live.load(Ordering::SeqCst), 0);
        assert_eq!(connection.open_cursors(), 0);
        silent_logs! {
            assert!(
                connection
                    .executemany("FAIL", [params![], params![]])
                    .await
                    .is_err()
            );
        }
        assert_eq!(connection.open_cursors(), 0);
        let affected = connection.execute("SELECT", params![4]).await.unwrap();
        assert_eq!(affected, RowsAffected::default());
        assert_eq!(driver.0.live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rows_and_conversion() {
        init_logs();
        let driver = MockDriver::default();
        let registry = Arc::new(ConversionRegistry::new());
        registry.register_converter("int", |s| Ok(Value::Integer(s.parse::<i64>()? * 10)));
        let connection = Connection::connect(
            driver.clone(),
            ConnectOptions::default()
                .detect_types(PARSE_DECLTYPES)
                .registry(registry),
        )
        .await
        .unwrap();
        let mut cursor = connection.cursor().unwrap();
        assert!(cursor.description().is_none());
        let rows = cursor
            .execute("SELECT", params![3])
            .rows()
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        assert_eq!(
            rows.iter().map(|r| r["n"].clone()).collect::<Vec<_>>(),
            [Value::Integer(10), Value::Integer(20), Value::Integer(30)]
        );
        assert_eq!(
            cursor.description().unwrap(),
            [ColumnInfo::new("n", Some("int".into()))]
        );
        cursor.execute("INSERT", params![]).await.unwrap();
        assert_eq!(cursor.lastrowid(), Some(42));
        assert!(cursor.description().is_none());
        cursor.execute("SELECT", params![1]).await.unwrap();
        assert_eq!(cursor.lastrowid(), Some(42));
        let rows = cursor.fetchmany(5).await.unwrap();
        assert_eq!(rows.len(), 1);
        drop(cursor);
        assert_eq!(connection.open_cursors(), 0);
        assert_eq!(driver.0.live.load(Ordering::SeqCst), 0, "Dropping releases the statement");
    }
}
