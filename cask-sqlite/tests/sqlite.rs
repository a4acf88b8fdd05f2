#[cfg(test)]
mod tests {
    use cask_core::ConnectOptions;
    use cask_sqlite::{SqliteDriver, connect};
    use cask_tests::{execute_tests, init_logs};
    use std::path::Path;
    use std::sync::Mutex;
    use tokio::fs;

    static MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn sqlite() {
        init_logs();
        const DB_PATH: &'static str = "../target/debug/tests.sqlite";
        let _guard = MUTEX.lock().unwrap();
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH).await.expect(
                format!("Failed to remove existing test database file {}", DB_PATH).as_str(),
            );
        }
        assert!(
            !Path::new(DB_PATH).exists(),
            "Database file should not exist before test"
        );
        let options = ConnectOptions::from_url(&format!("sqlite://{}?mode=rwc", DB_PATH))
            .expect("Could not parse the connection url");
        execute_tests(SqliteDriver::new(), options).await;
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after connection"
        );
    }

    #[tokio::test]
    async fn sqlite_memory() {
        init_logs();
        // The shared database lives as long as one connection is open
        let options = ConnectOptions::new("file:cask_tests?mode=memory&cache=shared");
        let keeper = connect(options.clone())
            .await
            .expect("Could not open the in memory database");
        execute_tests(SqliteDriver::new(), options).await;
        keeper.close().await.expect("Could not close the in memory database");
    }
}
