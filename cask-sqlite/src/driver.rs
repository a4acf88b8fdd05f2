use crate::{SqliteConnection, SqlitePrepared};
use cask_core::{ConnectOptions, Driver, Result};

#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteDriver {}

impl SqliteDriver {
    pub const fn new() -> Self {
        Self {}
    }
}

impl Driver for SqliteDriver {
    type Handle = SqliteConnection;
    type Statement = SqlitePrepared;

    const NAME: &'static str = "sqlite";

    async fn open(&self, options: &ConnectOptions) -> Result<SqliteConnection> {
        SqliteConnection::open(options).await
    }
}
