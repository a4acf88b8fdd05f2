//! DB-API style access to SQL engines: connections, cursors and a pluggable
//! conversion pipeline between application values and engine values.
//!
//! ```rust,no_run
//! use cask::{PARSE_COLNAMES, ConnectOptions, Value, params};
//!
//! # async fn run() -> cask::Result<()> {
//! let connection = cask::connect(ConnectOptions::new(":memory:").detect_types(PARSE_COLNAMES)).await?;
//! connection.execute("CREATE TABLE foo (num int)", params![]).await?;
//! connection
//!     .executemany("INSERT INTO foo (num) VALUES (?)", [params![1], params![2]])
//!     .await?;
//! let mut cursor = connection.cursor()?;
//! cursor.execute("SELECT num FROM foo", params![]).await?;
//! while let Some(row) = cursor.fetchone().await? {
//!     assert!(matches!(row["num"], Value::Integer(..)));
//! }
//! cursor.close().await?;
//! connection.close().await?;
//! # Ok(())
//! # }
//! ```

pub use cask_core::*;
#[cfg(feature = "sqlite")]
pub use cask_sqlite::{self as sqlite, SqliteDriver, connect, connect_url};
