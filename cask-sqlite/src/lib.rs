mod cbox;
mod connection;
mod driver;
mod extract;
mod prepared;

use cask_core::{ConnectOptions, Connection, Result};
use std::{
    ffi::{CStr, c_char},
    ptr,
};

pub(crate) use cbox::*;
pub use connection::*;
pub use driver::*;
pub use prepared::*;

/// Connect to a SQLite database.
///
/// ```rust,no_run
/// # async fn run() -> cask_core::Result<()> {
/// use cask_core::{PARSE_COLNAMES, PARSE_DECLTYPES, ConnectOptions};
/// let connection = cask_sqlite::connect(
///     ConnectOptions::new("app.sqlite").detect_types(PARSE_DECLTYPES | PARSE_COLNAMES),
/// )
/// .await?;
/// connection.close().await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect(options: impl Into<ConnectOptions>) -> Result<Connection<SqliteDriver>> {
    Connection::connect(SqliteDriver::new(), options).await
}

/// Connect using a `sqlite://<database>?<parameters>` URL.
pub async fn connect_url(url: &str) -> Result<Connection<SqliteDriver>> {
    Connection::connect_url(SqliteDriver::new(), url).await
}

pub(crate) fn error_message_from_ptr(ptr: &'_ *const c_char) -> &'_ str {
    unsafe {
        if *ptr != ptr::null() {
            CStr::from_ptr(*ptr)
                .to_str()
                .unwrap_or("Unknown error (the error message was not a valid C string)")
        } else {
            "Unknown error (could not extract the error message)"
        }
    }
}
