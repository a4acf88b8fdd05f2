use crate::{CBox, SqlitePrepared, error_message_from_ptr, prepared::prepare_error};
use cask_core::{
    ConnectOptions, DbError, Error, NativeHandle, OpenMode, Result, Value, logged, truncate_long,
};
use libsqlite3_sys::{
    SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_FULLMUTEX, SQLITE_OPEN_MEMORY,
    SQLITE_OPEN_READONLY, SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI, sqlite3, sqlite3_busy_timeout,
    sqlite3_close, sqlite3_errmsg, sqlite3_exec, sqlite3_finalize,
    sqlite3_get_autocommit, sqlite3_open_v2, sqlite3_prepare_v2,
};
use std::{
    ffi::{CStr, CString, c_char, c_int},
    fmt::{self, Debug},
    ptr,
    sync::Arc,
};
use tokio::{sync::RwLock, task::spawn_blocking};

// Left out of the `libsqlite3-sys` bindings, the bundled library still exports it.
unsafe extern "C" {
    fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;
}

/// Native SQLite handle, opened in serialized mode.
///
/// Statements of different cursors share it, the library serializes the
/// calls. Preparation and control statements run on the blocking pool while
/// holding a read guard on the handle, closing takes the write guard so it
/// waits for them to finish.
pub struct SqliteConnection {
    pub(crate) connection: Arc<RwLock<CBox<*mut sqlite3>>>,
}

impl SqliteConnection {
    pub(crate) async fn open(options: &ConnectOptions) -> Result<Self> {
        let target = options.database.clone();
        let context = || format!("While opening the SQLite database `{}`", truncate_long!(target));
        let path = CString::new(target.as_bytes()).map_err(|e| {
            logged!(Error::new(e)
                .context(DbError::Connection("The path contains a nul byte".into()))
                .context(context()))
        })?;
        let flags = SQLITE_OPEN_URI
            | SQLITE_OPEN_FULLMUTEX
            | match options.mode.unwrap_or_default() {
                OpenMode::ReadOnly => SQLITE_OPEN_READONLY,
                OpenMode::ReadWrite => SQLITE_OPEN_READWRITE,
                OpenMode::ReadWriteCreate => SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE,
                OpenMode::Memory => {
                    SQLITE_OPEN_MEMORY | SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE
                }
            };
        let timeout = c_int::try_from(options.timeout.as_millis()).unwrap_or(c_int::MAX);
        let connection = spawn_blocking(move || unsafe {
            let mut connection = CBox::new(ptr::null_mut(), |p| {
                sqlite3_close_v2(p);
            });
            let rc = sqlite3_open_v2(path.as_ptr(), &mut *connection, flags, ptr::null());
            if rc != SQLITE_OK {
                let message = if connection.is_null() {
                    "Out of memory".to_string()
                } else {
                    error_message_from_ptr(&sqlite3_errmsg(*connection)).to_string()
                };
                return Err(DbError::connection(message));
            }
            sqlite3_busy_timeout(*connection, timeout);
            Ok(connection)
        })
        .await
        .map_err(|e| logged!(Error::new(e).context(context())))?
        .map_err(|e| logged!(e.context(context())))?;
        log::debug!("Opened the SQLite database `{}`", target);
        Ok(Self {
            connection: Arc::new(RwLock::new(connection)),
        })
    }
}

/// The raw handle, an error once closed.
fn live(connection: &CBox<*mut sqlite3>) -> Result<*mut sqlite3> {
    if connection.is_null() {
        return Err(logged!(DbError::Closed("connection").into()));
    }
    Ok(connection.ptr)
}

impl NativeHandle for SqliteConnection {
    type Statement = SqlitePrepared;

    async fn prepare(&self, sql: &str, params: Vec<Value>) -> Result<SqlitePrepared> {
        let guard = self.connection.clone().read_owned().await;
        let query = sql.to_string();
        spawn_blocking(move || unsafe {
            let connection = live(&guard)?;
            let sql = CString::new(query.as_bytes()).map_err(|e| {
                logged!(Error::new(e).context(DbError::Query(
                    "Could not create a CString from the query String".into()
                )))
            })?;
            let mut statement = CBox::new(ptr::null_mut(), |p| {
                sqlite3_finalize(p);
            });
            let mut tail: *const c_char = ptr::null();
            let rc = sqlite3_prepare_v2(
                connection,
                sql.as_ptr(),
                query.len() as c_int + 1,
                &mut *statement,
                &mut tail,
            );
            if rc != SQLITE_OK {
                return Err(logged!(prepare_error(connection, &query)));
            }
            if !tail.is_null() && !is_blank(CStr::from_ptr(tail)) {
                return Err(logged!(
                    DbError::query("You can only execute one statement at a time").context(
                        format!("While preparing the query:\n{}", truncate_long!(query))
                    )
                ));
            }
            let mut prepared = SqlitePrepared::new(statement, &query)?;
            prepared.bind(params)?;
            Ok(prepared)
        })
        .await
        .map_err(|e| logged!(Error::new(e)))?
    }

    async fn exec(&self, sql: &str) -> Result<()> {
        let guard = self.connection.clone().read_owned().await;
        let query = sql.to_string();
        spawn_blocking(move || unsafe {
            let connection = live(&guard)?;
            let sql = CString::new(query.as_bytes()).map_err(|e| {
                logged!(Error::new(e).context(DbError::Query(
                    "Could not create a CString from the query String".into()
                )))
            })?;
            let rc = sqlite3_exec(connection, sql.as_ptr(), None, ptr::null_mut(), ptr::null_mut());
            if rc != SQLITE_OK {
                return Err(DbError::query(error_message_from_ptr(&sqlite3_errmsg(
                    connection,
                ))));
            }
            Ok(())
        })
        .await
        .map_err(|e| logged!(Error::new(e)))?
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.connection.write().await;
        if guard.is_null() {
            return Ok(());
        }
        unsafe {
            let rc = sqlite3_close(guard.ptr);
            if rc != SQLITE_OK {
                // Still owned, released in zombie mode on drop.
                return Err(DbError::connection(error_message_from_ptr(&sqlite3_errmsg(
                    guard.ptr,
                )))
                .context("While closing the SQLite database"));
            }
        }
        guard.take();
        log::debug!("Closed the SQLite database");
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        // A close in progress holds the write guard, the handle is going away
        let Ok(guard) = self.connection.try_read() else {
            return false;
        };
        !guard.is_null() && unsafe { sqlite3_get_autocommit(guard.ptr) == 0 }
    }
}

fn is_blank(tail: &CStr) -> bool {
    tail.to_bytes()
        .iter()
        .all(|c| c.is_ascii_whitespace() || *c == b';')
}

impl Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut result = f.debug_struct("SqliteConnection");
        match self.connection.try_read() {
            Ok(guard) => result.field("connection", &guard.ptr),
            Err(..) => result.field("connection", &"<closing>"),
        };
        result.finish()
    }
}
