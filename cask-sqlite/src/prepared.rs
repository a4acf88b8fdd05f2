use crate::{
    CBox, error_message_from_ptr,
    extract::{extract_columns, extract_row},
};
use cask_core::{
    Columns, DbError, Error, NativeStatement, RawRow, Result, RowsAffected, Value, logged,
    truncate_long,
};
use libsqlite3_sys::*;
use std::{
    ffi::{CStr, c_int},
    fmt::{self, Display},
    os::raw::{c_char, c_void},
    ptr,
};

/// Statements starting with `INSERT` or `REPLACE` always report the rowid,
/// even when it did not move (a replace of the last row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Insert,
    Other,
}

impl Kind {
    fn of(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or_default();
        if keyword.eq_ignore_ascii_case("insert") || keyword.eq_ignore_ascii_case("replace") {
            Kind::Insert
        } else {
            Kind::Other
        }
    }
}

/// A compiled and bound SQLite statement.
///
/// [`NativeStatement::run`] steps once and keeps the first row (if any)
/// pending, so that the following fetches see it without stepping the
/// statement again. Modifications happen exactly once, and all of them
/// (`RETURNING` included) are done by the first step, which is when the
/// change count and the rowid are read.
pub struct SqlitePrepared {
    /// `None` for an empty statement or once finalized.
    statement: Option<CBox<*mut sqlite3_stmt>>,
    columns: Columns,
    kind: Kind,
    readonly: bool,
    pending: Option<RawRow>,
    /// Stepped past the first row.
    consumed: bool,
    done: bool,
}

impl SqlitePrepared {
    pub(crate) fn new(statement: CBox<*mut sqlite3_stmt>, sql: &str) -> Result<Self> {
        if statement.is_null() {
            return Ok(Self {
                statement: None,
                columns: Columns::from([]),
                kind: Kind::Other,
                readonly: true,
                pending: None,
                consumed: false,
                done: true,
            });
        }
        let columns = extract_columns(*statement)?;
        let readonly = unsafe { sqlite3_stmt_readonly(*statement) != 0 };
        Ok(Self {
            statement: Some(statement),
            columns,
            kind: Kind::of(sql),
            readonly,
            pending: None,
            consumed: false,
            done: false,
        })
    }

    pub(crate) fn bind(&mut self, params: Vec<Value>) -> Result<()> {
        let Some(statement) = &self.statement else {
            if !params.is_empty() {
                return Err(logged!(DbError::query(format!(
                    "Incorrect number of bindings supplied, the statement uses 0 and {} were supplied",
                    params.len()
                ))));
            }
            return Ok(());
        };
        let statement = **statement;
        unsafe {
            sqlite3_clear_bindings(statement);
            let expected = sqlite3_bind_parameter_count(statement) as usize;
            if expected != params.len() {
                return Err(logged!(DbError::query(format!(
                    "Incorrect number of bindings supplied, the statement uses {} and {} were supplied",
                    expected,
                    params.len()
                ))));
            }
            for (i, value) in params.iter().enumerate() {
                bind_index(statement, value, i as c_int + 1)?;
            }
        }
        Ok(())
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// Step once, `None` when done. A lock still held by another connection
    /// after the busy timeout is reported as an error.
    fn step(&mut self) -> Result<Option<RawRow>> {
        let Some(statement) = &self.statement else {
            return Ok(None);
        };
        if self.done {
            return Ok(None);
        }
        let statement = **statement;
        unsafe {
            match sqlite3_step(statement) {
                SQLITE_ROW => {
                    let values = extract_row(statement, self.columns.len())?;
                    Ok(Some(RawRow::new(self.columns.clone(), values)))
                }
                SQLITE_DONE => {
                    self.done = true;
                    Ok(None)
                }
                _ => {
                    self.done = true;
                    let db = sqlite3_db_handle(statement);
                    let query = sqlite3_sql(statement);
                    let query = if query.is_null() {
                        Default::default()
                    } else {
                        CStr::from_ptr(query).to_string_lossy()
                    };
                    Err(logged!(
                        DbError::query(error_message_from_ptr(&sqlite3_errmsg(db))).context(
                            format!("While executing the query:\n{}", truncate_long!(query))
                        )
                    ))
                }
            }
        }
    }

    /// Run the first step, reading the connection counters around it.
    fn first_step(&mut self) -> Result<RowsAffected> {
        let Some(statement) = &self.statement else {
            return Ok(Default::default());
        };
        let db = unsafe { sqlite3_db_handle(**statement) };
        let (changes, rowid) =
            unsafe { (sqlite3_total_changes64(db), sqlite3_last_insert_rowid(db)) };
        self.pending = self.step()?;
        if self.readonly {
            return Ok(Default::default());
        }
        let (changes_after, rowid_after) =
            unsafe { (sqlite3_total_changes64(db), sqlite3_last_insert_rowid(db)) };
        Ok(RowsAffected {
            rows_affected: (changes_after - changes).max(0) as u64,
            last_affected_id: (self.kind == Kind::Insert || rowid_after != rowid)
                .then_some(rowid_after),
        })
    }
}

unsafe fn bind_index(statement: *mut sqlite3_stmt, value: &Value, index: c_int) -> Result<()> {
    unsafe {
        let rc = match value {
            Value::Null => sqlite3_bind_null(statement, index),
            Value::Integer(v) => sqlite3_bind_int64(statement, index, *v),
            Value::Real(v) => sqlite3_bind_double(statement, index, *v),
            Value::Text(v) => sqlite3_bind_text(
                statement,
                index,
                v.as_ptr() as *const c_char,
                v.len() as c_int,
                SQLITE_TRANSIENT(),
            ),
            Value::Blob(v) => sqlite3_bind_blob(
                statement,
                index,
                v.as_ptr() as *const c_void,
                v.len() as c_int,
                SQLITE_TRANSIENT(),
            ),
            Value::Object(..) => {
                return Err(logged!(DbError::query(format!(
                    "Cannot use a {:?} as a query parameter, register an adapter for it",
                    value
                ))));
            }
        };
        if rc != SQLITE_OK {
            let db = sqlite3_db_handle(statement);
            let query = sqlite3_sql(statement);
            let query = if query.is_null() {
                Default::default()
            } else {
                CStr::from_ptr(query).to_string_lossy()
            };
            return Err(logged!(
                DbError::query(error_message_from_ptr(&sqlite3_errmsg(db))).context(format!(
                    "Cannot bind parameter {} to query:\n{}",
                    index,
                    truncate_long!(query)
                ))
            ));
        }
        Ok(())
    }
}

impl NativeStatement for SqlitePrepared {
    async fn run(&mut self) -> Result<RowsAffected> {
        self.first_step()
    }

    async fn reset(&mut self) -> Result<()> {
        if !self.consumed {
            return Ok(());
        }
        if let Some(statement) = &self.statement {
            unsafe {
                sqlite3_reset(**statement);
            }
        }
        self.pending = None;
        self.consumed = false;
        self.done = self.statement.is_none();
        Ok(())
    }

    async fn get(&mut self) -> Result<Option<RawRow>> {
        if let Some(row) = self.pending.take() {
            return Ok(Some(row));
        }
        self.consumed = true;
        self.step()
    }

    async fn finalize(&mut self) -> Result<()> {
        if let Some(mut statement) = self.statement.take() {
            // The return code repeats the last step error, already reported.
            unsafe {
                sqlite3_finalize(statement.take());
            }
        }
        self.pending = None;
        self.done = true;
        Ok(())
    }
}

impl Display for SqlitePrepared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.statement {
            Some(statement) => write!(f, "{:p}", **statement),
            None => write!(f, "{:p}", ptr::null::<sqlite3_stmt>()),
        }
    }
}

pub(crate) fn prepare_error(db: *mut sqlite3, sql: &str) -> Error {
    unsafe {
        DbError::query(error_message_from_ptr(&sqlite3_errmsg(db))).context(format!(
            "While preparing the query:\n{}",
            truncate_long!(sql)
        ))
    }
}
