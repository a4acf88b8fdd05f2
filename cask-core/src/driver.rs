use crate::{ConnectOptions, Result, Value};
use std::{future::Future, sync::Arc};

/// Entry point of a native engine binding.
///
/// The driver is the narrow collaborator the core talks to: it opens handles,
/// handles prepare statements and run control statements, statements step
/// through rows. Everything above it (cursors, conversion, transactions) is
/// engine independent.
pub trait Driver: Send + Sync + 'static {
    type Handle: NativeHandle<Statement = Self::Statement>;
    type Statement: NativeStatement;

    const NAME: &'static str;

    /// Open the native handle on `options.database`, honoring the open mode
    /// (driver default when `None`) and the lock timeout.
    fn open(
        &self,
        options: &ConnectOptions,
    ) -> impl Future<Output = Result<Self::Handle>> + Send;
}

/// An open database handle.
pub trait NativeHandle: Send + Sync + 'static {
    type Statement: NativeStatement;

    /// Compile `sql` and bind `params` positionally. Binding is part of the
    /// preparation, a statement that fails to bind is never returned.
    fn prepare(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<Self::Statement>> + Send;

    /// Run a control statement (`BEGIN`, `COMMIT`, `ROLLBACK`) discarding any output.
    fn exec(&self, sql: &str) -> impl Future<Output = Result<()>> + Send;

    /// Release the handle. Every statement must be finalized first.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;

    /// Whether the engine currently has an open transaction.
    fn in_transaction(&self) -> bool;
}

/// A prepared, bound, steppable statement.
pub trait NativeStatement: Send + 'static {
    /// Execute the statement up to its first row (or to completion when it
    /// produces none) and report the modification summary.
    fn run(&mut self) -> impl Future<Output = Result<RowsAffected>> + Send;

    /// Reposition on the first row after [`NativeStatement::run`].
    fn reset(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Next row, `None` once exhausted.
    fn get(&mut self) -> impl Future<Output = Result<Option<RawRow>>> + Send;

    /// All the remaining rows.
    fn all(&mut self) -> impl Future<Output = Result<Vec<RawRow>>> + Send {
        async move {
            let mut rows = Vec::new();
            while let Some(row) = self.get().await? {
                rows.push(row);
            }
            Ok(rows)
        }
    }

    /// Release the statement. Calling it again is a no-op.
    fn finalize(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Name and declared type of a result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub decltype: Option<String>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, decltype: Option<String>) -> Self {
        Self {
            name: name.into(),
            decltype,
        }
    }
}

/// Shared column list, one allocation per statement.
pub type Columns = Arc<[ColumnInfo]>;

/// A row as produced by the engine, before any conversion.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub columns: Columns,
    /// Aligned by index with `columns`.
    pub values: Box<[Value]>,
}

impl RawRow {
    pub fn new(columns: Columns, values: Box<[Value]>) -> Self {
        Self { columns, values }
    }
}

/// Metadata about modify operations (INSERT/UPDATE/DELETE).
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowsAffected {
    /// Total number of rows impacted.
    pub rows_affected: u64,
    /// Rowid of the last inserted row, when the statement inserted one.
    pub last_affected_id: Option<i64>,
}

impl Extend<RowsAffected> for RowsAffected {
    fn extend<T: IntoIterator<Item = RowsAffected>>(&mut self, iter: T) {
        for elem in iter {
            self.rows_affected += elem.rows_affected;
            if elem.last_affected_id.is_some() {
                self.last_affected_id = elem.last_affected_id;
            }
        }
    }
}
