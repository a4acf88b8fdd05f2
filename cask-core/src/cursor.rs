use crate::{
    Column, ColumnInfo, Columns, ConversionRegistry, DbError, DetectTypes, Driver,
    NativeHandle, NativeStatement, PARSE_COLNAMES, PARSE_DECLTYPES, RawRow, Result, Row,
    RowsAffected, Value, connection::Shared, logged, parse_colname_type, truncate_long,
};
use async_stream::try_stream;
use futures::{Stream, future::BoxFuture};
use std::{
    fmt::{self, Debug},
    future::IntoFuture,
    mem,
    sync::Arc,
};
use tokio::sync::Mutex;

/// Observable state of a [`Cursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStatus {
    /// No statement.
    Idle,
    /// Holds exactly one prepared statement.
    Active,
    /// Closed, `execute` is rejected.
    Closed,
}

pub(crate) enum Slot<S> {
    Idle,
    Active(S),
    Closed,
}

impl<S> Slot<S> {
    fn status(&self) -> CursorStatus {
        match self {
            Slot::Idle => CursorStatus::Idle,
            Slot::Active(..) => CursorStatus::Active,
            Slot::Closed => CursorStatus::Closed,
        }
    }
}

/// Part of a cursor the connection can reach to close it.
pub(crate) struct CursorState<S> {
    pub(crate) id: u64,
    pub(crate) slot: Mutex<Slot<S>>,
}

impl<S: NativeStatement> CursorState<S> {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            slot: Mutex::new(Slot::Idle),
        }
    }

    /// Move to `Closed`, finalizing the statement if there is one.
    pub(crate) async fn close(&self) -> Result<()> {
        let previous = mem::replace(&mut *self.slot.lock().await, Slot::Closed);
        if let Slot::Active(mut statement) = previous {
            log::trace!("Finalizing the statement of cursor {}", self.id);
            statement.finalize().await?;
        }
        Ok(())
    }
}

/// Executes statements and fetches their rows.
///
/// A cursor owns at most one native statement at any time. Executing again
/// finalizes the previous statement before preparing the next one, closing
/// finalizes it and makes the cursor unusable. Several cursors of the same
/// connection can be active at once and are positioned independently.
///
/// ```rust,ignore
/// let mut cursor = connection.cursor()?;
/// cursor.execute("SELECT num FROM foo", params![]).await?;
/// while let Some(row) = cursor.fetchone().await? {
///     println!("{:?}", row[0]);
/// }
/// cursor.close().await?;
/// ```
pub struct Cursor<D: Driver> {
    connection: Arc<Shared<D>>,
    state: Arc<CursorState<D::Statement>>,
    detect_types: DetectTypes,
    affected: RowsAffected,
    lastrowid: Option<i64>,
    description: Option<Columns>,
}

impl<D: Driver> Cursor<D> {
    pub(crate) fn new(connection: Arc<Shared<D>>, detect_types: DetectTypes) -> Self {
        let state = Arc::new(CursorState::new(connection.next_cursor_id()));
        connection.register_cursor(&state);
        Self {
            connection,
            state,
            detect_types,
            affected: Default::default(),
            lastrowid: None,
            description: None,
        }
    }

    /// Execute `sql` with positional `params`.
    ///
    /// The returned handle can be awaited, yielding the cursor, or turned into
    /// a stream of rows with [`Execute::rows`].
    pub fn execute(&mut self, sql: impl Into<String>, params: Vec<Value>) -> Execute<'_, D> {
        Execute {
            cursor: self,
            sql: sql.into(),
            params,
        }
    }

    async fn run_execute(&mut self, sql: String, params: Vec<Value>) -> Result<()> {
        let registry = self.connection.registry.clone();
        let params = params
            .into_iter()
            .map(|v| registry.adapt(v))
            .collect::<Result<Vec<_>>>()?;
        let state = self.state.clone();
        let mut slot = state.slot.lock().await;
        if matches!(*slot, Slot::Closed) {
            return Err(logged!(DbError::Closed("cursor").into()));
        }
        self.connection.ensure_open()?;
        if let Slot::Active(mut statement) = mem::replace(&mut *slot, Slot::Idle) {
            log::trace!("Finalizing the previous statement of cursor {}", state.id);
            statement.finalize().await?;
        }
        self.affected = Default::default();
        self.description = None;
        log::debug!("Cursor {} executing:\n{}", state.id, truncate_long!(sql));
        let mut statement = self.connection.handle.prepare(&sql, params).await?;
        let affected = match run_and_reset(&mut statement).await {
            Ok(affected) => affected,
            Err(error) => {
                if let Err(e) = statement.finalize().await {
                    log::warn!("Could not finalize a failed statement: {:#}", e);
                }
                return Err(error);
            }
        };
        *slot = Slot::Active(statement);
        self.affected = affected;
        if affected.last_affected_id.is_some() {
            self.lastrowid = affected.last_affected_id;
        }
        Ok(())
    }

    /// Next row of the active statement, `None` when there is no statement
    /// or it is exhausted.
    pub async fn fetchone(&mut self) -> Result<Option<Row>> {
        let state = self.state.clone();
        let raw = {
            let mut slot = state.slot.lock().await;
            let Slot::Active(statement) = &mut *slot else {
                return Ok(None);
            };
            statement.get().await?
        };
        match raw {
            Some(raw) => self.convert_row(raw).map(Some),
            None => Ok(None),
        }
    }

    /// Up to `size` rows, fewer when the statement runs out.
    pub async fn fetchmany(&mut self, size: usize) -> Result<Vec<Row>> {
        let mut result = Vec::with_capacity(size.min(64));
        while result.len() < size {
            match self.fetchone().await? {
                Some(row) => result.push(row),
                None => break,
            }
        }
        Ok(result)
    }

    /// All the remaining rows.
    pub async fn fetchall(&mut self) -> Result<Vec<Row>> {
        let state = self.state.clone();
        let raw = {
            let mut slot = state.slot.lock().await;
            let Slot::Active(statement) = &mut *slot else {
                return Ok(Vec::new());
            };
            statement.all().await?
        };
        raw.into_iter().map(|row| self.convert_row(row)).collect()
    }

    /// Lazy stream over the remaining rows. It cannot be restarted, dropping
    /// it early leaves the statement where it stopped.
    pub fn rows(&mut self) -> impl Stream<Item = Result<Row>> + Send + '_ {
        try_stream! {
            while let Some(row) = self.fetchone().await? {
                yield row;
            }
        }
    }

    /// Finalize the statement and release the cursor. Closing again does nothing.
    pub async fn close(&mut self) -> Result<()> {
        self.connection.deregister_cursor(self.state.id);
        self.state.close().await.map_err(|e| logged!(e))
    }

    pub async fn status(&self) -> CursorStatus {
        self.state.slot.lock().await.status()
    }

    /// Summary of the last executed statement.
    pub fn rows_affected(&self) -> RowsAffected {
        self.affected
    }

    /// Rowid of the last row inserted through this cursor.
    pub fn lastrowid(&self) -> Option<i64> {
        self.lastrowid
    }

    /// Columns of the rows fetched from the current statement, known after the first fetch.
    pub fn description(&self) -> Option<&[ColumnInfo]> {
        self.description.as_deref()
    }

    pub fn detect_types(&self) -> DetectTypes {
        self.detect_types
    }

    fn convert_row(&mut self, raw: RawRow) -> Result<Row> {
        let RawRow { columns, values } = raw;
        let row = columns
            .iter()
            .zip(values.into_vec())
            .map(|(info, value)| {
                convert_column(&self.connection.registry, self.detect_types, info, value)
            })
            .collect::<Result<Vec<_>>>()?;
        self.description = Some(columns);
        Ok(Row::new(row))
    }
}

async fn run_and_reset<S: NativeStatement>(statement: &mut S) -> Result<RowsAffected> {
    let affected = statement.run().await?;
    statement.reset().await?;
    Ok(affected)
}

/// Apply the converter selected for a fetched value.
///
/// The declared type is tried first (with [`PARSE_DECLTYPES`]); the
/// `name [type]` annotation (with [`PARSE_COLNAMES`]) only when that produced
/// nothing, either because no converter matched or because it returned
/// `Null`. Converters receive the textual form of the value and never see
/// `NULL`. Their errors are returned as they are.
pub fn convert_column(
    registry: &ConversionRegistry,
    detect_types: DetectTypes,
    info: &ColumnInfo,
    value: Value,
) -> Result<Column> {
    let annotation = if detect_types.contains(PARSE_COLNAMES) {
        parse_colname_type(&info.name).map(str::to_owned)
    } else {
        None
    };
    let converted = match value.to_text() {
        Some(text) => {
            let mut converted = None;
            if detect_types.contains(PARSE_DECLTYPES)
                && let Some(converter) = info.decltype.as_deref().and_then(|t| registry.converter(t))
            {
                converted = Some(converter(&*text)?);
            }
            if converted.as_ref().is_none_or(Value::is_null)
                && let Some(converter) = annotation.as_deref().and_then(|t| registry.converter(t))
            {
                converted = Some(converter(&*text)?);
            }
            converted
        }
        None => None,
    };
    Ok(Column {
        name: info.name.clone(),
        decltype: info.decltype.clone(),
        annotation,
        value: converted.unwrap_or(value),
    })
}

impl<D: Driver> Drop for Cursor<D> {
    fn drop(&mut self) {
        self.connection.deregister_cursor(self.state.id);
    }
}

impl<D: Driver> Debug for Cursor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.state.id)
            .field("detect_types", &self.detect_types)
            .field("lastrowid", &self.lastrowid)
            .finish()
    }
}

/// Pending execution returned by [`Cursor::execute`].
///
/// Awaiting it runs the statement and yields the cursor. [`Execute::rows`]
/// runs it and streams the rows instead.
#[must_use = "the statement runs only when awaited or streamed"]
pub struct Execute<'c, D: Driver> {
    cursor: &'c mut Cursor<D>,
    sql: String,
    params: Vec<Value>,
}

impl<'c, D: Driver> Execute<'c, D> {
    /// Run the statement and stream its rows, one fetch per item.
    pub fn rows(self) -> impl Stream<Item = Result<Row>> + Send + 'c {
        try_stream! {
            let cursor = self.await?;
            while let Some(row) = cursor.fetchone().await? {
                yield row;
            }
        }
    }
}

impl<'c, D: Driver> IntoFuture for Execute<'c, D> {
    type Output = Result<&'c mut Cursor<D>>;
    type IntoFuture = BoxFuture<'c, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Execute {
            cursor,
            sql,
            params,
        } = self;
        Box::pin(async move {
            cursor.run_execute(sql, params).await?;
            Ok(cursor)
        })
    }
}

/// Build the parameter list of `execute`, converting each item into a [`Value`].
///
/// ```rust
/// use cask_core::{Value, params};
/// let params = params![1, "two", 3.0, Value::Null];
/// assert_eq!(params.len(), 4);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}
