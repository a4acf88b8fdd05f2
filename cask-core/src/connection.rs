use crate::{
    ConnectOptions, ConversionRegistry, Cursor, DbError, DetectTypes, Driver, NativeHandle,
    Result, RowsAffected, Value, cursor::CursorState, logged, truncate_long,
};
use std::{
    collections::HashMap,
    fmt::{self, Debug},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

struct TransactionState {
    isolation_level: Option<String>,
    begin_statement: String,
    /// Set when a rollback could not reopen the transaction.
    broken: bool,
}

impl TransactionState {
    fn new() -> Self {
        Self {
            isolation_level: None,
            begin_statement: "BEGIN".into(),
            broken: false,
        }
    }
}

/// State shared by a connection and its cursors.
pub(crate) struct Shared<D: Driver> {
    pub(crate) handle: D::Handle,
    pub(crate) registry: Arc<ConversionRegistry>,
    detect_types: DetectTypes,
    cursors: Mutex<HashMap<u64, Weak<CursorState<D::Statement>>>>,
    next_cursor: AtomicU64,
    closed: AtomicBool,
    /// Set once the native handle closed successfully.
    released: AtomicBool,
    transaction: Mutex<TransactionState>,
}

impl<D: Driver> Shared<D> {
    pub(crate) fn next_cursor_id(&self) -> u64 {
        self.next_cursor.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn register_cursor(&self, cursor: &Arc<CursorState<D::Statement>>) {
        self.cursors()
            .insert(cursor.id, Arc::downgrade(cursor));
    }

    pub(crate) fn deregister_cursor(&self, id: u64) {
        self.cursors().remove(&id);
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(logged!(DbError::Closed("connection").into()));
        }
        Ok(())
    }

    fn cursors(&self) -> MutexGuard<'_, HashMap<u64, Weak<CursorState<D::Statement>>>> {
        self.cursors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transaction(&self) -> MutexGuard<'_, TransactionState> {
        self.transaction
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// An open database connection.
///
/// Owns the native handle and keeps track of the cursors created from it so
/// that [`Connection::close`] can finalize whatever they still hold. The
/// isolation level drives the transaction control statements: `None` means
/// autocommit, any other value is the mode of the `BEGIN` statement issued by
/// [`Connection::begin`] and after every [`Connection::rollback`].
pub struct Connection<D: Driver> {
    shared: Arc<Shared<D>>,
}

impl<D: Driver> Connection<D> {
    /// Open the native handle and apply the isolation level of `options`
    /// (an empty mode unless specified otherwise).
    pub async fn connect(driver: D, options: impl Into<ConnectOptions>) -> Result<Self> {
        let options = options.into();
        let mode = options.mode.unwrap_or_default();
        log::debug!(
            "Opening `{}` with the {} driver (mode: {})",
            options.database,
            D::NAME,
            mode
        );
        let handle = driver.open(&options).await?;
        let result = Self {
            shared: Arc::new(Shared {
                handle,
                registry: options
                    .registry
                    .unwrap_or_else(|| ConversionRegistry::global().clone()),
                detect_types: options.detect_types,
                cursors: Default::default(),
                next_cursor: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                released: AtomicBool::new(false),
                transaction: Mutex::new(TransactionState::new()),
            }),
        };
        result
            .set_isolation_level(options.isolation_level.as_deref())
            .await?;
        Ok(result)
    }

    /// Connect using a `<driver name>://<database>?<parameters>` URL, see
    /// [`ConnectOptions::from_url`].
    pub async fn connect_url(driver: D, url: &str) -> Result<Self> {
        let prefix = format!("{}://", D::NAME);
        if !url.starts_with(&prefix) {
            return Err(logged!(DbError::connection(format!(
                "Expected the connection url to start with `{}`",
                prefix
            ))));
        }
        Self::connect(driver, ConnectOptions::from_url(url)?).await
    }

    /// New cursor registered with this connection.
    pub fn cursor(&self) -> Result<Cursor<D>> {
        self.shared.ensure_open()?;
        Ok(Cursor::new(self.shared.clone(), self.shared.detect_types))
    }

    /// Execute a single statement on a private cursor, closed before returning.
    pub async fn execute(&self, sql: impl Into<String>, params: Vec<Value>) -> Result<RowsAffected> {
        let mut cursor = self.cursor()?;
        let result = cursor
            .execute(sql, params)
            .await
            .map(|cursor| cursor.rows_affected());
        let closed = cursor.close().await;
        let result = result?;
        closed?;
        Ok(result)
    }

    /// Execute `sql` once per parameter row, in order, on one private cursor.
    ///
    /// Stops at the first failure, the rows before it stay applied.
    pub async fn executemany<I>(&self, sql: impl Into<String>, rows: I) -> Result<RowsAffected>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        let sql = sql.into();
        let mut cursor = self.cursor()?;
        let mut total = RowsAffected::default();
        let result = async {
            for params in rows {
                let affected = cursor.execute(sql.as_str(), params).await?.rows_affected();
                total.extend([affected]);
            }
            Ok::<_, crate::Error>(())
        }
        .await;
        let closed = cursor.close().await;
        result?;
        closed?;
        Ok(total)
    }

    pub fn isolation_level(&self) -> Option<String> {
        self.shared.transaction().isolation_level.clone()
    }

    /// Statement issued by [`Connection::begin`], plain `BEGIN` in autocommit.
    pub fn begin_statement(&self) -> String {
        self.shared.transaction().begin_statement.clone()
    }

    /// Change the isolation level.
    ///
    /// `None` switches to autocommit and commits the open transaction, if
    /// any. A mode only updates the begin statement, nothing is issued.
    pub async fn set_isolation_level(&self, isolation_level: Option<&str>) -> Result<()> {
        self.shared.ensure_open()?;
        match isolation_level {
            None => {
                {
                    let mut transaction = self.shared.transaction();
                    transaction.isolation_level = None;
                    transaction.begin_statement = "BEGIN".into();
                }
                self.commit().await
            }
            Some(mode) => {
                let mut transaction = self.shared.transaction();
                transaction.isolation_level = Some(mode.into());
                transaction.begin_statement = format!("BEGIN {}", mode).trim_end().into();
                Ok(())
            }
        }
    }

    /// Whether the engine has an open transaction.
    pub fn in_transaction(&self) -> bool {
        self.shared.handle.in_transaction()
    }

    /// Open a transaction with the begin statement.
    pub async fn begin(&self) -> Result<()> {
        self.ensure_consistent()?;
        let sql = self.begin_statement();
        self.control(&sql).await
    }

    /// Commit the open transaction, does nothing when there is none.
    pub async fn commit(&self) -> Result<()> {
        self.ensure_consistent()?;
        if !self.shared.handle.in_transaction() {
            return Ok(());
        }
        self.control("COMMIT").await
    }

    /// Roll back the open transaction and, unless in autocommit, open a new one.
    ///
    /// The two statements are not atomic. When the rollback succeeds but the
    /// new transaction cannot be opened, the connection is left outside any
    /// transaction while its isolation level claims one: it is marked broken
    /// and every following transaction operation fails until it is reopened.
    pub async fn rollback(&self) -> Result<()> {
        self.ensure_consistent()?;
        let begin = {
            let transaction = self.shared.transaction();
            transaction
                .isolation_level
                .as_ref()
                .map(|_| transaction.begin_statement.clone())
        };
        if self.shared.handle.in_transaction() {
            self.control("ROLLBACK").await?;
        }
        if let Some(begin) = begin
            && let Err(e) = self.control(&begin).await
        {
            self.shared.transaction().broken = true;
            return Err(logged!(e.context(DbError::Transaction(
                "Rolled back but could not open a new transaction, the connection must be reopened"
                    .into()
            ))));
        }
        Ok(())
    }

    async fn control(&self, sql: &str) -> Result<()> {
        self.shared.ensure_open()?;
        log::debug!("{}", sql);
        self.shared.handle.exec(sql).await.map_err(|e| {
            logged!(e.context(DbError::Transaction(format!(
                "`{}` failed",
                truncate_long!(sql)
            ))))
        })
    }

    fn ensure_consistent(&self) -> Result<()> {
        self.shared.ensure_open()?;
        if self.shared.transaction().broken {
            return Err(logged!(DbError::transaction(
                "The transaction state is undefined after a failed rollback, reopen the connection"
            )));
        }
        Ok(())
    }

    /// Close every cursor still open, then the native handle.
    ///
    /// A cursor failing to close is logged and does not stop the others.
    /// When the native handle fails to close the error is returned and
    /// closing again retries it, once closed it does nothing.
    pub async fn close(&self) -> Result<()> {
        self.shared.closed.store(true, Ordering::Release);
        if self.shared.released.load(Ordering::Acquire) {
            return Ok(());
        }
        let cursors = self.shared.cursors().drain().collect::<Vec<_>>();
        for (id, cursor) in cursors {
            let Some(cursor) = cursor.upgrade() else {
                continue;
            };
            if let Err(e) = cursor.close().await {
                log::warn!("Could not close the cursor {}: {:#}", id, e);
            }
        }
        self.shared.handle.close().await.map_err(|e| logged!(e))?;
        self.shared.released.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn detect_types(&self) -> DetectTypes {
        self.shared.detect_types
    }

    pub fn registry(&self) -> &Arc<ConversionRegistry> {
        &self.shared.registry
    }

    /// Number of cursors currently registered.
    pub fn open_cursors(&self) -> usize {
        self.shared
            .cursors()
            .values()
            .filter(|v| v.strong_count() > 0)
            .count()
    }
}

impl<D: Driver> Debug for Connection<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("driver", &D::NAME)
            .field("isolation_level", &self.isolation_level())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Connect `driver` with `options`.
pub async fn connect<D: Driver>(driver: D, options: impl Into<ConnectOptions>) -> Result<Connection<D>> {
    Connection::connect(driver, options).await
}
