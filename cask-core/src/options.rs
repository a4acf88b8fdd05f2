use crate::{
    ConversionRegistry, DbError, DetectTypes, Error, OpenMode, PARSE_COLNAMES, PARSE_DECLTYPES,
    PARSE_NONE, Result, logged, truncate_long,
};
use std::{
    fmt::{self, Debug},
    sync::Arc,
    time::Duration,
};
use url::form_urlencoded;
use urlencoding::decode;

/// Everything `connect` needs to know.
///
/// ```rust
/// use cask_core::{ConnectOptions, OpenMode, PARSE_COLNAMES, PARSE_DECLTYPES};
/// let options = ConnectOptions::new(":memory:")
///     .mode(OpenMode::Memory)
///     .detect_types(PARSE_DECLTYPES | PARSE_COLNAMES)
///     .isolation_level(Some("IMMEDIATE"));
/// assert_eq!(options.isolation_level.as_deref(), Some("IMMEDIATE"));
/// ```
#[derive(Clone)]
pub struct ConnectOptions {
    /// Target handed to the driver, a file path or `:memory:` for SQLite.
    pub database: String,
    /// Driver default when `None`.
    pub mode: Option<OpenMode>,
    pub detect_types: DetectTypes,
    /// `None` is autocommit, otherwise the mode of `BEGIN <mode>` (may be empty).
    pub isolation_level: Option<String>,
    /// Registry used for conversions, the global one when `None`.
    pub registry: Option<Arc<ConversionRegistry>>,
    /// How long a statement waits for a lock held by another connection
    /// before failing.
    pub timeout: Duration,
}

impl ConnectOptions {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Default::default()
        }
    }

    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn detect_types(mut self, detect_types: DetectTypes) -> Self {
        self.detect_types = detect_types;
        self
    }

    pub fn isolation_level(mut self, isolation_level: Option<&str>) -> Self {
        self.isolation_level = isolation_level.map(Into::into);
        self
    }

    pub fn registry(mut self, registry: Arc<ConversionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parse `<scheme>://<database>?mode=..&detect_types=..&isolation_level=..`.
    ///
    /// - `mode`: `ro`, `rw`, `rwc` or `memory`.
    /// - `detect_types`: a number (`0` to `3`) or names joined by `|`
    ///   (`decltypes|colnames`).
    /// - `isolation_level`: the `BEGIN` mode, `autocommit` for none.
    /// - `timeout`: lock timeout in milliseconds.
    ///
    /// The scheme is not checked here, see `Connection::connect_url`.
    pub fn from_url(url: &str) -> Result<Self> {
        let context = || format!("While decoding the connection URL `{}`", truncate_long!(url));
        let Some((_scheme, rest)) = url.split_once("://") else {
            return Err(logged!(
                DbError::connection("Expected the connection URL to be `<scheme>://<database>`")
                    .context(context())
            ));
        };
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let database = decode(path)
            .map_err(|e| logged!(Error::new(e).context(context())))?
            .into_owned();
        let mut result = ConnectOptions::new(database);
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match &*key {
                "mode" => {
                    result.mode = Some(OpenMode::parse(&value).ok_or_else(|| {
                        logged!(
                            DbError::connection(format!("Unknown open mode `{}`", value))
                                .context(context())
                        )
                    })?);
                }
                "detect_types" => {
                    result.detect_types = parse_detect_types(&value).ok_or_else(|| {
                        logged!(
                            DbError::connection(format!("Invalid detect_types `{}`", value))
                                .context(context())
                        )
                    })?;
                }
                "timeout" => {
                    let millis = value.parse::<u64>().map_err(|e| {
                        logged!(Error::new(e)
                            .context(DbError::Connection(format!("Invalid timeout `{}`", value)))
                            .context(context()))
                    })?;
                    result.timeout = Duration::from_millis(millis);
                }
                "isolation_level" => {
                    result.isolation_level = if value.eq_ignore_ascii_case("autocommit") {
                        None
                    } else {
                        Some(value.into_owned())
                    };
                }
                _ => {
                    return Err(logged!(
                        DbError::connection(format!("Unknown connection parameter `{}`", key))
                            .context(context())
                    ));
                }
            }
        }
        Ok(result)
    }
}

fn parse_detect_types(value: &str) -> Option<DetectTypes> {
    if let Ok(bits) = value.parse::<u8>() {
        return (bits <= 3).then(|| DetectTypes::from_bits(bits));
    }
    let mut result = PARSE_NONE;
    for name in value.split('|') {
        result |= match name.trim() {
            "none" => PARSE_NONE,
            "decltypes" => PARSE_DECLTYPES,
            "colnames" => PARSE_COLNAMES,
            _ => return None,
        };
    }
    Some(result)
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            database: ":memory:".into(),
            mode: None,
            detect_types: PARSE_NONE,
            isolation_level: Some(String::new()),
            registry: None,
            timeout: Duration::from_secs(5),
        }
    }
}

impl From<&str> for ConnectOptions {
    fn from(value: &str) -> Self {
        ConnectOptions::new(value)
    }
}

impl From<String> for ConnectOptions {
    fn from(value: String) -> Self {
        ConnectOptions::new(value)
    }
}

impl Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("database", &self.database)
            .field("mode", &self.mode)
            .field("detect_types", &self.detect_types)
            .field("isolation_level", &self.isolation_level)
            .field("registry", &self.registry.as_ref().map(|_| "custom"))
            .field("timeout", &self.timeout)
            .finish()
    }
}
