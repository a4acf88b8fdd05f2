use crate::{DbError, Error, Object, Result, Value};
use rust_decimal::Decimal;
use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    str::FromStr,
    sync::{Arc, LazyLock, PoisonError, RwLock},
};
use time::{Date, PrimitiveDateTime, format_description::BorrowedFormatItem, macros::format_description};
use uuid::Uuid;

/// Turns an application value into something the engine can bind.
pub type Adapter = Arc<dyn Fn(&Object) -> Result<Value> + Send + Sync>;
/// Turns the textual form of a fetched value into an application value.
pub type Converter = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const TIMESTAMP_FRACTION_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");

static GLOBAL: LazyLock<Arc<ConversionRegistry>> =
    LazyLock::new(|| Arc::new(ConversionRegistry::with_defaults()));

/// Adapters keyed by the concrete type of the application value and
/// converters keyed by type name.
///
/// Registration is last-write-wins per key. Lookups and registrations are
/// guarded by `RwLock`s so the registry can be shared freely, although
/// registering while a query converts rows only guarantees that each row sees
/// either the old or the new function.
///
/// A connection uses [`ConversionRegistry::global`] unless one is supplied
/// through [`crate::ConnectOptions::registry`]. The global registry is
/// created on first use with the defaults of [`ConversionRegistry::register_defaults`].
#[derive(Default)]
pub struct ConversionRegistry {
    adapters: RwLock<HashMap<TypeId, Adapter>>,
    converters: RwLock<HashMap<String, Converter>>,
}

impl ConversionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Default::default()
    }

    /// Registry with the date, timestamp, uuid and decimal conversions installed.
    pub fn with_defaults() -> Self {
        let result = Self::new();
        result.register_defaults();
        result
    }

    /// The process wide registry.
    pub fn global() -> &'static Arc<ConversionRegistry> {
        &GLOBAL
    }

    /// Register the adapter for values of type `T`, replacing the previous one.
    ///
    /// Lookup is exact: an adapter registered for `T` is never used for a
    /// wrapper of `T` or for any other type.
    pub fn register_adapter<T, F>(&self, adapter: F)
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<Value> + Send + Sync + 'static,
    {
        let adapter: Adapter = Arc::new(move |object: &Object| match object.downcast_ref::<T>() {
            Some(value) => adapter(value),
            None => Err(Error::msg(format!(
                "Adapter for {} received a {}",
                type_name::<T>(),
                object.type_name()
            ))),
        });
        log::debug!("Registering the adapter for {}", type_name::<T>());
        self.adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), adapter);
    }

    /// Register the converter for `type_name`, replacing the previous one.
    pub fn register_converter<F>(&self, type_name: impl Into<String>, converter: F)
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        log::debug!("Registering the converter for `{}`", type_name);
        self.converters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(type_name, Arc::new(converter));
    }

    pub fn adapter(&self, type_id: TypeId) -> Option<Adapter> {
        self.adapters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned()
    }

    pub fn converter(&self, type_name: &str) -> Option<Converter> {
        self.converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_name)
            .cloned()
    }

    /// Map a parameter through its adapter.
    ///
    /// Only `Value::Object` is looked up, every other value and objects
    /// without an adapter are returned unchanged. Errors of the adapter are
    /// returned as they are.
    pub fn adapt(&self, value: Value) -> Result<Value> {
        let Value::Object(object) = &value else {
            return Ok(value);
        };
        match self.adapter(object.type_id()) {
            Some(adapter) => adapter(object),
            None => Ok(value),
        }
    }

    /// Install the conversions for `time::Date` (`date`),
    /// `time::PrimitiveDateTime` (`timestamp`), `uuid::Uuid` (`uuid`) and
    /// `rust_decimal::Decimal` (`decimal`).
    pub fn register_defaults(&self) {
        self.register_adapter(|v: &Date| Ok(Value::Text(v.format(DATE_FORMAT)?)));
        self.register_converter("date", |s| {
            Date::parse(s, DATE_FORMAT)
                .map(Value::object)
                .map_err(|e| conversion_failure(e, s, "date"))
        });
        self.register_adapter(|v: &PrimitiveDateTime| {
            let format = if v.nanosecond() == 0 {
                TIMESTAMP_FORMAT
            } else {
                TIMESTAMP_FRACTION_FORMAT
            };
            Ok(Value::Text(v.format(format)?))
        });
        self.register_converter("timestamp", |s| {
            PrimitiveDateTime::parse(s, TIMESTAMP_FRACTION_FORMAT)
                .or_else(|_| PrimitiveDateTime::parse(s, TIMESTAMP_FORMAT))
                .map(Value::object)
                .map_err(|e| conversion_failure(e, s, "timestamp"))
        });
        self.register_adapter(|v: &Uuid| Ok(Value::Text(v.hyphenated().to_string())));
        self.register_converter("uuid", |s| {
            Uuid::parse_str(s)
                .map(Value::object)
                .map_err(|e| conversion_failure(e, s, "uuid"))
        });
        self.register_adapter(|v: &Decimal| Ok(Value::Text(v.to_string())));
        self.register_converter("decimal", |s| {
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .map(Value::object)
                .map_err(|e| conversion_failure(e, s, "decimal"))
        });
    }
}

fn conversion_failure<E>(error: E, input: &str, type_name: &str) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::new(error).context(DbError::Conversion(format!(
        "Cannot convert `{}` to {}",
        crate::truncate_long!(input),
        type_name
    )))
}

/// Register an adapter in the process wide registry.
pub fn register_adapter<T, F>(adapter: F)
where
    T: Any + Send + Sync,
    F: Fn(&T) -> Result<Value> + Send + Sync + 'static,
{
    ConversionRegistry::global().register_adapter(adapter);
}

/// Register a converter in the process wide registry.
pub fn register_converter<F>(type_name: impl Into<String>, converter: F)
where
    F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
{
    ConversionRegistry::global().register_converter(type_name, converter);
}

/// Extract `type` from a column named `ident [type]`.
///
/// Names without the suffix, with an unterminated or empty bracket, or
/// with anything else around it yield `None`.
pub fn parse_colname_type(name: &str) -> Option<&str> {
    let (ident, rest) = name.split_once(' ')?;
    if ident.is_empty() {
        return None;
    }
    let annotation = rest.strip_prefix('[')?.strip_suffix(']')?;
    if annotation.is_empty() || annotation.contains(']') {
        return None;
    }
    Some(annotation)
}
