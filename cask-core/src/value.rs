use std::{
    any::{Any, TypeId, type_name},
    borrow::Cow,
    fmt::{self, Debug, Display},
    sync::Arc,
};

/// A dynamically typed value exchanged with the engine.
///
/// The first five variants are the storage classes every SQL engine driver
/// understands. `Object` carries an arbitrary application value: it is what
/// adapters consume on the way in and what converters usually produce on the
/// way out. A driver never binds an `Object` directly.
#[derive(Default, Clone)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Box<[u8]>),
    Object(Object),
}

impl Value {
    /// Wrap an application value, see [`Object`].
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(Object::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn same_type(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Object(l), Self::Object(r)) => l.type_id() == r.type_id(),
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }

    /// Downcast the payload of an `Object` value.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Object(object) => object.downcast_ref(),
            _ => None,
        }
    }

    /// Textual form handed to converters. `Null` has none.
    pub fn to_text(&self) -> Option<Cow<'_, str>> {
        Some(match self {
            Value::Null => return None,
            Value::Integer(v) => Cow::Owned(itoa::Buffer::new().format(*v).to_owned()),
            Value::Real(v) => Cow::Owned(ryu::Buffer::new().format(*v).to_owned()),
            Value::Text(v) => Cow::Borrowed(v.as_str()),
            Value::Blob(v) => String::from_utf8_lossy(v),
            Value::Object(v) => Cow::Owned(format!("{:?}", v)),
        })
    }

    /// Name of the storage class, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(..) => "INTEGER",
            Value::Real(..) => "REAL",
            Value::Text(..) => "TEXT",
            Value::Blob(..) => "BLOB",
            Value::Object(v) => v.type_name(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(l), Self::Integer(r)) => l == r,
            (Self::Real(l), Self::Real(r)) => l == r,
            (Self::Text(l), Self::Text(r)) => l == r,
            (Self::Blob(l), Self::Blob(r)) => l == r,
            (Self::Object(l), Self::Object(r)) => l == r,
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Integer(v) => f.debug_tuple("Integer").field(v).finish(),
            Value::Real(v) => f.debug_tuple("Real").field(v).finish(),
            Value::Text(v) => f.debug_tuple("Text").field(v).finish(),
            Value::Blob(v) => f.debug_tuple("Blob").field(&v.len()).finish(),
            Value::Object(v) => v.fmt(f),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

/// Type erased application value.
///
/// Equality is identity: two objects are equal only when they share the same
/// allocation. Compare payloads through [`Object::downcast_ref`].
#[derive(Clone)]
pub struct Object {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Object {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// `TypeId` of the wrapped value (not of the `Arc`).
    pub fn type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.type_name)
    }
}
