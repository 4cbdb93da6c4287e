//! Typed runtime values and the type descriptors the coercion engine
//! dispatches on.
//!
//! [`TypeDesc`] is a closed description of every target an item can have.
//! [`Value`] is what coercion produces and what layers store. The
//! [`ConfigValue`] trait links a Rust type to both, so typed item handles
//! can hand back `T` instead of `Value`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};

use crate::duration::format_duration;
use crate::error::StratumError;
use crate::size::SizeInBytes;
use crate::tree::{ContainerNode, Scalar, TreeNode};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S%.f";
pub(crate) const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Target type of an item or record field.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDesc {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Duration,
    Size,
    Date,
    Time,
    DateTime,
    OffsetDateTime,
    Instant,
    /// One of a fixed set of variant names.
    Enum(Vec<String>),
    List(Box<TypeDesc>),
    Set(Box<TypeDesc>),
    Map {
        key: Box<TypeDesc>,
        value: Box<TypeDesc>,
    },
    Record(RecordDesc),
    Optional(Box<TypeDesc>),
    /// A type the engine has no strategy for.
    Opaque(String),
}

impl TypeDesc {
    pub fn list(inner: TypeDesc) -> Self {
        TypeDesc::List(Box::new(inner))
    }

    pub fn set(inner: TypeDesc) -> Self {
        TypeDesc::Set(Box::new(inner))
    }

    pub fn map(value: TypeDesc) -> Self {
        TypeDesc::Map {
            key: Box::new(TypeDesc::String),
            value: Box::new(value),
        }
    }

    pub fn optional(inner: TypeDesc) -> Self {
        TypeDesc::Optional(Box::new(inner))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, TypeDesc::Optional(_))
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Bool => f.write_str("bool"),
            TypeDesc::Char => f.write_str("char"),
            TypeDesc::I8 => f.write_str("i8"),
            TypeDesc::I16 => f.write_str("i16"),
            TypeDesc::I32 => f.write_str("i32"),
            TypeDesc::I64 => f.write_str("i64"),
            TypeDesc::U8 => f.write_str("u8"),
            TypeDesc::U16 => f.write_str("u16"),
            TypeDesc::U32 => f.write_str("u32"),
            TypeDesc::U64 => f.write_str("u64"),
            TypeDesc::F32 => f.write_str("f32"),
            TypeDesc::F64 => f.write_str("f64"),
            TypeDesc::String => f.write_str("string"),
            TypeDesc::Duration => f.write_str("duration"),
            TypeDesc::Size => f.write_str("size"),
            TypeDesc::Date => f.write_str("date"),
            TypeDesc::Time => f.write_str("time"),
            TypeDesc::DateTime => f.write_str("datetime"),
            TypeDesc::OffsetDateTime => f.write_str("offset datetime"),
            TypeDesc::Instant => f.write_str("instant"),
            TypeDesc::Enum(variants) => write!(f, "enum({})", variants.join("|")),
            TypeDesc::List(inner) => write!(f, "list<{inner}>"),
            TypeDesc::Set(inner) => write!(f, "set<{inner}>"),
            TypeDesc::Map { key, value } => write!(f, "map<{key}, {value}>"),
            TypeDesc::Record(record) => f.write_str(&record.name),
            TypeDesc::Optional(inner) => write!(f, "{inner}?"),
            TypeDesc::Opaque(name) => f.write_str(name),
        }
    }
}

/// Field-by-field description of a user record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDesc {
    pub name: String,
    pub fields: Vec<FieldDesc>,
    /// Reject keys that match no field.
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesc {
    pub name: String,
    pub desc: TypeDesc,
    pub default: Option<Value>,
}

impl RecordDesc {
    pub fn new(name: impl Into<String>) -> Self {
        RecordDesc {
            name: name.into(),
            fields: Vec::new(),
            strict: false,
        }
    }

    pub fn field<T: ConfigValue>(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDesc {
            name: name.into(),
            desc: T::type_desc(),
            default: None,
        });
        self
    }

    pub fn field_with_default<T: ConfigValue>(mut self, name: impl Into<String>, default: T) -> Self {
        self.fields.push(FieldDesc {
            name: name.into(),
            desc: T::type_desc(),
            default: Some(default.into_value()),
        });
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// A coerced configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Duration(Duration),
    Size(SizeInBytes),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    OffsetDateTime(DateTime<FixedOffset>),
    Instant(DateTime<Utc>),
    Enum(String),
    List(Vec<Value>),
    /// Distinct elements in insertion order.
    Set(Vec<Value>),
    /// String-keyed map; also the shape of records.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Build a record value from field name/value pairs.
    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
        Value::Map(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Duration(_) => "duration",
            Value::Size(_) => "size",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::OffsetDateTime(_) => "offset datetime",
            Value::Instant(_) => "instant",
            Value::Enum(_) => "enum",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub(crate) fn mismatch(&self, expected: &TypeDesc) -> StratumError {
        StratumError::WrongType {
            value: self.to_string(),
            actual: self.type_name().to_string(),
            expected: expected.to_string(),
        }
    }

    /// Whether this value is a valid instance of `desc`.
    pub fn conforms(&self, desc: &TypeDesc) -> bool {
        match (desc, self) {
            (TypeDesc::Optional(_), Value::Null) => true,
            (TypeDesc::Optional(inner), value) => value.conforms(inner),
            (_, Value::Null) => false,
            (TypeDesc::Bool, Value::Bool(_))
            | (TypeDesc::Char, Value::Char(_))
            | (TypeDesc::I8, Value::I8(_))
            | (TypeDesc::I16, Value::I16(_))
            | (TypeDesc::I32, Value::I32(_))
            | (TypeDesc::I64, Value::I64(_))
            | (TypeDesc::U8, Value::U8(_))
            | (TypeDesc::U16, Value::U16(_))
            | (TypeDesc::U32, Value::U32(_))
            | (TypeDesc::U64, Value::U64(_))
            | (TypeDesc::F32, Value::F32(_))
            | (TypeDesc::F64, Value::F64(_))
            | (TypeDesc::String, Value::String(_))
            | (TypeDesc::Duration, Value::Duration(_))
            | (TypeDesc::Size, Value::Size(_))
            | (TypeDesc::Date, Value::Date(_))
            | (TypeDesc::Time, Value::Time(_))
            | (TypeDesc::DateTime, Value::DateTime(_))
            | (TypeDesc::OffsetDateTime, Value::OffsetDateTime(_))
            | (TypeDesc::Instant, Value::Instant(_)) => true,
            (TypeDesc::Enum(variants), Value::Enum(name)) => variants.contains(name),
            (TypeDesc::List(inner), Value::List(items)) => items.iter().all(|v| v.conforms(inner)),
            (TypeDesc::Set(inner), Value::Set(items)) => items.iter().all(|v| v.conforms(inner)),
            (TypeDesc::Map { key, value }, Value::Map(entries)) => {
                **key == TypeDesc::String && entries.values().all(|v| v.conforms(value))
            }
            (TypeDesc::Record(record), Value::Map(entries)) => {
                let fields_ok = record.fields.iter().all(|field| match entries.get(&field.name) {
                    Some(v) => v.conforms(&field.desc),
                    None => field.default.is_some() || field.desc.is_optional(),
                });
                let keys_ok = !record.strict
                    || entries
                        .keys()
                        .all(|k| record.fields.iter().any(|f| &f.name == k));
                fields_ok && keys_ok
            }
            _ => false,
        }
    }

    /// Render into a tree node, the inverse of coercion.
    pub fn to_tree(&self) -> TreeNode {
        let text = |s: String| TreeNode::scalar(Scalar::Str(s));
        match self {
            Value::Null => TreeNode::Null,
            Value::Bool(b) => TreeNode::scalar(Scalar::Bool(*b)),
            Value::Char(c) => text(c.to_string()),
            Value::I8(i) => TreeNode::scalar(Scalar::Int((*i).into())),
            Value::I16(i) => TreeNode::scalar(Scalar::Int((*i).into())),
            Value::I32(i) => TreeNode::scalar(Scalar::Int((*i).into())),
            Value::I64(i) => TreeNode::scalar(Scalar::Int((*i).into())),
            Value::U8(i) => TreeNode::scalar(Scalar::Int((*i).into())),
            Value::U16(i) => TreeNode::scalar(Scalar::Int((*i).into())),
            Value::U32(i) => TreeNode::scalar(Scalar::Int((*i).into())),
            Value::U64(i) => TreeNode::scalar(Scalar::Int((*i).into())),
            Value::F32(x) => TreeNode::scalar(Scalar::Float((*x).into())),
            Value::F64(x) => TreeNode::scalar(Scalar::Float(*x)),
            Value::String(s) | Value::Enum(s) => text(s.clone()),
            Value::Duration(d) => text(format_duration(*d)),
            Value::Size(s) => TreeNode::scalar(Scalar::Int(s.bytes().into())),
            Value::Date(d) => text(d.format(DATE_FORMAT).to_string()),
            Value::Time(t) => text(t.format(TIME_FORMAT).to_string()),
            Value::DateTime(dt) => text(dt.format(DATE_TIME_FORMAT).to_string()),
            Value::OffsetDateTime(dt) => text(dt.to_rfc3339()),
            Value::Instant(dt) => text(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::List(items) | Value::Set(items) => {
                TreeNode::list(items.iter().map(Value::to_tree).collect())
            }
            Value::Map(entries) => TreeNode::Container(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_tree()))
                    .collect::<ContainerNode>(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tree())
    }
}

/// A Rust type that can be stored in and read back from a layer.
pub trait ConfigValue: Sized + Clone + Send + Sync + 'static {
    fn type_desc() -> TypeDesc;
    fn from_value(value: Value) -> Result<Self, StratumError>;
    fn into_value(self) -> Value;
}

macro_rules! config_value {
    ($ty:ty, $variant:ident) => {
        impl ConfigValue for $ty {
            fn type_desc() -> TypeDesc {
                TypeDesc::$variant
            }

            fn from_value(value: Value) -> Result<Self, StratumError> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(other.mismatch(&TypeDesc::$variant)),
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

config_value!(bool, Bool);
config_value!(char, Char);
config_value!(i8, I8);
config_value!(i16, I16);
config_value!(i32, I32);
config_value!(i64, I64);
config_value!(u8, U8);
config_value!(u16, U16);
config_value!(u32, U32);
config_value!(u64, U64);
config_value!(f32, F32);
config_value!(f64, F64);
config_value!(String, String);
config_value!(Duration, Duration);
config_value!(SizeInBytes, Size);
config_value!(NaiveDate, Date);
config_value!(NaiveTime, Time);
config_value!(NaiveDateTime, DateTime);
config_value!(DateTime<FixedOffset>, OffsetDateTime);
config_value!(DateTime<Utc>, Instant);

impl ConfigValue for usize {
    fn type_desc() -> TypeDesc {
        TypeDesc::U64
    }

    fn from_value(value: Value) -> Result<Self, StratumError> {
        let n = u64::from_value(value)?;
        usize::try_from(n).map_err(|_| StratumError::Parse(format!("{n} cannot be parsed to a usize")))
    }

    fn into_value(self) -> Value {
        Value::U64(self as u64)
    }
}

impl<T: ConfigValue> ConfigValue for Option<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::optional(T::type_desc())
    }

    fn from_value(value: Value) -> Result<Self, StratumError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, ConfigValue::into_value)
    }
}

fn elements(value: Value, expected: TypeDesc) -> Result<Vec<Value>, StratumError> {
    match value {
        Value::List(items) | Value::Set(items) => Ok(items),
        other => Err(other.mismatch(&expected)),
    }
}

fn entries(value: Value, expected: TypeDesc) -> Result<BTreeMap<String, Value>, StratumError> {
    match value {
        Value::Map(entries) => Ok(entries),
        other => Err(other.mismatch(&expected)),
    }
}

impl<T: ConfigValue> ConfigValue for Vec<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::list(T::type_desc())
    }

    fn from_value(value: Value) -> Result<Self, StratumError> {
        elements(value, Self::type_desc())?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(ConfigValue::into_value).collect())
    }
}

impl<T: ConfigValue + Ord> ConfigValue for BTreeSet<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::set(T::type_desc())
    }

    fn from_value(value: Value) -> Result<Self, StratumError> {
        elements(value, Self::type_desc())?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    fn into_value(self) -> Value {
        Value::Set(self.into_iter().map(ConfigValue::into_value).collect())
    }
}

impl<T: ConfigValue + Eq + Hash> ConfigValue for HashSet<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::set(T::type_desc())
    }

    fn from_value(value: Value) -> Result<Self, StratumError> {
        elements(value, Self::type_desc())?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    fn into_value(self) -> Value {
        Value::Set(self.into_iter().map(ConfigValue::into_value).collect())
    }
}

impl<T: ConfigValue> ConfigValue for BTreeMap<String, T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::map(T::type_desc())
    }

    fn from_value(value: Value) -> Result<Self, StratumError> {
        entries(value, Self::type_desc())?
            .into_iter()
            .map(|(k, v)| Ok((k, T::from_value(v)?)))
            .collect()
    }

    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}

impl<T: ConfigValue> ConfigValue for HashMap<String, T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::map(T::type_desc())
    }

    fn from_value(value: Value) -> Result<Self, StratumError> {
        entries(value, Self::type_desc())?
            .into_iter()
            .map(|(k, v)| Ok((k, T::from_value(v)?)))
            .collect()
    }

    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}

/// Field extraction for hand-written [`ConfigValue`] impls on records.
///
/// ```
/// use stratum::{ConfigValue, Fields, RecordDesc, StratumError, TypeDesc, Value};
///
/// #[derive(Clone)]
/// struct Server {
///     host: String,
///     port: u16,
/// }
///
/// impl ConfigValue for Server {
///     fn type_desc() -> TypeDesc {
///         TypeDesc::Record(
///             RecordDesc::new("Server")
///                 .field::<String>("host")
///                 .field_with_default("port", 8080u16),
///         )
///     }
///
///     fn from_value(value: Value) -> Result<Self, StratumError> {
///         let mut fields = Fields::new("Server", value)?;
///         Ok(Server {
///             host: fields.take("host")?,
///             port: fields.take("port")?,
///         })
///     }
///
///     fn into_value(self) -> Value {
///         Value::record([("host", self.host.into_value()), ("port", self.port.into_value())])
///     }
/// }
/// ```
pub struct Fields {
    ty: String,
    values: BTreeMap<String, Value>,
}

impl Fields {
    pub fn new(ty: &str, value: Value) -> Result<Self, StratumError> {
        match value {
            Value::Map(values) => Ok(Fields {
                ty: ty.to_string(),
                values,
            }),
            other => Err(StratumError::ObjectMapping {
                ty: ty.to_string(),
                reason: format!("expected a map, got {}", other.type_name()),
            }),
        }
    }

    /// Take field `name`; an absent field reads as null, which only
    /// optional fields accept.
    pub fn take<T: ConfigValue>(&mut self, name: &str) -> Result<T, StratumError> {
        match self.values.remove(name) {
            Some(value) => T::from_value(value).map_err(|e| StratumError::ObjectMapping {
                ty: self.ty.clone(),
                reason: format!("field '{name}': {e}"),
            }),
            None => T::from_value(Value::Null).map_err(|_| StratumError::ObjectMapping {
                ty: self.ty.clone(),
                reason: format!("missing field '{name}'"),
            }),
        }
    }
}

/// Convert into JSON for serde binding.
pub(crate) fn to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::I8(i) => Json::from(*i),
        Value::I16(i) => Json::from(*i),
        Value::I32(i) => Json::from(*i),
        Value::I64(i) => Json::from(*i),
        Value::U8(i) => Json::from(*i),
        Value::U16(i) => Json::from(*i),
        Value::U32(i) => Json::from(*i),
        Value::U64(i) => Json::from(*i),
        Value::F32(x) => Json::from(f64::from(*x)),
        Value::F64(x) => Json::from(*x),
        Value::Size(s) => Json::from(s.bytes()),
        Value::List(items) | Value::Set(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
        other => Json::String(other.to_string()),
    }
}
