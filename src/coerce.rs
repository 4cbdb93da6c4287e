//! Tree node → typed [`Value`] coercion, dispatched on [`TypeDesc`].

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::duration::parse_duration;
use crate::error::StratumError;
use crate::size::SizeInBytes;
use crate::tree::{Scalar, TreeNode};
use crate::value::{DATE_FORMAT, DATE_TIME_FORMAT, RecordDesc, TIME_FORMAT, TypeDesc, Value};

/// Coerce `node` into a value of type `desc`.
pub fn coerce(node: &TreeNode, desc: &TypeDesc) -> Result<Value, StratumError> {
    match desc {
        TypeDesc::Optional(inner) => {
            if is_null(node) {
                Ok(Value::Null)
            } else {
                coerce(node, inner)
            }
        }
        _ if matches!(node, TreeNode::Null) => Err(wrong_type(node, desc)),
        TypeDesc::Opaque(name) => Err(StratumError::UnsupportedType { ty: name.clone() }),
        TypeDesc::List(inner) => Ok(Value::List(coerce_items(node, inner, desc)?)),
        TypeDesc::Set(inner) => {
            let mut distinct: Vec<Value> = Vec::new();
            for item in coerce_items(node, inner, desc)? {
                if !distinct.contains(&item) {
                    distinct.push(item);
                }
            }
            Ok(Value::Set(distinct))
        }
        TypeDesc::Map { key, value } => coerce_map(node, key, value, desc),
        TypeDesc::Record(record) => coerce_record(node, record),
        _ => match node {
            TreeNode::Value(v) => coerce_scalar(&v.scalar, desc).map_err(|e| match e {
                StratumError::WrongType { .. } => wrong_type(node, desc),
                other => other,
            }),
            _ => Err(wrong_type(node, desc)),
        },
    }
}

/// Explicit null, or the literal text `null`.
pub(crate) fn is_null(node: &TreeNode) -> bool {
    match node {
        TreeNode::Null => true,
        TreeNode::Value(v) => matches!(&v.scalar, Scalar::Str(s) if s == "null"),
        _ => false,
    }
}

fn wrong_type(node: &TreeNode, desc: &TypeDesc) -> StratumError {
    StratumError::WrongType {
        value: node.to_string(),
        actual: node.type_name().to_string(),
        expected: desc.to_string(),
    }
}

fn scalar_mismatch(scalar: &Scalar, desc: &TypeDesc) -> StratumError {
    StratumError::WrongType {
        value: scalar.to_text(),
        actual: scalar.type_name().to_string(),
        expected: desc.to_string(),
    }
}

fn cannot_parse(text: impl std::fmt::Display, desc: &TypeDesc) -> StratumError {
    StratumError::Parse(format!("{text} cannot be parsed to {}", article(desc)))
}

fn article(desc: &TypeDesc) -> String {
    let name = desc.to_string();
    let vowel = name
        .chars()
        .next()
        .is_some_and(|c| matches!(c, 'a' | 'e' | 'i' | 'o'));
    if vowel { format!("an {name}") } else { format!("a {name}") }
}

fn integer(scalar: &Scalar, desc: &TypeDesc) -> Result<i128, StratumError> {
    match scalar {
        Scalar::Int(i) => Ok(*i),
        Scalar::Str(s) => s.trim().parse::<i128>().map_err(|_| cannot_parse(format!("'{s}'"), desc)),
        other => Err(scalar_mismatch(other, desc)),
    }
}

fn float(scalar: &Scalar, desc: &TypeDesc) -> Result<f64, StratumError> {
    match scalar {
        Scalar::Int(i) => Ok(*i as f64),
        Scalar::Float(f) => Ok(*f),
        Scalar::Str(s) => s.trim().parse::<f64>().map_err(|_| cannot_parse(format!("'{s}'"), desc)),
        other => Err(scalar_mismatch(other, desc)),
    }
}

fn text<'a>(scalar: &'a Scalar, desc: &TypeDesc) -> Result<&'a str, StratumError> {
    match scalar {
        Scalar::Str(s) => Ok(s.trim()),
        other => Err(scalar_mismatch(other, desc)),
    }
}

macro_rules! narrow {
    ($scalar:expr, $desc:expr, $ty:ty, $variant:ident) => {{
        let wide = integer($scalar, $desc)?;
        <$ty>::try_from(wide)
            .map(Value::$variant)
            .map_err(|_| cannot_parse(wide, $desc))
    }};
}

fn coerce_scalar(scalar: &Scalar, desc: &TypeDesc) -> Result<Value, StratumError> {
    match desc {
        TypeDesc::Bool => match scalar {
            Scalar::Bool(b) => Ok(Value::Bool(*b)),
            Scalar::Str(s) if s.trim().eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Scalar::Str(s) if s.trim().eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            Scalar::Str(s) => Err(cannot_parse(format!("'{s}'"), desc)),
            other => Err(scalar_mismatch(other, desc)),
        },
        TypeDesc::Char => {
            let s = match scalar {
                Scalar::Str(s) => s.as_str(),
                other => return Err(scalar_mismatch(other, desc)),
            };
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(cannot_parse(format!("'{s}'"), desc)),
            }
        }
        TypeDesc::I8 => narrow!(scalar, desc, i8, I8),
        TypeDesc::I16 => narrow!(scalar, desc, i16, I16),
        TypeDesc::I32 => narrow!(scalar, desc, i32, I32),
        TypeDesc::I64 => narrow!(scalar, desc, i64, I64),
        TypeDesc::U8 => narrow!(scalar, desc, u8, U8),
        TypeDesc::U16 => narrow!(scalar, desc, u16, U16),
        TypeDesc::U32 => narrow!(scalar, desc, u32, U32),
        TypeDesc::U64 => narrow!(scalar, desc, u64, U64),
        TypeDesc::F32 => {
            let wide = float(scalar, desc)?;
            if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
                return Err(cannot_parse(wide, desc));
            }
            Ok(Value::F32(wide as f32))
        }
        TypeDesc::F64 => float(scalar, desc).map(Value::F64),
        TypeDesc::String => Ok(Value::String(scalar.to_text())),
        TypeDesc::Duration => match scalar {
            Scalar::Int(ms) => u64::try_from(*ms)
                .map(|ms| Value::Duration(std::time::Duration::from_millis(ms)))
                .map_err(|_| cannot_parse(ms, desc)),
            Scalar::Str(s) => parse_duration(s).map(Value::Duration),
            other => Err(scalar_mismatch(other, desc)),
        },
        TypeDesc::Size => match scalar {
            Scalar::Int(b) => u64::try_from(*b)
                .map(|b| Value::Size(SizeInBytes(b)))
                .map_err(|_| cannot_parse(b, desc)),
            Scalar::Str(s) => SizeInBytes::parse(s).map(Value::Size),
            other => Err(scalar_mismatch(other, desc)),
        },
        TypeDesc::Date => {
            let s = text(scalar, desc)?;
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| StratumError::Parse(format!("'{s}' is not a valid date: {e}")))
        }
        TypeDesc::Time => {
            let s = text(scalar, desc)?;
            NaiveTime::parse_from_str(s, TIME_FORMAT)
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map(Value::Time)
                .map_err(|e| StratumError::Parse(format!("'{s}' is not a valid time: {e}")))
        }
        TypeDesc::DateTime => {
            let s = text(scalar, desc)?;
            parse_naive_date_time(s)
                .map(Value::DateTime)
                .map_err(|e| StratumError::Parse(format!("'{s}' is not a valid datetime: {e}")))
        }
        TypeDesc::OffsetDateTime => {
            let s = text(scalar, desc)?;
            DateTime::parse_from_rfc3339(s)
                .map(Value::OffsetDateTime)
                .map_err(|e| StratumError::Parse(format!("'{s}' is not a valid offset datetime: {e}")))
        }
        TypeDesc::Instant => {
            let s = text(scalar, desc)?;
            parse_instant(s)
                .map(Value::Instant)
                .ok_or_else(|| StratumError::Parse(format!("'{s}' is not a valid instant")))
        }
        TypeDesc::Enum(variants) => {
            let s = text(scalar, desc)?;
            variants
                .iter()
                .find(|v| v.as_str() == s)
                .or_else(|| variants.iter().find(|v| v.eq_ignore_ascii_case(s)))
                .map(|v| Value::Enum(v.clone()))
                .ok_or_else(|| {
                    StratumError::Parse(format!(
                        "'{s}' is not one of {}",
                        variants.join(", ")
                    ))
                })
        }
        _ => Err(scalar_mismatch(scalar, desc)),
    }
}

fn parse_naive_date_time(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, DATE_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = parse_naive_date_time(s) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn coerce_items(node: &TreeNode, inner: &TypeDesc, desc: &TypeDesc) -> Result<Vec<Value>, StratumError> {
    let items = node.list_items().ok_or_else(|| wrong_type(node, desc))?;
    items.iter().map(|item| coerce(item, inner)).collect()
}

fn coerce_map(
    node: &TreeNode,
    key: &TypeDesc,
    value: &TypeDesc,
    desc: &TypeDesc,
) -> Result<Value, StratumError> {
    if *key != TypeDesc::String {
        return Err(StratumError::UnsupportedMapKey {
            key: key.to_string(),
        });
    }
    let container = match node {
        TreeNode::Container(container) => container,
        TreeNode::Value(v) if matches!(&v.scalar, Scalar::Str(s) if s.is_empty()) => {
            return Ok(Value::Map(BTreeMap::new()));
        }
        _ => return Err(wrong_type(node, desc)),
    };
    let mut out = BTreeMap::new();
    for (k, child) in container.iter() {
        out.insert(k.to_string(), coerce(child, value)?);
    }
    Ok(Value::Map(out))
}

fn coerce_record(node: &TreeNode, record: &RecordDesc) -> Result<Value, StratumError> {
    let mapping = |reason: String| StratumError::ObjectMapping {
        ty: record.name.clone(),
        reason,
    };
    let TreeNode::Container(container) = node else {
        return Err(mapping(format!("expected a map, got {}", node.type_name())));
    };
    if record.strict {
        let unknown: Vec<&str> = container
            .keys()
            .filter(|k| !record.fields.iter().any(|f| f.name == *k))
            .collect();
        if !unknown.is_empty() {
            return Err(mapping(format!("unknown fields: {}", unknown.join(", "))));
        }
    }
    let mut out = BTreeMap::new();
    for field in &record.fields {
        let value = match container.get(&field.name) {
            Some(child) => coerce(child, &field.desc)
                .map_err(|e| mapping(format!("field '{}': {e}", field.name)))?,
            None => match (&field.default, &field.desc) {
                (Some(default), _) => default.clone(),
                (None, TypeDesc::Optional(_)) => Value::Null,
                (None, _) => return Err(mapping(format!("missing field '{}'", field.name))),
            },
        };
        out.insert(field.name.clone(), value);
    }
    Ok(Value::Map(out))
}
