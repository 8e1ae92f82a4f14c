use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// A single field value as read from, or written to, a backend.
///
/// Serializes to plain JSON (no variant tags) so records can be logged and
/// checkpointed in a readable form. The conversion back from JSON is lossy
/// for temporal, decimal and binary values, which come back as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    TimestampNaive(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Uint(v) => i64::try_from(*v).ok(),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Decimal(v) => v.to_i64(),
            Value::Boolean(v) => Some(i64::from(*v)),
            Value::String(v) => v.trim().parse().ok(),
            Value::Json(v) => v.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Uint(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Decimal(v) => v.to_f64(),
            Value::String(v) => v.trim().parse().ok(),
            Value::Json(v) => v.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::Uint(v) => Some(*v != 0),
            Value::String(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" | "y" => Some(true),
                "false" | "f" | "0" | "no" | "n" => Some(false),
                _ => None,
            },
            Value::Json(v) => v.as_bool(),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<BigDecimal> {
        match self {
            Value::Decimal(v) => Some(v.clone()),
            Value::Int(v) => Some(BigDecimal::from(*v)),
            Value::Uint(v) => Some(BigDecimal::from(*v)),
            Value::Float(v) => BigDecimal::from_str(&v.to_string()).ok(),
            Value::String(v) => BigDecimal::from_str(v.trim()).ok(),
            _ => None,
        }
    }

    /// Renders the value as text. `Null` has no textual form.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::String(v) => Some(v.clone()),
            Value::Bytes(v) => Some(String::from_utf8_lossy(v).into_owned()),
            Value::Json(serde_json::Value::String(v)) => Some(v.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(v) => Some(*v),
            Value::String(v) => Uuid::parse_str(v.trim()).ok(),
            Value::Bytes(v) => Uuid::from_slice(v).ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(v) => Some(*v),
            Value::Timestamp(v) => Some(v.date_naive()),
            Value::TimestampNaive(v) => Some(v.date()),
            Value::String(v) => NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(v) => Some(*v),
            Value::TimestampNaive(v) => Some(v.and_utc()),
            Value::Date(v) => v.and_hms_opt(0, 0, 0).map(|ts| ts.and_utc()),
            Value::String(v) => parse_timestamp(v),
            _ => None,
        }
    }

    pub fn as_naive_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::TimestampNaive(v) => Some(*v),
            Value::Timestamp(v) => Some(v.naive_utc()),
            Value::Date(v) => v.and_hms_opt(0, 0, 0),
            Value::String(v) => parse_timestamp(v).map(|ts| ts.naive_utc()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Value::Bytes(v) => Some(v.clone()),
            Value::String(v) => Some(v.clone().into_bytes()),
            Value::Uuid(v) => Some(v.as_bytes().to_vec()),
            _ => None,
        }
    }

    /// Converts the value into plain JSON.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Boolean(v) => Json::Bool(*v),
            Value::Int(v) => Json::from(*v),
            Value::Uint(v) => Json::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Json(v) => v.clone(),
            Value::Bytes(v) => Json::String(hex(v)),
            other => Json::String(other.to_string()),
        }
    }

    /// Builds a value from plain JSON. Arrays and objects stay as `Json`.
    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(v) => Value::Boolean(v),
            Json::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Value::Int(v)
                } else if let Some(v) = n.as_u64() {
                    Value::Uint(v)
                } else {
                    n.as_f64().map(Value::Float).unwrap_or(Value::Null)
                }
            }
            Json::String(v) => Value::String(v),
            other => Value::Json(other),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|ts| ts.and_utc())
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Uint(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "{}", hex(v)),
            Value::Json(v) => write!(f, "{v}"),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Value::TimestampNaive(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        value.to_json()
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from!(
    bool => Boolean,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u32 => Uint,
    u64 => Uint,
    f32 => Float,
    f64 => Float,
    BigDecimal => Decimal,
    String => String,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    NaiveDate => Date,
    DateTime<Utc> => Timestamp,
    NaiveDateTime => TimestampNaive,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
