use crate::error::DbError;
use bigdecimal::BigDecimal;
use bytes::BytesMut;
use model::core::value::Value;
use rust_decimal::Decimal as RustDecimal;
use std::error::Error;
use tokio_postgres::types::{IsNull, Json as PgJson, ToSql, Type, to_sql_checked};

/// `NULL` that binds to a parameter of any type.
#[derive(Debug)]
struct SqlNull;

impl ToSql for SqlNull {
    fn to_sql(&self, _ty: &Type, _out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        Ok(IsNull::Yes)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

pub struct PgParam(Box<dyn ToSql + Sync + Send>);

impl PgParam {
    /// Binds a value using its natural Postgres type.
    pub fn from_value(value: Value) -> Result<Self, DbError> {
        let param: Box<dyn ToSql + Sync + Send> = match value {
            Value::Null => Box::new(SqlNull),
            Value::Boolean(v) => Box::new(v),
            Value::Int(v) => Box::new(v),
            Value::Uint(v) => Box::new(i64::try_from(v).map_err(|_| DbError::Coercion {
                value: v.to_string(),
                sql_type: "int8".into(),
            })?),
            Value::Float(v) => Box::new(v),
            Value::Decimal(v) => Box::new(to_rust_decimal(&v)?),
            Value::String(v) => Box::new(v),
            Value::Bytes(v) => Box::new(v),
            Value::Json(v) => Box::new(PgJson(v)),
            Value::Uuid(v) => Box::new(v),
            Value::Date(v) => Box::new(v),
            Value::Timestamp(v) => Box::new(v),
            Value::TimestampNaive(v) => Box::new(v),
        };
        Ok(PgParam(param))
    }

    /// Binds a value as the parameter type the server inferred for it.
    ///
    /// Source values rarely carry the exact width the statement expects
    /// (an `INT4` column, a cursor restored from JSON as text), so the value
    /// is converted rather than bound as-is.
    pub fn coerce(value: &Value, ty: &Type) -> Result<Self, DbError> {
        if value.is_null() {
            return Ok(PgParam(Box::new(SqlNull)));
        }

        let mismatch = || DbError::Coercion {
            value: value.to_string(),
            sql_type: ty.name().to_string(),
        };
        let int = || value.as_i64().ok_or_else(mismatch);

        let param: Box<dyn ToSql + Sync + Send> = match ty.name() {
            "bool" => Box::new(value.as_bool().ok_or_else(mismatch)?),
            "int2" => Box::new(i16::try_from(int()?).map_err(|_| mismatch())?),
            "int4" => Box::new(i32::try_from(int()?).map_err(|_| mismatch())?),
            "int8" => Box::new(int()?),
            "oid" => Box::new(u32::try_from(int()?).map_err(|_| mismatch())?),
            "float4" => Box::new(value.as_f64().ok_or_else(mismatch)? as f32),
            "float8" => Box::new(value.as_f64().ok_or_else(mismatch)?),
            "numeric" => {
                let decimal = value.as_decimal().ok_or_else(mismatch)?;
                Box::new(to_rust_decimal(&decimal)?)
            }
            "text" | "varchar" | "bpchar" | "name" | "unknown" => {
                Box::new(value.as_string().ok_or_else(mismatch)?)
            }
            "json" | "jsonb" => Box::new(PgJson(to_json_param(value))),
            "uuid" => Box::new(value.as_uuid().ok_or_else(mismatch)?),
            "bytea" => Box::new(value.as_bytes().ok_or_else(mismatch)?),
            "date" => Box::new(value.as_date().ok_or_else(mismatch)?),
            "timestamp" => Box::new(value.as_naive_timestamp().ok_or_else(mismatch)?),
            "timestamptz" => Box::new(value.as_timestamp().ok_or_else(mismatch)?),
            _ => return Self::from_value(value.clone()),
        };
        Ok(PgParam(param))
    }
}

/// `rust_decimal` holds at most 28 significant digits; anything wider or
/// needing rounding is refused.
fn to_rust_decimal(value: &BigDecimal) -> Result<RustDecimal, DbError> {
    RustDecimal::from_str_exact(&value.to_plain_string()).map_err(|_| DbError::Coercion {
        value: value.to_string(),
        sql_type: "numeric".into(),
    })
}

fn to_json_param(value: &Value) -> serde_json::Value {
    match value {
        Value::Json(v) => v.clone(),
        Value::String(s) => {
            serde_json::from_str(s).unwrap_or_else(|_| serde_json::Value::String(s.clone()))
        }
        other => other.to_json(),
    }
}

impl AsRef<dyn ToSql + Sync> for PgParam {
    fn as_ref(&self) -> &(dyn ToSql + Sync + 'static) {
        &*self.0
    }
}

pub struct PgParamStore {
    pub params: Vec<PgParam>,
}

impl PgParamStore {
    /// Coerces `values` to the parameter types of a prepared statement.
    pub fn coerce(values: &[Value], types: &[Type]) -> Result<Self, DbError> {
        if values.len() != types.len() {
            return Err(DbError::Coercion {
                value: format!("{} value(s)", values.len()),
                sql_type: format!("{} parameter(s)", types.len()),
            });
        }
        let params = values
            .iter()
            .zip(types)
            .map(|(value, ty)| PgParam::coerce(value, ty))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { params })
    }

    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|param| param.as_ref())
            .collect::<Vec<_>>()
    }
}
