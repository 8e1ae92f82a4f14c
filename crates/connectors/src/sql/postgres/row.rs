use crate::error::DbError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use engine_core::error::BoxError;
use model::{core::value::Value, records::record::Record};
use rust_decimal::Decimal as RustDecimal;
use std::{net::IpAddr, str::FromStr};
use tokio_postgres::{
    Row,
    types::{FromSql, Type},
};
use uuid::Uuid;

/// Decodes a Postgres row into a [`Record`], keeping column order.
pub fn decode_row(row: &Row) -> Result<Record, DbError> {
    let mut record = Record::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx, column.type_()).map_err(|e| DbError::Decode {
            column: column.name().to_string(),
            message: e.to_string(),
        })?;
        record.set(column.name(), value);
    }
    Ok(record)
}

const NATIVE_TYPES: &[&str] = &[
    "bool", "int2", "int4", "int8", "oid", "float4", "float8", "numeric", "text", "varchar",
    "bpchar", "name", "citext", "json", "jsonb", "uuid", "bytea", "date", "timestamp",
    "timestamptz", "time", "inet",
];

/// Whether columns of this type can be read into a [`Value`].
pub fn is_supported(ty: &Type) -> bool {
    NATIVE_TYPES.contains(&ty.name()) || <String as FromSql>::accepts(ty)
}

fn decode_column(row: &Row, idx: usize, ty: &Type) -> Result<Value, BoxError> {
    let value: Value = match ty.name() {
        "bool" => row.try_get::<_, Option<bool>>(idx)?.into(),
        "int2" => row.try_get::<_, Option<i16>>(idx)?.into(),
        "int4" => row.try_get::<_, Option<i32>>(idx)?.into(),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.into(),
        "oid" => row.try_get::<_, Option<u32>>(idx)?.into(),
        "float4" => row.try_get::<_, Option<f32>>(idx)?.into(),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.into(),
        "numeric" => match row.try_get::<_, Option<RustDecimal>>(idx)? {
            Some(decimal) => Value::Decimal(BigDecimal::from_str(&decimal.to_string())?),
            None => Value::Null,
        },
        "text" | "varchar" | "bpchar" | "name" | "citext" => {
            row.try_get::<_, Option<String>>(idx)?.into()
        }
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(Value::Json)
            .unwrap_or(Value::Null),
        "uuid" => row.try_get::<_, Option<Uuid>>(idx)?.into(),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.into(),
        "date" => row.try_get::<_, Option<NaiveDate>>(idx)?.into(),
        "timestamp" => row.try_get::<_, Option<NaiveDateTime>>(idx)?.into(),
        "timestamptz" => row.try_get::<_, Option<DateTime<Utc>>>(idx)?.into(),
        "time" => row
            .try_get::<_, Option<NaiveTime>>(idx)?
            .map(|time| time.to_string())
            .into(),
        "inet" => row
            .try_get::<_, Option<IpAddr>>(idx)?
            .map(|addr| addr.to_string())
            .into(),
        _ if <String as FromSql>::accepts(ty) => row.try_get::<_, Option<String>>(idx)?.into(),
        other => return Err(format!("unsupported column type `{other}`").into()),
    };
    Ok(value)
}
