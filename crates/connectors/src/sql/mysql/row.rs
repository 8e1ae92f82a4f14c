use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use model::{core::value::Value, records::record::Record};
use mysql_async::{
    Column, Row, Value as MySqlValue,
    consts::{ColumnFlags, ColumnType},
};
use std::str::FromStr;

/// Character set id MySQL reports for binary columns.
const BINARY_CHARSET: u16 = 63;

/// Decodes a MySQL row into a [`Record`], keeping column order.
pub fn decode_row(row: &Row) -> Record {
    let columns = row.columns_ref();
    let mut record = Record::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        let value = row
            .as_ref(idx)
            .map(|raw| decode_value(column, raw))
            .unwrap_or(Value::Null);
        record.set(column.name_str().into_owned(), value);
    }
    record
}

fn decode_value(column: &Column, raw: &MySqlValue) -> Value {
    let col_type = column.column_type();
    let unsigned = column.flags().contains(ColumnFlags::UNSIGNED_FLAG);

    match raw {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Int(i) => Value::Int(*i),
        MySqlValue::UInt(u) => Value::Uint(*u),
        MySqlValue::Float(f) => Value::Float(f64::from(*f)),
        MySqlValue::Double(f) => Value::Float(*f),
        MySqlValue::Date(y, m, d, h, mi, s, us) => {
            let Some(date) = NaiveDate::from_ymd_opt(i32::from(*y), u32::from(*m), u32::from(*d))
            else {
                // Zero dates (`0000-00-00`) have no calendar equivalent.
                return Value::Null;
            };
            if col_type == ColumnType::MYSQL_TYPE_DATE {
                return Value::Date(date);
            }
            let Some(ts) = date.and_hms_micro_opt(u32::from(*h), u32::from(*mi), u32::from(*s), *us)
            else {
                return Value::Null;
            };
            match col_type {
                ColumnType::MYSQL_TYPE_TIMESTAMP | ColumnType::MYSQL_TYPE_TIMESTAMP2 => {
                    Value::Timestamp(ts.and_utc())
                }
                _ => Value::TimestampNaive(ts),
            }
        }
        MySqlValue::Time(neg, days, h, m, s, us) => {
            let hours = u64::from(*days) * 24 + u64::from(*h);
            let sign = if *neg { "-" } else { "" };
            Value::String(format!("{sign}{hours:02}:{m:02}:{s:02}.{us:06}"))
        }
        MySqlValue::Bytes(bytes) => decode_bytes(column, col_type, unsigned, bytes),
    }
}

/// Text-protocol values and string-like columns arrive as raw bytes.
fn decode_bytes(column: &Column, col_type: ColumnType, unsigned: bool, bytes: &[u8]) -> Value {
    let text = || String::from_utf8_lossy(bytes).into_owned();
    match col_type {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_YEAR => {
            let raw = text();
            let parsed = if unsigned {
                raw.parse::<u64>().ok().map(Value::Uint)
            } else {
                raw.parse::<i64>().ok().map(Value::Int)
            };
            parsed.unwrap_or(Value::String(raw))
        }
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => {
            let raw = text();
            raw.parse::<f64>().map(Value::Float).unwrap_or(Value::String(raw))
        }
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
            let raw = text();
            BigDecimal::from_str(&raw)
                .map(Value::Decimal)
                .unwrap_or(Value::String(raw))
        }
        ColumnType::MYSQL_TYPE_JSON => serde_json::from_slice(bytes)
            .map(Value::Json)
            .unwrap_or_else(|_| Value::String(text())),
        ColumnType::MYSQL_TYPE_DATE => {
            let raw = text();
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map(Value::Date)
                .unwrap_or(Value::String(raw))
        }
        ColumnType::MYSQL_TYPE_DATETIME
        | ColumnType::MYSQL_TYPE_DATETIME2
        | ColumnType::MYSQL_TYPE_TIMESTAMP
        | ColumnType::MYSQL_TYPE_TIMESTAMP2 => {
            let raw = text();
            match NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f") {
                Ok(ts) if matches!(
                    col_type,
                    ColumnType::MYSQL_TYPE_TIMESTAMP | ColumnType::MYSQL_TYPE_TIMESTAMP2
                ) =>
                {
                    Value::Timestamp(ts.and_utc())
                }
                Ok(ts) => Value::TimestampNaive(ts),
                Err(_) => Value::String(raw),
            }
        }
        _ if column.character_set() == BINARY_CHARSET => Value::Bytes(bytes.to_vec()),
        _ => Value::String(text()),
    }
}
