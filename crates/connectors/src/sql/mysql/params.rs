use crate::error::DbError;
use chrono::{Datelike, NaiveDateTime, Timelike};
use model::core::value::Value;
use mysql_async::{Params, Value as MySqlValue};

pub struct MySqlParam(MySqlValue);

impl MySqlParam {
    pub fn from_value(value: &Value) -> Result<Self, DbError> {
        let bound = match value {
            Value::Null => MySqlValue::NULL,
            Value::Boolean(b) => MySqlValue::Int(i64::from(*b)),
            Value::Int(i) => MySqlValue::Int(*i),
            Value::Uint(u) => MySqlValue::UInt(*u),
            Value::Float(f) => MySqlValue::Double(*f),
            Value::Decimal(d) => MySqlValue::Bytes(d.to_string().into_bytes()),
            Value::String(s) => MySqlValue::Bytes(s.clone().into_bytes()),
            Value::Bytes(b) => MySqlValue::Bytes(b.clone()),
            Value::Json(j) => MySqlValue::Bytes(j.to_string().into_bytes()),
            Value::Uuid(u) => MySqlValue::Bytes(u.to_string().into_bytes()),
            Value::Date(d) => {
                let year = mysql_year(d.year(), value)?;
                MySqlValue::Date(year, d.month() as u8, d.day() as u8, 0, 0, 0, 0)
            }
            Value::Timestamp(ts) => datetime(&ts.naive_utc(), value)?,
            Value::TimestampNaive(ts) => datetime(ts, value)?,
        };
        Ok(MySqlParam(bound))
    }
}

/// MySQL temporal types only hold years 0 through 9999.
fn mysql_year(year: i32, value: &Value) -> Result<u16, DbError> {
    u16::try_from(year)
        .ok()
        .filter(|year| *year <= 9999)
        .ok_or_else(|| DbError::Coercion {
            value: value.to_string(),
            sql_type: "DATETIME".into(),
        })
}

fn datetime(ts: &NaiveDateTime, value: &Value) -> Result<MySqlValue, DbError> {
    Ok(MySqlValue::Date(
        mysql_year(ts.year(), value)?,
        ts.month() as u8,
        ts.day() as u8,
        ts.hour() as u8,
        ts.minute() as u8,
        ts.second() as u8,
        ts.and_utc().timestamp_subsec_micros(),
    ))
}

pub struct MySqlParamStore {
    pub params: Vec<MySqlParam>,
}

impl MySqlParamStore {
    pub fn from_values(values: &[Value]) -> Result<Self, DbError> {
        let params = values
            .iter()
            .map(MySqlParam::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MySqlParamStore { params })
    }

    pub fn params(&self) -> Params {
        let mysql_values: Vec<MySqlValue> = self.params.iter().map(|p| p.0.clone()).collect();
        Params::from(mysql_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn temporal_values_keep_microseconds() {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_micro_opt(7, 8, 9, 123_456)
            .unwrap();
        let store = MySqlParamStore::from_values(&[Value::TimestampNaive(ts)]).unwrap();
        assert_eq!(
            store.params(),
            Params::Positional(vec![MySqlValue::Date(2024, 5, 6, 7, 8, 9, 123_456)])
        );
    }

    #[test]
    fn empty_values_bind_no_params() {
        assert_eq!(MySqlParamStore::from_values(&[]).unwrap().params(), Params::Empty);
    }

    #[test]
    fn booleans_bind_as_integers() {
        assert_eq!(
            MySqlParamStore::from_values(&[Value::Boolean(true), Value::Null])
                .unwrap()
                .params(),
            Params::Positional(vec![MySqlValue::Int(1), MySqlValue::NULL])
        );
    }

    #[test]
    fn years_outside_mysql_range_are_rejected() {
        let date = NaiveDate::from_ymd_opt(-44, 3, 15).unwrap();
        let err = MySqlParamStore::from_values(&[Value::Date(date)]).err().unwrap();
        assert!(matches!(err, DbError::Coercion { .. }));

        let far = NaiveDate::from_ymd_opt(12_000, 1, 1).unwrap();
        assert!(MySqlParam::from_value(&Value::Date(far)).is_err());
    }
}
