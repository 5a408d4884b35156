use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

const DATETIME_DISPLAY: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FALLBACKS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

const DATE_FALLBACKS: &[&str] = &["%Y-%m-%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueType {
    #[default]
    String,
    Integer,
    Float,
    Datetime,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Datetime => "DATETIME",
        }
    }

    /// Converts a raw match, returns `None` when it doesn't fit the type.
    ///
    /// `format` only applies to [`ValueType::Datetime`], it uses chrono's strftime syntax and may
    /// describe a date without time, in which case the value is set at midnight.
    pub fn coerce(self, raw: &str, format: Option<&str>) -> Option<Value> {
        match self {
            Self::String => Some(Value::String(raw.to_string())),
            Self::Integer => raw.trim().parse().ok().map(Value::Integer),
            Self::Float => raw.trim().parse().ok().map(Value::Float),
            Self::Datetime => parse_datetime(raw.trim(), format).map(Value::Datetime),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_datetime(raw: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let with_format = |fmt: &str| {
        NaiveDateTime::parse_from_str(raw, fmt)
            .ok()
            .or_else(|| NaiveDate::parse_from_str(raw, fmt).ok()?.and_hms_opt(0, 0, 0))
    };

    if let Some(fmt) = format {
        return with_format(fmt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    DATETIME_FALLBACKS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FALLBACKS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok()?.and_hms_opt(0, 0, 0))
        })
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Datetime(NaiveDateTime),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Integer(_) => ValueType::Integer,
            Self::Float(_) => ValueType::Float,
            Self::Datetime(_) => ValueType::Datetime,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Datetime(dt) => write!(f, "{}", dt.format(DATETIME_DISPLAY)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Self::Datetime(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_integer() {
        assert_eq!(Some(Value::Integer(42)), ValueType::Integer.coerce(" 42\n", None));
        assert_eq!(Some(Value::Integer(-7)), ValueType::Integer.coerce("-7", None));
        assert_eq!(None, ValueType::Integer.coerce("forty two", None));
        assert_eq!(None, ValueType::Integer.coerce("", None));
    }

    #[test]
    fn coerce_string_keeps_whitespace() {
        assert_eq!(
            Some(Value::String(" a b ".into())),
            ValueType::String.coerce(" a b ", None)
        );
    }

    #[test]
    fn coerce_float() {
        assert_eq!(Some(Value::Float(1.5)), ValueType::Float.coerce("1.5", None));
        assert_eq!(None, ValueType::Float.coerce("1,5", None));
    }

    #[test]
    fn coerce_datetime_with_format() {
        let expected = NaiveDate::from_ymd_opt(2014, 5, 24)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::Datetime);
        assert_eq!(
            expected,
            ValueType::Datetime.coerce("24.05.2014", Some("%d.%m.%Y"))
        );
        assert_eq!(None, ValueType::Datetime.coerce("2014-05-24", Some("%d.%m.%Y")));
    }

    #[test]
    fn coerce_datetime_fallbacks() {
        let expected = NaiveDate::from_ymd_opt(2014, 5, 24).and_then(|d| d.and_hms_opt(13, 5, 0));
        assert_eq!(
            expected.map(Value::Datetime),
            ValueType::Datetime.coerce("2014-05-24 13:05:00", None)
        );
        assert_eq!(
            expected.map(Value::Datetime),
            ValueType::Datetime.coerce("2014-05-24T13:05:00Z", None)
        );
        assert!(ValueType::Datetime.coerce("2014-05-24", None).is_some());
        assert_eq!(None, ValueType::Datetime.coerce("yesterday", None));
    }

    #[test]
    fn display() {
        assert_eq!("12", Value::Integer(12).to_string());
        assert_eq!("x", Value::from("x").to_string());
        let dt = NaiveDate::from_ymd_opt(2020, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .map(Value::Datetime);
        assert_eq!(Some("2020-01-02 03:04:05".to_string()), dt.map(|v| v.to_string()));
    }
}
