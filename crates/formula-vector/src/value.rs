use chrono::{Datelike, NaiveDate};
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{DataType, VectorError, VectorResult};

/// Date formats tried, in order, when no caller-specific list is configured.
pub const DEFAULT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// One cell of a vector.
///
/// Floats compare and hash by their total order (`OrderedFloat`), so `Value` can key category
/// maps and group partitions. `Ord` ranks variants first (`Null < Integer < Float < String <
/// Date`); use [`Value::compare_numeric`] to compare integers against floats.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Nil,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::String(_) => DataType::String,
            Value::Date(_) => DataType::Date,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Compare two values, treating integers and floats as one numeric domain.
    ///
    /// Returns `None` for NaN or for values of unrelated types.
    pub fn compare_numeric(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) => 1,
            Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::Date(_) => 4,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => OrderedFloat(*a) == OrderedFloat(*b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => {}
            Value::Integer(v) => v.hash(state),
            Value::Float(v) => OrderedFloat(*v).hash(state),
            Value::String(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => OrderedFloat(*a).cmp(&OrderedFloat(*b)),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Integer(v) => write!(f, "{v}"),
            // `{:?}` keeps a trailing `.0` on integral floats, which keeps float text
            // distinguishable from integer text.
            Value::Float(v) => write!(f, "{v:?}"),
            Value::String(v) => f.write_str(v),
            Value::Date(v) => f.write_str(&format_date(*v)),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl Value {
    /// Convert the value to `to`.
    ///
    /// Dates convert to and from integers as `YYYYMMDD`. Floats truncate toward zero when cast
    /// to integers. `date_formats` is consulted when parsing strings as dates.
    pub fn cast<S: AsRef<str>>(&self, to: DataType, date_formats: &[S]) -> VectorResult<Value> {
        let from = self.data_type();
        let fail = || VectorError::Cast {
            value: self.to_string(),
            from,
            to,
        };
        let out = match (self, to) {
            (Value::Null, _) => Value::Null,
            (v, to) if v.data_type() == to => v.clone(),
            (Value::Integer(v), DataType::Float) => Value::Float(*v as f64),
            (Value::Float(v), DataType::Integer) => {
                if !v.is_finite() || v.abs() >= i64::MAX as f64 {
                    return Err(fail());
                }
                Value::Integer(v.trunc() as i64)
            }
            (Value::Integer(_) | Value::Float(_), DataType::String) => {
                Value::String(self.to_string())
            }
            (Value::String(s), DataType::Integer) => {
                Value::Integer(s.trim().parse::<i64>().map_err(|_| fail())?)
            }
            (Value::String(s), DataType::Float) => {
                Value::Float(s.trim().parse::<f64>().map_err(|_| fail())?)
            }
            (Value::String(s), DataType::Date) => {
                Value::Date(parse_date(s, date_formats).ok_or_else(fail)?)
            }
            (Value::Date(d), DataType::String) => Value::String(format_date(*d)),
            (Value::Date(d), DataType::Integer) => Value::Integer(date_to_yyyymmdd(*d)),
            (Value::Date(d), DataType::Float) => Value::Float(date_to_yyyymmdd(*d) as f64),
            (Value::Integer(v), DataType::Date) => {
                Value::Date(date_from_yyyymmdd(*v).ok_or_else(fail)?)
            }
            (Value::Float(v), DataType::Date) if v.is_finite() => {
                Value::Date(date_from_yyyymmdd(v.trunc() as i64).ok_or_else(fail)?)
            }
            _ => return Err(fail()),
        };
        Ok(out)
    }
}

fn date_to_yyyymmdd(date: NaiveDate) -> i64 {
    date.year() as i64 * 10_000 + date.month() as i64 * 100 + date.day() as i64
}

fn date_from_yyyymmdd(value: i64) -> Option<NaiveDate> {
    let year = i32::try_from(value / 10_000).ok()?;
    let month = u32::try_from((value / 100) % 100).ok()?;
    let day = u32::try_from(value % 100).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse `text` with the first matching chrono format.
pub fn parse_date<S: AsRef<str>>(text: &str, formats: &[S]) -> Option<NaiveDate> {
    let text = text.trim();
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt.as_ref()).ok())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(CANONICAL_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn floats_hash_by_total_order() {
        let mut set = HashSet::new();
        set.insert(Value::Float(f64::NAN));
        set.insert(Value::Float(f64::NAN));
        set.insert(Value::Float(1.0));
        assert_eq!(set.len(), 2);
        assert_ne!(Value::Integer(1), Value::Float(1.0));
    }

    #[test]
    fn numeric_comparison_mixes_integers_and_floats() {
        assert_eq!(
            Value::Integer(2).compare_numeric(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::String("a".into()).compare_numeric(&Value::Integer(1)),
            None
        );
    }

    #[test]
    fn dates_cast_through_yyyymmdd() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        let int = date.cast(DataType::Integer, DEFAULT_DATE_FORMATS).unwrap();
        assert_eq!(int, Value::Integer(20240315));
        assert_eq!(int.cast(DataType::Date, DEFAULT_DATE_FORMATS).unwrap(), date);
        assert!(Value::Integer(20241345)
            .cast(DataType::Date, DEFAULT_DATE_FORMATS)
            .is_err());
    }

    #[test]
    fn floats_truncate_toward_zero() {
        let v = Value::Float(-2.7).cast(DataType::Integer, DEFAULT_DATE_FORMATS);
        assert_eq!(v.unwrap(), Value::Integer(-2));
        assert!(Value::Float(f64::INFINITY)
            .cast(DataType::Integer, DEFAULT_DATE_FORMATS)
            .is_err());
    }

    #[test]
    fn dates_parse_with_the_first_matching_format() {
        let d = parse_date("03/15/2024", DEFAULT_DATE_FORMATS).unwrap();
        assert_eq!(format_date(d), "2024-03-15");
        assert!(parse_date("15", DEFAULT_DATE_FORMATS).is_none());
    }
}
