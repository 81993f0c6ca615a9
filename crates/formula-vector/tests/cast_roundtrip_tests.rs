use chrono::NaiveDate;
use formula_vector::{DataType, Value, Vector, DEFAULT_DATE_FORMATS};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn round_trip(value: &Value, via: DataType) -> Value {
    let back_to = value.data_type();
    value
        .cast(via, DEFAULT_DATE_FORMATS)
        .and_then(|v| v.cast(back_to, DEFAULT_DATE_FORMATS))
        .unwrap()
}

proptest! {
    #[test]
    fn integers_round_trip_exactly(v in -1_000_000_000_i64..1_000_000_000) {
        let value = Value::Integer(v);
        prop_assert_eq!(round_trip(&value, DataType::Float), value.clone());
        prop_assert_eq!(round_trip(&value, DataType::String), value);
    }

    #[test]
    fn floats_round_trip_within_tolerance(v in -1.0e9_f64..1.0e9) {
        let back = round_trip(&Value::Float(v), DataType::String);
        let back = back.as_f64().unwrap();
        prop_assert!((back - v).abs() <= 1e-3 * v.abs().max(1.0));
    }

    #[test]
    fn dates_round_trip_exactly(days in 0_i64..80_000) {
        let base = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
        let date = Value::Date(base + chrono::Duration::days(days));
        prop_assert_eq!(round_trip(&date, DataType::Integer), date.clone());
        prop_assert_eq!(round_trip(&date, DataType::String), date);
    }

    #[test]
    fn strings_round_trip_through_strings(s in "[a-z]{0,12}") {
        let value = Value::String(s);
        prop_assert_eq!(round_trip(&value, DataType::String), value);
    }
}

#[test]
fn vector_cast_reports_the_offending_value() {
    let v = Vector::from(vec!["1", "two"]);
    let err = v.cast(DataType::Integer, DEFAULT_DATE_FORMATS).unwrap_err();
    assert_eq!(err.to_string(), "cannot cast \"two\" from string to integer");
}

#[test]
fn strings_parse_as_dates_with_configured_formats() {
    let v = Vector::from(vec!["2024-01-31"]);
    let out = v.cast(DataType::Date, &["%Y-%m-%d"]).unwrap();
    assert_eq!(
        out,
        Vector::from(vec![NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()])
    );
}
