use formula_vector::{CategoryMap, DataType, Value, Vector, VectorError, OTHER_CODE};
use pretty_assertions::assert_eq;

#[test]
fn codes_follow_encounter_order() {
    let raw = Vector::from(vec!["b", "a", "b", "c"]);
    let (map, coded) = CategoryMap::build(&raw, None).unwrap();

    assert_eq!(coded, Vector::from(vec![0_i64, 1, 0, 2]));
    assert_eq!(map.raw_type(), DataType::String);
    assert_eq!(map.level(1), Some(&Value::from("a")));
    assert!(!map.has_other());
}

#[test]
fn same_raw_value_always_gets_the_same_code() {
    let raw = Vector::from(vec![7_i64, 3, 7]);
    let (map, _) = CategoryMap::build(&raw, None).unwrap();

    let first = map.code(&Value::Integer(7));
    let second = map.code(&Value::Integer(7));
    assert_eq!(first, Some(0));
    assert_eq!(first, second);

    let again = map.encode(&Vector::from(vec![7_i64, 7]), OTHER_CODE).unwrap();
    assert_eq!(again, Vector::from(vec![0_i64, 0]));
}

#[test]
fn fuzz_collapses_rare_levels() {
    let raw = Vector::from(vec!["x", "y", "x", "z", "x", "y"]);
    let (map, coded) = CategoryMap::build(&raw, Some(2)).unwrap();

    assert_eq!(coded, Vector::from(vec![0_i64, 1, 0, OTHER_CODE, 0, 1]));
    assert_eq!(map.levels(), &[Value::from("x"), Value::from("y")]);
    assert!(map.has_other());
    assert_eq!(map.code(&Value::from("z")), Some(OTHER_CODE));
}

#[test]
fn unseen_values_take_the_default_code() {
    let raw = Vector::from(vec!["east", "west"]);
    let (map, _) = CategoryMap::build(&raw, None).unwrap();

    let default = map.default_code(&Value::from("west")).unwrap();
    let coded = map
        .encode(&Vector::from(vec!["north", "east"]), default)
        .unwrap();
    assert_eq!(coded, Vector::from(vec![1_i64, 0]));

    let err = map.default_code(&Value::from("south")).unwrap_err();
    assert_eq!(err, VectorError::UnknownLevel("south".into()));
}

#[test]
fn floats_cannot_be_categorized() {
    let err = CategoryMap::build(&Vector::from(vec![1.5]), None).unwrap_err();
    assert_eq!(err, VectorError::NotCategorical(DataType::Float));
}

#[test]
fn encode_checks_the_raw_type() {
    let (map, _) = CategoryMap::build(&Vector::from(vec![1_i64]), None).unwrap();
    assert!(map.encode(&Vector::from(vec!["1"]), OTHER_CODE).is_err());
}
