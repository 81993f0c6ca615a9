mod common;

use common::{assert_close, mem_frame};
use formula_frame::{Column, ErrorKind, Frame, MemFrame};
use formula_vector::{DataType, Vector};
use pretty_assertions::assert_eq;

fn keyed() -> MemFrame {
    mem_frame(vec![
        ("id", Vector::from(vec![0_i64, 1, 2, 3])),
        ("k1", Vector::from(vec![2_i64, 1, 1, 1])),
        ("k2", Vector::from(vec!["b", "a", "b", "a"])),
    ])
}

fn sales() -> MemFrame {
    mem_frame(vec![
        (
            "region",
            Vector::from(vec!["east", "west", "east", "west", "north"]),
        ),
        ("kind", Vector::from(vec!["a", "a", "b", "a", "a"])),
        ("amount", Vector::from(vec![1.0, 3.0, 3.0, 4.0, 4.0])),
    ])
}

fn frame_result(frame: &MemFrame, formula: &str) -> MemFrame {
    frame
        .evaluate(formula)
        .unwrap_or_else(|err| panic!("{formula}: {err}"))
        .result
        .into_frame()
        .unwrap_or_else(|| panic!("{formula} did not produce a frame"))
}

#[test]
fn sort_is_stable_across_keys() {
    let sorted = frame_result(&keyed(), "sort('asc', k1, k2)");
    assert_eq!(
        sorted.column_values("id").unwrap(),
        &Vector::from(vec![1_i64, 3, 2, 0])
    );
    assert_eq!(
        sorted.column_values("k2").unwrap(),
        &Vector::from(vec!["a", "a", "b", "b"])
    );
}

#[test]
fn descending_sort_keeps_ties_in_input_order() {
    let sorted = frame_result(&keyed(), "sort('desc', k1, k2)");
    assert_eq!(
        sorted.column_values("id").unwrap(),
        &Vector::from(vec![0_i64, 2, 1, 3])
    );
}

#[test]
fn sort_leaves_the_source_untouched() {
    let frame = keyed();
    let _ = frame_result(&frame, "sort(desc, id)");
    assert_eq!(
        frame.column_values("id").unwrap(),
        &Vector::from(vec![0_i64, 1, 2, 3])
    );
}

#[test]
fn sort_errors() {
    let frame = keyed();
    let err = frame.evaluate("sort('sideways', k1)").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);

    let err = frame.evaluate("sort('asc', missing)").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);

    let err = frame.evaluate("sort('asc')").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Dispatch);
}

#[test]
fn by_reduces_each_group_in_first_seen_order() {
    let grouped = frame_result(
        &sales(),
        "by(region, total := sum(amount), n := count(amount))",
    );
    assert_eq!(grouped.column_names(), vec!["region", "total", "n"]);
    assert_eq!(
        grouped.column_values("region").unwrap(),
        &Vector::from(vec!["east", "west", "north"])
    );
    assert_eq!(
        grouped.column_values("total").unwrap(),
        &Vector::from(vec![4.0, 7.0, 4.0])
    );
    assert_eq!(
        grouped.column_values("n").unwrap(),
        &Vector::from(vec![2_i64, 2, 1])
    );
}

#[test]
fn by_with_several_keys() {
    let grouped = frame_result(&sales(), "by(region, kind, top := max(amount))");
    assert_eq!(
        grouped.column_values("region").unwrap(),
        &Vector::from(vec!["east", "west", "east", "north"])
    );
    assert_eq!(
        grouped.column_values("kind").unwrap(),
        &Vector::from(vec!["a", "a", "b", "a"])
    );
    assert_eq!(
        grouped.column_values("top").unwrap(),
        &Vector::from(vec![1.0, 4.0, 3.0, 4.0])
    );

    let distinct = frame_result(&sales(), "by(kind)");
    assert_eq!(distinct.column_names(), vec!["kind"]);
    assert_eq!(
        distinct.column_values("kind").unwrap(),
        &Vector::from(vec!["a", "b"])
    );
}

#[test]
fn global_escapes_the_group() {
    let grouped = frame_result(
        &sales(),
        "by(region, share := sum(amount) / global(sum(amount)))",
    );
    assert_close(
        grouped.column_values("share").unwrap(),
        &Vector::from(vec![4.0 / 15.0, 7.0 / 15.0, 4.0 / 15.0]),
        "share",
    );
}

#[test]
fn global_outside_by_is_the_plain_aggregate() {
    let frame = sales();
    let evaluation = frame.evaluate("amount / global(sum(amount))").unwrap();
    assert!(evaluation.dependencies.contains("amount"));
    let values = common::eval(&frame, "amount / global(sum(amount))");
    assert_close(
        &values,
        &Vector::from(vec![1.0 / 15.0, 3.0 / 15.0, 3.0 / 15.0, 4.0 / 15.0, 4.0 / 15.0]),
        "share of total",
    );
}

#[test]
fn group_formulas_must_reduce() {
    let err = sales()
        .evaluate("by(region, doubled := amount * 2)")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.to_string().contains("doubled"), "{err}");

    let err = sales().evaluate("by(total := sum(amount))").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);

    let err = sales().evaluate("by(region, region := count(amount))").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateName);
}

#[test]
fn grouped_frames_can_be_assigned_to() {
    let mut grouped = frame_result(&sales(), "by(region, total := sum(amount))");
    grouped.parse("half := total / 2").unwrap();
    assert_eq!(
        grouped.column_values("half").unwrap(),
        &Vector::from(vec![2.0, 3.5, 2.0])
    );
}

#[test]
fn grouping_an_empty_frame_keeps_formula_types() {
    let empty = mem_frame(vec![
        ("g", Vector::from(Vec::<String>::new())),
        ("x", Vector::from(Vec::<i64>::new())),
    ]);
    let grouped = frame_result(
        &empty,
        "by(g, m := mean(x), hi := max(x), n := count(x), label := cast(max(x), 'string'), \
         share := sum(x) / global(sum(x)))",
    );
    assert_eq!(grouped.rows(), 0);
    let types: Vec<DataType> = ["g", "m", "hi", "n", "label", "share"]
        .iter()
        .map(|name| grouped.column(name).unwrap().data_type())
        .collect();
    assert_eq!(
        types,
        vec![
            DataType::String,
            DataType::Float,
            DataType::Integer,
            DataType::Integer,
            DataType::String,
            DataType::Float,
        ]
    );
}
