#![cfg(feature = "sqlite")]

mod common;

use std::sync::Arc;

use common::{assert_close, date, mem_frame, sqlite, to_sql};
use formula_frame::sql::{self, Dialect};
use formula_frame::{
    Column, ErrorKind, Frame, FrameError, FrameOptions, MemFrame, SqlFrame, SqliteDialect,
};
use formula_vector::{DataType, Value, Vector};
use pretty_assertions::assert_eq;

fn sales() -> MemFrame {
    mem_frame(vec![
        ("id", Vector::from(vec![0_i64, 1, 2, 3, 4])),
        (
            "region",
            Vector::from(vec!["east", "west", "east", "west", "north"]),
        ),
        ("units", Vector::from(vec![1_i64, 3, 3, 4, 4])),
        ("amount", Vector::from(vec![1.0, 3.0, 3.0, 4.0, 4.0])),
    ])
}

fn column<'a>(frame: &'a MemFrame, name: &str) -> &'a Vector {
    frame
        .column_values(name)
        .unwrap_or_else(|err| panic!("{name}: {err}"))
}

#[test]
fn operations_compose_fragments() {
    let frame = to_sql(&sales(), "sales");

    let doubled = frame.evaluate("amount * 2").unwrap().result.into_column().unwrap();
    assert_eq!(doubled.fragment(), r#"("amount" * 2)"#);
    assert_eq!(doubled.data_type(), DataType::Float);

    let total = frame.evaluate("sum(units)").unwrap().result.into_column().unwrap();
    assert_eq!(total.fragment(), r#"sum("units") OVER ()"#);

    let label = frame
        .evaluate("region + '!'")
        .unwrap()
        .result
        .into_column()
        .unwrap();
    assert_eq!(label.fragment(), r#"("region" || '!')"#);

    assert!(frame
        .query()
        .starts_with(r#"WITH _src0 AS (SELECT * FROM "sales") SELECT "#));
}

#[test]
fn row_counts_and_values_come_from_the_database() {
    let frame = to_sql(&sales(), "sales");
    assert_eq!(frame.row_count().unwrap(), 5);

    let column = frame
        .evaluate("units * 10")
        .unwrap()
        .result
        .into_column()
        .unwrap();
    assert_eq!(column.len().unwrap(), 5);
    assert_eq!(
        column.values().unwrap(),
        Vector::from(vec![10_i64, 30, 30, 40, 40])
    );
    assert_eq!(column.element(3).unwrap(), Value::Integer(40));
}

#[test]
fn assignments_materialize_as_new_columns() {
    let mut frame = to_sql(&sales(), "sales");
    frame.parse("net := amount - units / 2").unwrap();
    frame.parse("flag := if(units > 3, 1, 0)").unwrap();
    let err = frame.parse("net := 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateName);

    let out = frame.materialize().unwrap();
    assert_eq!(
        out.column_names(),
        vec!["id", "region", "units", "amount", "net", "flag"]
    );
    assert_close(
        column(&out, "net"),
        &Vector::from(vec![0.5, 1.5, 1.5, 2.0, 2.0]),
        "net",
    );
    assert_eq!(column(&out, "flag"), &Vector::from(vec![0_i64, 0, 0, 1, 1]));
}

#[test]
fn database_errors_surface_on_materialization() {
    let mut data = sales();
    data.add_column("zero", vec![1.0, 1.0, 0.0, 1.0, 1.0]).unwrap();
    let mut frame = to_sql(&data, "sales");

    frame.parse("ratio := amount / zero").unwrap();
    let err = frame.materialize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Database);
    assert!(err.to_string().contains("NULL"), "{err}");
}

#[test]
fn unsupported_operations_name_the_dialect() {
    let frame = to_sql(&sales(), "sales");
    let err = frame.evaluate("quantile(amount, 0.5)").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Database);
    assert!(
        matches!(&err, FrameError::Unsupported { dialect, .. } if dialect == "sqlite"),
        "{err}"
    );
}

#[test]
fn sort_wraps_the_query() {
    let frame = to_sql(&sales(), "sales");
    let sorted = frame
        .evaluate("sort('desc', amount, id)")
        .unwrap()
        .result
        .into_frame()
        .unwrap();
    assert!(sorted.query().contains("_src1"), "{}", sorted.query());
    let out = sorted.materialize().unwrap();
    assert_eq!(column(&out, "id"), &Vector::from(vec![4_i64, 3, 2, 1, 0]));

    let numbered = sorted.evaluate("row_number()").unwrap().result.into_column().unwrap();
    assert_eq!(
        numbered.fragment(),
        r#"(ROW_NUMBER() OVER (ORDER BY "amount" DESC, "id" DESC) - 1)"#
    );
}

#[test]
fn by_groups_in_sql() {
    let frame = to_sql(&sales(), "sales");
    let grouped = frame
        .evaluate("by(region, total := sum(amount), n := count(units))")
        .unwrap()
        .result
        .into_frame()
        .unwrap();
    assert!(grouped.query().contains("GROUP BY"), "{}", grouped.query());

    let sorted = grouped
        .evaluate("sort('asc', region)")
        .unwrap()
        .result
        .into_frame()
        .unwrap();
    let out = sorted.materialize().unwrap();
    assert_eq!(
        column(&out, "region"),
        &Vector::from(vec!["east", "north", "west"])
    );
    assert_close(column(&out, "total"), &Vector::from(vec![4.0, 4.0, 7.0]), "total");
    assert_eq!(column(&out, "n"), &Vector::from(vec![2_i64, 1, 2]));
}

#[test]
fn global_uses_a_scalar_subquery() {
    let frame = to_sql(&sales(), "sales");
    let grouped = frame
        .evaluate("by(region, share := sum(amount) / global(sum(amount)))")
        .unwrap()
        .result
        .into_frame()
        .unwrap();
    assert!(grouped.query().contains("(SELECT sum(\"amount\") FROM _src0)"));

    let sorted = grouped
        .evaluate("sort('asc', region)")
        .unwrap()
        .result
        .into_frame()
        .unwrap();
    assert_close(
        column(&sorted.materialize().unwrap(), "share"),
        &Vector::from(vec![4.0 / 15.0, 4.0 / 15.0, 7.0 / 15.0]),
        "share",
    );
}

#[test]
fn group_formulas_must_aggregate() {
    let frame = to_sql(&sales(), "sales");
    let err = frame
        .evaluate("by(region, doubled := amount * 2)")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);

    let err = frame
        .evaluate("by(region, n := row_number())")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
}

#[test]
fn single_values_broadcast_over_an_empty_table() {
    let empty = mem_frame(vec![("x", Vector::from(Vec::<i64>::new()))]);
    let mut frame = to_sql(&empty, "empty");
    let shifted = frame.evaluate("x + 10").unwrap().result.into_column().unwrap();
    assert_eq!(shifted.values().unwrap(), Vector::from(Vec::<i64>::new()));

    frame.parse("y := x * 2").unwrap();
    assert_eq!(frame.row_count().unwrap(), 0);
    assert_eq!(
        column(&frame.materialize().unwrap(), "y"),
        &Vector::from(Vec::<i64>::new())
    );
}

#[test]
fn nested_aggregates_become_subqueries() {
    let frame = to_sql(&sales(), "sales");
    let spread = frame
        .evaluate("mean(abs(units - mean(units)))")
        .unwrap()
        .result
        .into_column()
        .unwrap();
    assert_eq!(
        spread.fragment(),
        r#"avg(abs(("units" - (SELECT avg("units") FROM _src0)))) OVER ()"#
    );
    assert_close(&spread.values().unwrap(), &Vector::from(vec![0.8; 5]), "spread");

    let grouped = frame
        .evaluate("by(region, d := max(units - mean(units)))")
        .unwrap()
        .result
        .into_frame()
        .unwrap();
    assert!(
        grouped
            .query()
            .contains(r#"WHERE (_src0_g."region" IS _src0."region")"#),
        "{}",
        grouped.query()
    );
    let sorted = grouped
        .evaluate("sort('asc', region)")
        .unwrap()
        .result
        .into_frame()
        .unwrap();
    assert_close(
        column(&sorted.materialize().unwrap(), "d"),
        &Vector::from(vec![1.0, 0.0, 0.5]),
        "d",
    );
}

#[test]
fn nested_aggregates_need_stored_group_keys() {
    let mut frame = to_sql(&sales(), "sales");
    frame.parse("bucket := units / 2").unwrap();
    assert!(frame.evaluate("by(bucket, total := sum(units))").is_ok());

    let err = frame
        .evaluate("by(bucket, d := max(units - mean(units)))")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Database);
    assert!(
        matches!(&err, FrameError::Unsupported { what, .. } if what.contains("bucket")),
        "{err}"
    );
}

#[test]
fn categories_are_encoded_with_case() {
    let mut frame = to_sql(&sales(), "sales");
    frame.parse("region_cat := cat(region)").unwrap();
    let cat = frame.column("region_cat").unwrap();
    assert_eq!(cat.data_type(), DataType::Categorical);
    assert!(cat.fragment().starts_with("CASE WHEN"), "{}", cat.fragment());

    let out = frame.materialize().unwrap();
    assert_eq!(
        column(&out, "region_cat"),
        &Vector::from(vec![0_i64, 1, 0, 1, 2])
    );
    let map = out.column("region_cat").unwrap().categories().unwrap();
    assert_eq!(map.level(2), Some(&Value::from("north")));
}

#[test]
fn columns_cannot_cross_queries() {
    let frame = to_sql(&sales(), "sales");
    let mut other = frame
        .evaluate("sort('asc', id)")
        .unwrap()
        .result
        .into_frame()
        .unwrap();
    let mut stray = frame.evaluate("units + 1").unwrap().result.into_column().unwrap();
    stray.set_name("stray");
    let err = other.append_column(stray).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
}

#[test]
fn save_and_reload() {
    let dialect = sqlite();
    let mut frame = sql::load_frame(Arc::clone(&dialect), "sales", &sales()).unwrap();
    frame.parse("double_units := units * 2").unwrap();
    frame.save("sales_out").unwrap();
    assert!(dialect.exists("sales_out").unwrap());

    let reloaded =
        SqlFrame::from_table(Arc::clone(&dialect), "sales_out", FrameOptions::default()).unwrap();
    assert_eq!(
        reloaded.column_names(),
        vec!["id", "region", "units", "amount", "double_units"]
    );
    let out = reloaded.materialize().unwrap();
    assert_eq!(
        column(&out, "double_units"),
        &Vector::from(vec![2_i64, 6, 6, 8, 8])
    );
}

#[test]
fn loads_in_batches_and_keeps_dates() {
    let options = FrameOptions::from_json(r#"{"insert_batch_rows": 2}"#).unwrap();
    let mut data = MemFrame::with_options(options);
    data.add_column("day", vec![date(2024, 1, 31), date(2024, 3, 1), date(2023, 7, 4)])
        .unwrap();
    data.add_column("n", vec![1_i64, 2, 3]).unwrap();

    let frame = sql::load_frame(sqlite(), "days", &data).unwrap();
    assert_eq!(frame.row_count().unwrap(), 3);
    assert_eq!(frame.column("day").unwrap().data_type(), DataType::Date);

    let out = frame.materialize().unwrap();
    assert_eq!(column(&out, "day"), column(&data, "day"));

    let late = frame
        .evaluate("day > '2024-02-01'")
        .unwrap()
        .result
        .into_column()
        .unwrap();
    assert_eq!(late.values().unwrap(), Vector::from(vec![0_i64, 1, 0]));

    let as_int = frame
        .evaluate("cast(day, 'integer')")
        .unwrap()
        .result
        .into_column()
        .unwrap();
    assert_eq!(
        as_int.values().unwrap(),
        Vector::from(vec![20240131_i64, 20240301, 20230704])
    );
}

#[test]
fn seeded_tables_are_read_with_declared_types() {
    let dialect = SqliteDialect::open_in_memory().unwrap();
    dialect
        .execute_batch(
            "CREATE TABLE t (a INTEGER, b REAL, c TEXT);
             INSERT INTO t VALUES (1, 1.5, 'x'), (2, 2.5, 'y');",
        )
        .unwrap();
    let frame = SqlFrame::from_table(Arc::new(dialect), "t", FrameOptions::default()).unwrap();
    let types: Vec<DataType> = frame.columns().iter().map(|c| c.data_type()).collect();
    assert_eq!(types, vec![DataType::Integer, DataType::Float, DataType::String]);
    assert_eq!(
        frame.evaluate("a + b").unwrap().result.into_column().unwrap().values().unwrap(),
        Vector::from(vec![2.5, 4.5])
    );
}
