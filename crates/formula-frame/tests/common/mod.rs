#![allow(dead_code)]

#[cfg(feature = "sqlite")]
use std::sync::Arc;

use chrono::NaiveDate;
use formula_frame::{Column, Frame, MemFrame};
#[cfg(feature = "sqlite")]
use formula_frame::{sql, sql::Dialect, SqlFrame, SqliteDialect};
use formula_vector::Vector;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn mem_frame(columns: Vec<(&str, Vector)>) -> MemFrame {
    let mut frame = MemFrame::new();
    for (name, data) in columns {
        frame.add_column(name, data).unwrap();
    }
    frame
}

/// Values of the column a formula evaluates to.
pub fn eval<F: Frame>(frame: &F, formula: &str) -> Vector {
    frame
        .evaluate(formula)
        .unwrap_or_else(|err| panic!("{formula}: {err}"))
        .result
        .into_column()
        .unwrap_or_else(|| panic!("{formula} did not produce a column"))
        .values()
        .unwrap()
}

#[cfg(feature = "sqlite")]
pub fn sqlite() -> Arc<dyn Dialect> {
    Arc::new(SqliteDialect::open_in_memory().unwrap())
}

#[cfg(feature = "sqlite")]
pub fn to_sql(frame: &MemFrame, table: &str) -> SqlFrame {
    sql::load_frame(sqlite(), table, frame).unwrap()
}

/// Element-wise equality, with a relative tolerance for floats.
pub fn assert_close(actual: &Vector, expected: &Vector, context: &str) {
    match (actual, expected) {
        (Vector::Float(a), Vector::Float(b)) => {
            assert_eq!(a.len(), b.len(), "{context}: length");
            for (row, (x, y)) in a.iter().zip(b).enumerate() {
                let tolerance = 1e-9 * x.abs().max(y.abs()).max(1.0);
                assert!(
                    (x - y).abs() <= tolerance,
                    "{context}: row {row}: {x} != {y}"
                );
            }
        }
        _ => assert_eq!(actual, expected, "{context}"),
    }
}
