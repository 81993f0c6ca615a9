//! Formula evaluation over dataframes.
//!
//! A formula such as `"profit := price - cost"` or `"by(region, total := sum(sales))"` is parsed
//! once into an [`Expr`] tree and evaluated against a [`Frame`]. Two frames implement the same
//! contract:
//!
//! - [`MemFrame`] holds materialized [`formula_vector::Vector`]s and computes in process.
//! - [`SqlFrame`] holds SQL fragments and composes them into a query run by a [`sql::Dialect`].
//!
//! Operations are resolved by name and operand types through one registry (see [`ops`]), so a
//! formula means the same thing on either backend.
#![forbid(unsafe_code)]

mod column;
mod config;
mod error;
mod eval;
mod frame;
pub mod memory;
pub mod ops;
pub mod parser;
pub mod sql;

pub use column::Column;
pub use config::FrameOptions;
pub use error::{ErrorKind, FrameError, FrameResult};
pub use frame::{Evaluation, Frame, Parsed, PlotData, Scope};
pub use memory::{MemColumn, MemFrame};
pub use parser::{parse, BinaryOp, Expr, Formula};
pub use sql::{SqlColumn, SqlFrame};

#[cfg(feature = "sqlite")]
pub use sql::SqliteDialect;
