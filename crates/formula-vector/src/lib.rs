//! Typed columnar values shared by every Formula frame backend.
//!
//! This crate focuses on:
//! - A closed set of runtime type tags ([`DataType`]) used both for data and for operation
//!   signatures.
//! - Homogeneous vectors ([`Vector`]) holding exactly one concrete type per run.
//! - Scalar cells ([`Value`]) with total ordering/hashing so they can key maps and groups.
//! - Categorical encoding ([`CategoryMap`]) from raw values to small integer codes.

#![forbid(unsafe_code)]

mod category;
mod data_type;
mod error;
mod value;
mod vector;

pub use crate::category::{CategoryMap, OTHER_CODE};
pub use crate::data_type::DataType;
pub use crate::error::{VectorError, VectorResult};
pub use crate::value::{format_date, parse_date, Value, DEFAULT_DATE_FORMATS};
pub use crate::vector::Vector;
