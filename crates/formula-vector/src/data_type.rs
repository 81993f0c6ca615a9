use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::VectorError;

/// Runtime type tag for columns, vectors and operation signatures.
///
/// `Any` only ever appears in signatures; no vector or column carries it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Unknown,
    String,
    Float,
    Integer,
    Categorical,
    Date,
    Nil,
    DataFrame,
    Any,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Unknown => "unknown",
            DataType::String => "string",
            DataType::Float => "float",
            DataType::Integer => "integer",
            DataType::Categorical => "categorical",
            DataType::Date => "date",
            DataType::Nil => "nil",
            DataType::DataFrame => "dataframe",
            DataType::Any => "any",
        }
    }

    /// Whether a [`crate::Vector`] can hold elements of this type.
    pub fn is_vector_type(self) -> bool {
        matches!(
            self,
            DataType::String | DataType::Float | DataType::Integer | DataType::Date
        )
    }

    /// Whether an operand of type `actual` fills a signature slot declared as `self`.
    ///
    /// Categorical operands are matched as their integer codes.
    pub fn accepts(self, actual: DataType) -> bool {
        match self {
            DataType::Any => true,
            DataType::Integer => matches!(actual, DataType::Integer | DataType::Categorical),
            declared => declared == actual,
        }
    }

    /// The type of the stored elements: categorical data is stored as integer codes.
    pub fn storage(self) -> DataType {
        match self {
            DataType::Categorical => DataType::Integer,
            other => other,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Ok(DataType::String),
            "float" | "float64" | "double" => Ok(DataType::Float),
            "integer" | "int" | "int64" => Ok(DataType::Integer),
            "categorical" | "cat" => Ok(DataType::Categorical),
            "date" => Ok(DataType::Date),
            "nil" => Ok(DataType::Nil),
            "dataframe" => Ok(DataType::DataFrame),
            "any" => Ok(DataType::Any),
            "unknown" => Ok(DataType::Unknown),
            _ => Err(VectorError::Cast {
                value: s.to_string(),
                from: DataType::String,
                to: DataType::Unknown,
            }),
        }
    }
}
