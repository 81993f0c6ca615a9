use crate::DataType;

pub type VectorResult<T> = Result<T, VectorError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VectorError {
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: DataType, actual: DataType },

    #[error("cannot cast {value:?} from {from} to {to}")]
    Cast {
        value: String,
        from: DataType,
        to: DataType,
    },

    #[error("{0} is not a concrete vector type")]
    NotConcrete(DataType),

    #[error("{0} values cannot be categorized")]
    NotCategorical(DataType),

    #[error("value {0} is not a level of the category map")]
    UnknownLevel(String),

    #[error("null value in a {0} vector")]
    Null(DataType),

    #[error("row {row} out of bounds for vector of length {len}")]
    OutOfBounds { row: usize, len: usize },
}
