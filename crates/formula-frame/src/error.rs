use formula_vector::{DataType, VectorError};

pub type FrameResult<T> = Result<T, FrameError>;

/// Coarse classification of [`FrameError`]s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed formula text; nothing was evaluated.
    Parse,
    /// Unknown operation, no matching signature or wrong arity.
    Dispatch,
    /// An operation failed while running.
    Execution,
    /// A column with the same name already exists.
    DuplicateName,
    /// Frame shape problems: unknown columns, length mismatches.
    Schema,
    /// The database rejected a composed query.
    Database,
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("no signature of {op} accepts ({})", join_types(.types))]
    NoMatchingSignature { op: String, types: Vec<DataType> },

    #[error("{op} expects {expected} arguments, got {actual}")]
    Arity {
        op: String,
        expected: String,
        actual: usize,
    },

    #[error("{op} failed: {message}")]
    Execution { op: String, message: String },

    #[error("duplicate column: {0}")]
    DuplicateName(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("column {column} has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("{dialect} dialect does not support {what}")]
    Unsupported { dialect: String, what: String },

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database error: {0}")]
    Database(String),

    #[error("invalid options: {0}")]
    Config(#[from] serde_json::Error),
}

impl FrameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FrameError::Parse(_) => ErrorKind::Parse,
            FrameError::UnknownOperation(_)
            | FrameError::NoMatchingSignature { .. }
            | FrameError::Arity { .. } => ErrorKind::Dispatch,
            FrameError::Execution { .. } | FrameError::Vector(_) | FrameError::Type(_) => {
                ErrorKind::Execution
            }
            FrameError::DuplicateName(_) => ErrorKind::DuplicateName,
            FrameError::UnknownColumn(_) | FrameError::LengthMismatch { .. } => ErrorKind::Schema,
            FrameError::Unsupported { .. } | FrameError::Database(_) => ErrorKind::Database,
            #[cfg(feature = "sqlite")]
            FrameError::Sqlite(_) => ErrorKind::Database,
            FrameError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn execution(op: &str, message: impl Into<String>) -> Self {
        FrameError::Execution {
            op: op.to_string(),
            message: message.into(),
        }
    }
}

fn join_types(types: &[DataType]) -> String {
    types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
