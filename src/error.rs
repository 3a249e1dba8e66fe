use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dimension '{dimension}' reads column {column} but rows only carry {arity} dimensions")]
    DimensionOutOfRange {
        dimension: String,
        column: usize,
        arity: usize,
    },

    #[error("Consistency violation at '{path}': {measure} expected {expected}, found {actual}")]
    ConsistencyViolation {
        path: String,
        measure: String,
        expected: Decimal,
        actual: Decimal,
    },

    #[error("No node at path '{0}'")]
    UnknownNode(String),

    #[error("Row source error: {0}")]
    RowSource(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
