use crate::instruction::Opcode;
use fieldsearch_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FieldSearchError {
    /// Raised while building a program.
    #[error("{opcode} does not accept {operand}")]
    TypeMismatch { opcode: Opcode, operand: String },
    #[error("invalid sequence: {0}")]
    InvalidSequence(String),
    #[error("unknown label {label} referenced at instruction {position}")]
    UnknownLabel { label: i64, position: usize },
    #[error("program did not terminate within {limit} steps")]
    ProgramDivergence { limit: usize },
    #[error("cannot convert {kind} value '{value}' to {target}")]
    ValueConversion { kind: &'static str, value: String, target: &'static str },
    #[error("content store error: {0}")]
    Store(#[from] StoreError),
}

impl FieldSearchError {
    pub(crate) fn sequence(message: impl Into<String>) -> Self {
        FieldSearchError::InvalidSequence(message.into())
    }
}
