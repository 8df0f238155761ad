use thiserror::Error;

use crate::types::Ty;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),
    #[error("no overload matches {signature}")]
    OverloadNotFound { signature: String },
    #[error("invalid cast: no common numeric type for `{left} {op} {right}`")]
    TypeMismatch { op: char, left: Ty, right: Ty },
    #[error("invalid cast from {from} to {to}")]
    InvalidCast { from: Ty, to: Ty },
    #[error("unsupported construct: {0}")]
    Unsupported(String),
    #[error("{what} exceeds the configured limit of {limit}")]
    LimitExceeded { what: &'static str, limit: usize },
}

impl CompileError {
    pub(crate) fn parse(offset: usize, message: impl Into<String>) -> Self {
        CompileError::Parse {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("values length mismatch: expected at least {expected}, got {got}")]
    ValuesLen { expected: usize, got: usize },
    #[error("expression reads `this` but no receiver was supplied")]
    MissingReceiver,
    #[error("attempted to divide by zero")]
    DivideByZero,
    #[error("null reference while reading {0}")]
    NullReference(String),
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("expected a value of type {expected}, found {found}")]
    InvalidValue { expected: String, found: String },
    #[error("value is out of range for {0}")]
    Overflow(&'static str),
    #[error("host error: {0}")]
    Host(String),
}
