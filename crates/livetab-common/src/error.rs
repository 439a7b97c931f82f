//! Evaluation error representation.
//!
//! - **`ErrorKind`** : the closed set of evaluation error codes
//! - **`EvalError`** : one struct gluing a kind to an optional message
//!
//! Evaluation errors are *data*: they travel through the operand stack like
//! any other value and end up written to the target cell, so downstream
//! formulas can observe them.

use std::{error::Error, fmt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// All recognised evaluation error codes.
///
/// Names are CamelCase while `Display` renders them as the short `#CODE`
/// text that ends up in a cell.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DivideByZero,
    StackOverflow,
    StackUnderflow,
    OperandRequired,
    ReferenceRequired,
    OperandDataTypeMismatch,
    InvalidOperand,
    InvalidTableOperand,
    UnimplementedStatistic,
    NaN,
    /// Free-text error; the message carries the detail.
    SeeErrorMessage,
    Unspecified,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl ErrorKind {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DivideByZero => "#DIV/0",
            Self::StackOverflow => "#OVERFLOW",
            Self::StackUnderflow => "#UNDERFLOW",
            Self::OperandRequired => "#OPERAND",
            Self::ReferenceRequired => "#REF",
            Self::OperandDataTypeMismatch => "#TYPE",
            Self::InvalidOperand => "#INVALID",
            Self::InvalidTableOperand => "#TABLE",
            Self::UnimplementedStatistic => "#NOSTAT",
            Self::NaN => "#NAN",
            Self::SeeErrorMessage => "#ERROR",
            Self::Unspecified => "#UNSPECIFIED",
        }
    }

    /// Inverse of [`ErrorKind::code`]; `None` for unknown text.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_uppercase().as_str() {
            "#DIV/0" => Self::DivideByZero,
            "#OVERFLOW" => Self::StackOverflow,
            "#UNDERFLOW" => Self::StackUnderflow,
            "#OPERAND" => Self::OperandRequired,
            "#REF" => Self::ReferenceRequired,
            "#TYPE" => Self::OperandDataTypeMismatch,
            "#INVALID" => Self::InvalidOperand,
            "#TABLE" => Self::InvalidTableOperand,
            "#NOSTAT" => Self::UnimplementedStatistic,
            "#NAN" => Self::NaN,
            "#ERROR" => Self::SeeErrorMessage,
            "#UNSPECIFIED" => Self::Unspecified,
            _ => return None,
        })
    }
}

/// The error value carried by an Error token or an errored cell.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EvalError {
    pub kind: ErrorKind,
    pub message: Option<String>,
}

impl From<ErrorKind> for EvalError {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }
}

impl EvalError {
    pub fn new(kind: ErrorKind) -> Self {
        kind.into()
    }

    /// Attach a human-readable explanation.
    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// A `SeeErrorMessage` error carrying `msg`.
    pub fn message<S: Into<String>>(msg: S) -> Self {
        Self::new(ErrorKind::SeeErrorMessage).with_message(msg)
    }

    pub fn div_by_zero() -> Self {
        Self::new(ErrorKind::DivideByZero)
    }

    pub fn type_mismatch() -> Self {
        Self::new(ErrorKind::OperandDataTypeMismatch)
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl Error for EvalError {}

impl PartialEq<ErrorKind> for EvalError {
    fn eq(&self, other: &ErrorKind) -> bool {
        self.kind == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_parse() {
        for kind in [
            ErrorKind::DivideByZero,
            ErrorKind::StackUnderflow,
            ErrorKind::SeeErrorMessage,
            ErrorKind::NaN,
        ] {
            assert_eq!(ErrorKind::parse(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::parse("#nope"), None);
    }

    #[test]
    fn display_includes_message() {
        let e = EvalError::message("bad things");
        assert_eq!(e.to_string(), "#ERROR: bad things");
        assert_eq!(EvalError::div_by_zero().to_string(), "#DIV/0");
    }
}
