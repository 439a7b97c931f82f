use std::fmt::{self, Display};

use crate::{DataType, EvalError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A scalar operand: the only payloads an Operand token may carry.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Number(_) => DataType::Number,
            Scalar::Text(_) => DataType::Text,
            Scalar::Boolean(_) => DataType::Boolean,
        }
    }

    /// Numeric view used by arithmetic; booleans count as 0/1, text never
    /// coerces.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Number(n) => *n != 0.0,
            Scalar::Text(s) => !s.is_empty(),
            Scalar::Boolean(b) => *b,
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => write!(f, "{s}"),
            Scalar::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Boolean(b)
    }
}

/// What a table cell holds. This is distinct from the token model used
/// during evaluation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// The table's null.
    #[default]
    Empty,
    /// Awaiting an asynchronous result, or blocked on one.
    Pending,
    Error(EvalError),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Value::Pending)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The scalar payload, if this cell holds one.
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Number(n) => Some(Scalar::Number(*n)),
            Value::Text(s) => Some(Scalar::Text(s.clone())),
            Value::Boolean(b) => Some(Scalar::Boolean(*b)),
            _ => None,
        }
    }

    /// Round numeric contents to `digits` decimal places.
    pub fn rounded(self, digits: Option<u32>) -> Self {
        match (self, digits) {
            (Value::Number(n), Some(d)) => Value::Number(round_to(n, d)),
            (v, _) => v,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Empty => write!(f, ""),
            Value::Pending => write!(f, "Pending"),
            Value::Error(e) => write!(f, "{e}"),
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Number(n) => Value::Number(n),
            Scalar::Text(t) => Value::Text(t),
            Scalar::Boolean(b) => Value::Boolean(b),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<EvalError> for Value {
    fn from(e: EvalError) -> Self {
        Value::Error(e)
    }
}

/// Half-away-from-zero rounding to `digits` decimal places.
pub fn round_to(n: f64, digits: u32) -> f64 {
    if !n.is_finite() {
        return n;
    }
    let factor = 10f64.powi(digits.min(15) as i32);
    let scaled = (n * factor).round() / factor;
    if scaled.is_finite() { scaled } else { n }
}
