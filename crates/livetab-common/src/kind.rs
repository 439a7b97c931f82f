use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Declared argument/result type of an operator.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Number,
    Text,
    Boolean,
    /// A table element reference (row, column, cell, subset, table).
    Reference,
    Any,
}

impl DataType {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_lowercase().as_str() {
            "number" => Self::Number,
            "text" | "string" => Self::Text,
            "boolean" | "logical" => Self::Boolean,
            "reference" | "range" => Self::Reference,
            "" | "_" | "any" => Self::Any,
            _ => return None,
        })
    }

    /// Whether a value of type `actual` satisfies this declared type.
    pub fn accepts(&self, actual: DataType) -> bool {
        *self == DataType::Any || *self == actual
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataType::Number => "number",
            DataType::Text => "text",
            DataType::Boolean => "boolean",
            DataType::Reference => "reference",
            DataType::Any => "any",
        })
    }
}
