use std::fmt::{self, Display};

use livetab_common::Element;

/// Closed set of parse outcomes other than success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserStatusCode {
    EmptyExpression,
    ParenMismatch,
    CircularReference,
    InvalidExpression,
    InvalidOperandLocation,
    InvalidOperatorLocation,
    InvalidCommaLocation,
    NoSuchOperator,
    SingletonQuote,
    InvalidNumericExpression,
    InvalidOperand,
    InvalidColumnReference,
}

impl Display for ParserStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// First structural problem found in an expression.
///
/// `position` is the byte offset of the offending token in the source text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code} at position {position}: {message}")]
pub struct ParseError {
    pub code: ParserStatusCode,
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub fn new<S: Into<String>>(code: ParserStatusCode, position: usize, message: S) -> Self {
        Self {
            code,
            position,
            message: message.into(),
        }
    }
}

/// Resolves identifiers that are not operators or constants to table
/// elements. Supplied by the table collaborator.
pub trait ReferenceResolver {
    /// Resolve a bare label (case-insensitive).
    fn resolve(&self, label: &str) -> Option<Element>;

    /// Resolve a `table::label` qualified reference. Cross-table resolution is
    /// left to the collaborator; the default refuses it.
    fn resolve_qualified(&self, _table: &str, _label: &str) -> Option<Element> {
        None
    }
}

/// Resolver for expressions that may not mention table elements.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReferences;

impl ReferenceResolver for NoReferences {
    fn resolve(&self, _label: &str) -> Option<Element> {
        None
    }
}
