use std::fmt::{self, Display};
use std::sync::Arc;

use livetab_common::{DataType, Element, EvalError, Scalar, Value};

use crate::operator::{Operator, OperatorKind};

/// An operator occurrence inside an expression.
///
/// `argc` is the number of arguments this occurrence consumes. For fixed
/// arity operators it equals the declared arity; for variadic functions the
/// postfix generator records the count actually written.
#[derive(Debug, Clone)]
pub struct OperatorToken {
    pub op: Arc<Operator>,
    pub argc: usize,
}

impl OperatorToken {
    pub fn new(op: Arc<Operator>) -> Self {
        let argc = op.arity().min;
        Self { op, argc }
    }

    pub fn kind(&self) -> OperatorKind {
        self.op.kind()
    }

    pub fn label(&self) -> &str {
        self.op.label()
    }
}

impl PartialEq for OperatorToken {
    fn eq(&self, other: &Self) -> bool {
        self.argc == other.argc && (Arc::ptr_eq(&self.op, &other.op) || *self.op == *other.op)
    }
}

/// The tagged value flowing through parsing and evaluation.
#[derive(Debug, Clone)]
pub enum Token {
    Operand(Scalar),
    /// A named constant (`pi`, `true`); evaluates to its value.
    Constant {
        label: Arc<str>,
        value: Scalar,
    },
    Operator(OperatorToken),
    /// A reference to a table element, with the label it was written as.
    Reference {
        element: Element,
        label: Arc<str>,
    },
    LeftParen,
    RightParen,
    Comma,
    Null,
    Error(EvalError),
    /// Free expression text, produced when printing a stack back to infix.
    Expression(String),
}

impl Token {
    pub fn number(n: f64) -> Self {
        Token::Operand(Scalar::Number(n))
    }

    pub fn text<S: Into<String>>(s: S) -> Self {
        Token::Operand(Scalar::Text(s.into()))
    }

    pub fn boolean(b: bool) -> Self {
        Token::Operand(Scalar::Boolean(b))
    }

    pub fn operator(op: Arc<Operator>) -> Self {
        Token::Operator(OperatorToken::new(op))
    }

    pub fn reference<S: Into<Arc<str>>>(element: Element, label: S) -> Self {
        Token::Reference {
            element,
            label: label.into(),
        }
    }

    pub fn error(e: impl Into<EvalError>) -> Self {
        Token::Error(e.into())
    }

    /// The scalar carried by an operand or constant.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Token::Operand(s) | Token::Constant { value: s, .. } => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        self.as_scalar().and_then(Scalar::as_number)
    }

    pub fn as_element(&self) -> Option<Element> {
        match self {
            Token::Reference { element, .. } => Some(*element),
            _ => None,
        }
    }

    pub fn as_operator(&self) -> Option<&OperatorToken> {
        match self {
            Token::Operator(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&EvalError> {
        match self {
            Token::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_operand(&self) -> bool {
        matches!(self, Token::Operand(_) | Token::Constant { .. })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Token::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Token::Error(_))
    }

    /// Runtime type of a value-carrying token.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Token::Operand(s) | Token::Constant { value: s, .. } => Some(s.data_type()),
            Token::Reference { .. } => Some(DataType::Reference),
            _ => None,
        }
    }

    /// Token for a stored cell value. `None` for pending cells, which have
    /// no token form.
    pub fn from_value(v: &Value) -> Option<Token> {
        Some(match v {
            Value::Number(n) => Token::number(*n),
            Value::Text(s) => Token::text(s.clone()),
            Value::Boolean(b) => Token::boolean(*b),
            Value::Empty => Token::Null,
            Value::Error(e) => Token::Error(e.clone()),
            Value::Pending => return None,
        })
    }

    /// The cell value a result token writes. Non-value tokens become an
    /// `Unspecified` error.
    pub fn to_value(&self) -> Value {
        match self {
            Token::Operand(s) | Token::Constant { value: s, .. } => s.clone().into(),
            Token::Null => Value::Empty,
            Token::Error(e) => Value::Error(e.clone()),
            other => Value::Error(
                EvalError::new(livetab_common::ErrorKind::Unspecified)
                    .with_message(format!("'{other}' is not a value")),
            ),
        }
    }
}

impl From<Scalar> for Token {
    fn from(s: Scalar) -> Self {
        Token::Operand(s)
    }
}

impl From<f64> for Token {
    fn from(n: f64) -> Self {
        Token::number(n)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::text(s)
    }
}

impl From<bool> for Token {
    fn from(b: bool) -> Self {
        Token::boolean(b)
    }
}

impl From<EvalError> for Token {
    fn from(e: EvalError) -> Self {
        Token::Error(e)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        use Token::*;
        match (self, other) {
            (Operand(a), Operand(b)) => a == b,
            (Constant { label: a, .. }, Constant { label: b, .. }) => a.eq_ignore_ascii_case(b),
            (Operator(a), Operator(b)) => a == b,
            (Reference { element: a, .. }, Reference { element: b, .. }) => a == b,
            (Error(a), Error(b)) => a.kind == b.kind,
            (Expression(a), Expression(b)) => a == b,
            (LeftParen, LeftParen)
            | (RightParen, RightParen)
            | (Comma, Comma)
            | (Null, Null) => true,
            _ => false,
        }
    }
}

/// Quote text so the parser reads it back verbatim.
pub(crate) fn quote_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Operand(Scalar::Text(s)) => f.write_str(&quote_text(s)),
            Token::Operand(s) => write!(f, "{s}"),
            Token::Constant { label, .. } => f.write_str(label),
            Token::Operator(op) => f.write_str(op.label()),
            Token::Reference { label, .. } => f.write_str(label),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Null => f.write_str("null"),
            Token::Error(e) => write!(f, "{}", e.kind),
            Token::Expression(s) => f.write_str(s),
        }
    }
}
