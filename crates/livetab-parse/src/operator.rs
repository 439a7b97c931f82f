//! Operator descriptors.
//!
//! An [`Operator`] is data: a label, a shape ([`OperatorKind`] plus
//! [`Arity`]), declared argument and result types, a precedence, a set of
//! free-text categories, and an optional evaluation callback. New operators
//! are registered, never hard-wired into the evaluator.

use std::fmt;
use std::sync::Arc;

use livetab_common::{DataType, ErrorKind, EvalError};

use crate::token::Token;

/// Highest precedence level. Two operators at this level never pop each other
/// during postfix conversion.
pub const MAX_PRECEDENCE: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Associativity {
    Left,
    Right,
}

/// Aggregate statistics over one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    Sum,
    Mean,
    Median,
    Mode,
    Variance,
    VarianceP,
    StdDev,
    StdDevP,
    Skew,
    Min,
    Max,
    Range,
    Count,
}

impl Statistic {
    /// Whether computing this statistic needs the full retained dataset
    /// rather than streaming moments.
    pub fn requires_dataset(&self) -> bool {
        matches!(self, Statistic::Median | Statistic::Mode | Statistic::Skew)
    }
}

/// Aggregate statistics over a pair of variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BivariateStatistic {
    Covariance,
    Correlation,
    Slope,
    Intercept,
    RSquared,
}

/// Per-cell transforms driven by an aggregate of the referenced element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    /// `x - mean`
    MeanCenter,
    /// `(x - mean) / stdev`
    Normalize,
    /// `(x - min) / (max - min)`
    Scale,
}

/// Zero-argument values manufactured from the evaluation position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltIn {
    RowIndex,
    ColumnIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    /// Prefix operator taking one operand (`-x`, `not x`, `sqrt 4`).
    Unary,
    /// Infix operator taking two operands.
    Binary,
    /// Function-call syntax with declared arity.
    Function,
    Stat(Statistic),
    Stat2(BivariateStatistic),
    Transform(Transform),
    BuiltIn(BuiltIn),
}

impl OperatorKind {
    /// Operators written with call syntax `label(args..)`.
    pub fn is_call(&self) -> bool {
        matches!(
            self,
            OperatorKind::Function
                | OperatorKind::Stat(_)
                | OperatorKind::Stat2(_)
                | OperatorKind::Transform(_)
        )
    }

    /// Operators that consume an element reference as a whole rather than
    /// a single cell value.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            OperatorKind::Stat(_) | OperatorKind::Stat2(_) | OperatorKind::Transform(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Arity {
    pub min: usize,
    /// `None` means variadic.
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    pub const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub fn admits(&self, n: usize) -> bool {
        n >= self.min && self.max.is_none_or(|m| n <= m)
    }

    /// Whether a call already holding `n` arguments may take another.
    pub fn has_room_after(&self, n: usize) -> bool {
        self.max.is_none_or(|m| n < m)
    }

    /// Human-readable form: `2`, `1..=3`, `1+`.
    pub fn describe(&self) -> String {
        match self.max {
            Some(m) if m == self.min => format!("{m}"),
            Some(m) => format!("{}..={m}", self.min),
            None => format!("{}+", self.min),
        }
    }
}

/// Deferred work attached to an awaiting result. It runs on the worker pool;
/// returning `Some` posts that token as the result, returning `None` means
/// the result is (or will be) posted by other means.
pub type PendingTask = Box<dyn FnOnce() -> Option<Token> + Send + 'static>;

/// "Value not yet known": the operator has started, or expects an external
/// party to provide, the real result.
pub struct Awaiting {
    pub task: Option<PendingTask>,
}

impl Awaiting {
    /// Resolved purely by an external `post_result`.
    pub fn external() -> Self {
        Self { task: None }
    }

    pub fn with_task<F>(task: F) -> Self
    where
        F: FnOnce() -> Option<Token> + Send + 'static,
    {
        Self {
            task: Some(Box::new(task)),
        }
    }
}

impl fmt::Debug for Awaiting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Awaiting")
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

pub type OpResult = Result<Token, Awaiting>;

/// Evaluation callback. Arguments arrive in positional order, already
/// coerced to operands (references resolved, nulls and errors filtered).
pub type EvalFn = Arc<dyn Fn(&[Token]) -> OpResult + Send + Sync>;

#[derive(Clone)]
pub struct Operator {
    label: String,
    kind: OperatorKind,
    arity: Arity,
    arg_types: Vec<DataType>,
    result_type: DataType,
    precedence: u8,
    associativity: Associativity,
    categories: Vec<String>,
    description: Option<String>,
    eval: Option<EvalFn>,
}

impl Operator {
    fn base(label: &str, kind: OperatorKind, arity: Arity, precedence: u8) -> Self {
        Self {
            label: label.to_string(),
            kind,
            arity,
            arg_types: Vec::new(),
            result_type: DataType::Any,
            precedence: precedence.min(MAX_PRECEDENCE),
            associativity: if precedence >= MAX_PRECEDENCE {
                Associativity::Right
            } else {
                Associativity::Left
            },
            categories: Vec::new(),
            description: None,
            eval: None,
        }
    }

    pub fn unary(label: &str) -> Self {
        Self::base(label, OperatorKind::Unary, Arity::exactly(1), MAX_PRECEDENCE)
    }

    pub fn binary(label: &str, precedence: u8) -> Self {
        Self::base(label, OperatorKind::Binary, Arity::exactly(2), precedence)
    }

    pub fn function(label: &str, arity: Arity) -> Self {
        Self::base(label, OperatorKind::Function, arity, MAX_PRECEDENCE)
    }

    pub fn statistic(label: &str, stat: Statistic) -> Self {
        Self::base(label, OperatorKind::Stat(stat), Arity::at_least(1), MAX_PRECEDENCE)
            .returns(DataType::Number)
            .category("Statistical")
    }

    pub fn bivariate(label: &str, stat: BivariateStatistic) -> Self {
        Self::base(label, OperatorKind::Stat2(stat), Arity::exactly(2), MAX_PRECEDENCE)
            .arg_types([DataType::Reference, DataType::Reference])
            .returns(DataType::Number)
            .category("Statistical")
    }

    pub fn transform(label: &str, transform: Transform) -> Self {
        Self::base(
            label,
            OperatorKind::Transform(transform),
            Arity::exactly(1),
            MAX_PRECEDENCE,
        )
        .arg_types([DataType::Reference])
        .returns(DataType::Number)
        .category("Transform")
    }

    pub fn built_in(label: &str, builtin: BuiltIn) -> Self {
        Self::base(
            label,
            OperatorKind::BuiltIn(builtin),
            Arity::exactly(0),
            MAX_PRECEDENCE,
        )
        .returns(DataType::Number)
        .category("Reference")
    }

    /* ─────────────── builder ─────────────── */

    pub fn arg_types<I: IntoIterator<Item = DataType>>(mut self, types: I) -> Self {
        self.arg_types = types.into_iter().collect();
        self
    }

    pub fn returns(mut self, t: DataType) -> Self {
        self.result_type = t;
        self
    }

    pub fn category<S: Into<String>>(mut self, c: S) -> Self {
        let c = c.into();
        if !self.categories.iter().any(|e| e.eq_ignore_ascii_case(&c)) {
            self.categories.push(c);
        }
        self
    }

    pub fn describe<S: Into<String>>(mut self, text: S) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn associativity(mut self, a: Associativity) -> Self {
        self.associativity = a;
        self
    }

    pub fn eval<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Token]) -> OpResult + Send + Sync + 'static,
    {
        self.eval = Some(Arc::new(f));
        self
    }

    /// Convenience for callbacks that never defer.
    pub fn eval_now<F>(self, f: F) -> Self
    where
        F: Fn(&[Token]) -> Token + Send + Sync + 'static,
    {
        self.eval(move |args| Ok(f(args)))
    }

    /* ─────────────── accessors ─────────────── */

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> OperatorKind {
        self.kind
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn precedence(&self) -> u8 {
        self.precedence
    }

    pub fn associativity_of(&self) -> Associativity {
        self.associativity
    }

    pub fn result_type(&self) -> DataType {
        self.result_type
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared type of the `i`-th argument; variadic tails repeat the last
    /// declared type.
    pub fn arg_type(&self, i: usize) -> DataType {
        self.arg_types
            .get(i)
            .or_else(|| self.arg_types.last())
            .copied()
            .unwrap_or(DataType::Any)
    }

    pub fn has_eval(&self) -> bool {
        self.eval.is_some()
    }

    /// Whether the label is written as a word (`sqrt`) rather than a symbol
    /// (`-`).
    pub fn is_word(&self) -> bool {
        self.label
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
    }

    pub fn is_max_precedence(&self) -> bool {
        self.precedence >= MAX_PRECEDENCE
    }

    /// Run the evaluation callback.
    pub fn evaluate(&self, args: &[Token]) -> OpResult {
        match &self.eval {
            Some(f) => f(args),
            None => Ok(Token::Error(
                EvalError::new(ErrorKind::Unspecified)
                    .with_message(format!("operator '{}' has no evaluator", self.label)),
            )),
        }
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("arity", &self.arity)
            .field("precedence", &self.precedence)
            .finish()
    }
}

impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.kind == other.kind && self.arity == other.arity
    }
}
