//! Postfix stack machine.
//!
//! One left-to-right pass over a postfix [`EquationStack`] with a single
//! operand stack. References stay unresolved on the stack until an
//! operator consumes them: aggregates read the whole element, everything
//! else reads the cell at the evaluation position.
//!
//! Evaluation never blocks. When an operator answers "awaiting", or a read
//! hits a pending cell, the pass stops and returns a [`Suspension`]
//! describing how to pick it up again.

use std::fmt;
use std::sync::Arc;

use livetab_common::{CellKey, ColumnId, DataType, Element, ErrorKind, EvalError, RowId, Scalar, Value};
use livetab_parse::{
    BivariateStatistic, BuiltIn, EquationStack, OperatorKind, OperatorToken, PendingTask,
    Statistic, Token, TokenMapper, Transform,
};

use crate::builtins::arithmetic::divide;
use crate::builtins::utils::{finish, from_result};
use crate::engine::context::DerivationContext;
use crate::engine::graph::AggregateExclusion;
use crate::stats::{BivariateStats, UnivariateStats};
use crate::traits::TableStore;

/// Where an expression is being evaluated. Column references read the
/// cell in `row`, row references the cell in `col`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub row: Option<RowId>,
    pub col: Option<ColumnId>,
}

impl Position {
    pub fn at(cell: CellKey) -> Self {
        Self {
            row: Some(cell.row),
            col: Some(cell.col),
        }
    }
}

/// Saved machine state of a pass suspended on an awaiting operator.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Index of the first token still to run.
    pub(crate) next: usize,
    /// Operand stack without the awaited result.
    pub(crate) stack: Vec<Token>,
}

pub enum Suspension {
    /// An operator promised its result later.
    Awaiting {
        task: Option<PendingTask>,
        frame: Frame,
    },
    /// A read hit a pending cell.
    Blocked { cell: CellKey },
    /// An aggregate covers pending cells.
    BlockedStatistic {
        elements: Vec<Element>,
        cells: Vec<CellKey>,
    },
}

impl fmt::Debug for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suspension::Awaiting { task, frame } => f
                .debug_struct("Awaiting")
                .field("has_task", &task.is_some())
                .field("next", &frame.next)
                .finish(),
            Suspension::Blocked { cell } => f.debug_struct("Blocked").field("cell", cell).finish(),
            Suspension::BlockedStatistic { elements, cells } => f
                .debug_struct("BlockedStatistic")
                .field("elements", elements)
                .field("cells", cells)
                .finish(),
        }
    }
}

/// Why an operator application stopped the pass.
enum Halt {
    Awaiting(Option<PendingTask>),
    Suspended(Suspension),
}

impl From<Suspension> for Halt {
    fn from(s: Suspension) -> Self {
        Halt::Suspended(s)
    }
}

type Step = Result<Token, Halt>;

/// Outcome of gathering an aggregate: the engine, or an error found in a
/// contributing cell.
type Gathered<T> = Result<Result<Arc<T>, EvalError>, Suspension>;

fn mismatch(expected: DataType, got: &Token) -> Token {
    Token::Error(
        EvalError::type_mismatch().with_message(format!("expected {expected}, got '{got}'")),
    )
}

pub struct Evaluator<'a> {
    store: &'a dyn TableStore,
    mapper: &'a TokenMapper,
    exclusion: &'a dyn AggregateExclusion,
    ctx: &'a mut DerivationContext,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        store: &'a dyn TableStore,
        mapper: &'a TokenMapper,
        exclusion: &'a dyn AggregateExclusion,
        ctx: &'a mut DerivationContext,
    ) -> Self {
        Self {
            store,
            mapper,
            exclusion,
            ctx,
        }
    }

    pub fn evaluate(&mut self, postfix: &EquationStack, pos: Position) -> Result<Token, Suspension> {
        self.run(postfix, pos, 0, Vec::new())
    }

    /// Continue a pass suspended on an awaiting operator, with `value` as
    /// that operator's result.
    pub fn resume(
        &mut self,
        postfix: &EquationStack,
        pos: Position,
        frame: Frame,
        value: Token,
    ) -> Result<Token, Suspension> {
        let Frame { next, mut stack } = frame;
        stack.push(value);
        self.run(postfix, pos, next, stack)
    }

    fn run(
        &mut self,
        postfix: &EquationStack,
        pos: Position,
        start: usize,
        mut stack: Vec<Token>,
    ) -> Result<Token, Suspension> {
        for (i, tok) in postfix.iter().enumerate().skip(start) {
            let op = match tok {
                Token::Operator(op) => op,
                Token::LeftParen | Token::RightParen | Token::Comma | Token::Expression(_) => {
                    return Ok(Token::Error(
                        EvalError::new(ErrorKind::InvalidOperand)
                            .with_message(format!("'{tok}' in a postfix stack")),
                    ));
                }
                other => {
                    stack.push(other.clone());
                    continue;
                }
            };
            if stack.len() < op.argc {
                return Ok(Token::error(ErrorKind::StackUnderflow));
            }
            let args = stack.split_off(stack.len() - op.argc);
            match self.apply(op, args, pos) {
                Ok(t) => stack.push(t),
                Err(Halt::Suspended(s)) => return Err(s),
                Err(Halt::Awaiting(task)) => {
                    return Err(Suspension::Awaiting {
                        task,
                        frame: Frame { next: i + 1, stack },
                    });
                }
            }
        }
        match stack.len() {
            0 => Ok(Token::error(ErrorKind::StackUnderflow)),
            1 => match stack.pop() {
                Some(t) => self.operand(t, pos).map(|t| match t {
                    Token::Constant { value, .. } => Token::Operand(value),
                    other => other,
                }),
                None => Ok(Token::error(ErrorKind::StackUnderflow)),
            },
            _ => Ok(Token::error(ErrorKind::StackOverflow)),
        }
    }

    fn apply(&mut self, op: &OperatorToken, args: Vec<Token>, pos: Position) -> Step {
        match op.kind() {
            OperatorKind::BuiltIn(b) => Ok(self.built_in(b, pos)),
            OperatorKind::Stat(s) => Ok(self.statistic(s, args, pos)?),
            OperatorKind::Stat2(s) => Ok(self.bivariate(s, &args)?),
            OperatorKind::Transform(t) => Ok(self.transform(t, &args, pos)?),
            OperatorKind::Unary | OperatorKind::Binary | OperatorKind::Function => {
                self.generic(op, args, pos)
            }
        }
    }

    /* ─────────────────────────── operand reads ────────────────────────── */

    /// Coerce a stack entry to a value token; references read the cell at
    /// the evaluation position.
    fn operand(&self, t: Token, pos: Position) -> Result<Token, Suspension> {
        match t {
            Token::Reference { element, .. } => self.read_at(element, pos),
            other => Ok(other),
        }
    }

    fn read_at(&self, element: Element, pos: Position) -> Result<Token, Suspension> {
        let invalid = || {
            Ok(Token::Error(
                EvalError::new(ErrorKind::InvalidOperand)
                    .with_message(format!("{element} no longer exists")),
            ))
        };
        if !self.store.is_valid(element) {
            return invalid();
        }
        let key = match element {
            Element::Cell(k) => k,
            Element::Column(c) => match pos.row {
                Some(r) => CellKey::new(r, c),
                None => return Ok(Token::error(ErrorKind::ReferenceRequired)),
            },
            Element::Row(r) => match pos.col {
                Some(c) => CellKey::new(r, c),
                None => return Ok(Token::error(ErrorKind::ReferenceRequired)),
            },
            Element::Subset(_) | Element::Table => {
                return Ok(Token::error(ErrorKind::InvalidTableOperand));
            }
        };
        if !self.store.is_valid(Element::Cell(key)) {
            return invalid();
        }
        match self.store.get_cell(key.row, key.col) {
            Value::Pending => Err(Suspension::Blocked { cell: key }),
            v => Ok(Token::from_value(&v).unwrap_or(Token::Null)),
        }
    }

    /* ─────────────────────────── generic operators ────────────────────────── */

    fn generic(&mut self, op: &OperatorToken, args: Vec<Token>, pos: Position) -> Step {
        let mut vals = Vec::with_capacity(args.len());
        for (i, a) in args.into_iter().enumerate() {
            // operators that declare a reference parameter receive it as is
            if op.op.arg_type(i) == DataType::Reference && matches!(a, Token::Reference { .. }) {
                vals.push(a);
            } else {
                vals.push(self.operand(a, pos)?);
            }
        }
        if let Some(e) = vals.iter().find_map(Token::as_error) {
            return Ok(Token::Error(e.clone()));
        }
        if vals.iter().any(Token::is_null) {
            return Ok(Token::Null);
        }
        for (i, v) in vals.iter().enumerate() {
            let want = op.op.arg_type(i);
            if let Some(got) = v.data_type()
                && !want.accepts(got)
            {
                return Ok(mismatch(want, v));
            }
        }

        let mut target = op.op.clone();
        if op.kind() == OperatorKind::Binary
            && let (Some(l), Some(r)) = (vals[0].data_type(), vals[1].data_type())
        {
            match self.mapper.overload(op.label(), l, r) {
                Some(over) => target = over,
                None => {
                    if let Some(t) = self.fast_path(op, &vals) {
                        return Ok(t);
                    }
                }
            }
        }
        target.evaluate(&vals).map_err(|a| Halt::Awaiting(a.task))
    }

    /// Direct arithmetic for the built-in `+ - * /`.
    fn fast_path(&self, op: &OperatorToken, vals: &[Token]) -> Option<Token> {
        let builtin = self.mapper.builtins().lookup(op.label())?.as_operator()?;
        if !Arc::ptr_eq(&builtin.op, &op.op) {
            return None;
        }
        let (a, b) = (vals[0].as_scalar()?, vals[1].as_scalar()?);
        if op.label() == "+" && (a.as_text().is_some() || b.as_text().is_some()) {
            return Some(Token::text(format!("{a}{b}")));
        }
        let (x, y) = (a.as_number()?, b.as_number()?);
        Some(match op.label() {
            "+" => finish(x + y),
            "-" => finish(x - y),
            "*" => finish(x * y),
            "/" => from_result(divide(x, y)),
            _ => return None,
        })
    }

    fn built_in(&self, b: BuiltIn, pos: Position) -> Token {
        let position = match b {
            BuiltIn::RowIndex => pos.row.and_then(|r| self.store.row_position(r)),
            BuiltIn::ColumnIndex => pos.col.and_then(|c| self.store.column_position(c)),
        };
        match position {
            Some(p) => Token::number(p as f64),
            None => Token::error(ErrorKind::ReferenceRequired),
        }
    }

    /* ─────────────────────────── aggregates ────────────────────────── */

    fn univariate_over(&mut self, element: Element, needs_dataset: bool) -> Gathered<UnivariateStats> {
        if !self.store.is_valid(element) {
            return Ok(Err(EvalError::new(ErrorKind::InvalidOperand)
                .with_message(format!("{element} no longer exists"))));
        }
        if let Some(s) = self.ctx.univariate(element, needs_dataset) {
            return Ok(Ok(s));
        }
        let mut stats = UnivariateStats::new(needs_dataset);
        let mut pending = Vec::new();
        for k in self.store.cells_of(element) {
            if self.exclusion.excluded(k, element) {
                continue;
            }
            match self.store.get_cell(k.row, k.col) {
                Value::Number(n) => stats.push(n),
                Value::Pending => pending.push(k),
                Value::Error(e) => return Ok(Err(e)),
                _ => {}
            }
        }
        if !pending.is_empty() {
            return Err(Suspension::BlockedStatistic {
                elements: vec![element],
                cells: pending,
            });
        }
        let stats = Arc::new(stats);
        self.ctx.cache_univariate(element, stats.clone());
        Ok(Ok(stats))
    }

    fn bivariate_over(&mut self, y: Element, x: Element) -> Gathered<BivariateStats> {
        for e in [y, x] {
            if !self.store.is_valid(e) {
                return Ok(Err(EvalError::new(ErrorKind::InvalidOperand)
                    .with_message(format!("{e} no longer exists"))));
            }
        }
        if let Some(s) = self.ctx.bivariate(y, x) {
            return Ok(Ok(s));
        }
        let mut stats = BivariateStats::new();
        let mut pending = Vec::new();
        let ys = self.store.cells_of(y);
        let xs = self.store.cells_of(x);
        for (ky, kx) in ys.into_iter().zip(xs) {
            if self.exclusion.excluded(ky, y) || self.exclusion.excluded(kx, x) {
                continue;
            }
            let vy = self.store.get_cell(ky.row, ky.col);
            let vx = self.store.get_cell(kx.row, kx.col);
            match (vy, vx) {
                (Value::Error(e), _) | (_, Value::Error(e)) => return Ok(Err(e)),
                (Value::Number(b), Value::Number(a)) => stats.push(a, b),
                (vy, vx) => {
                    if vy.is_pending() {
                        pending.push(ky);
                    }
                    if vx.is_pending() {
                        pending.push(kx);
                    }
                }
            }
        }
        if !pending.is_empty() {
            return Err(Suspension::BlockedStatistic {
                elements: vec![y, x],
                cells: pending,
            });
        }
        let stats = Arc::new(stats);
        self.ctx.cache_bivariate(y, x, stats.clone());
        Ok(Ok(stats))
    }

    /// One reference argument aggregates the element; otherwise the
    /// statistic runs over the scalar arguments, skipping nulls.
    fn statistic(&mut self, stat: Statistic, args: Vec<Token>, pos: Position) -> Result<Token, Suspension> {
        if let [Token::Reference { element, .. }] = args.as_slice() {
            return Ok(match self.univariate_over(*element, stat.requires_dataset())? {
                Ok(s) => from_result(s.compute(stat)),
                Err(e) => Token::Error(e),
            });
        }
        let mut stats = UnivariateStats::new(stat.requires_dataset());
        for a in args {
            match self.operand(a, pos)? {
                Token::Null => {}
                Token::Error(e) => return Ok(Token::Error(e)),
                t => match t.as_number() {
                    Some(n) => stats.push(n),
                    None => return Ok(mismatch(DataType::Number, &t)),
                },
            }
        }
        Ok(from_result(stats.compute(stat)))
    }

    /// `stat(y, x)`: the first reference is the dependent variable. Cells
    /// pair up by position within each element.
    fn bivariate(&mut self, stat: BivariateStatistic, args: &[Token]) -> Result<Token, Suspension> {
        let [y, x] = args else {
            return Ok(Token::error(ErrorKind::OperandRequired));
        };
        let (Some(ye), Some(xe)) = (y.as_element(), x.as_element()) else {
            let bad = if y.as_element().is_none() { y } else { x };
            return Ok(mismatch(DataType::Reference, bad));
        };
        Ok(match self.bivariate_over(ye, xe)? {
            Ok(s) => from_result(s.compute(stat)),
            Err(e) => Token::Error(e),
        })
    }

    /// Apply an aggregate of the referenced element to its own cell at the
    /// evaluation position.
    fn transform(&mut self, t: Transform, args: &[Token], pos: Position) -> Result<Token, Suspension> {
        let Some(arg) = args.first() else {
            return Ok(Token::error(ErrorKind::OperandRequired));
        };
        let Some(element) = arg.as_element() else {
            return Ok(mismatch(DataType::Reference, arg));
        };
        let x = match self.read_at(element, pos)? {
            Token::Null => return Ok(Token::Null),
            Token::Error(e) => return Ok(Token::Error(e)),
            v => match v.as_scalar() {
                Some(Scalar::Number(n)) => *n,
                _ => return Ok(mismatch(DataType::Number, &v)),
            },
        };
        let stats = match self.univariate_over(element, false)? {
            Ok(s) => s,
            Err(e) => return Ok(Token::Error(e)),
        };
        let r = match t {
            Transform::MeanCenter => stats.mean().map(|m| x - m),
            Transform::Normalize => stats.mean().and_then(|m| {
                let sd = stats.std_dev()?;
                divide(x - m, sd)
            }),
            Transform::Scale => stats.min().and_then(|lo| {
                let hi = stats.max()?;
                divide(x - lo, hi - lo)
            }),
        };
        Ok(from_result(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::builtin_catalog;
    use crate::engine::graph::NoExclusion;
    use crate::test_table::TestTable;
    use livetab_parse::compile;

    fn eval_at(t: &TestTable, text: &str, pos: Position) -> Result<Token, Suspension> {
        let mapper = TokenMapper::new(builtin_catalog());
        let (_, postfix) = compile(text, &mapper, t).unwrap();
        let mut ctx = DerivationContext::new();
        Evaluator::new(t, &mapper, &NoExclusion, &mut ctx).evaluate(&postfix, pos)
    }

    fn eval(text: &str) -> Token {
        let t = TestTable::new();
        eval_at(&t, text, Position::default()).unwrap()
    }

    #[test]
    fn precedence_and_unary_minus() {
        assert_eq!(eval("2 + 3 * 4"), Token::number(14.0));
        assert_eq!(eval("(2 + 3) * 4"), Token::number(20.0));
        assert_eq!(eval("-3 + 4"), Token::number(1.0));
        assert_eq!(eval("2 ^ 3"), Token::number(8.0));
    }

    #[test]
    fn errors_are_values() {
        assert_eq!(eval("1 / 0").as_error().unwrap().kind, ErrorKind::DivideByZero);
        assert_eq!(eval("(1 / 0) + 2").as_error().unwrap().kind, ErrorKind::DivideByZero);
        assert_eq!(
            eval("sqrt \"x\"").as_error().unwrap().kind,
            ErrorKind::OperandDataTypeMismatch
        );
        assert_eq!(eval("ln(0 - 1)").as_error().unwrap().kind, ErrorKind::NaN);
    }

    #[test]
    fn nulls_propagate() {
        assert_eq!(eval("null + 1"), Token::Null);
        assert_eq!(eval("-null"), Token::Null);
        assert_eq!(eval("max(1, null, 3)"), Token::number(3.0));
    }

    #[test]
    fn bare_constant_yields_operand() {
        assert_eq!(eval("pi"), Token::number(std::f64::consts::PI));
        assert_eq!(eval("true"), Token::boolean(true));
        assert!(matches!(eval("e"), Token::Operand(_)));
    }

    #[test]
    fn text_and_comparison() {
        assert_eq!(eval("\"a\" + 1"), Token::text("a1"));
        assert_eq!(eval("upper('ab') = 'AB'"), Token::boolean(true));
        assert_eq!(eval("if(2 > 1, 'yes', 'no')"), Token::text("yes"));
        assert_eq!(eval("7 % 3"), Token::number(1.0));
    }

    #[test]
    fn references_read_at_position() {
        let t = TestTable::with_shape(&["a", "b"], 2)
            .with_column_values(0, &[1.0, 2.0])
            .with_column_values(1, &[10.0, 20.0]);
        let pos = Position::at(t.cell(1, 1));
        assert_eq!(eval_at(&t, "a + b", pos).unwrap(), Token::number(22.0));
        assert_eq!(eval_at(&t, "r2 * 2", pos).unwrap(), Token::number(40.0));
        assert_eq!(eval_at(&t, "r1 * 2", pos).unwrap(), Token::number(20.0));
        assert_eq!(eval_at(&t, "ridx() * 100 + cidx()", pos).unwrap(), Token::number(202.0));
        let none = eval_at(&t, "a", Position::default()).unwrap();
        assert_eq!(none.as_error().unwrap().kind, ErrorKind::ReferenceRequired);
        let table = eval_at(&t, "table + 1", pos).unwrap();
        assert_eq!(table.as_error().unwrap().kind, ErrorKind::InvalidTableOperand);
    }

    #[test]
    fn aggregates_over_references() {
        let t = TestTable::with_shape(&["a", "b"], 4)
            .with_column_values(0, &[1.0, 2.0, 3.0, 4.0])
            .with_column_values(1, &[3.0, 5.0, 7.0, 9.0]);
        let pos = Position::at(t.cell(0, 0));
        assert_eq!(eval_at(&t, "sum(a)", pos).unwrap(), Token::number(10.0));
        assert_eq!(eval_at(&t, "median(a)", pos).unwrap(), Token::number(2.5));
        assert_eq!(eval_at(&t, "slope(b, a)", pos).unwrap(), Token::number(2.0));
        assert_eq!(eval_at(&t, "intercept(b, a)", pos).unwrap(), Token::number(1.0));
        assert_eq!(eval_at(&t, "meancenter(a)", pos).unwrap(), Token::number(-1.5));
        assert_eq!(eval_at(&t, "scale(a)", pos).unwrap(), Token::number(0.0));
        // two scalar arguments read at the position instead
        assert_eq!(eval_at(&t, "sum(a, b)", pos).unwrap(), Token::number(4.0));
    }

    #[test]
    fn pending_reads_suspend() {
        let t = TestTable::with_shape(&["a"], 2).with_value(0, 0, 1.0);
        t.set(1, 0, Value::Pending);
        let blocked = eval_at(&t, "a + 1", Position::at(t.cell(1, 0))).unwrap_err();
        assert!(matches!(blocked, Suspension::Blocked { cell } if cell == t.cell(1, 0)));
        let stat = eval_at(&t, "sum(a)", Position::at(t.cell(0, 0))).unwrap_err();
        assert!(matches!(stat, Suspension::BlockedStatistic { ref cells, .. } if cells.len() == 1));
    }

    #[test]
    fn awaiting_resumes_from_frame() {
        use livetab_parse::{Arity, Awaiting, Operator};
        let t = TestTable::new();
        let mut mapper = TokenMapper::new(builtin_catalog());
        mapper
            .register_operator(
                Operator::function("later", Arity::exactly(1)).eval(|_| Err(Awaiting::external())),
            )
            .unwrap();
        let (_, postfix) = compile("1 + later(5) * 2", &mapper, &t).unwrap();
        let mut ctx = DerivationContext::new();
        let mut ev = Evaluator::new(&t, &mapper, &NoExclusion, &mut ctx);
        let Err(Suspension::Awaiting { task, frame }) = ev.evaluate(&postfix, Position::default())
        else {
            panic!("expected a suspension");
        };
        assert!(task.is_none());
        let done = ev.resume(&postfix, Position::default(), frame, Token::number(4.0));
        assert_eq!(done.unwrap(), Token::number(9.0));
    }

    #[test]
    fn stack_shape_errors() {
        let t = TestTable::new();
        let mapper = TokenMapper::new(builtin_catalog());
        let mut ctx = DerivationContext::new();
        let mut ev = Evaluator::new(&t, &mapper, &NoExclusion, &mut ctx);
        let two = EquationStack::from_tokens(
            livetab_parse::Form::Postfix,
            [Token::number(1.0), Token::number(2.0)],
        );
        let r = ev.evaluate(&two, Position::default()).unwrap();
        assert_eq!(r.as_error().unwrap().kind, ErrorKind::StackOverflow);
        let empty = EquationStack::new(livetab_parse::Form::Postfix);
        let r = ev.evaluate(&empty, Position::default()).unwrap();
        assert_eq!(r.as_error().unwrap().kind, ErrorKind::StackUnderflow);
    }
}
