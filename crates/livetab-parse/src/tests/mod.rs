mod parser;
mod stack;

use std::f64::consts::PI;
use std::sync::Arc;

use livetab_common::{ColumnId, Element, RowId, Scalar};

use crate::{
    Arity, BivariateStatistic, BuiltIn, EquationStack, Form, Operator, OperatorCatalog,
    ParseError, ReferenceResolver, Statistic, TokenMapper, compile,
};

/// Syntax symbols plus a handful of call-style operators, no evaluators.
pub(crate) fn mapper() -> TokenMapper {
    let mut cat = OperatorCatalog::with_core_symbols();
    cat.insert(Operator::statistic("max", Statistic::Max));
    cat.insert(Operator::statistic("sum", Statistic::Sum));
    cat.insert(Operator::bivariate("covar", BivariateStatistic::Covariance));
    cat.insert(Operator::function("pow", Arity::exactly(2)));
    cat.insert(Operator::function("if", Arity::exactly(3)));
    cat.insert(Operator::function("now", Arity::exactly(0)));
    cat.insert(Operator::unary("sqrt"));
    cat.insert(Operator::built_in("ridx", BuiltIn::RowIndex));
    cat.insert_constant("pi", Scalar::Number(PI));
    TokenMapper::new(Arc::new(cat))
}

/// `a`, `b`, `price` are columns 0..=2, `r1` is row 0.
pub(crate) struct Labels;

impl ReferenceResolver for Labels {
    fn resolve(&self, label: &str) -> Option<Element> {
        match label.to_ascii_lowercase().as_str() {
            "a" => Some(Element::Column(ColumnId(0))),
            "b" => Some(Element::Column(ColumnId(1))),
            "price" => Some(Element::Column(ColumnId(2))),
            "r1" => Some(Element::Row(RowId(0))),
            _ => None,
        }
    }

    fn resolve_qualified(&self, table: &str, label: &str) -> Option<Element> {
        (table.eq_ignore_ascii_case("other") && label.eq_ignore_ascii_case("a"))
            .then_some(Element::Column(ColumnId(9)))
    }
}

pub(crate) fn compiled(text: &str) -> Result<(EquationStack, EquationStack), ParseError> {
    compile(text, &mapper(), &Labels)
}

/// Postfix rendering of `text`, panicking on parse failure.
pub(crate) fn rpn(text: &str) -> String {
    match compiled(text) {
        Ok((_, postfix)) => postfix.to_expression(Form::Postfix),
        Err(e) => panic!("{text:?} failed to parse: {e}"),
    }
}
