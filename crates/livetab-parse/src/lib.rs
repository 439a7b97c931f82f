pub mod catalog;
pub mod mapper;
pub mod operator;
pub mod parser;
pub mod postfix;
pub mod stack;
#[cfg(test)]
mod tests;
pub mod token;
pub mod types;

pub use catalog::{OperatorCatalog, core_prefix_symbols, core_symbols};
pub use mapper::{RegisterOptions, RegistrationError, TokenMapper};
pub use operator::{
    Arity, Associativity, Awaiting, BivariateStatistic, BuiltIn, EvalFn, OpResult, Operator,
    OperatorKind, PendingTask, Statistic, Transform, MAX_PRECEDENCE,
};
pub use parser::{InfixParser, is_symbol_char, parse};
pub use postfix::to_postfix;
pub use stack::{EquationStack, Form, ReferenceUse};
pub use token::{OperatorToken, Token};
pub use types::{NoReferences, ParseError, ParserStatusCode, ReferenceResolver};

pub use livetab_common::{DataType, Element, ErrorKind, EvalError, Scalar, Value};

/// Parse `text` and convert it to postfix in one step.
pub fn compile(
    text: &str,
    mapper: &TokenMapper,
    resolver: &dyn ReferenceResolver,
) -> Result<(EquationStack, EquationStack), ParseError> {
    let infix = parse(text, mapper, resolver)?;
    let postfix = to_postfix(&infix)?;
    Ok((infix, postfix))
}
