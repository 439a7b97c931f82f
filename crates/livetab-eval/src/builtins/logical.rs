use livetab_common::{DataType, ErrorKind};
use livetab_parse::{Arity, Operator, OperatorCatalog, Token};

use super::core_symbol;
use super::utils::bool_arg;

fn both(args: &[Token], f: fn(bool, bool) -> bool) -> Token {
    match (bool_arg(args, 0), bool_arg(args, 1)) {
        (Ok(a), Ok(b)) => Token::boolean(f(a, b)),
        (Err(e), _) | (_, Err(e)) => Token::Error(e),
    }
}

fn negate(args: &[Token]) -> Token {
    match bool_arg(args, 0) {
        Ok(a) => Token::boolean(!a),
        Err(e) => Token::Error(e),
    }
}

/// `if(cond, then, else)`. Both branches are already evaluated.
fn choose(args: &[Token]) -> Token {
    let branch = match bool_arg(args, 0) {
        Ok(true) => 1,
        Ok(false) => 2,
        Err(e) => return Token::Error(e),
    };
    args.get(branch)
        .cloned()
        .unwrap_or_else(|| Token::error(ErrorKind::OperandRequired))
}

pub fn register_builtins(cat: &mut OperatorCatalog) {
    for label in ["||", "or"] {
        if let Some(op) = core_symbol(label) {
            cat.insert(op.eval_now(|a| both(a, |x, y| x || y)));
        }
    }
    for label in ["&&", "and"] {
        if let Some(op) = core_symbol(label) {
            cat.insert(op.eval_now(|a| both(a, |x, y| x && y)));
        }
    }
    for label in ["!", "not"] {
        if let Some(op) = core_symbol(label) {
            cat.insert(op.eval_now(negate));
        }
    }
    cat.insert(
        Operator::function("if", Arity::exactly(3))
            .arg_types([DataType::Any])
            .category("Logical")
            .describe("if(condition, when_true, when_false)")
            .eval_now(choose),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_drives_logic() {
        assert_eq!(
            both(&[Token::number(2.0), Token::text("")], |x, y| x || y),
            Token::boolean(true)
        );
        assert_eq!(negate(&[Token::number(0.0)]), Token::boolean(true));
        assert_eq!(
            choose(&[Token::boolean(false), Token::number(1.0), Token::number(2.0)]),
            Token::number(2.0)
        );
    }
}
