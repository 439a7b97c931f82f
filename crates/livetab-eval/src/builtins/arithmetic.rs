use std::cmp::Ordering;

use livetab_common::{EvalError, Scalar};
use livetab_parse::{OperatorCatalog, Token, core_prefix_symbols};

use super::core_symbol;
use super::utils::{finish, num_arg, numeric2};

/* ─────────────────────────── arithmetic ────────────────────────── */

pub fn divide(x: f64, y: f64) -> Result<f64, EvalError> {
    if y == 0.0 {
        return Err(EvalError::div_by_zero());
    }
    Ok(x / y)
}

/// Floored modulo: the result takes the sign of the divisor.
pub fn modulo(x: f64, y: f64) -> Result<f64, EvalError> {
    if y == 0.0 {
        return Err(EvalError::div_by_zero());
    }
    Ok(x - y * (x / y).floor())
}

fn power(x: f64, y: f64) -> Result<f64, EvalError> {
    if x == 0.0 && y < 0.0 {
        return Err(EvalError::div_by_zero());
    }
    Ok(x.powf(y))
}

/// `+` on two operands: numeric addition, or concatenation when either side
/// is text.
pub fn add(args: &[Token]) -> Token {
    match (args.first().and_then(Token::as_scalar), args.get(1).and_then(Token::as_scalar)) {
        (Some(a @ Scalar::Text(_)), Some(b)) | (Some(a), Some(b @ Scalar::Text(_))) => {
            Token::text(format!("{a}{b}"))
        }
        _ => match (num_arg(args, 0), num_arg(args, 1)) {
            (Ok(x), Ok(y)) => finish(x + y),
            (Err(e), _) | (_, Err(e)) => Token::Error(e),
        },
    }
}

/* ─────────────────────────── comparison ────────────────────────── */

/// Order two scalars. Numbers and booleans compare numerically, text
/// compares case-insensitively; mixed text and number do not compare.
pub fn compare(a: &Scalar, b: &Scalar) -> Option<Ordering> {
    match (a, b) {
        (Scalar::Text(x), Scalar::Text(y)) => Some(x.to_lowercase().cmp(&y.to_lowercase())),
        (Scalar::Text(_), _) | (_, Scalar::Text(_)) => None,
        _ => a.as_number()?.partial_cmp(&b.as_number()?),
    }
}

fn comparison(
    test: fn(Option<Ordering>) -> Option<bool>,
) -> impl Fn(&[Token]) -> Token + Send + Sync + 'static {
    move |args| {
        let (Some(a), Some(b)) = (
            args.first().and_then(Token::as_scalar),
            args.get(1).and_then(Token::as_scalar),
        ) else {
            return Token::error(livetab_common::ErrorKind::OperandRequired);
        };
        match test(compare(a, b)) {
            Some(r) => Token::boolean(r),
            None => Token::Error(
                EvalError::type_mismatch()
                    .with_message(format!("cannot order {} and {}", a.data_type(), b.data_type())),
            ),
        }
    }
}

pub fn register_builtins(cat: &mut OperatorCatalog) {
    type Numeric = fn(f64, f64) -> Result<f64, EvalError>;
    let numeric: [(&str, Numeric); 5] = [
        ("-", |x, y| Ok(x - y)),
        ("*", |x, y| Ok(x * y)),
        ("/", divide),
        ("%", modulo),
        ("^", power),
    ];
    for (label, f) in numeric {
        if let Some(op) = core_symbol(label) {
            cat.insert(op.eval_now(numeric2(f)));
        }
    }
    if let Some(op) = core_symbol("+") {
        cat.insert(op.eval_now(add));
    }

    type Test = fn(Option<Ordering>) -> Option<bool>;
    let eq: Test = |o| Some(o == Some(Ordering::Equal));
    let ne: Test = |o| Some(o != Some(Ordering::Equal));
    let ordered: [(&str, Test); 8] = [
        ("=", eq),
        ("==", eq),
        ("!=", ne),
        ("<>", ne),
        ("<", |o| o.map(Ordering::is_lt)),
        ("<=", |o| o.map(Ordering::is_le)),
        (">", |o| o.map(Ordering::is_gt)),
        (">=", |o| o.map(Ordering::is_ge)),
    ];
    for (label, test) in ordered {
        if let Some(op) = core_symbol(label) {
            cat.insert(op.eval_now(comparison(test)));
        }
    }

    for op in core_prefix_symbols() {
        let sign = if op.label() == "-" { -1.0 } else { 1.0 };
        let op = op.eval_now(move |args| match num_arg(args, 0) {
            Ok(x) => finish(sign * x),
            Err(e) => Token::Error(e),
        });
        cat.insert_prefix(op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livetab_common::ErrorKind;

    #[test]
    fn modulo_follows_divisor_sign() {
        assert_eq!(modulo(7.0, 3.0).unwrap(), 1.0);
        assert_eq!(modulo(-7.0, 3.0).unwrap(), 2.0);
        assert_eq!(modulo(7.0, -3.0).unwrap(), -2.0);
        assert_eq!(modulo(1.0, 0.0).unwrap_err().kind, ErrorKind::DivideByZero);
    }

    #[test]
    fn add_concatenates_text() {
        assert_eq!(add(&[Token::text("a"), Token::number(1.0)]), Token::text("a1"));
        assert_eq!(add(&[Token::number(2.0), Token::boolean(true)]), Token::number(3.0));
    }

    #[test]
    fn mixed_comparison_is_type_mismatch() {
        assert_eq!(compare(&Scalar::from("a"), &Scalar::from(1.0)), None);
        assert_eq!(
            compare(&Scalar::from("Abc"), &Scalar::from("abc")),
            Some(Ordering::Equal)
        );
        let lt = comparison(|o: Option<Ordering>| o.map(Ordering::is_lt));
        assert!(lt(&[Token::text("a"), Token::number(1.0)]).is_error());
        assert_eq!(lt(&[Token::number(1.0), Token::number(2.0)]), Token::boolean(true));
    }
}
