use livetab_common::{ErrorKind, EvalError, Scalar};
use livetab_parse::Token;

/// Wrap a numeric result, mapping NaN to a `NaN` error token.
pub fn finish(n: f64) -> Token {
    if n.is_nan() {
        Token::error(ErrorKind::NaN)
    } else {
        Token::number(n)
    }
}

pub fn from_result(r: Result<f64, EvalError>) -> Token {
    match r {
        Ok(n) => finish(n),
        Err(e) => Token::Error(e),
    }
}

/// Numeric view of argument `i`; booleans count as 0/1.
pub fn num_arg(args: &[Token], i: usize) -> Result<f64, EvalError> {
    let t = args
        .get(i)
        .ok_or_else(|| EvalError::new(ErrorKind::OperandRequired))?;
    t.as_number().ok_or_else(|| {
        EvalError::type_mismatch().with_message(format!("expected a number, got '{t}'"))
    })
}

pub fn text_arg(args: &[Token], i: usize) -> Result<String, EvalError> {
    match args.get(i).and_then(Token::as_scalar) {
        Some(Scalar::Text(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(EvalError::new(ErrorKind::OperandRequired)),
    }
}

pub fn bool_arg(args: &[Token], i: usize) -> Result<bool, EvalError> {
    args.get(i)
        .and_then(Token::as_scalar)
        .map(Scalar::is_truthy)
        .ok_or_else(|| EvalError::new(ErrorKind::OperandRequired))
}

/// Callback for a one-argument numeric function.
pub fn numeric1(f: fn(f64) -> f64) -> impl Fn(&[Token]) -> Token + Send + Sync + 'static {
    move |args| match num_arg(args, 0) {
        Ok(x) => finish(f(x)),
        Err(e) => Token::Error(e),
    }
}

/// Callback for a two-argument numeric function.
pub fn numeric2(
    f: fn(f64, f64) -> Result<f64, EvalError>,
) -> impl Fn(&[Token]) -> Token + Send + Sync + 'static {
    move |args| match (num_arg(args, 0), num_arg(args, 1)) {
        (Ok(x), Ok(y)) => from_result(f(x, y)),
        (Err(e), _) | (_, Err(e)) => Token::Error(e),
    }
}
