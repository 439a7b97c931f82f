use livetab_common::{DataType, EvalError, Scalar};
use livetab_parse::{Arity, Operator, OperatorCatalog, Token};

use super::arithmetic::modulo;
use super::utils::{finish, num_arg, numeric1, numeric2};

/* ─────────────────────────── unary prefix ────────────────────────── */

fn ln(x: f64) -> f64 {
    if x <= 0.0 { f64::NAN } else { x.ln() }
}

fn log10(x: f64) -> f64 {
    if x <= 0.0 { f64::NAN } else { x.log10() }
}

fn sign(x: f64) -> f64 {
    if x == 0.0 { 0.0 } else { x.signum() }
}

/* ─────────────────────────── functions ────────────────────────── */

fn round(args: &[Token]) -> Token {
    let x = match num_arg(args, 0) {
        Ok(x) => x,
        Err(e) => return Token::Error(e),
    };
    let digits = match args.len() {
        1 => 0.0,
        _ => match num_arg(args, 1) {
            Ok(d) => d.trunc(),
            Err(e) => return Token::Error(e),
        },
    };
    if digits >= 0.0 {
        let factor = 10f64.powf(digits);
        finish((x * factor).round() / factor)
    } else {
        let factor = 10f64.powf(-digits);
        finish((x / factor).round() * factor)
    }
}

pub fn register_builtins(cat: &mut OperatorCatalog) {
    let unary: [(&str, fn(f64) -> f64); 15] = [
        ("abs", f64::abs),
        ("sqrt", f64::sqrt),
        ("exp", f64::exp),
        ("ln", ln),
        ("log10", log10),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("ceil", f64::ceil),
        ("floor", f64::floor),
        ("trunc", f64::trunc),
        ("sign", sign),
    ];
    for (label, f) in unary {
        cat.insert(
            Operator::unary(label)
                .arg_types([DataType::Number])
                .returns(DataType::Number)
                .category("Math")
                .eval_now(numeric1(f)),
        );
    }

    let binary: [(&str, fn(f64, f64) -> Result<f64, EvalError>); 4] = [
        ("pow", |x, y| Ok(x.powf(y))),
        ("atan2", |y, x| Ok(y.atan2(x))),
        ("mod", modulo),
        ("hypot", |x, y| Ok(x.hypot(y))),
    ];
    for (label, f) in binary {
        cat.insert(
            Operator::function(label, Arity::exactly(2))
                .arg_types([DataType::Number])
                .returns(DataType::Number)
                .category("Math")
                .eval_now(numeric2(f)),
        );
    }
    cat.insert(
        Operator::function("round", Arity::between(1, 2))
            .arg_types([DataType::Number])
            .returns(DataType::Number)
            .category("Math")
            .describe("round(x, digits = 0), half away from zero")
            .eval_now(round),
    );

    cat.insert_constant("pi", Scalar::Number(std::f64::consts::PI));
    cat.insert_constant("e", Scalar::Number(std::f64::consts::E));
}
