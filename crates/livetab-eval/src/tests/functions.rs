use livetab_common::{DataType, Scalar, Value};
use livetab_parse::{Arity, Operator, ParserStatusCode, RegistrationError, Token};

use crate::engine::{EvalConfig, LiveTable, new_live_table};
use crate::error::DerivationError;
use crate::test_table::TestTable;

fn table(columns: &[&str], rows: usize) -> LiveTable<TestTable> {
    new_live_table(TestTable::with_shape(columns, rows), EvalConfig::default())
}

fn column(t: &LiveTable<TestTable>, i: usize) -> livetab_common::Derivable {
    livetab_common::Derivable::Column(t.store().col(i))
}

/* ─────────────── built-in library ─────────────── */

#[test]
fn math_functions_by_row() {
    let t = table(&["A", "B"], 3);
    for (r, v) in [2.0, -7.5, 10.0].into_iter().enumerate() {
        t.store().set(r, 0, v);
    }
    t.derive(column(&t, 1), "round(abs(A) / 3, 2)").unwrap();
    assert_eq!(
        t.store().column_numbers(1),
        vec![Some(0.67), Some(2.5), Some(3.33)]
    );

    t.derive(column(&t, 1), "mod(A, 4) + pow(2, 3)").unwrap();
    assert_eq!(t.store().get(2, 1), Value::Number(10.0));
}

#[test]
fn sqrt_of_negative_is_nan() {
    let t = table(&["A", "B"], 1);
    t.store().set(0, 0, -4.0);
    t.derive(column(&t, 1), "sqrt(A)").unwrap();
    match t.store().get(0, 1) {
        Value::Error(e) => assert_eq!(e.kind, livetab_common::ErrorKind::NaN),
        other => panic!("expected NaN error, got {other:?}"),
    }
}

#[test]
fn text_functions_and_concatenation() {
    let t = table(&["Name", "Shout", "Tag"], 2);
    t.store().set(0, 0, "  ada ");
    t.store().set(1, 0, "grace");
    t.derive(column(&t, 1), "upper(trim(Name))").unwrap();
    t.derive(column(&t, 2), "concat(Shout, \"#\", ridx())").unwrap();
    assert_eq!(t.store().get(0, 1), Value::Text("ADA".into()));
    assert_eq!(t.store().get(1, 2), Value::Text("GRACE#2".into()));
}

#[test]
fn logical_functions() {
    let t = table(&["A", "B"], 3);
    for (r, v) in [1.0, 5.0, 9.0].into_iter().enumerate() {
        t.store().set(r, 0, v);
    }
    t.derive(column(&t, 1), "if(A > 2 && A < 8, \"mid\", \"edge\")")
        .unwrap();
    assert_eq!(t.store().get(0, 1), Value::Text("edge".into()));
    assert_eq!(t.store().get(1, 1), Value::Text("mid".into()));
    assert_eq!(t.store().get(2, 1), Value::Text("edge".into()));
}

#[test]
fn constants_resolve_case_insensitively() {
    let t = table(&["A"], 1);
    t.derive(column(&t, 0), "round(PI, 4)").unwrap();
    assert_eq!(t.store().get(0, 0), Value::Number(3.1416));
}

/* ─────────────── user registrations ─────────────── */

#[test]
fn user_function_and_constant() {
    let t = table(&["A", "B"], 2);
    t.store().set(0, 0, 10.0);
    t.store().set(1, 0, 20.0);
    t.update_mapper(|m| {
        m.register_constant("rate", Scalar::Number(0.5)).unwrap();
        m.register_operator(
            Operator::function("twice", Arity::exactly(1))
                .arg_types([DataType::Number])
                .eval_now(|args| Token::number(args[0].as_number().unwrap_or(0.0) * 2.0)),
        )
        .unwrap();
    });
    t.derive(column(&t, 1), "twice(A) * rate").unwrap();
    assert_eq!(t.store().column_numbers(1), vec![Some(10.0), Some(20.0)]);
}

#[test]
fn argument_types_are_checked() {
    let t = table(&["A", "B"], 1);
    t.store().set(0, 0, "nine");
    t.derive(column(&t, 1), "abs(A)").unwrap();
    match t.store().get(0, 1) {
        Value::Error(e) => {
            assert_eq!(e.kind, livetab_common::ErrorKind::OperandDataTypeMismatch)
        }
        other => panic!("expected a type mismatch, got {other:?}"),
    }
}

#[test]
fn builtins_are_protected_unless_overridden() {
    let t = table(&["A"], 1);
    let err = t.update_mapper(|m| {
        m.register_operator(Operator::function("upper", Arity::exactly(1)))
            .unwrap_err()
    });
    assert_eq!(err, RegistrationError::ConflictsWithBuiltin("upper".into()));
}

#[test]
fn binary_overload_by_operand_types() {
    let t = table(&["A", "B"], 1);
    t.store().set(0, 0, "ab");
    t.update_mapper(|m| {
        m.register_overload(
            "*",
            (DataType::Text, DataType::Number),
            Operator::binary("repeat", 0).eval_now(|args| {
                let s = args[0].as_scalar().and_then(Scalar::as_text).unwrap_or("");
                let n = args[1].as_number().unwrap_or(0.0).max(0.0) as usize;
                Token::text(s.repeat(n))
            }),
        )
        .unwrap();
    });
    t.derive(column(&t, 1), "A * 3").unwrap();
    assert_eq!(t.store().get(0, 1), Value::Text("ababab".into()));
}

#[test]
fn unknown_names_fail_to_parse() {
    let t = table(&["A", "B"], 1);
    let err = t.derive(column(&t, 1), "nope(A)").unwrap_err();
    assert_eq!(err.status_code(), Some(ParserStatusCode::NoSuchOperator));
    let err = t.derive(column(&t, 1), "A + Q").unwrap_err();
    assert!(matches!(err, DerivationError::Parse(_)));
    assert!(t.derivation_of(column(&t, 1)).is_none());
}
