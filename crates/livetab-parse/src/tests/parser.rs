use super::{Labels, compiled, mapper};
use crate::{Element, ParserStatusCode as Code, Scalar, Token, parse};
use livetab_common::ColumnId;

fn code(text: &str) -> (Code, usize) {
    match compiled(text) {
        Ok(_) => panic!("{text:?} unexpectedly parsed"),
        Err(e) => (e.code, e.position),
    }
}

#[test]
fn unary_minus_at_leading_position() {
    let infix = parse("-3 + 4", &mapper(), &Labels).unwrap();
    let ops: Vec<_> = infix
        .iter()
        .filter_map(|t| t.as_operator().map(|o| o.kind()))
        .collect();
    assert_eq!(
        ops,
        vec![crate::OperatorKind::Unary, crate::OperatorKind::Binary]
    );
    assert!(compiled("2 - -3").is_ok());
    assert!(compiled("(-3)").is_ok());
    assert!(compiled("max(-1, 2)").is_ok());
}

#[test]
fn numeric_literals() {
    let infix = parse("1.5e-3 + .25 + 2E2", &mapper(), &Labels).unwrap();
    let nums: Vec<f64> = infix.iter().filter_map(Token::as_number).collect();
    assert_eq!(nums, vec![0.0015, 0.25, 200.0]);

    assert_eq!(code("1e").0, Code::InvalidNumericExpression);
    assert_eq!(code("1e+ 2").0, Code::InvalidNumericExpression);
    assert_eq!(code("1.2.3"), (Code::InvalidNumericExpression, 3));
    assert_eq!(code("12abc").0, Code::InvalidNumericExpression);
}

#[test]
fn quoted_text_with_doubled_quotes() {
    let infix = parse(r#"'it''s' + "say ""hi""""#, &mapper(), &Labels).unwrap();
    let texts: Vec<&str> = infix
        .iter()
        .filter_map(|t| t.as_scalar().and_then(Scalar::as_text))
        .collect();
    assert_eq!(texts, vec!["it's", r#"say "hi""#]);
    assert_eq!(code("'abc"), (Code::SingletonQuote, 0));
    assert_eq!(code(r#"1 + "abc"#), (Code::SingletonQuote, 4));
}

#[test]
fn empty_and_paren_errors() {
    assert_eq!(code("").0, Code::EmptyExpression);
    assert_eq!(code("   ").0, Code::EmptyExpression);
    assert_eq!(code("(1 + 2").0, Code::ParenMismatch);
    assert_eq!(code("1 + 2)"), (Code::ParenMismatch, 5));
    assert_eq!(code("()").0, Code::InvalidExpression);
}

#[test]
fn comma_validity() {
    assert!(compiled("max(1, 2)").is_ok());
    assert!(compiled("max(1, 2, 3, 4)").is_ok());
    assert!(compiled("pow(2, max(1, 2))").is_ok());
    assert_eq!(code("1, 2"), (Code::InvalidCommaLocation, 1));
    assert_eq!(code("(1, 2)"), (Code::InvalidCommaLocation, 2));
    assert_eq!(code("pow(1, 2, 3)"), (Code::InvalidCommaLocation, 8));
    assert_eq!(code("sqrt(1, 2)").0, Code::InvalidCommaLocation);
    assert_eq!(code("max(, 1)").0, Code::InvalidCommaLocation);
    assert_eq!(code("pow(1, (2, 3))").0, Code::InvalidCommaLocation);
}

#[test]
fn operator_and_operand_locations() {
    assert_eq!(code("* 2"), (Code::InvalidOperatorLocation, 0));
    assert_eq!(code("2 3"), (Code::InvalidOperandLocation, 2));
    assert_eq!(code("a b").0, Code::InvalidOperandLocation);
    assert_eq!(code("2 not true").0, Code::InvalidOperatorLocation);
    assert_eq!(code("1 +").0, Code::InvalidExpression);
    assert_eq!(code("max(1,)").0, Code::InvalidExpression);
}

#[test]
fn call_syntax_and_arity() {
    assert_eq!(code("max 1").0, Code::InvalidExpression);
    assert_eq!(code("pow(1)").0, Code::InvalidExpression);
    assert_eq!(code("max()").0, Code::InvalidExpression);
    assert!(compiled("now()").is_ok());
    assert!(compiled("sqrt 16").is_ok());
    assert!(compiled("sqrt(16)").is_ok());
    assert!(compiled("ridx + ridx()").is_ok());
    assert_eq!(code("ridx(1)").0, Code::InvalidExpression);
}

#[test]
fn unknown_identifiers() {
    assert_eq!(code("foo(1)"), (Code::NoSuchOperator, 0));
    assert_eq!(code("1 + foo"), (Code::InvalidOperand, 4));
    assert_eq!(code("1 $ 2"), (Code::NoSuchOperator, 2));
    assert_eq!(code("1 ; 2").0, Code::InvalidExpression);
}

#[test]
fn references_and_constants_are_case_insensitive() {
    let infix = parse("PRICE * Pi + NULL", &mapper(), &Labels).unwrap();
    assert_eq!(infix.references(), vec![Element::Column(ColumnId(2))]);
    assert!(infix.iter().any(|t| matches!(t, Token::Constant { .. })));
    assert!(infix.iter().any(Token::is_null));
}

#[test]
fn qualified_references() {
    let infix = parse("other::a + 1", &mapper(), &Labels).unwrap();
    assert_eq!(infix.references(), vec![Element::Column(ColumnId(9))]);
    assert_eq!(infix.to_string(), "other::a + 1");
    assert_eq!(code("elsewhere::a"), (Code::InvalidOperand, 0));
    assert_eq!(code("other::1").0, Code::InvalidColumnReference);
}

#[test]
fn longest_symbol_wins() {
    let infix = parse("1 <= -2", &mapper(), &Labels).unwrap();
    let labels: Vec<_> = infix
        .iter()
        .filter_map(|t| t.as_operator().map(|o| o.label().to_string()))
        .collect();
    assert_eq!(labels, vec!["<=", "-"]);
    assert!(compiled("1 <> 2 || !(a == b)").is_ok());
}
