//! Printing a postfix stack back to infix and re-parsing it must give the
//! same postfix stack.

use std::sync::Arc;

use livetab_parse::{
    Arity, Element, Form, Operator, OperatorCatalog, ReferenceResolver, Scalar, Statistic,
    TokenMapper, compile,
};
use livetab_common::ColumnId;
use proptest::prelude::*;

struct Columns;

impl ReferenceResolver for Columns {
    fn resolve(&self, label: &str) -> Option<Element> {
        match label {
            "x" => Some(Element::Column(ColumnId(0))),
            "y" => Some(Element::Column(ColumnId(1))),
            _ => None,
        }
    }
}

fn mapper() -> TokenMapper {
    let mut cat = OperatorCatalog::with_core_symbols();
    cat.insert(Operator::statistic("max", Statistic::Max));
    cat.insert(Operator::statistic("sum", Statistic::Sum));
    cat.insert(Operator::function("pow", Arity::exactly(2)));
    cat.insert(Operator::unary("sqrt"));
    cat.insert_constant("pi", Scalar::Number(std::f64::consts::PI));
    TokenMapper::new(Arc::new(cat))
}

fn binop() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "+", "-", "*", "/", "^", "%", "<", ">=", "==", "<>", "and", "||",
    ])
}

fn expr() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (0u32..1000).prop_map(|n| n.to_string()),
        (0u32..100, 1u32..100).prop_map(|(a, b)| format!("{a}.{b}")),
        Just("x".to_string()),
        Just("y".to_string()),
        Just("pi".to_string()),
        Just("true".to_string()),
        Just("'t''s'".to_string()),
    ];
    leaf.prop_recursive(5, 48, 4, |inner| {
        prop_oneof![
            (inner.clone(), binop(), inner.clone()).prop_map(|(l, op, r)| format!("{l} {op} {r}")),
            inner.clone().prop_map(|e| format!("({e})")),
            inner.clone().prop_map(|e| format!("-{e}")),
            inner.clone().prop_map(|e| format!("not {e}")),
            inner.clone().prop_map(|e| format!("sqrt {e}")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("pow({a}, {b})")),
            prop::collection::vec(inner, 1..4).prop_map(|v| format!("max({})", v.join(", "))),
        ]
    })
}

proptest! {
    #[test]
    fn infix_postfix_infix_is_stable(text in expr()) {
        let m = mapper();
        let (_, postfix) = compile(&text, &m, &Columns).expect("generated text parses");
        let printed = postfix.to_expression(Form::Infix);
        let (_, again) = compile(&printed, &m, &Columns)
            .unwrap_or_else(|e| panic!("{printed:?} (from {text:?}) failed: {e}"));
        prop_assert_eq!(&postfix, &again, "{} -> {}", text, printed);
    }
}

#[test]
fn aggregate_over_reference_prints_call_form() {
    let m = mapper();
    let (_, postfix) = compile("sum(x) / max(x, y, 2)", &m, &Columns).unwrap();
    assert_eq!(postfix.to_expression(Form::Infix), "sum(x) / max(x, y, 2)");
}
