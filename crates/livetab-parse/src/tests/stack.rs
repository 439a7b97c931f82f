use super::{compiled, rpn};
use crate::{Element, Form, ReferenceUse};
use livetab_common::{ColumnId, RowId};

fn infix_of(text: &str) -> String {
    compiled(text).unwrap().1.to_expression(Form::Infix)
}

#[test]
fn postfix_replays_to_minimal_infix() {
    assert_eq!(infix_of("((2 + 3)) * 4"), "(2 + 3) * 4");
    assert_eq!(infix_of("2 + (3 * 4)"), "2 + 3 * 4");
    assert_eq!(infix_of("1 - (2 - 3)"), "1 - (2 - 3)");
    assert_eq!(infix_of("(1 - 2) - 3"), "1 - 2 - 3");
    assert_eq!(infix_of("-(2 ^ 2)"), "-(2 ^ 2)");
    assert_eq!(infix_of("sqrt 16 + 1"), "sqrt(16) + 1");
    assert_eq!(infix_of("max(a, b) / ridx"), "max(a, b) / ridx()");
    assert_eq!(infix_of("- -3"), "- -3");
}

#[test]
fn infix_printing_keeps_written_order() {
    let (infix, _) = compiled("max( 1,2 )+-a").unwrap();
    assert_eq!(infix.to_expression(Form::Infix), "max(1, 2) + -a");
    assert_eq!(infix.to_expression(Form::Postfix), rpn("max(1,2)+-a"));
}

#[test]
fn reference_uses_separate_aggregate_reads() {
    let (_, postfix) = compiled("a - sum(a) + max(b, 1) * covar(price, r1)").unwrap();
    let uses = postfix.reference_uses();
    let col = |i| Element::Column(ColumnId(i));
    assert_eq!(
        uses,
        vec![
            ReferenceUse { element: col(0), aggregate: true },
            ReferenceUse { element: col(0), aggregate: false },
            ReferenceUse { element: col(1), aggregate: false },
            ReferenceUse { element: col(2), aggregate: true },
            ReferenceUse { element: Element::Row(RowId(0)), aggregate: true },
        ]
    );
}
