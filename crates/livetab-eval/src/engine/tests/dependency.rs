//! Recalculation order, scoping and governance.
use std::sync::atomic::Ordering;

use livetab_common::{ErrorKind, Value};

use super::common::*;
use crate::error::DerivationError;

#[test]
fn chain_follows_dependency_order() {
    let t = live(&["A", "B", "C"], 3);
    seed(&t, 0, &[1.0, 2.0, 3.0]);
    t.derive(column(&t, 1), "A * 2").unwrap();
    t.derive(column(&t, 2), "B + 1").unwrap();
    assert_eq!(numbers(&t, 1), vec![Some(2.0), Some(4.0), Some(6.0)]);
    assert_eq!(numbers(&t, 2), vec![Some(3.0), Some(5.0), Some(7.0)]);

    edit(&t, 1, 0, 10.0);
    assert_eq!(numbers(&t, 1), vec![Some(2.0), Some(20.0), Some(6.0)]);
    assert_eq!(numbers(&t, 2), vec![Some(3.0), Some(21.0), Some(7.0)]);
}

#[test]
fn repeated_recalculation_is_a_fixed_point() {
    let t = live(&["A", "B", "C"], 3);
    seed(&t, 0, &[1.5, -2.0, 4.0]);
    t.derive(column(&t, 1), "A ^ 2").unwrap();
    t.derive(column(&t, 2), "B - A").unwrap();
    edit(&t, 2, 0, 3.0);
    let b = numbers(&t, 1);
    let c = numbers(&t, 2);
    for _ in 0..3 {
        t.recalculate(column(&t, 1)).unwrap();
        t.recalculate(column(&t, 2)).unwrap();
        assert_eq!(numbers(&t, 1), b);
        assert_eq!(numbers(&t, 2), c);
    }
    assert_eq!(c, vec![Some(0.75), Some(6.0), Some(6.0)]);
}

#[test]
fn single_cell_edit_recomputes_one_cell() {
    let t = live(&["A", "B"], 3);
    seed(&t, 0, &[1.0, 2.0, 3.0]);
    let calls = register_counter(&t);
    t.derive(column(&t, 1), "tick(A)").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    edit(&t, 0, 0, 7.0);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(value(&t, 0, 1), Value::Number(7.0));

    // an edit that changes nothing cascades nowhere
    let k = t.store().cell(0, 0);
    assert!(!t.set_value(k.row, k.col, 7.0).unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn cell_derivation_governs_over_column() {
    let t = live(&["A", "B"], 3);
    seed(&t, 0, &[1.0, 2.0, 3.0]);
    t.derive(column(&t, 1), "A * 2").unwrap();
    t.derive(cell(&t, 1, 1), "100").unwrap();
    assert_eq!(numbers(&t, 1), vec![Some(2.0), Some(100.0), Some(6.0)]);

    edit(&t, 1, 0, 5.0);
    assert_eq!(value(&t, 1, 1), Value::Number(100.0));

    t.clear_derivation(cell(&t, 1, 1)).unwrap();
    assert_eq!(value(&t, 1, 1), Value::Number(10.0));
    assert!(t.derivation_of(cell(&t, 1, 1)).is_none());
}

#[test]
fn clearing_a_column_keeps_its_values() {
    let t = live(&["A", "B"], 2);
    seed(&t, 0, &[1.0, 2.0]);
    t.derive(column(&t, 1), "A + 1").unwrap();
    t.clear_derivation(column(&t, 1)).unwrap();
    edit(&t, 0, 0, 50.0);
    assert_eq!(numbers(&t, 1), vec![Some(2.0), Some(3.0)]);
    assert_eq!(
        t.clear_derivation(column(&t, 1)),
        Err(DerivationError::NoDerivation(column(&t, 1)))
    );
}

#[test]
fn row_derivation_reads_rows_positionally() {
    let t = live(&["A", "B"], 3);
    seed(&t, 0, &[1.0, 2.0]);
    seed(&t, 1, &[10.0, 20.0]);
    t.derive(row(&t, 2), "r1 + r2").unwrap();
    assert_eq!(value(&t, 2, 0), Value::Number(3.0));
    assert_eq!(value(&t, 2, 1), Value::Number(30.0));

    edit(&t, 0, 1, 11.0);
    assert_eq!(value(&t, 2, 1), Value::Number(31.0));
    assert_eq!(value(&t, 2, 0), Value::Number(3.0));
}

#[test]
fn errors_flow_downstream_as_values() {
    let t = live(&["A", "B", "C"], 2);
    seed(&t, 0, &[2.0, 0.0]);
    t.derive(column(&t, 1), "1 / A").unwrap();
    t.derive(column(&t, 2), "B + 1").unwrap();
    assert_eq!(value(&t, 0, 2), Value::Number(1.5));
    match value(&t, 1, 2) {
        Value::Error(e) => assert_eq!(e.kind, ErrorKind::DivideByZero),
        other => panic!("expected an error, got {other:?}"),
    }
    edit(&t, 1, 0, 4.0);
    assert_eq!(value(&t, 1, 2), Value::Number(1.25));
}

#[test]
fn deleting_a_row_recomputes_aggregates() {
    let t = live(&["A", "B"], 4);
    seed(&t, 0, &[1.0, 2.0, 3.0, 4.0]);
    t.derive(cell(&t, 0, 1), "sum(A)").unwrap();
    assert_eq!(value(&t, 0, 1), Value::Number(10.0));
    t.delete_row(t.store().row(3)).unwrap();
    assert_eq!(value(&t, 0, 1), Value::Number(6.0));
}

#[test]
fn deleting_a_read_column_turns_readers_into_errors() {
    let t = live(&["A", "B", "C"], 2);
    seed(&t, 0, &[1.0, 2.0]);
    seed(&t, 1, &[1.0, 1.0]);
    t.derive(column(&t, 2), "A + B").unwrap();
    let a = t.store().col(0);
    t.delete_column(a).unwrap();
    // C is now at position 1
    match t.store().get(0, 1) {
        Value::Error(e) => assert_eq!(e.kind, ErrorKind::InvalidOperand),
        other => panic!("expected an error, got {other:?}"),
    }
    assert!(t.delete_column(a).is_err());
}

#[test]
fn deleting_a_derived_column_drops_its_derivation() {
    let t = live(&["A", "B"], 2);
    t.derive(column(&t, 1), "A * 2").unwrap();
    let target = column(&t, 1);
    t.delete_column(t.store().col(1)).unwrap();
    assert!(t.derivation_of(target).is_none());
    assert!(t.derivations().is_empty());
}

#[test]
fn failed_derivations_install_nothing() {
    let t = live(&["A", "B"], 2);
    let err = t.derive(column(&t, 1), "1 +").unwrap_err();
    assert!(matches!(err, DerivationError::Parse(_)));
    assert!(err.status_code().is_some());
    assert!(t.derivation_of(column(&t, 1)).is_none());
    assert_eq!(
        t.recalculate(column(&t, 1)),
        Err(DerivationError::NoDerivation(column(&t, 1)))
    );
}

#[test]
fn precision_rounds_written_values() {
    let t = live(&["A", "B", "C"], 1);
    seed(&t, 0, &[1.0]);
    let d = t.derive_with_precision(column(&t, 1), "A / 3", Some(2)).unwrap();
    assert_eq!(d.precision(), Some(2));
    assert_eq!(d.as_entered(), "A / 3");
    assert_eq!(value(&t, 0, 1), Value::Number(0.33));
    t.derive(column(&t, 2), "A / 3").unwrap();
    assert_eq!(value(&t, 0, 2), Value::Number(1.0 / 3.0));
}
