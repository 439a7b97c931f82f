//! Aggregates over elements: exclusion, scoping and cached engines.
use livetab_common::Value;

use super::common::*;

fn approx(v: Value, want: f64) {
    match v.as_number() {
        Some(n) => assert!((n - want).abs() < 1e-9, "got {n}, want {want}"),
        None => panic!("expected a number, got {v:?}"),
    }
}

#[test]
fn total_cell_excludes_itself() {
    let t = live(&["A"], 4);
    seed(&t, 0, &[1.0, 2.0, 3.0]);
    t.derive(cell(&t, 3, 0), "sum(A)").unwrap();
    assert_eq!(value(&t, 3, 0), Value::Number(6.0));
    edit(&t, 0, 0, 10.0);
    assert_eq!(value(&t, 3, 0), Value::Number(15.0));
}

#[test]
fn cells_feeding_their_own_aggregate_are_skipped() {
    let t = live(&["A", "B"], 3);
    seed(&t, 1, &[5.0, 7.0]);
    t.derive(cell(&t, 2, 1), "sum(B) + mean(B)").unwrap();
    assert_eq!(value(&t, 2, 1), Value::Number(18.0));
}

#[test]
fn aggregate_change_recomputes_the_whole_slice() {
    let t = live(&["A", "B"], 3);
    seed(&t, 0, &[1.0, 2.0, 3.0]);
    t.derive(column(&t, 1), "A - mean(A)").unwrap();
    assert_eq!(numbers(&t, 1), vec![Some(-1.0), Some(0.0), Some(1.0)]);
    edit(&t, 0, 0, 4.0);
    assert_eq!(numbers(&t, 1), vec![Some(1.0), Some(-1.0), Some(0.0)]);
}

#[test]
fn transforms_use_the_current_cell() {
    let t = live(&["A", "B", "C", "D"], 4);
    seed(&t, 0, &[1.0, 2.0, 3.0, 4.0]);
    t.derive(column(&t, 1), "normalize(A)").unwrap();
    t.derive(column(&t, 2), "scale(A)").unwrap();
    t.derive(column(&t, 3), "meancenter(A)").unwrap();
    let sd = (5.0f64 / 3.0).sqrt();
    approx(value(&t, 0, 1), -1.5 / sd);
    approx(value(&t, 3, 1), 1.5 / sd);
    approx(value(&t, 1, 2), 1.0 / 3.0);
    approx(value(&t, 3, 2), 1.0);
    approx(value(&t, 2, 3), 0.5);
}

#[test]
fn two_variable_statistics_pair_by_position() {
    let t = live(&["A", "B", "C"], 4);
    seed(&t, 0, &[1.0, 2.0, 3.0, 4.0]);
    seed(&t, 1, &[3.0, 5.0, 7.0, 9.0]);
    t.derive(cell(&t, 0, 2), "slope(B, A)").unwrap();
    t.derive(cell(&t, 1, 2), "intercept(B, A)").unwrap();
    t.derive(cell(&t, 2, 2), "correl(A, B)").unwrap();
    approx(value(&t, 0, 2), 2.0);
    approx(value(&t, 1, 2), 1.0);
    approx(value(&t, 2, 2), 1.0);

    edit(&t, 3, 1, 11.0);
    approx(value(&t, 0, 2), 2.6);
}

#[test]
fn subset_aggregates_ignore_edits_outside() {
    let t = live(&["A", "B"], 4);
    seed(&t, 0, &[1.0, 2.0, 3.0, 4.0]);
    let s = t.store();
    s.add_subset("top", vec![s.row(0), s.row(1)], vec![s.col(0)]);
    let calls = register_counter(&t);
    t.derive(cell(&t, 3, 1), "tick(sum(top))").unwrap();
    assert_eq!(value(&t, 3, 1), Value::Number(3.0));

    edit(&t, 2, 0, 100.0);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    edit(&t, 0, 0, 10.0);
    assert_eq!(value(&t, 3, 1), Value::Number(12.0));
}

#[test]
fn scalar_statistics_read_at_the_position() {
    let t = live(&["A", "B"], 2);
    seed(&t, 0, &[1.0, 9.0]);
    t.derive(column(&t, 1), "max(A, 5)").unwrap();
    assert_eq!(numbers(&t, 1), vec![Some(5.0), Some(9.0)]);
}

#[test]
fn non_numeric_cells_are_skipped() {
    let t = live(&["A", "B"], 3);
    seed(&t, 0, &[1.0]);
    t.store().set(1, 0, "x");
    t.store().set(2, 0, 3.0);
    t.derive(cell(&t, 0, 1), "sum(A)").unwrap();
    t.derive(cell(&t, 1, 1), "count(A)").unwrap();
    assert_eq!(value(&t, 0, 1), Value::Number(4.0));
    assert_eq!(value(&t, 1, 1), Value::Number(2.0));
}
