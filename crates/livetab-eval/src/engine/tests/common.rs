//! Common test helpers
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use livetab_common::{Derivable, Value};
use livetab_parse::{Arity, Awaiting, Operator, Token};

use crate::engine::{EvalConfig, LiveTable, new_live_table};
use crate::test_table::TestTable;
use crate::traits::TableStore;

pub type Table = LiveTable<TestTable>;

pub const IDLE: Duration = Duration::from_secs(5);

/// Live table with labelled columns, `rows` rows and a small pool.
pub fn live(columns: &[&str], rows: usize) -> Table {
    new_live_table(
        TestTable::with_shape(columns, rows),
        EvalConfig::default().with_pool_size(1, 2),
    )
}

pub fn column(t: &Table, i: usize) -> Derivable {
    Derivable::Column(t.store().col(i))
}

pub fn row(t: &Table, i: usize) -> Derivable {
    Derivable::Row(t.store().row(i))
}

pub fn cell(t: &Table, r: usize, c: usize) -> Derivable {
    Derivable::Cell(t.store().cell(r, c))
}

/// User edit by 0-based position, with cascade.
pub fn edit<V: Into<Value>>(t: &Table, r: usize, c: usize, v: V) {
    let k = t.store().cell(r, c);
    t.set_value(k.row, k.col, v).unwrap();
}

/// Seed a column without triggering recalculation.
pub fn seed(t: &Table, c: usize, values: &[f64]) {
    for (r, v) in values.iter().enumerate() {
        t.store().set(r, c, *v);
    }
}

pub fn value(t: &Table, r: usize, c: usize) -> Value {
    t.store().get(r, c)
}

pub fn numbers(t: &Table, c: usize) -> Vec<Option<f64>> {
    t.store().column_numbers(c)
}

/// `fetch(x)`: awaits a result posted from outside.
pub fn register_fetch<S: TableStore + 'static>(t: &LiveTable<S>) {
    t.update_mapper(|m| {
        m.register_operator(
            Operator::function("fetch", Arity::exactly(1))
                .category("Test")
                .eval(|_| Err(Awaiting::external())),
        )
        .unwrap();
    });
}

/// `later(x)`: resolves to `x * 10` on the worker pool.
pub fn register_later<S: TableStore + 'static>(t: &LiveTable<S>) {
    t.update_mapper(|m| {
        m.register_operator(
            Operator::function("later", Arity::exactly(1)).eval(|args| {
                let x = args[0].as_number().unwrap_or(f64::NAN);
                Err(Awaiting::with_task(move || Some(Token::number(x * 10.0))))
            }),
        )
        .unwrap();
    });
}

/// `tick(x)`: returns `x` and counts its calls.
pub fn register_counter<S: TableStore + 'static>(t: &LiveTable<S>) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    t.update_mapper(|m| {
        m.register_operator(Operator::function("tick", Arity::exactly(1)).eval_now(move |args| {
            c.fetch_add(1, Ordering::SeqCst);
            args[0].clone()
        }))
        .unwrap();
    });
    calls
}
