//! Lightweight in-memory table for unit, integration and property tests.
//!
//! Labels resolve case-insensitively; `cN`, `rN` and `rNcM` (1-based
//! positions) resolve to columns, rows and cells when no label matches.
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use livetab_common::{CellKey, ColumnId, Element, RowId, SubsetId, Value};
use livetab_parse::ReferenceResolver;

use crate::traits::{SubsetMembers, TableStore};

#[derive(Debug, Clone)]
struct Labelled<T> {
    id: T,
    label: Option<String>,
}

#[derive(Debug, Default)]
pub struct TestTable {
    rows: RwLock<Vec<Labelled<RowId>>>,
    columns: RwLock<Vec<Labelled<ColumnId>>>,
    subsets: RwLock<FxHashMap<SubsetId, (String, SubsetMembers)>>,
    cells: DashMap<CellKey, Value>,
    next_id: AtomicU32,
}

impl TestTable {
    /* ─────────────── constructors ─────────────── */
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with labelled columns and `rows` unlabelled rows.
    pub fn with_shape<S: AsRef<str>>(columns: &[S], rows: usize) -> Self {
        let t = Self::new();
        for c in columns {
            t.add_column(Some(c.as_ref()));
        }
        for _ in 0..rows {
            t.add_row(None);
        }
        t
    }

    /// Builder form of [`TestTable::set`].
    pub fn with_value<V: Into<Value>>(self, row: usize, col: usize, v: V) -> Self {
        self.set(row, col, v);
        self
    }

    /// Fill column `col` from the top with numbers.
    pub fn with_column_values(self, col: usize, values: &[f64]) -> Self {
        for (i, v) in values.iter().enumerate() {
            self.set(i, col, *v);
        }
        self
    }

    fn next(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /* ─────────────── structure ─────────────── */
    pub fn add_row(&self, label: Option<&str>) -> RowId {
        let id = RowId(self.next());
        self.rows.write().push(Labelled {
            id,
            label: label.map(str::to_string),
        });
        id
    }

    pub fn add_column(&self, label: Option<&str>) -> ColumnId {
        let id = ColumnId(self.next());
        self.columns.write().push(Labelled {
            id,
            label: label.map(str::to_string),
        });
        id
    }

    pub fn add_subset(&self, label: &str, rows: Vec<RowId>, columns: Vec<ColumnId>) -> SubsetId {
        let id = SubsetId(self.next());
        self.subsets
            .write()
            .insert(id, (label.to_string(), SubsetMembers { rows, columns }));
        id
    }

    /// Row handle at 0-based position `i`.
    ///
    /// Panics if out of range; test helper.
    pub fn row(&self, i: usize) -> RowId {
        self.rows.read()[i].id
    }

    /// Column handle at 0-based position `i`.
    ///
    /// Panics if out of range; test helper.
    pub fn col(&self, i: usize) -> ColumnId {
        self.columns.read()[i].id
    }

    pub fn cell(&self, row: usize, col: usize) -> CellKey {
        CellKey::new(self.row(row), self.col(col))
    }

    /* ─────────────── cell helpers ─────────────── */
    /// Set by 0-based position.
    pub fn set<V: Into<Value>>(&self, row: usize, col: usize, v: V) {
        let k = self.cell(row, col);
        self.set_cell(k.row, k.col, v.into());
    }

    /// Get by 0-based position.
    pub fn get(&self, row: usize, col: usize) -> Value {
        let k = self.cell(row, col);
        self.get_cell(k.row, k.col)
    }

    /// Numbers down column `col`, `None` for non-numeric cells.
    pub fn column_numbers(&self, col: usize) -> Vec<Option<f64>> {
        let c = self.col(col);
        self.rows()
            .into_iter()
            .map(|r| self.get_cell(r, c).as_number())
            .collect()
    }

    /* ─────────────── label resolution ─────────────── */
    fn canonical(&self, label: &str) -> Option<Element> {
        let lower = label.to_ascii_lowercase();
        let pos = |digits: &str| -> Option<usize> {
            digits.parse::<usize>().ok().filter(|&n| n >= 1).map(|n| n - 1)
        };
        if let Some(rest) = lower.strip_prefix('r') {
            if let Some((r, c)) = rest.split_once('c') {
                let row = self.rows.read().get(pos(r)?)?.id;
                let col = self.columns.read().get(pos(c)?)?.id;
                return Some(Element::cell(row, col));
            }
            let row = self.rows.read().get(pos(rest)?)?.id;
            return Some(Element::Row(row));
        }
        if let Some(rest) = lower.strip_prefix('c') {
            let col = self.columns.read().get(pos(rest)?)?.id;
            return Some(Element::Column(col));
        }
        None
    }
}

fn label_matches(candidate: &Option<String>, label: &str) -> bool {
    candidate
        .as_deref()
        .is_some_and(|c| c.eq_ignore_ascii_case(label))
}

impl ReferenceResolver for TestTable {
    fn resolve(&self, label: &str) -> Option<Element> {
        if let Some(c) = self.columns.read().iter().find(|c| label_matches(&c.label, label)) {
            return Some(Element::Column(c.id));
        }
        if let Some(r) = self.rows.read().iter().find(|r| label_matches(&r.label, label)) {
            return Some(Element::Row(r.id));
        }
        if let Some((id, _)) = self
            .subsets
            .read()
            .iter()
            .find(|(_, (l, _))| l.eq_ignore_ascii_case(label))
        {
            return Some(Element::Subset(*id));
        }
        if label.eq_ignore_ascii_case("table") {
            return Some(Element::Table);
        }
        self.canonical(label)
    }
}

impl TableStore for TestTable {
    fn get_cell(&self, row: RowId, col: ColumnId) -> Value {
        self.cells
            .get(&CellKey::new(row, col))
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    fn set_cell(&self, row: RowId, col: ColumnId, value: Value) -> bool {
        let k = CellKey::new(row, col);
        if !self.is_valid(Element::Cell(k)) {
            return false;
        }
        if value.is_empty() {
            return self.cells.remove(&k).is_some();
        }
        match self.cells.insert(k, value.clone()) {
            Some(prev) => prev != value,
            None => true,
        }
    }

    fn rows(&self) -> Vec<RowId> {
        self.rows.read().iter().map(|r| r.id).collect()
    }

    fn columns(&self) -> Vec<ColumnId> {
        self.columns.read().iter().map(|c| c.id).collect()
    }

    fn subset_members(&self, subset: SubsetId) -> Option<SubsetMembers> {
        self.subsets.read().get(&subset).map(|(_, m)| m.clone())
    }

    fn is_valid(&self, element: Element) -> bool {
        let has_row = |r: RowId| self.rows.read().iter().any(|x| x.id == r);
        let has_col = |c: ColumnId| self.columns.read().iter().any(|x| x.id == c);
        match element {
            Element::Row(r) => has_row(r),
            Element::Column(c) => has_col(c),
            Element::Cell(k) => has_row(k.row) && has_col(k.col),
            Element::Subset(s) => self.subsets.read().contains_key(&s),
            Element::Table => true,
        }
    }

    fn remove(&self, element: Element) -> bool {
        match element {
            Element::Row(r) => {
                let mut rows = self.rows.write();
                let before = rows.len();
                rows.retain(|x| x.id != r);
                self.cells.retain(|k, _| k.row != r);
                for (_, m) in self.subsets.write().values_mut() {
                    m.rows.retain(|&x| x != r);
                }
                rows.len() != before
            }
            Element::Column(c) => {
                let mut cols = self.columns.write();
                let before = cols.len();
                cols.retain(|x| x.id != c);
                self.cells.retain(|k, _| k.col != c);
                for (_, m) in self.subsets.write().values_mut() {
                    m.columns.retain(|&x| x != c);
                }
                cols.len() != before
            }
            Element::Cell(k) => self.cells.remove(&k).is_some(),
            Element::Subset(s) => self.subsets.write().remove(&s).is_some(),
            Element::Table => false,
        }
    }

    fn row_position(&self, row: RowId) -> Option<usize> {
        self.rows.read().iter().position(|r| r.id == row).map(|i| i + 1)
    }

    fn column_position(&self, col: ColumnId) -> Option<usize> {
        self.columns
            .read()
            .iter()
            .position(|c| c.id == col)
            .map(|i| i + 1)
    }
}
