//! Collaborator contract between the engine and table storage.

use livetab_common::{CellKey, ColumnId, Element, RowId, SubsetId, Value};
use livetab_parse::ReferenceResolver;

/// Rows and columns spanned by a subset. An empty list spans every row
/// (or column) of the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubsetMembers {
    pub rows: Vec<RowId>,
    pub columns: Vec<ColumnId>,
}

impl SubsetMembers {
    pub fn covers(&self, cell: CellKey) -> bool {
        (self.rows.is_empty() || self.rows.contains(&cell.row))
            && (self.columns.is_empty() || self.columns.contains(&cell.col))
    }
}

/// Storage for cell values and the element structure of one table.
///
/// Implementations must be internally synchronised: the engine reads and
/// writes cells from the calling thread and from worker threads resolving
/// pending values. Element identity is stable for the lifetime of an
/// element; handles are never reused.
pub trait TableStore: ReferenceResolver + Send + Sync {
    /// Current value of a cell; `Value::Empty` for unset or unknown cells.
    fn get_cell(&self, row: RowId, col: ColumnId) -> Value;

    /// Store a value, returning whether the stored value changed.
    fn set_cell(&self, row: RowId, col: ColumnId, value: Value) -> bool;

    /// Rows in table order.
    fn rows(&self) -> Vec<RowId>;

    /// Columns in table order.
    fn columns(&self) -> Vec<ColumnId>;

    fn subset_members(&self, subset: SubsetId) -> Option<SubsetMembers>;

    fn is_valid(&self, element: Element) -> bool;

    /// Remove an element and its cells. Returns `false` if it did not exist.
    fn remove(&self, element: Element) -> bool;

    /// Cells of an element in table order: row-major for tables and
    /// subsets.
    fn cells_of(&self, element: Element) -> Vec<CellKey> {
        match element {
            Element::Cell(k) => {
                if self.is_valid(element) {
                    vec![k]
                } else {
                    Vec::new()
                }
            }
            Element::Column(col) => {
                if !self.is_valid(element) {
                    return Vec::new();
                }
                self.rows()
                    .into_iter()
                    .map(|row| CellKey::new(row, col))
                    .collect()
            }
            Element::Row(row) => {
                if !self.is_valid(element) {
                    return Vec::new();
                }
                self.columns()
                    .into_iter()
                    .map(|col| CellKey::new(row, col))
                    .collect()
            }
            Element::Table => {
                let cols = self.columns();
                let mut out = Vec::new();
                for row in self.rows() {
                    out.extend(cols.iter().map(|&col| CellKey::new(row, col)));
                }
                out
            }
            Element::Subset(s) => {
                let Some(members) = self.subset_members(s) else {
                    return Vec::new();
                };
                let cols = self.columns();
                let mut out = Vec::new();
                for row in self.rows() {
                    for &col in &cols {
                        let k = CellKey::new(row, col);
                        if members.covers(k) {
                            out.push(k);
                        }
                    }
                }
                out
            }
        }
    }

    /// 1-based position of a row in table order.
    fn row_position(&self, row: RowId) -> Option<usize> {
        self.rows().iter().position(|&r| r == row).map(|i| i + 1)
    }

    /// 1-based position of a column in table order.
    fn column_position(&self, col: ColumnId) -> Option<usize> {
        self.columns().iter().position(|&c| c == col).map(|i| i + 1)
    }
}
