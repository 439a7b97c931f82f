//! Stable opaque handles for table elements.
//!
//! Rows, columns and subsets are addressed by ids handed out by the table
//! collaborator; an id is never reused for a different element during the
//! lifetime of a table, so derivations can hold handles instead of owning
//! references.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub const fn as_index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

handle!(
    /// Row handle.
    RowId,
    "row"
);
handle!(
    /// Column handle.
    ColumnId,
    "col"
);
handle!(
    /// Handle of a named subset of rows and/or columns.
    SubsetId,
    "subset"
);

/// A (row, column) cell address.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub row: RowId,
    pub col: ColumnId,
}

impl CellKey {
    pub const fn new(row: RowId, col: ColumnId) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Anything a reference token may point at.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    Row(RowId),
    Column(ColumnId),
    Cell(CellKey),
    Subset(SubsetId),
    Table,
}

impl Element {
    pub fn cell(row: RowId, col: ColumnId) -> Self {
        Element::Cell(CellKey::new(row, col))
    }

    /// The derivable view of this element, if it can carry a derivation.
    pub fn as_derivable(&self) -> Option<Derivable> {
        match *self {
            Element::Row(r) => Some(Derivable::Row(r)),
            Element::Column(c) => Some(Derivable::Column(c)),
            Element::Cell(k) => Some(Derivable::Cell(k)),
            Element::Subset(_) | Element::Table => None,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Row(r) => write!(f, "{r}"),
            Element::Column(c) => write!(f, "{c}"),
            Element::Cell(k) => write!(f, "cell{k}"),
            Element::Subset(s) => write!(f, "{s}"),
            Element::Table => f.write_str("table"),
        }
    }
}

/// An element that can carry a derivation. Tables and subsets derive
/// through their constituent rows and columns.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Derivable {
    Row(RowId),
    Column(ColumnId),
    Cell(CellKey),
}

impl Derivable {
    pub fn cell(row: RowId, col: ColumnId) -> Self {
        Derivable::Cell(CellKey::new(row, col))
    }

    pub fn element(&self) -> Element {
        (*self).into()
    }
}

impl From<Derivable> for Element {
    fn from(d: Derivable) -> Self {
        match d {
            Derivable::Row(r) => Element::Row(r),
            Derivable::Column(c) => Element::Column(c),
            Derivable::Cell(k) => Element::Cell(k),
        }
    }
}

impl fmt::Display for Derivable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Element::from(*self).fmt(f)
    }
}
