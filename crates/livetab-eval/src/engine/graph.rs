//! Dependency edges between derivations.
//!
//! Edges are not stored. Every element maps to a [`Region`] of rows and
//! columns, and "X affects T" holds when the region X writes overlaps a
//! region T reads. This keeps deletes and subset edits free of index
//! maintenance: removing an element simply stops its region from matching.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::{SmallVec, smallvec};

use livetab_common::{CellKey, ColumnId, Derivable, Element, RowId};
use livetab_parse::ReferenceUse;

use super::derivation::Derivation;
use crate::traits::TableStore;

#[derive(Debug, Clone, PartialEq)]
enum Axis<T> {
    All,
    Only(SmallVec<[T; 4]>),
}

impl<T: PartialEq + Copy> Axis<T> {
    fn from_members(members: Vec<T>) -> Self {
        if members.is_empty() {
            Axis::All
        } else {
            Axis::Only(members.into())
        }
    }

    fn intersects(&self, other: &Axis<T>) -> bool {
        match (self, other) {
            (Axis::All, _) | (_, Axis::All) => true,
            (Axis::Only(a), Axis::Only(b)) => a.iter().any(|x| b.contains(x)),
        }
    }

    fn contains(&self, t: T) -> bool {
        match self {
            Axis::All => true,
            Axis::Only(v) => v.contains(&t),
        }
    }
}

/// The rows and columns an element spans.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    rows: Axis<RowId>,
    cols: Axis<ColumnId>,
}

impl Region {
    pub fn of(element: Element, store: &dyn TableStore) -> Self {
        match element {
            Element::Row(r) => Region {
                rows: Axis::Only(smallvec![r]),
                cols: Axis::All,
            },
            Element::Column(c) => Region {
                rows: Axis::All,
                cols: Axis::Only(smallvec![c]),
            },
            Element::Cell(k) => Region {
                rows: Axis::Only(smallvec![k.row]),
                cols: Axis::Only(smallvec![k.col]),
            },
            Element::Table => Region {
                rows: Axis::All,
                cols: Axis::All,
            },
            Element::Subset(s) => match store.subset_members(s) {
                Some(m) => Region {
                    rows: Axis::from_members(m.rows),
                    cols: Axis::from_members(m.columns),
                },
                // an unknown subset spans nothing
                None => Region {
                    rows: Axis::Only(SmallVec::new()),
                    cols: Axis::Only(SmallVec::new()),
                },
            },
        }
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.rows.intersects(&other.rows) && self.cols.intersects(&other.cols)
    }

    pub fn contains(&self, cell: CellKey) -> bool {
        self.rows.contains(cell.row) && self.cols.contains(cell.col)
    }
}

/// Decides which cells an aggregate over an element must skip.
pub trait AggregateExclusion {
    /// Whether `cell` is left out of aggregates over `element`.
    fn excluded(&self, cell: CellKey, element: Element) -> bool;
}

/// Aggregates include every cell.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExclusion;

impl AggregateExclusion for NoExclusion {
    fn excluded(&self, _cell: CellKey, _element: Element) -> bool {
        false
    }
}

/// The installed derivations of one table.
///
/// Snapshots are cheap to clone and never mutated once shared; edits build
/// a new graph and swap it in.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    derivations: FxHashMap<Derivable, Arc<Derivation>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &Derivable) -> Option<&Arc<Derivation>> {
        self.derivations.get(target)
    }

    pub fn insert(&mut self, derivation: Arc<Derivation>) -> Option<Arc<Derivation>> {
        self.derivations.insert(derivation.target(), derivation)
    }

    pub fn remove(&mut self, target: &Derivable) -> Option<Arc<Derivation>> {
        self.derivations.remove(target)
    }

    /// Remove every derivation whose target lies inside `element`.
    pub fn remove_within(&mut self, element: Element) -> Vec<Arc<Derivation>> {
        let doomed: Vec<Derivable> = self
            .derivations
            .keys()
            .filter(|t| match (element, **t) {
                (Element::Row(r), Derivable::Row(x)) => r == x,
                (Element::Row(r), Derivable::Cell(k)) => k.row == r,
                (Element::Column(c), Derivable::Column(x)) => c == x,
                (Element::Column(c), Derivable::Cell(k)) => k.col == c,
                (Element::Cell(k), Derivable::Cell(x)) => k == x,
                _ => false,
            })
            .copied()
            .collect();
        doomed
            .iter()
            .filter_map(|t| self.derivations.remove(t))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Derivation>> {
        self.derivations.values()
    }

    pub fn len(&self) -> usize {
        self.derivations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.derivations.is_empty()
    }

    /// The derivation that produces `cell`: cell-level, else column-level,
    /// else row-level.
    pub fn governing(&self, cell: CellKey) -> Option<&Arc<Derivation>> {
        self.derivations
            .get(&Derivable::Cell(cell))
            .or_else(|| self.derivations.get(&Derivable::Column(cell.col)))
            .or_else(|| self.derivations.get(&Derivable::Row(cell.row)))
    }

    /// Uses of `d` that observe a change to `changed`. A cell feeding an
    /// aggregate its own derivation also aggregates is not observed.
    pub fn uses_touched<'d>(
        &self,
        d: &'d Derivation,
        changed: Element,
        store: &dyn TableStore,
    ) -> Vec<&'d ReferenceUse> {
        let region = Region::of(changed, store);
        d.uses()
            .iter()
            .filter(|u| {
                if !region.overlaps(&Region::of(u.element, store)) {
                    return false;
                }
                match changed {
                    Element::Cell(k) if u.aggregate => !self.excluded(k, u.element),
                    _ => true,
                }
            })
            .collect()
    }

    /// Derivations reading `changed`, in target order.
    pub fn dependents_of(&self, changed: Element, store: &dyn TableStore) -> Vec<Derivable> {
        let mut out: Vec<Derivable> = self
            .derivations
            .values()
            .filter(|d| !self.uses_touched(d, changed, store).is_empty())
            .map(|d| d.target())
            .collect();
        out.sort();
        out
    }

    /// Derivations reading the output of `x`, in target order. May include
    /// `x` itself when it reads its own target.
    pub fn derivation_dependents(&self, x: &Derivation, store: &dyn TableStore) -> Vec<Derivable> {
        let written = Region::of(x.target().element(), store);
        let mut out: Vec<Derivable> = self
            .derivations
            .values()
            .filter(|t| {
                t.uses().iter().any(|u| {
                    written.overlaps(&Region::of(u.element, store))
                        && !(u.aggregate && x.aggregates(u.element))
                })
            })
            .map(|t| t.target())
            .collect();
        out.sort();
        out
    }

    /// Whether `start` can reach itself along dependency edges.
    pub fn has_cycle_through(&self, start: Derivable, store: &dyn TableStore) -> bool {
        let Some(first) = self.get(&start) else {
            return false;
        };
        let mut seen: FxHashSet<Derivable> = FxHashSet::default();
        let mut stack = self.derivation_dependents(first, store);
        while let Some(t) = stack.pop() {
            if t == start {
                return true;
            }
            if !seen.insert(t) {
                continue;
            }
            if let Some(d) = self.get(&t) {
                stack.extend(self.derivation_dependents(d, store));
            }
        }
        false
    }
}

impl AggregateExclusion for DependencyGraph {
    fn excluded(&self, cell: CellKey, element: Element) -> bool {
        self.governing(cell).is_some_and(|d| d.aggregates(element))
    }
}
