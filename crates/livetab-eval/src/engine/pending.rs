//! Pending and blocked evaluation states, keyed by correlation id.
//!
//! A state records one target cell whose value is not known yet. It is
//! either waiting on an awaited operator result, or blocked on one or more
//! other pending cells. Every state carries a validity flag guarded by its
//! own lock; invalidation flips it once and the state is dead for good.
//!
//! Lock order: never hold a registry map guard while locking a state.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashSet;

use livetab_common::{CellKey, Derivable, Element, Value};

use super::derivation::{Derivation, DerivationId};
use super::worker::WorkerPool;
use crate::evaluator::Frame;
use crate::traits::TableStore;

static NEXT_CORRELATION: AtomicU64 = AtomicU64::new(1);

/// Identifier a result is posted against.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CORRELATION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "corr#{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) enum StateKind {
    /// Suspended on an awaited operator; resumes from `frame`.
    Awaiting { frame: Frame },
    /// Waiting for one pending cell.
    Blocked { on: CellKey },
    /// Waiting for every pending cell feeding an aggregate.
    BlockedStatistic {
        elements: Vec<Element>,
        waiting: FxHashSet<CellKey>,
    },
}

impl StateKind {
    fn name(&self) -> &'static str {
        match self {
            StateKind::Awaiting { .. } => "awaiting",
            StateKind::Blocked { .. } => "blocked",
            StateKind::BlockedStatistic { .. } => "blocked-statistic",
        }
    }

    /// Cells this state waits on.
    fn blockers(&self) -> Vec<CellKey> {
        match self {
            StateKind::Awaiting { .. } => Vec::new(),
            StateKind::Blocked { on } => vec![*on],
            StateKind::BlockedStatistic { waiting, .. } => waiting.iter().copied().collect(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct StateInner {
    pub valid: bool,
    pub kind: StateKind,
}

/// The pending evaluation of one derived cell.
#[derive(Debug)]
pub struct PendingState {
    id: CorrelationId,
    derivation: DerivationId,
    target: Derivable,
    cell: CellKey,
    inner: Mutex<StateInner>,
}

impl PendingState {
    pub(crate) fn new(derivation: &Derivation, cell: CellKey, kind: StateKind) -> Self {
        Self {
            id: CorrelationId::next(),
            derivation: derivation.id(),
            target: derivation.target(),
            cell,
            inner: Mutex::new(StateInner { valid: true, kind }),
        }
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }

    pub fn derivation(&self) -> DerivationId {
        self.derivation
    }

    pub fn target(&self) -> Derivable {
        self.target
    }

    pub fn cell(&self) -> CellKey {
        self.cell
    }

    pub fn is_valid(&self) -> bool {
        self.inner.lock().valid
    }

    /// `awaiting`, `blocked` or `blocked-statistic`.
    pub fn kind_name(&self) -> &'static str {
        self.inner.lock().kind.name()
    }

    /// One cell this state waits on, if it is blocked.
    pub(crate) fn first_blocker(&self) -> Option<CellKey> {
        self.inner.lock().kind.blockers().first().copied()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StateInner> {
        self.inner.lock()
    }
}

/// Live states of one table.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    states: DashMap<CorrelationId, Arc<PendingState>>,
    by_cell: DashMap<CellKey, CorrelationId>,
    waiters: DashMap<CellKey, Vec<CorrelationId>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a state and subscribe it to the cells it waits on. Any
    /// other state still mapped to the same cell must have been superseded
    /// first.
    pub(crate) fn register(&self, state: PendingState) -> Arc<PendingState> {
        let state = Arc::new(state);
        let blockers = state.lock().kind.blockers();
        self.states.insert(state.id, state.clone());
        self.by_cell.insert(state.cell, state.id);
        for b in blockers {
            self.add_waiter(b, state.id);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            id = %state.id,
            cell = %state.cell,
            target = %state.target,
            kind = state.kind_name(),
            "pending state created"
        );
        state
    }

    pub fn get(&self, id: CorrelationId) -> Option<Arc<PendingState>> {
        self.states.get(&id).map(|s| s.clone())
    }

    /// The state currently responsible for `cell`.
    pub fn live_on(&self, cell: CellKey) -> Option<Arc<PendingState>> {
        let id = self.by_cell.get(&cell).map(|r| *r)?;
        self.get(id)
    }

    pub(crate) fn deregister(&self, state: &PendingState) {
        self.states.remove(&state.id);
        self.by_cell.remove_if(&state.cell, |_, id| *id == state.id);
    }

    pub(crate) fn add_waiter(&self, cell: CellKey, id: CorrelationId) {
        let mut w = self.waiters.entry(cell).or_default();
        if !w.contains(&id) {
            w.push(id);
        }
    }

    pub(crate) fn take_waiters(&self, cell: CellKey) -> Vec<CorrelationId> {
        self.waiters.remove(&cell).map(|(_, v)| v).unwrap_or_default()
    }

    /// States satisfying `pred`, in correlation order.
    pub fn matching<F>(&self, pred: F) -> Vec<Arc<PendingState>>
    where
        F: Fn(&PendingState) -> bool,
    {
        let all: Vec<Arc<PendingState>> = self.states.iter().map(|e| e.value().clone()).collect();
        let mut out: Vec<Arc<PendingState>> = all.into_iter().filter(|s| pred(s)).collect();
        out.sort_by_key(|s| s.id);
        out
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Kill the state of `cell` unless it is `keep`. The cell value is left
    /// alone; the caller is about to overwrite it.
    pub(crate) fn supersede(
        &self,
        cell: CellKey,
        keep: Option<CorrelationId>,
        store: &dyn TableStore,
        pool: &WorkerPool,
    ) {
        if let Some(state) = self.live_on(cell)
            && Some(state.id) != keep
        {
            self.invalidate(&state, store, pool, false);
        }
    }

    /// Mark a state dead, drop it from the registry and cancel its queued
    /// task. With `reset`, a cell still showing pending is cleared to
    /// empty. Returns the cell when this call did the invalidation.
    pub(crate) fn invalidate(
        &self,
        state: &PendingState,
        store: &dyn TableStore,
        pool: &WorkerPool,
        reset: bool,
    ) -> Option<CellKey> {
        {
            let mut inner = state.lock();
            if !inner.valid {
                return None;
            }
            inner.valid = false;
        }
        self.deregister(state);
        pool.cancel(state.id);
        // a newer state may already own the cell
        if reset
            && !self.by_cell.contains_key(&state.cell)
            && store.get_cell(state.cell.row, state.cell.col).is_pending()
        {
            store.set_cell(state.cell.row, state.cell.col, Value::Empty);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(id = %state.id, cell = %state.cell, reset, "pending state invalidated");
        Some(state.cell)
    }
}
