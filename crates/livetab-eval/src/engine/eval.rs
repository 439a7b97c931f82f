use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;

use livetab_common::{CellKey, ColumnId, Derivable, Element, RowId, Value};
use livetab_parse::{Token, TokenMapper};

use super::EvalConfig;
use super::derivation::Derivation;
use super::graph::{AggregateExclusion, DependencyGraph, Region};
use super::pass::Pass;
use super::pending::{CorrelationId, PendingRegistry, PendingState, StateKind};
use super::worker::{ResultPoster, WorkerPool};
use crate::builtins::builtin_catalog;
use crate::error::{DerivationError, TableError};
use crate::traits::TableStore;

/// A table whose derived rows, columns and cells stay current as values
/// change.
///
/// Cheap to clone; clones share the same engine.
pub struct LiveTable<S: TableStore + 'static> {
    inner: Arc<Inner<S>>,
}

impl<S: TableStore + 'static> Clone for LiveTable<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<S: TableStore + 'static> {
    store: S,
    config: EvalConfig,
    /// Passes that write cells hold a read guard until their cascade is
    /// written, so a derivation edit never lands between a validity check
    /// and the write it guards.
    graph: RwLock<Arc<DependencyGraph>>,
    mapper: RwLock<Arc<TokenMapper>>,
    pending: PendingRegistry,
    pool: WorkerPool,
    /// Serialises edits to the derivation set.
    edit: Mutex<()>,
    me: Weak<Inner<S>>,
}

impl<S: TableStore + 'static> LiveTable<S> {
    pub fn new(store: S, config: EvalConfig) -> Self {
        let pool = WorkerPool::new(&config);
        let inner = Arc::new_cyclic(|me| Inner {
            store,
            config,
            graph: RwLock::new(Arc::new(DependencyGraph::new())),
            mapper: RwLock::new(Arc::new(TokenMapper::new(builtin_catalog()))),
            pending: PendingRegistry::new(),
            pool,
            edit: Mutex::new(()),
            me: me.clone(),
        });
        Self { inner }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn config(&self) -> &EvalConfig {
        &self.inner.config
    }

    /* ─────────────────────────── operators ────────────────────────── */

    /// Snapshot of the operator mapper used for new derivations.
    pub fn mapper(&self) -> Arc<TokenMapper> {
        self.inner.mapper.read().clone()
    }

    /// Edit the mapper. Existing derivations keep the operators they were
    /// compiled with.
    pub fn update_mapper<R>(&self, f: impl FnOnce(&mut TokenMapper) -> R) -> R {
        let mut guard = self.inner.mapper.write();
        f(Arc::make_mut(&mut guard))
    }

    /* ─────────────────────────── derivations ────────────────────────── */

    /// Install `text` as the derivation of `target`, replacing any previous
    /// one, and recalculate.
    pub fn derive(&self, target: Derivable, text: &str) -> Result<Arc<Derivation>, DerivationError> {
        self.derive_with_precision(target, text, self.inner.config.precision)
    }

    pub fn derive_with_precision(
        &self,
        target: Derivable,
        text: &str,
        precision: Option<u32>,
    ) -> Result<Arc<Derivation>, DerivationError> {
        self.inner.derive(target, text, precision)
    }

    /// Remove the derivation of `target`. Its cells keep their last values;
    /// cells still pending are cleared.
    pub fn clear_derivation(&self, target: Derivable) -> Result<(), DerivationError> {
        self.inner.clear(target)
    }

    pub fn derivation_of(&self, target: Derivable) -> Option<Arc<Derivation>> {
        self.inner.graph.read().get(&target).cloned()
    }

    /// Installed derivations in target order.
    pub fn derivations(&self) -> Vec<Arc<Derivation>> {
        let graph = self.inner.graph.read().clone();
        let mut all: Vec<Arc<Derivation>> = graph.iter().cloned().collect();
        all.sort_by_key(|d| d.target());
        all
    }

    /// Replay the derivation of `target` over all its cells, then cascade.
    pub fn recalculate(&self, target: Derivable) -> Result<(), DerivationError> {
        let inner = &self.inner;
        let graph = inner.graph.read_recursive();
        if graph.get(&target).is_none() {
            return Err(DerivationError::NoDerivation(target));
        }
        let mut pass = inner.pass_over(Arc::clone(&*graph));
        pass.apply(target, true);
        pass.cascade(&[target]);
        drop(graph);
        inner.finish(pass);
        Ok(())
    }

    /* ─────────────────────────── cells ────────────────────────── */

    /// Write a value and recalculate what depends on it. Returns whether
    /// the stored value changed.
    pub fn set_value<V: Into<Value>>(&self, row: RowId, col: ColumnId, value: V) -> Result<bool, TableError> {
        let cell = CellKey::new(row, col);
        if !self.inner.store.is_valid(Element::Cell(cell)) {
            return Err(TableError::InvalidElement(Element::Cell(cell)));
        }
        let graph = self.inner.graph.read_recursive();
        let mut pass = self.inner.pass_over(Arc::clone(&*graph));
        pass.write_cell(cell, value.into(), None);
        let changed = pass.has_changes();
        pass.cascade(&[]);
        drop(graph);
        self.inner.finish(pass);
        Ok(changed)
    }

    pub fn get_value(&self, row: RowId, col: ColumnId) -> Value {
        self.inner.store.get_cell(row, col)
    }

    pub fn delete_row(&self, row: RowId) -> Result<(), TableError> {
        self.inner.delete(Element::Row(row))
    }

    pub fn delete_column(&self, col: ColumnId) -> Result<(), TableError> {
        self.inner.delete(Element::Column(col))
    }

    pub fn delete_cell(&self, row: RowId, col: ColumnId) -> Result<(), TableError> {
        self.inner.delete(Element::Cell(CellKey::new(row, col)))
    }

    /* ─────────────────────────── pending results ────────────────────────── */

    /// Deliver the result awaited under `id`. Late or unknown posts are
    /// ignored and return `false`.
    pub fn post_result(&self, id: CorrelationId, value: Token) -> bool {
        self.inner.post(id, value)
    }

    pub fn is_pending(&self, row: RowId, col: ColumnId) -> bool {
        self.inner.store.get_cell(row, col).is_pending()
    }

    /// Live pending and blocked states.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Live states belonging to the derivation on `target`.
    pub fn outstanding_states(&self, target: Derivable) -> Vec<Arc<PendingState>> {
        self.inner.pending.matching(|s| s.target() == target)
    }

    /// Correlation id of the state responsible for a pending cell.
    pub fn correlation_of(&self, row: RowId, col: ColumnId) -> Option<CorrelationId> {
        self.inner
            .pending
            .live_on(CellKey::new(row, col))
            .map(|s| s.id())
    }

    /// Wait for queued and running tasks to drain.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.inner.pool.wait_idle(timeout)
    }
}

impl<S: TableStore + 'static> Inner<S> {
    fn pass(&self) -> Pass<'_> {
        let graph = self.graph.read_recursive().clone();
        self.pass_over(graph)
    }

    fn pass_over(&self, graph: Arc<DependencyGraph>) -> Pass<'_> {
        Pass::new(
            &self.store,
            &self.pending,
            &self.pool,
            graph,
            self.mapper.read().clone(),
        )
    }

    fn poster(&self) -> Weak<dyn ResultPoster> {
        self.me.clone()
    }

    fn finish(&self, pass: Pass<'_>) {
        let resolved = self.drain(pass);
        self.wake(resolved);
    }

    /// Close a pass. A blocked state whose blockers resolved before it
    /// subscribed is unblocked here. Returns the resolved cells.
    fn drain(&self, pass: Pass<'_>) -> Vec<CellKey> {
        let (mut resolved, blocked) = pass.finish(self.poster());
        for state in blocked {
            if let Some(cell) = state.first_blocker() {
                resolved.extend(self.unblock(&state, cell));
            }
        }
        resolved
    }

    fn derive(
        &self,
        target: Derivable,
        text: &str,
        precision: Option<u32>,
    ) -> Result<Arc<Derivation>, DerivationError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("derivation_create", %target).entered();

        let element = target.element();
        if !self.store.is_valid(element) {
            return Err(DerivationError::InvalidElement(element));
        }
        let _edit = self.edit.lock();
        let mapper = self.mapper.read().clone();
        let derivation = Arc::new(Derivation::compile(
            target,
            text,
            &mapper,
            &self.store,
            precision,
        )?);

        // 1. Reject cycles before anything is touched
        let mut candidate = DependencyGraph::clone(&self.graph.read());
        let replaced = candidate.insert(derivation.clone());
        if candidate.has_cycle_through(target, &self.store) {
            return Err(DerivationError::CircularReference { target });
        }

        // 2. Retire the states of the replaced derivation and install
        let mut reset = Vec::new();
        if let Some(old) = replaced {
            reset = self.retire(|s| s.derivation() == old.id());
        }
        *self.graph.write() = Arc::new(candidate);

        // 3. Evaluate the target, then everything downstream
        let mut pass = self.pass();
        for cell in reset {
            pass.note_resolved(cell);
        }
        pass.apply(target, true);
        pass.cascade(&[target]);
        self.finish(pass);
        Ok(derivation)
    }

    fn clear(&self, target: Derivable) -> Result<(), DerivationError> {
        let _edit = self.edit.lock();
        let mut candidate = DependencyGraph::clone(&self.graph.read());
        let Some(old) = candidate.remove(&target) else {
            return Err(DerivationError::NoDerivation(target));
        };
        let reset = self.retire(|s| s.derivation() == old.id());
        *self.graph.write() = Arc::new(candidate);

        let mut pass = self.pass();
        for cell in reset {
            pass.note_changed(Element::Cell(cell));
            pass.note_resolved(cell);
        }
        // cells fall back to a lower level derivation, if any
        let graph = pass.graph().clone();
        for cell in self.store.cells_of(target.element()) {
            if let Some(g) = graph.governing(cell) {
                pass.compute_cell(g, cell);
            }
        }
        pass.cascade(&[]);
        self.finish(pass);
        Ok(())
    }

    fn delete(&self, element: Element) -> Result<(), TableError> {
        if !self.store.is_valid(element) {
            return Err(TableError::InvalidElement(element));
        }
        let _edit = self.edit.lock();
        let mut candidate = DependencyGraph::clone(&self.graph.read());
        let removed: FxHashSet<_> = candidate
            .remove_within(element)
            .iter()
            .map(|d| d.id())
            .collect();

        let region = Region::of(element, &self.store);
        self.retire(|s| region.contains(s.cell()) || removed.contains(&s.derivation()));

        let orphans: Vec<(CellKey, Vec<CorrelationId>)> = {
            let mut graph = self.graph.write();
            *graph = Arc::new(candidate);
            let orphans = self
                .store
                .cells_of(element)
                .into_iter()
                .map(|k| (k, self.pending.take_waiters(k)))
                .filter(|(_, ids)| !ids.is_empty())
                .collect();
            self.store.remove(element);
            orphans
        };

        let mut pass = self.pass();
        pass.note_changed(element);
        pass.cascade(&[]);
        self.finish(pass);

        // states still waiting on a deleted cell re-evaluate against the gap
        #[cfg(feature = "tracing")]
        tracing::debug!(%element, orphans = orphans.len(), "deleted cells had waiters");
        let mut resolved = Vec::new();
        for (cell, ids) in orphans {
            for id in ids {
                if let Some(state) = self.pending.get(id) {
                    resolved.extend(self.unblock(&state, cell));
                }
            }
        }
        self.wake(resolved);
        Ok(())
    }

    /// Invalidate every state matching `pred`, clearing their cells.
    /// Returns the cells that were reset.
    fn retire<F>(&self, pred: F) -> Vec<CellKey>
    where
        F: Fn(&PendingState) -> bool,
    {
        self.pending
            .matching(pred)
            .iter()
            .filter_map(|s| self.pending.invalidate(s, &self.store, &self.pool, true))
            .collect()
    }

    /* ─────────────────────────── resolution ────────────────────────── */

    fn post(&self, id: CorrelationId, value: Token) -> bool {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("post_result", %id).entered();

        let Some(state) = self.pending.get(id) else {
            #[cfg(feature = "tracing")]
            tracing::warn!(%id, "result posted for an unknown or expired correlation id");
            return false;
        };
        let graph = self.graph.read_recursive();
        let Some(derivation) = self.current(&graph, &state) else {
            drop(graph);
            self.pending.invalidate(&state, &self.store, &self.pool, true);
            return false;
        };

        let mut pass = self.pass_over(Arc::clone(&*graph));
        let outcome = {
            let mut inner = state.lock();
            if !inner.valid {
                #[cfg(feature = "tracing")]
                tracing::warn!(%id, "result posted for an invalidated state");
                return false;
            }
            let frame = match &mut inner.kind {
                StateKind::Awaiting { frame } => std::mem::take(frame),
                _ => return false,
            };
            inner.valid = false;
            self.pending.deregister(&state);
            pass.resume(&derivation, state.cell(), frame, value)
        };
        pass.settle(&derivation, state.cell(), outcome);
        pass.cascade(&[]);
        drop(graph);
        self.finish(pass);
        true
    }

    /// The derivation `state` belongs to, if it is still installed and its
    /// cell still exists.
    fn current(&self, graph: &DependencyGraph, state: &PendingState) -> Option<Arc<Derivation>> {
        graph
            .get(&state.target())
            .filter(|d| d.id() == state.derivation())
            .filter(|_| self.store.is_valid(Element::Cell(state.cell())))
            .cloned()
    }

    /// Notify states waiting on cells that just left the pending state.
    /// Unblocking can resolve further cells; the worklist follows them.
    fn wake(&self, mut resolved: Vec<CellKey>) {
        while let Some(cell) = resolved.pop() {
            for id in self.pending.take_waiters(cell) {
                let Some(state) = self.pending.get(id) else {
                    continue;
                };
                resolved.extend(self.unblock(&state, cell));
            }
        }
    }

    /// Re-check a blocked state after `cell` resolved; recompute its cell
    /// once nothing it reads is pending. Returns newly resolved cells.
    fn unblock(&self, state: &Arc<PendingState>, cell: CellKey) -> Vec<CellKey> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("unblock", id = %state.id(), %cell).entered();

        let graph = self.graph.read_recursive();
        let Some(derivation) = self.current(&graph, state) else {
            drop(graph);
            self.pending.invalidate(state, &self.store, &self.pool, true);
            return Vec::new();
        };

        let mut still_waiting = Vec::new();
        {
            let mut inner = state.lock();
            if !inner.valid {
                return Vec::new();
            }
            match &mut inner.kind {
                StateKind::Awaiting { .. } => return Vec::new(),
                StateKind::Blocked { on } => {
                    if self.store.get_cell(on.row, on.col).is_pending() {
                        still_waiting.push(*on);
                    }
                }
                StateKind::BlockedStatistic { elements, waiting } => {
                    waiting.remove(&cell);
                    // the bookkeeping may have drifted; look at the cells
                    let g: &DependencyGraph = &graph;
                    let live: FxHashSet<CellKey> = elements
                        .iter()
                        .flat_map(|&e| {
                            self.store
                                .cells_of(e)
                                .into_iter()
                                .filter(move |&k| !g.excluded(k, e))
                        })
                        .filter(|k| self.store.get_cell(k.row, k.col).is_pending())
                        .collect();
                    if !live.is_empty() {
                        still_waiting = live.iter().copied().collect();
                        *waiting = live;
                    }
                }
            }
            if still_waiting.is_empty() {
                inner.valid = false;
            }
        }

        if !still_waiting.is_empty() {
            for k in still_waiting {
                self.pending.add_waiter(k, state.id());
            }
            return Vec::new();
        }

        self.pending.deregister(state);
        let target_cell = state.cell();
        let mut pass = self.pass_over(Arc::clone(&*graph));
        if graph.governing(target_cell).map(|g| g.id()) == Some(derivation.id()) {
            pass.compute_cell(&derivation, target_cell);
        }
        pass.cascade(&[]);
        drop(graph);
        self.drain(pass)
    }
}

impl<S: TableStore + 'static> ResultPoster for Inner<S> {
    fn post_result(&self, id: CorrelationId, value: Token) -> bool {
        self.post(id, value)
    }
}
