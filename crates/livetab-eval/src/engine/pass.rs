//! One recalculation pass: replays derivations, writes cells and records
//! what changed so the cascade can follow.

use std::sync::{Arc, Weak};

use livetab_common::{CellKey, Derivable, Element, Value};
use livetab_parse::{Token, TokenMapper};
use rustc_hash::FxHashSet;

use super::context::DerivationContext;
use super::derivation::Derivation;
use super::graph::DependencyGraph;
use super::pending::{CorrelationId, PendingRegistry, PendingState, StateKind};
use super::scheduler::Scheduler;
use super::worker::{ResultPoster, WorkerPool};
use crate::evaluator::{Evaluator, Frame, Position, Suspension};
use crate::traits::TableStore;

pub(crate) struct Pass<'a> {
    store: &'a dyn TableStore,
    registry: &'a PendingRegistry,
    pool: &'a WorkerPool,
    graph: Arc<DependencyGraph>,
    mapper: Arc<TokenMapper>,
    ctx: DerivationContext,
    /// Elements written during the pass, in write order.
    changed: Vec<Element>,
    /// Cells that left the pending state.
    resolved: Vec<CellKey>,
    /// States created blocked; their blockers may resolve before they
    /// are subscribed.
    blocked: Vec<Arc<PendingState>>,
}

impl<'a> Pass<'a> {
    pub fn new(
        store: &'a dyn TableStore,
        registry: &'a PendingRegistry,
        pool: &'a WorkerPool,
        graph: Arc<DependencyGraph>,
        mapper: Arc<TokenMapper>,
    ) -> Self {
        Self {
            store,
            registry,
            pool,
            graph,
            mapper,
            ctx: DerivationContext::new(),
            changed: Vec::new(),
            resolved: Vec::new(),
            blocked: Vec::new(),
        }
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    /// Record an element written outside the pass (deleted or reset).
    pub fn note_changed(&mut self, element: Element) {
        self.changed.push(element);
        self.ctx.invalidate(element, self.store);
    }

    pub fn note_resolved(&mut self, cell: CellKey) {
        self.resolved.push(cell);
    }

    /// Replay the derivation on `target`. An explicit replay computes every
    /// governed cell; otherwise only the cells reached by the changes seen
    /// so far in this pass.
    pub fn apply(&mut self, target: Derivable, explicit: bool) {
        let Some(d) = self.graph.get(&target).cloned() else {
            return;
        };
        let cells = if explicit {
            self.store.cells_of(target.element())
        } else {
            match self.scope(&d) {
                Some(cells) => cells,
                None => return,
            }
        };
        for k in cells {
            if !self.store.is_valid(Element::Cell(k)) {
                continue;
            }
            if self.graph.governing(k).map(|g| g.id()) != Some(d.id()) {
                continue;
            }
            self.compute_cell(&d, k);
        }
    }

    /// Cells of `d`'s target reached by the recorded changes. A single cell
    /// read positionally narrows a slice derivation to the matching cell;
    /// anything else (aggregates included) touches the whole target.
    fn scope(&self, d: &Derivation) -> Option<Vec<CellKey>> {
        let target = d.target();
        let mut touched = false;
        let mut cells: Vec<CellKey> = Vec::new();
        for &e in &self.changed {
            for u in self.graph.uses_touched(d, e, self.store) {
                touched = true;
                match (e, u.element, target, u.aggregate) {
                    (Element::Cell(k), Element::Column(_), Derivable::Column(c), false) => {
                        cells.push(CellKey::new(k.row, c));
                    }
                    (Element::Cell(k), Element::Row(_), Derivable::Row(r), false) => {
                        cells.push(CellKey::new(r, k.col));
                    }
                    _ => return Some(self.store.cells_of(target.element())),
                }
            }
        }
        if !touched {
            return None;
        }
        cells.sort();
        cells.dedup();
        Some(cells)
    }

    pub fn compute_cell(&mut self, d: &Derivation, cell: CellKey) {
        let outcome = Evaluator::new(self.store, &self.mapper, &*self.graph, &mut self.ctx)
            .evaluate(d.postfix(), Position::at(cell));
        self.settle(d, cell, outcome);
    }

    pub fn resume(
        &mut self,
        d: &Derivation,
        cell: CellKey,
        frame: Frame,
        value: Token,
    ) -> Result<Token, Suspension> {
        Evaluator::new(self.store, &self.mapper, &*self.graph, &mut self.ctx).resume(
            d.postfix(),
            Position::at(cell),
            frame,
            value,
        )
    }

    /// Write an evaluation outcome: a value, or a fresh pending state with
    /// the cell marked pending.
    pub fn settle(&mut self, d: &Derivation, cell: CellKey, outcome: Result<Token, Suspension>) {
        let (kind, task) = match outcome {
            Ok(tok) => {
                let value = tok.to_value().rounded(d.precision());
                self.write_cell(cell, value, None);
                return;
            }
            Err(Suspension::Awaiting { task, frame }) => (StateKind::Awaiting { frame }, task),
            Err(Suspension::Blocked { cell: on }) => (StateKind::Blocked { on }, None),
            Err(Suspension::BlockedStatistic { elements, cells }) => (
                StateKind::BlockedStatistic {
                    elements,
                    waiting: cells.into_iter().collect::<FxHashSet<_>>(),
                },
                None,
            ),
        };
        let waits = !matches!(kind, StateKind::Awaiting { .. });
        self.registry.supersede(cell, None, self.store, self.pool);
        let state = self.registry.register(PendingState::new(d, cell, kind));
        if let Some(task) = task {
            self.ctx.queue(state.id(), task);
        }
        // the prior value is dropped so readers block on the new one
        self.write_cell(cell, Value::Pending, Some(state.id()));
        if waits {
            self.blocked.push(state);
        }
    }

    /// Store `value`, retiring any pending state on the cell other than
    /// `keep`.
    pub fn write_cell(&mut self, cell: CellKey, value: Value, keep: Option<CorrelationId>) {
        let prior = self.store.get_cell(cell.row, cell.col);
        self.registry.supersede(cell, keep, self.store, self.pool);
        let now_pending = value.is_pending();
        if self.store.set_cell(cell.row, cell.col, value) {
            self.note_changed(Element::Cell(cell));
        }
        if prior.is_pending() && !now_pending {
            self.resolved.push(cell);
        }
    }

    /// Replay every derivation affected by the changes recorded so far.
    /// `applied` derivations already ran in this pass.
    pub fn cascade(&mut self, applied: &[Derivable]) {
        if self.changed.is_empty() && applied.is_empty() {
            return;
        }
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("recalculate", changed = self.changed.len()).entered();
        let order = Scheduler::new(&self.graph, self.store).affected_order(&self.changed, applied);
        for t in order {
            self.apply(t, false);
        }
    }

    /// Hand queued tasks to the pool. Returns the cells that resolved and
    /// the states created blocked.
    pub fn finish(
        mut self,
        poster: Weak<dyn ResultPoster>,
    ) -> (Vec<CellKey>, Vec<Arc<PendingState>>) {
        for (id, task) in self.ctx.take_queued() {
            // superseded later in the same pass
            if self.registry.get(id).is_some() {
                self.pool.submit(id, task, poster.clone());
            }
        }
        (self.resolved, self.blocked)
    }
}
