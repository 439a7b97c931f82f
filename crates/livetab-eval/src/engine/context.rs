use std::sync::Arc;

use rustc_hash::FxHashMap;

use livetab_common::Element;
use livetab_parse::PendingTask;

use super::graph::Region;
use super::pending::CorrelationId;
use crate::stats::{BivariateStats, UnivariateStats};
use crate::traits::TableStore;

/// Per-pass scratch state shared by every derivation replayed in one
/// recalculation cascade.
#[derive(Default)]
pub struct DerivationContext {
    univariate: FxHashMap<Element, Arc<UnivariateStats>>,
    bivariate: FxHashMap<(Element, Element), Arc<BivariateStats>>,
    queued: Vec<(CorrelationId, PendingTask)>,
}

impl DerivationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached engine for `element`. One without a retained dataset is not
    /// returned when `needs_dataset` is set, so the caller rebuilds it.
    pub fn univariate(&self, element: Element, needs_dataset: bool) -> Option<Arc<UnivariateStats>> {
        self.univariate
            .get(&element)
            .filter(|s| !needs_dataset || s.has_dataset())
            .cloned()
    }

    pub fn cache_univariate(&mut self, element: Element, stats: Arc<UnivariateStats>) {
        self.univariate.insert(element, stats);
    }

    pub fn bivariate(&self, y: Element, x: Element) -> Option<Arc<BivariateStats>> {
        self.bivariate.get(&(y, x)).cloned()
    }

    pub fn cache_bivariate(&mut self, y: Element, x: Element, stats: Arc<BivariateStats>) {
        self.bivariate.insert((y, x), stats);
    }

    /// Drop every cached engine summarising an element that overlaps
    /// `written`; pair engines go when either side overlaps.
    pub fn invalidate(&mut self, written: Element, store: &dyn TableStore) {
        if self.univariate.is_empty() && self.bivariate.is_empty() {
            return;
        }
        let w = Region::of(written, store);
        let hit = |e: &Element| w.overlaps(&Region::of(*e, store));
        self.univariate.retain(|e, _| !hit(e));
        self.bivariate.retain(|(a, b), _| !hit(a) && !hit(b));
    }

    pub fn queue(&mut self, id: CorrelationId, task: PendingTask) {
        self.queued.push((id, task));
    }

    pub fn take_queued(&mut self) -> Vec<(CorrelationId, PendingTask)> {
        std::mem::take(&mut self.queued)
    }

    pub fn cached_len(&self) -> usize {
        self.univariate.len() + self.bivariate.len()
    }
}
