use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use livetab_common::{Derivable, Element};

use super::graph::DependencyGraph;
use crate::traits::TableStore;

pub struct Scheduler<'a> {
    graph: &'a DependencyGraph,
    store: &'a dyn TableStore,
}

impl<'a> Scheduler<'a> {
    pub fn new(graph: &'a DependencyGraph, store: &'a dyn TableStore) -> Self {
        Self { graph, store }
    }

    /// Derivations to replay after `changed` elements were written and the
    /// `applied` derivations already ran, ordered so that every derivation
    /// comes after the derivations it reads. `applied` targets are not part
    /// of the result.
    pub fn affected_order(&self, changed: &[Element], applied: &[Derivable]) -> Vec<Derivable> {
        // 1. Transitive closure of affected derivations (breadth first)
        let mut seen: FxHashSet<Derivable> = FxHashSet::default();
        let mut queue: VecDeque<Derivable> = VecDeque::new();
        for &e in changed {
            for t in self.graph.dependents_of(e, self.store) {
                if seen.insert(t) {
                    queue.push_back(t);
                }
            }
        }
        for a in applied {
            if let Some(d) = self.graph.get(a) {
                for t in self.graph.derivation_dependents(d, self.store) {
                    if seen.insert(t) {
                        queue.push_back(t);
                    }
                }
            }
        }

        let mut closure: Vec<Derivable> = Vec::new();
        let mut preds: FxHashMap<Derivable, Vec<Derivable>> = FxHashMap::default();
        while let Some(t) = queue.pop_front() {
            closure.push(t);
            let Some(d) = self.graph.get(&t) else {
                continue;
            };
            for next in self.graph.derivation_dependents(d, self.store) {
                if next != t {
                    preds.entry(next).or_default().push(t);
                }
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        // 2. Resolve predecessors before each derivation (iterative DFS).
        //    `visiting` guards against cycles that slipped past creation.
        let mut resolved: FxHashSet<Derivable> = FxHashSet::default();
        let mut visiting: FxHashSet<Derivable> = FxHashSet::default();
        let mut order: Vec<Derivable> = Vec::with_capacity(closure.len());
        for &root in &closure {
            if resolved.contains(&root) {
                continue;
            }
            let mut stack: Vec<(Derivable, bool)> = vec![(root, false)];
            while let Some((v, expanded)) = stack.pop() {
                if expanded {
                    if resolved.insert(v) {
                        order.push(v);
                    }
                    continue;
                }
                if resolved.contains(&v) || !visiting.insert(v) {
                    continue;
                }
                stack.push((v, true));
                if let Some(ps) = preds.get(&v) {
                    for &p in ps.iter().rev() {
                        if !resolved.contains(&p) && !visiting.contains(&p) {
                            stack.push((p, false));
                        }
                    }
                }
            }
        }

        // 3. The already-applied derivations are not replayed
        order.retain(|t| !applied.contains(t));
        order
    }
}
