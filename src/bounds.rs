//! C1: Bound Manager.
//!
//! Authoritative per-variable `[lb, ub]` storage with a context stack for
//! `storeLocal`/`restoreLocal` (called by the SMT core on case-split
//! entry/exit) and a pending-tightening queue drained by the tableau.

use std::collections::VecDeque;

use crate::{error::EngineError, E, EPSILON, I};

/// One variable's bound got tightened, either from the tableau's row
/// reasoning, a PL constraint's `notifyLowerBound`/`notifyUpperBound`, or
/// the external NLR.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tightening {
    pub variable: I,
    pub kind: BoundKind,
    pub value: E,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Lower,
    Upper,
}

/// Authoritative bounds for every variable, with a context stack and a
/// pending-tightening queue (C1).
#[derive(Debug, Clone)]
pub struct BoundManager {
    lower: Vec<E>,
    upper: Vec<E>,
    context_stack: Vec<(Vec<E>, Vec<E>)>,
    pending: VecDeque<Tightening>,
}

impl BoundManager {
    pub fn new(n: usize) -> Self {
        Self {
            lower: vec![0.0; n],
            upper: vec![0.0; n],
            context_stack: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn num_variables(&self) -> usize {
        self.lower.len()
    }

    /// Grows the bound arrays to accommodate auxiliary variables introduced
    /// by equation conversion or split-time merging (§3 Lifecycle).
    pub fn extend_to(&mut self, n: usize) {
        if n > self.lower.len() {
            self.lower.resize(n, E::NEG_INFINITY);
            self.upper.resize(n, E::INFINITY);
        }
    }

    pub fn initialize_bounds(&mut self, variable: I, lb: E, ub: E) {
        self.lower[variable] = lb;
        self.upper[variable] = ub;
    }

    pub fn get_lower_bound(&self, variable: I) -> E {
        self.lower[variable]
    }

    pub fn get_upper_bound(&self, variable: I) -> E {
        self.upper[variable]
    }

    /// Tightens `variable`'s lower bound to `value` if that's an actual
    /// improvement, queuing the tightening for the tableau. A no-op (no
    /// queue growth) if `value` does not improve on the current bound —
    /// this is what makes repeated application of the same tightening
    /// idempotent.
    pub fn tighten_lower_bound(&mut self, variable: I, value: E) {
        if value > self.lower[variable] + EPSILON {
            self.lower[variable] = value;
            self.pending.push_back(Tightening {
                variable,
                kind: BoundKind::Lower,
                value,
            });
        }
    }

    pub fn tighten_upper_bound(&mut self, variable: I, value: E) {
        if value < self.upper[variable] - EPSILON {
            self.upper[variable] = value;
            self.pending.push_back(Tightening {
                variable,
                kind: BoundKind::Upper,
                value,
            });
        }
    }

    /// Drains the pending-tightening queue in FIFO order (§5 Ordering).
    /// Draining an empty queue is a no-op and returns an empty vector.
    pub fn get_tightenings(&mut self) -> Vec<Tightening> {
        self.pending.drain(..).collect()
    }

    pub fn has_pending_tightenings(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Pushes a snapshot of the current bounds onto the context stack
    /// (called at case-split entry).
    pub fn store_local(&mut self) {
        self.context_stack.push((self.lower.clone(), self.upper.clone()));
    }

    /// Pops the most recent snapshot, overwriting the live bounds (called at
    /// case-split exit). Panics if the stack is empty, mirroring a logic
    /// error in the caller rather than a recoverable condition.
    pub fn restore_local(&mut self) {
        let (lower, upper) = self
            .context_stack
            .pop()
            .expect("restore_local called with an empty context stack");
        self.lower = lower;
        self.upper = upper;
        self.pending.clear();
    }

    pub fn context_depth(&self) -> usize {
        self.context_stack.len()
    }

    /// I3: `lb <= ub + epsilon` for every variable.
    pub fn consistent_bounds(&self) -> Result<(), EngineError> {
        for (i, (&lb, &ub)) in self.lower.iter().zip(self.upper.iter()).enumerate() {
            if lb > ub + EPSILON {
                return Err(EngineError::InconsistentBounds {
                    variable: i,
                    lb,
                    ub,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> BoundManager {
        let mut m = BoundManager::new(3);
        m.initialize_bounds(0, -1.0, 1.0);
        m.initialize_bounds(1, 0.0, 1.0);
        m.initialize_bounds(2, -5.0, 5.0);
        m
    }

    #[test]
    fn tightening_queues_and_applies() {
        let mut m = manager();
        m.tighten_lower_bound(0, 0.2);
        assert_eq!(m.get_lower_bound(0), 0.2);
        let drained = m.get_tightenings();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].variable, 0);
        assert_eq!(drained[0].kind, BoundKind::Lower);
    }

    #[test]
    fn repeated_tightening_is_idempotent() {
        let mut m = manager();
        m.tighten_lower_bound(0, 0.2);
        m.get_tightenings();
        m.tighten_lower_bound(0, 0.2);
        assert!(m.get_tightenings().is_empty());
        assert_eq!(m.get_lower_bound(0), 0.2);
    }

    #[test]
    fn draining_empty_queue_is_noop() {
        let mut m = manager();
        assert!(m.get_tightenings().is_empty());
        assert!(m.get_tightenings().is_empty());
    }

    #[test]
    fn store_and_restore_local_round_trips() {
        let mut m = manager();
        m.store_local();
        m.tighten_lower_bound(1, 0.5);
        m.tighten_upper_bound(2, 1.0);
        assert_eq!(m.get_lower_bound(1), 0.5);
        m.restore_local();
        assert_eq!(m.get_lower_bound(1), 0.0);
        assert_eq!(m.get_upper_bound(2), 5.0);
        assert!(m.get_tightenings().is_empty());
    }

    #[test]
    fn inconsistent_bounds_detected() {
        let mut m = manager();
        m.initialize_bounds(0, 2.0, 1.0);
        assert!(m.consistent_bounds().is_err());
    }
}
