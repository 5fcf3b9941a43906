//! A general `k`-way disjunction of caller-supplied linear cases (e.g. `x <=
//! 0 \/ x >= 1`), rather than a derived two-phase shape. Each disjunct is
//! exactly the [`CaseSplit`] applied if that branch is taken, so the SMT
//! core enumerates them the same way it does `ReLU`'s phases.

use super::{CaseSplit, Fix, PiecewiseLinearConstraint};
use crate::tableau::Tableau;
use crate::{E, I};

#[derive(Debug, Clone)]
pub struct Disjunction {
    disjuncts: Vec<CaseSplit>,
    phase: Option<usize>,
    active: bool,
    score: E,
}

impl Disjunction {
    pub fn new(disjuncts: Vec<CaseSplit>) -> Self {
        Self {
            disjuncts,
            phase: None,
            active: true,
            score: 0.0,
        }
    }

    fn case_satisfied(split: &CaseSplit, assignment: &[E]) -> bool {
        split.tightenings.iter().all(|&(var, kind, value)| {
            let v = assignment[var];
            match kind {
                crate::bounds::BoundKind::Lower => v >= value - crate::EPSILON,
                crate::bounds::BoundKind::Upper => v <= value + crate::EPSILON,
            }
        }) && split
            .equations
            .iter()
            .all(|eq| eq.iter().map(|&(var, c)| c * assignment[var]).sum::<E>().abs() < crate::EPSILON)
    }
}

impl PiecewiseLinearConstraint for Disjunction {
    fn participating_variables(&self) -> Vec<I> {
        let mut vars: Vec<I> = self
            .disjuncts
            .iter()
            .flat_map(|split| {
                split
                    .tightenings
                    .iter()
                    .map(|&(v, _, _)| v)
                    .chain(split.equations.iter().flat_map(|eq| eq.iter().map(|&(v, _)| v)))
            })
            .collect();
        vars.sort_unstable();
        vars.dedup();
        vars
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn satisfied(&self, assignment: &[E]) -> bool {
        self.disjuncts.iter().any(|d| Self::case_satisfied(d, assignment))
    }

    fn phase_fixed(&self) -> bool {
        self.phase.is_some()
    }

    fn get_possible_fixes(&self, _assignment: &[E]) -> Vec<Fix> {
        // A disjunction has no single local repair: the SMT core must
        // branch on it rather than attempt a direct fix.
        Vec::new()
    }

    fn get_smart_fixes(&self, _tableau: &Tableau, _assignment: &[E]) -> Vec<Fix> {
        Vec::new()
    }

    fn get_valid_case_split(&self) -> Option<CaseSplit> {
        self.phase.map(|i| self.disjuncts[i].clone())
    }

    fn get_case_splits(&self) -> Vec<CaseSplit> {
        self.disjuncts.clone()
    }

    fn support_polarity(&self) -> bool {
        false
    }

    fn update_direction(&mut self) {}

    fn score(&self) -> E {
        self.score
    }

    fn add_to_score(&mut self, delta: E) {
        self.score += delta;
    }

    fn notify_lower_bound(&mut self, _variable: I, _bound: E) {}

    fn notify_upper_bound(&mut self, _variable: I, _bound: E) {}

    fn add_auxiliary_equations_after_preprocessing(&self) -> Vec<(Vec<(I, E)>, I)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::BoundKind;

    #[test]
    fn satisfied_if_any_disjunct_holds() {
        let d = Disjunction::new(vec![
            CaseSplit::bound(0, BoundKind::Upper, 0.0),
            CaseSplit::bound(0, BoundKind::Lower, 1.0),
        ]);
        assert!(d.satisfied(&[-1.0]));
        assert!(d.satisfied(&[2.0]));
        assert!(!d.satisfied(&[0.5]));
    }

    #[test]
    fn get_case_splits_returns_all_disjuncts() {
        let d = Disjunction::new(vec![
            CaseSplit::bound(0, BoundKind::Upper, 0.0),
            CaseSplit::bound(0, BoundKind::Lower, 1.0),
        ]);
        assert_eq!(d.get_case_splits().len(), 2);
    }
}
