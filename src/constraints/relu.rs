//! `f = relu(b) = max(b, 0)`, the archetypal two-phase PL constraint: other
//! variants (`AbsoluteValue`, `Sign`) are thin siblings of the same shape.

use super::{CaseSplit, Fix, PiecewiseLinearConstraint};
use crate::bounds::BoundKind;
use crate::tableau::Tableau;
use crate::{E, I};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    Inactive,
}

#[derive(Debug, Clone)]
pub struct ReLU {
    b: I,
    f: I,
    phase: Option<Phase>,
    /// Which phase the `Polarity` branching strategy should try first,
    /// re-derived by `update_direction` from the current bound midpoint.
    preferred: Phase,
    active: bool,
    lower_b: E,
    upper_b: E,
    score: E,
}

impl ReLU {
    pub fn new(b: I, f: I) -> Self {
        Self {
            b,
            f,
            phase: None,
            preferred: Phase::Active,
            active: true,
            lower_b: E::NEG_INFINITY,
            upper_b: E::INFINITY,
            score: 0.0,
        }
    }

    fn relu(x: E) -> E {
        x.max(0.0)
    }
}

impl PiecewiseLinearConstraint for ReLU {
    fn participating_variables(&self) -> Vec<I> {
        vec![self.b, self.f]
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn satisfied(&self, assignment: &[E]) -> bool {
        (assignment[self.f] - Self::relu(assignment[self.b])).abs() < crate::EPSILON
    }

    fn phase_fixed(&self) -> bool {
        self.phase.is_some()
    }

    fn get_possible_fixes(&self, assignment: &[E]) -> Vec<Fix> {
        let b = assignment[self.b];
        let f = assignment[self.f];
        let relu_b = Self::relu(b);
        if (f - relu_b).abs() < crate::EPSILON {
            return Vec::new();
        }
        let mut fixes = vec![Fix { variable: self.f, value: relu_b }];
        if f > 0.0 {
            fixes.push(Fix { variable: self.b, value: f });
        } else {
            fixes.push(Fix { variable: self.b, value: b.min(0.0) });
        }
        fixes
    }

    fn get_smart_fixes(&self, tableau: &Tableau, assignment: &[E]) -> Vec<Fix> {
        let mut fixes = self.get_possible_fixes(assignment);
        fixes.sort_by_key(|fix| tableau.is_basic(fix.variable));
        fixes
    }

    fn get_valid_case_split(&self) -> Option<CaseSplit> {
        match self.phase? {
            Phase::Active => Some(
                CaseSplit::bound(self.b, BoundKind::Lower, self.lower_b.max(0.0))
                    .with_equation(vec![(self.f, 1.0), (self.b, -1.0)]),
            ),
            Phase::Inactive => Some(
                CaseSplit::bound(self.b, BoundKind::Upper, self.upper_b.min(0.0))
                    .with_equation(vec![(self.f, 1.0)]),
            ),
        }
    }

    fn get_case_splits(&self) -> Vec<CaseSplit> {
        let active = CaseSplit::bound(self.b, BoundKind::Lower, self.lower_b.max(0.0))
            .with_equation(vec![(self.f, 1.0), (self.b, -1.0)]);
        let inactive = CaseSplit::bound(self.b, BoundKind::Upper, self.upper_b.min(0.0))
            .with_equation(vec![(self.f, 1.0)]);
        match self.preferred {
            Phase::Active => vec![active, inactive],
            Phase::Inactive => vec![inactive, active],
        }
    }

    fn support_polarity(&self) -> bool {
        true
    }

    /// The `Polarity` branching strategy tries the phase whose midpoint
    /// bias is stronger first: a bound interval mostly above zero suggests
    /// active is more likely to hold.
    fn update_direction(&mut self) {
        if self.phase.is_some() || !self.lower_b.is_finite() || !self.upper_b.is_finite() {
            return;
        }
        self.preferred = if self.lower_b + self.upper_b >= 0.0 {
            Phase::Active
        } else {
            Phase::Inactive
        };
    }

    fn score(&self) -> E {
        self.score
    }

    fn add_to_score(&mut self, delta: E) {
        self.score += delta;
    }

    fn notify_lower_bound(&mut self, variable: I, bound: E) {
        if variable != self.b || bound <= self.lower_b {
            return;
        }
        self.lower_b = bound;
        if self.lower_b >= 0.0 {
            self.phase = Some(Phase::Active);
            self.active = false;
        }
    }

    fn notify_upper_bound(&mut self, variable: I, bound: E) {
        if variable != self.b || bound >= self.upper_b {
            return;
        }
        self.upper_b = bound;
        if self.upper_b <= 0.0 {
            self.phase = Some(Phase::Inactive);
            self.active = false;
        }
    }

    fn add_auxiliary_equations_after_preprocessing(&self) -> Vec<(Vec<(I, E)>, I)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfied_checks_relu_identity() {
        let r = ReLU::new(0, 1);
        assert!(r.satisfied(&[-2.0, 0.0]));
        assert!(r.satisfied(&[2.0, 2.0]));
        assert!(!r.satisfied(&[2.0, 0.0]));
    }

    #[test]
    fn lower_bound_at_zero_fixes_active_phase() {
        let mut r = ReLU::new(0, 1);
        r.notify_lower_bound(0, 0.0);
        assert!(r.phase_fixed());
        assert!(!r.is_active());
        let split = r.get_valid_case_split().unwrap();
        assert_eq!(split.equations[0], vec![(1, 1.0), (0, -1.0)]);
    }

    #[test]
    fn upper_bound_at_zero_fixes_inactive_phase() {
        let mut r = ReLU::new(0, 1);
        r.notify_upper_bound(0, 0.0);
        assert!(r.phase_fixed());
        let split = r.get_valid_case_split().unwrap();
        assert_eq!(split.equations[0], vec![(1, 1.0)]);
    }

    #[test]
    fn possible_fixes_empty_when_satisfied() {
        let r = ReLU::new(0, 1);
        assert!(r.get_possible_fixes(&[1.0, 1.0]).is_empty());
    }

    #[test]
    fn possible_fixes_propose_repair_when_violated() {
        let r = ReLU::new(0, 1);
        let fixes = r.get_possible_fixes(&[2.0, 0.0]);
        assert!(fixes.iter().any(|f| f.variable == 1 && (f.value - 2.0).abs() < 1e-9));
    }
}
