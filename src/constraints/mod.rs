//! C5: PL-Constraint Registry.
//!
//! A closed set of piecewise-linear constraint variants behind one capability
//! trait, dispatched with `enum_dispatch` rather than `Box<dyn Trait>` (Design
//! Notes §9: "avoid open-ended inheritance... visitors closed over the known
//! variants" — the teacher declares `enum_dispatch` in `Cargo.toml` but never
//! uses it; this is its first real use). Duplication (`duplicate`) and state
//! restore (`restoreState`) are implemented directly on the enum via `Clone`
//! rather than through the trait, since both need the concrete sibling type
//! rather than a trait-object view.

pub mod absolute_value;
pub mod disjunction;
pub mod max_constraint;
pub mod relu;
pub mod sign;

use enum_dispatch::enum_dispatch;

pub use absolute_value::AbsoluteValue;
pub use disjunction::Disjunction;
pub use max_constraint::Max;
pub use relu::ReLU;
pub use sign::Sign;

use crate::bounds::BoundKind;
use crate::tableau::Tableau;
use crate::{E, I};

/// A proposed `variable := value` assignment that would locally satisfy a
/// constraint (§4.5 "fixes").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub variable: I,
    pub value: E,
}

/// One phase's worth of linear consequences: bound tightenings plus, for
/// variants whose phase introduces a new linear equality (e.g. ReLU's
/// `f = b` on the active phase), the equation's coefficients (`sum c_i x_i
/// = 0`, merged into the tableau as an additional row via
/// `Tableau::add_equation`-style preprocessing).
#[derive(Debug, Clone, Default)]
pub struct CaseSplit {
    pub tightenings: Vec<(I, BoundKind, E)>,
    pub equations: Vec<Vec<(I, E)>>,
}

impl CaseSplit {
    pub fn bound(variable: I, kind: BoundKind, value: E) -> Self {
        Self {
            tightenings: vec![(variable, kind, value)],
            equations: Vec::new(),
        }
    }

    pub fn with_equation(mut self, equation: Vec<(I, E)>) -> Self {
        self.equations.push(equation);
        self
    }

    /// Pins `variable` to the constant `value` via a lower and an upper
    /// tightening, for phases that fix a variable to a specific number
    /// rather than relate it linearly to others (e.g. `Sign`'s `f = +-1`).
    pub fn with_fixed(mut self, variable: I, value: E) -> Self {
        self.tightenings.push((variable, BoundKind::Lower, value));
        self.tightenings.push((variable, BoundKind::Upper, value));
        self
    }
}

/// Capabilities every concrete PL constraint exposes to the SMT core, the
/// row tightener, and the SoI manager (§4.5).
#[enum_dispatch]
pub trait PiecewiseLinearConstraint {
    fn participating_variables(&self) -> Vec<I>;

    /// `false` once the phase has been fixed and its equation merged into
    /// the tableau — the constraint no longer needs watching.
    fn is_active(&self) -> bool;

    fn satisfied(&self, assignment: &[E]) -> bool;

    fn phase_fixed(&self) -> bool;

    /// Candidate `variable := value` repairs that would make the constraint
    /// satisfied under the current assignment, without regard to cost.
    fn get_possible_fixes(&self, assignment: &[E]) -> Vec<Fix>;

    /// Like `get_possible_fixes`, but ranked to prefer touching a non-basic
    /// variable (no pivot needed) over a basic one (§4.5 "smart fix").
    fn get_smart_fixes(&self, tableau: &Tableau, assignment: &[E]) -> Vec<Fix>;

    /// `Some` once `phase_fixed` is true: the single case split implied by
    /// the already-determined phase.
    fn get_valid_case_split(&self) -> Option<CaseSplit>;

    /// Every case split this constraint could be branched into (one per
    /// phase), used by the SMT core when it is chosen for branching.
    fn get_case_splits(&self) -> Vec<CaseSplit>;

    fn support_polarity(&self) -> bool;

    /// Re-derives the preferred branching direction from the current cached
    /// bounds (used by the `Polarity` branching strategy).
    fn update_direction(&mut self);

    fn score(&self) -> E;

    fn add_to_score(&mut self, delta: E);

    fn notify_lower_bound(&mut self, variable: I, bound: E);

    fn notify_upper_bound(&mut self, variable: I, bound: E);

    /// Auxiliary equations (coefficients, fresh auxiliary variable index)
    /// this constraint needs merged into the tableau once preprocessing has
    /// finished assigning variable indices. Most variants need none.
    fn add_auxiliary_equations_after_preprocessing(&self) -> Vec<(Vec<(I, E)>, I)>;
}

#[enum_dispatch(PiecewiseLinearConstraint)]
#[derive(Debug, Clone)]
pub enum PlConstraint {
    ReLU,
    AbsoluteValue,
    Max,
    Disjunction,
    Sign,
}

impl PlConstraint {
    /// Snapshot copy (§4.5 `duplicate`), restored later via `restore_state`.
    pub fn duplicate(&self) -> PlConstraint {
        self.clone()
    }

    /// Restores this constraint's mutable state from a prior `duplicate()`
    /// (§4.5 `restoreState`), e.g. after a case-split pop.
    pub fn restore_state(&mut self, snapshot: &PlConstraint) {
        *self = snapshot.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_then_restore_round_trips() {
        let mut c: PlConstraint = ReLU::new(0, 1).into();
        let snapshot = c.duplicate();
        c.notify_lower_bound(0, 3.0);
        assert!(c.phase_fixed());
        c.restore_state(&snapshot);
        assert!(!c.phase_fixed());
    }
}
