//! C3: Cost-Function Manager.
//!
//! Owns the reduced-cost vector driving the simplex's choice of entering
//! variable: either the core feasibility cost (pushes out-of-bounds basics
//! toward their violated bound) or a user-supplied linear form (the SoI
//! manager's phase-pattern cost, toggled in via
//! [`crate::tableau::Tableau::toggle_optimization`]).
//!
//! Grounded on the teacher crate's state-machine-flavored components (e.g.
//! `ConstantMuUpdate`/`AdaptiveMuUpdate` in `src/lp/mpc/mu_update.rs`): a
//! small enum of freshness states plus a `#[use_option]` knob.

use macros::use_option;

use crate::tableau::Tableau;
use crate::{SolverOptions, E, I};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostStatus {
    Invalid,
    /// Repaired incrementally after the last pivot (`adjustBasicCostAccuracy`).
    Updated,
    /// Freshly recomputed from scratch by `computeCoreCostFunction` or
    /// `computeGivenCostFunction`.
    JustComputed,
}

/// A user-supplied linear cost term: `coefficient * variable`, summed to
/// build the SoI's `heuristicCost` (§4.8).
#[derive(Debug, Clone, Copy)]
pub struct CostAddend {
    pub variable: I,
    pub coefficient: E,
}

#[use_option(
    name = "cost_drift_rescale_threshold",
    type_ = f64,
    default = "1e6",
    description = "Magnitude above which adjustBasicCostAccuracy forces a full recompute instead of an incremental repair"
)]
pub struct CostFunctionManager {
    /// One entry per variable; zero for basics (cost is expressed only over
    /// non-basics once priced out through the basis).
    costs: Vec<E>,
    status: CostStatus,
    optimizing: bool,
    rescale_threshold: E,
}

impl CostFunctionManager {
    pub fn new(n: usize, options: &SolverOptions) -> Self {
        Self {
            costs: vec![0.0; n],
            status: CostStatus::Invalid,
            optimizing: false,
            rescale_threshold: options.get_option::<f64>("cost_drift_rescale_threshold").unwrap(),
        }
    }

    pub fn status(&self) -> CostStatus {
        self.status
    }

    pub fn cost_function_invalid(&self) -> bool {
        self.status == CostStatus::Invalid
    }

    pub fn cost_function_just_computed(&self) -> bool {
        self.status == CostStatus::JustComputed
    }

    pub fn invalidate_cost_function(&mut self) {
        self.status = CostStatus::Invalid;
    }

    pub fn costs(&self) -> &[E] {
        &self.costs
    }

    /// Builds the core feasibility cost: `+1` on a non-basic whose entering
    /// would help an out-of-bounds basic above its upper bound, `-1` for
    /// below its lower bound, accumulated across every row the non-basic
    /// participates in via the current tableau row.
    pub fn compute_core_cost_function(&mut self, tableau: &Tableau) {
        self.costs.iter_mut().for_each(|c| *c = 0.0);
        self.optimizing = false;

        for &basic_var in tableau.basic_variables() {
            let row = tableau
                .basic_variables()
                .iter()
                .position(|&v| v == basic_var)
                .expect("basic_var is in basic_variables");
            let out_of_bounds = tableau.out_of_bounds_basics();
            if !out_of_bounds.contains(&basic_var) {
                continue;
            }
            let sign = if tableau.get_value(basic_var) > 0.0 { 1.0 } else { -1.0 };
            let pivot_row = tableau.compute_pivot_row(row);
            for (j, &coeff) in pivot_row.iter().enumerate() {
                if tableau.is_basic(j) || coeff.abs() < crate::EPSILON {
                    continue;
                }
                self.costs[j] -= sign * coeff;
            }
        }

        self.status = CostStatus::JustComputed;
    }

    /// Builds the cost for a user-supplied linear form (SoI's heuristic
    /// cost): the reduced cost of each addend's variable, summed.
    pub fn compute_given_cost_function(&mut self, tableau: &Tableau, addends: &[CostAddend]) {
        self.costs.iter_mut().for_each(|c| *c = 0.0);
        self.optimizing = true;

        for addend in addends {
            if tableau.is_basic(addend.variable) {
                let row = tableau
                    .basic_variables()
                    .iter()
                    .position(|&v| v == addend.variable)
                    .unwrap();
                let pivot_row = tableau.compute_pivot_row(row);
                for (j, &coeff) in pivot_row.iter().enumerate() {
                    if tableau.is_basic(j) || coeff.abs() < crate::EPSILON {
                        continue;
                    }
                    self.costs[j] -= addend.coefficient * coeff;
                }
            } else {
                self.costs[addend.variable] += addend.coefficient;
            }
        }

        self.status = CostStatus::JustComputed;
    }

    /// Incremental repair after a pivot (§4.2): `delta = reduced_cost of the
    /// leaving variable / pivot element`, applied to every non-basic via the
    /// pivot column passed by the engine. Falls back to a full recompute if
    /// the repaired magnitude drifts past the rescale threshold — the
    /// teacher's `AdaptiveMuUpdate` clamps similarly rather than ever
    /// emitting an unbounded value.
    pub fn adjust_basic_cost_accuracy(
        &mut self,
        entering: I,
        leaving_row: usize,
        pivot_column: &[E],
        entering_reduced_cost: E,
    ) {
        let pivot = pivot_column[leaving_row];
        if pivot.abs() < crate::EPSILON {
            self.status = CostStatus::Invalid;
            return;
        }
        let delta = entering_reduced_cost / pivot;
        for (j, &coeff) in pivot_column.iter().enumerate() {
            if j == entering {
                continue;
            }
            self.costs[j] -= delta * coeff;
        }
        if self.costs.iter().any(|c| c.abs() > self.rescale_threshold) {
            self.status = CostStatus::Invalid;
        } else {
            self.status = CostStatus::Updated;
        }
    }

    /// §4.2 invariant: when out-of-bounds basics exist and the cost is
    /// freshly computed, it must contain a non-zero entry.
    pub fn verify_nonzero_when_needed(&self, out_of_bounds_basics_exist: bool) -> bool {
        if !out_of_bounds_basics_exist || self.status != CostStatus::JustComputed {
            return true;
        }
        self.costs.iter().any(|&c| c.abs() > crate::EPSILON)
    }

    pub fn is_optimizing(&self) -> bool {
        self.optimizing
    }
}
