//! C4: Row Bound Tightener.
//!
//! Derives tighter variable bounds by interval-arithmetic reasoning over
//! tableau rows and emits them as [`crate::bounds::Tightening`]s into the
//! bound manager's pending queue; the engine drains that queue back into
//! the tableau (§4.3, §5 "Ordering").

use macros::{build_option_enum, use_option};

use crate::bounds::BoundManager;
use crate::tableau::Tableau;
use crate::{SolverOptions, E, I};

pub trait RowBoundTightener {
    fn new(options: &SolverOptions) -> Self
    where
        Self: Sized;

    /// Derives tightenings from the current tableau and queues them into
    /// `bounds`. Returns the number of tightenings queued.
    fn tighten(&mut self, tableau: &Tableau, bounds: &mut BoundManager) -> usize;
}

/// For one row `sum_j a_j x_j = 0`, derive the tightest interval implied for
/// each participating variable by the current bounds on the others.
fn tighten_row(row: &[E], tableau: &Tableau, bounds: &mut BoundManager) -> usize {
    let mut queued = 0;
    for (target, &a_target) in row.iter().enumerate() {
        if a_target.abs() < crate::EPSILON {
            continue;
        }
        let mut lo = 0.0;
        let mut hi = 0.0;
        let mut unbounded_below = false;
        let mut unbounded_above = false;
        for (j, &a_j) in row.iter().enumerate() {
            if j == target || a_j.abs() < crate::EPSILON {
                continue;
            }
            let (lb, ub) = (tableau_lower(tableau, j), tableau_upper(tableau, j));
            if a_j > 0.0 {
                if ub.is_infinite() {
                    unbounded_above = true;
                } else {
                    hi += a_j * ub;
                }
                if lb.is_infinite() {
                    unbounded_below = true;
                } else {
                    lo += a_j * lb;
                }
            } else {
                if lb.is_infinite() {
                    unbounded_above = true;
                } else {
                    hi += a_j * lb;
                }
                if ub.is_infinite() {
                    unbounded_below = true;
                } else {
                    lo += a_j * ub;
                }
            }
        }

        // sum_{j != target} a_j x_j = -a_target x_target, so
        // x_target = -(sum_{j != target} a_j x_j) / a_target.
        if !unbounded_above {
            let bound = -lo / a_target;
            let (new_lb, new_ub) = if a_target > 0.0 { (None, Some(bound)) } else { (Some(bound), None) };
            if let Some(v) = new_lb {
                if v > bounds.get_lower_bound(target) + crate::EPSILON {
                    bounds.tighten_lower_bound(target, v);
                    queued += 1;
                }
            }
            if let Some(v) = new_ub {
                if v < bounds.get_upper_bound(target) - crate::EPSILON {
                    bounds.tighten_upper_bound(target, v);
                    queued += 1;
                }
            }
        }
        if !unbounded_below {
            let bound = -hi / a_target;
            let (new_lb, new_ub) = if a_target > 0.0 { (Some(bound), None) } else { (None, Some(bound)) };
            if let Some(v) = new_lb {
                if v > bounds.get_lower_bound(target) + crate::EPSILON {
                    bounds.tighten_lower_bound(target, v);
                    queued += 1;
                }
            }
            if let Some(v) = new_ub {
                if v < bounds.get_upper_bound(target) - crate::EPSILON {
                    bounds.tighten_upper_bound(target, v);
                    queued += 1;
                }
            }
        }
    }
    queued
}

fn tableau_lower(tableau: &Tableau, variable: I) -> E {
    // Non-basics' bounds live on the tableau directly; the row tightener
    // only ever reasons about rows, whose coefficients cover every
    // participating variable regardless of basic/non-basic status.
    tableau.lower_bound(variable)
}

fn tableau_upper(tableau: &Tableau, variable: I) -> E {
    tableau.upper_bound(variable)
}

/// Explicit inverted basis strategy (§4.3): materializes every row of
/// `F^-1 A` via `Tableau::get_tableau_row` and propagates on each.
#[use_option(
    name = "row_tightening_saturate",
    type_ = bool,
    default = "true",
    description = "Iterate row tightening until a pass produces no new tightenings"
)]
pub struct ExplicitBasisRowTightener {
    saturate: bool,
}

impl RowBoundTightener for ExplicitBasisRowTightener {
    fn new(options: &SolverOptions) -> Self {
        Self {
            saturate: options.get_option::<bool>("row_tightening_saturate").unwrap(),
        }
    }

    fn tighten(&mut self, tableau: &Tableau, bounds: &mut BoundManager) -> usize {
        let mut total = 0;
        loop {
            let mut round = 0;
            for row in 0..tableau.num_rows() {
                let r = tableau.get_tableau_row(row);
                round += tighten_row(&r, tableau, bounds);
            }
            total += round;
            if !self.saturate || round == 0 {
                break;
            }
        }
        total
    }
}

/// Direct constraint matrix strategy (§4.3): propagates on the original `A`
/// (before factorization), run at low frequency.
#[use_option(
    name = "constraint_matrix_tightening_frequency",
    type_ = usize,
    default = "10",
    description = "Run direct constraint-matrix tightening every N main-loop iterations"
)]
pub struct ConstraintMatrixRowTightener {
    frequency: usize,
    iterations_since_last: usize,
}

impl RowBoundTightener for ConstraintMatrixRowTightener {
    fn new(options: &SolverOptions) -> Self {
        Self {
            frequency: options.get_option::<usize>("constraint_matrix_tightening_frequency").unwrap(),
            iterations_since_last: 0,
        }
    }

    fn tighten(&mut self, tableau: &Tableau, bounds: &mut BoundManager) -> usize {
        self.iterations_since_last += 1;
        if self.iterations_since_last < self.frequency {
            return 0;
        }
        self.iterations_since_last = 0;

        let mut total = 0;
        for row in 0..tableau.num_rows() {
            let r = tableau.get_constraint_row(row);
            total += tighten_row(&r, tableau, bounds);
        }
        total
    }
}

build_option_enum!(
    trait_ = RowBoundTightener,
    name = "RowBoundTighteners",
    variants = (ExplicitBasisRowTightener, ConstraintMatrixRowTightener),
    new_arguments = (&SolverOptions,),
    doc_header = "Registry of row bound-tightening strategies available to the engine."
);

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;

    /// `a + b - s = 0`, `s` pinned to 3, `a, b in [0, 1]` each: tightening on
    /// this row should prove `a, b >= 1` exactly (since `b <= 1` forces
    /// `a >= 3 - 1 = 2`, clamped against its own `[0,1]` the bound manager
    /// would raise Infeasible — but the tightener itself should at least
    /// report the raw derived value 2.0 regardless of the variable's own
    /// range).
    fn build() -> (Tableau, BoundManager) {
        let a = Mat::from_fn(1, 3, |_row, col| [1.0, 1.0, -1.0][col]);
        let mut t = Tableau::new(1, 3, a).unwrap();
        t.set_bounds(0, 0.0, 1.0);
        t.set_bounds(1, 0.0, 1.0);
        t.set_bounds(2, 3.0, 3.0);
        t.initialize_tableau(vec![2]).unwrap();

        let mut b = BoundManager::new(3);
        b.initialize_bounds(0, 0.0, 1.0);
        b.initialize_bounds(1, 0.0, 1.0);
        b.initialize_bounds(2, 3.0, 3.0);
        (t, b)
    }

    #[test]
    fn explicit_basis_tightener_derives_new_lower_bound() {
        let (t, mut b) = build();
        let mut strategy = ExplicitBasisRowTightener { saturate: true };
        let queued = strategy.tighten(&t, &mut b);
        assert!(queued > 0);
        assert!(b.get_lower_bound(0) >= 2.0 - 1e-9);
        assert!(b.get_lower_bound(1) >= 2.0 - 1e-9);
    }

    #[test]
    fn constraint_matrix_tightener_respects_frequency() {
        let (t, mut b) = build();
        let mut strategy = ConstraintMatrixRowTightener { frequency: 3, iterations_since_last: 0 };
        assert_eq!(strategy.tighten(&t, &mut b), 0);
        assert_eq!(strategy.tighten(&t, &mut b), 0);
        assert!(strategy.tighten(&t, &mut b) > 0);
    }
}
