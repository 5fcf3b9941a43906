//! Entering-variable selection for the revised simplex (§4.1 "Pivot
//! quality"): the tableau itself never chooses an entering variable, it
//! only reports which non-basics are eligible given the current reduced
//! costs. Grounded on the teacher crate's per-component strategy traits
//! (e.g. `MuUpdate`, `LineSearch` in `src/lp/mpc/`) — a trait plus one
//! `#[use_option]`-bearing default implementation, registered through
//! `build_option_enum!`.

use macros::{build_option_enum, use_option};

use crate::{tableau::NonBasicStatus, SolverOptions, E, I};

/// Proposes non-basic variables as entering-variable candidates, ranked
/// best first. Does not see bounds or the basis directly; the tableau
/// hands it exactly the information needed to rank (reduced costs and
/// non-basic status).
pub trait EntryStrategy {
    fn new(options: &SolverOptions) -> Self
    where
        Self: Sized;

    /// Returns non-basic variable indices favorable to enter, i.e. those
    /// whose reduced cost sign would decrease the cost if the variable
    /// moved off its current bound, ranked best-first.
    fn candidates(&mut self, reduced_costs: &[E], status: &[NonBasicStatus]) -> Vec<I>;

    /// Called after a (possibly degenerate) pivot so the strategy can
    /// update any per-variable state (e.g. Devex reference weights).
    fn notify_pivot(&mut self, entering: I, leaving: I, pivot_column: &[E], pivot_row_index: usize);

    /// Resets any accumulated per-variable state, e.g. after a basis
    /// factorization refresh invalidates cached pivot-row information.
    fn reset(&mut self, n: usize);
}

/// Devex-style approximate steepest-edge pricing (§4.1's default).
///
/// Maintains a reference weight per variable, seeded at 1 and updated
/// after each pivot from the pivot column, so that `score = cost^2 /
/// weight` approximates the true steepest-edge ratio without
/// materializing `F^-1 A` for every column.
#[use_option(
    name = "steepest_edge_candidate_limit",
    type_ = usize,
    default = "5",
    description = "Maximum number of entry candidates reported per call"
)]
pub struct SteepestEdgeEntryStrategy {
    weights: Vec<E>,
    candidate_limit: usize,
}

impl EntryStrategy for SteepestEdgeEntryStrategy {
    fn new(options: &SolverOptions) -> Self {
        Self {
            weights: Vec::new(),
            candidate_limit: options
                .get_option::<usize>("steepest_edge_candidate_limit")
                .unwrap(),
        }
    }

    fn candidates(&mut self, reduced_costs: &[E], status: &[NonBasicStatus]) -> Vec<I> {
        if self.weights.len() != reduced_costs.len() {
            self.reset(reduced_costs.len());
        }

        let mut scored: Vec<(I, E)> = status
            .iter()
            .enumerate()
            .filter_map(|(j, s)| match s {
                NonBasicStatus::Basic => None,
                NonBasicStatus::AtLower if reduced_costs[j] < -crate::EPSILON => {
                    Some((j, reduced_costs[j] * reduced_costs[j] / self.weights[j]))
                }
                NonBasicStatus::AtUpper if reduced_costs[j] > crate::EPSILON => {
                    Some((j, reduced_costs[j] * reduced_costs[j] / self.weights[j]))
                }
                NonBasicStatus::Fixed => None,
                _ => None,
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(self.candidate_limit)
            .map(|(j, _)| j)
            .collect()
    }

    fn notify_pivot(&mut self, entering: I, _leaving: I, pivot_column: &[E], pivot_row_index: usize) {
        let alpha_q = pivot_column[pivot_row_index];
        if alpha_q.abs() < crate::EPSILON {
            return;
        }
        let w_q = self.weights[entering];
        for (j, &alpha_j) in pivot_column.iter().enumerate() {
            if j == entering || alpha_j.abs() < crate::EPSILON {
                continue;
            }
            let candidate = (alpha_j / alpha_q).powi(2) * w_q;
            if candidate > self.weights[j] {
                self.weights[j] = candidate;
            }
        }
        self.weights[entering] = (w_q / (alpha_q * alpha_q)).max(1.0);
    }

    fn reset(&mut self, n: usize) {
        self.weights = vec![1.0; n];
    }
}

build_option_enum!(
    trait_ = EntryStrategy,
    name = "EntryStrategies",
    variants = (SteepestEdgeEntryStrategy,),
    new_arguments = (&SolverOptions,),
    doc_header = "Registry of entering-variable selection strategies available to the tableau."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_improving_directions_are_candidates() {
        let mut s = SteepestEdgeEntryStrategy {
            weights: vec![1.0; 3],
            candidate_limit: 5,
        };
        let costs = [-1.0, 1.0, 0.0];
        let status = [
            NonBasicStatus::AtLower,
            NonBasicStatus::AtLower,
            NonBasicStatus::AtLower,
        ];
        let candidates = s.candidates(&costs, &status);
        assert_eq!(candidates, vec![0]);
    }

    #[test]
    fn at_upper_favors_positive_reduced_cost() {
        let mut s = SteepestEdgeEntryStrategy {
            weights: vec![1.0; 2],
            candidate_limit: 5,
        };
        let costs = [2.0, -2.0];
        let status = [NonBasicStatus::AtUpper, NonBasicStatus::AtUpper];
        let candidates = s.candidates(&costs, &status);
        assert_eq!(candidates, vec![0]);
    }

    #[test]
    fn candidate_limit_truncates() {
        let mut s = SteepestEdgeEntryStrategy {
            weights: vec![1.0; 4],
            candidate_limit: 2,
        };
        let costs = [-3.0, -2.0, -1.0, -4.0];
        let status = [NonBasicStatus::AtLower; 4];
        let candidates = s.candidates(&costs, &status);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0], 3);
    }
}
