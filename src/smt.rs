//! C6: SMT Core — DPLL-style search over PL-constraint case splits.
//!
//! Owns the case-split stack; does not own the tableau or bound manager
//! directly (the engine driver does), but receives `&mut` access to them at
//! `perform_split`/`pop_split` time to snapshot and restore.

use macros::use_option;

use crate::bounds::BoundManager;
use crate::constraints::{CaseSplit, PiecewiseLinearConstraint, PlConstraint};
use crate::tableau::{StorageLevel, Tableau, TableauSnapshot};
use crate::{SolverOptions, E, I};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchingStrategy {
    /// First unfixed PL constraint in NLR topological order.
    EarliestReLU,
    /// Highest-polarity candidate among the first `N` topologically-ordered
    /// unfixed constraints.
    Polarity,
    /// Split the input variable with the widest `[lb, ub]` at its midpoint.
    LargestInterval,
    /// Highest accumulated pseudo-impact score, once the stack is deep
    /// enough for the statistic to be meaningful.
    PseudoImpact,
    /// First violated (not just unfixed) PL constraint.
    ReLUViolation,
    /// Resolves to `LargestInterval` below a dimensionality threshold, else
    /// `PseudoImpact` (if SoI is enabled) or `ReLUViolation`.
    Auto,
}

/// What the chosen branch actually is: either branching on one of the
/// registered PL constraints, or a synthesized two-way interval split on an
/// input variable (the `LargestInterval` strategy doesn't name a
/// constraint).
pub enum Branch {
    Constraint(usize),
    Interval { variable: I, alternatives: Vec<CaseSplit> },
}

/// One level of the case-split stack.
pub struct StackEntry {
    pub branch: Option<usize>,
    pub alternatives: Vec<CaseSplit>,
    tableau_snapshot: TableauSnapshot,
    constraint_snapshot: Vec<PlConstraint>,
    implied_valid_splits: Vec<CaseSplit>,
    /// The alternative actually applied at this level, kept so the
    /// precision restorer can replay the whole root-to-current path into a
    /// freshly-initialized tableau.
    applied: CaseSplit,
}

#[use_option(
    name = "polarity_candidates_threshold",
    type_ = usize,
    default = "5",
    description = "Number of topologically-earliest unfixed constraints considered by the Polarity branching strategy"
)]
#[use_option(
    name = "interval_splitting_threshold",
    type_ = usize,
    default = "10",
    description = "Input dimensionality below which Auto branching uses LargestInterval instead of PseudoImpact/ReLUViolation"
)]
#[use_option(
    name = "score_bump_for_pl_constraints_not_in_soi",
    type_ = f64,
    default = "0.1",
    description = "Pseudo-impact score bump for active, violated constraints excluded from the current SoI phase pattern"
)]
#[use_option(
    name = "case_split_storage_level",
    type_ = usize,
    default = "1",
    description = "Tableau storage level used at each case split: 0=None, 1=Structure, 2=Full"
)]
pub struct SmtCore {
    stack: Vec<StackEntry>,
    strategy: BranchingStrategy,
    split_requested: bool,
    storage_level: StorageLevel,
    polarity_candidates_threshold: usize,
    interval_splitting_threshold: usize,
    score_bump_for_pl_constraints_not_in_soi: f64,
}

impl SmtCore {
    pub fn new(strategy: BranchingStrategy, options: &SolverOptions) -> Self {
        let storage_level = match options.get_option::<usize>("case_split_storage_level").unwrap() {
            0 => StorageLevel::None,
            2 => StorageLevel::Full,
            _ => StorageLevel::Structure,
        };
        Self {
            stack: Vec::new(),
            strategy,
            split_requested: false,
            storage_level,
            polarity_candidates_threshold: options.get_option::<usize>("polarity_candidates_threshold").unwrap(),
            interval_splitting_threshold: options.get_option::<usize>("interval_splitting_threshold").unwrap(),
            score_bump_for_pl_constraints_not_in_soi: options
                .get_option::<f64>("score_bump_for_pl_constraints_not_in_soi")
                .unwrap(),
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn request_split(&mut self) {
        self.split_requested = true;
    }

    pub fn needs_to_split(&self) -> bool {
        self.split_requested
    }

    /// Chooses what to branch on next, per `self.strategy` (§4.6).
    pub fn choose_branch(
        &self,
        constraints: &[PlConstraint],
        input_variables: &[I],
        bounds: &BoundManager,
        soi_enabled: bool,
    ) -> Option<Branch> {
        let unfixed = |c: &&PlConstraint| c.is_active() && !c.phase_fixed();

        let resolved = match self.strategy {
            BranchingStrategy::Auto => {
                if input_variables.len() < self.interval_splitting_threshold {
                    BranchingStrategy::LargestInterval
                } else if soi_enabled {
                    BranchingStrategy::PseudoImpact
                } else {
                    BranchingStrategy::ReLUViolation
                }
            }
            other => other,
        };

        match resolved {
            BranchingStrategy::EarliestReLU => constraints
                .iter()
                .position(|c| c.is_active() && !c.phase_fixed())
                .map(Branch::Constraint),
            BranchingStrategy::ReLUViolation => constraints
                .iter()
                .enumerate()
                .find(|(_, c)| c.is_active() && !c.phase_fixed())
                .map(|(i, _)| Branch::Constraint(i)),
            BranchingStrategy::Polarity => constraints
                .iter()
                .enumerate()
                .filter(|(_, c)| unfixed(c) && c.support_polarity())
                .take(self.polarity_candidates_threshold)
                .max_by(|(_, a), (_, b)| a.score().partial_cmp(&b.score()).unwrap())
                .map(|(i, _)| Branch::Constraint(i)),
            BranchingStrategy::PseudoImpact => {
                if self.depth() > 3 {
                    constraints
                        .iter()
                        .enumerate()
                        .filter(|(_, c)| unfixed(c))
                        .max_by(|(_, a), (_, b)| a.score().partial_cmp(&b.score()).unwrap())
                        .map(|(i, _)| Branch::Constraint(i))
                } else if input_variables.len() < self.interval_splitting_threshold {
                    self.largest_interval_branch(input_variables, bounds)
                } else {
                    constraints
                        .iter()
                        .position(|c| c.is_active() && !c.phase_fixed())
                        .map(Branch::Constraint)
                }
            }
            BranchingStrategy::LargestInterval => self.largest_interval_branch(input_variables, bounds),
            BranchingStrategy::Auto => unreachable!("resolved above"),
        }
    }

    fn largest_interval_branch(&self, input_variables: &[I], bounds: &BoundManager) -> Option<Branch> {
        let (variable, width) = input_variables
            .iter()
            .map(|&v| (v, bounds.get_upper_bound(v) - bounds.get_lower_bound(v)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())?;
        if width <= crate::EPSILON {
            return None;
        }
        let lb = bounds.get_lower_bound(variable);
        let ub = bounds.get_upper_bound(variable);
        let mid = (lb + ub) / 2.0;
        Some(Branch::Interval {
            variable,
            alternatives: vec![
                CaseSplit::bound(variable, crate::bounds::BoundKind::Upper, mid),
                CaseSplit::bound(variable, crate::bounds::BoundKind::Lower, mid),
            ],
        })
    }

    /// Pushes a new stack entry, snapshots `tableau`/`bounds`/`constraints`,
    /// and applies the first alternative of `alternatives` (§4.6
    /// `performSplit`).
    pub fn perform_split(
        &mut self,
        branch: Option<usize>,
        alternatives: Vec<CaseSplit>,
        tableau: &mut Tableau,
        bounds: &mut BoundManager,
        constraints: &mut [PlConstraint],
    ) {
        let tableau_snapshot = tableau.store_state(self.storage_level);
        bounds.store_local();
        let constraint_snapshot: Vec<PlConstraint> = constraints.iter().map(|c| c.duplicate()).collect();

        let mut remaining = alternatives;
        let first = remaining.remove(0);

        self.stack.push(StackEntry {
            branch,
            alternatives: remaining,
            tableau_snapshot,
            constraint_snapshot,
            implied_valid_splits: Vec::new(),
            applied: first.clone(),
        });
        self.split_requested = false;

        apply_case_split(&first, tableau, bounds);
    }

    /// Restores the most recent stack entry's snapshot, drops the
    /// alternative it had applied, and either applies the next alternative
    /// or recurses into a deeper pop (§4.6 `popSplit`). Returns `false` once
    /// the stack is exhausted (the case is UNSAT at the root).
    pub fn pop_split(&mut self, tableau: &mut Tableau, bounds: &mut BoundManager, constraints: &mut [PlConstraint]) -> bool {
        loop {
            let Some(mut entry) = self.stack.pop() else {
                return false;
            };

            let _ = tableau.restore_state(&entry.tableau_snapshot);
            bounds.restore_local();
            for (c, snap) in constraints.iter_mut().zip(entry.constraint_snapshot.iter()) {
                c.restore_state(snap);
            }

            if entry.alternatives.is_empty() {
                continue;
            }

            bounds.store_local();
            let next = entry.alternatives.remove(0);
            apply_case_split(&next, tableau, bounds);
            entry.applied = next;

            for split in &entry.implied_valid_splits {
                apply_case_split(split, tableau, bounds);
            }

            self.stack.push(entry);
            return true;
        }
    }

    /// Records a split proved valid (implied) while the current stack entry
    /// is active, so it survives a later pop-and-reapply (§4.6).
    pub fn record_implied_valid_split(&mut self, split: CaseSplit) {
        if let Some(entry) = self.stack.last_mut() {
            entry.implied_valid_splits.push(split);
        }
    }

    /// The full root-to-current sequence of applied splits (the branch taken
    /// at every stack level plus any implied valid splits recorded there),
    /// in the order they were applied — what the precision restorer replays
    /// into a freshly-initialized tableau (§4.7).
    pub fn applied_splits(&self) -> Vec<CaseSplit> {
        self.stack
            .iter()
            .flat_map(|entry| std::iter::once(entry.applied.clone()).chain(entry.implied_valid_splits.iter().cloned()))
            .collect()
    }

    /// Pseudo-impact score update: `|delta_cost| / |constraints_updated|`,
    /// or the fixed bump for active, violated constraints the SoI proposal
    /// never touched (§4.6).
    pub fn update_pseudo_impact(
        &self,
        constraints: &mut [PlConstraint],
        touched: &[usize],
        delta_cost: E,
        assignment: &[E],
    ) {
        if touched.is_empty() {
            return;
        }
        let share = delta_cost.abs() / touched.len() as E;
        for &i in touched {
            constraints[i].add_to_score(share);
        }
        if delta_cost.abs() < crate::EPSILON {
            for (i, c) in constraints.iter_mut().enumerate() {
                if touched.contains(&i) || !c.is_active() || c.satisfied(assignment) {
                    continue;
                }
                c.add_to_score(self.score_bump_for_pl_constraints_not_in_soi);
            }
        }
    }
}

/// Applies one split's tightenings and equations to a live tableau/bound
/// manager pair. `pub(crate)` so [`crate::restoration`] can replay the
/// root-to-current split sequence into a freshly-restored tableau.
pub(crate) fn apply_case_split(split: &CaseSplit, tableau: &mut Tableau, bounds: &mut BoundManager) {
    for &(variable, kind, value) in &split.tightenings {
        match kind {
            crate::bounds::BoundKind::Lower => {
                bounds.tighten_lower_bound(variable, value);
                tableau.tighten_lower_bound(variable, value);
            }
            crate::bounds::BoundKind::Upper => {
                bounds.tighten_upper_bound(variable, value);
                tableau.tighten_upper_bound(variable, value);
            }
        }
    }
    for equation in &split.equations {
        let aux = tableau.num_vars();
        bounds.extend_to(aux + 1);
        bounds.initialize_bounds(aux, 0.0, 0.0);
        tableau.add_equation(equation.clone(), aux);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SolverOptions {
        crate::config::default_options()
    }

    #[test]
    fn largest_interval_branch_splits_widest_variable() {
        let mut bounds = BoundManager::new(2);
        bounds.initialize_bounds(0, 0.0, 1.0);
        bounds.initialize_bounds(1, -5.0, 5.0);
        let smt = SmtCore::new(BranchingStrategy::LargestInterval, &options());
        let branch = smt.choose_branch(&[], &[0, 1], &bounds, false);
        match branch {
            Some(Branch::Interval { variable, .. }) => assert_eq!(variable, 1),
            _ => panic!("expected an interval branch"),
        }
    }

    #[test]
    fn earliest_relu_picks_first_unfixed() {
        use crate::constraints::ReLU;
        let constraints: Vec<PlConstraint> = vec![ReLU::new(0, 1).into(), ReLU::new(2, 3).into()];
        let bounds = BoundManager::new(4);
        let smt = SmtCore::new(BranchingStrategy::EarliestReLU, &options());
        match smt.choose_branch(&constraints, &[], &bounds, false) {
            Some(Branch::Constraint(i)) => assert_eq!(i, 0),
            _ => panic!("expected a constraint branch"),
        }
    }

    #[test]
    fn pop_split_on_empty_stack_reports_exhausted() {
        let mut smt = SmtCore::new(BranchingStrategy::EarliestReLU, &options());
        let a = faer::Mat::from_fn(1, 1, |_, _| 1.0);
        let mut t = crate::tableau::Tableau::new(1, 1, a).unwrap();
        let mut bounds = BoundManager::new(1);
        let mut constraints: Vec<PlConstraint> = Vec::new();
        assert!(!smt.pop_split(&mut t, &mut bounds, &mut constraints));
    }
}
