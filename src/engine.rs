//! C9: Engine Driver.
//!
//! Owns every component (C1-C8) plus the ambient collaborators (query, NLR,
//! LP backend, callback, terminators) and runs the main decision loop (§4.9):
//! restore precision and tighten, consult the network-level reasoner, let the
//! SMT core split if it's asked to, check bound consistency, and either
//! settle the nonlinear constraints (possibly via a Sum-of-Infeasibilities
//! local search) or take one simplex step — dispatching the three recoverable
//! [`EngineSignal`]s inline and surfacing anything else as a fatal
//! [`EngineError`] after exporting a `.ipq` failure artifact.
//!
//! Grounded on the teacher crate's own `src/lp/mod.rs` (the component that
//! owns a `Tableau`-equivalent plus a `MuUpdate`/`LineSearch` strategy pair
//! and drives its own iterate-until-converged loop) for the overall shape of
//! "one struct owning strategy objects, one method driving the iteration".

use std::path::PathBuf;

use macros::use_option;
use problemo::Problem;

use crate::bounds::{BoundKind, BoundManager};
use crate::callback::{Callback, Callbacks, IterationReport};
use crate::constraints::{PiecewiseLinearConstraint, PlConstraint};
use crate::cost::CostFunctionManager;
use crate::error::{EngineError, EngineSignal};
use crate::lp_backend::{LpBackend, NoOpLpBackend};
use crate::nlr::{NetworkLevelReasoner, NoOpReasoner};
use crate::query::InputQuery;
use crate::restoration::{PrecisionRestorer, RestorationFlavor};
use crate::smt::{Branch, BranchingStrategy, SmtCore};
use crate::soi::SoiManager;
use crate::status::SolveOutcome;
use crate::tableau::entry_strategy::{EntryStrategies, EntryStrategy};
use crate::tableau::{LeavingChoice, NonBasicStatus, Tableau};
use crate::terminators::{MultipleTerminators, TerminationReason, TimeOutTerminator, Terminator};
use crate::tightening::{RowBoundTighteners, RowBoundTightener};
use crate::{SolverOptions, E, I};

/// Internal control-flow error distinguishing a recoverable [`EngineSignal`]
/// (handled entirely by [`EngineDriver::solve`]'s dispatch table) from a
/// fatal [`EngineError`] that ends the run.
enum LoopError {
    Signal(EngineSignal),
    Fatal(EngineError),
}

#[use_option(
    name = "engine_soi_enabled",
    type_ = bool,
    default = "true",
    description = "Use the Sum-of-Infeasibilities local search instead of branch-only case splitting"
)]
#[use_option(
    name = "max_simplex_pivot_search_iterations",
    type_ = usize,
    default = "2",
    description = "Number of times perform_simplex_step retries entry-candidate selection after refreshing a factorization that produced an unstable pivot"
)]
#[use_option(
    name = "acceptable_simplex_pivot_threshold",
    type_ = f64,
    default = "0.000001",
    description = "Pivot element magnitude below which a simplex step is considered numerically unstable"
)]
#[use_option(
    name = "use_smart_fix",
    type_ = bool,
    default = "true",
    description = "Prefer a smart fix (touching a non-basic variable, no pivot needed) over any possible fix in the non-SoI direct-repair path"
)]
#[use_option(
    name = "warm_start",
    type_ = bool,
    default = "false",
    description = "Seed non-basic assignments by evaluating the network-level reasoner on the current lower bounds before the main loop starts"
)]
pub struct EngineDriver {
    tableau: Tableau,
    bounds: BoundManager,
    cost: CostFunctionManager,
    row_tightener: Box<dyn RowBoundTightener>,
    entry_strategy: Box<dyn EntryStrategy>,
    constraints: Vec<PlConstraint>,
    smt: SmtCore,
    restorer: PrecisionRestorer,
    soi: SoiManager,
    soi_enabled: bool,
    max_simplex_pivot_search_iterations: usize,
    acceptable_simplex_pivot_threshold: E,
    use_smart_fix: bool,
    warm_start: bool,
    nlr: Box<dyn NetworkLevelReasoner>,
    lp_backend: Box<dyn LpBackend>,
    callback: Box<dyn Callback>,
    terminator: Box<dyn Terminator>,
    input_variables: Vec<I>,
    query: InputQuery,
    iteration: u64,
    failure_artifact_path: Option<PathBuf>,
    constraint_active_at_last_check: Vec<bool>,
}

impl EngineDriver {
    pub fn new(query: InputQuery, options: SolverOptions) -> Self {
        let initial = crate::query::build_initial_engine_state(&query, &options);
        let input_variables = query.input_variables().to_vec();
        let n = initial.tableau.num_vars();

        let mut restorer = PrecisionRestorer::new(&options);
        restorer.store_initial_engine_state(&initial.tableau, &initial.bounds, &initial.constraints);

        let soi_enabled = options.get_option::<bool>("engine_soi_enabled").unwrap_or(true);
        let max_simplex_pivot_search_iterations = options.get_option::<usize>("max_simplex_pivot_search_iterations").unwrap();
        let acceptable_simplex_pivot_threshold = options.get_option::<f64>("acceptable_simplex_pivot_threshold").unwrap();
        let use_smart_fix = options.get_option::<bool>("use_smart_fix").unwrap();
        let warm_start = options.get_option::<bool>("warm_start").unwrap();
        let constraint_active_at_last_check = initial.constraints.iter().map(|c| c.is_active()).collect();

        Self {
            tableau: initial.tableau,
            bounds: initial.bounds,
            cost: CostFunctionManager::new(n, &options),
            row_tightener: RowBoundTighteners::into_variant(RowBoundTighteners::default(), &options),
            entry_strategy: EntryStrategies::into_variant(EntryStrategies::default(), &options),
            constraints: initial.constraints,
            smt: SmtCore::new(BranchingStrategy::Auto, &options),
            restorer,
            soi: SoiManager::new(&options),
            soi_enabled,
            max_simplex_pivot_search_iterations,
            acceptable_simplex_pivot_threshold,
            use_smart_fix,
            warm_start,
            nlr: Box::new(NoOpReasoner),
            lp_backend: Box::new(NoOpLpBackend),
            callback: Callbacks::into_variant(Callbacks::default(), &options),
            terminator: Box::new(MultipleTerminators::new(vec![Box::new(TimeOutTerminator::new(0))])),
            input_variables,
            query,
            iteration: 0,
            failure_artifact_path: None,
            constraint_active_at_last_check,
        }
    }

    pub fn with_nlr(mut self, nlr: Box<dyn NetworkLevelReasoner>) -> Self {
        self.nlr = nlr;
        self
    }

    pub fn with_lp_backend(mut self, lp_backend: Box<dyn LpBackend>) -> Self {
        self.lp_backend = lp_backend;
        self
    }

    pub fn with_terminator(mut self, terminator: Box<dyn Terminator>) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn with_callback(mut self, callback: Box<dyn Callback>) -> Self {
        self.callback = callback;
        self
    }

    pub fn with_branching_strategy(mut self, strategy: BranchingStrategy, options: &SolverOptions) -> Self {
        self.smt = SmtCore::new(strategy, options);
        self
    }

    pub fn set_failure_artifact_path(&mut self, path: PathBuf) {
        self.failure_artifact_path = Some(path);
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn tableau(&self) -> &Tableau {
        &self.tableau
    }

    pub fn bounds(&self) -> &BoundManager {
        &self.bounds
    }

    pub fn smt_depth(&self) -> usize {
        self.smt.depth()
    }

    /// Runs the main loop (§4.9) to completion: SAT with a witness, UNSAT,
    /// TIMEOUT/QUIT from a terminator, or a fatal `Problem` (after exporting
    /// a `.ipq` failure artifact, if a path was configured). The internal
    /// [`EngineError`] is converted at this boundary, same as the teacher's
    /// own `Solver::solve` returning `Result<Status, Problem>` directly.
    pub fn solve(&mut self) -> Result<SolveOutcome, Problem> {
        if self.query.count_infinite_bounds() > 0 {
            return Err(EngineError::MalformedInput {
                reason: "query has an unbounded variable surviving preprocessing".to_string(),
            }
            .into());
        }

        if self.warm_start {
            self.apply_warm_start();
        }

        self.terminator.initialize();
        loop {
            self.iteration += 1;

            if let Some(reason) = self.terminator.check() {
                return Ok(match reason {
                    TerminationReason::Timeout => SolveOutcome::Timeout,
                    TerminationReason::Interrupted => SolveOutcome::QuitRequested,
                });
            }

            let report = IterationReport {
                iteration: self.iteration,
                active_pl_constraints: self.constraints.iter().filter(|c| c.is_active()).count(),
                out_of_bounds_basics: self.tableau.out_of_bounds_basics().len(),
                stack_depth: self.smt.depth(),
                soi_cost: self.soi_enabled.then(|| self.soi.accepted_cost()),
            };
            self.callback.call(&report);

            match self.run_iteration() {
                Ok(Some(outcome)) => return Ok(outcome),
                Ok(None) => {}
                Err(LoopError::Signal(EngineSignal::Infeasible)) => {
                    self.tableau.toggle_optimization(false);
                    if !self.smt.pop_split(&mut self.tableau, &mut self.bounds, &mut self.constraints) {
                        return Ok(SolveOutcome::Unsat);
                    }
                }
                Err(LoopError::Signal(EngineSignal::MalformedBasis)) => {
                    self.tableau.toggle_optimization(false);
                    if let Err(e) = self.handle_malformed_basis() {
                        self.export_failure_artifact();
                        return Err(e.into());
                    }
                }
                Err(LoopError::Signal(EngineSignal::VariableOutOfBoundDuringOptimization)) => {
                    self.tableau.toggle_optimization(false);
                }
                Err(LoopError::Fatal(e)) => {
                    self.export_failure_artifact();
                    return Err(e.into());
                }
            }
        }
    }

    fn export_failure_artifact(&self) {
        if let Some(path) = &self.failure_artifact_path {
            let _ = crate::ipq::export_failed_query(&self.query, &self.bounds, path);
        }
    }

    /// Strong (`RestoreBasics`) then weak (`DoNotRestoreBasics`) restoration,
    /// fatal if both fail (§4.7 `handleMalformedBasisException`).
    fn handle_malformed_basis(&mut self) -> Result<(), EngineError> {
        let splits = self.smt.applied_splits();
        if self
            .restorer
            .restore(RestorationFlavor::RestoreBasics, &splits, &mut self.tableau, &mut self.bounds, &mut self.constraints)
            .is_ok()
        {
            self.restorer.reset_weak_restoration_flag();
            return Ok(());
        }
        if self.restorer.weak_restoration_performed() {
            return Err(EngineError::RestorationFailed);
        }
        self.restorer.restore(
            RestorationFlavor::DoNotRestoreBasics,
            &splits,
            &mut self.tableau,
            &mut self.bounds,
            &mut self.constraints,
        )?;
        self.restorer.mark_weak_restoration_performed();
        Ok(())
    }

    fn run_iteration(&mut self) -> Result<Option<SolveOutcome>, LoopError> {
        if self.tableau.basis_matrix_available() {
            let degradation = self.restorer.measure_degradation(&self.tableau);
            if self.restorer.degradation_is_high(degradation) {
                self.handle_malformed_basis().map_err(LoopError::Fatal)?;
            } else {
                self.restorer.reset_weak_restoration_flag();
            }
            self.row_tightener.tighten(&self.tableau, &mut self.bounds);
            self.apply_pending_tightenings()?;
            self.apply_valid_case_splits();
        }

        self.nlr.obtain_current_bounds(&self.bounds);
        self.nlr.symbolic_bound_propagation();
        for t in self.nlr.get_constraint_tightenings() {
            match t.kind {
                BoundKind::Lower => self.bounds.tighten_lower_bound(t.variable, t.value),
                BoundKind::Upper => self.bounds.tighten_upper_bound(t.variable, t.value),
            }
        }
        self.nlr.clear_constraint_tightenings();
        self.apply_pending_tightenings()?;
        self.apply_valid_case_splits();

        if self.smt.needs_to_split() {
            let branch = self.smt.choose_branch(&self.constraints, &self.input_variables, &self.bounds, self.soi_enabled);
            let Some(branch) = branch else {
                return Err(LoopError::Signal(EngineSignal::Infeasible));
            };
            let (branch_idx, alternatives) = match branch {
                Branch::Constraint(i) => (Some(i), self.constraints[i].get_case_splits()),
                Branch::Interval { alternatives, .. } => (None, alternatives),
            };
            self.smt
                .perform_split(branch_idx, alternatives, &mut self.tableau, &mut self.bounds, &mut self.constraints);
            return Ok(None);
        }

        if self.bounds.consistent_bounds().is_err() {
            return Err(LoopError::Signal(EngineSignal::Infeasible));
        }

        // A Sum-of-Infeasibilities cost minimization pivots non-basics even
        // while every basic is already in bounds, so it shares the simplex
        // step below rather than only the narrower "basics out of bounds"
        // trigger the distilled step list names (§4.9's `performDeepSoILocalSearch`
        // drives the same simplex core, not a separate code path).
        if !self.tableau.exists_basic_out_of_bounds() && !self.tableau.is_optimizing() {
            return self.adjust_assignment_to_satisfy_nonlinear_constraints();
        }

        self.perform_simplex_step().map(|_| None)
    }

    fn apply_pending_tightenings(&mut self) -> Result<(), LoopError> {
        for t in self.bounds.get_tightenings() {
            if let Some(solution) = self.query.debug_solution() {
                if let Some(&value) = solution.get(&t.variable) {
                    let violates = match t.kind {
                        BoundKind::Lower => value < t.value - crate::EPSILON,
                        BoundKind::Upper => value > t.value + crate::EPSILON,
                    };
                    if violates {
                        return Err(LoopError::Fatal(EngineError::DebuggingInvariantViolated));
                    }
                }
            }
            match t.kind {
                BoundKind::Lower => {
                    self.tableau.tighten_lower_bound(t.variable, t.value);
                    for c in &mut self.constraints {
                        c.notify_lower_bound(t.variable, t.value);
                    }
                }
                BoundKind::Upper => {
                    self.tableau.tighten_upper_bound(t.variable, t.value);
                    for c in &mut self.constraints {
                        c.notify_upper_bound(t.variable, t.value);
                    }
                }
            }
        }
        Ok(())
    }

    /// `WARM_START` (§4.10): evaluate the network on the current lower
    /// bounds of the input variables and seed the output variables' starting
    /// non-basic assignment towards the evaluated value, rather than the
    /// default "every non-basic starts at its lower bound".
    fn apply_warm_start(&mut self) {
        let outputs = self.query.output_variables();
        if outputs.is_empty() {
            return;
        }
        let input: Vec<E> = self.input_variables.iter().map(|&v| self.bounds.get_lower_bound(v)).collect();
        let mut evaluated = vec![0.0; outputs.len()];
        self.nlr.evaluate(&input, &mut evaluated);
        for (&variable, &value) in outputs.iter().zip(evaluated.iter()) {
            self.tableau.seed_non_basic_towards(variable, value);
        }
        self.tableau.compute_assignment();
    }

    /// Merges the equation implied by a constraint whose phase just became
    /// fixed into the live tableau, edge-detected off `is_active()` dropping
    /// to `false` since that is exactly when a phase is determined (§4.9 step
    /// 2/3, §4.10). Recorded on the SMT stack so it survives a later
    /// pop-and-reapply.
    fn apply_valid_case_splits(&mut self) {
        for i in 0..self.constraints.len() {
            let now_active = self.constraints[i].is_active();
            let was_active = self.constraint_active_at_last_check[i];
            self.constraint_active_at_last_check[i] = now_active;
            if !(was_active && !now_active) {
                continue;
            }
            let Some(split) = self.constraints[i].get_valid_case_split() else {
                continue;
            };
            crate::smt::apply_case_split(&split, &mut self.tableau, &mut self.bounds);
            for &(variable, kind, value) in &split.tightenings {
                for c in &mut self.constraints {
                    match kind {
                        BoundKind::Lower => c.notify_lower_bound(variable, value),
                        BoundKind::Upper => c.notify_upper_bound(variable, value),
                    }
                }
            }
            self.smt.record_implied_valid_split(split);
        }
    }

    /// §4.9's own sub-algorithm: if every PL constraint already holds,
    /// report SAT; otherwise either repair the first violation directly (no
    /// SoI) or hand off to the heuristic local search.
    fn adjust_assignment_to_satisfy_nonlinear_constraints(&mut self) -> Result<Option<SolveOutcome>, LoopError> {
        let assignment = self.tableau.get_assignment().to_vec();
        let violated = self.constraints.iter().position(|c| c.is_active() && !c.satisfied(&assignment));

        let Some(violated) = violated else {
            return Ok(Some(self.build_sat_outcome()));
        };

        if !self.soi_enabled {
            let mut fixes = if self.use_smart_fix {
                self.constraints[violated].get_smart_fixes(&self.tableau, &assignment)
            } else {
                Vec::new()
            };
            if fixes.is_empty() {
                fixes = self.constraints[violated].get_possible_fixes(&assignment);
            }
            if let Some(fix) = fixes.into_iter().next() {
                self.bounds.tighten_lower_bound(fix.variable, fix.value);
                self.bounds.tighten_upper_bound(fix.variable, fix.value);
                self.apply_pending_tightenings()?;
                self.apply_valid_case_splits();
                return Ok(None);
            }
            self.smt.request_split();
            return Ok(None);
        }

        self.perform_deep_soi_local_search(&assignment)
    }

    fn total_active_violations(&self, assignment: &[E]) -> E {
        self.constraints
            .iter()
            .filter(|c| c.is_active() && !c.satisfied(assignment))
            .count() as E
    }

    /// One round of `performDeepSoILocalSearch` (§4.8): refresh the phase
    /// pattern, hand its cost to the cost manager for the next simplex step
    /// to chase, and accept/reject a single proposed phase flip.
    ///
    /// The true SoI objective is the cost-manager's linear heuristic cost,
    /// minimized by repeated simplex steps; the violation count used here to
    /// gate `decide_to_accept` is a cheap surrogate for "did the proposal
    /// help", not a re-solve of the LP under the proposed pattern.
    fn perform_deep_soi_local_search(&mut self, assignment: &[E]) -> Result<Option<SolveOutcome>, LoopError> {
        self.soi.update_current_phase_pattern_for_satisfied_constraints(&self.constraints, assignment);

        let violations = self.total_active_violations(assignment);
        if violations == 0.0 {
            return Ok(Some(self.build_sat_outcome()));
        }

        let addends = self.soi.current_cost_addends(&self.constraints);
        if addends.is_empty() {
            self.soi.initialize_phase_pattern(&self.constraints);
            return Ok(None);
        }
        self.cost.compute_given_cost_function(&self.tableau, &addends);
        self.tableau.toggle_optimization(true);

        if let Some(constraint) = self.soi.propose_phase_pattern_update(&self.constraints, assignment) {
            let touched = [constraint];
            if self.soi.decide_to_accept(violations) {
                self.soi.report_accepted(violations);
                self.smt.update_pseudo_impact(&mut self.constraints, &touched, violations, assignment);
            } else {
                self.soi.report_rejected();
            }
        }

        Ok(None)
    }

    /// Picks, among every candidate the entry strategy accepts, the one
    /// whose pivot element has the largest magnitude (§4.1 "Pivot quality"),
    /// refreshing the factorization and retrying up to
    /// `MAX_SIMPLEX_PIVOT_SEARCH_ITERATIONS` times when the best candidate
    /// found is still below `ACCEPTABLE_SIMPLEX_PIVOT_THRESHOLD`.
    fn choose_pivot(&mut self, candidates: &[I]) -> Result<(I, bool, Vec<E>, LeavingChoice), LoopError> {
        let max_attempts = self.max_simplex_pivot_search_iterations.max(1);
        for attempt in 1..=max_attempts {
            let mut best: Option<(I, bool, Vec<E>, LeavingChoice, E)> = None;
            for &candidate in candidates {
                let increasing = matches!(self.tableau.non_basic_status()[candidate], NonBasicStatus::AtLower);
                let change_column = self.tableau.compute_change_column(candidate);
                let choice = self.tableau.pick_leaving_variable(candidate, &change_column, increasing);
                let pivot_magnitude = match choice {
                    LeavingChoice::Pivot { leaving_row, .. } | LeavingChoice::Degenerate { leaving_row, .. } => {
                        change_column[leaving_row].abs()
                    }
                    LeavingChoice::FakePivot { .. } => E::INFINITY,
                };
                let is_better = match &best {
                    None => true,
                    Some((.., best_magnitude)) => pivot_magnitude > *best_magnitude,
                };
                if is_better {
                    best = Some((candidate, increasing, change_column, choice, pivot_magnitude));
                }
            }
            let (candidate, increasing, change_column, choice, pivot_magnitude) =
                best.expect("candidates is non-empty");

            if pivot_magnitude >= self.acceptable_simplex_pivot_threshold || attempt == max_attempts {
                return Ok((candidate, increasing, change_column, choice));
            }
            self.tableau.refresh_basis_factorization().map_err(LoopError::Signal)?;
        }
        unreachable!("loop always returns on its last iteration")
    }

    fn perform_simplex_step(&mut self) -> Result<(), LoopError> {
        if self.cost.cost_function_invalid() {
            if self.tableau.is_optimizing() {
                self.tableau.toggle_optimization(false);
            }
            self.cost.compute_core_cost_function(&self.tableau);
        }

        let costs = self.cost.costs().to_vec();
        let candidates = self.tableau.get_entry_candidates(&costs, &mut self.entry_strategy);
        if candidates.is_empty() {
            if self.tableau.is_optimizing() {
                self.tableau.toggle_optimization(false);
                return Ok(());
            }
            return Err(LoopError::Signal(EngineSignal::Infeasible));
        }

        let (entering, _increasing, change_column, choice) = self.choose_pivot(&candidates)?;

        match choice {
            LeavingChoice::FakePivot { change } => {
                self.tableau.perform_fake_pivot(entering, change);
            }
            LeavingChoice::Pivot { leaving_row, leaving_to_upper, change } => {
                let leaving = self.tableau.basic_variables()[leaving_row];
                let entering_reduced_cost = costs[entering];
                self.tableau
                    .perform_pivot(entering, leaving_row, leaving_to_upper, change, &change_column)
                    .map_err(LoopError::Signal)?;
                self.cost
                    .adjust_basic_cost_accuracy(entering, leaving_row, &change_column, entering_reduced_cost);
                self.entry_strategy.notify_pivot(entering, leaving, &change_column, leaving_row);
            }
            LeavingChoice::Degenerate { leaving_row, leaving_to_upper } => {
                self.tableau
                    .perform_degenerate_pivot(entering, leaving_row, leaving_to_upper, &change_column)
                    .map_err(LoopError::Signal)?;
            }
        }

        if self.tableau.is_optimizing() && self.tableau.exists_basic_out_of_bounds() {
            return Err(LoopError::Signal(EngineSignal::VariableOutOfBoundDuringOptimization));
        }

        Ok(())
    }

    fn build_sat_outcome(&self) -> SolveOutcome {
        let assignment = self.tableau.get_assignment();
        SolveOutcome::Sat(faer::Col::from_fn(assignment.len(), |i| assignment[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{EquationType, Equation, PlConstraintSpec};

    fn options() -> SolverOptions {
        crate::config::default_options()
    }

    #[test]
    fn single_relu_already_satisfied_is_sat_without_a_split() {
        let mut q = InputQuery::new(2);
        q.set_lower_bound(0, -1.0);
        q.set_upper_bound(0, 1.0);
        q.set_lower_bound(1, 0.0);
        q.set_upper_bound(1, 1.0);
        q.add_pl_constraint(PlConstraintSpec::ReLU { b: 0, f: 1 });
        q.set_input_variables(vec![0]);
        q.set_output_variables(vec![1]);

        let mut engine = EngineDriver::new(q, options());
        let outcome = engine.solve().unwrap();
        assert!(matches!(outcome, SolveOutcome::Sat(_)));
        assert_eq!(engine.smt.depth(), 0);
    }

    #[test]
    fn inconsistent_equation_is_unsat() {
        let mut q = InputQuery::new(1);
        q.set_lower_bound(0, 0.0);
        q.set_upper_bound(0, 1.0);
        q.add_equation(Equation {
            coefficients: vec![(0, 1.0)],
            eq_type: EquationType::Eq,
            scalar: 5.0,
        });

        let mut engine = EngineDriver::new(q, options());
        let outcome = engine.solve().unwrap();
        assert!(matches!(outcome, SolveOutcome::Unsat));
    }

    #[test]
    fn quit_requested_terminator_stops_immediately() {
        let q = InputQuery::new(1);
        let mut engine = EngineDriver::new(q, options()).with_terminator(Box::new(AlreadyQuit));
        let outcome = engine.solve().unwrap();
        assert!(matches!(outcome, SolveOutcome::QuitRequested));
    }

    struct AlreadyQuit;
    impl Terminator for AlreadyQuit {
        fn check(&mut self) -> Option<TerminationReason> {
            Some(TerminationReason::Interrupted)
        }
    }
}
