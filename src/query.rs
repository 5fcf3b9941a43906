//! Consumed ingestion interface (§6 "Input query (consumed)").
//!
//! `InputQuery` is the engine's only view into the outside world: a frozen
//! set of variables, equations, and PL-constraint specifications produced by
//! a surrounding tool (a network-to-verification-query translator). Loading,
//! preprocessing, and network-level reasoning over it are explicitly out of
//! scope (§1); what *is* in scope is the small amount of mechanical assembly
//! §4.10 describes — equation-to-`Ax=0` conversion, initial basis selection,
//! and PL-constraint instantiation — since the engine driver cannot run the
//! six end-to-end scenarios (§8) without it.
//!
//! `derive(Serialize, Deserialize)` here and in [`crate::ipq`] is the first
//! real exercise of the teacher's (declared-but-unused) `serde` dependency;
//! `saveQuery`/the `.ipq` artifact are written with `serde_json`, grounded on
//! `josongsong-semantica-codegraph`, the one pack repo that carries it.

use std::path::Path;

use macros::use_option;
use serde::{Deserialize, Serialize};

use crate::bounds::BoundManager;
use crate::constraints::{AbsoluteValue, Disjunction, Max, PiecewiseLinearConstraint, PlConstraint, ReLU, Sign};
use crate::tableau::Tableau;
use crate::{SolverOptions, E, I};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquationType {
    Eq,
    Le,
    Ge,
}

/// `sum(coefficients) <eq_type> scalar`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equation {
    pub coefficients: Vec<(I, E)>,
    pub eq_type: EquationType,
    pub scalar: E,
}

/// The tagged union `getPiecewiseLinearConstraints` exposes, kept separate
/// from the stateful runtime [`PlConstraint`] (phase, score, cached bounds)
/// since an ingested query only carries the static shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlConstraintSpec {
    ReLU { b: I, f: I },
    AbsoluteValue { b: I, f: I },
    Max { inputs: Vec<I>, y: I },
    Disjunction { disjuncts: Vec<crate::constraints::CaseSplit> },
    Sign { b: I, f: I },
}

impl PlConstraintSpec {
    fn into_runtime(self) -> PlConstraint {
        match self {
            PlConstraintSpec::ReLU { b, f } => ReLU::new(b, f).into(),
            PlConstraintSpec::AbsoluteValue { b, f } => AbsoluteValue::new(b, f).into(),
            PlConstraintSpec::Max { inputs, y } => Max::new(inputs, y).into(),
            PlConstraintSpec::Disjunction { disjuncts } => Disjunction::new(disjuncts).into(),
            PlConstraintSpec::Sign { b, f } => Sign::new(b, f).into(),
        }
    }

    fn participating_variables(&self) -> Vec<I> {
        match self {
            PlConstraintSpec::ReLU { b, f } | PlConstraintSpec::AbsoluteValue { b, f } | PlConstraintSpec::Sign { b, f } => {
                vec![*b, *f]
            }
            PlConstraintSpec::Max { inputs, y } => {
                let mut vars = inputs.clone();
                vars.push(*y);
                vars
            }
            PlConstraintSpec::Disjunction { .. } => Vec::new(),
        }
    }
}

/// An opaque smooth (transcendental) constraint: the engine does not reason
/// about its internals, only counts and carries it through (§1, §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscendentalConstraint {
    pub tag: String,
    pub variables: Vec<I>,
}

#[use_option(
    name = "ingestion_slack_big_m",
    type_ = f64,
    default = "1e6",
    description = "Finite bound standing in for the unbounded side of an inequality equation's slack variable during Ax=0 conversion"
)]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputQuery {
    lower: Vec<E>,
    upper: Vec<E>,
    equations: Vec<Equation>,
    pl_constraints: Vec<PlConstraintSpec>,
    transcendental_constraints: Vec<TranscendentalConstraint>,
    input_variables: Vec<I>,
    output_variables: Vec<I>,
    debug_solution: Option<std::collections::BTreeMap<I, E>>,
}

impl InputQuery {
    pub fn new(num_variables: usize) -> Self {
        Self {
            lower: vec![E::NEG_INFINITY; num_variables],
            upper: vec![E::INFINITY; num_variables],
            equations: Vec::new(),
            pl_constraints: Vec::new(),
            transcendental_constraints: Vec::new(),
            input_variables: Vec::new(),
            output_variables: Vec::new(),
            debug_solution: None,
        }
    }

    pub fn get_number_of_variables(&self) -> usize {
        self.lower.len()
    }

    pub fn get_lower_bound(&self, variable: I) -> E {
        self.lower[variable]
    }

    pub fn set_lower_bound(&mut self, variable: I, value: E) {
        self.lower[variable] = value;
    }

    pub fn get_upper_bound(&self, variable: I) -> E {
        self.upper[variable]
    }

    pub fn set_upper_bound(&mut self, variable: I, value: E) {
        self.upper[variable] = value;
    }

    pub fn add_equation(&mut self, equation: Equation) {
        self.equations.push(equation);
    }

    pub fn add_pl_constraint(&mut self, constraint: PlConstraintSpec) {
        self.pl_constraints.push(constraint);
    }

    pub fn add_transcendental_constraint(&mut self, constraint: TranscendentalConstraint) {
        self.transcendental_constraints.push(constraint);
    }

    pub fn set_input_variables(&mut self, variables: Vec<I>) {
        self.input_variables = variables;
    }

    pub fn set_output_variables(&mut self, variables: Vec<I>) {
        self.output_variables = variables;
    }

    pub fn get_equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn get_piecewise_linear_constraints(&self) -> &[PlConstraintSpec] {
        &self.pl_constraints
    }

    pub fn get_transcendental_constraints(&self) -> &[TranscendentalConstraint] {
        &self.transcendental_constraints
    }

    pub fn input_variable_by_index(&self, index: usize) -> I {
        self.input_variables[index]
    }

    pub fn input_variables(&self) -> &[I] {
        &self.input_variables
    }

    pub fn output_variables(&self) -> &[I] {
        &self.output_variables
    }

    pub fn count_infinite_bounds(&self) -> usize {
        self.lower.iter().filter(|v| v.is_infinite()).count() + self.upper.iter().filter(|v| v.is_infinite()).count()
    }

    pub fn set_solution_value(&mut self, variable: I, value: E) {
        self.debug_solution.get_or_insert_with(Default::default).insert(variable, value);
        let _ = value;
    }

    pub fn debug_solution(&self) -> Option<&std::collections::BTreeMap<I, E>> {
        self.debug_solution.as_ref()
    }

    pub fn save_query(&self, path: &Path) -> Result<(), crate::error::EngineError> {
        let file = std::fs::File::create(path).map_err(|_| crate::error::EngineError::AllocationFailed)?;
        serde_json::to_writer_pretty(file, self).map_err(|_| crate::error::EngineError::AllocationFailed)
    }

    pub fn load_query(path: &Path) -> Result<Self, crate::error::EngineError> {
        let file = std::fs::File::open(path).map_err(|_| crate::error::EngineError::AllocationFailed)?;
        serde_json::from_reader(file).map_err(|_| crate::error::EngineError::AllocationFailed)
    }
}

/// Everything `processInputQuery` hands the engine driver to begin solving
/// (§4.10, minus the NLR-driven steps a [`crate::nlr::NoOpReasoner`] makes
/// trivial): the tableau, the bound manager, and the instantiated runtime PL
/// constraints.
pub struct InitialEngineState {
    pub tableau: Tableau,
    pub bounds: BoundManager,
    pub constraints: Vec<PlConstraint>,
}

/// Converts every equation to `Ax = 0` form by appending one auxiliary
/// variable per row (§3 I2): `Eq` pins the aux to the scalar exactly;
/// inequalities get a one-sided slack bounded by `big_m`, the standard LP
/// slack-variable conversion (a supplement beyond the distilled text, which
/// only spells out the equality case — see DESIGN.md).
pub fn build_initial_engine_state(query: &InputQuery, options: &SolverOptions) -> InitialEngineState {
    let big_m = options.get_option::<f64>("ingestion_slack_big_m").unwrap_or(1e6);

    let original_n = query.get_number_of_variables();
    let m = query.equations.len();
    let n = original_n + m;

    let a = faer::Mat::from_fn(m, n, |row, col| {
        let eq = &query.equations[row];
        let direct = eq.coefficients.iter().find(|(v, _)| *v == col).map(|(_, c)| *c).unwrap_or(0.0);
        if col == original_n + row {
            -1.0
        } else {
            direct
        }
    });

    let mut tableau = Tableau::new(m, n, a).expect("dimensions match by construction");
    for v in 0..original_n {
        tableau.set_bounds(v, query.get_lower_bound(v), query.get_upper_bound(v));
    }
    for (row, eq) in query.equations.iter().enumerate() {
        let aux = original_n + row;
        let (lb, ub) = match eq.eq_type {
            EquationType::Eq => (eq.scalar, eq.scalar),
            EquationType::Le => (eq.scalar - big_m, eq.scalar),
            EquationType::Ge => (eq.scalar, eq.scalar + big_m),
        };
        tableau.set_bounds(aux, lb, ub);
    }

    let initial_basis: Vec<I> = (0..m).map(|row| original_n + row).collect();
    tableau.initialize_tableau(initial_basis).expect("auxiliary columns form an identity basis");

    let mut bounds = BoundManager::new(n);
    for v in 0..original_n {
        bounds.initialize_bounds(v, query.get_lower_bound(v), query.get_upper_bound(v));
    }
    for (row, eq) in query.equations.iter().enumerate() {
        let aux = original_n + row;
        let (lb, ub) = match eq.eq_type {
            EquationType::Eq => (eq.scalar, eq.scalar),
            EquationType::Le => (eq.scalar - big_m, eq.scalar),
            EquationType::Ge => (eq.scalar, eq.scalar + big_m),
        };
        bounds.initialize_bounds(aux, lb, ub);
    }

    let mut constraints: Vec<PlConstraint> = Vec::with_capacity(query.pl_constraints.len());
    for spec in &query.pl_constraints {
        let vars = spec.participating_variables();
        let mut c = spec.clone().into_runtime();
        for v in vars {
            c.notify_lower_bound(v, bounds.get_lower_bound(v));
            c.notify_upper_bound(v, bounds.get_upper_bound(v));
        }
        constraints.push(c);
    }

    // A constraint can already have its phase fixed purely by the starting
    // bounds (e.g. a ReLU whose input's lower bound is already >= 0). Merge
    // those implied equations before the precision restorer ever snapshots
    // this state, iterating to a fixpoint since merging one can tighten a
    // variable another constraint watches (§4.9 step 2/3, §4.10).
    let mut merged = vec![false; constraints.len()];
    loop {
        let mut changed = false;
        for i in 0..constraints.len() {
            if merged[i] || !constraints[i].phase_fixed() {
                continue;
            }
            merged[i] = true;
            let Some(split) = constraints[i].get_valid_case_split() else {
                continue;
            };
            crate::smt::apply_case_split(&split, &mut tableau, &mut bounds);
            for &(variable, kind, value) in &split.tightenings {
                for c in constraints.iter_mut() {
                    match kind {
                        crate::bounds::BoundKind::Lower => c.notify_lower_bound(variable, value),
                        crate::bounds::BoundKind::Upper => c.notify_upper_bound(variable, value),
                    }
                }
            }
            changed = true;
        }
        if !changed {
            break;
        }
    }

    InitialEngineState { tableau, bounds, constraints }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_relu_query() -> InputQuery {
        // b in [-1, 1], f = relu(b), encoded via one equation "b - s = 0" is
        // unnecessary here; the ReLU constraint relates b/f directly, and b
        // itself needs no equation since it's a free input variable.
        let mut q = InputQuery::new(2);
        q.set_lower_bound(0, -1.0);
        q.set_upper_bound(0, 1.0);
        q.set_lower_bound(1, 0.0);
        q.set_upper_bound(1, 1.0);
        q.add_pl_constraint(PlConstraintSpec::ReLU { b: 0, f: 1 });
        q.set_input_variables(vec![0]);
        q.set_output_variables(vec![1]);
        q
    }

    #[test]
    fn build_initial_engine_state_with_no_equations_still_builds_a_tableau() {
        let q = single_relu_query();
        let options = crate::config::default_options();
        let state = build_initial_engine_state(&q, &options);
        assert_eq!(state.tableau.num_vars(), 2);
        assert_eq!(state.constraints.len(), 1);
    }

    #[test]
    fn equality_equation_pins_auxiliary_to_scalar() {
        let mut q = InputQuery::new(2);
        q.set_lower_bound(0, 0.0);
        q.set_upper_bound(0, 1.0);
        q.set_lower_bound(1, 0.0);
        q.set_upper_bound(1, 1.0);
        q.add_equation(Equation {
            coefficients: vec![(0, 1.0), (1, 1.0)],
            eq_type: EquationType::Eq,
            scalar: 1.0,
        });
        let options = crate::config::default_options();
        let state = build_initial_engine_state(&q, &options);
        assert_eq!(state.bounds.get_lower_bound(2), 1.0);
        assert_eq!(state.bounds.get_upper_bound(2), 1.0);
    }

    #[test]
    fn count_infinite_bounds_reports_unbounded_variables() {
        let q = InputQuery::new(2);
        assert_eq!(q.count_infinite_bounds(), 4);
    }
}
