//! End-to-end scenarios (§8) run against the full [`crate::engine::EngineDriver`]
//! rather than any single component in isolation, mirroring the teacher's own
//! top-level `tests/netlib.rs` style of exercising the whole solve path.

use crate::config::default_options;
use crate::engine::EngineDriver;
use crate::query::{Equation, EquationType, InputQuery, PlConstraintSpec};
use crate::status::SolveOutcome;
use crate::terminators::TimeOutTerminator;

fn solve(query: InputQuery) -> SolveOutcome {
    EngineDriver::new(query, default_options()).solve().expect("engine returned a fatal error")
}

fn assignment_of(outcome: &SolveOutcome) -> &faer::Col<crate::E> {
    match outcome {
        SolveOutcome::Sat(assignment) => assignment,
        other => panic!("expected Sat, got {other:?}"),
    }
}

/// Scenario 1: a single ReLU already at the target value is SAT with the
/// witness read straight off the assignment.
#[test]
fn single_relu_reaches_target_value() {
    let mut q = InputQuery::new(2);
    q.set_lower_bound(0, -1.0);
    q.set_upper_bound(0, 1.0);
    q.set_lower_bound(1, 0.0);
    q.set_upper_bound(1, 1.0);
    q.add_pl_constraint(PlConstraintSpec::ReLU { b: 0, f: 1 });
    q.add_equation(Equation {
        coefficients: vec![(1, 1.0)],
        eq_type: EquationType::Eq,
        scalar: 0.5,
    });
    q.set_input_variables(vec![0]);
    q.set_output_variables(vec![1]);

    let outcome = solve(q);
    let assignment = assignment_of(&outcome);
    assert!((assignment[0] - 0.5).abs() < 1e-6);
    assert!((assignment[1] - 0.5).abs() < 1e-6);
}

/// Scenario 2: `a + b = 3` with `a, b ∈ [0, 1]` is infeasible purely from
/// bound tightening, no case split needed.
#[test]
fn infeasible_sum_is_unsat_at_depth_zero() {
    let mut q = InputQuery::new(2);
    q.set_lower_bound(0, 0.0);
    q.set_upper_bound(0, 1.0);
    q.set_lower_bound(1, 0.0);
    q.set_upper_bound(1, 1.0);
    q.add_equation(Equation {
        coefficients: vec![(0, 1.0), (1, 1.0)],
        eq_type: EquationType::Eq,
        scalar: 3.0,
    });

    let mut engine = EngineDriver::new(q, default_options());
    let outcome = engine.solve().unwrap();
    assert!(matches!(outcome, SolveOutcome::Unsat));
    assert!(engine.iteration() > 0);
}

/// Scenario 3: two ReLUs in series reach a target that requires the second
/// one active and the first one active too.
#[test]
fn two_relus_in_series_reach_target() {
    let mut q = InputQuery::new(4);
    // x = var 0, y1 = relu(x) = var 1, z = -y1 + 0.2 = var 2, y2 = relu(z) = var 3
    q.set_lower_bound(0, -1.0);
    q.set_upper_bound(0, 1.0);
    q.set_lower_bound(1, 0.0);
    q.set_upper_bound(1, 1.0);
    q.set_lower_bound(2, -1.0);
    q.set_upper_bound(2, 1.2);
    q.set_lower_bound(3, 0.0);
    q.set_upper_bound(3, 1.2);

    q.add_pl_constraint(PlConstraintSpec::ReLU { b: 0, f: 1 });
    q.add_pl_constraint(PlConstraintSpec::ReLU { b: 2, f: 3 });
    q.add_equation(Equation {
        coefficients: vec![(1, -1.0), (2, -1.0)],
        eq_type: EquationType::Eq,
        scalar: -0.2,
    });
    q.add_equation(Equation {
        coefficients: vec![(3, 1.0)],
        eq_type: EquationType::Eq,
        scalar: 0.1,
    });
    q.set_input_variables(vec![0]);
    q.set_output_variables(vec![3]);

    let outcome = solve(q);
    let assignment = assignment_of(&outcome);
    assert!((assignment[1] - 0.1).abs() < 1e-6);
    assert!((assignment[0] - 0.1).abs() < 1e-6);
}

/// Scenario 4: `x <= 0 OR x >= 1` with `x` pinned to `[0.001, 0.999]` admits
/// no phase, so both disjuncts are tried and both fail.
#[test]
fn disjunction_with_no_admissible_phase_is_unsat() {
    let mut q = InputQuery::new(1);
    q.set_lower_bound(0, 0.001);
    q.set_upper_bound(0, 0.999);
    q.add_pl_constraint(PlConstraintSpec::Disjunction {
        disjuncts: vec![
            crate::constraints::CaseSplit::bound(0, crate::bounds::BoundKind::Upper, 0.0),
            crate::constraints::CaseSplit::bound(0, crate::bounds::BoundKind::Lower, 1.0),
        ],
    });

    let mut engine = EngineDriver::new(q, default_options());
    let outcome = engine.solve().unwrap();
    assert!(matches!(outcome, SolveOutcome::Unsat));
}

/// Scenario 5: a depth-10 identity ReLU chain with a reachable target
/// resolves without any case split once symbolic tightening fixes every
/// phase to "active" (the chain never goes negative).
#[test]
fn deep_identity_relu_chain_resolves_without_split() {
    const DEPTH: usize = 10;
    let n = DEPTH * 2;
    let mut q = InputQuery::new(n);
    for k in 0..DEPTH {
        let b = 2 * k;
        let f = 2 * k + 1;
        q.set_lower_bound(b, 0.0);
        q.set_upper_bound(b, 1.0);
        q.set_lower_bound(f, 0.0);
        q.set_upper_bound(f, 1.0);
        q.add_pl_constraint(PlConstraintSpec::ReLU { b, f });
        if k > 0 {
            let prev_f = 2 * (k - 1) + 1;
            q.add_equation(Equation {
                coefficients: vec![(prev_f, 1.0), (b, -1.0)],
                eq_type: EquationType::Eq,
                scalar: 0.0,
            });
        }
    }
    let input = 0;
    let output = 2 * (DEPTH - 1) + 1;
    q.add_equation(Equation {
        coefficients: vec![(input, 1.0)],
        eq_type: EquationType::Eq,
        scalar: 0.5,
    });
    q.set_input_variables(vec![input]);
    q.set_output_variables(vec![output]);

    let mut engine = EngineDriver::new(q, default_options());
    let outcome = engine.solve().unwrap();
    let assignment = assignment_of(&outcome);
    assert!((assignment[output] - 0.5).abs() < 1e-6);
    assert_eq!(engine.smt_depth(), 0);
}

/// Scenario 6: a huge branching factor with a 1-second timeout must return
/// TIMEOUT (exit code 4) rather than hang or error.
#[test]
fn large_disjunction_with_short_timeout_times_out() {
    let mut q = InputQuery::new(1);
    q.set_lower_bound(0, 0.0);
    q.set_upper_bound(0, 1.0);

    let branches = 1 << 20;
    let disjuncts = (0..branches)
        .map(|i| {
            let lo = i as crate::E / branches as crate::E;
            let hi = (i + 1) as crate::E / branches as crate::E;
            crate::constraints::CaseSplit {
                tightenings: vec![
                    (0, crate::bounds::BoundKind::Lower, lo),
                    (0, crate::bounds::BoundKind::Upper, hi),
                ],
                equations: Vec::new(),
            }
        })
        .collect();
    q.add_pl_constraint(PlConstraintSpec::Disjunction { disjuncts });

    let mut engine =
        EngineDriver::new(q, default_options()).with_terminator(Box::new(TimeOutTerminator::new(1)));
    let outcome = engine.solve().unwrap();
    assert!(matches!(outcome, SolveOutcome::Timeout));
    assert_eq!(outcome.exit_code() as u8, 4);
}

/// Boundary behavior: zero equations and zero variables is SAT immediately
/// with an empty assignment.
#[test]
fn empty_query_is_immediately_sat() {
    let q = InputQuery::new(0);
    let outcome = solve(q);
    let assignment = assignment_of(&outcome);
    assert_eq!(assignment.nrows(), 0);
}

/// Boundary behavior: any variable left with an infinite bound after
/// ingestion is rejected before the main loop starts.
#[test]
fn unbounded_variable_is_rejected_before_solving() {
    let q = InputQuery::new(1);
    let mut engine = EngineDriver::new(q, default_options());
    let result = engine.solve();
    assert!(result.is_err());
}
