//! Micro-benchmarks over the simplex pivot step, grounded on the teacher's
//! own `benches/lp/netlib.rs` divan harness shape (one `#[divan::bench]` per
//! case, driven by `divan::main`).

use pwlsmt::config::default_options;
use pwlsmt::engine::EngineDriver;
use pwlsmt::query::{Equation, EquationType, InputQuery, PlConstraintSpec};

fn main() {
    divan::main();
}

fn single_relu_query() -> InputQuery {
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
    q
}

fn relu_chain_query(depth: usize) -> InputQuery {
    let mut q = InputQuery::new(depth * 2);
    for k in 0..depth {
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
    q.add_equation(Equation {
        coefficients: vec![(0, 1.0)],
        eq_type: EquationType::Eq,
        scalar: 0.5,
    });
    q
}

#[divan::bench]
fn single_relu() {
    let mut engine = EngineDriver::new(single_relu_query(), default_options());
    divan::black_box(engine.solve().unwrap());
}

#[divan::bench(args = [4, 16, 64])]
fn relu_chain(depth: usize) {
    let mut engine = EngineDriver::new(relu_chain_query(depth), default_options());
    divan::black_box(engine.solve().unwrap());
}
