//! Per-iteration hooks for logging, monitoring, or early stopping.
//!
//! Grounded on the teacher crate's `src/callback.rs`: the `Callback` trait
//! and its `build_option_enum!`-generated registry are kept, but the
//! per-iteration payload is the engine's own [`IterationReport`] rather than
//! an NLP/LP `SolverState`, and `ConvergenceOutput`'s `println!` is replaced
//! by `tracing` events — the statistics sink itself is out of scope (§1
//! Non-goals), but structured logging of the same information is not.

use macros::build_option_enum;

use crate::SolverOptions;

/// A snapshot of engine state handed to callbacks once per main-loop
/// iteration (§2 "Data flow per main-loop iteration").
#[derive(Debug, Clone, Copy)]
pub struct IterationReport {
    pub iteration: u64,
    pub active_pl_constraints: usize,
    pub out_of_bounds_basics: usize,
    pub stack_depth: usize,
    pub soi_cost: Option<f64>,
}

pub trait Callback {
    fn new(options: &SolverOptions) -> Self
    where
        Self: Sized;

    fn call(&mut self, report: &IterationReport);
}

/// A callback that does nothing. Use when no per-iteration output is needed.
pub struct NoOpCallback {}

impl Callback for NoOpCallback {
    fn new(_options: &SolverOptions) -> Self {
        Self {}
    }

    fn call(&mut self, _report: &IterationReport) {}
}

/// Emits a `tracing` event with the iteration's progress summary.
pub struct TracingCallback {}

impl Callback for TracingCallback {
    fn new(_options: &SolverOptions) -> Self {
        Self {}
    }

    fn call(&mut self, report: &IterationReport) {
        tracing::debug!(
            iteration = report.iteration,
            active_pl_constraints = report.active_pl_constraints,
            out_of_bounds_basics = report.out_of_bounds_basics,
            stack_depth = report.stack_depth,
            soi_cost = report.soi_cost,
            "main loop iteration"
        );
    }
}

build_option_enum!(
    trait_ = Callback,
    name = "Callbacks",
    variants = (NoOpCallback, TracingCallback),
    new_arguments = (&SolverOptions,),
    doc_header = "Registry of callback implementations available to the engine driver."
);
