//! Global configuration.
//!
//! Grounded on the teacher crate's options registry (`build_options!` in
//! `lib.rs`): every numeric or boolean knob named in the design (pivot
//! search limits, bound-tightening frequency, branching thresholds, SoI
//! score bumps, feature toggles) is registered where it is used, via
//! `#[explicit_options(name = SolverOptions)]` + `#[use_option(...)]` on the
//! owning component, rather than collected in one god-struct. This module
//! only re-exports the registry type and provides the one constructor the
//! engine needs.

pub use crate::SolverOptions;

/// Builds a [`SolverOptions`] populated with every component's registered
/// defaults. Equivalent to `SolverOptions::new()`; kept as a named
/// constructor so callers don't need to know the registry's generated name.
pub fn default_options() -> SolverOptions {
    SolverOptions::new()
}
