use faer::Col;

use crate::E;

/// Exit codes visible to CLI wrappers around the engine (§6 of the design).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    NotDone = 0,
    Sat = 1,
    Unsat = 2,
    Error = 3,
    Timeout = 4,
    QuitRequested = 5,
}

/// The final outcome of a call to [`crate::engine::EngineDriver::solve`].
#[derive(Debug, Clone)]
pub enum SolveOutcome {
    /// A satisfying assignment was found. Indexed by variable.
    Sat(Col<E>),
    Unsat,
    Timeout,
    QuitRequested,
}

impl SolveOutcome {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SolveOutcome::Sat(_) => ExitCode::Sat,
            SolveOutcome::Unsat => ExitCode::Unsat,
            SolveOutcome::Timeout => ExitCode::Timeout,
            SolveOutcome::QuitRequested => ExitCode::QuitRequested,
        }
    }
}
