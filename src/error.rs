use derive_more::{Display, Error};

/// Recoverable control-flow signals raised by the LP/PL core.
///
/// These are not errors in the `Problem` sense (§7): each has a defined
/// recovery path driven entirely by [`crate::engine::EngineDriver`]. Modeled
/// as a plain enum rather than threaded through `problemo::Problem` so the
/// main loop reads as a state machine (Design Notes §9) instead of a
/// try/catch ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSignal {
    /// The current case's bounds or equalities admit no solution.
    Infeasible,
    /// The basis factorization can no longer be refreshed accurately.
    MalformedBasis,
    /// Optimizing over a user cost walked a basic variable out of bounds.
    VariableOutOfBoundDuringOptimization,
}

pub type SignalResult<T> = Result<T, EngineSignal>;

/// Fatal errors (§7). [`crate::engine::EngineDriver::solve`] converts these
/// into `problemo::Problem` at the public boundary, the same way the teacher
/// crate's own `Solver::solve` returns `Result<Status, Problem>` directly.
#[derive(Debug, Display, Error, PartialEq)]
pub enum EngineError {
    #[display("memory allocation failed")]
    AllocationFailed,

    #[display("malformed input: {reason}")]
    MalformedInput {
        #[error(not(source))]
        reason: String,
    },

    #[display("precision restoration failed after strong and weak attempts")]
    RestorationFailed,

    #[display("learned bounds contradict the embedded debug solution")]
    DebuggingInvariantViolated,

    #[display("inconsistent bounds for variable {variable}: lb={lb} > ub={ub}")]
    InconsistentBounds { variable: usize, lb: f64, ub: f64 },
}
