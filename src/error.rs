//! This module contains the primary error type for the scheduler's
//! interface, together with the solver-failure type that the engine reports
//! through the solver contract.
//!
//! # Assertions
//!
//! Breaches of the engine-scheduler contract (a removal of a state that was
//! never added, a process-tree node with no valid child for its searcher)
//! are programmer bugs and are reported as panics rather than through these
//! types.

use std::time::Duration;

use thiserror::Error;

/// The interface result type for the library.
pub type Result<T> = std::result::Result<T, Error>;

/// The interface error type for the library.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("All {available} process-tree tag bits are claimed by live searchers")]
    SearcherTagsExhausted { available: u8 },

    /// A solver failure that the configuration asked the scheduler to
    /// propagate rather than absorb.
    #[error(transparent)]
    Solver(#[from] SolverFailure),
}

/// A failure reported by the engine's constraint solver.
///
/// During revival the scheduler forces failure tolerance on and treats both
/// variants as "the constraint is not satisfiable"; the distinction is kept
/// for the engine's own logging.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SolverFailure {
    #[error("The solver gave up after its {timeout:?} timeout")]
    Timeout { timeout: Duration },

    #[error("The solver could not decide the query: {reason}")]
    Failed { reason: String },
}
