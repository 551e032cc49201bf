//! This module contains the contracts through which the scheduler touches
//! its engine: solver queries, state destruction, merge groups, and the
//! execution statistics that the weighted selection policies consume.
//!
//! The scheduler defines the trait and the engine implements it, so that
//! the selection strategies can be exercised against a scripted engine
//! under test.

use std::{fmt::Debug, rc::Rc, time::Duration};

use crate::{
    error::SolverFailure,
    state::{Constraint, InstructionId, StateRef},
};

/// A dynamically dispatched [`Engine`] instance.
pub type DynEngine = Rc<dyn Engine>;

/// The surface an engine provides to its searchers.
///
/// Scheduling is single-threaded and re-entrant into the engine (a revival
/// round terminates states from inside `select`), so every operation takes
/// `&self` and implementations are expected to use interior mutability.
pub trait Engine
where
    Self: Debug,
{
    /// Asks the solver whether `constraint` can be true of `state` under its
    /// current path condition.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the solver fails or exceeds the configured
    /// timeout.
    fn may_be_true(
        &self,
        state: &StateRef,
        constraint: &Constraint,
    ) -> Result<bool, SolverFailure>;

    /// Sets the solver timeout applied to subsequent queries; [`None`]
    /// removes any limit.
    fn set_solver_timeout(&self, timeout: Option<Duration>);

    /// Whether solver failures are currently reported as unsatisfiable
    /// answers rather than escalated by the engine.
    fn solver_failure_tolerance(&self) -> bool;

    /// Changes the solver failure tolerance. The revival protocol forces
    /// tolerance on around its queries and restores the previous value.
    fn set_solver_failure_tolerance(&self, tolerate: bool);

    /// Permanently adds `constraint` to `state`'s path condition.
    fn add_constraint(&self, state: &StateRef, constraint: Constraint);

    /// Requests termination of `state`. The engine reports the resulting
    /// removal through a later `update`.
    fn terminate_state(&self, state: &StateRef);

    /// Removes `state`'s leaf from the process tree.
    ///
    /// This is the first step of the destruction sequence a searcher runs
    /// for a pending state it has decided cannot be revived; it is followed
    /// by [`Self::erase_state`] and then by the release of the last handle.
    fn remove_tree_node(&self, state: &StateRef);

    /// Erases `state` from the engine's state collection. The second step
    /// of the destruction sequence.
    fn erase_state(&self, state: &StateRef);

    /// Whether the engine has been asked to halt. Polled between revival
    /// queries so that eviction can return early with a partial victim
    /// list.
    fn halt_requested(&self) -> bool;

    /// A snapshot of the engine's live state collection.
    fn states(&self) -> Vec<StateRef>;

    /// The depths the engine has flagged as sensitive for bounded
    /// exploration. Most engines flag none.
    fn sensitive_depths(&self) -> Vec<u64> {
        Vec::new()
    }

    /// The engine's active merge groups, in priority order. Most engines
    /// have none.
    fn merge_groups(&self) -> Vec<Rc<dyn MergeGroup>> {
        Vec::new()
    }

    /// The global count of executed instructions.
    fn instructions_executed(&self) -> u64;

    /// How many times the instruction identified by `id` has been executed.
    fn instruction_count_at(&self, id: InstructionId) -> u64;

    /// The distance from `pc` to the nearest uncovered instruction, with
    /// `hint` as the precomputed on-return distance of the current frame.
    /// Zero means the metric has no answer.
    fn min_dist_to_uncovered(&self, pc: InstructionId, hint: u64) -> u64;
}

/// A group of states that have reached a common merge point and await their
/// joint release.
pub trait MergeGroup
where
    Self: Debug,
{
    /// Whether any state has already arrived at the merge point.
    fn has_merged_states(&self) -> bool;

    /// A state to prioritise so that the group can complete, or [`None`]
    /// once every outstanding member has exceeded the time the group is
    /// willing to wait.
    fn prioritized_state(&self) -> Option<StateRef>;

    /// Releases the states that already arrived at the merge point back to
    /// normal scheduling.
    fn release_states(&self);
}
