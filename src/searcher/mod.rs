//! This module contains the searchers: the strategies that decide which
//! live execution state the engine steps next.
//!
//! Every strategy implements the one [`Searcher`] contract, and most of the
//! interesting ones are decorators over other searchers: batching makes any
//! base sticky, iterative deepening adds per-state time budgets, the
//! pending searchers split the population by whether a state's survival
//! still hinges on a satisfiability query, and so on. The engine composes
//! whatever stack its options ask for and drives the result with one loop:
//! select a state, execute one step, report the population deltas.

pub mod batching;
pub mod deepening;
pub mod flat;
pub mod interleaved;
pub mod merging;
pub mod pending;
pub mod random_path;
pub mod weighted;
pub mod zesti;

pub use batching::BatchingSearcher;
pub use deepening::IterativeDeepeningTimeSearcher;
pub use flat::{BfsSearcher, DfsSearcher, RandomSearcher};
pub use interleaved::InterleavedSearcher;
pub use merging::MergingSearcher;
pub use pending::{PendingSearcher, RevivalStats};
pub use random_path::RandomPathSearcher;
pub use weighted::{WeightType, WeightedRandomSearcher};
pub use zesti::ZestiPendingSearcher;

use std::fmt::Debug;

use crate::state::StateRef;

/// The uniform contract every selection strategy implements.
pub trait Searcher
where
    Self: Debug,
{
    /// Returns a state from this searcher's population for the engine to
    /// step next.
    ///
    /// # Panics
    ///
    /// Panics if the population is empty; callers check [`Self::empty`]
    /// first.
    fn select(&mut self) -> StateRef;

    /// Installs population deltas after an execution step.
    ///
    /// `current` is the state most recently returned by [`Self::select`],
    /// possibly mutated by execution; it is [`None`] only before the first
    /// selection. A `current` that also appears in `removed` is treated
    /// purely as removed. The caller may destroy the states in `removed`
    /// once this returns.
    fn update(&mut self, current: Option<&StateRef>, added: &[StateRef], removed: &[StateRef]);

    /// Whether the population is empty.
    ///
    /// This may mutate the searcher: the pending searchers run their
    /// revival round here.
    fn empty(&mut self) -> bool;

    /// The population size, used as a hint by the eviction heuristics.
    fn size(&self) -> usize;

    /// Proposes up to `n` victims for eviction under memory pressure.
    ///
    /// Strategies without a sensible proposal propose nothing.
    fn select_for_deletion(&mut self, n: usize) -> Vec<StateRef> {
        let _ = n;
        Vec::new()
    }

    /// Removes a single state from the population out-of-band, without the
    /// engine having destroyed it.
    fn remove_state(&mut self, state: &StateRef) {
        self.update(None, &[], &[state.clone()]);
    }

    /// The strategy's name, for the log stream.
    fn name(&self) -> &'static str;
}
