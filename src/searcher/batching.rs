//! This module contains the batching searcher: a decorator that keeps
//! re-issuing one selection until a time or instruction budget runs out.
//!
//! Repeatedly re-selecting through an expensive base (a weighted
//! distribution, a tree walk) for every single instruction is wasted work;
//! batching amortises the base's decision over a whole budget of execution.

use std::time::Duration;

use tracing::debug;

use crate::{
    clock::DynClock,
    constant::BATCH_OVERSHOOT_TOLERANCE,
    engine::DynEngine,
    searcher::Searcher,
    state::StateRef,
};

/// A searcher that returns its base's selection for a whole batch of
/// execution before asking again.
#[derive(Debug)]
pub struct BatchingSearcher {
    base: Box<dyn Searcher>,
    engine: DynEngine,
    clock: DynClock,

    /// The wall-time budget of one batch. Zero disables the time axis.
    time_budget: Duration,

    /// The instruction budget of one batch. Zero disables the instruction
    /// axis.
    instruction_budget: u64,

    last_state: Option<StateRef>,
    batch_start_time: Duration,
    batch_start_instructions: u64,
}

impl BatchingSearcher {
    /// Constructs a new batching searcher over `base` with the provided
    /// budgets.
    #[must_use]
    pub fn new(
        base: Box<dyn Searcher>,
        engine: DynEngine,
        clock: DynClock,
        time_budget: Duration,
        instruction_budget: u64,
    ) -> Self {
        Self {
            base,
            engine,
            clock,
            time_budget,
            instruction_budget,
            last_state: None,
            batch_start_time: Duration::ZERO,
            batch_start_instructions: 0,
        }
    }

    /// Whether the current batch has used up either of its budgets.
    fn budget_exhausted(&self) -> bool {
        let time_up = !self.time_budget.is_zero()
            && self.clock.now() - self.batch_start_time > self.time_budget;
        let instructions_up = self.instruction_budget > 0
            && self.engine.instructions_executed() - self.batch_start_instructions
                > self.instruction_budget;
        time_up || instructions_up
    }
}

impl Searcher for BatchingSearcher {
    fn select(&mut self) -> StateRef {
        if let Some(last) = &self.last_state {
            if !self.budget_exhausted() {
                return last.clone();
            }

            // A batch that ran well past its time budget means the budget
            // is too tight for this workload; grow it to what was actually
            // observed.
            let observed = self.clock.now() - self.batch_start_time;
            if observed.as_secs_f64() > self.time_budget.as_secs_f64() * BATCH_OVERSHOOT_TOLERANCE
            {
                debug!(
                    from = ?self.time_budget,
                    to = ?observed,
                    "increased batching time budget"
                );
                self.time_budget = observed;
            }
        }

        let state = self.base.select();
        self.batch_start_time = self.clock.now();
        self.batch_start_instructions = self.engine.instructions_executed();
        self.last_state = Some(state.clone());
        state
    }

    fn update(&mut self, current: Option<&StateRef>, added: &[StateRef], removed: &[StateRef]) {
        if self
            .last_state
            .as_ref()
            .map_or(false, |last| removed.contains(last))
        {
            self.last_state = None;
        }
        self.base.update(current, added, removed);
    }

    fn empty(&mut self) -> bool {
        self.base.empty()
    }

    fn size(&self) -> usize {
        self.base.size()
    }

    fn select_for_deletion(&mut self, n: usize) -> Vec<StateRef> {
        self.base.select_for_deletion(n)
    }

    fn name(&self) -> &'static str {
        "BatchingSearcher"
    }
}

#[cfg(test)]
mod test {
    use std::{cell::Cell, rc::Rc, time::Duration};

    use crate::{
        clock::ManualClock,
        engine::Engine,
        error::SolverFailure,
        searcher::{BatchingSearcher, DfsSearcher, Searcher},
        state::{Constraint, ExecutionState, InstructionId, StateRef},
    };

    #[derive(Debug, Default)]
    struct CountingEngine {
        instructions: Cell<u64>,
    }

    impl Engine for CountingEngine {
        fn may_be_true(
            &self,
            _state: &StateRef,
            _constraint: &Constraint,
        ) -> Result<bool, SolverFailure> {
            unreachable!("batching never queries the solver")
        }

        fn set_solver_timeout(&self, _timeout: Option<Duration>) {}

        fn solver_failure_tolerance(&self) -> bool {
            true
        }

        fn set_solver_failure_tolerance(&self, _tolerate: bool) {}

        fn add_constraint(&self, _state: &StateRef, _constraint: Constraint) {}

        fn terminate_state(&self, _state: &StateRef) {}

        fn remove_tree_node(&self, _state: &StateRef) {}

        fn erase_state(&self, _state: &StateRef) {}

        fn halt_requested(&self) -> bool {
            false
        }

        fn states(&self) -> Vec<StateRef> {
            Vec::new()
        }

        fn instructions_executed(&self) -> u64 {
            self.instructions.get()
        }

        fn instruction_count_at(&self, _id: InstructionId) -> u64 {
            0
        }

        fn min_dist_to_uncovered(&self, _pc: InstructionId, _hint: u64) -> u64 {
            0
        }
    }

    fn state(pc: u64) -> StateRef {
        StateRef::new(ExecutionState::new(InstructionId(pc)))
    }

    fn searcher_over(
        engine: &Rc<CountingEngine>,
        clock: &Rc<ManualClock>,
        time_budget: Duration,
        instruction_budget: u64,
    ) -> BatchingSearcher {
        BatchingSearcher::new(
            Box::new(DfsSearcher::new()),
            engine.clone(),
            clock.clone(),
            time_budget,
            instruction_budget,
        )
    }

    #[test]
    fn selection_sticks_within_the_budgets() {
        let engine = Rc::new(CountingEngine::default());
        let clock = Rc::new(ManualClock::new());
        let mut searcher = searcher_over(&engine, &clock, Duration::from_secs(10), 100);

        let (a, b) = (state(0), state(1));
        searcher.update(None, &[a.clone(), b.clone()], &[]);

        assert_eq!(searcher.select(), b);
        clock.advance(Duration::from_secs(1));
        engine.instructions.set(50);
        assert_eq!(searcher.select(), b);
    }

    #[test]
    fn an_exhausted_instruction_budget_asks_the_base_again() {
        let engine = Rc::new(CountingEngine::default());
        let clock = Rc::new(ManualClock::new());
        let mut searcher = searcher_over(&engine, &clock, Duration::ZERO, 100);

        let (a, b) = (state(0), state(1));
        searcher.update(None, &[a.clone(), b.clone()], &[]);
        assert_eq!(searcher.select(), b);

        // A fork arrives mid-batch; the base's preference moves on but the
        // sticky state holds until the instruction budget runs out.
        let c = state(2);
        searcher.update(Some(&b), &[c.clone()], &[]);
        engine.instructions.set(100);
        assert_eq!(searcher.select(), b);

        engine.instructions.set(101);
        assert_eq!(searcher.select(), c);
    }

    #[test]
    fn a_removed_sticky_state_is_refreshed_immediately() {
        let engine = Rc::new(CountingEngine::default());
        let clock = Rc::new(ManualClock::new());
        let mut searcher = searcher_over(&engine, &clock, Duration::from_secs(10), 0);

        let (a, b) = (state(0), state(1));
        searcher.update(None, &[a.clone(), b.clone()], &[]);
        assert_eq!(searcher.select(), b);

        searcher.update(Some(&b), &[], &[b.clone()]);
        assert_eq!(searcher.select(), a);
    }

    #[test]
    fn the_time_budget_grows_to_match_observed_overshoot() {
        let engine = Rc::new(CountingEngine::default());
        let clock = Rc::new(ManualClock::new());
        let mut searcher = searcher_over(&engine, &clock, Duration::from_secs(2), 0);

        let a = state(0);
        searcher.update(None, &[a.clone()], &[]);
        assert_eq!(searcher.select(), a);

        // The batch overshot 2 s by well over the tolerated 10%.
        clock.advance(Duration::from_secs(5));
        assert_eq!(searcher.select(), a);
        assert_eq!(searcher.time_budget, Duration::from_secs(5));

        // The next batch is measured against the grown budget.
        clock.advance(Duration::from_secs(4));
        assert_eq!(searcher.select(), a);
        assert_eq!(searcher.time_budget, Duration::from_secs(5));
    }
}
