//! This module contains the merging searcher: a decorator that prioritises
//! states sitting at merge points so that their merge groups can complete
//! and release.

use tracing::debug;

use crate::{engine::DynEngine, searcher::Searcher, state::StateRef};

/// A searcher that steps states favoured by the engine's merge groups
/// before consulting its base.
#[derive(Debug)]
pub struct MergingSearcher {
    engine: DynEngine,
    base: Box<dyn Searcher>,
}

impl MergingSearcher {
    /// Constructs a new merging searcher over `base`.
    #[must_use]
    pub fn new(engine: DynEngine, base: Box<dyn Searcher>) -> Self {
        Self { engine, base }
    }
}

impl Searcher for MergingSearcher {
    fn select(&mut self) -> StateRef {
        assert!(!self.base.empty(), "base searcher is empty");

        for group in self.engine.merge_groups() {
            if !group.has_merged_states() {
                continue;
            }
            if let Some(state) = group.prioritized_state() {
                return state;
            }
            // No member can be prioritised any longer: they all exceeded
            // the time the group is willing to wait, so let the arrivals
            // go.
            debug!("preemptively releasing merge group");
            group.release_states();
        }

        self.base.select()
    }

    fn update(&mut self, current: Option<&StateRef>, added: &[StateRef], removed: &[StateRef]) {
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
        "MergingSearcher"
    }
}

#[cfg(test)]
mod test {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
        time::Duration,
    };

    use crate::{
        engine::{Engine, MergeGroup},
        error::SolverFailure,
        searcher::{DfsSearcher, MergingSearcher, Searcher},
        state::{Constraint, ExecutionState, InstructionId, StateRef},
    };

    #[derive(Debug)]
    struct StubGroup {
        merged: bool,
        prioritized: Option<StateRef>,
        released: Cell<bool>,
    }

    impl MergeGroup for StubGroup {
        fn has_merged_states(&self) -> bool {
            self.merged
        }

        fn prioritized_state(&self) -> Option<StateRef> {
            self.prioritized.clone()
        }

        fn release_states(&self) {
            self.released.set(true);
        }
    }

    #[derive(Debug, Default)]
    struct MergeEngine {
        groups: RefCell<Vec<Rc<StubGroup>>>,
    }

    impl Engine for MergeEngine {
        fn may_be_true(
            &self,
            _state: &StateRef,
            _constraint: &Constraint,
        ) -> Result<bool, SolverFailure> {
            unreachable!("merging never queries the solver")
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

        fn merge_groups(&self) -> Vec<Rc<dyn MergeGroup>> {
            self.groups
                .borrow()
                .iter()
                .map(|g| g.clone() as Rc<dyn MergeGroup>)
                .collect()
        }

        fn instructions_executed(&self) -> u64 {
            0
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

    #[test]
    fn a_prioritised_merge_state_wins_over_the_base() {
        let engine = Rc::new(MergeEngine::default());
        let merging = state(7);
        engine.groups.borrow_mut().push(Rc::new(StubGroup {
            merged: true,
            prioritized: Some(merging.clone()),
            released: Cell::new(false),
        }));

        let mut searcher = MergingSearcher::new(engine, Box::new(DfsSearcher::new()));
        let base_state = state(0);
        searcher.update(None, &[base_state], &[]);

        assert_eq!(searcher.select(), merging);
    }

    #[test]
    fn an_expired_group_is_released_and_the_base_decides() {
        let engine = Rc::new(MergeEngine::default());
        let expired = Rc::new(StubGroup {
            merged: true,
            prioritized: None,
            released: Cell::new(false),
        });
        engine.groups.borrow_mut().push(expired.clone());

        let mut searcher = MergingSearcher::new(engine, Box::new(DfsSearcher::new()));
        let base_state = state(0);
        searcher.update(None, &[base_state.clone()], &[]);

        assert_eq!(searcher.select(), base_state);
        assert!(expired.released.get());
    }

    #[test]
    fn groups_without_merged_states_are_skipped() {
        let engine = Rc::new(MergeEngine::default());
        let idle = Rc::new(StubGroup {
            merged: false,
            prioritized: Some(state(9)),
            released: Cell::new(false),
        });
        engine.groups.borrow_mut().push(idle.clone());

        let mut searcher = MergingSearcher::new(engine, Box::new(DfsSearcher::new()));
        let base_state = state(0);
        searcher.update(None, &[base_state.clone()], &[]);

        assert_eq!(searcher.select(), base_state);
        assert!(!idle.released.get());
    }
}
