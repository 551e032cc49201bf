//! This module contains the random-path searcher: a uniform sample over
//! the leaves of its subtree of the shared process tree.
//!
//! Each live instance owns one tag bit in every child slot of the tree. On
//! update it maintains the invariant that a slot carries its bit exactly
//! when the subtree below contains a leaf from its population; selection is
//! then a root-to-leaf walk over owned slots, flipping a coin wherever both
//! children qualify.

use std::rc::Rc;

use derivative::Derivative;
use rand::RngCore;
use tracing::debug;

use crate::{
    engine::DynEngine,
    error::Result,
    ptree::{PTreeNode, ProcessTree},
    rng::DynRng,
    searcher::Searcher,
    state::StateRef,
};

/// A searcher that selects a uniformly random leaf of its subtree of the
/// process tree.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct RandomPathSearcher {
    tree: Rc<ProcessTree>,
    engine: DynEngine,
    tag_bit: u8,

    /// The cached word of branch directions and how many of its bits are
    /// still unused.
    flips: u32,
    bits: u32,

    size: usize,

    #[derivative(Debug = "ignore")]
    rng: DynRng,
}

impl RandomPathSearcher {
    /// Constructs a new searcher over `tree`, claiming one of the tree's
    /// searcher tag bits.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if all tag bits are already claimed by live
    /// searchers.
    pub fn new(tree: Rc<ProcessTree>, engine: DynEngine, rng: DynRng) -> Result<Self> {
        let tag_bit = tree.claim_tag_bit()?;
        Ok(Self {
            tree,
            engine,
            tag_bit,
            flips: 0,
            bits: 0,
            size: 0,
            rng,
        })
    }

    /// Walks up from `node`, marking every slot on the way as owned, and
    /// stopping as soon as a slot already carries the bit.
    fn mark_upward(&self, leaf: Rc<PTreeNode>) {
        let mut node = leaf;
        loop {
            let parent = node.parent();
            let already_owned = {
                let slot_cell = match &parent {
                    Some(p) => p.slot_of(&node),
                    None => self.tree.root(),
                };
                let mut slot = slot_cell.borrow_mut();
                if slot.is_valid_for(self.tag_bit) {
                    true
                } else {
                    slot.set_tag_bit(self.tag_bit);
                    false
                }
            };
            if already_owned {
                break;
            }
            match parent {
                Some(p) => node = p,
                None => break,
            }
        }
    }

    /// Walks up from `node`, clearing the bit on the slot pointing at each
    /// node both of whose children are outside the population.
    fn unmark_upward(&self, leaf: Rc<PTreeNode>) {
        let mut node = leaf;
        loop {
            let left_owned = node.left().borrow().is_valid_for(self.tag_bit);
            let right_owned = node.right().borrow().is_valid_for(self.tag_bit);
            if left_owned || right_owned {
                break;
            }
            let parent = node.parent();
            {
                let slot_cell = match &parent {
                    Some(p) => p.slot_of(&node),
                    None => self.tree.root(),
                };
                let mut slot = slot_cell.borrow_mut();
                assert!(
                    slot.is_valid_for(self.tag_bit),
                    "removing a process-tree child the searcher does not own"
                );
                slot.clear_tag_bit(self.tag_bit);
            }
            match parent {
                Some(p) => node = p,
                None => break,
            }
        }
    }
}

impl Searcher for RandomPathSearcher {
    fn select(&mut self) -> StateRef {
        let mut node = {
            let root = self.tree.root().borrow();
            assert!(
                root.is_valid_for(self.tag_bit),
                "process tree root does not belong to this searcher"
            );
            root.node().expect("validity implies a node").clone()
        };

        loop {
            if let Some(state) = node.state() {
                return state;
            }

            let left_owned = node.left().borrow().is_valid_for(self.tag_bit);
            let right_owned = node.right().borrow().is_valid_for(self.tag_bit);
            let go_left = match (left_owned, right_owned) {
                (true, false) => true,
                (false, true) => false,
                (true, true) => {
                    if self.bits == 0 {
                        self.flips = self.rng.borrow_mut().next_u32();
                        self.bits = 32;
                    }
                    self.bits -= 1;
                    self.flips & (1 << self.bits) != 0
                }
                (false, false) => {
                    panic!("both children of a process-tree node are invalid for this searcher")
                }
            };

            let next = {
                let slot_cell = if go_left { node.left() } else { node.right() };
                let slot = slot_cell.borrow();
                slot.node().expect("validity implies a node").clone()
            };
            node = next;
        }
    }

    fn update(&mut self, _current: Option<&StateRef>, added: &[StateRef], removed: &[StateRef]) {
        self.size = (self.size + added.len())
            .checked_sub(removed.len())
            .expect("more states removed than were present");

        for es in added {
            let leaf = es
                .borrow()
                .ptree_node()
                .expect("added state has no process-tree leaf");
            self.mark_upward(leaf);
        }

        for es in removed {
            let leaf = es
                .borrow()
                .ptree_node()
                .expect("removed state has no process-tree leaf");
            self.unmark_upward(leaf);
        }
    }

    fn empty(&mut self) -> bool {
        !self.tree.root().borrow().is_valid_for(self.tag_bit)
    }

    fn size(&self) -> usize {
        self.size
    }

    fn select_for_deletion(&mut self, n: usize) -> Vec<StateRef> {
        // Eviction does not need the subtree-uniform walk; the front of the
        // engine's collection is good enough for victims.
        debug!(requested = n, "random-path eviction proposal");
        self.engine.states().into_iter().take(n).collect()
    }

    fn name(&self) -> &'static str {
        "RandomPathSearcher"
    }
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, rc::Rc, time::Duration};

    use rand::rngs::mock::StepRng;

    use crate::{
        engine::Engine,
        error::SolverFailure,
        ptree::{PTreeNode, ProcessTree, TaggedSlot},
        rng,
        searcher::{RandomPathSearcher, Searcher},
        state::{Constraint, ExecutionState, InstructionId, StateRef},
    };

    #[derive(Debug, Default)]
    struct TreeEngine {
        states: RefCell<Vec<StateRef>>,
    }

    impl Engine for TreeEngine {
        fn may_be_true(
            &self,
            _state: &StateRef,
            _constraint: &Constraint,
        ) -> Result<bool, SolverFailure> {
            unreachable!("random-path selection never queries the solver")
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
            self.states.borrow().clone()
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

    fn state() -> StateRef {
        StateRef::new(ExecutionState::new(InstructionId(0)))
    }

    /// Forks the leaf of `existing`, producing a fresh sibling state.
    fn fork(tree: &Rc<ProcessTree>, existing: &StateRef) -> StateRef {
        let node = existing.borrow().ptree_node().expect("state has no leaf");
        let child = state();
        tree.attach(&node, existing, &child);
        child
    }

    /// Checks that every slot of the subtree under `slot` carries the tag
    /// bit exactly when a population leaf is reachable below it, returning
    /// how many population leaves were seen.
    fn check_tags(slot: &TaggedSlot, tag_bit: u8, population: &[StateRef]) -> usize {
        let Some(node) = slot.node() else {
            assert!(!slot.is_valid_for(tag_bit));
            return 0;
        };
        let reachable = count_reachable(node, population);
        assert_eq!(
            slot.is_valid_for(tag_bit),
            reachable > 0,
            "slot tag does not match subtree membership"
        );
        reachable
    }

    fn count_reachable(node: &Rc<PTreeNode>, population: &[StateRef]) -> usize {
        if let Some(state) = node.state() {
            return usize::from(population.contains(&state));
        }
        let mut total = 0;
        for cell in [node.left(), node.right()] {
            let slot = cell.borrow();
            if let Some(child) = slot.node() {
                total += count_reachable(child, population);
            }
        }
        total
    }

    fn assert_tag_invariant(
        tree: &Rc<ProcessTree>,
        searcher: &RandomPathSearcher,
        population: &[StateRef],
    ) {
        fn walk(node: &Rc<PTreeNode>, tag_bit: u8, population: &[StateRef]) {
            for cell in [node.left(), node.right()] {
                let slot = cell.borrow();
                check_tags(&slot, tag_bit, population);
                if let Some(child) = slot.node() {
                    walk(child, tag_bit, population);
                }
            }
        }

        let root = tree.root().borrow();
        check_tags(&root, searcher.tag_bit, population);
        if let Some(node) = root.node() {
            walk(node, searcher.tag_bit, population);
        }
    }

    #[test]
    fn tags_track_membership_across_updates() -> anyhow::Result<()> {
        let initial = state();
        let tree = ProcessTree::new(&initial);
        let engine = Rc::new(TreeEngine::default());
        let mut searcher =
            RandomPathSearcher::new(tree.clone(), engine, rng::from_seed(3))?;

        assert!(searcher.empty());
        searcher.update(None, &[initial.clone()], &[]);
        assert!(!searcher.empty());
        assert_tag_invariant(&tree, &searcher, &[initial.clone()]);

        let sibling = fork(&tree, &initial);
        searcher.update(Some(&initial), &[sibling.clone()], &[]);
        let grandchild = fork(&tree, &sibling);
        searcher.update(Some(&sibling), &[grandchild.clone()], &[]);
        let population = vec![initial.clone(), sibling.clone(), grandchild.clone()];
        assert_eq!(searcher.size(), 3);
        assert_tag_invariant(&tree, &searcher, &population);

        // Dropping one leaf withdraws the bits along its private spine
        // only.
        let node = grandchild.borrow().ptree_node().expect("leaf");
        searcher.update(None, &[], &[grandchild.clone()]);
        tree.remove(&node);
        assert_tag_invariant(&tree, &searcher, &[initial.clone(), sibling.clone()]);

        let node = sibling.borrow().ptree_node().expect("leaf");
        searcher.update(None, &[], &[sibling.clone()]);
        tree.remove(&node);
        let node = initial.borrow().ptree_node().expect("leaf");
        searcher.update(None, &[], &[initial.clone()]);
        tree.remove(&node);

        assert!(searcher.empty());
        assert_eq!(searcher.size(), 0);
        Ok(())
    }

    #[test]
    fn selection_walks_only_owned_slots() -> anyhow::Result<()> {
        let initial = state();
        let tree = ProcessTree::new(&initial);
        let engine = Rc::new(TreeEngine::default());

        // All-zero flip words make every coin land on "right", which is the
        // continuing state's side.
        let mut searcher = RandomPathSearcher::new(
            tree.clone(),
            engine,
            rng::in_handle(StepRng::new(0, 0)),
        )?;

        searcher.update(None, &[initial.clone()], &[]);
        let sibling = fork(&tree, &initial);
        searcher.update(Some(&initial), &[sibling.clone()], &[]);

        assert_eq!(searcher.select(), initial);

        // Once the continuing state leaves the population the walk has only
        // the sibling's side left.
        searcher.update(None, &[], &[initial.clone()]);
        assert_eq!(searcher.select(), sibling);
        Ok(())
    }

    #[test]
    fn two_searchers_keep_disjoint_populations() -> anyhow::Result<()> {
        let initial = state();
        let tree = ProcessTree::new(&initial);
        let engine = Rc::new(TreeEngine::default());

        let mut first =
            RandomPathSearcher::new(tree.clone(), engine.clone(), rng::from_seed(5))?;
        let mut second = RandomPathSearcher::new(tree.clone(), engine, rng::from_seed(6))?;

        first.update(None, &[initial.clone()], &[]);
        let sibling = fork(&tree, &initial);
        first.update(Some(&initial), &[sibling.clone()], &[]);

        // Only the second searcher tracks the sibling.
        second.update(None, &[sibling.clone()], &[]);

        assert_eq!(second.select(), sibling);
        assert_tag_invariant(&tree, &second, &[sibling.clone()]);
        assert_tag_invariant(&tree, &first, &[initial, sibling]);
        Ok(())
    }

    #[test]
    fn eviction_takes_the_front_of_the_engine_collection() -> anyhow::Result<()> {
        let initial = state();
        let tree = ProcessTree::new(&initial);
        let engine = Rc::new(TreeEngine::default());
        engine.states.borrow_mut().push(initial.clone());

        let mut searcher = RandomPathSearcher::new(tree, engine, rng::from_seed(0))?;
        assert_eq!(searcher.select_for_deletion(4), vec![initial]);
        Ok(())
    }
}
