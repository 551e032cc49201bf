//! This module contains common testing utilities for driving the searchers
//! the way an engine would: a scripted engine with per-constraint solver
//! verdicts, and helpers for building populations of states.
#![cfg(test)]

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
    time::Duration,
};

use state_scheduler::{
    engine::Engine,
    error::SolverFailure,
    ptree::ProcessTree,
    state::{Constraint, ExecutionState, InstructionId, StateRef},
};

/// An engine whose solver verdicts are scripted per constraint and which
/// records every destructive call for later assertion.
///
/// Constraints without a scripted verdict answer "unsatisfiable".
#[derive(Debug, Default)]
#[allow(unused)] // Not every test binary exercises every recorder
pub struct TestEngine {
    pub verdicts: RefCell<HashMap<Constraint, Result<bool, SolverFailure>>>,
    pub queries: RefCell<Vec<Constraint>>,
    pub terminated: RefCell<Vec<StateRef>>,
    pub removed_nodes: RefCell<Vec<StateRef>>,
    pub erased: RefCell<Vec<StateRef>>,
    pub states: RefCell<Vec<StateRef>>,
    pub tree: RefCell<Option<Rc<ProcessTree>>>,
    pub halt: Cell<bool>,
    pub solver_timeout: Cell<Option<Duration>>,
    pub tolerate_failures: Cell<bool>,
    pub instructions: Cell<u64>,
    pub sensitive: RefCell<Vec<u64>>,
}

impl TestEngine {
    /// Scripts the solver to find `constraint` satisfiable.
    #[allow(unused)] // It is actually
    pub fn accept(&self, constraint: Constraint) {
        self.verdicts.borrow_mut().insert(constraint, Ok(true));
    }

    /// Registers `state` in the engine's state collection.
    #[allow(unused)] // It is actually
    pub fn track(&self, state: &StateRef) {
        self.states.borrow_mut().push(state.clone());
    }
}

impl Engine for TestEngine {
    fn may_be_true(
        &self,
        _state: &StateRef,
        constraint: &Constraint,
    ) -> Result<bool, SolverFailure> {
        self.queries.borrow_mut().push(constraint.clone());
        self.verdicts
            .borrow()
            .get(constraint)
            .cloned()
            .unwrap_or(Ok(false))
    }

    fn set_solver_timeout(&self, timeout: Option<Duration>) {
        self.solver_timeout.set(timeout);
    }

    fn solver_failure_tolerance(&self) -> bool {
        self.tolerate_failures.get()
    }

    fn set_solver_failure_tolerance(&self, tolerate: bool) {
        self.tolerate_failures.set(tolerate);
    }

    fn add_constraint(&self, state: &StateRef, constraint: Constraint) {
        state.borrow_mut().push_constraint(constraint);
    }

    fn terminate_state(&self, state: &StateRef) {
        self.terminated.borrow_mut().push(state.clone());
    }

    fn remove_tree_node(&self, state: &StateRef) {
        if let Some(tree) = self.tree.borrow().as_ref() {
            if let Some(node) = state.borrow().ptree_node() {
                tree.remove(&node);
            }
        }
        self.removed_nodes.borrow_mut().push(state.clone());
    }

    fn erase_state(&self, state: &StateRef) {
        self.erased.borrow_mut().push(state.clone());
        self.states.borrow_mut().retain(|s| s != state);
    }

    fn halt_requested(&self) -> bool {
        self.halt.get()
    }

    fn states(&self) -> Vec<StateRef> {
        self.states.borrow().clone()
    }

    fn sensitive_depths(&self) -> Vec<u64> {
        self.sensitive.borrow().clone()
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

/// Constructs a plain state at depth zero.
#[allow(unused)] // It is actually
pub fn state(pc: u64) -> StateRef {
    StateRef::new(ExecutionState::new(InstructionId(pc)))
}

/// Constructs a state at the provided depth.
#[allow(unused)] // It is actually
pub fn state_at_depth(depth: u64) -> StateRef {
    StateRef::new(ExecutionState::new(InstructionId(depth)).with_depth(depth))
}

/// Constructs a pending state at the provided depth.
#[allow(unused)] // It is actually
pub fn pending_state(depth: u64, constraint: u64) -> StateRef {
    StateRef::new(
        ExecutionState::new(InstructionId(depth))
            .with_depth(depth)
            .with_pending_constraint(Constraint::new(constraint)),
    )
}
