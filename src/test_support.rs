//! This module contains a scripted engine implementation for exercising the
//! searchers that interact with the solver and the state lifecycle.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    time::Duration,
};

use crate::{
    engine::Engine,
    error::SolverFailure,
    state::{Constraint, InstructionId, StateRef},
};

/// An engine whose solver verdicts are scripted per constraint and which
/// records every destructive call for later assertion.
///
/// Constraints without a scripted verdict answer "unsatisfiable".
#[derive(Debug, Default)]
pub(crate) struct ScriptedEngine {
    pub verdicts: RefCell<HashMap<Constraint, Result<bool, SolverFailure>>>,
    pub queries: RefCell<Vec<Constraint>>,
    pub terminated: RefCell<Vec<StateRef>>,
    pub removed_nodes: RefCell<Vec<StateRef>>,
    pub erased: RefCell<Vec<StateRef>>,
    pub states: RefCell<Vec<StateRef>>,
    pub halt: Cell<bool>,
    pub solver_timeout: Cell<Option<Duration>>,
    pub tolerate_failures: Cell<bool>,
    pub instructions: Cell<u64>,
    pub sensitive: RefCell<Vec<u64>>,
}

impl ScriptedEngine {
    /// Scripts the solver to find `constraint` satisfiable.
    pub fn accept(&self, constraint: Constraint) {
        self.verdicts.borrow_mut().insert(constraint, Ok(true));
    }

    /// Scripts the solver to fail on `constraint`.
    pub fn fail(&self, constraint: Constraint) {
        self.verdicts.borrow_mut().insert(
            constraint,
            Err(SolverFailure::Failed {
                reason: "scripted failure".into(),
            }),
        );
    }

    /// Registers `state` in the engine's state collection.
    pub fn track(&self, state: &StateRef) {
        self.states.borrow_mut().push(state.clone());
    }
}

impl Engine for ScriptedEngine {
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
