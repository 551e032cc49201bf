//! This module contains the execution-state surface that the scheduler
//! touches.
//!
//! A full symbolic program state carries a memory model, a constraint
//! manager and much more; none of that is of interest when deciding which
//! state to step next, so this representation is restricted to the fields
//! the selection strategies actually consume.

use std::{
    cell::{Ref, RefCell, RefMut},
    fmt::{Debug, Formatter},
    hash::{Hash, Hasher},
    rc::{Rc, Weak},
    time::Duration,
};

use crate::ptree::PTreeNode;

/// The unique identifier of an instruction in the program under execution.
///
/// The per-instruction statistics and the coverage-distance metric are both
/// indexed by this identifier.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct InstructionId(pub u64);

/// An opaque symbolic predicate.
///
/// Constraint construction belongs to the interpreter; the scheduler only
/// carries these between a state's deferred slot, the solver, and the
/// state's path condition.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Constraint(u64);

impl Constraint {
    /// Constructs a new constraint token with the provided identity.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// A single frame of a state's call stack, carrying the per-call-path
/// statistics that the weighted selection policies consume.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StackFrame {
    /// The number of instructions executed along this frame's call path.
    pub call_path_instructions: u64,

    /// A precomputed hint for the distance to uncovered code once this
    /// frame returns.
    pub min_dist_to_uncovered_on_return: u64,
}

/// A symbolic program state as seen by the scheduler.
#[derive(Debug)]
pub struct ExecutionState {
    /// The number of forks along the path to this state. Monotonic along a
    /// path.
    pub depth: u64,

    /// The instruction the state will execute next.
    pub pc: InstructionId,

    /// The solver time accumulated by this state so far.
    pub query_cost: Duration,

    /// The number of instructions executed since this state last covered
    /// new code.
    pub insts_since_cov_new: u64,

    /// The call stack. Never empty for a live state.
    pub stack: Vec<StackFrame>,

    /// A predicate that has not yet been added to the path condition. While
    /// present, the state is *pending*: it is assumed possibly-infeasible
    /// and is kept out of normal scheduling.
    pending_constraint: Option<Constraint>,

    /// The path condition.
    constraints: Vec<Constraint>,

    /// Back-pointer to this state's leaf in the process tree.
    ptree_node: Weak<PTreeNode>,
}

impl ExecutionState {
    /// Constructs a new state at depth zero with a single stack frame,
    /// positioned at `pc`.
    #[must_use]
    pub fn new(pc: InstructionId) -> Self {
        Self {
            depth: 0,
            pc,
            query_cost: Duration::ZERO,
            insts_since_cov_new: 0,
            stack: vec![StackFrame::default()],
            pending_constraint: None,
            constraints: Vec::new(),
            ptree_node: Weak::new(),
        }
    }

    /// Sets the state's fork depth to `depth`.
    #[must_use]
    pub fn with_depth(mut self, depth: u64) -> Self {
        self.depth = depth;
        self
    }

    /// Defers `constraint` on the state, making it pending.
    #[must_use]
    pub fn with_pending_constraint(mut self, constraint: Constraint) -> Self {
        self.pending_constraint = Some(constraint);
        self
    }

    /// Whether the state has a deferred constraint and is therefore kept
    /// out of normal scheduling.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending_constraint.is_some()
    }

    /// Gets the state's deferred constraint, if any.
    #[must_use]
    pub fn pending_constraint(&self) -> Option<&Constraint> {
        self.pending_constraint.as_ref()
    }

    /// Defers `constraint` on the state, making it pending.
    pub fn set_pending_constraint(&mut self, constraint: Constraint) {
        self.pending_constraint = Some(constraint);
    }

    /// Takes the deferred constraint out of the state, clearing its pending
    /// status.
    pub fn take_pending_constraint(&mut self) -> Option<Constraint> {
        self.pending_constraint.take()
    }

    /// Gets the state's path condition.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        self.constraints.as_slice()
    }

    /// Permanently adds `constraint` to the state's path condition.
    pub fn push_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Gets the state's leaf in the process tree, if the state is currently
    /// attached to one.
    #[must_use]
    pub fn ptree_node(&self) -> Option<Rc<PTreeNode>> {
        self.ptree_node.upgrade()
    }

    /// Attaches the state to its leaf in the process tree.
    pub fn set_ptree_node(&mut self, node: &Rc<PTreeNode>) {
        self.ptree_node = Rc::downgrade(node);
    }
}

/// A shared handle to an execution state.
///
/// The engine exclusively owns every state; searchers hold these handles as
/// non-owning references in spirit. Equality and hashing are by identity,
/// so that membership in a population never depends on the state's mutable
/// contents.
#[derive(Clone)]
pub struct StateRef(Rc<RefCell<ExecutionState>>);

impl StateRef {
    /// Wraps `state` into a shared handle.
    #[must_use]
    pub fn new(state: ExecutionState) -> Self {
        Self(Rc::new(RefCell::new(state)))
    }

    /// Borrows the underlying state immutably.
    ///
    /// # Panics
    ///
    /// Panics if the state is currently mutably borrowed. The scheduler is
    /// single-threaded and never holds a borrow across a call into a
    /// searcher or the engine, so this indicates a programmer bug.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, ExecutionState> {
        self.0.borrow()
    }

    /// Borrows the underlying state mutably.
    ///
    /// # Panics
    ///
    /// Panics if the state is currently borrowed elsewhere.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, ExecutionState> {
        self.0.borrow_mut()
    }

    /// A stable identity for the state, for use in log lines.
    #[must_use]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for StateRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for StateRef {}

impl Hash for StateRef {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(hasher);
    }
}

impl Debug for StateRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0.try_borrow() {
            Ok(state) => write!(f, "StateRef(depth = {}, pc = {:?})", state.depth, state.pc),
            Err(_) => write!(f, "StateRef(<borrowed>)"),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::state::{Constraint, ExecutionState, InstructionId, StateRef};

    #[test]
    fn equality_is_by_identity() {
        let a = StateRef::new(ExecutionState::new(InstructionId(1)));
        let b = StateRef::new(ExecutionState::new(InstructionId(1)));

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn taking_the_pending_constraint_clears_pending_status() {
        let state = StateRef::new(
            ExecutionState::new(InstructionId(0)).with_pending_constraint(Constraint::new(7)),
        );
        assert!(state.borrow().is_pending());

        let taken = state.borrow_mut().take_pending_constraint();
        assert_eq!(taken, Some(Constraint::new(7)));
        assert!(!state.borrow().is_pending());
    }
}
