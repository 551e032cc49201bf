//! This module contains the pending searcher: the decorator that manages
//! states whose survival still hinges on a deferred satisfiability query.
//!
//! The interpreter is free to fork a state without paying for the solver
//! call that would justify the new path: it defers the branch predicate on
//! the child as a *pending constraint* and hands the child over like any
//! other fork. The pending searcher keeps such states out of normal
//! scheduling, and only when the normal population drains does it start
//! testing the deferred predicates, reviving the feasible states and
//! destroying the rest.

use std::time::Duration;

use tracing::debug;

use crate::{
    clock::DynClock,
    config::Config,
    engine::{DynEngine, Engine},
    searcher::Searcher,
    state::StateRef,
};

/// Counters describing the outcomes of revival queries.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RevivalStats {
    /// How many pending states proved feasible and rejoined normal
    /// scheduling.
    pub revives: u64,

    /// How many pending states were destroyed.
    pub kills: u64,

    /// Solver time spent on queries that did not revive, during
    /// scheduling.
    pub infeasible_query_time: Duration,

    /// Solver time spent on queries that did not revive, during eviction.
    pub infeasible_killing_query_time: Duration,
}

/// Runs one revival query for `state`: takes the deferred constraint out,
/// asks the solver under `timeout` with failure tolerance forced on, and
/// permanently installs the constraint on success.
///
/// Returns whether the state was revived. On failure the caller owns the
/// decision of what to do with the now non-pending state.
///
/// # Panics
///
/// Panics if `state` has no deferred constraint.
pub(crate) fn revival_query(
    engine: &dyn Engine,
    state: &StateRef,
    timeout: Option<Duration>,
) -> bool {
    let constraint = state
        .borrow_mut()
        .take_pending_constraint()
        .expect("revival of a state with no pending constraint");

    engine.set_solver_timeout(timeout);
    let remembered_tolerance = engine.solver_failure_tolerance();
    engine.set_solver_failure_tolerance(true);

    // A failure or timeout means the state cannot be proven feasible, which
    // for revival purposes is the same as infeasible.
    let feasible = engine.may_be_true(state, &constraint).unwrap_or(false);

    engine.set_solver_failure_tolerance(remembered_tolerance);
    engine.set_solver_timeout(None);

    if feasible {
        engine.add_constraint(state, constraint);
    }
    feasible
}

/// A searcher that routes states between a `normal` and a `pending`
/// population and revives or destroys the pending ones as the normal
/// population drains.
#[derive(Debug)]
pub struct PendingSearcher {
    normal: Box<dyn Searcher>,
    pending: Box<dyn Searcher>,
    engine: DynEngine,
    clock: DynClock,
    max_revive_time: Option<Duration>,
    random_pending_deletion: bool,
    stats: RevivalStats,
}

impl PendingSearcher {
    /// Constructs a new pending searcher over the two base searchers.
    #[must_use]
    pub fn new(
        normal: Box<dyn Searcher>,
        pending: Box<dyn Searcher>,
        engine: DynEngine,
        clock: DynClock,
        config: &Config,
    ) -> Self {
        Self {
            normal,
            pending,
            engine,
            clock,
            max_revive_time: config.max_revive_time,
            random_pending_deletion: config.random_pending_deletion,
            stats: RevivalStats::default(),
        }
    }

    /// Gets the revival statistics accumulated so far.
    #[must_use]
    pub fn revival_stats(&self) -> RevivalStats {
        self.stats
    }

    /// Tests one pending state and either moves it into the normal
    /// population or destroys it. `killing` selects which of the two query
    /// timers an unsuccessful query is charged to.
    fn revive_or_destroy(&mut self, state: &StateRef, killing: bool) -> bool {
        let started = self.clock.now();
        let revived = revival_query(self.engine.as_ref(), state, self.max_revive_time);

        if revived {
            self.normal.update(None, &[state.clone()], &[]);
            self.pending.update(None, &[], &[state.clone()]);
            self.stats.revives += 1;
            debug!(state = state.id(), "revived pending state");
        } else {
            let elapsed = self.clock.now() - started;
            if killing {
                self.stats.infeasible_killing_query_time += elapsed;
            } else {
                self.stats.infeasible_query_time += elapsed;
            }
            self.stats.kills += 1;
            debug!(state = state.id(), "killing unrevivable pending state");

            self.pending.update(None, &[], &[state.clone()]);
            self.engine.remove_tree_node(state);
            self.engine.erase_state(state);
            // Dropping our handle is the final step of the destruction
            // sequence.
        }
        revived
    }
}

impl Searcher for PendingSearcher {
    fn select(&mut self) -> StateRef {
        self.normal.select()
    }

    fn update(&mut self, current: Option<&StateRef>, added: &[StateRef], removed: &[StateRef]) {
        let mut added_normal = Vec::new();
        let mut added_pending = Vec::new();
        let mut removed_normal = Vec::new();
        let mut removed_pending = Vec::new();

        for es in added {
            if es.borrow().is_pending() {
                added_pending.push(es.clone());
            } else {
                added_normal.push(es.clone());
            }
        }
        for es in removed {
            if es.borrow().is_pending() {
                removed_pending.push(es.clone());
            } else {
                removed_normal.push(es.clone());
            }
        }

        // The interpreter may have deferred a constraint on the stepped
        // state itself; it then migrates from the normal to the pending
        // population.
        if let Some(current) = current {
            if current.borrow().is_pending() {
                removed_normal.push(current.clone());
                added_pending.push(current.clone());
            }
        }

        self.normal.update(current, &added_normal, &removed_normal);
        self.pending.update(None, &added_pending, &removed_pending);
    }

    fn empty(&mut self) -> bool {
        if !self.normal.empty() {
            return false;
        }

        while self.normal.empty() {
            if self.pending.empty() {
                return true;
            }
            let state = self.pending.select();
            self.revive_or_destroy(&state, false);
        }

        false
    }

    fn size(&self) -> usize {
        self.normal.size() + self.pending.size()
    }

    fn select_for_deletion(&mut self, n: usize) -> Vec<StateRef> {
        if self.random_pending_deletion {
            let mut victims = self.pending.select_for_deletion(n);
            if victims.len() < n {
                victims.extend(self.normal.select_for_deletion(n - victims.len()));
            }
            return victims;
        }

        debug!(requested = n, "culling by testing pending states");
        let mut remaining = n;
        let mut revived: usize = 0;
        let mut killed: usize = 0;

        // Killing a pending state satisfies one unit of the victim budget
        // outright, so the budget shrinks only on kills. Pendings are only
        // worth testing while they outnumber the remaining budget.
        while !self.pending.empty() && remaining > revived && self.pending.size() > remaining {
            if self.engine.halt_requested() {
                return Vec::new();
            }
            let state = self.pending.select();
            if self.revive_or_destroy(&state, true) {
                revived += 1;
            } else {
                killed += 1;
                remaining -= 1;
            }
        }
        debug!(killed, revived, "pending cull round complete");

        self.normal.select_for_deletion(remaining)
    }

    fn name(&self) -> &'static str {
        "PendingSearcher"
    }
}
