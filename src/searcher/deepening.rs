//! This module contains the iterative-deepening searcher: a decorator that
//! gives every state a shared wall-time budget per visit and parks the
//! states that exceed it until the rest of the population has had its
//! turn, at which point the budget doubles and the parked states return.

use std::{collections::HashSet, time::Duration};

use tracing::debug;

use crate::{
    clock::DynClock,
    constant::INITIAL_DEEPENING_BUDGET,
    searcher::Searcher,
    state::StateRef,
};

/// A searcher that pauses states which overrun the current time budget and
/// deepens the budget once its base population drains.
#[derive(Debug)]
pub struct IterativeDeepeningTimeSearcher {
    base: Box<dyn Searcher>,
    clock: DynClock,

    /// The shared per-visit budget; doubles on every deepening.
    budget: Duration,

    /// When the most recent selection was handed out.
    start_time: Duration,

    paused: HashSet<StateRef>,
}

impl IterativeDeepeningTimeSearcher {
    /// Constructs a new deepening searcher over `base`.
    #[must_use]
    pub fn new(base: Box<dyn Searcher>, clock: DynClock) -> Self {
        Self {
            base,
            clock,
            budget: INITIAL_DEEPENING_BUDGET,
            start_time: Duration::ZERO,
            paused: HashSet::new(),
        }
    }
}

impl Searcher for IterativeDeepeningTimeSearcher {
    fn select(&mut self) -> StateRef {
        let state = self.base.select();
        self.start_time = self.clock.now();
        state
    }

    fn update(&mut self, current: Option<&StateRef>, added: &[StateRef], removed: &[StateRef]) {
        let elapsed = self.clock.now() - self.start_time;

        if removed.is_empty() {
            self.base.update(current, added, removed);
        } else {
            // Paused states are not in the base; strip them from the
            // removal list before forwarding.
            let mut forwarded: Vec<StateRef> = removed.to_vec();
            for es in removed {
                if self.paused.remove(es) {
                    forwarded.retain(|s| s != es);
                }
            }
            self.base.update(current, added, &forwarded);
        }

        if let Some(current) = current {
            if !removed.contains(current) && elapsed > self.budget {
                self.paused.insert(current.clone());
                self.base.remove_state(current);
            }
        }

        if self.base.empty() {
            self.budget *= 2;
            debug!(budget = ?self.budget, "increased deepening time budget");
            let resumed: Vec<StateRef> = self.paused.drain().collect();
            self.base.update(None, &resumed, &[]);
        }
    }

    fn empty(&mut self) -> bool {
        self.base.empty() && self.paused.is_empty()
    }

    fn size(&self) -> usize {
        self.base.size() + self.paused.len()
    }

    fn name(&self) -> &'static str {
        "IterativeDeepeningTimeSearcher"
    }
}
