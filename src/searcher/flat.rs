//! This module contains the flat selection disciplines: depth-first,
//! breadth-first and uniform random selection over a plain container of
//! states.

use std::collections::{HashSet, VecDeque};

use derivative::Derivative;
use rand::RngCore;

use crate::{rng::DynRng, searcher::Searcher, state::StateRef};

/// A depth-first searcher: always steps the most recently forked state.
#[derive(Debug, Default)]
pub struct DfsSearcher {
    states: Vec<StateRef>,
}

impl DfsSearcher {
    /// Constructs a new searcher with an empty population.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Searcher for DfsSearcher {
    fn select(&mut self) -> StateRef {
        self.states
            .last()
            .expect("selection from an empty population")
            .clone()
    }

    fn update(&mut self, _current: Option<&StateRef>, added: &[StateRef], removed: &[StateRef]) {
        self.states.extend(added.iter().cloned());
        for es in removed {
            if self.states.last() == Some(es) {
                let _ = self.states.pop();
            } else if let Some(pos) = self.states.iter().position(|s| s == es) {
                let _ = self.states.remove(pos);
            }
            // A removal that never matches is tolerated here.
        }
    }

    fn empty(&mut self) -> bool {
        self.states.is_empty()
    }

    fn size(&self) -> usize {
        self.states.len()
    }

    fn name(&self) -> &'static str {
        "DfsSearcher"
    }
}

/// A breadth-first searcher.
///
/// This is a queue with one twist: when the stepped state forks, it is
/// moved to the tail before the new states are appended. Without this the
/// parent of a fork would keep its head priority across generations and
/// starve the queue behind it.
#[derive(Debug, Default)]
pub struct BfsSearcher {
    states: VecDeque<StateRef>,
}

impl BfsSearcher {
    /// Constructs a new searcher with an empty population.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Searcher for BfsSearcher {
    fn select(&mut self) -> StateRef {
        self.states
            .front()
            .expect("selection from an empty population")
            .clone()
    }

    fn update(&mut self, current: Option<&StateRef>, added: &[StateRef], removed: &[StateRef]) {
        if let Some(current) = current {
            if !added.is_empty() && !removed.contains(current) {
                let pos = self
                    .states
                    .iter()
                    .position(|s| s == current)
                    .expect("stepped state missing from the population");
                let _ = self.states.remove(pos);
                self.states.push_back(current.clone());
            }
        }

        self.states.extend(added.iter().cloned());
        for es in removed {
            if self.states.front() == Some(es) {
                let _ = self.states.pop_front();
            } else {
                let pos = self
                    .states
                    .iter()
                    .position(|s| s == es)
                    .expect("invalid state removed");
                let _ = self.states.remove(pos);
            }
        }
    }

    fn empty(&mut self) -> bool {
        self.states.is_empty()
    }

    fn size(&self) -> usize {
        self.states.len()
    }

    fn name(&self) -> &'static str {
        "BfsSearcher"
    }
}

/// A searcher that picks uniformly at random from its population.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct RandomSearcher {
    states: Vec<StateRef>,

    #[derivative(Debug = "ignore")]
    rng: DynRng,
}

impl RandomSearcher {
    /// Constructs a new searcher drawing from `rng`.
    #[must_use]
    pub fn new(rng: DynRng) -> Self {
        let states = Vec::new();
        Self { states, rng }
    }
}

impl Searcher for RandomSearcher {
    fn select(&mut self) -> StateRef {
        assert!(!self.states.is_empty(), "selection from an empty population");
        let index = (self.rng.borrow_mut().next_u32() as usize) % self.states.len();
        self.states[index].clone()
    }

    fn update(&mut self, _current: Option<&StateRef>, added: &[StateRef], removed: &[StateRef]) {
        self.states.extend(added.iter().cloned());
        for es in removed {
            let pos = self
                .states
                .iter()
                .position(|s| s == es)
                .expect("invalid state removed");
            self.states.remove(pos);
        }
    }

    fn empty(&mut self) -> bool {
        self.states.is_empty()
    }

    fn size(&self) -> usize {
        self.states.len()
    }

    fn select_for_deletion(&mut self, n: usize) -> Vec<StateRef> {
        if n >= self.states.len() {
            return self.states.clone();
        }

        let mut victims = HashSet::with_capacity(n);
        while victims.len() < n {
            let index = (self.rng.borrow_mut().next_u32() as usize) % self.states.len();
            victims.insert(self.states[index].clone());
        }
        victims.into_iter().collect()
    }

    fn name(&self) -> &'static str {
        "RandomSearcher"
    }
}
