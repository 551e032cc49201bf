//! This module contains the interleaved searcher: a round-robin
//! multiplexer over a fixed list of sub-searchers that all track the full
//! population.

use crate::{searcher::Searcher, state::StateRef};

/// A searcher that rotates selection through its sub-searchers, cycling
/// backward from the last one, while broadcasting every update to all of
/// them.
#[derive(Debug)]
pub struct InterleavedSearcher {
    searchers: Vec<Box<dyn Searcher>>,
    index: usize,
}

impl InterleavedSearcher {
    /// Constructs a new searcher rotating through `searchers`.
    ///
    /// # Panics
    ///
    /// Panics if `searchers` is empty.
    #[must_use]
    pub fn new(searchers: Vec<Box<dyn Searcher>>) -> Self {
        assert!(
            !searchers.is_empty(),
            "interleaving requires at least one sub-searcher"
        );
        let index = searchers.len();
        Self { searchers, index }
    }
}

impl Searcher for InterleavedSearcher {
    fn select(&mut self) -> StateRef {
        self.index -= 1;
        let state = self.searchers[self.index].select();
        if self.index == 0 {
            self.index = self.searchers.len();
        }
        state
    }

    fn update(&mut self, current: Option<&StateRef>, added: &[StateRef], removed: &[StateRef]) {
        for searcher in &mut self.searchers {
            searcher.update(current, added, removed);
        }
    }

    fn empty(&mut self) -> bool {
        // Updates are broadcast, so any sub-searcher can answer for all.
        self.searchers[0].empty()
    }

    fn size(&self) -> usize {
        self.searchers[0].size()
    }

    fn name(&self) -> &'static str {
        "InterleavedSearcher"
    }
}
