//! This module contains the definition of a discrete probability density
//! function over arbitrary keys, supporting weighted sampling in
//! logarithmic time.

use std::{collections::HashMap, fmt::Debug, hash::Hash};

/// A mapping from keys to non-negative weights that can be sampled with
/// probability proportional to those weights.
///
/// # Implementation
///
/// The weights live in a binary-indexed (Fenwick) tree over a slot array.
/// Keys are mapped to slots through a hash map, and slots vacated by
/// removals are recycled through a free list before the array grows. When
/// the array does grow the tree is rebuilt at double the capacity, so
/// `insert`, `update`, `remove` and `choose` are all amortised
/// `O(log n)`.
#[derive(Clone, Debug)]
pub struct DiscretePDF<T>
where
    T: Clone + Debug + Eq + Hash,
{
    /// The partial weight sums, 1-indexed, over a power-of-two capacity.
    tree: Vec<f64>,

    /// The current weight of each slot; zero for vacant slots.
    weights: Vec<f64>,

    /// The key stored in each slot.
    keys: Vec<Option<T>>,

    /// The slot in which each key lives.
    slots: HashMap<T, usize>,

    /// Slots vacated by removals, recycled before the array grows.
    free: Vec<usize>,
}

impl<T> DiscretePDF<T>
where
    T: Clone + Debug + Eq + Hash,
{
    /// Constructs a new, empty, distribution.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: vec![0.0; 1],
            weights: Vec::new(),
            keys: Vec::new(),
            slots: HashMap::new(),
            free: Vec::new(),
        }
    }

    /// Inserts `item` with the provided `weight`.
    ///
    /// # Panics
    ///
    /// Panics if `item` is already present, or if `weight` is negative.
    pub fn insert(&mut self, item: T, weight: f64) {
        assert!(
            !self.slots.contains_key(&item),
            "item inserted into the distribution twice"
        );
        assert!(weight >= 0.0, "weights must be non-negative");

        let slot = if let Some(slot) = self.free.pop() {
            slot
        } else {
            self.weights.push(0.0);
            self.keys.push(None);
            let slot = self.weights.len() - 1;
            if self.weights.len() >= self.tree.len() {
                self.rebuild();
            }
            slot
        };

        self.weights[slot] = weight;
        self.keys[slot] = Some(item.clone());
        self.slots.insert(item, slot);
        self.add(slot, weight);
    }

    /// Replaces the weight associated with `item`.
    ///
    /// # Panics
    ///
    /// Panics if `item` is not present, or if `weight` is negative.
    pub fn update(&mut self, item: &T, weight: f64) {
        assert!(weight >= 0.0, "weights must be non-negative");
        let slot = *self
            .slots
            .get(item)
            .expect("weight updated for an item that is not present");
        let delta = weight - self.weights[slot];
        self.weights[slot] = weight;
        self.add(slot, delta);
    }

    /// Removes `item` from the distribution.
    ///
    /// # Panics
    ///
    /// Panics if `item` is not present.
    pub fn remove(&mut self, item: &T) {
        let slot = self
            .slots
            .remove(item)
            .expect("item removed from the distribution without being present");
        self.add(slot, -self.weights[slot]);
        self.weights[slot] = 0.0;
        self.keys[slot] = None;
        self.free.push(slot);
    }

    /// Whether `item` is present in the distribution.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.slots.contains_key(item)
    }

    /// Chooses an item with probability proportional to its weight, driven
    /// by the uniform sample `u ∈ [0, 1)`.
    ///
    /// If every weight is zero the items are indistinguishable and the
    /// lowest-slotted one is returned.
    ///
    /// # Panics
    ///
    /// Panics if the distribution is empty or `u` is outside `[0, 1)`.
    #[must_use]
    pub fn choose(&self, u: f64) -> T {
        assert!(!self.is_empty(), "choose called on an empty distribution");
        assert!((0.0..1.0).contains(&u), "uniform sample outside [0, 1)");

        let total = self.prefix(self.weights.len());
        let slot = if total > 0.0 {
            self.descend(u * total)
        } else {
            0
        };

        // The descent can land on a vacant or zero-weight slot when the
        // target hits a cumulative-sum boundary exactly; the owner of that
        // probability mass is the next occupied slot.
        let mut slot = slot;
        while slot < self.weights.len() && self.keys[slot].is_none() {
            slot += 1;
        }
        self.keys
            .get(slot)
            .and_then(Option::as_ref)
            .expect("sample target beyond the total weight")
            .clone()
    }

    /// The number of items in the distribution.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the distribution holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Adds `delta` to the partial sums covering `slot`.
    fn add(&mut self, slot: usize, delta: f64) {
        let mut i = slot + 1;
        while i < self.tree.len() {
            self.tree[i] += delta;
            i += i & i.wrapping_neg();
        }
    }

    /// The sum of the weights of the first `count` slots.
    fn prefix(&self, count: usize) -> f64 {
        let mut i = count;
        let mut sum = 0.0;
        while i > 0 {
            sum += self.tree[i];
            i -= i & i.wrapping_neg();
        }
        sum
    }

    /// Finds the slot owning the cumulative weight `target`, i.e. the
    /// lowest slot whose cumulative sum exceeds it.
    fn descend(&self, target: f64) -> usize {
        let mut remaining = target;
        let mut idx = 0;
        let mut step = (self.tree.len() - 1).next_power_of_two();
        while step != 0 {
            let next = idx + step;
            if next < self.tree.len() && self.tree[next] <= remaining {
                remaining -= self.tree[next];
                idx = next;
            }
            step >>= 1;
        }
        idx
    }

    /// Rebuilds the tree at double the current capacity.
    fn rebuild(&mut self) {
        let capacity = (self.weights.len() + 1).next_power_of_two().max(2);
        self.tree = vec![0.0; capacity];
        let weights: Vec<(usize, f64)> = self
            .weights
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, w)| *w != 0.0)
            .collect();
        for (slot, weight) in weights {
            self.add(slot, weight);
        }
    }
}

impl<T> Default for DiscretePDF<T>
where
    T: Clone + Debug + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
