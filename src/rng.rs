//! This module contains the random number source shared by the stochastic
//! searchers.
//!
//! The source is process-wide state handed to the searcher constructors as
//! a handle; tests inject deterministic replacements such as
//! [`rand::rngs::mock::StepRng`].

use std::{cell::RefCell, rc::Rc};

use rand::{rngs::StdRng, RngCore, SeedableRng};

/// A dynamically dispatched, shared random number source.
pub type DynRng = Rc<RefCell<dyn RngCore>>;

/// Constructs the default source, seeded from operating system entropy.
#[must_use]
pub fn from_entropy() -> DynRng {
    Rc::new(RefCell::new(StdRng::from_entropy()))
}

/// Constructs a source with a fixed seed, for reproducible runs.
#[must_use]
pub fn from_seed(seed: u64) -> DynRng {
    Rc::new(RefCell::new(StdRng::seed_from_u64(seed)))
}

/// Wraps an arbitrary generator into the shared handle form.
pub fn in_handle<R: RngCore + 'static>(rng: R) -> DynRng {
    Rc::new(RefCell::new(rng))
}
