//! This module contains the time source used by the budget-driven
//! searchers.
//!
//! Wall-clock time is process-wide state in the same way the random number
//! source is; making it a handle passed to the constructors keeps the
//! budget arithmetic deterministic under test.

use std::{
    cell::Cell,
    fmt::Debug,
    rc::Rc,
    time::{Duration, Instant},
};

/// A dynamically dispatched [`Clock`] instance.
pub type DynClock = Rc<dyn Clock>;

/// A monotonic time source.
pub trait Clock
where
    Self: Debug,
{
    /// The time elapsed since the clock's epoch.
    #[must_use]
    fn now(&self) -> Duration;
}

/// The real time source, measuring from the moment of its construction.
#[derive(Clone, Debug)]
pub struct WallClock {
    epoch: Instant,
}

impl WallClock {
    /// Constructs a new wall clock with its epoch at the present moment.
    #[must_use]
    pub fn new() -> Self {
        let epoch = Instant::now();
        Self { epoch }
    }

    /// Wraps the clock into an [`Rc`].
    #[must_use]
    pub fn in_rc(self) -> Rc<dyn Clock> {
        Rc::new(self)
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// A clock whose time only moves when it is told to.
///
/// Intended for tests and for engines that simulate time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    /// Constructs a new manual clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }

    /// Wraps the clock into an [`Rc`].
    #[must_use]
    pub fn in_rc(self) -> Rc<dyn Clock> {
        Rc::new(self)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}
