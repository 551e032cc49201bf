//! This module contains the configuration surface for the scheduler.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constant::{
    DEFAULT_IGNORE_SOLVER_FAILURES,
    DEFAULT_RANDOM_PENDING_DELETION,
    DEFAULT_ZESTI_BOUND_MULTIPLIER,
};

/// The configuration for the scheduling subsystem.
///
/// Engines typically construct this once from their own option parsing and
/// hand it to the searcher constructors that need it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Config {
    /// The per-query solver timeout applied while testing the constraints of
    /// pending states.
    ///
    /// `None` leaves revival queries unlimited, which is the default.
    pub max_revive_time: Option<Duration>,

    /// Whether eviction takes pending states without solver-testing them.
    ///
    /// Defaults to [`DEFAULT_RANDOM_PENDING_DELETION`].
    pub random_pending_deletion: bool,

    /// The multiplier applied to a pending state's sensitive distance when
    /// installing the depth bound for exploration around sensitive depths.
    /// Zero disables that exploration.
    ///
    /// Defaults to [`DEFAULT_ZESTI_BOUND_MULTIPLIER`].
    pub zesti_bound_multiplier: i64,

    /// Whether solver failures are treated as unsatisfiable answers rather
    /// than escalated by the engine.
    ///
    /// Defaults to [`DEFAULT_IGNORE_SOLVER_FAILURES`].
    pub ignore_solver_failures: bool,
}

impl Config {
    /// Sets the `max_revive_time` config parameter to `value`.
    #[must_use]
    pub fn with_max_revive_time(mut self, value: Option<Duration>) -> Self {
        self.max_revive_time = value;
        self
    }

    /// Sets the `random_pending_deletion` config parameter to `value`.
    #[must_use]
    pub fn with_random_pending_deletion(mut self, value: bool) -> Self {
        self.random_pending_deletion = value;
        self
    }

    /// Sets the `zesti_bound_multiplier` config parameter to `value`.
    #[must_use]
    pub fn with_zesti_bound_multiplier(mut self, value: i64) -> Self {
        self.zesti_bound_multiplier = value;
        self
    }

    /// Sets the `ignore_solver_failures` config parameter to `value`.
    #[must_use]
    pub fn with_ignore_solver_failures(mut self, value: bool) -> Self {
        self.ignore_solver_failures = value;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        let max_revive_time = None;
        let random_pending_deletion = DEFAULT_RANDOM_PENDING_DELETION;
        let zesti_bound_multiplier = DEFAULT_ZESTI_BOUND_MULTIPLIER;
        let ignore_solver_failures = DEFAULT_IGNORE_SOLVER_FAILURES;
        Self {
            max_revive_time,
            random_pending_deletion,
            zesti_bound_multiplier,
            ignore_solver_failures,
        }
    }
}
