//! This module contains constants that are needed throughout the codebase.

use std::time::Duration;

/// The number of tag bits carried by each child slot in the process tree.
///
/// Every concurrently-live random-path searcher claims one bit for marking
/// its population, so this also caps the number of such searchers.
pub const PTREE_SLOT_TAG_BITS: u8 = 3;

/// The default multiplier applied to a pending state's sensitive distance
/// when installing the depth bound for exploration around sensitive depths.
///
/// A value of zero disables that exploration entirely.
pub const DEFAULT_ZESTI_BOUND_MULTIPLIER: i64 = 2;

/// Whether solver failures are reported as unsatisfiable answers by default,
/// rather than being escalated by the engine.
pub const DEFAULT_IGNORE_SOLVER_FAILURES: bool = true;

/// Whether eviction takes pending states without solver-testing them by
/// default.
pub const DEFAULT_RANDOM_PENDING_DELETION: bool = false;

/// The initial per-state time budget used by iterative deepening. The budget
/// doubles every time the base population drains.
pub const INITIAL_DEEPENING_BUDGET: Duration = Duration::from_secs(1);

/// The factor by which an observed batch must overshoot the configured time
/// budget before the budget is adaptively grown to the observed value.
pub const BATCH_OVERSHOOT_TOLERANCE: f64 = 1.1;

/// The accumulated solver time, in seconds, below which a state is still
/// considered cheap by the query-cost weighting policy.
pub const CHEAP_QUERY_COST_SECONDS: f64 = 0.1;

/// The distance substituted when the coverage metric reports no distance to
/// uncovered code, pushing such states far down the weighting instead of
/// making them irresistible.
pub const UNCOVERED_DISTANCE_FALLBACK: u64 = 10_000;

/// The number of instructions a state may execute after a coverage event
/// before the covering-new weighting policy starts to decay its weight.
pub const COVERING_NEW_GRACE_INSTRUCTIONS: u64 = 1_000;
