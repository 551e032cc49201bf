//! This module contains the distance-bounded explorer: a pending searcher
//! that steers exploration toward the depths the engine has flagged as
//! sensitive.
//!
//! Each pending state is ranked by how far below a sensitive depth it sits.
//! Revival consumes the closest candidates first, and every
//! successful revival installs a depth bound around the revived state:
//! forks that escape the bound are not worth the exploration budget and are
//! terminated instead of admitted.

use std::{collections::HashMap, time::Duration};

use itertools::Itertools;
use tracing::debug;

use crate::{
    config::Config,
    engine::DynEngine,
    searcher::{
        flat::DfsSearcher,
        pending::{revival_query, RevivalStats},
        Searcher,
    },
    state::StateRef,
};

/// A searcher that revives pending states in order of their distance to a
/// sensitive depth and bounds exploration around each revival.
#[derive(Debug)]
pub struct ZestiPendingSearcher {
    engine: DynEngine,
    normal: DfsSearcher,

    normal_states: Vec<StateRef>,
    pending_states: Vec<StateRef>,

    /// Non-pending arrivals that escaped the current depth bound; they are
    /// terminated on the next selection.
    to_delete: Vec<StateRef>,

    /// Each pending state's distance to the nearest sensitive depth at or
    /// beyond it; [`None`] when no sensitive depth lies ahead.
    sensitive_distance: HashMap<StateRef, Option<u64>>,

    bound_multiplier: i64,
    max_revive_time: Option<Duration>,

    /// The depth of the most recently revived state; −1 until the first
    /// revival, meaning unbounded.
    current_base_depth: i64,
    bound: i64,

    /// Whether the first selection round has begun; distances are computed
    /// exactly once, at its start.
    has_selected: bool,

    stats: RevivalStats,
}

impl ZestiPendingSearcher {
    /// Constructs a new searcher configured from `config`.
    #[must_use]
    pub fn new(engine: DynEngine, config: &Config) -> Self {
        Self {
            engine,
            normal: DfsSearcher::new(),
            normal_states: Vec::new(),
            pending_states: Vec::new(),
            to_delete: Vec::new(),
            sensitive_distance: HashMap::new(),
            bound_multiplier: config.zesti_bound_multiplier,
            max_revive_time: config.max_revive_time,
            current_base_depth: -1,
            bound: 0,
            has_selected: false,
            stats: RevivalStats::default(),
        }
    }

    /// Gets the revival statistics accumulated so far.
    #[must_use]
    pub fn revival_stats(&self) -> RevivalStats {
        self.stats
    }

    /// Ranks the pending states by sensitive distance, placing the
    /// closest candidates at the back of the list where the revival rounds
    /// consume them; equal distances tie-break by ascending depth.
    fn compute_distances(&mut self) {
        let sensitive = self.engine.sensitive_depths();
        for es in &self.pending_states {
            let depth = es.borrow().depth;
            let distance = sensitive
                .iter()
                .filter(|d| **d >= depth)
                .map(|d| d - depth)
                .min();
            self.sensitive_distance.insert(es.clone(), distance);
        }

        let distances = &self.sensitive_distance;
        self.pending_states.sort_by(|a, b| {
            let da = distances.get(a).copied().flatten().unwrap_or(u64::MAX);
            let db = distances.get(b).copied().flatten().unwrap_or(u64::MAX);
            db.cmp(&da)
                .then_with(|| a.borrow().depth.cmp(&b.borrow().depth))
        });
    }

    /// Whether `es` falls outside the currently installed depth bound.
    #[allow(clippy::cast_possible_wrap)] // Depths are nowhere near i64::MAX
    fn beyond_bound(&self, es: &StateRef) -> bool {
        self.current_base_depth >= 0
            && (es.borrow().depth as i64) > self.current_base_depth + self.bound
    }
}

impl Searcher for ZestiPendingSearcher {
    fn select(&mut self) -> StateRef {
        if !self.has_selected {
            self.compute_distances();
        }
        self.has_selected = true;

        for state in self.to_delete.drain(..) {
            self.engine.terminate_state(&state);
        }

        self.normal.select()
    }

    #[allow(clippy::cast_possible_wrap)] // Depths are nowhere near i64::MAX
    fn update(&mut self, current: Option<&StateRef>, added: &[StateRef], removed: &[StateRef]) {
        let mut added_normal = Vec::new();
        let mut added_pending = Vec::new();
        let mut removed_normal = Vec::new();
        let mut removed_pending = Vec::new();

        for es in added {
            if es.borrow().is_pending() {
                added_pending.push(es.clone());
            } else if self.beyond_bound(es) {
                self.to_delete.push(es.clone());
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

        let mut current = current;
        if let Some(cur) = current {
            if cur.borrow().is_pending() {
                removed_normal.push(cur.clone());
                added_pending.push(cur.clone());
            } else if self.beyond_bound(cur) {
                if !removed.contains(cur) {
                    self.to_delete.push(cur.clone());
                }
                current = None;
            }
        }

        if self.has_selected {
            assert!(
                added_pending.is_empty(),
                "pending states cannot arrive once sensitive exploration has begun"
            );
        }

        self.normal.update(current, &added_normal, &removed_normal);

        self.normal_states.extend(added_normal.iter().cloned());
        self.pending_states.extend(added_pending.iter().cloned());
        for es in &removed_normal {
            if let Some(pos) = self.normal_states.iter().position(|s| s == es) {
                self.normal_states.remove(pos);
            }
        }
        for es in &removed_pending {
            if let Some(pos) = self.pending_states.iter().position(|s| s == es) {
                self.pending_states.remove(pos);
            }
            self.sensitive_distance.remove(es);
        }
    }

    fn empty(&mut self) -> bool {
        if !self.has_selected {
            self.compute_distances();
        }
        self.has_selected = true;

        // A zero multiplier means no exploration of pending states at all.
        if self.bound_multiplier == 0 {
            return true;
        }

        while self.normal_states.is_empty() && !self.pending_states.is_empty() {
            debug!(
                sensitive = ?self.engine.sensitive_depths(),
                ordering = %self
                    .pending_states
                    .iter()
                    .map(|es| es.borrow().depth)
                    .join(", "),
                "zesti revival round"
            );

            let state = self
                .pending_states
                .pop()
                .expect("loop guard ensures a pending candidate");
            let distance = self.sensitive_distance.get(&state).copied().flatten();

            let revived = match distance {
                Some(_) => revival_query(self.engine.as_ref(), &state, self.max_revive_time),
                // No sensitive depth lies ahead of this state; it is not
                // worth a solver query.
                None => false,
            };

            if revived {
                #[allow(clippy::cast_possible_wrap)] // Depths are nowhere near i64::MAX
                let depth = state.borrow().depth as i64;
                self.current_base_depth = depth;
                #[allow(clippy::cast_possible_wrap)]
                let distance = distance.expect("revival implies a finite distance") as i64;
                self.bound = (self.bound_multiplier * distance).max(1);
                self.stats.revives += 1;
                debug!(
                    depth,
                    bound = self.bound,
                    "zesti revived state and installed exploration bound"
                );
                self.update(None, &[state], &[]);
            } else {
                self.stats.kills += 1;
                debug!(depth = state.borrow().depth, "zesti killing pending state");
                self.engine.terminate_state(&state);
            }
        }

        self.normal.empty()
    }

    fn size(&self) -> usize {
        self.normal_states.len() + self.pending_states.len()
    }

    fn name(&self) -> &'static str {
        "ZestiPendingSearcher"
    }
}
