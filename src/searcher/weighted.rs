//! This module contains the weighted-random searcher: selection by
//! sampling a discrete distribution whose weights are derived from the
//! states' execution statistics.

use std::collections::HashSet;

use derivative::Derivative;
use rand::Rng;
use tracing::debug;

use crate::{
    constant::{
        CHEAP_QUERY_COST_SECONDS,
        COVERING_NEW_GRACE_INSTRUCTIONS,
        UNCOVERED_DISTANCE_FALLBACK,
    },
    data::DiscretePDF,
    engine::DynEngine,
    rng::DynRng,
    searcher::Searcher,
    state::StateRef,
};

/// The weighting policies available to the weighted-random searcher.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WeightType {
    /// Weight proportional to the state's fork depth.
    Depth,

    /// `2^-depth`, matching the probability a uniform fork walk reaches the
    /// state.
    RandomPath,

    /// The inverse square of how often the state's next instruction has
    /// been executed, steering towards rarely-visited code.
    InstCount,

    /// The inverse of the instruction count along the state's current call
    /// path.
    CpInstCount,

    /// Penalises states that have accumulated solver time.
    QueryCost,

    /// The inverse square of the distance to the nearest uncovered
    /// instruction.
    MinDistToUncovered,

    /// Combines distance-to-uncovered with the time since the state last
    /// covered new code.
    CoveringNew,
}

impl WeightType {
    /// Whether weights under this policy depend on execution statistics
    /// that change as the state runs, and so must be refreshed on update.
    #[must_use]
    pub fn is_dynamic(self) -> bool {
        !matches!(self, Self::Depth | Self::RandomPath)
    }
}

/// A searcher that samples its population with probability proportional to
/// a per-state weight.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct WeightedRandomSearcher {
    states: DiscretePDF<StateRef>,
    weight_type: WeightType,
    engine: DynEngine,

    #[derivative(Debug = "ignore")]
    rng: DynRng,
}

impl WeightedRandomSearcher {
    /// Constructs a new searcher weighting its population by `weight_type`.
    #[must_use]
    pub fn new(weight_type: WeightType, engine: DynEngine, rng: DynRng) -> Self {
        let states = DiscretePDF::new();
        Self {
            states,
            weight_type,
            engine,
            rng,
        }
    }

    /// Computes the current weight of `es` under the configured policy.
    #[allow(clippy::cast_precision_loss)] // The statistics fit f64 comfortably
    fn weight_of(&self, es: &StateRef) -> f64 {
        let es = es.borrow();
        match self.weight_type {
            WeightType::Depth => es.depth as f64,
            WeightType::RandomPath => (-(es.depth as f64)).exp2(),
            WeightType::InstCount => {
                let count = self.engine.instruction_count_at(es.pc);
                let inv = 1.0 / count.max(1) as f64;
                inv * inv
            }
            WeightType::CpInstCount => {
                let frame = es.stack.last().expect("state has no stack frames");
                1.0 / frame.call_path_instructions.max(1) as f64
            }
            WeightType::QueryCost => {
                let seconds = es.query_cost.as_secs_f64();
                if seconds < CHEAP_QUERY_COST_SECONDS {
                    1.0
                } else {
                    1.0 / seconds
                }
            }
            WeightType::MinDistToUncovered | WeightType::CoveringNew => {
                let frame = es.stack.last().expect("state has no stack frames");
                let md2u = self
                    .engine
                    .min_dist_to_uncovered(es.pc, frame.min_dist_to_uncovered_on_return);
                let md2u = if md2u == 0 {
                    UNCOVERED_DISTANCE_FALLBACK
                } else {
                    md2u
                };
                let inv_md2u = 1.0 / md2u as f64;

                if self.weight_type == WeightType::CoveringNew {
                    let inv_cov_new = if es.insts_since_cov_new > 0 {
                        let past_grace = es
                            .insts_since_cov_new
                            .saturating_sub(COVERING_NEW_GRACE_INSTRUCTIONS)
                            .max(1);
                        1.0 / past_grace as f64
                    } else {
                        0.0
                    };
                    inv_cov_new * inv_cov_new + inv_md2u * inv_md2u
                } else {
                    inv_md2u * inv_md2u
                }
            }
        }
    }
}

impl Searcher for WeightedRandomSearcher {
    fn select(&mut self) -> StateRef {
        let u = self.rng.borrow_mut().gen::<f64>();
        self.states.choose(u)
    }

    fn update(&mut self, current: Option<&StateRef>, added: &[StateRef], removed: &[StateRef]) {
        if let Some(current) = current {
            if self.weight_type.is_dynamic() && !removed.contains(current) {
                let weight = self.weight_of(current);
                self.states.update(current, weight);
            }
        }

        for es in added {
            let weight = self.weight_of(es);
            self.states.insert(es.clone(), weight);
        }
        for es in removed {
            self.states.remove(es);
        }
    }

    fn empty(&mut self) -> bool {
        self.states.is_empty()
    }

    fn size(&self) -> usize {
        self.states.len()
    }

    fn select_for_deletion(&mut self, n: usize) -> Vec<StateRef> {
        // Sampling is with replacement, so the proposal may fall short of
        // `n`.
        let mut victims = HashSet::with_capacity(n);
        for _ in 0..n {
            victims.insert(self.select());
        }
        let victims: Vec<StateRef> = victims.into_iter().collect();
        debug!(count = victims.len(), "weighted-random eviction proposal");
        victims
    }

    fn name(&self) -> &'static str {
        "WeightedRandomSearcher"
    }
}
