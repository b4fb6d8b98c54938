//! Ambient fragment selection policies.
//!
//! When no motif pre-empts, the channel asks its selector for the next
//! ambient fragment. The set of policies is closed; new ones are added by
//! extending the enum here.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sg_ir::FragmentId;

/// Which ambient selection strategy a channel uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Cyclic repeat of the configured order; immediate repeats allowed.
    #[default]
    RoundRobin,
    /// Uniform random draw with no memory.
    UniformRandom,
    /// Every fragment plays once per cycle before any repeats.
    Shuffle,
}

/// Selection state for one channel's ambient fragment set.
#[derive(Clone)]
pub enum Selector {
    RoundRobin {
        rotation: VecDeque<FragmentId>,
    },
    UniformRandom {
        pool: Vec<FragmentId>,
        rng: SmallRng,
    },
    Shuffle {
        /// Fragments not yet played this cycle
        pool: Vec<FragmentId>,
        /// Fragments already played this cycle
        played: Vec<FragmentId>,
        rng: SmallRng,
    },
}

impl Selector {
    /// Build the selector for a policy over the channel's fragment set.
    /// The seed only matters for the randomized policies.
    pub fn new(policy: SelectionPolicy, fragments: &[FragmentId], seed: u64) -> Self {
        match policy {
            SelectionPolicy::RoundRobin => Self::RoundRobin {
                rotation: fragments.iter().copied().collect(),
            },
            SelectionPolicy::UniformRandom => Self::UniformRandom {
                pool: fragments.to_vec(),
                rng: SmallRng::seed_from_u64(seed),
            },
            SelectionPolicy::Shuffle => Self::Shuffle {
                pool: fragments.to_vec(),
                played: Vec::with_capacity(fragments.len()),
                rng: SmallRng::seed_from_u64(seed),
            },
        }
    }

    /// Produce the next ambient fragment. Logs and returns `None` if the
    /// configured fragment set is empty.
    pub fn next(&mut self) -> Option<FragmentId> {
        match self {
            Self::RoundRobin { rotation } => {
                if rotation.is_empty() {
                    log::warn!("selection over an empty fragment set");
                    return None;
                }
                let head = rotation.pop_front()?;
                rotation.push_back(head);
                Some(head)
            }
            Self::UniformRandom { pool, rng } => {
                if pool.is_empty() {
                    log::warn!("selection over an empty fragment set");
                    return None;
                }
                Some(pool[rng.random_range(0..pool.len())])
            }
            Self::Shuffle { pool, played, rng } => {
                if pool.is_empty() && played.is_empty() {
                    log::warn!("selection over an empty fragment set");
                    return None;
                }
                // Cycle exhausted: the played history becomes the new pool
                if pool.is_empty() {
                    core::mem::swap(pool, played);
                }
                let drawn = pool.swap_remove(rng.random_range(0..pool.len()));
                played.push(drawn);
                Some(drawn)
            }
        }
    }
}
