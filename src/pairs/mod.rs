//! Pair mining: distance matrices and greedy extraction of similar pairs.
//!
//! - [`matrix`] builds a distance matrix from the embedding oracle's
//!   nearest-neighbour service, in free or cross-group mode.
//! - [`extract`] turns a matrix into matched pairs, bounded either by a
//!   distance threshold or by a target proportion of all possible pairs.

pub mod extract;
pub mod matrix;

use serde::{Deserialize, Serialize};

use crate::graph::Entity;

pub use extract::{pairs_by_proportion, pairs_by_threshold};
pub use matrix::DistanceMatrix;

/// How candidate instances may be paired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingMode {
    /// Any two distinct instances of one set. Square matrix; each instance
    /// ends up in at most one thresholded pair.
    #[default]
    Free,
    /// A t0 instance (row) against a t1 instance (column). Each t0 instance is
    /// paired at most once; t1 instances may recur.
    CrossGroup,
}

impl PairingMode {
    /// "No pairing" marker, strictly larger than any real distance.
    pub fn sentinel(self) -> f64 {
        match self {
            PairingMode::Free => 100.0,
            PairingMode::CrossGroup => 200.0,
        }
    }
}

impl std::fmt::Display for PairingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairingMode::Free => write!(f, "free"),
            PairingMode::CrossGroup => write!(f, "cross-group"),
        }
    }
}

/// Two instances selected as mutually similar: `(row label, column label)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub first: Entity,
    pub second: Entity,
    /// Matrix distance at selection time.
    pub distance: f64,
}

impl MatchedPair {
    pub fn new(first: impl Into<Entity>, second: impl Into<Entity>, distance: f64) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
            distance,
        }
    }

    /// Whether `entity` is one of the two members.
    pub fn contains(&self, entity: &Entity) -> bool {
        &self.first == entity || &self.second == entity
    }
}
