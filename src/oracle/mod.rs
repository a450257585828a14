//! Embedding oracle: the black-box view of a trained embedding model.
//!
//! The pipeline never trains or stores embeddings itself. It asks an
//! [`EmbeddingOracle`] for three things:
//!
//! - entity vectors ([`EmbeddingOracle::embed`]), for pair distances;
//! - plausibility scores of candidate triples ([`EmbeddingOracle::score`]),
//!   for ranking predicted objects in the similarity scorer;
//! - nearest neighbours within a candidate subset
//!   ([`EmbeddingOracle::nearest_neighbors`]), for the distance matrix.
//!
//! Calls are blocking. Timeouts and retries belong to the implementation.

pub mod translational;

use crate::error::{DcrResult, OracleError};
use crate::graph::{Entity, Triple};

pub use translational::TranslationalOracle;

/// Ranked neighbours returned by [`EmbeddingOracle::nearest_neighbors`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighbors {
    /// Neighbour entities, closest first.
    pub entities: Vec<Entity>,
    /// Distances aligned with `entities`.
    pub distances: Vec<f64>,
}

impl Neighbors {
    pub fn iter(&self) -> impl Iterator<Item = (&Entity, f64)> {
        self.entities.iter().zip(self.distances.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Access to a trained knowledge-graph embedding model.
pub trait EmbeddingOracle {
    /// Embedding vectors for `entities`, in input order.
    fn embed(&self, entities: &[Entity]) -> DcrResult<Vec<Vec<f64>>>;

    /// Plausibility scores for candidate triples, in input order. Higher is
    /// more plausible.
    fn score(&self, candidates: &[Triple]) -> DcrResult<Vec<f64>>;

    /// The `k` entities of `subset` closest to `entity`, closest first.
    fn nearest_neighbors(&self, entity: &Entity, k: usize, subset: &[Entity])
    -> DcrResult<Neighbors>;
}

/// Euclidean distance between two vectors of equal length.
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Euclidean distance between the embeddings of two entities.
pub fn pair_distance(oracle: &dyn EmbeddingOracle, a: &Entity, b: &Entity) -> DcrResult<f64> {
    let vectors = oracle.embed(&[a.clone(), b.clone()])?;
    match vectors.as_slice() {
        [va, vb] => {
            if va.len() != vb.len() {
                return Err(OracleError::DimensionMismatch {
                    name: b.to_string(),
                    expected: va.len(),
                    actual: vb.len(),
                }
                .into());
            }
            Ok(euclidean(va, vb))
        }
        other => Err(OracleError::Backend {
            message: format!("embed returned {} vectors for 2 entities", other.len()),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euclidean_distance() {
        assert_eq!(euclidean(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(euclidean(&[1.0], &[1.0]), 0.0);
    }

    #[test]
    fn pair_distance_uses_embeddings() {
        let oracle = TranslationalOracle::builder()
            .entity("a", vec![0.0, 0.0])
            .entity("b", vec![0.0, 2.0])
            .build()
            .unwrap();
        let d = pair_distance(&oracle, &Entity::new("a"), &Entity::new("b")).unwrap();
        assert!((d - 2.0).abs() < 1e-12);
    }
}
