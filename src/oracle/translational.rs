//! In-memory translational (TransE-style) oracle over pre-trained embeddings.
//!
//! Scores a triple `(h, r, t)` as `-||h + r - t||₂`, so a triple whose tail
//! sits where the relation translates the head is the most plausible.
//! Literal objects are looked up among the entity vectors under their lexical
//! form, which is how translational models export literal nodes.
//!
//! Embedding file format:
//!
//! ```json
//! {"entities": {"ex:u": [0.1, 0.2]}, "relations": {"ex:diet": [0.0, 1.0]}}
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DcrResult, OracleError};
use crate::graph::{Entity, Triple};

use super::{EmbeddingOracle, Neighbors, euclidean};

#[derive(Debug, Deserialize)]
struct EmbeddingFile {
    entities: HashMap<String, Vec<f64>>,
    #[serde(default)]
    relations: HashMap<String, Vec<f64>>,
}

/// Pre-trained entity and relation vectors held in memory.
#[derive(Debug, Clone)]
pub struct TranslationalOracle {
    dim: usize,
    entities: HashMap<String, Vec<f64>>,
    relations: HashMap<String, Vec<f64>>,
}

/// Incremental constructor, mostly for tests and small fixtures.
#[derive(Debug, Default)]
pub struct TranslationalOracleBuilder {
    entities: HashMap<String, Vec<f64>>,
    relations: HashMap<String, Vec<f64>>,
}

impl TranslationalOracleBuilder {
    pub fn entity(mut self, name: impl Into<String>, vector: Vec<f64>) -> Self {
        self.entities.insert(name.into(), vector);
        self
    }

    pub fn relation(mut self, name: impl Into<String>, vector: Vec<f64>) -> Self {
        self.relations.insert(name.into(), vector);
        self
    }

    pub fn build(self) -> DcrResult<TranslationalOracle> {
        TranslationalOracle::from_embeddings(self.entities, self.relations)
    }
}

impl TranslationalOracle {
    pub fn builder() -> TranslationalOracleBuilder {
        TranslationalOracleBuilder::default()
    }

    /// Create from pre-trained embeddings, checking that all dimensions agree.
    pub fn from_embeddings(
        entities: HashMap<String, Vec<f64>>,
        relations: HashMap<String, Vec<f64>>,
    ) -> DcrResult<Self> {
        let dim = entities
            .values()
            .chain(relations.values())
            .next()
            .map(|v| v.len())
            .unwrap_or(0);

        for (name, v) in entities.iter().chain(relations.iter()) {
            if v.len() != dim {
                return Err(OracleError::DimensionMismatch {
                    name: name.clone(),
                    expected: dim,
                    actual: v.len(),
                }
                .into());
            }
        }

        Ok(Self {
            dim,
            entities,
            relations,
        })
    }

    /// Parse the JSON embedding format.
    pub fn from_json(content: &str) -> DcrResult<Self> {
        let file: EmbeddingFile =
            serde_json::from_str(content).map_err(|e| OracleError::Backend {
                message: format!("malformed embedding document: {e}"),
            })?;
        Self::from_embeddings(file.entities, file.relations)
    }

    /// Read the JSON embedding format from disk.
    pub fn load(path: &Path) -> DcrResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| OracleError::Backend {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        let oracle = Self::from_json(&content)?;
        tracing::info!(
            path = %path.display(),
            entities = oracle.entities.len(),
            relations = oracle.relations.len(),
            dim = oracle.dim,
            "loaded embeddings"
        );
        Ok(oracle)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn entity_vec(&self, name: &str) -> DcrResult<&[f64]> {
        self.entities
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                OracleError::UnknownEntity {
                    entity: name.to_owned(),
                }
                .into()
            })
    }

    fn relation_vec(&self, name: &str) -> DcrResult<&[f64]> {
        self.relations
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                OracleError::UnknownRelation {
                    relation: name.to_owned(),
                }
                .into()
            })
    }
}

impl EmbeddingOracle for TranslationalOracle {
    fn embed(&self, entities: &[Entity]) -> DcrResult<Vec<Vec<f64>>> {
        entities
            .iter()
            .map(|e| self.entity_vec(e.as_str()).map(<[f64]>::to_vec))
            .collect()
    }

    fn score(&self, candidates: &[Triple]) -> DcrResult<Vec<f64>> {
        candidates
            .iter()
            .map(|t| {
                let h = self.entity_vec(t.subject.as_str())?;
                let r = self.relation_vec(t.predicate.as_str())?;
                let o = self.entity_vec(t.object.lexical())?;
                let dist = h
                    .iter()
                    .zip(r)
                    .zip(o)
                    .map(|((h, r), o)| (h + r - o) * (h + r - o))
                    .sum::<f64>()
                    .sqrt();
                Ok(-dist)
            })
            .collect()
    }

    fn nearest_neighbors(
        &self,
        entity: &Entity,
        k: usize,
        subset: &[Entity],
    ) -> DcrResult<Neighbors> {
        let query = self.entity_vec(entity.as_str())?;
        let mut ranked = subset
            .iter()
            .map(|candidate| {
                let v = self.entity_vec(candidate.as_str())?;
                Ok((candidate.clone(), euclidean(query, v)))
            })
            .collect::<DcrResult<Vec<(Entity, f64)>>>()?;

        // Stable: equal distances keep subset order.
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.truncate(k);

        let (entities, distances) = ranked.into_iter().unzip();
        Ok(Neighbors {
            entities,
            distances,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Term;

    fn oracle() -> TranslationalOracle {
        TranslationalOracle::builder()
            .entity("a", vec![0.0, 0.0])
            .entity("b", vec![1.0, 0.0])
            .entity("c", vec![3.0, 0.0])
            .entity("5", vec![0.0, 1.0])
            .relation("r", vec![0.0, 1.0])
            .build()
            .unwrap()
    }

    #[test]
    fn rejects_mixed_dimensions() {
        let err = TranslationalOracle::builder()
            .entity("a", vec![0.0])
            .entity("b", vec![0.0, 1.0])
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn translation_scores_highest() {
        let o = oracle();
        let scores = o
            .score(&[
                Triple::new("a", "r", Term::literal("5")),
                Triple::new("a", "r", Term::entity("c")),
            ])
            .unwrap();
        assert!((scores[0] - 0.0).abs() < 1e-12);
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn unknown_relation_is_an_error() {
        let o = oracle();
        assert!(o.score(&[Triple::new("a", "nope", Term::entity("b"))]).is_err());
    }

    #[test]
    fn neighbours_are_ranked_and_truncated() {
        let o = oracle();
        let subset = vec![Entity::new("c"), Entity::new("b"), Entity::new("a")];
        let n = o.nearest_neighbors(&Entity::new("a"), 2, &subset).unwrap();
        assert_eq!(n.entities, vec![Entity::new("a"), Entity::new("b")]);
        assert_eq!(n.distances, vec![0.0, 1.0]);
    }

    #[test]
    fn parses_json() {
        let o = TranslationalOracle::from_json(
            r#"{"entities": {"x": [1.0, 2.0]}, "relations": {"p": [0.5, 0.5]}}"#,
        )
        .unwrap();
        assert_eq!(o.dim(), 2);
        assert_eq!(o.embed(&[Entity::new("x")]).unwrap(), vec![vec![1.0, 2.0]]);
    }
}
