//! Structural similarity between two entities' graph neighbourhoods.
//!
//! For each compared property the embedding oracle predicts the top-ranked
//! objects of both entities (as many as the property's functionality degree).
//! Shared predictions count fully. When the property leads to structured nodes,
//! the predictions that differ are paired one-to-one and compared recursively,
//! one level down with a proportionally smaller weight. The result lies in
//! `[0, weight]`.
//!
//! Recursion is bounded by [`SimilarityConfig::max_depth`]; a comparison past
//! the bound contributes nothing. Cyclic graphs therefore terminate, at the
//! cost of ignoring structure deeper than the bound.

mod assignment;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{DcrResult, OracleError, SimilarityError};
use crate::graph::{Entity, Term, Triple, TripleStore};
use crate::oracle::EmbeddingOracle;

use self::assignment::best_assignment;

/// Which properties are compared for a pair of entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyPolicy {
    /// Every predicate of the functionality map, whether or not either entity
    /// carries it.
    #[default]
    AllConfigured,
    /// Only predicates at least one of the two entities carries. Each of them
    /// must be in the functionality map.
    Present,
}

/// Parameters of the structural similarity measure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Predicate → number of top-ranked objects compared (functionality degree).
    pub functionality: BTreeMap<Entity, usize>,
    /// Types whose instances are compared by identity only, never recursed into.
    pub end_node_types: BTreeSet<Entity>,
    /// Predicate linking a node to its type.
    pub type_predicate: Entity,
    /// Maximum recursion depth below the compared pair.
    pub max_depth: usize,
    /// Largest number of candidate pairings searched exhaustively.
    pub max_pairings: usize,
    /// Which predicates are compared for each pair; see [`PropertyPolicy`].
    pub properties: PropertyPolicy,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            functionality: BTreeMap::new(),
            end_node_types: BTreeSet::new(),
            type_predicate: Entity::new("http://www.w3.org/1999/02/22-rdf-syntax-ns#type"),
            max_depth: 4,
            max_pairings: 5040,
            properties: PropertyPolicy::AllConfigured,
        }
    }
}

impl SimilarityConfig {
    /// Check the functionality map: non-empty, every degree at least 1.
    pub fn validate(&self) -> DcrResult<()> {
        if self.functionality.is_empty() {
            return Err(SimilarityError::EmptyFunctionality.into());
        }
        if let Some((p, _)) = self.functionality.iter().find(|(_, f)| **f == 0) {
            return Err(SimilarityError::ZeroDegree {
                predicate: p.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn degree(&self, predicate: &Entity) -> DcrResult<usize> {
        match self.functionality.get(predicate) {
            Some(0) => Err(SimilarityError::ZeroDegree {
                predicate: predicate.to_string(),
            }
            .into()),
            Some(&f) => Ok(f),
            None => Err(SimilarityError::UnknownProperty {
                predicate: predicate.to_string(),
            }
            .into()),
        }
    }
}

/// How the range of a property is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeKind {
    /// Literals, typed end nodes, or nodes without outgoing properties.
    EndNode,
    Structured,
}

/// Embedding-guided structural similarity scorer.
///
/// Holds only borrowed collaborators; every call starts with fresh caches, so
/// scores never depend on call history.
pub struct StructuralSimilarity<'a> {
    store: &'a TripleStore,
    oracle: &'a dyn EmbeddingOracle,
    config: &'a SimilarityConfig,
}

impl<'a> StructuralSimilarity<'a> {
    pub fn new(
        store: &'a TripleStore,
        oracle: &'a dyn EmbeddingOracle,
        config: &'a SimilarityConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            config,
        }
    }

    /// Similarity of `a` and `b` in `[0, 1]`.
    pub fn similarity(&self, a: &Entity, b: &Entity) -> DcrResult<f64> {
        self.similarity_weighted(a, b, 1.0)
    }

    /// Similarity of `a` and `b` in `[0, weight]`.
    pub fn similarity_weighted(&self, a: &Entity, b: &Entity, weight: f64) -> DcrResult<f64> {
        self.config.validate()?;
        let mut run = ScoringRun {
            store: self.store,
            oracle: self.oracle,
            config: self.config,
            top_objects: HashMap::new(),
            pools: HashMap::new(),
            ranges: HashMap::new(),
            memo: HashMap::new(),
        };
        let score = run.score(a, b, weight, 0)?;
        tracing::debug!(%a, %b, score, "structural similarity");
        Ok(score)
    }
}

/// Caches for a single top-level comparison.
struct ScoringRun<'a> {
    store: &'a TripleStore,
    oracle: &'a dyn EmbeddingOracle,
    config: &'a SimilarityConfig,
    top_objects: HashMap<(Entity, Entity), Vec<Term>>,
    pools: HashMap<Entity, Vec<Term>>,
    ranges: HashMap<Entity, RangeKind>,
    memo: HashMap<(Entity, Entity, usize), f64>,
}

impl ScoringRun<'_> {
    fn score(&mut self, a: &Entity, b: &Entity, weight: f64, depth: usize) -> DcrResult<f64> {
        if depth > self.config.max_depth || weight <= 0.0 {
            return Ok(0.0);
        }
        let key = if a <= b {
            (a.clone(), b.clone(), depth)
        } else {
            (b.clone(), a.clone(), depth)
        };
        // Scores are linear in the weight, so the memo holds unit-weight values.
        if let Some(&cached) = self.memo.get(&key) {
            return Ok(cached * weight);
        }

        let properties = self.properties_for(a, b)?;
        if properties.is_empty() {
            self.memo.insert(key, 0.0);
            return Ok(0.0);
        }
        let relative = weight / properties.len() as f64;

        let mut total = 0.0;
        for p in &properties {
            let f = self.config.degree(p)?;
            let top_a = self.top_objects(a, p, f)?;
            let top_b = self.top_objects(b, p, f)?;
            let shared = top_a.iter().filter(|o| top_b.contains(o)).count();

            let contribution = match self.range_kind(p)? {
                RangeKind::EndNode => shared as f64 / f as f64 * relative,
                RangeKind::Structured => {
                    let left_a: Vec<Term> =
                        top_a.iter().filter(|o| !top_b.contains(o)).cloned().collect();
                    let left_b: Vec<Term> =
                        top_b.iter().filter(|o| !top_a.contains(o)).cloned().collect();
                    let matched = self.best_pairing(&left_a, &left_b, relative, depth + 1)?;
                    (shared as f64 + matched / relative) / f as f64 * relative
                }
            };
            total += contribution;
        }

        self.memo.insert(key, total / weight);
        Ok(total)
    }

    fn properties_for(&self, a: &Entity, b: &Entity) -> DcrResult<Vec<Entity>> {
        match self.config.properties {
            PropertyPolicy::AllConfigured => Ok(self.config.functionality.keys().cloned().collect()),
            PropertyPolicy::Present => {
                let present: BTreeSet<Entity> = self
                    .store
                    .triples_with_subject(a)
                    .into_iter()
                    .chain(self.store.triples_with_subject(b))
                    .map(|t| t.predicate)
                    .collect();
                for p in &present {
                    self.config.degree(p)?;
                }
                Ok(present.into_iter().collect())
            }
        }
    }

    /// Best summed recursive score over one-to-one pairings of the leftovers.
    fn best_pairing(
        &mut self,
        left_a: &[Term],
        left_b: &[Term],
        weight: f64,
        depth: usize,
    ) -> DcrResult<f64> {
        if left_a.is_empty() || left_b.is_empty() || depth > self.config.max_depth {
            return Ok(0.0);
        }
        // Rows are the lexically smaller side, so (a, b) and (b, a) search the
        // same matrix and sum in the same order.
        let (left_rows, left_cols) = if left_a <= left_b {
            (left_a, left_b)
        } else {
            (left_b, left_a)
        };
        let mut scores = Vec::with_capacity(left_rows.len());
        for x in left_rows {
            let mut row = Vec::with_capacity(left_cols.len());
            for y in left_cols {
                let s = match (x.as_entity(), y.as_entity()) {
                    (Some(x), Some(y)) => self.score(x, y, weight, depth)?,
                    _ => 0.0,
                };
                row.push(s);
            }
            scores.push(row);
        }
        let assignment = best_assignment(&scores, self.config.max_pairings);
        if !assignment.exhaustive {
            tracing::debug!(
                rows = left_rows.len(),
                cols = left_cols.len(),
                cap = self.config.max_pairings,
                "pairing search over cap, using greedy assignment"
            );
        }
        Ok(assignment.total)
    }

    fn pool(&mut self, predicate: &Entity) -> &[Term] {
        let store = self.store;
        self.pools
            .entry(predicate.clone())
            .or_insert_with(|| store.objects_of_predicate(predicate))
    }

    /// The `f` objects the oracle ranks highest for `(entity, predicate, ?)`.
    fn top_objects(&mut self, entity: &Entity, predicate: &Entity, f: usize) -> DcrResult<Vec<Term>> {
        let key = (entity.clone(), predicate.clone());
        if let Some(top) = self.top_objects.get(&key) {
            return Ok(top.clone());
        }

        let candidates: Vec<Triple> = self
            .pool(predicate)
            .iter()
            .map(|o| Triple::new(entity.clone(), predicate.clone(), o.clone()))
            .collect();
        let scores = if candidates.is_empty() {
            Vec::new()
        } else {
            self.oracle.score(&candidates)?
        };
        if scores.len() != candidates.len() {
            return Err(OracleError::ScoreCount {
                expected: candidates.len(),
                actual: scores.len(),
            }
            .into());
        }

        let mut ranked: Vec<(Term, f64)> = candidates
            .into_iter()
            .map(|t| t.object)
            .zip(scores)
            .collect();
        // Stable sort: ties keep the pool order.
        ranked.sort_by(|x, y| y.1.total_cmp(&x.1));
        let top: Vec<Term> = ranked.into_iter().take(f).map(|(o, _)| o).collect();

        self.top_objects.insert(key, top.clone());
        Ok(top)
    }

    fn range_kind(&mut self, predicate: &Entity) -> DcrResult<RangeKind> {
        if let Some(&kind) = self.ranges.get(predicate) {
            return Ok(kind);
        }
        let sample = self.pool(predicate).first().cloned();
        let kind = match sample {
            None | Some(Term::Literal(_)) => RangeKind::EndNode,
            Some(Term::Entity(node)) => {
                let typed_end = self
                    .store
                    .triples_with_subject_predicate(&node, &self.config.type_predicate)
                    .iter()
                    .filter_map(|t| t.object.as_entity())
                    .any(|ty| self.config.end_node_types.contains(ty));
                if typed_end || !self.store.has_outgoing(&node) {
                    RangeKind::EndNode
                } else {
                    RangeKind::Structured
                }
            }
        };
        self.ranges.insert(predicate.clone(), kind);
        Ok(kind)
    }
}
