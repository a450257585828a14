//! Discovery facade: one run's store, oracle and configuration.
//!
//! `Discovery` ties the pieces together the way a rule-mining run uses them:
//! calibrate a distance threshold, mine matched pairs, then measure the effect
//! of a treatment on an outcome over those pairs.

use std::collections::HashSet;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::calibrate::{Calibration, ThresholdCalibrator};
use crate::config::DiscoveryConfig;
use crate::error::{ConfigError, DcrResult};
use crate::graph::load::load_triples;
use crate::graph::{Entity, TripleStore};
use crate::metric::{self, EffectEstimate, Outcome, Treatment};
use crate::oracle::{EmbeddingOracle, TranslationalOracle};
use crate::pairs::{
    DistanceMatrix, MatchedPair, PairingMode, pairs_by_proportion, pairs_by_threshold,
};
use crate::similarity::StructuralSimilarity;

/// Pairs mined in one run, with how the bound was chosen.
#[derive(Debug, Clone, Serialize)]
pub struct PairingRun {
    pub mode: PairingMode,
    pub pairs: Vec<MatchedPair>,
    /// Distance bound used, if extraction was threshold-bounded.
    pub threshold: Option<f64>,
    /// Present when the threshold was calibrated during the run.
    pub calibration: Option<Calibration>,
}

/// The discovery pipeline over one knowledge graph and embedding model.
pub struct Discovery {
    config: DiscoveryConfig,
    store: TripleStore,
    oracle: Box<dyn EmbeddingOracle>,
}

impl Discovery {
    pub fn new(
        config: DiscoveryConfig,
        store: TripleStore,
        oracle: Box<dyn EmbeddingOracle>,
    ) -> DcrResult<Self> {
        config.validate()?;
        tracing::info!(
            triples = store.len(),
            nodes = store.node_count(),
            properties = config.similarity.functionality.len(),
            mode = %config.pairing.mode,
            "initializing discovery run"
        );
        Ok(Self {
            config,
            store,
            oracle,
        })
    }

    /// Load triples and a translational embedding model from JSON files.
    pub fn open(config: DiscoveryConfig, triples: &Path, embeddings: &Path) -> DcrResult<Self> {
        let store = TripleStore::from_triples(load_triples(triples)?);
        let oracle = TranslationalOracle::load(embeddings)?;
        Self::new(config, store, Box::new(oracle))
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn store(&self) -> &TripleStore {
        &self.store
    }

    pub fn oracle(&self) -> &dyn EmbeddingOracle {
        self.oracle.as_ref()
    }

    fn scorer(&self) -> StructuralSimilarity<'_> {
        StructuralSimilarity::new(&self.store, self.oracle.as_ref(), &self.config.similarity)
    }

    fn rng(&self) -> StdRng {
        match self.config.calibration.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Structural similarity of two entities.
    pub fn similarity(&self, a: &Entity, b: &Entity) -> DcrResult<f64> {
        self.config.similarity.validate()?;
        self.scorer().similarity(a, b)
    }

    /// Calibrate the distance threshold on pairs drawn from `instances`.
    pub fn calibrate(&self, instances: &[Entity]) -> DcrResult<Calibration> {
        self.config.similarity.validate()?;
        let scorer = self.scorer();
        let calibrator =
            ThresholdCalibrator::new(self.oracle.as_ref(), &scorer, &self.config.calibration);
        calibrator.calibrate(instances, &mut self.rng())
    }

    /// Distance matrix in the configured mode.
    ///
    /// Free mode pairs any two instances of `t0 ∪ t1`; cross-group mode pairs
    /// `t0` rows against `t1` columns.
    pub fn distance_matrix(&self, t0: &[Entity], t1: &[Entity]) -> DcrResult<DistanceMatrix> {
        match self.config.pairing.mode {
            PairingMode::Free => DistanceMatrix::build_free(self.oracle.as_ref(), &union(t0, t1)),
            PairingMode::CrossGroup => {
                DistanceMatrix::build_cross_group(self.oracle.as_ref(), t0, t1)
            }
        }
    }

    /// Mine matched pairs between the treatment groups.
    ///
    /// Uses the configured threshold, else the configured proportion, else a
    /// threshold calibrated on the instances themselves.
    pub fn pairs(&self, t0: &[Entity], t1: &[Entity]) -> DcrResult<PairingRun> {
        let matrix = self.distance_matrix(t0, t1)?;
        let pairing = &self.config.pairing;
        let total_instances = union(t0, t1).len();

        let run = if let Some(threshold) = pairing.threshold {
            PairingRun {
                mode: pairing.mode,
                pairs: pairs_by_threshold(&matrix, threshold)?,
                threshold: Some(threshold),
                calibration: None,
            }
        } else if let Some(proportion) = pairing.proportion {
            PairingRun {
                mode: pairing.mode,
                pairs: pairs_by_proportion(&matrix, total_instances, proportion)?,
                threshold: None,
                calibration: None,
            }
        } else {
            let calibration = self.calibrate(&union(t0, t1))?;
            PairingRun {
                mode: pairing.mode,
                pairs: pairs_by_threshold(&matrix, calibration.threshold)?,
                threshold: Some(calibration.threshold),
                calibration: Some(calibration),
            }
        };

        tracing::info!(
            mode = %run.mode,
            pairs = run.pairs.len(),
            instances = total_instances,
            "mined matched pairs"
        );
        Ok(run)
    }

    /// Effect of `treatment` on `outcome` over `pairs`, with the configured z.
    pub fn effect(
        &self,
        pairs: &[MatchedPair],
        treatment: &Treatment,
        outcome: &Outcome,
    ) -> DcrResult<EffectEstimate> {
        metric::effect(&self.store, pairs, treatment, outcome, self.config.metric.z)
    }

    /// Effect using the treatment and outcome from the `[metric]` table.
    pub fn configured_effect(&self, pairs: &[MatchedPair]) -> DcrResult<EffectEstimate> {
        let metric = &self.config.metric;
        let treatment = metric.treatment.as_ref().ok_or(ConfigError::Invalid {
            field: "metric.treatment",
            message: "no treatment rule configured".into(),
        })?;
        let outcome = metric.outcome.as_ref().ok_or(ConfigError::Invalid {
            field: "metric.outcome",
            message: "no outcome rule configured".into(),
        })?;
        self.effect(pairs, treatment, outcome)
    }

    pub fn info(&self) -> DiscoveryInfo {
        DiscoveryInfo {
            triples: self.store.len(),
            nodes: self.store.node_count(),
            predicates: self.store.predicates().len(),
            configured_properties: self.config.similarity.functionality.len(),
            mode: self.config.pairing.mode,
        }
    }
}

impl std::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish()
    }
}

/// Instances of both groups, first occurrence order, no duplicates.
fn union(t0: &[Entity], t1: &[Entity]) -> Vec<Entity> {
    let mut seen = HashSet::new();
    t0.iter()
        .chain(t1)
        .filter(|e| seen.insert(*e))
        .cloned()
        .collect()
}

/// Summary of a discovery run's inputs.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryInfo {
    pub triples: usize,
    pub nodes: usize,
    pub predicates: usize,
    pub configured_properties: usize,
    pub mode: PairingMode,
}

impl std::fmt::Display for DiscoveryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "discovery run info")?;
        writeln!(f, "  triples:      {}", self.triples)?;
        writeln!(f, "  nodes:        {}", self.nodes)?;
        writeln!(f, "  predicates:   {}", self.predicates)?;
        writeln!(f, "  properties:   {}", self.configured_properties)?;
        writeln!(f, "  pairing mode: {}", self.mode)?;
        Ok(())
    }
}
