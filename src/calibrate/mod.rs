//! Distance-threshold calibration.
//!
//! Relates embedding distance to structural similarity on a random sample of
//! pairs, fits a polynomial to that relation, and inverts it: the returned
//! threshold is the distance at which the fitted similarity drops to the
//! target level. Pairs closer than the threshold are then treated as similar
//! by the pair extractor.
//!
//! Inversion only makes sense for a curve that never increases with distance;
//! a fit that does is rejected rather than inverted.

pub mod polynomial;

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, ConfigError, DcrResult};
use crate::graph::Entity;
use crate::oracle::{EmbeddingOracle, pair_distance};
use crate::similarity::StructuralSimilarity;

pub use polynomial::{FittedCurve, Polynomial, fit};

/// Calibration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Number of random pairs measured.
    pub sample_size: usize,
    /// Equal-width distance intervals used to even out the sample.
    pub intervals: usize,
    /// Maximum points kept per interval.
    pub per_interval: usize,
    /// Degree of the fitted polynomial.
    pub degree: usize,
    /// Similarity level the threshold corresponds to.
    pub target_similarity: f64,
    /// Seed for reproducible sampling; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sample_size: 200,
            intervals: 20,
            per_interval: 20,
            degree: 1,
            target_similarity: 0.8,
            seed: None,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> DcrResult<()> {
        if self.sample_size == 0 {
            return Err(invalid("calibration.sample_size", "must be at least 1"));
        }
        if self.intervals == 0 {
            return Err(invalid("calibration.intervals", "must be at least 1"));
        }
        if self.per_interval == 0 {
            return Err(invalid("calibration.per_interval", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.target_similarity) {
            return Err(invalid(
                "calibration.target_similarity",
                "must lie in [0, 1]",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, message: &str) -> crate::error::DcrError {
    ConfigError::Invalid {
        field,
        message: message.to_owned(),
    }
    .into()
}

/// One sampled pair with its embedding distance and structural similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredPair {
    pub first: Entity,
    pub second: Entity,
    pub distance: f64,
    pub similarity: f64,
}

impl MeasuredPair {
    pub fn point(&self) -> (f64, f64) {
        (self.distance, self.similarity)
    }
}

/// Result of a calibration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    /// Distance below which pairs count as similar.
    pub threshold: f64,
    /// R² of the fitted curve.
    pub model_fit: f64,
    /// Fitted coefficients, lowest degree first.
    pub coefficients: Vec<f64>,
    /// Pairs measured.
    pub sampled: usize,
    /// Points kept after stratification and used for the fit.
    pub retained: usize,
    /// Observed distance range `(min, max)` of the retained points.
    pub domain: (f64, f64),
}

/// Draw up to `n_sample` distinct unordered pairs of `instances` uniformly at
/// random, without replacement. When fewer pairs exist, all are returned.
pub fn draw_pairs<R: Rng + ?Sized>(
    instances: &[Entity],
    n_sample: usize,
    rng: &mut R,
) -> DcrResult<Vec<(Entity, Entity)>> {
    let n = instances.len();
    if n < 2 {
        return Err(CalibrationError::TooFewInstances { actual: n }.into());
    }
    let total = n * (n - 1) / 2;
    let amount = n_sample.min(total);

    let ranks = rand::seq::index::sample(rng, total, amount);
    Ok(ranks
        .into_iter()
        .map(|k| {
            let (i, j) = unrank_pair(k, n);
            (instances[i].clone(), instances[j].clone())
        })
        .collect())
}

/// The `k`-th pair `(i, j)`, `i < j`, in row-major combination order.
fn unrank_pair(mut k: usize, n: usize) -> (usize, usize) {
    for i in 0..n {
        let row = n - 1 - i;
        if k < row {
            return (i, i + 1 + k);
        }
        k -= row;
    }
    unreachable!("rank exceeds the number of pairs")
}

/// Keep at most `cap` points per equal-width distance interval.
///
/// The last interval is closed on the right so the maximum distance is kept;
/// a zero-width range puts every point in the first interval.
pub fn stratify<R: Rng + ?Sized>(
    points: &[(f64, f64)],
    intervals: usize,
    cap: usize,
    rng: &mut R,
) -> Vec<(f64, f64)> {
    if points.is_empty() {
        return Vec::new();
    }
    let intervals = intervals.max(1);
    let min = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let step = (max - min) / intervals as f64;

    let mut buckets: Vec<Vec<(f64, f64)>> = vec![Vec::new(); intervals];
    for &p in points {
        let idx = if step > 0.0 {
            (((p.0 - min) / step).floor() as usize).min(intervals - 1)
        } else {
            0
        };
        buckets[idx].push(p);
    }

    let mut kept = Vec::new();
    for bucket in buckets {
        if bucket.len() <= cap {
            kept.extend(bucket);
        } else {
            kept.extend(bucket.choose_multiple(rng, cap).copied());
        }
    }
    kept
}

/// Distance at which `curve` reaches `target` similarity.
///
/// Fails when the curve increases anywhere on `domain` (the observed distance
/// range) or never reaches `target`. Otherwise returns the smallest real root
/// of `curve(x) - target`, provided the curve is also non-increasing between
/// that root and the domain.
pub fn distance_threshold(curve: &Polynomial, target: f64, domain: (f64, f64)) -> DcrResult<f64> {
    check_non_increasing(curve, domain)?;
    let root = curve
        .shifted(target)
        .real_roots()
        .first()
        .copied()
        .ok_or(CalibrationError::NoThreshold { target })?;

    let (lo, hi) = domain;
    if check_non_increasing(curve, (root.min(lo), root.max(hi))).is_err() {
        return Err(CalibrationError::NonMonotonicCurve { at: root }.into());
    }
    Ok(root)
}

fn check_non_increasing(curve: &Polynomial, (lo, hi): (f64, f64)) -> DcrResult<()> {
    let slope = curve.derivative();
    let tolerance = 1e-12 * curve.coefficients().iter().map(|c| c.abs()).fold(1.0, f64::max);

    // The derivative keeps its sign between its own roots, so probing the
    // endpoints and one point per sub-interval covers the whole domain.
    let mut knots = vec![lo];
    knots.extend(slope.real_roots().into_iter().filter(|&x| x > lo && x < hi));
    knots.push(hi);

    let mut probes: Vec<f64> = knots.clone();
    probes.extend(knots.windows(2).map(|w| 0.5 * (w[0] + w[1])));

    match probes.into_iter().find(|&x| slope.eval(x) > tolerance) {
        Some(at) => Err(CalibrationError::NonMonotonicCurve { at }.into()),
        None => Ok(()),
    }
}

/// Mean distance per group key, e.g. per number of property differences.
pub fn mean_distance_by_degree<K: Ord>(
    records: impl IntoIterator<Item = (K, f64)>,
) -> BTreeMap<K, f64> {
    let mut sums: BTreeMap<K, (f64, usize)> = BTreeMap::new();
    for (key, distance) in records {
        let entry = sums.entry(key).or_insert((0.0, 0));
        entry.0 += distance;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(k, (sum, count))| (k, sum / count as f64))
        .collect()
}

/// Measures sampled pairs and turns them into a distance threshold.
pub struct ThresholdCalibrator<'a> {
    oracle: &'a dyn EmbeddingOracle,
    similarity: &'a StructuralSimilarity<'a>,
    config: &'a CalibrationConfig,
}

impl<'a> ThresholdCalibrator<'a> {
    pub fn new(
        oracle: &'a dyn EmbeddingOracle,
        similarity: &'a StructuralSimilarity<'a>,
        config: &'a CalibrationConfig,
    ) -> Self {
        Self {
            oracle,
            similarity,
            config,
        }
    }

    /// Distance and structural similarity of each pair.
    pub fn measure(&self, pairs: &[(Entity, Entity)]) -> DcrResult<Vec<MeasuredPair>> {
        pairs
            .iter()
            .map(|(a, b)| {
                Ok(MeasuredPair {
                    first: a.clone(),
                    second: b.clone(),
                    distance: pair_distance(self.oracle, a, b)?,
                    similarity: self.similarity.similarity(a, b)?,
                })
            })
            .collect()
    }

    /// Sample, measure, stratify, fit, invert.
    pub fn calibrate<R: Rng + ?Sized>(
        &self,
        instances: &[Entity],
        rng: &mut R,
    ) -> DcrResult<Calibration> {
        self.config.validate()?;

        let pairs = draw_pairs(instances, self.config.sample_size, rng)?;
        let measured = self.measure(&pairs)?;
        let points: Vec<(f64, f64)> = measured.iter().map(MeasuredPair::point).collect();
        let retained = stratify(
            &points,
            self.config.intervals,
            self.config.per_interval,
            rng,
        );

        let curve = fit(&retained, self.config.degree)?;
        let domain = retained.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.0), hi.max(p.0))
        });
        let threshold =
            distance_threshold(&curve.polynomial, self.config.target_similarity, domain)?;

        tracing::info!(
            sampled = measured.len(),
            retained = retained.len(),
            degree = self.config.degree,
            model_fit = curve.model_fit,
            threshold,
            "calibrated distance threshold"
        );

        Ok(Calibration {
            threshold,
            model_fit: curve.model_fit,
            coefficients: curve.polynomial.coefficients().to_vec(),
            sampled: measured.len(),
            retained: retained.len(),
            domain,
        })
    }
}
