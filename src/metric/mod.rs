//! Causal effect metric over matched pairs.
//!
//! Each pair is oriented by its treatment: the "low" side is the t0 instance,
//! the non-member of the treatment group, or the instance with the smaller
//! treatment value. Its outcome is then compared with the other side's:
//!
//! | expectation | low outcome > high | low outcome < high | equal |
//! |---|---|---|---|
//! | `Decrease` | T_O | T_not_O | same_0 |
//! | `Increase` | T_not_O | T_O | same_0 |
//!
//! The effect ratio is `T_O / T_not_O` with a log-normal confidence interval.
//! When either count is zero the estimate is the sentinel `(0, [0, 0])`.
//!
//! Pairs whose values cannot be looked up are skipped silently; pairs whose
//! treatment values contradict the rule are skipped with a warning. Both are
//! counted in [`SkipCounts`].

pub mod path;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DcrResult, MetricError};
use crate::graph::{Entity, Term, TripleStore};
use crate::pairs::MatchedPair;

use self::path::{Step, Unresolved, resolve, resolve_number};

/// Direction in which the treatment is expected to move the outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// The low side has the higher outcome.
    #[default]
    Decrease,
    /// The low side has the lower outcome.
    Increase,
}

/// How the treatment of an instance is determined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Treatment {
    /// The value at `path` must be `t0` on one side and `t1` on the other.
    Categorical {
        path: Vec<Step>,
        t0: String,
        t1: String,
        #[serde(default)]
        expect: Expectation,
    },
    /// Exactly one side must belong to `members`.
    Group {
        members: BTreeSet<Entity>,
        #[serde(default)]
        expect: Expectation,
    },
    /// Numeric value at `path`; equal values are skipped.
    Numerical {
        path: Vec<Step>,
        #[serde(default)]
        expect: Expectation,
    },
}

impl Treatment {
    pub fn expectation(&self) -> Expectation {
        match self {
            Treatment::Categorical { expect, .. }
            | Treatment::Group { expect, .. }
            | Treatment::Numerical { expect, .. } => *expect,
        }
    }

    pub fn validate(&self) -> DcrResult<()> {
        match self {
            Treatment::Categorical { path, t0, t1, .. } => {
                non_empty(path, "treatment")?;
                if t0 == t1 {
                    return Err(MetricError::SameCategories { value: t0.clone() }.into());
                }
                Ok(())
            }
            Treatment::Group { .. } => Ok(()),
            Treatment::Numerical { path, .. } => non_empty(path, "treatment"),
        }
    }
}

/// How the outcome value of an instance is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// The number at `path`.
    Value { path: Vec<Step> },
    /// `observed - reference`, e.g. actual minus ideal value.
    Difference {
        observed: Vec<Step>,
        reference: Vec<Step>,
    },
    /// Smallest value at `then` over every node reached by `via`, minus the
    /// value at `baseline`.
    MinOverChain {
        via: Step,
        #[serde(default)]
        then: Vec<Step>,
        baseline: Vec<Step>,
    },
}

impl Outcome {
    pub fn validate(&self) -> DcrResult<()> {
        match self {
            Outcome::Value { path } => non_empty(path, "outcome"),
            Outcome::Difference {
                observed,
                reference,
            } => {
                non_empty(observed, "observed outcome")?;
                non_empty(reference, "reference outcome")
            }
            Outcome::MinOverChain { baseline, .. } => non_empty(baseline, "baseline"),
        }
    }

    fn value(&self, store: &TripleStore, entity: &Entity) -> Result<f64, Unresolved> {
        match self {
            Outcome::Value { path } => resolve_number(store, entity, path),
            Outcome::Difference {
                observed,
                reference,
            } => Ok(resolve_number(store, entity, observed)?
                - resolve_number(store, entity, reference)?),
            Outcome::MinOverChain {
                via,
                then,
                baseline,
            } => {
                let reached = via.follow(store, &Term::Entity(entity.clone()));
                let mut min: Option<f64> = None;
                for term in reached {
                    let Some(node) = term.as_entity() else {
                        continue;
                    };
                    let v = resolve_number(store, node, then)?;
                    min = Some(min.map_or(v, |m| m.min(v)));
                }
                let min = min.ok_or(Unresolved::Missing { step: 0 })?;
                Ok(min - resolve_number(store, entity, baseline)?)
            }
        }
    }
}

fn non_empty(path: &[Step], role: &'static str) -> DcrResult<()> {
    if path.is_empty() {
        Err(MetricError::EmptyPath { role }.into())
    } else {
        Ok(())
    }
}

/// Metric parameters from the run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// Normal quantile of the confidence interval.
    pub z: f64,
    pub treatment: Option<Treatment>,
    pub outcome: Option<Outcome>,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            z: 1.96,
            treatment: None,
            outcome: None,
        }
    }
}

impl MetricConfig {
    pub fn validate(&self) -> DcrResult<()> {
        check_z(self.z)?;
        if let Some(t) = &self.treatment {
            t.validate()?;
        }
        if let Some(o) = &self.outcome {
            o.validate()?;
        }
        Ok(())
    }
}

fn check_z(z: f64) -> DcrResult<()> {
    if z.is_finite() && z > 0.0 {
        Ok(())
    } else {
        Err(MetricError::InvalidZ { z }.into())
    }
}

/// Pairs left out of the counts, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    /// Treatment values contradict the rule.
    pub inconsistent: usize,
    /// A treatment or outcome lookup did not yield exactly one value.
    pub unresolved: usize,
    /// Numerical treatments were equal.
    pub treatment_ties: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.inconsistent + self.unresolved + self.treatment_ties
    }
}

/// Outcome agreement counts over a set of pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalCounts {
    pub t_o: usize,
    pub t_not_o: usize,
    pub same_0: usize,
    pub skipped: SkipCounts,
}

/// Effect ratio with its confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectEstimate {
    pub ratio: f64,
    pub interval: [f64; 2],
    pub t_o: usize,
    pub t_not_o: usize,
    pub same_0: usize,
    pub skipped: SkipCounts,
}

impl EffectEstimate {
    /// Ratio and log-space interval from counts; the sentinel when either
    /// side is empty.
    pub fn from_counts(counts: CausalCounts, z: f64) -> Self {
        let (ratio, interval) = if counts.t_o > 0 && counts.t_not_o > 0 {
            let (a, b) = (counts.t_o as f64, counts.t_not_o as f64);
            let ratio = a / b;
            let half = z * (1.0 / a + 1.0 / b).sqrt();
            let log = ratio.ln();
            (
                round3(ratio),
                [round3((log - half).exp()), round3((log + half).exp())],
            )
        } else {
            (0.0, [0.0, 0.0])
        };
        Self {
            ratio,
            interval,
            t_o: counts.t_o,
            t_not_o: counts.t_not_o,
            same_0: counts.same_0,
            skipped: counts.skipped,
        }
    }

    /// Whether the ratio is an actual estimate rather than the sentinel.
    pub fn is_defined(&self) -> bool {
        self.t_o > 0 && self.t_not_o > 0
    }
}

impl fmt::Display for EffectEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ratio {} [{}, {}] (T_O {}, T_not_O {}, same {}, skipped {})",
            self.ratio,
            self.interval[0],
            self.interval[1],
            self.t_o,
            self.t_not_o,
            self.same_0,
            self.skipped.total()
        )
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

enum Orientation {
    /// First member is the low side.
    FirstLow,
    SecondLow,
}

enum Skip {
    Inconsistent,
    Unresolved,
    Tie,
}

impl From<Unresolved> for Skip {
    fn from(_: Unresolved) -> Self {
        Skip::Unresolved
    }
}

fn orient(store: &TripleStore, treatment: &Treatment, pair: &MatchedPair) -> Result<Orientation, Skip> {
    let (a, b) = (&pair.first, &pair.second);
    match treatment {
        Treatment::Categorical { path, t0, t1, .. } => {
            let ta = resolve(store, a, path)?;
            let tb = resolve(store, b, path)?;
            let (ta, tb) = (ta.lexical(), tb.lexical());
            if ta == t0 && tb == t1 {
                Ok(Orientation::FirstLow)
            } else if ta == t1 && tb == t0 {
                Ok(Orientation::SecondLow)
            } else {
                tracing::warn!(
                    first = %a,
                    second = %b,
                    first_value = ta,
                    second_value = tb,
                    "treatment values do not match the compared categories, skipping pair"
                );
                Err(Skip::Inconsistent)
            }
        }
        Treatment::Group { members, .. } => match (members.contains(a), members.contains(b)) {
            (false, true) => Ok(Orientation::FirstLow),
            (true, false) => Ok(Orientation::SecondLow),
            (first_is_member, _) => {
                tracing::warn!(
                    first = %a,
                    second = %b,
                    both_members = first_is_member,
                    "pair is not split by the treatment group, skipping pair"
                );
                Err(Skip::Inconsistent)
            }
        },
        Treatment::Numerical { path, .. } => {
            let ta = resolve_number(store, a, path)?;
            let tb = resolve_number(store, b, path)?;
            if ta < tb {
                Ok(Orientation::FirstLow)
            } else if ta > tb {
                Ok(Orientation::SecondLow)
            } else {
                Err(Skip::Tie)
            }
        }
    }
}

/// Classify every pair and count outcome agreements.
pub fn count_outcomes(
    store: &TripleStore,
    pairs: &[MatchedPair],
    treatment: &Treatment,
    outcome: &Outcome,
) -> DcrResult<CausalCounts> {
    treatment.validate()?;
    outcome.validate()?;

    let expect = treatment.expectation();
    let mut counts = CausalCounts::default();

    for pair in pairs {
        let classified = orient(store, treatment, pair).and_then(|orientation| {
            let oa = outcome.value(store, &pair.first)?;
            let ob = outcome.value(store, &pair.second)?;
            Ok(match orientation {
                Orientation::FirstLow => (oa, ob),
                Orientation::SecondLow => (ob, oa),
            })
        });

        match classified {
            Ok((low, high)) => {
                let agrees = match expect {
                    Expectation::Decrease => low > high,
                    Expectation::Increase => low < high,
                };
                if low == high {
                    counts.same_0 += 1;
                } else if agrees {
                    counts.t_o += 1;
                } else {
                    counts.t_not_o += 1;
                }
            }
            Err(Skip::Inconsistent) => counts.skipped.inconsistent += 1,
            Err(Skip::Unresolved) => counts.skipped.unresolved += 1,
            Err(Skip::Tie) => counts.skipped.treatment_ties += 1,
        }
    }

    tracing::debug!(
        pairs = pairs.len(),
        t_o = counts.t_o,
        t_not_o = counts.t_not_o,
        same_0 = counts.same_0,
        skipped = counts.skipped.total(),
        "counted outcome orderings"
    );
    Ok(counts)
}

/// Effect of `treatment` on `outcome` over the matched pairs.
pub fn effect(
    store: &TripleStore,
    pairs: &[MatchedPair],
    treatment: &Treatment,
    outcome: &Outcome,
    z: f64,
) -> DcrResult<EffectEstimate> {
    check_z(z)?;
    let counts = count_outcomes(store, pairs, treatment, outcome)?;
    let estimate = EffectEstimate::from_counts(counts, z);
    tracing::info!(
        ratio = estimate.ratio,
        low = estimate.interval[0],
        high = estimate.interval[1],
        t_o = estimate.t_o,
        t_not_o = estimate.t_not_o,
        "computed effect estimate"
    );
    Ok(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Triple;

    fn diet_triples(name: &str, drug: &str, diet: &str, ideal: &str) -> Vec<Triple> {
        vec![
            Triple::new(name, "treats", Term::entity(drug)),
            Triple::new(name, "diet", Term::literal(diet)),
            Triple::new(name, "idealdiet", Term::literal(ideal)),
        ]
    }

    fn diet_rule() -> (Treatment, Outcome) {
        (
            Treatment::Categorical {
                path: vec![Step::forward("treats")],
                t0: "d0".into(),
                t1: "d1".into(),
                expect: Expectation::Decrease,
            },
            Outcome::Difference {
                observed: vec![Step::forward("diet")],
                reference: vec![Step::forward("idealdiet")],
            },
        )
    }

    fn pair(a: &str, b: &str) -> MatchedPair {
        MatchedPair::new(a, b, 0.0)
    }

    #[test]
    fn empty_pairs_give_the_sentinel() {
        let store = TripleStore::from_triples(Vec::new());
        let (t, o) = diet_rule();
        let est = effect(&store, &[], &t, &o, 1.96).unwrap();
        assert_eq!(est.ratio, 0.0);
        assert_eq!(est.interval, [0.0, 0.0]);
        assert_eq!((est.t_o, est.t_not_o, est.same_0), (0, 0, 0));
        assert!(!est.is_defined());
    }

    #[test]
    fn diet_scenario_counts_one_agreement() {
        let mut triples = diet_triples("u", "d0", "5", "3");
        triples.extend(diet_triples("v", "d1", "2", "3"));
        let store = TripleStore::from_triples(triples);
        let (t, o) = diet_rule();

        let est = effect(&store, &[pair("u", "v")], &t, &o, 1.96).unwrap();
        assert_eq!((est.t_o, est.t_not_o, est.same_0), (1, 0, 0));
        assert_eq!(est.ratio, 0.0);
        assert_eq!(est.interval, [0.0, 0.0]);

        // Orientation does not depend on the order inside the pair.
        let est = effect(&store, &[pair("v", "u")], &t, &o, 1.96).unwrap();
        assert_eq!(est.t_o, 1);
    }

    #[test]
    fn interval_brackets_the_ratio() {
        let mut triples = Vec::new();
        let mut pairs = Vec::new();
        // Three agreeing pairs, one disagreeing, one tie.
        for (i, (low, high)) in [(5, 1), (4, 2), (3, 0), (1, 6), (2, 2)].into_iter().enumerate() {
            let (a, b) = (format!("a{i}"), format!("b{i}"));
            triples.extend(diet_triples(&a, "d0", &low.to_string(), "0"));
            triples.extend(diet_triples(&b, "d1", &high.to_string(), "0"));
            pairs.push(pair(&a, &b));
        }
        let store = TripleStore::from_triples(triples);
        let (t, o) = diet_rule();

        let est = effect(&store, &pairs, &t, &o, 1.96).unwrap();
        assert_eq!((est.t_o, est.t_not_o, est.same_0), (3, 1, 1));
        assert_eq!(est.ratio, 3.0);
        assert!(est.interval[0] <= est.ratio && est.ratio <= est.interval[1]);
        assert!(est.interval[0] > 0.0);

        // A wider multiplier widens the interval.
        let wide = effect(&store, &pairs, &t, &o, 2.58).unwrap();
        assert!(wide.interval[0] <= est.interval[0]);
        assert!(wide.interval[1] >= est.interval[1]);
    }

    #[test]
    fn increase_swaps_the_counts() {
        let mut triples = diet_triples("u", "d0", "5", "3");
        triples.extend(diet_triples("v", "d1", "2", "3"));
        let store = TripleStore::from_triples(triples);
        let (t, o) = diet_rule();
        let Treatment::Categorical { path, t0, t1, .. } = t else {
            unreachable!()
        };
        let t = Treatment::Categorical {
            path,
            t0,
            t1,
            expect: Expectation::Increase,
        };
        let counts = count_outcomes(&store, &[pair("u", "v")], &t, &o).unwrap();
        assert_eq!((counts.t_o, counts.t_not_o), (0, 1));
    }

    #[test]
    fn skipped_pairs_are_counted_by_reason() {
        let mut triples = diet_triples("u", "d0", "5", "3");
        triples.extend(diet_triples("v", "d1", "2", "3"));
        triples.extend(diet_triples("w", "d0", "1", "3"));
        // x has no diet value, y has two.
        triples.push(Triple::new("x", "treats", Term::entity("d1")));
        triples.push(Triple::new("x", "idealdiet", Term::literal("3")));
        triples.extend(diet_triples("y", "d1", "1", "3"));
        triples.push(Triple::new("y", "diet", Term::literal("4")));
        let store = TripleStore::from_triples(triples);
        let (t, o) = diet_rule();

        let pairs = [pair("u", "v"), pair("u", "w"), pair("u", "x"), pair("u", "y"), pair("u", "nobody")];
        let counts = count_outcomes(&store, &pairs, &t, &o).unwrap();
        assert_eq!(counts.t_o, 1);
        assert_eq!(counts.skipped.inconsistent, 1);
        assert_eq!(counts.skipped.unresolved, 3);
        assert_eq!(counts.skipped.total(), 4);
    }

    #[test]
    fn group_membership_orients_pairs() {
        let store = TripleStore::from_triples([
            Triple::new("m", "score", Term::literal("9")),
            Triple::new("n", "score", Term::literal("4")),
            Triple::new("k", "score", Term::literal("7")),
        ]);
        let t = Treatment::Group {
            members: [Entity::new("m"), Entity::new("k")].into_iter().collect(),
            expect: Expectation::Increase,
        };
        let o = Outcome::Value {
            path: vec![Step::forward("score")],
        };
        // n is the only non-member; members scoring higher agree.
        let counts = count_outcomes(&store, &[pair("n", "m"), pair("k", "n"), pair("m", "k")], &t, &o).unwrap();
        assert_eq!(counts.t_o, 2);
        assert_eq!(counts.skipped.inconsistent, 1);
    }

    #[test]
    fn numerical_treatment_skips_ties() {
        let store = TripleStore::from_triples([
            Triple::new("a", "dose", Term::literal("1")),
            Triple::new("b", "dose", Term::literal("3")),
            Triple::new("c", "dose", Term::literal("3")),
            Triple::new("a", "pain", Term::literal("8")),
            Triple::new("b", "pain", Term::literal("2")),
            Triple::new("c", "pain", Term::literal("9")),
        ]);
        let t = Treatment::Numerical {
            path: vec![Step::forward("dose")],
            expect: Expectation::Decrease,
        };
        let o = Outcome::Value {
            path: vec![Step::forward("pain")],
        };
        let counts = count_outcomes(&store, &[pair("b", "a"), pair("a", "c"), pair("b", "c")], &t, &o).unwrap();
        // b (dose 3) hurts less than a (dose 1); c (dose 3) hurts more than a.
        assert_eq!((counts.t_o, counts.t_not_o), (1, 1));
        assert_eq!(counts.skipped.treatment_ties, 1);
    }

    #[test]
    fn minimum_over_a_chain_minus_baseline() {
        let store = TripleStore::from_triples([
            Triple::new("s", "takes", Term::entity("c1")),
            Triple::new("s", "takes", Term::entity("c2")),
            Triple::new("c1", "grade", Term::literal("4")),
            Triple::new("c2", "grade", Term::literal("2")),
            Triple::new("s", "entry", Term::literal("1")),
        ]);
        let o = Outcome::MinOverChain {
            via: Step::forward("takes"),
            then: vec![Step::forward("grade")],
            baseline: vec![Step::forward("entry")],
        };
        assert_eq!(o.value(&store, &Entity::new("s")), Ok(1.0));
        assert!(o.value(&store, &Entity::new("c1")).is_err());
    }

    #[test]
    fn rejects_malformed_rules() {
        let store = TripleStore::from_triples(Vec::new());
        let (t, o) = diet_rule();
        assert!(effect(&store, &[], &t, &o, 0.0).is_err());
        let same = Treatment::Categorical {
            path: vec![Step::forward("treats")],
            t0: "d0".into(),
            t1: "d0".into(),
            expect: Expectation::Decrease,
        };
        assert!(effect(&store, &[], &same, &o, 1.96).is_err());
        let empty = Outcome::Value { path: Vec::new() };
        assert!(effect(&store, &[], &t, &empty, 1.96).is_err());
    }

    #[test]
    fn rule_deserializes_from_toml() {
        let cfg: MetricConfig = toml::from_str(
            r#"
            z = 2.58

            [treatment]
            kind = "categorical"
            path = [{ forward = "treats" }]
            t0 = "d0"
            t1 = "d1"

            [outcome]
            kind = "difference"
            observed = [{ forward = "diet" }]
            reference = [{ inverse = "idealFor" }]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.z, 2.58);
        assert!(matches!(
            cfg.treatment,
            Some(Treatment::Categorical {
                expect: Expectation::Decrease,
                ..
            })
        ));
        assert!(cfg.validate().is_ok());
    }
}
