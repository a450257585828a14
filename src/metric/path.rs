//! Value paths: chains of predicate steps from an instance to a value.
//!
//! Every step must match exactly one triple. Anything else leaves the path
//! [`Unresolved`], which the metric treats as "skip this pair", not as an
//! error.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::graph::{Entity, Term, TripleStore};

/// One hop along a value path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Subject to object along the predicate.
    Forward(Entity),
    /// Object back to subject along the predicate.
    Inverse(Entity),
}

impl Step {
    pub fn forward(predicate: impl Into<Entity>) -> Self {
        Step::Forward(predicate.into())
    }

    pub fn inverse(predicate: impl Into<Entity>) -> Self {
        Step::Inverse(predicate.into())
    }

    /// Every term one hop away from `from`.
    pub fn follow(&self, store: &TripleStore, from: &Term) -> Vec<Term> {
        match self {
            Step::Forward(p) => match from.as_entity() {
                Some(subject) => store
                    .triples_with_subject_predicate(subject, p)
                    .into_iter()
                    .map(|t| t.object)
                    .collect(),
                None => Vec::new(),
            },
            Step::Inverse(p) => store
                .triples_with_predicate_object(p, from)
                .into_iter()
                .map(|t| Term::Entity(t.subject))
                .collect(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Forward(p) => write!(f, "{p}"),
            Step::Inverse(p) => write!(f, "^{p}"),
        }
    }
}

/// `p` is a forward step, `^p` an inverse one (SPARQL property-path style).
impl FromStr for Step {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.strip_prefix('^') {
            Some(p) => Step::inverse(p),
            None => Step::forward(s),
        })
    }
}

/// Parse a whitespace-separated path such as `"^hasStudent ranking"`.
pub fn parse_path(s: &str) -> Vec<Step> {
    s.split_whitespace()
        .filter_map(|part| part.parse().ok())
        .collect()
}

/// Why a path did not lead to a single value.
#[derive(Debug, Clone, PartialEq)]
pub enum Unresolved {
    /// No triple matched step `step`.
    Missing { step: usize },
    /// More than one triple matched step `step`.
    Ambiguous { step: usize, matches: usize },
    /// The value reached is not a number.
    NotNumeric { value: String },
}

/// Walk `path` from `start`, requiring exactly one match per step.
pub fn resolve(store: &TripleStore, start: &Entity, path: &[Step]) -> Result<Term, Unresolved> {
    let mut current = Term::Entity(start.clone());
    for (step, hop) in path.iter().enumerate() {
        let mut next = hop.follow(store, &current);
        current = match next.len() {
            0 => return Err(Unresolved::Missing { step }),
            1 => next.swap_remove(0),
            matches => return Err(Unresolved::Ambiguous { step, matches }),
        };
    }
    Ok(current)
}

/// Like [`resolve`], parsing the final term as a number.
pub fn resolve_number(store: &TripleStore, start: &Entity, path: &[Step]) -> Result<f64, Unresolved> {
    let term = resolve(store, start, path)?;
    term.as_number().ok_or_else(|| Unresolved::NotNumeric {
        value: term.lexical().to_owned(),
    })
}
