//! Knowledge graph data model and the read-only triple store.
//!
//! The graph is a snapshot: triples are loaded once, indexed, and then only
//! queried. Subjects and predicates are [`Entity`] identifiers; objects are
//! [`Term`]s, which can also be literals.

pub mod index;
pub mod load;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use index::TripleStore;

/// An opaque node identifier (usually a URI). Identity is string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(String);

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Entity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Entity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The object position of a triple: either another node or a literal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Entity(Entity),
    Literal(String),
}

impl Term {
    pub fn entity(id: impl Into<String>) -> Self {
        Term::Entity(Entity::new(id))
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal(value.into())
    }

    /// The node this term names, if it is not a literal.
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Term::Entity(e) => Some(e),
            Term::Literal(_) => None,
        }
    }

    /// Lexical form, used as the embedding key and for numeric parsing.
    pub fn lexical(&self) -> &str {
        match self {
            Term::Entity(e) => e.as_str(),
            Term::Literal(v) => v,
        }
    }

    /// Parse the lexical form as a number.
    pub fn as_number(&self) -> Option<f64> {
        self.lexical().trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Entity(e) => write!(f, "{e}"),
            Term::Literal(v) => write!(f, "\"{v}\""),
        }
    }
}

impl From<Entity> for Term {
    fn from(e: Entity) -> Self {
        Term::Entity(e)
    }
}

/// A (subject, predicate, object) fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Entity,
    pub predicate: Entity,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: impl Into<Entity>, predicate: impl Into<Entity>, object: Term) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.predicate, self.object)
    }
}
