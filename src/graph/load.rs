//! Loading triples from JSON documents.
//!
//! Format: `[{"s": "ex:u", "p": "ex:diet", "o": "5", "literal": true}, ...]`.
//! `literal` defaults to `false`, in which case the object is a node.

use std::path::Path;

use serde::Deserialize;

use crate::error::{DcrResult, GraphError};

use super::{Entity, Term, Triple};

#[derive(Debug, Deserialize)]
struct RawTriple {
    s: String,
    p: String,
    o: String,
    #[serde(default)]
    literal: bool,
}

/// Parse a JSON triples document.
pub fn parse_triples(content: &str) -> DcrResult<Vec<Triple>> {
    let raw: Vec<RawTriple> = serde_json::from_str(content).map_err(|e| GraphError::Parse {
        message: e.to_string(),
    })?;

    raw.into_iter()
        .enumerate()
        .map(|(index, t)| {
            if t.s.trim().is_empty() {
                return Err(GraphError::EmptyTerm {
                    position: "subject",
                    index,
                }
                .into());
            }
            if t.p.trim().is_empty() {
                return Err(GraphError::EmptyTerm {
                    position: "predicate",
                    index,
                }
                .into());
            }
            let object = if t.literal {
                Term::Literal(t.o)
            } else {
                Term::Entity(Entity::new(t.o))
            };
            Ok(Triple::new(t.s, t.p, object))
        })
        .collect()
}

/// Read and parse a JSON triples file.
pub fn load_triples(path: &Path) -> DcrResult<Vec<Triple>> {
    let content = std::fs::read_to_string(path).map_err(|source| GraphError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let triples = parse_triples(&content)?;
    tracing::info!(path = %path.display(), count = triples.len(), "loaded triples");
    Ok(triples)
}
