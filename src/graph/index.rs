//! Indexed, read-only triple store.
//!
//! Uses `petgraph` for the graph structure (nodes are [`Term`]s, edges carry
//! the predicate) and hash indices for lookups by node and by predicate.
//! Parallel edges are allowed, so duplicate facts are kept and counted.

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use super::{Entity, Term, Triple};

/// Immutable knowledge-graph snapshot queried by the discovery pipeline.
///
/// All queries return owned, order-irrelevant sequences; an unknown subject,
/// predicate or object yields an empty result, never an error.
pub struct TripleStore {
    graph: DiGraph<Term, Entity>,
    /// Term → NodeIndex mapping for O(1) node lookups.
    node_index: HashMap<Term, NodeIndex>,
    /// Predicate → edges carrying it.
    predicate_index: HashMap<Entity, Vec<EdgeIndex>>,
}

impl TripleStore {
    /// Build a store from a sequence of triples.
    pub fn from_triples(triples: impl IntoIterator<Item = Triple>) -> Self {
        let mut store = Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
            predicate_index: HashMap::new(),
        };
        for triple in triples {
            store.insert(triple);
        }
        tracing::debug!(
            triples = store.len(),
            nodes = store.graph.node_count(),
            predicates = store.predicate_index.len(),
            "indexed triple store"
        );
        store
    }

    fn ensure_node(&mut self, term: Term) -> NodeIndex {
        if let Some(idx) = self.node_index.get(&term) {
            return *idx;
        }
        let idx = self.graph.add_node(term.clone());
        self.node_index.insert(term, idx);
        idx
    }

    fn insert(&mut self, triple: Triple) {
        let subj_idx = self.ensure_node(Term::Entity(triple.subject));
        let obj_idx = self.ensure_node(triple.object);
        let edge = self
            .graph
            .add_edge(subj_idx, obj_idx, triple.predicate.clone());
        self.predicate_index
            .entry(triple.predicate)
            .or_default()
            .push(edge);
    }

    fn triple_at(&self, edge: EdgeIndex) -> Option<Triple> {
        let (src, dst) = self.graph.edge_endpoints(edge)?;
        let subject = self.graph.node_weight(src)?.as_entity()?.clone();
        Some(Triple {
            subject,
            predicate: self.graph.edge_weight(edge)?.clone(),
            object: self.graph.node_weight(dst)?.clone(),
        })
    }

    fn subject_node(&self, subject: &Entity) -> Option<NodeIndex> {
        self.node_index
            .get(&Term::Entity(subject.clone()))
            .copied()
    }

    /// All triples whose subject is `subject`.
    pub fn triples_with_subject(&self, subject: &Entity) -> Vec<Triple> {
        let Some(idx) = self.subject_node(subject) else {
            return vec![];
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|e| self.triple_at(e.id()))
            .collect()
    }

    /// All triples carrying `predicate`.
    pub fn triples_with_predicate(&self, predicate: &Entity) -> Vec<Triple> {
        self.predicate_index
            .get(predicate)
            .map(|edges| edges.iter().filter_map(|&e| self.triple_at(e)).collect())
            .unwrap_or_default()
    }

    /// All triples with the given subject and predicate.
    pub fn triples_with_subject_predicate(
        &self,
        subject: &Entity,
        predicate: &Entity,
    ) -> Vec<Triple> {
        let Some(idx) = self.subject_node(subject) else {
            return vec![];
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| e.weight() == predicate)
            .filter_map(|e| self.triple_at(e.id()))
            .collect()
    }

    /// All triples with the given predicate and object.
    pub fn triples_with_predicate_object(&self, predicate: &Entity, object: &Term) -> Vec<Triple> {
        let Some(&idx) = self.node_index.get(object) else {
            return vec![];
        };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| e.weight() == predicate)
            .filter_map(|e| self.triple_at(e.id()))
            .collect()
    }

    /// Distinct objects ever observed for `predicate`, in sorted order.
    pub fn objects_of_predicate(&self, predicate: &Entity) -> Vec<Term> {
        let objects: BTreeSet<Term> = self
            .predicate_index
            .get(predicate)
            .into_iter()
            .flatten()
            .filter_map(|&e| {
                let (_, dst) = self.graph.edge_endpoints(e)?;
                self.graph.node_weight(dst).cloned()
            })
            .collect();
        objects.into_iter().collect()
    }

    /// Whether the entity is the subject of at least one triple.
    pub fn has_outgoing(&self, subject: &Entity) -> bool {
        self.subject_node(subject).is_some_and(|idx| {
            self.graph
                .edges_directed(idx, Direction::Outgoing)
                .next()
                .is_some()
        })
    }

    /// Number of triples, duplicates included.
    pub fn len(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.edge_count() == 0
    }

    /// Number of distinct nodes (subjects and objects).
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// All distinct predicates, sorted.
    pub fn predicates(&self) -> Vec<Entity> {
        let mut preds: Vec<Entity> = self.predicate_index.keys().cloned().collect();
        preds.sort();
        preds
    }
}

impl std::fmt::Debug for TripleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripleStore")
            .field("nodes", &self.node_count())
            .field("triples", &self.len())
            .finish()
    }
}
