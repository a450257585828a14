// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # dcr-discovery
//!
//! Causal rule discovery over knowledge graphs guided by graph embeddings.
//!
//! Entities that are similar in embedding space but differ in a treatment
//! property are matched into pairs; comparing their outcomes yields an
//! odds-ratio-style effect estimate with a confidence interval.
//!
//! ## Architecture
//!
//! - **Triple store** (`graph`): read-only petgraph-backed index with
//!   subject / predicate / object lookups
//! - **Embedding oracle** (`oracle`): embeddings, triple plausibility and
//!   nearest neighbours behind one trait; a TransE-style implementation
//! - **Structural similarity** (`similarity`): bounded recursive comparison of
//!   predicted neighbourhoods
//! - **Pair mining** (`pairs`): distance matrices and greedy extraction
//! - **Calibration** (`calibrate`): distance threshold from a fitted
//!   distance → similarity curve
//! - **Effect metric** (`metric`): outcome agreement counts, ratio and interval
//!
//! ## Library usage
//!
//! ```no_run
//! use std::path::Path;
//!
//! use dcr_discovery::config::DiscoveryConfig;
//! use dcr_discovery::discovery::Discovery;
//! use dcr_discovery::graph::Entity;
//!
//! let config = DiscoveryConfig::from_file(Path::new("run.toml")).unwrap();
//! let run = Discovery::open(config, Path::new("triples.json"), Path::new("embeddings.json")).unwrap();
//! let t0 = vec![Entity::new("ex:alice"), Entity::new("ex:carol")];
//! let t1 = vec![Entity::new("ex:bob"), Entity::new("ex:dave")];
//! let mined = run.pairs(&t0, &t1).unwrap();
//! let estimate = run.configured_effect(&mined.pairs).unwrap();
//! println!("{estimate}");
//! ```

pub mod calibrate;
pub mod config;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod metric;
pub mod oracle;
pub mod pairs;
pub mod similarity;
