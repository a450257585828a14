//! Pairwise distance matrices over candidate instances.

use std::collections::{HashMap, HashSet};

use crate::error::{DcrResult, OracleError, PairsError};
use crate::graph::Entity;
use crate::oracle::EmbeddingOracle;

use super::PairingMode;

/// Embedding distances between row and column instances.
///
/// Cells the oracle did not report hold the mode's sentinel. Values are
/// rounded to three decimals. The matrix is never mutated once built; the
/// extractor works on its own copy.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    mode: PairingMode,
    rows: Vec<Entity>,
    cols: Vec<Entity>,
    /// Row-major values.
    values: Vec<f64>,
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

impl DistanceMatrix {
    /// Build a matrix from explicit values. `values[r][c]` is the distance
    /// between `rows[r]` and `cols[c]`.
    ///
    /// In free mode `rows` and `cols` must be the same list and the diagonal
    /// is overwritten with the sentinel. Any other cell is either exactly the
    /// sentinel or a real distance in `[0, sentinel)`.
    pub fn from_values(
        mode: PairingMode,
        rows: Vec<Entity>,
        cols: Vec<Entity>,
        values: Vec<Vec<f64>>,
    ) -> DcrResult<Self> {
        if values.len() != rows.len() || values.iter().any(|r| r.len() != cols.len()) {
            return Err(PairsError::ShapeMismatch {
                rows: rows.len(),
                cols: cols.len(),
            }
            .into());
        }
        if mode == PairingMode::Free && rows != cols {
            return Err(PairsError::LabelMismatch.into());
        }
        let sentinel = mode.sentinel();
        for (r, row) in values.iter().enumerate() {
            for (c, &distance) in row.iter().enumerate() {
                let diagonal = mode == PairingMode::Free && r == c;
                if diagonal || distance == sentinel || is_real_distance(distance, sentinel) {
                    continue;
                }
                return Err(PairsError::InvalidCell {
                    row: rows[r].to_string(),
                    col: cols[c].to_string(),
                    distance,
                    sentinel,
                }
                .into());
            }
        }
        let mut matrix = Self {
            mode,
            rows,
            cols,
            values: values.into_iter().flatten().collect(),
        };
        if mode == PairingMode::Free {
            matrix.fill_diagonal();
        }
        Ok(matrix)
    }

    fn filled(mode: PairingMode, rows: Vec<Entity>, cols: Vec<Entity>) -> Self {
        let len = rows.len() * cols.len();
        Self {
            mode,
            rows,
            cols,
            values: vec![mode.sentinel(); len],
        }
    }

    fn fill_diagonal(&mut self) {
        let n = self.rows.len().min(self.cols.len());
        let sentinel = self.mode.sentinel();
        for i in 0..n {
            self.set(i, i, sentinel);
        }
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, value: f64) {
        let ncols = self.cols.len();
        self.values[row * ncols + col] = value;
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols.len() + col]
    }

    pub fn mode(&self) -> PairingMode {
        self.mode
    }

    pub fn sentinel(&self) -> f64 {
        self.mode.sentinel()
    }

    pub fn rows(&self) -> &[Entity] {
        &self.rows
    }

    pub fn cols(&self) -> &[Entity] {
        &self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }

    pub(crate) fn values(&self) -> &[f64] {
        &self.values
    }

    /// Square matrix over `instances`, any two distinct instances may pair.
    pub fn build_free(oracle: &dyn EmbeddingOracle, instances: &[Entity]) -> DcrResult<Self> {
        let mut matrix = Self::filled(PairingMode::Free, instances.to_vec(), instances.to_vec());
        let position = index_of(instances);

        for (col, instance) in instances.iter().enumerate() {
            let neighbors = oracle.nearest_neighbors(instance, instances.len(), instances)?;
            for (neighbor, distance) in neighbors.iter() {
                check_distance(instance, distance, matrix.sentinel())?;
                if let Some(&row) = position.get(neighbor) {
                    matrix.set(row, col, round3(distance));
                }
            }
        }
        matrix.fill_diagonal();

        tracing::debug!(instances = instances.len(), "built free-mode distance matrix");
        Ok(matrix)
    }

    /// Rows are `instances_t0`, columns `instances_t1`. The groups must be
    /// disjoint.
    pub fn build_cross_group(
        oracle: &dyn EmbeddingOracle,
        instances_t0: &[Entity],
        instances_t1: &[Entity],
    ) -> DcrResult<Self> {
        let t0: HashSet<&Entity> = instances_t0.iter().collect();
        if let Some(shared) = instances_t1.iter().find(|e| t0.contains(e)) {
            return Err(PairsError::OverlappingGroups {
                entity: shared.to_string(),
            }
            .into());
        }

        let mut matrix = Self::filled(
            PairingMode::CrossGroup,
            instances_t0.to_vec(),
            instances_t1.to_vec(),
        );
        let position = index_of(instances_t1);

        for (row, instance) in instances_t0.iter().enumerate() {
            let neighbors = oracle.nearest_neighbors(instance, instances_t1.len(), instances_t1)?;
            for (neighbor, distance) in neighbors.iter() {
                check_distance(instance, distance, matrix.sentinel())?;
                if let Some(&col) = position.get(neighbor) {
                    matrix.set(row, col, round3(distance));
                }
            }
        }

        tracing::debug!(
            t0 = instances_t0.len(),
            t1 = instances_t1.len(),
            "built cross-group distance matrix"
        );
        Ok(matrix)
    }
}

fn index_of(instances: &[Entity]) -> HashMap<&Entity, usize> {
    instances.iter().enumerate().map(|(i, e)| (e, i)).collect()
}

fn is_real_distance(distance: f64, sentinel: f64) -> bool {
    distance.is_finite() && distance >= 0.0 && distance < sentinel
}

/// Oracle distances must stay below the sentinel, or extraction would read
/// them as unset cells.
fn check_distance(entity: &Entity, distance: f64, sentinel: f64) -> DcrResult<()> {
    if is_real_distance(distance, sentinel) {
        Ok(())
    } else {
        Err(OracleError::InvalidDistance {
            entity: entity.to_string(),
            distance,
        }
        .into())
    }
}
