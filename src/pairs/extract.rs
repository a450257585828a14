//! Greedy extraction of matched pairs from a distance matrix.
//!
//! Both entry points share one loop: find the globally closest eligible cell
//! (row-major first on ties), record `(row, column)`, retire cells so the pair
//! cannot be chosen again, repeat. They differ in the stop condition and in
//! which cells are retired:
//!
//! | | stop | free mode retires | cross-group retires |
//! |---|---|---|---|
//! | threshold | min ≥ threshold | rows and columns of both members | the row |
//! | proportion | target count reached | the pair's two cells | the row |
//!
//! Sentinel cells are never eligible. Each call copies the matrix; the
//! caller's matrix is left untouched.

use crate::error::{DcrResult, PairsError};

use super::{DistanceMatrix, MatchedPair, PairingMode};

/// Mutable working copy of a distance matrix.
struct WorkingCopy<'m> {
    matrix: &'m DistanceMatrix,
    values: Vec<f64>,
    eligible: Vec<bool>,
    ncols: usize,
}

impl<'m> WorkingCopy<'m> {
    fn new(matrix: &'m DistanceMatrix) -> Self {
        let sentinel = matrix.sentinel();
        let values = matrix.values().to_vec();
        let eligible = values.iter().map(|&v| v < sentinel).collect();
        Self {
            matrix,
            values,
            eligible,
            ncols: matrix.shape().1,
        }
    }

    /// Closest eligible cell as `(row, col, distance)`.
    fn min_cell(&self) -> Option<(usize, usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, (&v, &ok)) in self.values.iter().zip(&self.eligible).enumerate() {
            if ok && best.is_none_or(|(_, b)| v < b) {
                best = Some((i, v));
            }
        }
        best.map(|(i, v)| (i / self.ncols, i % self.ncols, v))
    }

    fn current_max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    fn retire(&mut self, row: usize, col: usize, fill: f64) {
        let i = row * self.ncols + col;
        self.values[i] = fill;
        self.eligible[i] = false;
    }

    fn retire_row(&mut self, row: usize, fill: f64) {
        for col in 0..self.ncols {
            self.retire(row, col, fill);
        }
    }

    fn retire_col(&mut self, col: usize, fill: f64) {
        let nrows = self.values.len() / self.ncols.max(1);
        for row in 0..nrows {
            self.retire(row, col, fill);
        }
    }

    fn pair(&self, row: usize, col: usize, distance: f64) -> MatchedPair {
        MatchedPair {
            first: self.matrix.rows()[row].clone(),
            second: self.matrix.cols()[col].clone(),
            distance,
        }
    }
}

/// Extract pairs closer than `threshold`.
///
/// Free mode yields a matching: no instance appears in two pairs. In
/// cross-group mode each row (t0) instance is used once while column (t1)
/// instances may recur.
pub fn pairs_by_threshold(matrix: &DistanceMatrix, threshold: f64) -> DcrResult<Vec<MatchedPair>> {
    if !threshold.is_finite() {
        return Err(PairsError::InvalidThreshold { threshold }.into());
    }

    let mut work = WorkingCopy::new(matrix);
    let sentinel = matrix.sentinel();
    let mut pairs = Vec::new();

    while let Some((row, col, distance)) = work.min_cell() {
        if distance >= threshold {
            break;
        }
        pairs.push(work.pair(row, col, distance));
        match matrix.mode() {
            PairingMode::Free => {
                // Rows and columns share labels in free mode.
                for member in [row, col] {
                    work.retire_row(member, sentinel);
                    work.retire_col(member, sentinel);
                }
            }
            PairingMode::CrossGroup => work.retire_row(row, sentinel),
        }
    }

    tracing::info!(
        mode = %matrix.mode(),
        threshold,
        pairs = pairs.len(),
        "extracted pairs under distance threshold"
    );
    Ok(pairs)
}

/// Extract the closest pairs until `proportion` of all unordered pairs among
/// `total_instances` is reached, capped by the smaller matrix dimension.
///
/// Retired cells take the matrix's current maximum. In free mode only the
/// selected pair is retired (both orientations), so the result is the closest
/// distinct pairs rather than a matching.
pub fn pairs_by_proportion(
    matrix: &DistanceMatrix,
    total_instances: usize,
    proportion: f64,
) -> DcrResult<Vec<MatchedPair>> {
    if !(0.0..=1.0).contains(&proportion) {
        return Err(PairsError::InvalidProportion { proportion }.into());
    }

    let (nrows, ncols) = matrix.shape();
    let possible = nrows.min(ncols) as f64;
    let n = total_instances as f64;
    let target = (n * (n - 1.0) / 2.0 * proportion).min(possible).max(0.0);
    tracing::info!(mode = %matrix.mode(), target, "number of pairs to build");

    let mut work = WorkingCopy::new(matrix);
    let mut pairs = Vec::new();

    while (pairs.len() as f64) < target {
        let Some((row, col, distance)) = work.min_cell() else {
            tracing::debug!(pairs = pairs.len(), "no eligible cells left");
            break;
        };
        pairs.push(work.pair(row, col, distance));
        let max = work.current_max();
        match matrix.mode() {
            PairingMode::Free => {
                work.retire(row, col, max);
                work.retire(col, row, max);
            }
            PairingMode::CrossGroup => work.retire_row(row, max),
        }
    }

    tracing::info!(
        mode = %matrix.mode(),
        proportion,
        pairs = pairs.len(),
        "extracted pairs by proportion"
    );
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::graph::Entity;

    fn labels(names: &[&str]) -> Vec<Entity> {
        names.iter().map(|s| Entity::new(*s)).collect()
    }

    /// Symmetric 4x4 with distinct off-diagonal distances:
    /// ab=0.1 ac=0.2 ad=0.6 bc=0.3 bd=0.5 cd=0.4
    fn four() -> DistanceMatrix {
        let l = labels(&["a", "b", "c", "d"]);
        DistanceMatrix::from_values(
            PairingMode::Free,
            l.clone(),
            l,
            vec![
                vec![0.0, 0.1, 0.2, 0.6],
                vec![0.1, 0.0, 0.3, 0.5],
                vec![0.2, 0.3, 0.0, 0.4],
                vec![0.6, 0.5, 0.4, 0.0],
            ],
        )
        .unwrap()
    }

    fn unordered(p: &MatchedPair) -> (String, String) {
        let (a, b) = (p.first.to_string(), p.second.to_string());
        if a <= b { (a, b) } else { (b, a) }
    }

    #[test]
    fn threshold_free_mode_is_a_matching() {
        let m = four();
        let pairs = pairs_by_threshold(&m, 1.0).unwrap();
        // ab (0.1) first, which removes a and b; cd (0.4) is all that is left.
        assert_eq!(pairs.len(), 2);
        assert_eq!(unordered(&pairs[0]), ("a".into(), "b".into()));
        assert_eq!(unordered(&pairs[1]), ("c".into(), "d".into()));

        let mut seen = HashSet::new();
        for p in &pairs {
            assert!(seen.insert(p.first.clone()));
            assert!(seen.insert(p.second.clone()));
        }
    }

    #[test]
    fn threshold_stops_at_bound() {
        let m = four();
        let pairs = pairs_by_threshold(&m, 0.4).unwrap();
        assert_eq!(pairs.len(), 1);
        assert!(pairs_by_threshold(&m, 0.1).unwrap().is_empty());
    }

    #[test]
    fn ties_pick_row_major_first() {
        let m = four();
        let pairs = pairs_by_threshold(&m, 1.0).unwrap();
        assert_eq!(pairs[0].first, Entity::new("a"));
        assert_eq!(pairs[0].second, Entity::new("b"));
        assert_eq!(pairs[0].distance, 0.1);
    }

    #[test]
    fn caller_matrix_is_untouched() {
        let m = four();
        let before = m.clone();
        pairs_by_threshold(&m, 1.0).unwrap();
        pairs_by_proportion(&m, 4, 0.5).unwrap();
        assert_eq!(m, before);
    }

    #[test]
    fn cross_group_reuses_columns() {
        let m = DistanceMatrix::from_values(
            PairingMode::CrossGroup,
            labels(&["x", "y"]),
            labels(&["p", "q"]),
            vec![vec![0.1, 0.9], vec![0.2, 0.8]],
        )
        .unwrap();
        let pairs = pairs_by_threshold(&m, 1.0).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].second, Entity::new("p"));
        assert_eq!(pairs[1].second, Entity::new("p"));
        assert_ne!(pairs[0].first, pairs[1].first);
    }

    #[test]
    fn proportion_takes_closest_distinct_pairs() {
        let m = four();
        // 4 instances, 6 possible pairs, half of them.
        let pairs = pairs_by_proportion(&m, 4, 0.5).unwrap();
        assert_eq!(pairs.len(), 3);

        let picked: HashSet<_> = pairs.iter().map(unordered).collect();
        assert_eq!(picked.len(), 3);
        let worst_picked = pairs.iter().map(|p| p.distance).fold(0.0, f64::max);
        let all = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let unpicked: Vec<f64> = all
            .iter()
            .copied()
            .filter(|d| !pairs.iter().any(|p| p.distance == *d))
            .collect();
        assert_eq!(unpicked.len(), 3);
        assert!(unpicked.iter().all(|&d| worst_picked < d));
    }

    #[test]
    fn proportion_is_capped_by_matrix_size() {
        let m = four();
        // 100% of 6 pairs, but at most min(4, 4) = 4.
        assert_eq!(pairs_by_proportion(&m, 4, 1.0).unwrap().len(), 4);
    }

    #[test]
    fn proportion_stops_when_nothing_is_left() {
        let l = labels(&["a", "b", "c"]);
        // Only a-b has a real distance; the other pairs were never reported.
        let m = DistanceMatrix::from_values(
            PairingMode::Free,
            l.clone(),
            l,
            vec![
                vec![0.0, 0.1, 100.0],
                vec![0.1, 0.0, 100.0],
                vec![100.0, 100.0, 0.0],
            ],
        )
        .unwrap();
        let pairs = pairs_by_proportion(&m, 3, 1.0).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(unordered(&pairs[0]), ("a".into(), "b".into()));
    }

    #[test]
    fn rejects_bad_parameters() {
        let m = four();
        assert!(pairs_by_proportion(&m, 4, 1.5).is_err());
        assert!(pairs_by_threshold(&m, f64::NAN).is_err());
    }

    #[test]
    fn sentinel_cells_are_never_paired() {
        let l = labels(&["a", "b"]);
        let m = DistanceMatrix::from_values(
            PairingMode::Free,
            l.clone(),
            l,
            vec![vec![0.0, 100.0], vec![100.0, 0.0]],
        )
        .unwrap();
        assert!(pairs_by_threshold(&m, 500.0).unwrap().is_empty());
        assert!(pairs_by_proportion(&m, 2, 1.0).unwrap().is_empty());
    }
}
