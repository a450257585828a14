//! Best one-to-one pairing between two leftover object sets.
//!
//! Given a score matrix (rows = one side, columns = the other), find the
//! injective pairing of the smaller side into the larger one that maximises
//! the summed score. Exhaustive search is used while the number of candidate
//! pairings stays under a cap; past it a greedy best-cell-first assignment
//! takes over.

/// Number of injective maps from an `m`-set into an `n`-set (`n!/(n-m)!`),
/// or `None` once it exceeds `cap`.
pub(crate) fn pairing_count(n: usize, m: usize, cap: usize) -> Option<usize> {
    let mut count: usize = 1;
    for k in 0..m {
        count = count.checked_mul(n - k)?;
        if count > cap {
            return None;
        }
    }
    Some(count)
}

/// Outcome of an assignment search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Assignment {
    pub total: f64,
    pub exhaustive: bool,
}

/// Maximise the total score of a one-to-one pairing over `scores`.
///
/// `scores` is row-major with `rows` rows; every row must have the same
/// length. Empty input scores 0.
pub(crate) fn best_assignment(scores: &[Vec<f64>], max_pairings: usize) -> Assignment {
    let rows = scores.len();
    let cols = scores.first().map_or(0, Vec::len);
    if rows == 0 || cols == 0 {
        return Assignment {
            total: 0.0,
            exhaustive: true,
        };
    }

    // Pair the smaller side into the larger one.
    let oriented: Vec<Vec<f64>> = if rows <= cols {
        scores.to_vec()
    } else {
        (0..cols)
            .map(|c| (0..rows).map(|r| scores[r][c]).collect())
            .collect()
    };
    let (small, large) = (rows.min(cols), rows.max(cols));

    if pairing_count(large, small, max_pairings).is_some() {
        let mut used = vec![false; large];
        let total = exhaustive(&oriented, 0, &mut used);
        Assignment {
            total,
            exhaustive: true,
        }
    } else {
        Assignment {
            total: greedy(&oriented),
            exhaustive: false,
        }
    }
}

fn exhaustive(scores: &[Vec<f64>], row: usize, used: &mut [bool]) -> f64 {
    if row == scores.len() {
        return 0.0;
    }
    let mut best = f64::NEG_INFINITY;
    for col in 0..used.len() {
        if used[col] {
            continue;
        }
        used[col] = true;
        let total = scores[row][col] + exhaustive(scores, row + 1, used);
        used[col] = false;
        if total > best {
            best = total;
        }
    }
    best
}

fn greedy(scores: &[Vec<f64>]) -> f64 {
    let mut cells: Vec<(usize, usize, f64)> = scores
        .iter()
        .enumerate()
        .flat_map(|(r, row)| row.iter().enumerate().map(move |(c, &s)| (r, c, s)))
        .collect();
    // Highest score first; ties resolved by position so the result is stable.
    cells.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));

    let mut row_used = vec![false; scores.len()];
    let mut col_used = vec![false; scores.first().map_or(0, Vec::len)];
    let mut total = 0.0;
    for (r, c, s) in cells {
        if row_used[r] || col_used[c] {
            continue;
        }
        row_used[r] = true;
        col_used[c] = true;
        total += s;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_partial_permutations() {
        assert_eq!(pairing_count(4, 2, 100), Some(12));
        assert_eq!(pairing_count(7, 7, 5040), Some(5040));
        assert_eq!(pairing_count(8, 8, 5040), None);
        assert_eq!(pairing_count(3, 0, 1), Some(1));
    }

    #[test]
    fn exhaustive_beats_diagonal() {
        // Diagonal sums to 1.0; the anti-diagonal sums to 1.8.
        let scores = vec![vec![0.5, 0.9], vec![0.9, 0.5]];
        let a = best_assignment(&scores, 100);
        assert!(a.exhaustive);
        assert!((a.total - 1.8).abs() < 1e-12);
    }

    #[test]
    fn rectangular_pairs_smaller_side() {
        let scores = vec![vec![0.1, 0.7, 0.3]];
        assert!((best_assignment(&scores, 100).total - 0.7).abs() < 1e-12);

        let transposed = vec![vec![0.1], vec![0.7], vec![0.3]];
        assert!((best_assignment(&transposed, 100).total - 0.7).abs() < 1e-12);
    }

    #[test]
    fn greedy_fallback_past_cap() {
        let scores = vec![vec![0.5, 0.9], vec![0.9, 0.5]];
        let a = best_assignment(&scores, 1);
        assert!(!a.exhaustive);
        assert!((a.total - 1.8).abs() < 1e-12);
    }

    #[test]
    fn empty_scores_zero() {
        assert_eq!(best_assignment(&[], 10).total, 0.0);
    }
}
