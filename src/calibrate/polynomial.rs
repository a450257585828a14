//! Least-squares polynomials and their real roots.
//!
//! Coefficients are stored lowest degree first: `c[0] + c[1] x + c[2] x² ...`.

use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, DcrResult};

/// A real polynomial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    /// Build from coefficients, lowest degree first. Trailing zeros are trimmed.
    pub fn new(mut coefficients: Vec<f64>) -> Self {
        while coefficients.len() > 1 && coefficients.last() == Some(&0.0) {
            coefficients.pop();
        }
        if coefficients.is_empty() {
            coefficients.push(0.0);
        }
        Self { coefficients }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Horner evaluation.
    pub fn eval(&self, x: f64) -> f64 {
        self.coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }

    pub fn derivative(&self) -> Polynomial {
        if self.coefficients.len() <= 1 {
            return Polynomial::new(vec![0.0]);
        }
        Polynomial::new(
            self.coefficients
                .iter()
                .enumerate()
                .skip(1)
                .map(|(k, &c)| c * k as f64)
                .collect(),
        )
    }

    /// `self - value`.
    pub fn shifted(&self, value: f64) -> Polynomial {
        let mut c = self.coefficients.clone();
        c[0] -= value;
        Polynomial::new(c)
    }

    /// All real roots in ascending order.
    ///
    /// The roots of the derivative split the line into intervals on which the
    /// polynomial is monotone; each interval holds at most one root, found by
    /// bisection. The outer intervals are closed with the Cauchy root bound.
    pub fn real_roots(&self) -> Vec<f64> {
        let lead = self.coefficients[self.degree()];
        match self.degree() {
            0 => return Vec::new(),
            1 => return vec![-self.coefficients[0] / lead],
            _ => {}
        }

        let bound = 1.0
            + self.coefficients[..self.degree()]
                .iter()
                .map(|c| (c / lead).abs())
                .fold(0.0, f64::max);

        let mut knots = vec![-bound];
        knots.extend(
            self.derivative()
                .real_roots()
                .into_iter()
                .filter(|x| x.abs() < bound),
        );
        knots.push(bound);

        let scale = bound.max(1.0);
        let mut roots: Vec<f64> = Vec::new();
        for w in knots.windows(2) {
            let (lo, hi) = (w[0], w[1]);
            let (flo, fhi) = (self.eval(lo), self.eval(hi));
            let root = if flo == 0.0 {
                Some(lo)
            } else if fhi == 0.0 {
                Some(hi)
            } else if flo.signum() != fhi.signum() {
                Some(bisect(self, lo, hi, flo))
            } else if is_touching(self, lo, flo, scale) {
                // Double root at a derivative root: the polynomial touches zero
                // without changing sign.
                Some(lo)
            } else {
                None
            };
            if let Some(r) = root {
                if roots.last().is_none_or(|&last| (r - last).abs() > 1e-9 * scale) {
                    roots.push(r);
                }
            }
        }
        roots
    }
}

fn bisect(p: &Polynomial, mut lo: f64, mut hi: f64, mut flo: f64) -> f64 {
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        let fmid = p.eval(mid);
        if fmid == 0.0 || (hi - lo).abs() < f64::EPSILON * mid.abs().max(1.0) {
            return mid;
        }
        if fmid.signum() == flo.signum() {
            lo = mid;
            flo = fmid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

fn is_touching(p: &Polynomial, x: f64, fx: f64, scale: f64) -> bool {
    let magnitude = p
        .coefficients()
        .iter()
        .enumerate()
        .map(|(k, c)| c.abs() * scale.powi(k as i32))
        .sum::<f64>();
    fx.abs() <= 1e-12 * magnitude.max(1.0) && p.derivative().eval(x).abs() <= 1e-9 * magnitude.max(1.0)
}

/// A polynomial fitted to `(x, y)` points, with its coefficient of
/// determination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedCurve {
    pub polynomial: Polynomial,
    /// R² = 1 - SS_res / SS_tot, against the mean of observed `y`.
    pub model_fit: f64,
}

/// Least-squares polynomial of the given degree through `points`.
///
/// Solves the normal equations with partially pivoted Gaussian elimination.
/// The `x` values are centred and scaled first to keep the system well
/// conditioned; the result is mapped back to plain coefficients.
pub fn fit(points: &[(f64, f64)], degree: usize) -> DcrResult<FittedCurve> {
    let needed = degree + 1;
    if points.len() < needed {
        return Err(CalibrationError::TooFewPoints {
            degree,
            needed,
            actual: points.len(),
        }
        .into());
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let spread = points
        .iter()
        .map(|p| (p.0 - mean_x).abs())
        .fold(0.0, f64::max);
    let scale = if spread > 0.0 { spread } else { 1.0 };

    // Normal equations over t = (x - mean) / scale.
    let mut a = vec![vec![0.0; needed]; needed];
    let mut rhs = vec![0.0; needed];
    for &(x, y) in points {
        let t = (x - mean_x) / scale;
        let powers: Vec<f64> = (0..2 * needed).map(|k| t.powi(k as i32)).collect();
        for i in 0..needed {
            rhs[i] += y * powers[i];
            for j in 0..needed {
                a[i][j] += powers[i + j];
            }
        }
    }
    let in_t = solve(a, rhs).ok_or(CalibrationError::SingularFit { degree })?;
    let polynomial = Polynomial::new(expand_shifted(&in_t, mean_x, scale));

    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let ss_tot: f64 = points.iter().map(|p| (p.1 - mean_y).powi(2)).sum();
    let ss_res: f64 = points
        .iter()
        .map(|p| (p.1 - polynomial.eval(p.0)).powi(2))
        .sum();
    let model_fit = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res <= f64::EPSILON {
        1.0
    } else {
        0.0
    };

    Ok(FittedCurve {
        polynomial,
        model_fit,
    })
}

/// Rewrite `Σ b_k ((x - m)/s)^k` as `Σ c_j x^j`.
fn expand_shifted(b: &[f64], m: f64, s: f64) -> Vec<f64> {
    let mut c = vec![0.0; b.len()];
    for (k, &bk) in b.iter().enumerate() {
        let factor = bk / s.powi(k as i32);
        // (x - m)^k = Σ_j C(k, j) x^j (-m)^(k-j)
        let mut binom = 1.0;
        for j in 0..=k {
            if j > 0 {
                binom = binom * (k - j + 1) as f64 / j as f64;
            }
            c[j] += factor * binom * (-m).powi((k - j) as i32);
        }
    }
    c
}

/// Gaussian elimination with partial pivoting. `None` if singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let norm = a
        .iter()
        .flatten()
        .map(|v| v.abs())
        .fold(0.0, f64::max)
        .max(f64::MIN_POSITIVE);
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() <= 1e-12 * norm {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn evaluates_with_horner() {
        let p = Polynomial::new(vec![1.0, -2.0, 3.0]);
        assert!(close(p.eval(2.0), 1.0 - 4.0 + 12.0));
        assert_eq!(p.degree(), 2);
    }

    #[test]
    fn trims_trailing_zeros() {
        assert_eq!(Polynomial::new(vec![1.0, 2.0, 0.0]).degree(), 1);
        assert_eq!(Polynomial::new(vec![]).degree(), 0);
    }

    #[test]
    fn derivative_of_cubic() {
        let p = Polynomial::new(vec![5.0, 0.0, -3.0, 1.0]);
        assert_eq!(p.derivative().coefficients(), &[0.0, -6.0, 3.0]);
    }

    #[test]
    fn roots_of_quadratic_and_cubic() {
        // (x - 1)(x - 3) = x² - 4x + 3
        let roots = Polynomial::new(vec![3.0, -4.0, 1.0]).real_roots();
        assert_eq!(roots.len(), 2);
        assert!(close(roots[0], 1.0) && close(roots[1], 3.0));

        // (x + 2)(x)(x - 5) = x³ - 3x² - 10x
        let roots = Polynomial::new(vec![0.0, -10.0, -3.0, 1.0]).real_roots();
        assert_eq!(roots.len(), 3);
        assert!(close(roots[0], -2.0) && close(roots[1], 0.0) && close(roots[2], 5.0));
    }

    #[test]
    fn no_real_roots() {
        assert!(Polynomial::new(vec![1.0, 0.0, 1.0]).real_roots().is_empty());
        assert!(Polynomial::new(vec![2.0]).real_roots().is_empty());
    }

    #[test]
    fn double_root_is_found() {
        // (x - 2)² = x² - 4x + 4
        let roots = Polynomial::new(vec![4.0, -4.0, 1.0]).real_roots();
        assert_eq!(roots.len(), 1);
        assert!((roots[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn fits_a_line_exactly() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 1.0 - i as f64 / 20.0)).collect();
        let curve = fit(&points, 1).unwrap();
        let c = curve.polynomial.coefficients();
        assert!(close(c[0], 1.0));
        assert!(close(c[1], -0.05));
        assert!(close(curve.model_fit, 1.0));
    }

    #[test]
    fn fits_a_quadratic() {
        let points: Vec<(f64, f64)> = (0..8)
            .map(|i| {
                let x = i as f64 * 0.5 + 10.0;
                (x, 2.0 - 0.3 * x + 0.01 * x * x)
            })
            .collect();
        let curve = fit(&points, 2).unwrap();
        let c = curve.polynomial.coefficients();
        assert!((c[0] - 2.0).abs() < 1e-6);
        assert!((c[1] + 0.3).abs() < 1e-7);
        assert!((c[2] - 0.01).abs() < 1e-8);
    }

    #[test]
    fn noisy_fit_reports_partial_r_squared() {
        let points = vec![(0.0, 1.0), (1.0, 0.6), (2.0, 0.7), (3.0, 0.1)];
        let curve = fit(&points, 1).unwrap();
        assert!(curve.model_fit > 0.0 && curve.model_fit < 1.0);
    }

    #[test]
    fn too_few_points() {
        assert!(fit(&[(0.0, 1.0), (1.0, 0.5)], 2).is_err());
    }

    #[test]
    fn singular_when_x_is_constant() {
        let points = vec![(1.0, 0.2), (1.0, 0.4), (1.0, 0.6)];
        assert!(fit(&points, 1).is_err());
    }
}
