//! Numeric kernels behind correlated sampling.
//!
//! Both the inverse normal CDF and the correlation factorization are behind
//! traits so the sampler can swap fidelity without changing its control flow.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

use crate::constants::{MATRIX_TOLERANCE, PIVOT_EPSILON};

/// Dense row-major square matrix.
pub type Matrix = Vec<Vec<f64>>;

/// Inverse of the standard normal CDF.
///
/// Implementations must map `p <= 0` to `-inf`, `p >= 1` to `+inf`, and
/// `0.5` to `0`.
pub trait NormalQuantile {
    fn quantile(&self, p: f64) -> f64;
}

/// Piecewise approximation used by the reference game.
///
/// Linear (`2.5 * (p - 0.5)`) for `0.1 < p < 0.9`, `±sqrt(-2 ln tail)`
/// outside. The two pieces do not meet at 0.1/0.9 and the tails overshoot
/// the true quantile, so thresholds for rare or near-universal attributes
/// are pushed outward: rare attributes come out rarer than their target
/// frequency, near-universal ones more common.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceQuantile;

impl NormalQuantile for ReferenceQuantile {
    fn quantile(&self, p: f64) -> f64 {
        if p <= 0.0 {
            return f64::NEG_INFINITY;
        }
        if p >= 1.0 {
            return f64::INFINITY;
        }
        let offset = p - 0.5;
        if offset.abs() < 0.4 {
            return offset * 2.5;
        }
        if p < 0.5 {
            -(-2.0 * p.ln()).sqrt()
        } else {
            (-2.0 * (1.0 - p).ln()).sqrt()
        }
    }
}

/// Acklam's rational approximation (relative error below 1.15e-9).
#[derive(Debug, Clone, Copy, Default)]
pub struct AcklamQuantile;

const ACKLAM_A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_69e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239,
];
const ACKLAM_B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
const ACKLAM_C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838,
    -2.549_732_539_343_734,
    4.374_664_141_464_968,
    2.938_163_982_698_783,
];
const ACKLAM_D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996,
    3.754_408_661_907_416,
];
const ACKLAM_P_LOW: f64 = 0.024_25;

fn horner(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().fold(0.0, |acc, c| acc.mul_add(x, *c))
}

fn acklam_tail(q: f64) -> f64 {
    horner(&ACKLAM_C, q) / horner(&ACKLAM_D, q).mul_add(q, 1.0)
}

impl NormalQuantile for AcklamQuantile {
    fn quantile(&self, p: f64) -> f64 {
        if p <= 0.0 {
            return f64::NEG_INFINITY;
        }
        if p >= 1.0 {
            return f64::INFINITY;
        }
        if p < ACKLAM_P_LOW {
            acklam_tail((-2.0 * p.ln()).sqrt())
        } else if p > 1.0 - ACKLAM_P_LOW {
            -acklam_tail((-2.0 * (1.0 - p).ln()).sqrt())
        } else {
            let q = p - 0.5;
            let r = q * q;
            horner(&ACKLAM_A, r) * q / horner(&ACKLAM_B, r).mul_add(r, 1.0)
        }
    }
}

/// Which inverse-CDF approximation the sampler uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantileMethod {
    #[default]
    Reference,
    Acklam,
}

impl QuantileMethod {
    #[must_use]
    pub fn quantile(self) -> &'static dyn NormalQuantile {
        match self {
            Self::Reference => &ReferenceQuantile,
            Self::Acklam => &AcklamQuantile,
        }
    }
}

/// Conditions a factorization detected but did not correct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FactorizationDiagnostic {
    /// The matrix is not positive-semidefinite; the Cholesky step failed at `pivot`
    /// and a triangular LU factor was used instead.
    Indefinite { pivot: usize },
    /// Partial pivoting reordered rows, so the factor's rows no longer line up
    /// with the attribute order.
    RowsPermuted,
    /// Elimination met a zero pivot in `column`; the column was left empty.
    SingularPivot { column: usize },
}

/// Lower-triangular factor plus anything noteworthy about how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Factorization {
    pub lower: Matrix,
    pub diagnostics: Vec<FactorizationDiagnostic>,
}

#[derive(Debug, Error, PartialEq)]
pub enum FactorizationError {
    #[error("matrix is not square")]
    NotSquare,
    #[error("matrix contains a non-finite entry")]
    NonFinite,
    #[error("matrix is not positive-semidefinite (pivot {pivot}, residual {residual:.3e})")]
    NotPositiveSemidefinite { pivot: usize, residual: f64 },
}

/// Produces a lower-triangular `L` for a correlation matrix.
pub trait CorrelationFactorizer {
    /// # Errors
    ///
    /// Returns a [`FactorizationError`] when the matrix cannot be factored.
    fn factor(&self, matrix: &Matrix) -> Result<Factorization, FactorizationError>;
}

fn check_square(matrix: &Matrix) -> Result<usize, FactorizationError> {
    let n = matrix.len();
    if matrix.iter().any(|row| row.len() != n) {
        return Err(FactorizationError::NotSquare);
    }
    if matrix.iter().flatten().any(|value| !value.is_finite()) {
        return Err(FactorizationError::NonFinite);
    }
    Ok(n)
}

/// Doolittle LU with partial pivoting; returns the unit-lower factor in pivoted row order.
///
/// This is what the reference game feeds its sampler. `L·Lᵗ` does not
/// reproduce the input: each row of a unit-diagonal `L` has squared norm
/// `>= 1`, so every attribute after the first is drawn with inflated
/// variance and its marginal frequency drifts toward one half.
#[derive(Debug, Clone, Copy, Default)]
pub struct LuFactorizer;

impl CorrelationFactorizer for LuFactorizer {
    fn factor(&self, matrix: &Matrix) -> Result<Factorization, FactorizationError> {
        let n = check_square(matrix)?;
        let mut upper = matrix.clone();
        let mut lower = vec![vec![0.0; n]; n];
        let mut diagnostics = Vec::new();
        let mut permuted = false;

        for k in 0..n {
            let pivot_row = (k..n)
                .max_by(|&a, &b| upper[a][k].abs().total_cmp(&upper[b][k].abs()))
                .unwrap_or(k);
            if upper[pivot_row][k].abs() > upper[k][k].abs() {
                upper.swap(k, pivot_row);
                lower.swap(k, pivot_row);
                permuted = true;
            }

            let pivot = upper[k][k];
            if pivot.abs() < PIVOT_EPSILON {
                diagnostics.push(FactorizationDiagnostic::SingularPivot { column: k });
                continue;
            }
            for i in (k + 1)..n {
                let factor = upper[i][k] / pivot;
                lower[i][k] = factor;
                for j in k..n {
                    upper[i][j] -= factor * upper[k][j];
                }
            }
        }

        for (i, row) in lower.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        if permuted {
            diagnostics.push(FactorizationDiagnostic::RowsPermuted);
        }
        Ok(Factorization { lower, diagnostics })
    }
}

/// Cholesky factorization accepting positive-semidefinite input.
///
/// Zero pivots are allowed as long as the rest of their column is zero too
/// (perfectly correlated attributes); anything else fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct CholeskyFactorizer;

impl CorrelationFactorizer for CholeskyFactorizer {
    fn factor(&self, matrix: &Matrix) -> Result<Factorization, FactorizationError> {
        let n = check_square(matrix)?;
        let mut lower = vec![vec![0.0; n]; n];

        for j in 0..n {
            let dot: f64 = lower[j][..j].iter().map(|v| v * v).sum();
            let residual = matrix[j][j] - dot;
            if residual < -MATRIX_TOLERANCE {
                return Err(FactorizationError::NotPositiveSemidefinite { pivot: j, residual });
            }
            let diag = residual.max(0.0).sqrt();
            lower[j][j] = diag;

            for i in (j + 1)..n {
                let dot: f64 = (0..j).map(|k| lower[i][k] * lower[j][k]).sum();
                let remainder = matrix[i][j] - dot;
                if diag > PIVOT_EPSILON.sqrt() {
                    lower[i][j] = remainder / diag;
                } else if remainder.abs() > MATRIX_TOLERANCE.sqrt() {
                    return Err(FactorizationError::NotPositiveSemidefinite {
                        pivot: j,
                        residual,
                    });
                }
            }
        }
        Ok(Factorization {
            lower,
            diagnostics: Vec::new(),
        })
    }
}

/// Cholesky when the matrix allows it, LU otherwise (flagged as [`FactorizationDiagnostic::Indefinite`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveFactorizer;

impl CorrelationFactorizer for AdaptiveFactorizer {
    fn factor(&self, matrix: &Matrix) -> Result<Factorization, FactorizationError> {
        match CholeskyFactorizer.factor(matrix) {
            Ok(factorization) => Ok(factorization),
            Err(FactorizationError::NotPositiveSemidefinite { pivot, .. }) => {
                let mut fallback = LuFactorizer.factor(matrix)?;
                fallback
                    .diagnostics
                    .insert(0, FactorizationDiagnostic::Indefinite { pivot });
                Ok(fallback)
            }
            Err(other) => Err(other),
        }
    }
}

/// Which factorization the sampler uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorizationMethod {
    /// Pivoted LU, as the reference game does.
    #[default]
    Lu,
    /// Strict Cholesky; indefinite matrices are rejected.
    Cholesky,
    /// Cholesky with LU fallback for indefinite matrices.
    Adaptive,
}

impl FactorizationMethod {
    #[must_use]
    pub fn factorizer(self) -> &'static dyn CorrelationFactorizer {
        match self {
            Self::Lu => &LuFactorizer,
            Self::Cholesky => &CholeskyFactorizer,
            Self::Adaptive => &AdaptiveFactorizer,
        }
    }
}

/// Multiply a lower-triangular matrix by a vector.
#[must_use]
pub fn lower_mul(lower: &Matrix, vector: &[f64]) -> Vec<f64> {
    lower
        .iter()
        .enumerate()
        .map(|(i, row)| row[..=i].iter().zip(vector).map(|(l, v)| l * v).sum())
        .collect()
}

/// Squared norm of each row, i.e. the variance of `L·z` per component.
#[must_use]
pub fn row_variances(lower: &Matrix) -> Vec<f64> {
    lower
        .iter()
        .map(|row| row.iter().map(|v| v * v).sum())
        .collect()
}

fn open_unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let value: f64 = rng.r#gen();
        if value > 0.0 {
            return value;
        }
    }
}

/// One standard-normal draw via the Box-Muller transform.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u = open_unit(rng);
    let v = open_unit(rng);
    (-2.0 * u.ln()).sqrt() * (2.0 * PI * v).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    fn reconstruct(lower: &Matrix) -> Matrix {
        let n = lower.len();
        (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| (0..n).map(|k| lower[i][k] * lower[j][k]).sum())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn quantiles_honor_boundaries() {
        for method in [QuantileMethod::Reference, QuantileMethod::Acklam] {
            let q = method.quantile();
            assert_eq!(q.quantile(0.0), f64::NEG_INFINITY);
            assert_eq!(q.quantile(-0.2), f64::NEG_INFINITY);
            assert_eq!(q.quantile(1.0), f64::INFINITY);
            assert_eq!(q.quantile(1.3), f64::INFINITY);
            assert_close(q.quantile(0.5), 0.0, 1e-12);
        }
    }

    #[test]
    fn reference_quantile_matches_piecewise_shape() {
        let q = ReferenceQuantile;
        assert_close(q.quantile(0.7), 0.5, 1e-12);
        assert_close(q.quantile(0.3), -0.5, 1e-12);
        assert_close(q.quantile(0.05), -(-2.0 * 0.05_f64.ln()).sqrt(), 1e-12);
        assert_close(q.quantile(0.95), (-2.0 * 0.05_f64.ln()).sqrt(), 1e-12);
        // tails overshoot the true 1.6449
        assert!(q.quantile(0.95) > 2.4);
    }

    #[test]
    fn acklam_quantile_matches_reference_values() {
        let q = AcklamQuantile;
        assert_close(q.quantile(0.975), 1.959_963_985, 1e-6);
        assert_close(q.quantile(0.05), -1.644_853_627, 1e-6);
        assert_close(q.quantile(0.841_344_746), 1.0, 1e-6);
        assert_close(q.quantile(0.001), -3.090_232_306, 1e-6);
        assert_close(q.quantile(0.3), -q.quantile(0.7), 1e-9);
    }

    #[test]
    fn cholesky_reproduces_positive_definite_matrix() {
        let matrix = vec![
            vec![1.0, -0.2, 0.1],
            vec![-0.2, 1.0, 0.4],
            vec![0.1, 0.4, 1.0],
        ];
        let factorization = CholeskyFactorizer.factor(&matrix).unwrap();
        assert!(factorization.diagnostics.is_empty());
        let rebuilt = reconstruct(&factorization.lower);
        for (row, expected) in rebuilt.iter().zip(&matrix) {
            for (a, b) in row.iter().zip(expected) {
                assert_close(*a, *b, 1e-12);
            }
        }
        for variance in row_variances(&factorization.lower) {
            assert_close(variance, 1.0, 1e-12);
        }
    }

    #[test]
    fn cholesky_accepts_perfect_correlation() {
        let matrix = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        let factorization = CholeskyFactorizer.factor(&matrix).unwrap();
        assert_close(factorization.lower[1][0], 1.0, 1e-12);
        assert_close(factorization.lower[1][1], 0.0, 1e-6);
    }

    #[test]
    fn cholesky_rejects_indefinite_matrix() {
        let matrix = vec![
            vec![1.0, 0.9, -0.9],
            vec![0.9, 1.0, 0.9],
            vec![-0.9, 0.9, 1.0],
        ];
        assert!(matches!(
            CholeskyFactorizer.factor(&matrix),
            Err(FactorizationError::NotPositiveSemidefinite { pivot: 2, .. })
        ));
    }

    #[test]
    fn adaptive_falls_back_to_lu_with_diagnostic() {
        let matrix = vec![
            vec![1.0, 0.9, -0.9],
            vec![0.9, 1.0, 0.9],
            vec![-0.9, 0.9, 1.0],
        ];
        let factorization = AdaptiveFactorizer.factor(&matrix).unwrap();
        assert_eq!(
            factorization.diagnostics.first(),
            Some(&FactorizationDiagnostic::Indefinite { pivot: 2 })
        );
        assert_eq!(factorization.lower, LuFactorizer.factor(&matrix).unwrap().lower);
    }

    #[test]
    fn lu_factor_is_unit_lower_triangular() {
        let matrix = vec![vec![1.0, 0.2], vec![0.2, 1.0]];
        let factorization = LuFactorizer.factor(&matrix).unwrap();
        assert_eq!(factorization.lower, vec![vec![1.0, 0.0], vec![0.2, 1.0]]);
        assert!(factorization.diagnostics.is_empty());
        // second row variance is inflated to 1 + r^2
        assert_close(row_variances(&factorization.lower)[1], 1.04, 1e-12);
    }

    #[test]
    fn lu_reports_row_permutation() {
        let matrix = vec![
            vec![1.0, 0.9, 0.0],
            vec![0.9, 1.0, 0.5],
            vec![0.0, 0.5, 1.0],
        ];
        let factorization = LuFactorizer.factor(&matrix).unwrap();
        assert!(
            factorization
                .diagnostics
                .contains(&FactorizationDiagnostic::RowsPermuted)
        );
    }

    #[test]
    fn lu_flags_singular_pivot() {
        let matrix = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        let factorization = LuFactorizer.factor(&matrix).unwrap();
        assert_eq!(
            factorization.diagnostics,
            vec![FactorizationDiagnostic::SingularPivot { column: 1 }]
        );
    }

    #[test]
    fn factorizers_handle_trivial_sizes() {
        let empty: Matrix = Vec::new();
        let single = vec![vec![1.0]];
        for method in [
            FactorizationMethod::Lu,
            FactorizationMethod::Cholesky,
            FactorizationMethod::Adaptive,
        ] {
            let factorizer = method.factorizer();
            assert!(factorizer.factor(&empty).unwrap().lower.is_empty());
            assert_eq!(factorizer.factor(&single).unwrap().lower, vec![vec![1.0]]);
        }
    }

    #[test]
    fn factorizers_reject_malformed_input() {
        let ragged = vec![vec![1.0, 0.0], vec![0.0]];
        assert_eq!(
            LuFactorizer.factor(&ragged),
            Err(FactorizationError::NotSquare)
        );
        let nan = vec![vec![f64::NAN]];
        assert_eq!(
            CholeskyFactorizer.factor(&nan),
            Err(FactorizationError::NonFinite)
        );
    }

    #[test]
    fn lower_mul_ignores_upper_triangle() {
        let lower = vec![vec![1.0, 9.0], vec![0.5, 2.0]];
        assert_eq!(lower_mul(&lower, &[2.0, 3.0]), vec![2.0, 7.0]);
    }

    #[test]
    fn box_muller_draws_look_standard() {
        let mut rng = SmallRng::seed_from_u64(11);
        let draws: Vec<f64> = (0..20_000).map(|_| standard_normal(&mut rng)).collect();
        let count = f64::from(u32::try_from(draws.len()).unwrap());
        let mean = draws.iter().sum::<f64>() / count;
        let variance = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((variance - 1.0).abs() < 0.05, "variance {variance}");
        assert!(draws.iter().all(|x| x.is_finite()));
    }
}
