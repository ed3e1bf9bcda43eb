//! Correlated boolean sampling of persons.
//!
//! Independent standard normals are mixed through a lower-triangular factor
//! of the correlation matrix, and each mixed value is compared against the
//! normal threshold that a standard normal exceeds with the attribute's
//! target frequency.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attributes::{Attribute, AttributeStatistics, Person, PersonTraits, StatisticsError};
use crate::constants::VARIANCE_DRIFT_TOLERANCE;
use crate::numeric::{
    CorrelationFactorizer, FactorizationDiagnostic, FactorizationError, FactorizationMethod,
    Matrix, NormalQuantile, QuantileMethod, lower_mul, row_variances, standard_normal,
};

/// Numeric methods used by the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SamplerConfig {
    #[serde(default)]
    pub quantile: QuantileMethod,
    #[serde(default)]
    pub factorization: FactorizationMethod,
}

impl SamplerConfig {
    /// Acklam quantiles with adaptive Cholesky factorization.
    #[must_use]
    pub const fn high_fidelity() -> Self {
        Self {
            quantile: QuantileMethod::Acklam,
            factorization: FactorizationMethod::Adaptive,
        }
    }
}

/// Sampling-quality problems detected while preparing a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingDiagnostic {
    /// Reported by the factorization step.
    Factorization(FactorizationDiagnostic),
    /// The mixed normal for `attribute` does not have unit variance, so its
    /// realised frequency drifts from the target.
    VarianceDrift { attribute: Attribute, variance: f64 },
}

#[derive(Debug, Error, PartialEq)]
pub enum SamplerError {
    #[error("invalid attribute statistics: {0}")]
    Statistics(#[from] StatisticsError),
    #[error("correlation factorization failed: {0}")]
    Factorization(#[from] FactorizationError),
}

/// Prepared sampler for one [`AttributeStatistics`] value.
#[derive(Debug, Clone)]
pub struct CorrelatedSampler {
    attributes: Vec<Attribute>,
    lower: Matrix,
    thresholds: Vec<f64>,
    diagnostics: Vec<SamplingDiagnostic>,
}

impl CorrelatedSampler {
    /// Prepare a sampler with the methods named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError`] if the statistics are malformed or the
    /// selected factorization rejects the matrix.
    pub fn new(stats: &AttributeStatistics, config: &SamplerConfig) -> Result<Self, SamplerError> {
        Self::with_methods(
            stats,
            config.quantile.quantile(),
            config.factorization.factorizer(),
        )
    }

    /// Prepare a sampler with explicit numeric kernels.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError`] if the statistics are malformed or the
    /// factorizer rejects the matrix.
    pub fn with_methods(
        stats: &AttributeStatistics,
        quantile: &dyn NormalQuantile,
        factorizer: &dyn CorrelationFactorizer,
    ) -> Result<Self, SamplerError> {
        stats.validate()?;
        let factorization = factorizer.factor(&stats.correlations)?;

        let mut diagnostics: Vec<SamplingDiagnostic> = factorization
            .diagnostics
            .iter()
            .copied()
            .map(SamplingDiagnostic::Factorization)
            .collect();
        for (attribute, variance) in stats
            .attributes
            .iter()
            .zip(row_variances(&factorization.lower))
        {
            if (variance - 1.0).abs() > VARIANCE_DRIFT_TOLERANCE {
                diagnostics.push(SamplingDiagnostic::VarianceDrift {
                    attribute: *attribute,
                    variance,
                });
            }
        }
        if diagnostics
            .iter()
            .any(|d| matches!(d, SamplingDiagnostic::Factorization(_)))
        {
            log::warn!("degenerate correlation factorization: {diagnostics:?}");
        }

        let thresholds = stats
            .frequencies
            .iter()
            .map(|frequency| quantile.quantile(1.0 - frequency))
            .collect();

        Ok(Self {
            attributes: stats.attributes.clone(),
            lower: factorization.lower,
            thresholds,
            diagnostics,
        })
    }

    /// Draw one person; independent of all previous draws.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Person {
        let independent: Vec<f64> = self.attributes.iter().map(|_| standard_normal(rng)).collect();
        let correlated = lower_mul(&self.lower, &independent);
        let traits: PersonTraits = self
            .attributes
            .iter()
            .zip(correlated.iter().zip(&self.thresholds))
            .map(|(attribute, (value, threshold))| (*attribute, value > threshold))
            .collect();
        Person::new(traits)
    }

    /// Unbounded stream of independent draws.
    pub fn persons<R: Rng>(&self, rng: R) -> Persons<'_, R> {
        Persons { sampler: self, rng }
    }

    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Thresholds a correlated normal must exceed, in attribute order.
    #[must_use]
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[SamplingDiagnostic] {
        &self.diagnostics
    }

    /// True when the factorization reproduces the statistics' correlation
    /// structure without drift.
    #[must_use]
    pub fn is_faithful(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Iterator returned by [`CorrelatedSampler::persons`].
#[derive(Debug)]
pub struct Persons<'a, R> {
    sampler: &'a CorrelatedSampler,
    rng: R,
}

impl<R: Rng> Iterator for Persons<'_, R> {
    type Item = Person;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.sampler.draw(&mut self.rng))
    }
}
