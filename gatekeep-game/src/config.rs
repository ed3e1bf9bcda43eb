//! Engine configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{ADMIT_CAP, REJECT_CAP};
use crate::sampler::SamplerConfig;
use crate::stats::StatisticsMode;

/// Errors raised when game configuration invariants are violated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be at least 1")]
    ZeroCap { field: &'static str },
    #[error("failed to parse game config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Limits and numeric choices shared by every session an engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "GameConfig::default_admit_cap")]
    pub admit_cap: u32,
    #[serde(default = "GameConfig::default_reject_cap")]
    pub reject_cap: u32,
    #[serde(default)]
    pub statistics: StatisticsMode,
    #[serde(default)]
    pub sampler: SamplerConfig,
}

impl GameConfig {
    const fn default_admit_cap() -> u32 {
        ADMIT_CAP
    }

    const fn default_reject_cap() -> u32 {
        REJECT_CAP
    }

    /// Parse and validate a JSON config; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the JSON is malformed or a limit is zero.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCap`] when either cap is zero.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.admit_cap == 0 {
            return Err(ConfigError::ZeroCap { field: "admit_cap" });
        }
        if self.reject_cap == 0 {
            return Err(ConfigError::ZeroCap {
                field: "reject_cap",
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn with_statistics(mut self, statistics: StatisticsMode) -> Self {
        self.statistics = statistics;
        self
    }

    #[must_use]
    pub const fn with_sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            admit_cap: Self::default_admit_cap(),
            reject_cap: Self::default_reject_cap(),
            statistics: StatisticsMode::default(),
            sampler: SamplerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::{FactorizationMethod, QuantileMethod};

    #[test]
    fn empty_json_yields_contract_defaults() {
        let config = GameConfig::from_json("{}").unwrap();
        assert_eq!(config, GameConfig::default());
        assert_eq!(config.admit_cap, 1_000);
        assert_eq!(config.reject_cap, 20_000);
        assert_eq!(config.statistics, StatisticsMode::Random);
        assert_eq!(config.sampler.quantile, QuantileMethod::Reference);
        assert_eq!(config.sampler.factorization, FactorizationMethod::Lu);
    }

    #[test]
    fn partial_json_overrides_selected_fields() {
        let config = GameConfig::from_json(
            r#"{"reject_cap": 50, "statistics": "preset", "sampler": {"factorization": "adaptive"}}"#,
        )
        .unwrap();
        assert_eq!(config.admit_cap, 1_000);
        assert_eq!(config.reject_cap, 50);
        assert_eq!(config.statistics, StatisticsMode::Preset);
        assert_eq!(config.sampler.factorization, FactorizationMethod::Adaptive);
        assert_eq!(config.sampler.quantile, QuantileMethod::Reference);
    }

    #[test]
    fn zero_caps_are_rejected() {
        assert!(matches!(
            GameConfig::from_json(r#"{"admit_cap": 0}"#),
            Err(ConfigError::ZeroCap { field: "admit_cap" })
        ));
        assert!(matches!(
            GameConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
