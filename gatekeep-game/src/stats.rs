//! Attribute statistics for new sessions: random draws or fixed per-scenario presets.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::attributes::{Attribute, AttributeStatistics};
use crate::scenarios::Scenario;

/// How the engine obtains statistics for a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatisticsMode {
    /// Fresh random frequencies and correlations per session.
    #[default]
    Random,
    /// Fixed tables per scenario, for reproducible runs.
    Preset,
}

/// Draw random statistics for `attributes`.
///
/// Frequencies are uniform on `[0, 1)`; each unordered pair gets one
/// uniform correlation on `[-1, 1]`, mirrored across the diagonal. The
/// result is symmetric with a unit diagonal but is frequently not
/// positive-semidefinite once more than two attributes are involved.
pub fn generate<R: Rng + ?Sized>(attributes: &[Attribute], rng: &mut R) -> AttributeStatistics {
    let n = attributes.len();
    let frequencies = attributes.iter().map(|_| rng.r#gen::<f64>()).collect();

    let mut correlations = vec![vec![0.0; n]; n];
    for i in 0..n {
        correlations[i][i] = 1.0;
        for j in (i + 1)..n {
            let correlation = rng.gen_range(-1.0..=1.0);
            correlations[i][j] = correlation;
            correlations[j][i] = correlation;
        }
    }

    AttributeStatistics {
        attributes: attributes.to_vec(),
        frequencies,
        correlations,
    }
}

struct PresetTable {
    scenario: u8,
    frequencies: &'static [(Attribute, f64)],
    correlations: &'static [&'static [f64]],
}

// Every preset matrix is strictly diagonally dominant, hence positive-definite.
const PRESETS: [PresetTable; 3] = [
    PresetTable {
        scenario: 1,
        frequencies: &[(Attribute::Young, 0.3225), (Attribute::WellDressed, 0.3225)],
        correlations: &[&[1.0, 0.183_046], &[0.183_046, 1.0]],
    },
    PresetTable {
        scenario: 2,
        frequencies: &[
            (Attribute::TechnoLover, 0.6),
            (Attribute::WellConnected, 0.4),
            (Attribute::Creative, 0.1),
            (Attribute::BerlinLocal, 0.5),
        ],
        correlations: &[
            &[1.0, -0.2, 0.1, -0.3],
            &[-0.2, 1.0, 0.15, 0.4],
            &[0.1, 0.15, 1.0, 0.1],
            &[-0.3, 0.4, 0.1, 1.0],
        ],
    },
    PresetTable {
        scenario: 3,
        frequencies: &[
            (Attribute::UndergroundVeteran, 0.68),
            (Attribute::International, 0.57),
            (Attribute::FashionForward, 0.69),
            (Attribute::QueerFriendly, 0.25),
            (Attribute::VinylCollector, 0.12),
            (Attribute::GermanSpeaker, 0.46),
        ],
        correlations: &[
            &[1.0, -0.08, 0.12, 0.05, 0.35, 0.2],
            &[-0.08, 1.0, 0.1, 0.06, -0.04, -0.45],
            &[0.12, 0.1, 1.0, 0.15, 0.09, -0.05],
            &[0.05, 0.06, 0.15, 1.0, 0.04, 0.02],
            &[0.35, -0.04, 0.09, 0.04, 1.0, 0.08],
            &[0.2, -0.45, -0.05, 0.02, 0.08, 1.0],
        ],
    },
];

/// Fixed statistics for `scenario_id`; identical on every call.
#[must_use]
pub fn preset(scenario_id: u8) -> Option<AttributeStatistics> {
    let table = PRESETS.iter().find(|t| t.scenario == scenario_id)?;
    Some(AttributeStatistics {
        attributes: table.frequencies.iter().map(|(a, _)| *a).collect(),
        frequencies: table.frequencies.iter().map(|(_, f)| *f).collect(),
        correlations: table.correlations.iter().map(|row| row.to_vec()).collect(),
    })
}

/// Statistics for `scenario` under `mode`, drawing from `rng` when random.
pub fn for_scenario<R: Rng + ?Sized>(
    scenario: &Scenario,
    mode: StatisticsMode,
    rng: &mut R,
) -> AttributeStatistics {
    match mode {
        StatisticsMode::Random => generate(&scenario.attributes(), rng),
        StatisticsMode::Preset => {
            preset(scenario.id).unwrap_or_else(|| generate(&scenario.attributes(), rng))
        }
    }
}
