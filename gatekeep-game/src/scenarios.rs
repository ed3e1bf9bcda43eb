//! Scenario catalog: which attributes a game tracks and how many admissions each needs.

use serde::Serialize;

use crate::attributes::Attribute;

/// Minimum number of admitted persons that must carry `attribute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioConstraint {
    pub attribute: Attribute,
    pub min_count: u32,
}

const fn constraint(attribute: Attribute, min_count: u32) -> ScenarioConstraint {
    ScenarioConstraint {
        attribute,
        min_count,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub id: u8,
    pub name: &'static str,
    pub constraints: &'static [ScenarioConstraint],
}

const SCENARIOS: [Scenario; 3] = [
    Scenario {
        id: 1,
        name: "dress-code",
        constraints: &[
            constraint(Attribute::Young, 600),
            constraint(Attribute::WellDressed, 600),
        ],
    },
    Scenario {
        id: 2,
        name: "local-scene",
        constraints: &[
            constraint(Attribute::TechnoLover, 650),
            constraint(Attribute::WellConnected, 450),
            constraint(Attribute::Creative, 300),
            constraint(Attribute::BerlinLocal, 750),
        ],
    },
    Scenario {
        id: 3,
        name: "underground",
        constraints: &[
            constraint(Attribute::UndergroundVeteran, 500),
            constraint(Attribute::International, 650),
            constraint(Attribute::FashionForward, 550),
            constraint(Attribute::QueerFriendly, 250),
            constraint(Attribute::VinylCollector, 200),
            constraint(Attribute::GermanSpeaker, 800),
        ],
    },
];

impl Scenario {
    #[must_use]
    pub fn find(id: u8) -> Option<&'static Self> {
        SCENARIOS.iter().find(|scenario| scenario.id == id)
    }

    #[must_use]
    pub const fn all() -> &'static [Self] {
        &SCENARIOS
    }

    /// Tracked attributes in constraint order.
    #[must_use]
    pub fn attributes(&self) -> Vec<Attribute> {
        self.constraints.iter().map(|c| c.attribute).collect()
    }

    /// Sum of all minimum counts; may exceed the admission cap since one
    /// person can satisfy several constraints at once.
    #[must_use]
    pub fn total_min_count(&self) -> u32 {
        self.constraints.iter().map(|c| c.min_count).sum()
    }
}
