//! Attribute vocabulary, generated persons, and the statistics that shape them.

use serde::de::{Error as _, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::constants::MATRIX_TOLERANCE;

/// Boolean trait a generated person may or may not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Young,
    WellDressed,
    TechnoLover,
    WellConnected,
    Creative,
    BerlinLocal,
    UndergroundVeteran,
    International,
    FashionForward,
    QueerFriendly,
    VinylCollector,
    GermanSpeaker,
}

impl Attribute {
    pub const ALL: [Self; 12] = [
        Self::Young,
        Self::WellDressed,
        Self::TechnoLover,
        Self::WellConnected,
        Self::Creative,
        Self::BerlinLocal,
        Self::UndergroundVeteran,
        Self::International,
        Self::FashionForward,
        Self::QueerFriendly,
        Self::VinylCollector,
        Self::GermanSpeaker,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Young => "young",
            Self::WellDressed => "well_dressed",
            Self::TechnoLover => "techno_lover",
            Self::WellConnected => "well_connected",
            Self::Creative => "creative",
            Self::BerlinLocal => "berlin_local",
            Self::UndergroundVeteran => "underground_veteran",
            Self::International => "international",
            Self::FashionForward => "fashion_forward",
            Self::QueerFriendly => "queer_friendly",
            Self::VinylCollector => "vinyl_collector",
            Self::GermanSpeaker => "german_speaker",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attribute {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|attribute| attribute.as_str() == s)
            .ok_or(())
    }
}

/// Attribute values of one generated person, in statistics order.
pub type PersonTraits = SmallVec<[(Attribute, bool); 6]>;

/// A generated person. Immutable once drawn.
///
/// Serializes as a JSON object keyed by attribute name, in statistics order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Person {
    traits: PersonTraits,
}

impl Person {
    #[must_use]
    pub const fn new(traits: PersonTraits) -> Self {
        Self { traits }
    }

    /// Value of `attribute`, or `None` when the person's scenario does not track it.
    #[must_use]
    pub fn get(&self, attribute: Attribute) -> Option<bool> {
        self.traits
            .iter()
            .find(|(candidate, _)| *candidate == attribute)
            .map(|(_, value)| *value)
    }

    /// Whether the person carries `attribute`; untracked attributes read as absent.
    #[must_use]
    pub fn has(&self, attribute: Attribute) -> bool {
        self.get(attribute).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Attribute, bool)> + '_ {
        self.traits.iter().copied()
    }

    pub fn attributes(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.traits.iter().map(|(attribute, _)| *attribute)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.traits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }
}

impl Serialize for Person {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.traits.len()))?;
        for (attribute, value) in &self.traits {
            map.serialize_entry(attribute, value)?;
        }
        map.end()
    }
}

struct PersonVisitor;

impl<'de> Visitor<'de> for PersonVisitor {
    type Value = Person;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of attribute names to booleans")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Person, A::Error> {
        let mut traits = PersonTraits::new();
        while let Some((attribute, value)) = access.next_entry::<Attribute, bool>()? {
            if traits.iter().any(|(seen, _)| *seen == attribute) {
                return Err(A::Error::custom(format_args!("duplicate attribute `{attribute}`")));
            }
            traits.push((attribute, value));
        }
        Ok(Person::new(traits))
    }
}

impl<'de> Deserialize<'de> for Person {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PersonVisitor)
    }
}

/// Errors raised when attribute statistics are malformed.
#[derive(Debug, Error, PartialEq)]
pub enum StatisticsError {
    #[error("expected {expected} frequencies, got {actual}")]
    FrequencyCount { expected: usize, actual: usize },
    #[error("correlation matrix must be {expected}x{expected}")]
    MatrixShape { expected: usize },
    #[error("attribute {0} is listed more than once")]
    DuplicateAttribute(Attribute),
    #[error("frequency for {attribute} must be between 0 and 1 (got {value})")]
    FrequencyRange { attribute: Attribute, value: f64 },
    #[error("correlation {row}/{col} must be between -1 and 1 (got {value})")]
    CorrelationRange {
        row: Attribute,
        col: Attribute,
        value: f64,
    },
    #[error("self-correlation for {attribute} must be 1 (got {value})")]
    Diagonal { attribute: Attribute, value: f64 },
    #[error("correlation {row}/{col} differs from {col}/{row}")]
    Asymmetric { row: Attribute, col: Attribute },
}

/// Target marginal frequencies and pairwise correlations for a scenario's attributes.
///
/// Storage is dense: `frequencies[i]` and `correlations[i][j]` refer to
/// `attributes[i]` and `attributes[j]`. The correlation matrix is symmetric
/// with a unit diagonal but is not required to be positive-semidefinite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeStatistics {
    pub attributes: Vec<Attribute>,
    pub frequencies: Vec<f64>,
    pub correlations: Vec<Vec<f64>>,
}

impl AttributeStatistics {
    /// Statistics over no attributes at all.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            attributes: Vec::new(),
            frequencies: Vec::new(),
            correlations: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    #[must_use]
    pub fn position(&self, attribute: Attribute) -> Option<usize> {
        self.attributes.iter().position(|a| *a == attribute)
    }

    #[must_use]
    pub fn frequency(&self, attribute: Attribute) -> Option<f64> {
        self.position(attribute)
            .and_then(|idx| self.frequencies.get(idx).copied())
    }

    #[must_use]
    pub fn correlation(&self, a: Attribute, b: Attribute) -> Option<f64> {
        let row = self.position(a)?;
        let col = self.position(b)?;
        self.correlations.get(row)?.get(col).copied()
    }

    /// Check shape, ranges, symmetry, and the unit diagonal.
    ///
    /// # Errors
    ///
    /// Returns the first [`StatisticsError`] found.
    pub fn validate(&self) -> Result<(), StatisticsError> {
        let n = self.attributes.len();
        if self.frequencies.len() != n {
            return Err(StatisticsError::FrequencyCount {
                expected: n,
                actual: self.frequencies.len(),
            });
        }
        if self.correlations.len() != n || self.correlations.iter().any(|row| row.len() != n) {
            return Err(StatisticsError::MatrixShape { expected: n });
        }

        let mut seen = HashSet::with_capacity(n);
        for attribute in &self.attributes {
            if !seen.insert(*attribute) {
                return Err(StatisticsError::DuplicateAttribute(*attribute));
            }
        }

        for (attribute, value) in self.attributes.iter().zip(&self.frequencies) {
            if !(0.0..=1.0).contains(value) {
                return Err(StatisticsError::FrequencyRange {
                    attribute: *attribute,
                    value: *value,
                });
            }
        }

        for (i, row) in self.correlations.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                let (row_attr, col_attr) = (self.attributes[i], self.attributes[j]);
                if !(-1.0..=1.0).contains(value) {
                    return Err(StatisticsError::CorrelationRange {
                        row: row_attr,
                        col: col_attr,
                        value: *value,
                    });
                }
                if i == j && (value - 1.0).abs() > MATRIX_TOLERANCE {
                    return Err(StatisticsError::Diagonal {
                        attribute: row_attr,
                        value: *value,
                    });
                }
                if j > i && (value - self.correlations[j][i]).abs() > MATRIX_TOLERANCE {
                    return Err(StatisticsError::Asymmetric {
                        row: row_attr,
                        col: col_attr,
                    });
                }
            }
        }
        Ok(())
    }
}
