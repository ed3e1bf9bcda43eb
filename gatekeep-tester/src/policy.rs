use std::fmt;

use gatekeep_game::{Constraint, Person};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;

/// What a policy sees when a person reaches the door.
#[derive(Debug, Clone, Copy)]
pub struct DoorView<'a> {
    pub person: &'a Person,
    pub constraints: &'a [Constraint],
    pub admitted: u32,
    pub admit_cap: u32,
}

impl DoorView<'_> {
    fn remaining_capacity(&self) -> u32 {
        self.admit_cap.saturating_sub(self.admitted)
    }

    fn total_outstanding(&self) -> u32 {
        self.constraints.iter().map(Constraint::outstanding).sum()
    }

    fn helps_unmet_constraint(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| !c.is_met() && self.person.has(c.attribute))
    }
}

/// Policy interface for automated admission decisions.
pub trait AdmissionPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// `true` admits the person, `false` turns them away.
    fn admit(&mut self, view: &DoorView<'_>) -> bool;
}

/// Built-in admission strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    AcceptAll,
    Greedy,
    Random,
}

impl PolicyKind {
    pub const ALL: [Self; 3] = [Self::AcceptAll, Self::Greedy, Self::Random];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AcceptAll => "accept-all",
            Self::Greedy => "greedy",
            Self::Random => "random",
        }
    }

    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(token.trim()))
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn AdmissionPolicy + Send> {
        match self {
            Self::AcceptAll => Box::new(AcceptAllPolicy),
            Self::Greedy => Box::new(GreedyPolicy),
            Self::Random => Box::new(RandomPolicy::new(seed)),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct AcceptAllPolicy;
struct GreedyPolicy;

struct RandomPolicy {
    rng: ChaCha20Rng,
}

impl RandomPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl AdmissionPolicy for AcceptAllPolicy {
    fn name(&self) -> &'static str {
        "AcceptAll"
    }

    fn admit(&mut self, _view: &DoorView<'_>) -> bool {
        true
    }
}

impl AdmissionPolicy for GreedyPolicy {
    fn name(&self) -> &'static str {
        "Greedy"
    }

    fn admit(&mut self, view: &DoorView<'_>) -> bool {
        view.helps_unmet_constraint() || view.remaining_capacity() > view.total_outstanding()
    }
}

impl AdmissionPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "Random"
    }

    fn admit(&mut self, _view: &DoorView<'_>) -> bool {
        self.rng.gen_bool(0.5)
    }
}
