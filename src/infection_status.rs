//! The per-person infection state machine.
//!
//! Statuses only ever move forward along
//! `Healthy < Contraction < Infectious < StayHome < Hospital`. The [`StatusTable`] enforces
//! this: an attempted move to the same or a weaker status is refused and leaves the table
//! unchanged, which is how stale and duplicate events become no-ops.
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use crate::population::PersonId;
use crate::HashMap;

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InfectionStatus {
    #[default]
    Healthy,
    Contraction,
    Infectious,
    StayHome,
    Hospital,
}

impl InfectionStatus {
    /// Statuses in which a person can pass the infection on to someone else.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            InfectionStatus::Contraction | InfectionStatus::Infectious | InfectionStatus::StayHome
        )
    }
}

/// A status change applied by the engine
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub time: f64,
    pub person_id: PersonId,
    pub from: InfectionStatus,
    pub to: InfectionStatus,
}

/// Current status of every person. Anyone never touched is `Healthy`.
#[derive(Default)]
pub struct StatusTable {
    statuses: HashMap<PersonId, InfectionStatus>,
    transitions: Vec<StatusTransition>,
}

impl StatusTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, person_id: PersonId) -> InfectionStatus {
        self.statuses
            .get(&person_id)
            .copied()
            .unwrap_or_default()
    }

    /// Moves `person_id` to `next` if that is strictly forward. Returns whether the table
    /// changed.
    pub fn advance(&mut self, person_id: PersonId, next: InfectionStatus, time: f64) -> bool {
        let current = self.get(person_id);
        if next <= current {
            return false;
        }
        self.statuses.insert(person_id, next);
        self.transitions.push(StatusTransition {
            time,
            person_id,
            from: current,
            to: next,
        });
        true
    }

    /// Every accepted change, in the order it was applied.
    #[must_use]
    pub fn transitions(&self) -> &[StatusTransition] {
        &self.transitions
    }

    /// Number of people currently in `status`. Does not count never-touched `Healthy` people.
    #[must_use]
    pub fn count(&self, status: InfectionStatus) -> usize {
        self.statuses.values().filter(|s| **s == status).count()
    }
}
