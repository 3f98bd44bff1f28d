//! Events stored in the engine's queue.
//!
//! An event names a person, the progression milestone it would move them to, and how it came
//! about. Events raised by the disease progression or by seeding are *authoritative*: the
//! transition has already been decided and only the state-machine guards apply. Events raised
//! by a kernel are *candidates* and are checked again against the live state when popped.
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EpiError;
use crate::kernels::KernelType;
use crate::parameters::EpidemicStatus;
use crate::population::PersonId;

/// The progression milestone an event moves its subject to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Milestone {
    /// Pre-exposure marker: the subject contracts the disease.
    Exposure,
    InfectiousOnset,
    /// Symptoms send the subject home.
    Symptomatic,
    Hospitalization,
}

/// What raised an event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mechanism {
    Kernel(KernelType),
    DiseaseProgression,
    InitialConditions,
    ImportIntensity,
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mechanism::Kernel(kernel) => write!(f, "{kernel}"),
            Mechanism::DiseaseProgression => write!(f, "disease_progression"),
            Mechanism::InitialConditions => write!(f, "initial_conditions"),
            Mechanism::ImportIntensity => write!(f, "import_intensity"),
        }
    }
}

impl FromStr for Mechanism {
    type Err = EpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disease_progression" => Ok(Mechanism::DiseaseProgression),
            "initial_conditions" => Ok(Mechanism::InitialConditions),
            "import_intensity" => Ok(Mechanism::ImportIntensity),
            kernel => kernel
                .parse::<KernelType>()
                .map(Mechanism::Kernel)
                .map_err(|_| EpiError::InvalidParameter(format!("unknown mechanism {s}"))),
        }
    }
}

// Written as a single name so logs and reports show `household`, not `{"kernel": ...}`.
impl Serialize for Mechanism {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Mechanism {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: f64,
    pub person_id: PersonId,
    pub milestone: Milestone,
    pub initiated_by: Option<PersonId>,
    pub initiated_through: Mechanism,
    /// Simulation time at which the event was created
    pub issued_time: f64,
    pub epidemic_status: EpidemicStatus,
}

impl Event {
    /// A kernel-proposed exposure that has to be revalidated when it is popped.
    #[must_use]
    pub fn is_candidate(&self) -> bool {
        self.initiated_by.is_some() && self.initiated_through != Mechanism::DiseaseProgression
    }

    /// Seeded from outside the population: initial conditions or an import.
    #[must_use]
    pub fn is_seeded(&self) -> bool {
        self.initiated_by.is_none() && self.initiated_through != Mechanism::DiseaseProgression
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(initiated_by: Option<PersonId>, initiated_through: Mechanism) -> Event {
        Event {
            time: 1.0,
            person_id: PersonId(0),
            milestone: Milestone::Exposure,
            initiated_by,
            initiated_through,
            issued_time: 0.0,
            epidemic_status: EpidemicStatus::NotDetected,
        }
    }

    #[test]
    fn classification() {
        let candidate = event(Some(PersonId(0)), Mechanism::Kernel(KernelType::Household));
        assert!(candidate.is_candidate());
        assert!(!candidate.is_seeded());

        let progression = event(Some(PersonId(0)), Mechanism::DiseaseProgression);
        assert!(!progression.is_candidate());
        assert!(!progression.is_seeded());

        let import = event(None, Mechanism::ImportIntensity);
        assert!(!import.is_candidate());
        assert!(import.is_seeded());
    }

    #[test]
    fn mechanism_names() {
        for mechanism in [
            Mechanism::Kernel(KernelType::Constant),
            Mechanism::Kernel(KernelType::Friendship),
            Mechanism::DiseaseProgression,
            Mechanism::InitialConditions,
            Mechanism::ImportIntensity,
        ] {
            let name = mechanism.to_string();
            assert_eq!(name.parse::<Mechanism>().unwrap(), mechanism);
        }
        assert_eq!(Mechanism::Kernel(KernelType::Household).to_string(), "household");
        assert!("telepathy".parse::<Mechanism>().is_err());
    }

    #[test]
    fn events_serialize_flat() {
        let event = event(Some(PersonId(4)), Mechanism::Kernel(KernelType::Household));
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["initiated_through"], "household");
        assert_eq!(json["milestone"], "exposure");
        assert_eq!(json["initiated_by"], 4);
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
