//! The population and household tables.
//!
//! Both tables are read-only inputs. People are looked up by [`PersonId`]; ids do not have to
//! be contiguous, but each must be unique. Positions in the table (the order people were
//! given in) are what random draws over the whole population index into.
use std::fmt::{self, Display};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::error::EpiError;
use crate::{HashMap, HashMapExt};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub usize);

impl Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HouseholdId(pub u64);

impl Display for HouseholdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Expected case severity, drawn once per person.
#[derive(
    Copy,
    Clone,
    Debug,
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
pub enum Severity {
    Asymptomatic,
    Mild,
    Severe,
    Critical,
}

impl Severity {
    /// Severe and critical cases are the ones that reach hospital.
    #[must_use]
    pub fn is_hospitalized(self) -> bool {
        matches!(self, Severity::Severe | Severity::Critical)
    }

    /// All severities in table order.
    pub fn all() -> impl Iterator<Item = Severity> {
        Severity::iter()
    }
}

/// One row of the population table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub household_id: HouseholdId,
    #[serde(default)]
    pub uses_transport: bool,
    #[serde(default)]
    pub employed: bool,
    /// Precomputed severity; drawn from the case-severity distribution when absent.
    #[serde(default)]
    pub expected_case_severity: Option<Severity>,
}

impl Person {
    #[must_use]
    pub fn new(id: usize, household_id: u64) -> Self {
        Person {
            id: PersonId(id),
            household_id: HouseholdId(household_id),
            uses_transport: false,
            employed: false,
            expected_case_severity: None,
        }
    }
}

pub struct Population {
    people: Vec<Person>,
    positions: HashMap<PersonId, usize>,
}

impl Population {
    /// Builds the table, rejecting duplicate ids.
    pub fn new(people: Vec<Person>) -> Result<Self, EpiError> {
        let mut positions = HashMap::with_capacity(people.len());
        for (position, person) in people.iter().enumerate() {
            if positions.insert(person.id, position).is_some() {
                return Err(EpiError::InvalidParameter(format!(
                    "person {} appears twice in the population",
                    person.id
                )));
            }
        }
        Ok(Population { people, positions })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.people.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    #[must_use]
    pub fn get(&self, person_id: PersonId) -> Option<&Person> {
        self.position(person_id).map(|position| &self.people[position])
    }

    #[must_use]
    pub fn contains(&self, person_id: PersonId) -> bool {
        self.positions.contains_key(&person_id)
    }

    #[must_use]
    pub fn position(&self, person_id: PersonId) -> Option<usize> {
        self.positions.get(&person_id).copied()
    }

    /// The person at `position` in table order. Panics if out of range.
    #[must_use]
    pub fn at(&self, position: usize) -> &Person {
        &self.people[position]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Person> {
        self.people.iter()
    }
}

/// Household id to member ids. Only used to restrict the household kernel's candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Households {
    members: IndexMap<HouseholdId, Vec<PersonId>>,
}

impl Households {
    #[must_use]
    pub fn new(members: IndexMap<HouseholdId, Vec<PersonId>>) -> Self {
        Households { members }
    }

    /// Groups people by their household id, in order of first appearance.
    #[must_use]
    pub fn from_population(population: &Population) -> Self {
        let mut members: IndexMap<HouseholdId, Vec<PersonId>> = IndexMap::new();
        for person in population.iter() {
            members
                .entry(person.household_id)
                .or_default()
                .push(person.id);
        }
        Households { members }
    }

    #[must_use]
    pub fn members(&self, household_id: HouseholdId) -> &[PersonId] {
        self.members.get(&household_id).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HouseholdId, &Vec<PersonId>)> {
        self.members.iter()
    }

    /// Every member must be in the population, and every person's household must exist.
    pub fn validate(&self, population: &Population) -> Result<(), EpiError> {
        if let Some(unknown) = self
            .members
            .values()
            .flatten()
            .find(|person_id| !population.contains(**person_id))
        {
            return Err(EpiError::UnknownPerson(*unknown));
        }
        if let Some(person) = population
            .iter()
            .find(|person| !self.members.contains_key(&person.household_id))
        {
            return Err(EpiError::InvalidParameter(format!(
                "household {} of person {} is not in the household table",
                person.household_id, person.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Vec<Person> {
        vec![
            Person::new(10, 1),
            Person::new(11, 2),
            Person::new(12, 1),
            Person::new(13, 3),
        ]
    }

    #[test]
    fn lookup_by_id_and_position() {
        let population = Population::new(people()).unwrap();
        assert_eq!(population.len(), 4);
        assert_eq!(population.position(PersonId(12)), Some(2));
        assert_eq!(population.at(3).id, PersonId(13));
        assert!(population.get(PersonId(0)).is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut people = people();
        people.push(Person::new(10, 4));
        assert!(matches!(
            Population::new(people),
            Err(EpiError::InvalidParameter(_))
        ));
    }

    #[test]
    fn households_group_in_first_appearance_order() {
        let population = Population::new(people()).unwrap();
        let households = Households::from_population(&population);
        assert_eq!(households.len(), 3);
        assert_eq!(
            households.members(HouseholdId(1)),
            &[PersonId(10), PersonId(12)]
        );
        let order: Vec<_> = households.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![HouseholdId(1), HouseholdId(2), HouseholdId(3)]);
        assert!(households.members(HouseholdId(99)).is_empty());
        households.validate(&population).unwrap();
    }

    #[test]
    fn household_table_must_match_population() {
        let population = Population::new(people()).unwrap();
        let mut members = IndexMap::new();
        members.insert(HouseholdId(1), vec![PersonId(10), PersonId(99)]);
        assert!(matches!(
            Households::new(members).validate(&population),
            Err(EpiError::UnknownPerson(PersonId(99)))
        ));

        let mut members = IndexMap::new();
        members.insert(HouseholdId(1), vec![PersonId(10), PersonId(12)]);
        assert!(matches!(
            Households::new(members).validate(&population),
            Err(EpiError::InvalidParameter(_))
        ));
    }

    #[test]
    fn severity_names_and_order() {
        let names: Vec<String> = Severity::all().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["asymptomatic", "mild", "severe", "critical"]);
        assert!(Severity::Critical.is_hospitalized());
        assert!(!Severity::Mild.is_hospitalized());
        let parsed: Severity = serde_json::from_str("\"severe\"").unwrap();
        assert_eq!(parsed, Severity::Severe);
    }
}
