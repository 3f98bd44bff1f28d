//! Transmission kernels.
//!
//! A kernel turns one person's infectious window into candidate exposure events for the
//! people they meet through one contact structure. Kernels run once per person, when that
//! person becomes infectious, and only ever push candidates onto the queue: whether a
//! candidate actually infects anyone is decided when it is popped.
//!
//! The expected number of contacts is `window length * rate * fear`, the actual number a
//! Poisson draw with that mean. Contact times are uniform over the window.
use log::{debug, trace, warn};
use rand_distr::Poisson;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use crate::engine::Engine;
use crate::event::{Event, Mechanism, Milestone};
use crate::infection_status::InfectionStatus;
use crate::population::PersonId;
use crate::random::{
    sample_indexes_excluding, sample_multiple_from_known_length, ConstantRng, HouseholdRng,
    RandomExt,
};

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KernelType {
    Household,
    Constant,
    Transport,
    Employment,
    Friendship,
    Sporadic,
}

/// Behavioural damping of contacts. Constant until fear dynamics are modelled.
#[must_use]
pub fn fear(_engine: &Engine, _kernel: KernelType) -> f64 {
    1.0
}

/// Contact rate of `kernel`: its transmission probability scaled by fear.
#[must_use]
pub fn gamma(engine: &Engine, kernel: KernelType) -> f64 {
    engine.parameters().transmission_probabilities.get(kernel) * fear(engine, kernel)
}

/// The kernels that apply to `person_id`, in the order they are evaluated.
#[must_use]
pub fn applicable_kernels(engine: &Engine, person_id: PersonId) -> Vec<KernelType> {
    let Some(person) = engine.population().get(person_id) else {
        return Vec::new();
    };
    let mut kernels = Vec::with_capacity(6);
    if person.uses_transport {
        kernels.push(KernelType::Transport);
    }
    if person.employed {
        kernels.push(KernelType::Employment);
    }
    if engine.households().members(person.household_id).len() > 1 {
        kernels.push(KernelType::Household);
    }
    kernels.extend([
        KernelType::Friendship,
        KernelType::Sporadic,
        KernelType::Constant,
    ]);
    kernels
}

/// Runs every applicable kernel for a person who just became infectious. Returns the number
/// of candidate events scheduled.
pub fn apply_kernels(engine: &mut Engine, infector: PersonId) -> usize {
    applicable_kernels(engine, infector)
        .into_iter()
        .map(|kernel| generate_contacts(engine, kernel, infector).len())
        .sum()
}

/// Schedules the candidate exposures `infector` causes through `kernel` and returns them.
pub fn generate_contacts(
    engine: &mut Engine,
    kernel: KernelType,
    infector: PersonId,
) -> Vec<Event> {
    let events = match kernel {
        KernelType::Household => household_contacts(engine, infector),
        KernelType::Constant => constant_contacts(engine, infector),
        KernelType::Transport
        | KernelType::Employment
        | KernelType::Friendship
        | KernelType::Sporadic => Vec::new(),
    };
    trace!(
        "{kernel} kernel scheduled {} candidate(s) for person {infector}",
        events.len()
    );
    events
}

/// Expected contacts over `[start, end]`, or `None` if there is nothing to draw.
fn expected_contacts(engine: &Engine, kernel: KernelType, start: f64, end: f64) -> Option<f64> {
    let mean = (end - start) * gamma(engine, kernel);
    (mean.is_finite() && mean > 0.0).then_some(mean)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn contact_count<R: crate::random::RngId + 'static>(engine: &Engine, rng: R, mean: f64) -> usize
where
    R::RngType: rand::Rng,
{
    match Poisson::new(mean) {
        Ok(poisson) => engine.sample_distr(rng, poisson) as usize,
        Err(e) => {
            warn!("cannot draw a contact count with mean {mean}: {e}");
            0
        }
    }
}

fn schedule_candidates<R: crate::random::RngId + 'static>(
    engine: &mut Engine,
    rng: R,
    kernel: KernelType,
    infector: PersonId,
    targets: Vec<PersonId>,
    (start, end): (f64, f64),
) -> Vec<Event>
where
    R::RngType: rand::Rng,
{
    let mut events = Vec::new();
    for target in targets {
        // Re-checked when the event is popped; this only saves queue space.
        if engine.status(target) != InfectionStatus::Healthy {
            continue;
        }
        let time = engine.sample_range(rng, start..=end);
        let event = engine.new_event(
            time,
            target,
            Milestone::Exposure,
            Some(infector),
            Mechanism::Kernel(kernel),
        );
        engine.add_event(event);
        events.push(event);
    }
    events
}

/// Household kernel: the window runs from onset to hospitalization, or to staying home when
/// there is no hospitalization. The count is capped at the other household members.
fn household_contacts(engine: &mut Engine, infector: PersonId) -> Vec<Event> {
    let Some(record) = engine.progression_record(infector).copied() else {
        warn!("household kernel for person {infector} without a progression record");
        return Vec::new();
    };
    let start = record.onset;
    let end = record.hospitalization.or(record.symptomatic).unwrap_or(start);
    let Some(mean) = expected_contacts(engine, KernelType::Household, start, end) else {
        return Vec::new();
    };

    let Some(person) = engine.population().get(infector) else {
        return Vec::new();
    };
    let others: Vec<PersonId> = engine
        .households()
        .members(person.household_id)
        .iter()
        .copied()
        .filter(|member| *member != infector)
        .collect();

    let count = contact_count(engine, HouseholdRng, mean).min(others.len());
    if count == 0 {
        return Vec::new();
    }
    let targets = engine.sample(HouseholdRng, |rng| {
        sample_multiple_from_known_length(rng, others, count)
    });
    schedule_candidates(
        engine,
        HouseholdRng,
        KernelType::Household,
        infector,
        targets,
        (start, end),
    )
}

/// Constant (global) kernel: the window runs from onset to staying home, or to
/// hospitalization when staying home was skipped. Anyone but the infector can be drawn. The
/// count is not capped; a draw larger than the population selects everyone.
fn constant_contacts(engine: &mut Engine, infector: PersonId) -> Vec<Event> {
    let Some(record) = engine.progression_record(infector).copied() else {
        warn!("constant kernel for person {infector} without a progression record");
        return Vec::new();
    };
    let start = record.onset;
    let end = record.symptomatic.or(record.hospitalization).unwrap_or(start);
    let Some(mean) = expected_contacts(engine, KernelType::Constant, start, end) else {
        return Vec::new();
    };

    let count = contact_count(engine, ConstantRng, mean);
    if count == 0 {
        return Vec::new();
    }
    let population_size = engine.population().len();
    let Some(excluded) = engine.population().position(infector) else {
        return Vec::new();
    };
    if count >= population_size {
        debug!(
            "constant kernel drew {count} contacts for person {infector} from a population of {population_size}"
        );
    }
    let positions = engine.sample(ConstantRng, |rng| {
        sample_indexes_excluding(rng, population_size, excluded, count)
    });
    let targets = positions
        .into_iter()
        .map(|position| engine.population().at(position).id)
        .collect();
    schedule_candidates(
        engine,
        ConstantRng,
        KernelType::Constant,
        infector,
        targets,
        (start, end),
    )
}
