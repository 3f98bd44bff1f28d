//! Seeding the queue before a run: initial conditions and imported cases.
//!
//! Seeded events have no initiating person. They are applied as long as the subject's status
//! allows it: a pre-exposure seed needs a `Healthy` subject, an onset seed a `Healthy` or
//! `Contraction` one.
use log::info;

use crate::engine::Engine;
use crate::error::EpiError;
use crate::event::{Mechanism, Milestone};
use crate::infection_status::InfectionStatus;
use crate::parameters::{ImportFunction, ImportIntensity, InitialConditions};
use crate::population::PersonId;
use crate::random::{sample_multiple_from_known_length, ImportRng, RandomExt, SeedingRng};
use crate::{HashSet, HashSetExt};

/// The milestone a seeded person starts at.
pub fn seed_milestone(status: InfectionStatus) -> Result<Milestone, EpiError> {
    match status {
        InfectionStatus::Contraction => Ok(Milestone::Exposure),
        InfectionStatus::Infectious => Ok(Milestone::InfectiousOnset),
        other => Err(EpiError::InvalidInitialStatus(other)),
    }
}

fn push_seed(
    engine: &mut Engine,
    time: f64,
    person_id: PersonId,
    milestone: Milestone,
    mechanism: Mechanism,
) {
    let event = engine.new_event(time, person_id, milestone, None, mechanism);
    engine.add_event(event);
}

/// Queues the configured initial conditions. Returns the number of seeded events.
///
/// A literal list seeds each entry at its own time and may override the person's drawn
/// severity. A random selection draws distinct people without replacement, contraction
/// first, and seeds them all at the current time.
pub fn seed_initial_conditions(engine: &mut Engine) -> Result<usize, EpiError> {
    let initial_conditions = engine.parameters().initial_conditions.clone();
    let seeded = match initial_conditions {
        InitialConditions::List(conditions) => {
            for condition in &conditions {
                if !engine.population().contains(condition.person_index) {
                    return Err(EpiError::UnknownPerson(condition.person_index));
                }
                let milestone = seed_milestone(condition.infection_status)?;
                if condition.contraction_time < engine.current_time() {
                    return Err(EpiError::InvalidInitialConditions(format!(
                        "person {} is seeded at {}, before the current time {}",
                        condition.person_index,
                        condition.contraction_time,
                        engine.current_time()
                    )));
                }
                if let Some(severity) = condition.expected_case_severity {
                    engine.set_severity(condition.person_index, severity)?;
                }
                push_seed(
                    engine,
                    condition.contraction_time,
                    condition.person_index,
                    milestone,
                    Mechanism::InitialConditions,
                );
            }
            conditions.len()
        }
        InitialConditions::Random(selection) => {
            let cardinalities = selection.cardinalities;
            let requested = cardinalities.contraction + cardinalities.infectious;
            if requested > engine.population().len() {
                return Err(EpiError::InvalidInitialConditions(format!(
                    "cannot select {requested} people from a population of {}",
                    engine.population().len()
                )));
            }
            let mut remaining: Vec<usize> = (0..engine.population().len()).collect();
            for (status, count) in [
                (InfectionStatus::Contraction, cardinalities.contraction),
                (InfectionStatus::Infectious, cardinalities.infectious),
            ] {
                if count == 0 {
                    continue;
                }
                let selected = engine.sample(SeedingRng, |rng| {
                    sample_multiple_from_known_length(rng, remaining.iter().copied(), count)
                });
                let milestone = seed_milestone(status)?;
                let time = engine.current_time();
                for position in &selected {
                    let person_id = engine.population().at(*position).id;
                    push_seed(engine, time, person_id, milestone, Mechanism::InitialConditions);
                }
                // Later draws only see people not picked yet
                let mut taken = HashSet::with_capacity(selected.len());
                taken.extend(selected);
                remaining.retain(|position| !taken.contains(position));
            }
            requested
        }
    };
    info!("seeded {seeded} initial condition event(s)");
    Ok(seeded)
}

/// Arrival times of imported cases: arrival `i` in `1..=cap` happens where the cumulative
/// intensity `F(t)` first reaches `i`. Times before `start_time` are moved to `start_time`.
///
/// Fails if an arrival would never happen in floating point, e.g. a polynomial intensity
/// with a tiny rate, whose roots overflow to infinity.
#[allow(clippy::cast_precision_loss)]
pub fn import_arrival_times(
    intensity: &ImportIntensity,
    start_time: f64,
) -> Result<Vec<f64>, EpiError> {
    let ImportIntensity {
        function,
        multiplier,
        rate,
        cap,
        ..
    } = *intensity;
    let mut times = Vec::with_capacity(cap);
    for i in 1..=cap {
        let level = i as f64 / multiplier;
        let time = match function {
            ImportFunction::NoImport => return Ok(Vec::new()),
            // multiplier * exp(rate * t) = i
            ImportFunction::Exponential => level.ln() / rate,
            // multiplier * t^rate = i
            ImportFunction::Polynomial => level.powf(1.0 / rate),
        };
        if !time.is_finite() {
            return Err(EpiError::InvalidParameter(format!(
                "import arrival {i} of {cap} has no finite time \
                 (function {function:?}, multiplier {multiplier}, rate {rate})"
            )));
        }
        times.push(time.max(start_time));
    }
    Ok(times)
}

/// Queues imported cases. Each arrival lands on a uniformly drawn person and is an
/// infectious onset with the configured probability, a pre-exposure otherwise. Returns the
/// number of arrivals.
pub fn seed_imports(engine: &mut Engine) -> Result<usize, EpiError> {
    let intensity = engine.parameters().import_intensity;
    let times = import_arrival_times(&intensity, engine.current_time())?;
    if times.is_empty() {
        return Ok(0);
    }
    let population_size = engine.population().len();
    if population_size == 0 {
        return Err(EpiError::InvalidParameter(
            "cannot import cases into an empty population".to_string(),
        ));
    }

    let mut infectious = 0;
    for time in &times {
        let position = engine.sample_range(ImportRng, 0..population_size);
        let person_id = engine.population().at(position).id;
        let milestone = if engine.sample_bool(ImportRng, intensity.infectious) {
            infectious += 1;
            Milestone::InfectiousOnset
        } else {
            Milestone::Exposure
        };
        push_seed(engine, *time, person_id, milestone, Mechanism::ImportIntensity);
    }
    info!(
        "seeded {} import(s), {infectious} already infectious",
        times.len()
    );
    Ok(times.len())
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::parameters::{
        Cardinalities, InitialCondition, Parameters, RandomSelection, SelectionAlgorithm,
    };
    use crate::population::{Person, Population, Severity};

    fn population(n: usize) -> Population {
        Population::new((0..n).map(|id| Person::new(id, id as u64)).collect()).unwrap()
    }

    #[test]
    fn exponential_arrivals_solve_the_intensity() {
        let intensity = ImportIntensity {
            function: ImportFunction::Exponential,
            multiplier: 1.0,
            rate: 0.5,
            cap: 3,
            infectious: 0.0,
        };
        let times = import_arrival_times(&intensity, 0.0).unwrap();
        assert_eq!(times.len(), 3);
        // exp(0.5 * t) = 1 at t = 0
        assert_approx_eq!(times[0], 0.0);
        assert_approx_eq!(times[1], 2.0_f64.ln() / 0.5);
        assert_approx_eq!(times[2], 3.0_f64.ln() / 0.5);
    }

    #[test]
    fn polynomial_arrivals_are_clamped_to_start() {
        let intensity = ImportIntensity {
            function: ImportFunction::Polynomial,
            multiplier: 4.0,
            rate: 2.0,
            cap: 4,
            infectious: 0.0,
        };
        // 4 * t^2 = i  =>  t = sqrt(i / 4)
        let times = import_arrival_times(&intensity, 0.75).unwrap();
        assert_approx_eq!(times[0], 0.75);
        assert_approx_eq!(times[1], 0.75);
        assert_approx_eq!(times[2], 0.75_f64.sqrt());
        assert_approx_eq!(times[3], 1.0);
    }

    #[test]
    fn no_import_has_no_arrivals() {
        let intensity = ImportIntensity {
            cap: 10,
            ..Default::default()
        };
        assert!(import_arrival_times(&intensity, 0.0).unwrap().is_empty());
    }

    #[test]
    fn overflowing_arrivals_are_a_configuration_error() {
        let intensity = ImportIntensity {
            function: ImportFunction::Polynomial,
            multiplier: 1.0,
            rate: 0.001,
            cap: 3,
            infectious: 0.0,
        };
        // 3^1000 overflows.
        assert!(matches!(
            import_arrival_times(&intensity, 0.0),
            Err(EpiError::InvalidParameter(_))
        ));

        let parameters = Parameters {
            initial_conditions: InitialConditions::List(Vec::new()),
            import_intensity: intensity,
            ..Default::default()
        };
        assert!(parameters.validate().is_ok());
        assert!(matches!(
            Engine::new(parameters, population(4), None),
            Err(EpiError::InvalidParameter(_))
        ));
    }

    #[test]
    fn infectious_imports_are_onsets() {
        let parameters = Parameters {
            initial_conditions: InitialConditions::List(Vec::new()),
            import_intensity: ImportIntensity {
                function: ImportFunction::Exponential,
                multiplier: 1.0,
                rate: 1.0,
                cap: 6,
                infectious: 1.0,
            },
            ..Default::default()
        };
        let engine = Engine::new(parameters, population(10), None).unwrap();
        let events = engine.remaining_events();
        assert_eq!(events.len(), 6);
        assert!(events.iter().all(|e| e.milestone == Milestone::InfectiousOnset
            && e.initiated_by.is_none()
            && e.initiated_through == Mechanism::ImportIntensity));
    }

    #[test]
    fn literal_conditions_override_severity() {
        let parameters = Parameters {
            initial_conditions: InitialConditions::List(vec![
                InitialCondition {
                    person_index: PersonId(2),
                    contraction_time: 4.0,
                    infection_status: InfectionStatus::Infectious,
                    expected_case_severity: Some(Severity::Critical),
                },
                InitialCondition {
                    person_index: PersonId(1),
                    contraction_time: 1.0,
                    infection_status: InfectionStatus::Contraction,
                    expected_case_severity: None,
                },
            ]),
            ..Default::default()
        };
        let engine = Engine::new(parameters, population(3), None).unwrap();
        assert_eq!(engine.severity(PersonId(2)).unwrap(), Severity::Critical);

        let events = engine.remaining_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].person_id, PersonId(1));
        assert_eq!(events[0].milestone, Milestone::Exposure);
        assert_eq!(events[1].person_id, PersonId(2));
        assert_eq!(events[1].milestone, Milestone::InfectiousOnset);
        assert_eq!(events[1].initiated_through, Mechanism::InitialConditions);
    }

    #[test]
    fn unknown_seeded_person_fails_setup() {
        let parameters = Parameters::default();
        assert!(matches!(
            Engine::new(parameters, Population::new(vec![Person::new(5, 0)]).unwrap(), None),
            Err(EpiError::UnknownPerson(PersonId(0)))
        ));
    }

    #[test]
    fn random_selection_draws_distinct_people() {
        let parameters = Parameters {
            initial_conditions: InitialConditions::Random(RandomSelection {
                selection_algorithm: SelectionAlgorithm::RandomSelection,
                cardinalities: Cardinalities {
                    contraction: 4,
                    infectious: 3,
                },
            }),
            ..Default::default()
        };
        let engine = Engine::new(parameters, population(8), None).unwrap();
        let events = engine.remaining_events();
        assert_eq!(events.len(), 7);
        let exposures = events
            .iter()
            .filter(|e| e.milestone == Milestone::Exposure)
            .count();
        assert_eq!(exposures, 4);
        let mut people = HashSet::new();
        people.extend(events.iter().map(|e| e.person_id));
        assert_eq!(people.len(), 7);
        assert!(events.iter().all(|e| e.time == 0.0));
    }

    #[test]
    fn random_selection_cannot_exceed_population() {
        let parameters = Parameters {
            initial_conditions: InitialConditions::Random(RandomSelection {
                selection_algorithm: SelectionAlgorithm::RandomSelection,
                cardinalities: Cardinalities {
                    contraction: 2,
                    infectious: 2,
                },
            }),
            ..Default::default()
        };
        assert!(matches!(
            Engine::new(parameters, population(3), None),
            Err(EpiError::InvalidInitialConditions(_))
        ));
    }
}
