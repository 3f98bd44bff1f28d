//! Disease progression.
//!
//! When someone is first infected, every future milestone of their illness is drawn at once
//! and written to a [`ProgressionRecord`]; the milestones that change their status are
//! pushed onto the queue as authoritative events. Delays are drawn from the
//! `ProgressionRng` stream in milestone order: onset, hospitalization, symptomatic, then the
//! death coin and its delay.
use log::trace;
use serde::{Deserialize, Serialize};

use crate::distributions::{DelayDistribution, Sampler};
use crate::engine::Engine;
use crate::error::EpiError;
use crate::event::{Mechanism, Milestone};
use crate::infection_status::InfectionStatus;
use crate::parameters::ProgressionDelays;
use crate::population::PersonId;
use crate::random::{ProgressionRng, RandomExt};

/// Milestone times of one infection. Written once, never revised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressionRecord {
    pub person_id: PersonId,
    /// Absent for people seeded directly into `Infectious`.
    pub exposure: Option<f64>,
    pub onset: f64,
    /// Absent when hospitalization comes first.
    pub symptomatic: Option<f64>,
    pub hospitalization: Option<f64>,
    pub death: Option<f64>,
}

/// [`ProgressionDelays`] resolved into distributions.
#[derive(Debug, Clone)]
pub struct ProgressionSampler {
    pub onset: DelayDistribution,
    pub symptomatic: DelayDistribution,
    pub hospitalization: DelayDistribution,
    pub death: DelayDistribution,
}

impl ProgressionSampler {
    pub fn resolve(delays: &ProgressionDelays, sampler: &mut Sampler) -> Result<Self, EpiError> {
        Ok(ProgressionSampler {
            onset: sampler.resolve(&delays.onset)?,
            symptomatic: sampler.resolve(&delays.symptomatic)?,
            hospitalization: sampler.resolve(&delays.hospitalization)?,
            death: sampler.resolve(&delays.death)?,
        })
    }
}

fn schedule(
    engine: &mut Engine,
    time: f64,
    person_id: PersonId,
    milestone: Milestone,
    issued: f64,
) {
    let mut event = engine.new_event(
        time,
        person_id,
        milestone,
        Some(person_id),
        Mechanism::DiseaseProgression,
    );
    event.issued_time = issued;
    engine.add_event(event);
}

/// Draws the progression of a new infection that starts at `event_time` in `initial_status`,
/// records it and schedules its status-changing milestones.
///
/// Starting in `Contraction` schedules the infectious onset; starting in `Infectious` means
/// the onset is `event_time` itself and the caller is handling it. Any other starting status
/// is an error, as is a second record for the same person.
pub fn generate_disease_progression(
    engine: &mut Engine,
    person_id: PersonId,
    initial_status: InfectionStatus,
    event_time: f64,
) -> Result<ProgressionRecord, EpiError> {
    if engine.progression_record(person_id).is_some() {
        return Err(EpiError::EpiError(format!(
            "disease progression for person {person_id} is already recorded"
        )));
    }
    let severity = engine.severity(person_id)?;
    let delays = engine.progression_sampler().clone();

    let (exposure, onset) = match initial_status {
        InfectionStatus::Contraction => {
            let onset = event_time + engine.sample_distr(ProgressionRng, &delays.onset);
            schedule(engine, onset, person_id, Milestone::InfectiousOnset, event_time);
            (Some(event_time), onset)
        }
        InfectionStatus::Infectious => (None, event_time),
        other => return Err(EpiError::InvalidInitialStatus(other)),
    };

    let hospitalization = if severity.is_hospitalized() {
        let time = onset + engine.sample_distr(ProgressionRng, &delays.hospitalization);
        schedule(engine, time, person_id, Milestone::Hospitalization, onset);
        Some(time)
    } else {
        None
    };

    let symptomatic = onset + engine.sample_distr(ProgressionRng, &delays.symptomatic);
    let symptomatic = if hospitalization.is_none_or(|h| symptomatic < h) {
        schedule(engine, symptomatic, person_id, Milestone::Symptomatic, onset);
        Some(symptomatic)
    } else {
        None
    };

    let death_probability = engine.parameters().death_probability.get(severity);
    let death = if engine.sample_bool(ProgressionRng, death_probability) {
        Some(onset + engine.sample_distr(ProgressionRng, &delays.death))
    } else {
        None
    };

    let record = ProgressionRecord {
        person_id,
        exposure,
        onset,
        symptomatic,
        hospitalization,
        death,
    };
    trace!("progression for person {person_id} ({severity}): {record:?}");
    engine.record_progression(record);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::distributions::DelayConfig;
    use crate::parameters::{DiseaseProgression, InitialConditions, Parameters, SeverityTable};
    use crate::population::{Person, Population, Severity};

    fn engine_with(severity: Severity, death_probability: f64) -> Engine {
        let mut person = Person::new(0, 0);
        person.expected_case_severity = Some(severity);
        let parameters = Parameters {
            initial_conditions: InitialConditions::List(Vec::new()),
            death_probability: SeverityTable {
                asymptomatic: death_probability,
                mild: death_probability,
                severe: death_probability,
                critical: death_probability,
            },
            disease_progression: DiseaseProgression::uniform(ProgressionDelays {
                onset: DelayConfig::constant(2.0),
                symptomatic: DelayConfig::constant(3.0),
                hospitalization: DelayConfig::constant(1.0),
                death: DelayConfig::constant(0.0),
            }),
            ..Default::default()
        };
        Engine::new(parameters, Population::new(vec![person]).unwrap(), None).unwrap()
    }

    #[test]
    fn contraction_schedules_onset_and_symptoms() {
        let mut engine = engine_with(Severity::Mild, 0.0);
        let record = generate_disease_progression(
            &mut engine,
            PersonId(0),
            InfectionStatus::Contraction,
            1.0,
        )
        .unwrap();

        assert_eq!(record.exposure, Some(1.0));
        assert_approx_eq!(record.onset, 3.0);
        assert_approx_eq!(record.symptomatic.unwrap(), 6.0);
        assert_eq!(record.hospitalization, None);
        assert_eq!(record.death, None);

        let milestones: Vec<Milestone> = engine
            .remaining_events()
            .iter()
            .map(|event| event.milestone)
            .collect();
        assert_eq!(
            milestones,
            vec![Milestone::InfectiousOnset, Milestone::Symptomatic]
        );
        let onset = engine.remaining_events()[0];
        assert_eq!(onset.initiated_by, Some(PersonId(0)));
        assert_eq!(onset.initiated_through, Mechanism::DiseaseProgression);
        assert_approx_eq!(onset.issued_time, 1.0);
    }

    #[test]
    fn hospitalization_supersedes_later_symptoms() {
        let mut engine = engine_with(Severity::Critical, 1.0);
        let record =
            generate_disease_progression(&mut engine, PersonId(0), InfectionStatus::Infectious, 0.0)
                .unwrap();

        assert_eq!(record.exposure, None);
        assert_approx_eq!(record.onset, 0.0);
        assert_approx_eq!(record.hospitalization.unwrap(), 1.0);
        // Symptoms at 3.0 would come after hospital at 1.0.
        assert_eq!(record.symptomatic, None);
        // Zero-delay death lands on the onset.
        assert_approx_eq!(record.death.unwrap(), record.onset);

        let milestones: Vec<Milestone> = engine
            .remaining_events()
            .iter()
            .map(|event| event.milestone)
            .collect();
        assert_eq!(milestones, vec![Milestone::Hospitalization]);
    }

    #[test]
    fn records_are_never_overwritten() {
        let mut engine = engine_with(Severity::Mild, 0.0);
        generate_disease_progression(&mut engine, PersonId(0), InfectionStatus::Contraction, 0.0)
            .unwrap();
        let again = generate_disease_progression(
            &mut engine,
            PersonId(0),
            InfectionStatus::Infectious,
            1.0,
        );
        assert!(matches!(again, Err(EpiError::EpiError(_))));
        assert_eq!(engine.progression_log().len(), 1);
    }

    #[test]
    fn other_initial_statuses_are_rejected() {
        let mut engine = engine_with(Severity::Mild, 0.0);
        let result =
            generate_disease_progression(&mut engine, PersonId(0), InfectionStatus::StayHome, 0.0);
        assert!(matches!(
            result,
            Err(EpiError::InvalidInitialStatus(InfectionStatus::StayHome))
        ));
        assert!(engine.progression_log().is_empty());
    }
}
