//! The simulation engine.
//!
//! An [`Engine`] owns everything that changes during a run: the event queue, the status
//! table, the progression records, the transmission log and the random streams. It is built
//! from a validated [`Parameters`] snapshot and the two input tables, seeds its queue, and
//! then runs a pop-apply loop until the queue is empty or the stop threshold is reached.
//!
//! ```rust
//! use epi_kernels::{Engine, Parameters, Person, Population, StopReason};
//!
//! let population = Population::new((0..10).map(|id| Person::new(id, 0)).collect()).unwrap();
//! let mut engine = Engine::new(Parameters::default(), population, None).unwrap();
//! let summary = engine.run().unwrap();
//! assert!(summary.affected_people >= 1);
//! assert_eq!(summary.reason, StopReason::QueueExhausted);
//! ```
use std::fmt::{self, Display};

use indexmap::IndexMap;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::distributions::Sampler;
use crate::error::EpiError;
use crate::event::{Event, Mechanism, Milestone};
use crate::infection_seeder::{seed_imports, seed_initial_conditions};
use crate::infection_status::{InfectionStatus, StatusTable, StatusTransition};
use crate::kernels::{apply_kernels, KernelType};
use crate::parameters::{Parameters, ThresholdType};
use crate::plan::Queue;
use crate::population::{HouseholdId, Households, PersonId, Population, Severity};
use crate::progression::{generate_disease_progression, ProgressionRecord, ProgressionSampler};
use crate::random::{RandomExt, RandomState, SeverityRng};

/// One accepted infection. The order of these records is the order of infection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransmissionEdge {
    /// `None` for seeded infections
    pub source: Option<PersonId>,
    pub target: PersonId,
    pub contraction_time: f64,
    pub kernel: Mechanism,
}

/// A population row with the run's final state merged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualRecord {
    pub id: PersonId,
    pub household_id: HouseholdId,
    pub uses_transport: bool,
    pub employed: bool,
    pub expected_case_severity: Severity,
    pub infection_status: InfectionStatus,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    QueueExhausted,
    ThresholdReached,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::QueueExhausted => write!(f, "no events left in the queue"),
            StopReason::ThresholdReached => write!(f, "stop threshold reached"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub reason: StopReason,
    pub final_time: f64,
    pub events_processed: u64,
    pub affected_people: usize,
    pub prevalence: usize,
}

/// Receives the engine's progress after every processed event.
pub trait ProgressObserver {
    fn on_event(&mut self, current_time: f64, affected_people: usize);

    fn on_finish(&mut self, _summary: &RunSummary) {}
}

impl ProgressObserver for () {
    fn on_event(&mut self, _current_time: f64, _affected_people: usize) {}
}

pub struct Engine {
    parameters: Parameters,
    population: Population,
    households: Households,
    severities: Vec<Severity>,
    progression_sampler: ProgressionSampler,
    random: RandomState,
    queue: Queue<Event>,
    current_time: f64,
    statuses: StatusTable,
    progression: IndexMap<PersonId, ProgressionRecord>,
    transmissions: Vec<TransmissionEdge>,
    affected_people: usize,
    // Death times not yet reached, for prevalence
    pending_deaths: Queue<PersonId>,
    deceased: usize,
    events_processed: u64,
}

impl RandomExt for Engine {
    fn random_state(&self) -> &RandomState {
        &self.random
    }

    fn random_state_mut(&mut self) -> &mut RandomState {
        &mut self.random
    }
}

impl Engine {
    /// Validates the parameters and tables, draws everyone's expected case severity and
    /// seeds the queue. Households are grouped from the population when not given.
    ///
    /// Every configuration error is reported here, before any event is processed.
    pub fn new(
        parameters: Parameters,
        population: Population,
        households: Option<Households>,
    ) -> Result<Self, EpiError> {
        info!("setting up engine (seed {})", parameters.random_seed);
        parameters.validate()?;
        if population.is_empty() {
            return Err(EpiError::InvalidParameter(
                "the population is empty".to_string(),
            ));
        }
        let households = households.unwrap_or_else(|| Households::from_population(&population));
        households.validate(&population)?;

        let mut sampler = Sampler::new();
        let progression_sampler =
            ProgressionSampler::resolve(parameters.progression_delays()?, &mut sampler)?;
        debug!("fitted {} reference sample(s)", sampler.fitted_count());
        let seed = parameters.random_seed;

        let mut engine = Engine {
            current_time: parameters.start_time,
            random: RandomState::default(),
            parameters,
            population,
            households,
            severities: Vec::new(),
            progression_sampler,
            queue: Queue::new(),
            statuses: StatusTable::new(),
            progression: IndexMap::new(),
            transmissions: Vec::new(),
            affected_people: 0,
            pending_deaths: Queue::new(),
            deceased: 0,
            events_processed: 0,
        };
        engine.init_random(seed);
        engine.draw_severities();
        seed_initial_conditions(&mut engine)?;
        seed_imports(&mut engine)?;
        info!(
            "engine ready: {} people, {} households, {} seeded events",
            engine.population.len(),
            engine.households.len(),
            engine.queue.len()
        );
        Ok(engine)
    }

    fn draw_severities(&mut self) {
        let weights = self.parameters.case_severity_distribution.values();
        let all: Vec<Severity> = Severity::all().collect();
        let mut severities = Vec::with_capacity(self.population.len());
        for person in self.population.iter() {
            let severity = match person.expected_case_severity {
                Some(severity) => severity,
                None => all[self.sample_weighted(SeverityRng, &weights[..])],
            };
            severities.push(severity);
        }
        self.severities = severities;
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    #[must_use]
    pub fn population(&self) -> &Population {
        &self.population
    }

    #[must_use]
    pub fn households(&self) -> &Households {
        &self.households
    }

    #[must_use]
    pub fn progression_sampler(&self) -> &ProgressionSampler {
        &self.progression_sampler
    }

    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    #[must_use]
    pub fn status(&self, person_id: PersonId) -> InfectionStatus {
        self.statuses.get(person_id)
    }

    pub fn severity(&self, person_id: PersonId) -> Result<Severity, EpiError> {
        self.population
            .position(person_id)
            .map(|position| self.severities[position])
            .ok_or(EpiError::UnknownPerson(person_id))
    }

    pub(crate) fn set_severity(
        &mut self,
        person_id: PersonId,
        severity: Severity,
    ) -> Result<(), EpiError> {
        let position = self
            .population
            .position(person_id)
            .ok_or(EpiError::UnknownPerson(person_id))?;
        self.severities[position] = severity;
        Ok(())
    }

    #[must_use]
    pub fn progression_record(&self, person_id: PersonId) -> Option<&ProgressionRecord> {
        self.progression.get(&person_id)
    }

    pub(crate) fn record_progression(&mut self, record: ProgressionRecord) {
        if let Some(death) = record.death {
            self.pending_deaths.add_plan(death, record.person_id);
        }
        self.progression.insert(record.person_id, record);
    }

    /// An event issued now, under the current epidemic status.
    #[must_use]
    pub fn new_event(
        &self,
        time: f64,
        person_id: PersonId,
        milestone: Milestone,
        initiated_by: Option<PersonId>,
        initiated_through: Mechanism,
    ) -> Event {
        Event {
            time,
            person_id,
            milestone,
            initiated_by,
            initiated_through,
            issued_time: self.current_time,
            epidemic_status: self.parameters.epidemic_status,
        }
    }

    /// Adds an event to the queue.
    ///
    /// # Panics
    ///
    /// If the event time is not finite or lies before the current time.
    pub fn add_event(&mut self, event: Event) {
        if !event.time.is_finite() || event.time < self.current_time {
            panic!(
                "Invalid event time {} (current time {})",
                event.time, self.current_time
            );
        }
        self.queue.add_plan(event.time, event);
    }

    /// Re-queues events saved from an earlier run, e.g. the output of
    /// [`Engine::remaining_events`].
    pub fn restore_events(
        &mut self,
        events: impl IntoIterator<Item = Event>,
    ) -> Result<usize, EpiError> {
        let mut restored = 0;
        for event in events {
            if !self.population.contains(event.person_id) {
                return Err(EpiError::UnknownPerson(event.person_id));
            }
            if let Some(initiator) = event.initiated_by {
                if !self.population.contains(initiator) {
                    return Err(EpiError::UnknownPerson(initiator));
                }
            }
            if !event.time.is_finite() || event.time < self.current_time {
                return Err(EpiError::InvalidParameter(format!(
                    "cannot restore an event at {} before the current time {}",
                    event.time, self.current_time
                )));
            }
            self.queue.add_plan(event.time, event);
            restored += 1;
        }
        debug!("restored {restored} event(s)");
        Ok(restored)
    }

    /// Infects `person_id` right now, as if a seeded event for `status` had just been popped.
    pub fn seed_infection(
        &mut self,
        person_id: PersonId,
        status: InfectionStatus,
    ) -> Result<(), EpiError> {
        if !self.population.contains(person_id) {
            return Err(EpiError::UnknownPerson(person_id));
        }
        let milestone = crate::infection_seeder::seed_milestone(status)?;
        let event = self.new_event(
            self.current_time,
            person_id,
            milestone,
            None,
            Mechanism::InitialConditions,
        );
        self.apply_seeded(&event)
    }

    /// Runs until the queue is empty or the stop threshold is reached.
    pub fn run(&mut self) -> Result<RunSummary, EpiError> {
        self.run_with_observer(&mut ())
    }

    pub fn run_with_observer(
        &mut self,
        observer: &mut impl ProgressObserver,
    ) -> Result<RunSummary, EpiError> {
        let reason = loop {
            if !self.pop_and_apply_event()? {
                break StopReason::QueueExhausted;
            }
            observer.on_event(self.current_time, self.affected_people);
            if self.threshold_reached() {
                info!(
                    "the outbreak reached {} ({:?}) at time {}",
                    self.parameters.stop_simulation_threshold,
                    self.parameters.stop_simulation_threshold_type,
                    self.current_time
                );
                break StopReason::ThresholdReached;
            }
        };
        let summary = self.summary(reason);
        info!(
            "run finished: {reason} after {} events, {} affected",
            summary.events_processed, summary.affected_people
        );
        debug!(
            "at time {}: {} infectious, {} staying home, {} in hospital",
            summary.final_time,
            self.statuses.count(InfectionStatus::Infectious),
            self.statuses.count(InfectionStatus::StayHome),
            self.statuses.count(InfectionStatus::Hospital)
        );
        observer.on_finish(&summary);
        Ok(summary)
    }

    fn summary(&self, reason: StopReason) -> RunSummary {
        RunSummary {
            reason,
            final_time: self.current_time,
            events_processed: self.events_processed,
            affected_people: self.affected_people,
            prevalence: self.prevalence(),
        }
    }

    fn threshold_reached(&self) -> bool {
        let value = match self.parameters.stop_simulation_threshold_type {
            ThresholdType::Cumulative => self.affected_people,
            ThresholdType::Prevalence => self.prevalence(),
        };
        value >= self.parameters.stop_simulation_threshold
    }

    /// Pops the earliest event and applies it. Returns `false` when the queue is empty.
    ///
    /// Events whose guard no longer holds are dropped. Errors only come from broken
    /// invariants in the progression bookkeeping.
    pub fn pop_and_apply_event(&mut self) -> Result<bool, EpiError> {
        let Some(plan) = self.queue.get_next_plan() else {
            debug!("event queue exhausted at {}", self.current_time);
            return Ok(false);
        };
        self.current_time = plan.time;
        self.events_processed += 1;
        self.retire_deaths();
        let event = plan.data;
        trace!("applying {event:?}");

        if event.is_seeded() {
            self.apply_seeded(&event)?;
            return Ok(true);
        }
        match event.milestone {
            Milestone::Exposure => self.apply_exposure(&event)?,
            Milestone::InfectiousOnset => self.apply_onset(&event),
            Milestone::Symptomatic => {
                if !self.advance_if(
                    &event,
                    &[InfectionStatus::Infectious],
                    InfectionStatus::StayHome,
                ) {
                    trace!("person {} is not infectious; stay-home dropped", event.person_id);
                }
            }
            Milestone::Hospitalization => {
                if !self.advance_if(
                    &event,
                    &[InfectionStatus::Infectious, InfectionStatus::StayHome],
                    InfectionStatus::Hospital,
                ) {
                    trace!("person {} cannot be hospitalized now; dropped", event.person_id);
                }
            }
        }
        Ok(true)
    }

    fn advance_if(&mut self, event: &Event, from: &[InfectionStatus], to: InfectionStatus) -> bool {
        from.contains(&self.status(event.person_id))
            && self.statuses.advance(event.person_id, to, self.current_time)
    }

    fn retire_deaths(&mut self) {
        while self
            .pending_deaths
            .next_time()
            .is_some_and(|time| time <= self.current_time)
        {
            self.pending_deaths.get_next_plan();
            self.deceased += 1;
        }
    }

    fn apply_seeded(&mut self, event: &Event) -> Result<(), EpiError> {
        let person_id = event.person_id;
        match (event.milestone, self.status(person_id)) {
            (Milestone::Exposure, InfectionStatus::Healthy) => {
                self.add_new_infection(person_id, InfectionStatus::Contraction, event)
            }
            (Milestone::InfectiousOnset, InfectionStatus::Healthy) => {
                self.add_new_infection(person_id, InfectionStatus::Infectious, event)
            }
            (Milestone::InfectiousOnset, InfectionStatus::Contraction) => {
                // Already infected: the onset just comes early.
                self.statuses
                    .advance(person_id, InfectionStatus::Infectious, self.current_time);
                apply_kernels(self, person_id);
                Ok(())
            }
            (Milestone::Exposure | Milestone::InfectiousOnset, status) => {
                debug!(
                    "{} for person {person_id} dropped: already {status}",
                    event.initiated_through
                );
                Ok(())
            }
            (milestone, status) => {
                warn!(
                    "seeded {milestone} for person {person_id} in status {status} is not supported; dropped"
                );
                Ok(())
            }
        }
    }

    fn apply_exposure(&mut self, event: &Event) -> Result<(), EpiError> {
        let (Some(source), Mechanism::Kernel(kernel)) =
            (event.initiated_by, event.initiated_through)
        else {
            warn!("exposure event {event:?} has no initiating kernel; dropped");
            return Ok(());
        };
        let target = event.person_id;
        if self.status(target) != InfectionStatus::Healthy {
            trace!("person {target} is no longer healthy; {kernel} exposure dropped");
            return Ok(());
        }
        let source_died = self
            .progression
            .get(&source)
            .and_then(|record| record.death)
            .is_some_and(|death| death <= self.current_time);
        if source_died {
            trace!("person {source} died before {kernel} exposure of {target}; dropped");
            return Ok(());
        }
        let source_status = self.status(source);
        let transmits = source_status.is_active()
            && (kernel == KernelType::Household || source_status != InfectionStatus::StayHome);
        if transmits {
            self.add_new_infection(target, InfectionStatus::Contraction, event)
        } else {
            trace!("person {source} is {source_status}; {kernel} exposure of {target} dropped");
            Ok(())
        }
    }

    fn apply_onset(&mut self, event: &Event) {
        let person_id = event.person_id;
        match self.status(person_id) {
            InfectionStatus::Contraction => {
                self.statuses
                    .advance(person_id, InfectionStatus::Infectious, self.current_time);
                apply_kernels(self, person_id);
            }
            status => warn!(
                "state machine: onset for person {person_id} who is already {status}; dropped"
            ),
        }
    }

    fn add_new_infection(
        &mut self,
        person_id: PersonId,
        status: InfectionStatus,
        event: &Event,
    ) -> Result<(), EpiError> {
        self.statuses.advance(person_id, status, self.current_time);
        self.transmissions.push(TransmissionEdge {
            source: event.initiated_by,
            target: person_id,
            contraction_time: self.current_time,
            kernel: event.initiated_through,
        });
        self.affected_people += 1;
        generate_disease_progression(self, person_id, status, self.current_time)?;
        if status == InfectionStatus::Infectious {
            apply_kernels(self, person_id);
        }
        Ok(())
    }

    /// Number of people who ever left `Healthy`.
    #[must_use]
    pub fn affected_people(&self) -> usize {
        self.affected_people
    }

    /// People currently infected: affected and not past their death time.
    #[must_use]
    pub fn prevalence(&self) -> usize {
        self.affected_people - self.deceased
    }

    #[must_use]
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    #[must_use]
    pub fn transmission_log(&self) -> &[TransmissionEdge] {
        &self.transmissions
    }

    /// Progression records in the order people were infected.
    #[must_use]
    pub fn progression_log(&self) -> &IndexMap<PersonId, ProgressionRecord> {
        &self.progression
    }

    #[must_use]
    pub fn status_transitions(&self) -> &[StatusTransition] {
        self.statuses.transitions()
    }

    /// The population table with final severity and status.
    #[must_use]
    pub fn individuals(&self) -> Vec<IndividualRecord> {
        self.population
            .iter()
            .zip(&self.severities)
            .map(|(person, severity)| IndividualRecord {
                id: person.id,
                household_id: person.household_id,
                uses_transport: person.uses_transport,
                employed: person.employed,
                expected_case_severity: *severity,
                infection_status: self.status(person.id),
            })
            .collect()
    }

    /// Pending events in the order they would be applied.
    #[must_use]
    pub fn remaining_events(&self) -> Vec<Event> {
        self.queue.pending().into_iter().map(|plan| *plan.data).collect()
    }

    /// Accepted infections per initiating mechanism, in order of first appearance.
    #[must_use]
    pub fn infections_by_kernel(&self) -> IndexMap<Mechanism, usize> {
        let mut counts = IndexMap::new();
        for edge in &self.transmissions {
            *counts.entry(edge.kernel).or_insert(0) += 1;
        }
        counts
    }

    /// People scheduled for hospital, whether or not the run got that far.
    #[must_use]
    pub fn hospitalizations(&self) -> usize {
        self.progression
            .values()
            .filter(|record| record.hospitalization.is_some())
            .count()
    }

    /// People drawn to die, whether or not the run got that far.
    #[must_use]
    pub fn deaths(&self) -> usize {
        self.progression
            .values()
            .filter(|record| record.death.is_some())
            .count()
    }

    /// Doubling times of the cumulative infection curve; see [`estimate_doubling_times`].
    #[must_use]
    pub fn doubling_times(&self, window: usize) -> Vec<(f64, f64)> {
        let mut times: Vec<f64> = self
            .transmissions
            .iter()
            .map(|edge| edge.contraction_time)
            .collect();
        times.sort_by(f64::total_cmp);
        estimate_doubling_times(&times, window)
    }
}

/// Estimates the doubling time along a sorted series of event times, where the `i`-th time
/// is when the cumulative count reached `i`. For each `i >= 1` with `i + window` in range it
/// returns `(t[i], (t[i + window] - t[i]) * ln 2 / ln((i + window) / i))`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn estimate_doubling_times(sorted_times: &[f64], window: usize) -> Vec<(f64, f64)> {
    if window == 0 || sorted_times.len() <= window {
        return Vec::new();
    }
    (1..sorted_times.len() - window)
        .map(|i| {
            let elapsed = sorted_times[i + window] - sorted_times[i];
            let growth = ((i + window) as f64 / i as f64).ln();
            (sorted_times[i], elapsed * std::f64::consts::LN_2 / growth)
        })
        .collect()
}
