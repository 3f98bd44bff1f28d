use assert_approx_eq::assert_approx_eq;
use epi_kernels::distributions::DelayConfig;
use epi_kernels::parameters::{
    Cardinalities, DiseaseProgression, ImportFunction, ImportIntensity, InitialCondition,
    InitialConditions, ProgressionDelays, RandomSelection, SelectionAlgorithm, SeverityTable,
    ThresholdType, TransmissionProbabilities,
};
use epi_kernels::{
    Engine, InfectionStatus, KernelType, Mechanism, Milestone, Parameters, Person, PersonId,
    Population, Severity, StopReason,
};
use epi_kernels::{HashMap, HashMapExt};

fn one_household(n: usize) -> Population {
    Population::new((0..n).map(|id| Person::new(id, 0)).collect()).unwrap()
}

fn households_of_four(n: usize) -> Population {
    Population::new((0..n).map(|id| Person::new(id, (id / 4) as u64)).collect()).unwrap()
}

fn seed(person: usize, status: InfectionStatus) -> InitialConditions {
    InitialConditions::List(vec![InitialCondition {
        person_index: PersonId(person),
        contraction_time: 0.0,
        infection_status: status,
        expected_case_severity: None,
    }])
}

#[test]
fn no_transmission_only_affects_the_seed() {
    let parameters = Parameters {
        transmission_probabilities: TransmissionProbabilities::uniform(0.0),
        ..Default::default()
    };
    let mut engine = Engine::new(parameters, one_household(2), None).unwrap();
    let summary = engine.run().unwrap();

    assert_eq!(summary.reason, StopReason::QueueExhausted);
    assert_eq!(summary.affected_people, 1);
    assert_ne!(engine.status(PersonId(0)), InfectionStatus::Healthy);
    assert_eq!(engine.status(PersonId(1)), InfectionStatus::Healthy);
    assert_eq!(engine.transmission_log().len(), 1);
}

#[test]
fn household_members_are_infected_at_once() {
    let mut people: Vec<Person> = (0..4).map(|id| Person::new(id, 0)).collect();
    people[0].expected_case_severity = Some(Severity::Mild);
    let parameters = Parameters {
        transmission_probabilities: TransmissionProbabilities {
            household: 1e5,
            constant: 0.0,
            ..Default::default()
        },
        disease_progression: DiseaseProgression::uniform(ProgressionDelays {
            onset: DelayConfig::constant(10.0),
            symptomatic: DelayConfig::constant(0.001),
            hospitalization: DelayConfig::constant(5.0),
            death: DelayConfig::constant(20.0),
        }),
        initial_conditions: seed(0, InfectionStatus::Infectious),
        ..Default::default()
    };
    let mut engine = Engine::new(parameters, Population::new(people).unwrap(), None).unwrap();
    engine.run().unwrap();

    let household_edges: Vec<_> = engine
        .transmission_log()
        .iter()
        .filter(|edge| edge.kernel == Mechanism::Kernel(KernelType::Household))
        .collect();
    assert_eq!(household_edges.len(), 3);
    for edge in household_edges {
        assert_eq!(edge.source, Some(PersonId(0)));
        assert_approx_eq!(edge.contraction_time, 0.0, 1e-3);
    }
    assert_eq!(engine.affected_people(), 4);
}

#[test]
fn zero_length_household_window_infects_nobody() {
    let mut people: Vec<Person> = (0..4).map(|id| Person::new(id, 0)).collect();
    people[0].expected_case_severity = Some(Severity::Mild);
    let parameters = Parameters {
        transmission_probabilities: TransmissionProbabilities {
            household: 1.0,
            constant: 0.0,
            ..Default::default()
        },
        disease_progression: DiseaseProgression::uniform(ProgressionDelays {
            onset: DelayConfig::constant(0.0),
            symptomatic: DelayConfig::constant(0.0),
            hospitalization: DelayConfig::constant(5.0),
            death: DelayConfig::constant(20.0),
        }),
        initial_conditions: seed(0, InfectionStatus::Infectious),
        ..Default::default()
    };
    let mut engine = Engine::new(parameters, Population::new(people).unwrap(), None).unwrap();
    let summary = engine.run().unwrap();

    // Onset and stay-home coincide, so the expected household contact count is zero.
    let record = engine.progression_record(PersonId(0)).unwrap();
    assert_approx_eq!(record.symptomatic.unwrap(), record.onset);
    assert!(engine
        .transmission_log()
        .iter()
        .all(|edge| edge.kernel != Mechanism::Kernel(KernelType::Household)));
    assert_eq!(summary.affected_people, 1);
    for member in 1..4 {
        assert_eq!(engine.status(PersonId(member)), InfectionStatus::Healthy);
    }
}

#[test]
fn imports_are_queued_before_the_run() {
    let parameters = Parameters {
        initial_conditions: InitialConditions::List(Vec::new()),
        import_intensity: ImportIntensity {
            function: ImportFunction::Exponential,
            multiplier: 1.0,
            rate: 1.0,
            cap: 5,
            infectious: 0.0,
        },
        ..Default::default()
    };
    let engine = Engine::new(parameters, households_of_four(20), None).unwrap();
    let events = engine.remaining_events();

    assert_eq!(events.len(), 5);
    assert!(events.iter().all(|event| event.milestone == Milestone::Exposure
        && event.initiated_through == Mechanism::ImportIntensity
        && event.initiated_by.is_none()));
    assert!(events.windows(2).all(|pair| pair[0].time < pair[1].time));
}

#[test]
fn zero_delay_death_lands_on_onset() {
    let mut person = Person::new(0, 0);
    person.expected_case_severity = Some(Severity::Critical);
    let parameters = Parameters {
        death_probability: SeverityTable {
            asymptomatic: 0.0,
            mild: 0.0,
            severe: 0.0,
            critical: 1.0,
        },
        disease_progression: DiseaseProgression::uniform(ProgressionDelays {
            death: DelayConfig::constant(0.0),
            ..Default::default()
        }),
        initial_conditions: seed(0, InfectionStatus::Infectious),
        ..Default::default()
    };
    let mut engine = Engine::new(parameters, Population::new(vec![person]).unwrap(), None).unwrap();
    engine.run().unwrap();

    let record = engine.progression_record(PersonId(0)).unwrap();
    assert!(record.hospitalization.is_some());
    assert_approx_eq!(record.death.unwrap(), record.onset);
    assert_eq!(engine.deaths(), 1);
    assert_eq!(engine.prevalence(), 0);
}

fn outbreak(seed_value: u64) -> Engine {
    let parameters = Parameters {
        random_seed: seed_value,
        transmission_probabilities: TransmissionProbabilities {
            household: 0.8,
            constant: 1.5,
            ..Default::default()
        },
        disease_progression: DiseaseProgression::uniform(ProgressionDelays {
            onset: DelayConfig::Exponential { lambda: 0.5 },
            symptomatic: DelayConfig::Lognormal {
                mean: 3.0_f64.ln(),
                sigma: 0.3,
            },
            hospitalization: DelayConfig::Lognormal {
                mean: 5.0_f64.ln(),
                sigma: 0.3,
            },
            death: DelayConfig::Poisson { lambda: 8.0 },
        }),
        initial_conditions: InitialConditions::Random(RandomSelection {
            selection_algorithm: SelectionAlgorithm::RandomSelection,
            cardinalities: Cardinalities {
                contraction: 2,
                infectious: 3,
            },
        }),
        ..Default::default()
    };
    let mut engine = Engine::new(parameters, households_of_four(200), None).unwrap();
    engine.run().unwrap();
    engine
}

#[test]
fn statuses_only_move_forward() {
    let engine = outbreak(11);
    let mut last = HashMap::new();
    for transition in engine.status_transitions() {
        assert!(transition.to > transition.from);
        let previous = last.insert(transition.person_id, (transition.to, transition.time));
        if let Some((status, time)) = previous {
            assert_eq!(transition.from, status);
            assert!(transition.time >= time);
        }
    }
}

#[test]
fn every_infection_has_one_record_and_one_edge() {
    let engine = outbreak(12);
    let affected = engine.affected_people();
    assert!(affected > 1);
    assert_eq!(engine.progression_log().len(), affected);
    assert_eq!(engine.transmission_log().len(), affected);

    let mut targets: Vec<PersonId> = engine.transmission_log().iter().map(|e| e.target).collect();
    targets.sort();
    targets.dedup();
    assert_eq!(targets.len(), affected);

    let healthy = engine
        .individuals()
        .iter()
        .filter(|row| row.infection_status == InfectionStatus::Healthy)
        .count();
    assert_eq!(healthy + affected, 200);
}

#[test]
fn transmissions_come_from_infectious_people() {
    let engine = outbreak(13);
    for edge in engine.transmission_log() {
        let Some(source) = edge.source else {
            assert_eq!(edge.kernel, Mechanism::InitialConditions);
            continue;
        };
        let record = engine.progression_record(source).unwrap();
        assert!(record.onset <= edge.contraction_time);
        if edge.kernel == Mechanism::Kernel(KernelType::Household) {
            // Households of four: same household, at most three infections each.
            assert_eq!(source.0 / 4, edge.target.0 / 4);
        }
    }
    for source in 0..200 {
        let household_infections = engine
            .transmission_log()
            .iter()
            .filter(|edge| {
                edge.source == Some(PersonId(source))
                    && edge.kernel == Mechanism::Kernel(KernelType::Household)
            })
            .count();
        assert!(household_infections <= 3);
    }
}

#[test]
fn cumulative_threshold_ends_the_run_early() {
    let parameters = Parameters {
        stop_simulation_threshold: 5,
        stop_simulation_threshold_type: ThresholdType::Cumulative,
        transmission_probabilities: TransmissionProbabilities::uniform(50.0),
        disease_progression: DiseaseProgression::uniform(ProgressionDelays {
            onset: DelayConfig::constant(1.0),
            symptomatic: DelayConfig::constant(2.0),
            hospitalization: DelayConfig::constant(5.0),
            death: DelayConfig::constant(10.0),
        }),
        initial_conditions: InitialConditions::List(vec![InitialCondition {
            person_index: PersonId(0),
            contraction_time: 0.0,
            infection_status: InfectionStatus::Infectious,
            expected_case_severity: Some(Severity::Mild),
        }]),
        ..Default::default()
    };
    let mut engine = Engine::new(parameters, households_of_four(100), None).unwrap();
    let summary = engine.run().unwrap();

    assert_eq!(summary.reason, StopReason::ThresholdReached);
    assert_eq!(summary.affected_people, 5);
    assert_eq!(engine.transmission_log().len(), 5);
    assert!(!engine.remaining_events().is_empty());
}
