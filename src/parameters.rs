//! The parameter snapshot a run is built from.
//!
//! `Parameters` deserializes from JSON with `serde`; every key is optional and falls back to
//! the model defaults. Unknown keys are ignored so parameter files shared with other tools
//! still load. Reading the file is the caller's business: hand the text to
//! [`Parameters::from_json`], which also validates it.
use serde::{Deserialize, Serialize};

use crate::distributions::DelayConfig;
use crate::error::EpiError;
use crate::infection_status::InfectionStatus;
use crate::kernels::KernelType;
use crate::population::{PersonId, Severity};

/// One value per expected case severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityTable<T> {
    pub asymptomatic: T,
    pub mild: T,
    pub severe: T,
    pub critical: T,
}

impl<T: Copy> SeverityTable<T> {
    #[must_use]
    pub fn get(&self, severity: Severity) -> T {
        match severity {
            Severity::Asymptomatic => self.asymptomatic,
            Severity::Mild => self.mild,
            Severity::Severe => self.severe,
            Severity::Critical => self.critical,
        }
    }

    /// Values in `Severity::all()` order.
    #[must_use]
    pub fn values(&self) -> [T; 4] {
        [self.asymptomatic, self.mild, self.severe, self.critical]
    }
}

/// Per-kernel transmission rate. It multiplies the length of the infectious window to give
/// the expected number of contacts, so it is not bounded by 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmissionProbabilities {
    pub household: f64,
    pub constant: f64,
    pub transport: f64,
    pub employment: f64,
    pub friendship: f64,
    pub sporadic: f64,
}

impl Default for TransmissionProbabilities {
    fn default() -> Self {
        TransmissionProbabilities {
            household: 1.0,
            constant: 1.0,
            transport: 1.0,
            employment: 1.0,
            friendship: 1.0,
            sporadic: 1.0,
        }
    }
}

impl TransmissionProbabilities {
    #[must_use]
    pub fn get(&self, kernel: KernelType) -> f64 {
        match kernel {
            KernelType::Household => self.household,
            KernelType::Constant => self.constant,
            KernelType::Transport => self.transport,
            KernelType::Employment => self.employment,
            KernelType::Friendship => self.friendship,
            KernelType::Sporadic => self.sporadic,
        }
    }

    /// Every kernel at the same rate.
    #[must_use]
    pub fn uniform(rate: f64) -> Self {
        TransmissionProbabilities {
            household: rate,
            constant: rate,
            transport: rate,
            employment: rate,
            friendship: rate,
            sporadic: rate,
        }
    }
}

/// Delay distributions for each progression milestone, measured from contraction (onset) or
/// from onset (everything else).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionDelays {
    #[serde(rename = "t0")]
    pub onset: DelayConfig,
    #[serde(rename = "t1")]
    pub symptomatic: DelayConfig,
    #[serde(rename = "t2")]
    pub hospitalization: DelayConfig,
    #[serde(rename = "tdeath")]
    pub death: DelayConfig,
}

impl ProgressionDelays {
    fn validate(&self) -> Result<(), EpiError> {
        self.onset.validate()?;
        self.symptomatic.validate()?;
        self.hospitalization.validate()?;
        self.death.validate()
    }
}

/// Coarse global mode that selects the progression delays.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EpidemicStatus {
    #[default]
    NotDetected,
    Detected,
}

/// Progression delays keyed by epidemic status, with an optional `default` fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseProgression {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ProgressionDelays>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_detected: Option<ProgressionDelays>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected: Option<ProgressionDelays>,
}

impl Default for DiseaseProgression {
    fn default() -> Self {
        DiseaseProgression {
            default: None,
            not_detected: Some(ProgressionDelays::default()),
            detected: Some(ProgressionDelays::default()),
        }
    }
}

impl DiseaseProgression {
    /// Every status uses the same delays.
    #[must_use]
    pub fn uniform(delays: ProgressionDelays) -> Self {
        DiseaseProgression {
            default: Some(delays),
            not_detected: None,
            detected: None,
        }
    }

    /// The delays for `status`, falling back to `default`.
    #[must_use]
    pub fn for_status(&self, status: EpidemicStatus) -> Option<&ProgressionDelays> {
        let specific = match status {
            EpidemicStatus::NotDetected => self.not_detected.as_ref(),
            EpidemicStatus::Detected => self.detected.as_ref(),
        };
        specific.or(self.default.as_ref())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdType {
    /// People currently infected: out of `Healthy` and not yet past their death time.
    #[default]
    Prevalence,
    /// Everyone ever infected.
    Cumulative,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportFunction {
    #[default]
    NoImport,
    /// `F(t) = multiplier * exp(rate * t)`
    Exponential,
    /// `F(t) = multiplier * t^rate`
    Polynomial,
}

/// External arrivals. Arrival `i` in `1..=cap` happens when the cumulative intensity `F(t)`
/// reaches `i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportIntensity {
    pub function: ImportFunction,
    pub multiplier: f64,
    pub rate: f64,
    pub cap: usize,
    /// Probability that an arrival is already infectious rather than just exposed.
    pub infectious: f64,
}

impl Default for ImportIntensity {
    fn default() -> Self {
        ImportIntensity {
            function: ImportFunction::NoImport,
            multiplier: 1.0,
            rate: 1.0,
            cap: 0,
            infectious: 0.0,
        }
    }
}

/// One literal seeded infection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialCondition {
    pub person_index: PersonId,
    pub contraction_time: f64,
    pub infection_status: InfectionStatus,
    /// Overrides the drawn severity for this person.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_case_severity: Option<Severity>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionAlgorithm {
    RandomSelection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cardinalities {
    pub contraction: usize,
    pub infectious: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSelection {
    pub selection_algorithm: SelectionAlgorithm,
    pub cardinalities: Cardinalities,
}

/// Either a literal list of seeded people, or a number of people to draw at random.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitialConditions {
    List(Vec<InitialCondition>),
    Random(RandomSelection),
}

impl Default for InitialConditions {
    fn default() -> Self {
        InitialConditions::List(vec![InitialCondition {
            person_index: PersonId(0),
            contraction_time: 0.0,
            infection_status: InfectionStatus::Contraction,
            expected_case_severity: None,
        }])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub random_seed: u64,
    pub start_time: f64,
    pub stop_simulation_threshold: usize,
    pub stop_simulation_threshold_type: ThresholdType,
    pub epidemic_status: EpidemicStatus,
    pub case_severity_distribution: SeverityTable<f64>,
    pub death_probability: SeverityTable<f64>,
    pub transmission_probabilities: TransmissionProbabilities,
    pub disease_progression: DiseaseProgression,
    pub import_intensity: ImportIntensity,
    pub initial_conditions: InitialConditions,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            random_seed: 42,
            start_time: 0.0,
            stop_simulation_threshold: 10_000,
            stop_simulation_threshold_type: ThresholdType::Prevalence,
            epidemic_status: EpidemicStatus::NotDetected,
            case_severity_distribution: SeverityTable {
                asymptomatic: 0.006,
                mild: 0.809,
                severe: 0.138,
                critical: 0.047,
            },
            death_probability: SeverityTable {
                asymptomatic: 0.0,
                mild: 0.0,
                severe: 0.0,
                critical: 0.49,
            },
            transmission_probabilities: TransmissionProbabilities::default(),
            disease_progression: DiseaseProgression::default(),
            import_intensity: ImportIntensity::default(),
            initial_conditions: InitialConditions::default(),
        }
    }
}

fn check(condition: bool, message: impl FnOnce() -> String) -> Result<(), EpiError> {
    if condition {
        Ok(())
    } else {
        Err(EpiError::InvalidParameter(message()))
    }
}

fn is_probability(p: f64) -> bool {
    (0.0..=1.0).contains(&p)
}

impl Parameters {
    /// Deserializes and validates a JSON parameter snapshot.
    pub fn from_json(json: &str) -> Result<Self, EpiError> {
        let parameters: Parameters = serde_json::from_str(json)?;
        parameters.validate()?;
        Ok(parameters)
    }

    /// The progression delays that apply under the configured epidemic status.
    pub fn progression_delays(&self) -> Result<&ProgressionDelays, EpiError> {
        self.disease_progression
            .for_status(self.epidemic_status)
            .ok_or_else(|| {
                EpiError::MissingParameter(format!(
                    "disease_progression.{} (or disease_progression.default)",
                    self.epidemic_status
                ))
            })
    }

    pub fn validate(&self) -> Result<(), EpiError> {
        check(self.start_time.is_finite(), || {
            format!("start_time must be finite, got {}", self.start_time)
        })?;
        check(self.stop_simulation_threshold > 0, || {
            "stop_simulation_threshold must be positive".to_string()
        })?;

        let severity = self.case_severity_distribution.values();
        let non_negative = severity.iter().all(|w| w.is_finite() && *w >= 0.0);
        check(non_negative && severity.iter().sum::<f64>() > 0.0, || {
            format!(
                "case_severity_distribution must be non-negative with a positive total, \
                 got {severity:?}"
            )
        })?;
        for (name, p) in ["asymptomatic", "mild", "severe", "critical"]
            .iter()
            .zip(self.death_probability.values())
        {
            check(is_probability(p), || {
                format!("death_probability.{name} must be in [0, 1], got {p}")
            })?;
        }

        let rates = &self.transmission_probabilities;
        for (name, rate) in [
            ("household", rates.household),
            ("constant", rates.constant),
            ("transport", rates.transport),
            ("employment", rates.employment),
            ("friendship", rates.friendship),
            ("sporadic", rates.sporadic),
        ] {
            check(rate.is_finite() && rate >= 0.0, || {
                format!("transmission_probabilities.{name} must be >= 0, got {rate}")
            })?;
        }

        self.progression_delays()?.validate()?;

        let import = &self.import_intensity;
        if import.function != ImportFunction::NoImport {
            check(import.multiplier.is_finite() && import.multiplier > 0.0, || {
                format!("import_intensity.multiplier must be > 0, got {}", import.multiplier)
            })?;
            check(import.rate.is_finite() && import.rate > 0.0, || {
                format!("import_intensity.rate must be > 0, got {}", import.rate)
            })?;
            check(is_probability(import.infectious), || {
                format!(
                    "import_intensity.infectious must be in [0, 1], got {}",
                    import.infectious
                )
            })?;
        }

        if let InitialConditions::List(conditions) = &self.initial_conditions {
            for condition in conditions {
                if !matches!(
                    condition.infection_status,
                    InfectionStatus::Contraction | InfectionStatus::Infectious
                ) {
                    return Err(EpiError::InvalidInitialStatus(condition.infection_status));
                }
                if !(condition.contraction_time.is_finite()
                    && condition.contraction_time >= self.start_time)
                {
                    return Err(EpiError::InvalidInitialConditions(format!(
                        "person {} is seeded at {}, before start_time {}",
                        condition.person_index, condition.contraction_time, self.start_time
                    )));
                }
            }
        }
        Ok(())
    }
}
