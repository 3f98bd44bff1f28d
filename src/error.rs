//! Provides `EpiError` and maps other errors to `EpiError`.
//!
//! Almost every error in this crate is a setup-time error: a parameter snapshot that cannot be
//! turned into a runnable model. Once `Engine::new` has returned, inconsistent events are
//! logged and dropped; the run loop only fails if the progression bookkeeping itself breaks.
use std::fmt::{self, Debug, Display};
use std::io;

use crate::infection_status::InfectionStatus;
use crate::population::PersonId;

#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum EpiError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    /// A distribution family that the sampler cannot draw from or fit.
    UnsupportedDistribution(String),
    /// A supported distribution with parameters outside its domain.
    InvalidDistribution(String),
    InvalidInitialConditions(String),
    MissingParameter(String),
    InvalidParameter(String),
    UnknownPerson(PersonId),
    /// Disease progression can only start from `Contraction` or `Infectious`.
    InvalidInitialStatus(InfectionStatus),
    EpiError(String),
}

impl From<io::Error> for EpiError {
    fn from(error: io::Error) -> Self {
        EpiError::IoError(error)
    }
}

impl From<serde_json::Error> for EpiError {
    fn from(error: serde_json::Error) -> Self {
        EpiError::JsonError(error)
    }
}

impl From<csv::Error> for EpiError {
    fn from(error: csv::Error) -> Self {
        EpiError::CsvError(error)
    }
}

impl From<String> for EpiError {
    fn from(error: String) -> Self {
        EpiError::EpiError(error)
    }
}

impl From<&str> for EpiError {
    fn from(error: &str) -> Self {
        EpiError::EpiError(error.to_string())
    }
}

impl std::error::Error for EpiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EpiError::IoError(error) => Some(error),
            EpiError::JsonError(error) => Some(error),
            EpiError::CsvError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for EpiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EpiError::UnsupportedDistribution(name) => {
                write!(f, "Sampling from distribution {name} is not supported")
            }
            EpiError::InvalidDistribution(msg) => write!(f, "Invalid distribution: {msg}"),
            EpiError::InvalidInitialConditions(msg) => {
                write!(f, "Invalid initial conditions: {msg}")
            }
            EpiError::MissingParameter(key) => write!(f, "Missing required parameter: {key}"),
            EpiError::InvalidParameter(msg) => write!(f, "Invalid parameter: {msg}"),
            EpiError::UnknownPerson(person_id) => {
                write!(f, "Person {person_id} is not in the population")
            }
            EpiError::InvalidInitialStatus(status) => {
                write!(f, "Invalid initial infection status {status:?}")
            }
            _ => write!(f, "Error: {self:?}"),
        }
    }
}
