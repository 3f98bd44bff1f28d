//! A stochastic discrete-event engine for household and community disease transmission
//!
//! A run simulates how an infection spreads through a fixed population grouped into
//! households. Infected people move through a small set of statuses (`Healthy`,
//! `Contraction`, `Infectious`, `StayHome`, `Hospital`); the times of those moves are drawn
//! from configurable delay distributions when a person is first infected. When someone
//! becomes infectious, each applicable transmission kernel proposes candidate exposures of
//! other people during that person's infectious window. Candidates are checked again when
//! they come up in the queue, so a contact only infects someone who is still healthy, from
//! an infector who is still active.
//!
//! The central object is the [`Engine`], which owns:
//! * the time-ordered event queue, see [`plan`]
//! * the status table and the disease progression records
//! * the named random number streams, see [`random`]
//! * the transmission log that records who infected whom
//!
//! A typical run loads a [`Parameters`] snapshot from JSON, builds the population table,
//! creates an engine (which validates everything and seeds the queue) and runs it:
//!
//! ```rust
//! use epi_kernels::{Engine, Parameters, Person, Population};
//!
//! let parameters = Parameters::from_json(r#"{"random_seed": 7}"#).unwrap();
//! let people = (0..50).map(|id| Person::new(id, (id / 4) as u64)).collect();
//! let mut engine = Engine::new(parameters, Population::new(people).unwrap(), None).unwrap();
//! let summary = engine.run().unwrap();
//! println!("{} affected by time {}", summary.affected_people, summary.final_time);
//! ```
pub mod distributions;
pub mod engine;
pub mod error;
pub mod event;
pub mod hashing;
pub mod infection_seeder;
pub mod infection_status;
pub mod kernels;
pub mod log;
pub mod parameters;
pub mod plan;
pub mod population;
#[cfg(feature = "progress_bar")]
pub mod progress;
pub mod progression;
pub mod random;
pub mod report;

pub use distributions::{DelayConfig, DelayDistribution, Sampler};
pub use engine::{
    estimate_doubling_times, Engine, IndividualRecord, ProgressObserver, RunSummary, StopReason,
    TransmissionEdge,
};
pub use error::EpiError;
pub use event::{Event, Mechanism, Milestone};
pub use infection_status::InfectionStatus;
pub use kernels::KernelType;
pub use parameters::Parameters;
pub use population::{HouseholdId, Households, Person, PersonId, Population, Severity};
pub use progression::ProgressionRecord;
pub use random::RandomExt;
pub use report::{write_all_reports, write_report, ReportFormat};

// Re-exports used by `define_rng!`.
pub use rand;
pub use paste;

pub use hashing::{HashMap, HashMapExt, HashSet, HashSetExt};
