//! Writing the output logs of a run to disk.
//!
//! Each log is a list of serializable rows. The file extension picks the format: `.csv` writes
//! one row per line with a header, `.json` writes a single array. Parent directories are
//! created as needed.
use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::Writer;
use log::info;
use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::EpiError;
use crate::population::{HouseholdId, Households, PersonId};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Json,
}

impl ReportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
        }
    }
}

/// One household membership, as written to the household report.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdRow {
    pub household_id: HouseholdId,
    pub person_id: PersonId,
}

// Checks that the path is valid. Creates all parent directories if they do not exist and
// returns the created file with the format its extension asks for.
fn generate_validate_filepath(path: &Path) -> Result<(File, ReportFormat), EpiError> {
    let format = match path.extension().and_then(OsStr::to_str) {
        Some("csv") => ReportFormat::Csv,
        Some("json") => ReportFormat::Json,
        _ => {
            return Err(EpiError::EpiError(format!(
                "Report output files must be CSV or JSON, got {}",
                path.display()
            )))
        }
    };
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    Ok((File::create(path)?, format))
}

/// Writes `rows` to `path` in the format named by its extension.
pub fn write_report<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), EpiError> {
    let (file, format) = generate_validate_filepath(path)?;
    match format {
        ReportFormat::Csv => {
            let mut writer = Writer::from_writer(file);
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        ReportFormat::Json => {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writer.flush()?;
        }
    }
    Ok(())
}

#[must_use]
pub fn household_rows(households: &Households) -> Vec<HouseholdRow> {
    households
        .iter()
        .flat_map(|(household_id, members)| {
            members.iter().map(|person_id| HouseholdRow {
                household_id: *household_id,
                person_id: *person_id,
            })
        })
        .collect()
}

/// Writes every output log of `engine` into `directory` and returns the paths written:
/// `transmissions`, `progression`, `individuals`, `households` and `remaining_events`.
pub fn write_all_reports(
    engine: &Engine,
    directory: &Path,
    format: ReportFormat,
) -> Result<Vec<PathBuf>, EpiError> {
    let path = |name: &str| directory.join(name).with_extension(format.extension());
    let progression: Vec<_> = engine.progression_log().values().copied().collect();

    let written = vec![
        path("transmissions"),
        path("progression"),
        path("individuals"),
        path("households"),
        path("remaining_events"),
    ];
    write_report(&written[0], engine.transmission_log())?;
    write_report(&written[1], &progression)?;
    write_report(&written[2], &engine.individuals())?;
    write_report(&written[3], &household_rows(engine.households()))?;
    write_report(&written[4], &engine.remaining_events())?;
    info!("wrote {} reports to {}", written.len(), directory.display());
    Ok(written)
}
