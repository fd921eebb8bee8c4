//! The per-step state counts report: one CSV row for every city after every step.
//!
//! ```text
//! step,city,S,E,I,R,in_lockdown
//! 0,Shinjuku,40,0,2,0,false
//! 0,Shibuya,25,0,0,0,false
//! 1,Shinjuku,39,1,2,0,false
//! ```
//!
//! Step 0 is the world as loaded (or restored).
use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::io::{self, Write};
use std::path::Path;

use csv::Writer;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::log::trace;
use crate::person::PersonState;
use crate::world::World;

/// One row of the report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountsRow {
    pub step: usize,
    pub city: String,
    #[serde(rename = "S")]
    pub susceptible: usize,
    #[serde(rename = "E")]
    pub exposed: usize,
    #[serde(rename = "I")]
    pub infectious: usize,
    #[serde(rename = "R")]
    pub recovered: usize,
    pub in_lockdown: bool,
}

/// Builds the rows describing `world` at its current step, in city order.
pub fn counts_rows(world: &World) -> Vec<CountsRow> {
    world
        .counts_by_city()
        .into_iter()
        .zip(world.cities())
        .map(|(counts, city)| CountsRow {
            step: world.step(),
            city: city.name().to_string(),
            susceptible: counts[PersonState::S],
            exposed: counts[PersonState::E],
            infectious: counts[PersonState::I],
            recovered: counts[PersonState::R],
            in_lockdown: city.in_lockdown(),
        })
        .collect()
}

/// Checks that `path` names a CSV file and creates it along with any missing parent
/// directories.
fn create_report_file(path: &Path) -> Result<File, SimError> {
    match path.extension().and_then(OsStr::to_str) {
        Some("csv") => {
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }
            Ok(File::create(path)?)
        }
        _ => Err(SimError::InvalidParameter(format!(
            "report files must be CSVs: '{}'",
            path.display()
        ))),
    }
}

/// Writes [`CountsRow`]s to any sink. Every `record` call is flushed so that the report of
/// an interrupted run is complete up to its last step.
#[derive(Debug)]
pub struct CountsReport<W: Write> {
    writer: Writer<W>,
}

impl CountsReport<File> {
    /// Creates (or truncates) the report file at `path`.
    ///
    /// # Errors
    ///
    /// `SimError::InvalidParameter` if `path` does not end in `.csv`, and I/O errors from
    /// creating the file. Both are tagged with `path`.
    pub fn create(path: &Path) -> Result<Self, SimError> {
        let file = create_report_file(path).map_err(|e| e.in_file(path))?;
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> CountsReport<W> {
    pub fn from_writer(sink: W) -> Self {
        CountsReport {
            writer: Writer::from_writer(sink),
        }
    }

    /// Appends the rows for the current step of `world`.
    pub fn record(&mut self, world: &World) -> Result<(), SimError> {
        for row in counts_rows(world) {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        trace!("step {}: report rows written", world.step());
        Ok(())
    }

    /// Flushes and returns the underlying sink.
    pub fn into_inner(self) -> Result<W, SimError> {
        self.writer
            .into_inner()
            .map_err(|e| SimError::IoError(io::Error::new(e.error().kind(), e.to_string())))
    }
}
