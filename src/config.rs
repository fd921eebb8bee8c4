//! The JSON run configuration.
//!
//! ```json
//! {
//!   "file_cities": "cities.csv",
//!   "file_connections": "connections.csv",
//!   "file_city_groups": "city_groups.csv",
//!   "file_people": "people.csv",
//!   "steps": 100,
//!   "dir_snapshots": "snapshots",
//!   "file_report": "report.csv",
//!   "seed": 42,
//!   "population_dependent": true
//! }
//! ```
//!
//! Relative paths are taken relative to the directory of the configuration file, so a
//! configuration can sit next to its tables and be run from anywhere.
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::SimError;
use crate::load::InputFiles;
use crate::log::trace;
use crate::person::InfectionPolicy;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub file_cities: PathBuf,
    pub file_connections: PathBuf,
    pub file_city_groups: PathBuf,
    pub file_people: PathBuf,
    pub steps: usize,
    /// Where to write one snapshot per step. No snapshots are written when absent.
    #[serde(default)]
    pub dir_snapshots: Option<PathBuf>,
    /// Where to write the per-step state counts of every city.
    #[serde(default)]
    pub file_report: Option<PathBuf>,
    #[serde(default)]
    pub seed: u64,
    /// Selects [`InfectionPolicy::PopulationDependent`] for every person.
    #[serde(default)]
    pub population_dependent: bool,
}

impl RunConfig {
    /// Reads the configuration at `path` and resolves its relative paths against the
    /// directory that contains it.
    ///
    /// # Errors
    ///
    /// I/O and JSON errors, including unknown or missing fields, tagged with `path`.
    pub fn from_path(path: &Path) -> Result<Self, SimError> {
        let read = || -> Result<RunConfig, SimError> {
            let text = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        };
        let mut config = read().map_err(|e| e.in_file(path))?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        trace!("run configuration from '{}': {config:?}", path.display());
        Ok(config)
    }

    /// Prefixes every relative path with `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.file_cities);
        resolve(&mut self.file_connections);
        resolve(&mut self.file_city_groups);
        resolve(&mut self.file_people);
        if let Some(dir) = self.dir_snapshots.as_mut() {
            resolve(dir);
        }
        if let Some(file) = self.file_report.as_mut() {
            resolve(file);
        }
    }

    pub fn input_files(&self) -> InputFiles {
        InputFiles {
            cities: self.file_cities.clone(),
            connections: self.file_connections.clone(),
            city_groups: self.file_city_groups.clone(),
            people: self.file_people.clone(),
        }
    }

    pub fn infection_policy(&self) -> InfectionPolicy {
        if self.population_dependent {
            InfectionPolicy::PopulationDependent
        } else {
            InfectionPolicy::Constant
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.json");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_and_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{
                "file_cities": "cities.csv",
                "file_connections": "tables/connections.csv",
                "file_city_groups": "/data/city_groups.csv",
                "file_people": "people.csv",
                "steps": 10
            }"#,
        );
        let config = RunConfig::from_path(&path).unwrap();
        assert_eq!(config.steps, 10);
        assert_eq!(config.seed, 0);
        assert_eq!(config.dir_snapshots, None);
        assert_eq!(config.file_report, None);
        assert_eq!(config.infection_policy(), InfectionPolicy::Constant);
        assert_eq!(config.file_cities, dir.path().join("cities.csv"));
        assert_eq!(
            config.input_files().connections,
            dir.path().join("tables/connections.csv")
        );
        assert_eq!(config.file_city_groups, PathBuf::from("/data/city_groups.csv"));
    }

    #[test]
    fn optional_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{
                "file_cities": "c.csv",
                "file_connections": "n.csv",
                "file_city_groups": "g.csv",
                "file_people": "p.csv",
                "steps": 3,
                "dir_snapshots": "out",
                "file_report": "out/report.csv",
                "seed": 99,
                "population_dependent": true
            }"#,
        );
        let config = RunConfig::from_path(&path).unwrap();
        assert_eq!(config.seed, 99);
        assert_eq!(config.dir_snapshots, Some(dir.path().join("out")));
        assert_eq!(config.file_report, Some(dir.path().join("out/report.csv")));
        assert_eq!(
            config.infection_policy(),
            InfectionPolicy::PopulationDependent
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{
                "file_cities": "c.csv",
                "file_connections": "n.csv",
                "file_city_groups": "g.csv",
                "file_people": "p.csv",
                "steps": 3,
                "dpi": 100
            }"#,
        );
        let error = RunConfig::from_path(&path).unwrap_err();
        assert!(matches!(error.root_cause(), SimError::JsonError(_)));
        assert!(error.to_string().contains("dpi"));
    }

    #[test]
    fn missing_steps_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"file_cities": "c.csv", "file_connections": "n.csv",
                "file_city_groups": "g.csv", "file_people": "p.csv"}"#,
        );
        assert!(RunConfig::from_path(&path).is_err());
    }
}
