//! Per-person snapshots of a world, one CSV file per step.
//!
//! A snapshot row holds the mutable part of a person, in population order:
//!
//! ```text
//! state,city_name,remaining_steps_for_onset,remaining_steps_for_recover
//! S,Shinjuku,,
//! E,Shibuya,2,
//! I,Shibuya,,4
//! ```
//!
//! A snapshot does not describe the cities or the people's parameters. It is applied to a
//! world loaded from the same input tables.
use std::fs::{self, File};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::load::read_rows;
use crate::log::{debug, info};
use crate::person::{PersonSnapshot, PersonState};
use crate::world::World;

/// One row of a snapshot file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSnapshotRecord {
    pub state: PersonState,
    pub city_name: String,
    pub remaining_steps_for_onset: Option<u32>,
    pub remaining_steps_for_recover: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    state: String,
    city_name: String,
    remaining_steps_for_onset: Option<u32>,
    remaining_steps_for_recover: Option<u32>,
}

/// The file name of the snapshot taken after `step`, zero-padded to the width of
/// `total_steps` so that the files sort by step.
///
/// ```rust
/// use seir_markov_lockdown::snapshot::snapshot_file_name;
///
/// assert_eq!(snapshot_file_name(7, 100), "007.csv");
/// assert_eq!(snapshot_file_name(12, 12), "12.csv");
/// ```
pub fn snapshot_file_name(step: usize, total_steps: usize) -> String {
    let width = total_steps.to_string().len();
    format!("{step:0width$}.csv")
}

/// Builds the snapshot rows of every person, in population order.
pub fn snapshot_records(world: &World) -> Vec<PersonSnapshotRecord> {
    world
        .people()
        .iter()
        .map(|person| PersonSnapshotRecord {
            state: person.state(),
            city_name: world.cities()[person.position().0].name().to_string(),
            remaining_steps_for_onset: person.remaining_steps_for_onset(),
            remaining_steps_for_recover: person.remaining_steps_for_recover(),
        })
        .collect()
}

/// Writes the snapshot of `world` to `path`, creating missing parent directories.
pub fn write_snapshot(world: &World, path: &Path) -> Result<(), SimError> {
    let write = || -> Result<(), SimError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        for record in snapshot_records(world) {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    };
    write().map_err(|e| e.in_file(path))?;
    debug!(
        "step {}: wrote snapshot '{}'",
        world.step(),
        path.display()
    );
    Ok(())
}

/// Reads every row of the snapshot at `path`.
///
/// # Errors
///
/// `SimError::UnknownReference` for a state name that is not one of `S`, `E`, `I`, `R`, and
/// CSV errors for timers that are not integers. Errors carry the line number.
pub fn read_snapshot(path: &Path) -> Result<Vec<PersonSnapshotRecord>, SimError> {
    read_rows::<RawRecord>(path)?
        .into_iter()
        .map(|(line, raw)| {
            let state = raw
                .state
                .parse::<PersonState>()
                .map_err(|e| e.at_line(path, line))?;
            Ok(PersonSnapshotRecord {
                state,
                city_name: raw.city_name,
                remaining_steps_for_onset: raw.remaining_steps_for_onset,
                remaining_steps_for_recover: raw.remaining_steps_for_recover,
            })
        })
        .collect()
}

/// Overwrites the people of `world` with the snapshot at `path` and rebuilds the lockdown
/// state of the mobility graph.
///
/// # Errors
///
/// - `SimError::SnapshotMismatch` if the number of rows differs from the population size.
/// - `SimError::UnknownReference` for an undefined city or state name.
/// - `SimError::InvalidParameter` for timers that do not fit the state.
pub fn restore_world(world: &mut World, path: &Path) -> Result<(), SimError> {
    let records = read_snapshot(path)?;
    if records.len() != world.people().len() {
        return Err(SimError::SnapshotMismatch {
            expected: world.people().len(),
            found: records.len(),
        }
        .in_file(path));
    }

    // Every row is checked before the first person is overwritten.
    let snapshots = records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            // Header is line 1.
            let line = index + 2;
            let position = world.city_id(&record.city_name).ok_or_else(|| {
                SimError::UnknownReference(format!("city '{}' is not defined", record.city_name))
                    .at_line(path, line)
            })?;
            let snapshot = PersonSnapshot {
                state: record.state,
                position,
                remaining_steps_for_onset: record.remaining_steps_for_onset,
                remaining_steps_for_recover: record.remaining_steps_for_recover,
            };
            snapshot.validate().map_err(|e| e.at_line(path, line))?;
            Ok(snapshot)
        })
        .collect::<Result<Vec<_>, SimError>>()?;

    for (index, snapshot) in snapshots.into_iter().enumerate() {
        world
            .restore_person(index, snapshot)
            .map_err(|e| e.at_line(path, index + 2))?;
    }

    world.resync_lockdown();
    info!(
        "restored {} people from '{}': {}",
        world.people().len(),
        path.display(),
        world.total_counts()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::{City, CityGroup, CityId};
    use crate::person::{InfectionPolicy, Person, PersonParameters};
    use crate::random::rng_from_seed;
    use tempfile::TempDir;

    fn parameters() -> PersonParameters {
        PersonParameters {
            p_infection: 0.4,
            p_staying: 0.5,
            action_regulation: 0.5,
            steps_for_onset: 2,
            steps_for_recover: 3,
        }
    }

    fn world() -> World {
        let mut a = City::new("A");
        let mut b = City::new("B");
        a.setup_initial_visitables([CityId(1)]).unwrap();
        b.setup_initial_visitables([CityId(0)]).unwrap();
        let group = CityGroup::new("east", [CityId(1)], 0.5).unwrap();
        let people = [
            (0, PersonState::I),
            (0, PersonState::S),
            (0, PersonState::S),
            (1, PersonState::S),
            (1, PersonState::E),
        ]
        .into_iter()
        .map(|(city, state)| {
            Person::new(CityId(city), state, parameters(), InfectionPolicy::Constant).unwrap()
        })
        .collect();
        World::new(people, vec![a, b], vec![group]).unwrap()
    }

    #[test]
    fn file_names_are_zero_padded() {
        assert_eq!(snapshot_file_name(0, 9), "0.csv");
        assert_eq!(snapshot_file_name(3, 10), "03.csv");
        assert_eq!(snapshot_file_name(42, 1000), "0042.csv");
    }

    #[test]
    fn written_file_has_expected_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("0.csv");
        write_snapshot(&world(), &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "state,city_name,remaining_steps_for_onset,remaining_steps_for_recover"
        );
        assert_eq!(lines[1], "I,A,,3");
        assert_eq!(lines[2], "S,A,,");
        assert_eq!(lines[5], "E,B,2,");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn restore_reproduces_people_and_lockdown() {
        let dir = TempDir::new().unwrap();
        let mut source = world();
        let mut rng = rng_from_seed(7);
        for _ in 0..4 {
            source.update(&mut rng);
        }
        let path = dir.path().join("4.csv");
        write_snapshot(&source, &path).unwrap();

        let mut restored = world();
        restore_world(&mut restored, &path).unwrap();
        let expected: Vec<_> = source.people().iter().map(Person::snapshot).collect();
        let actual: Vec<_> = restored.people().iter().map(Person::snapshot).collect();
        assert_eq!(expected, actual);

        let counts = restored.counts_in_city(CityId(1));
        let group = &restored.city_groups()[0];
        match group.should_lock(&counts) {
            Some(lock) => {
                assert_eq!(group.in_lockdown(), lock);
                assert_eq!(restored.cities()[1].in_lockdown(), lock);
            }
            None => assert!(!group.in_lockdown()),
        }
    }

    #[test]
    fn row_count_must_match_population() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.csv");
        fs::write(
            &path,
            "state,city_name,remaining_steps_for_onset,remaining_steps_for_recover\nS,A,,\n",
        )
        .unwrap();
        let error = restore_world(&mut world(), &path).unwrap_err();
        assert!(matches!(
            error.root_cause(),
            SimError::SnapshotMismatch {
                expected: 5,
                found: 1
            }
        ));
    }

    #[test]
    fn unknown_names_are_reported_with_line() {
        let dir = TempDir::new().unwrap();
        let header = "state,city_name,remaining_steps_for_onset,remaining_steps_for_recover\n";
        let path = dir.path().join("bad.csv");

        fs::write(&path, format!("{header}S,A,,\nQ,A,,\n")).unwrap();
        let error = read_snapshot(&path).unwrap_err();
        assert_eq!(
            error.to_string(),
            format!("'{}' line 3: state 'Q' is not defined", path.display())
        );

        fs::write(&path, format!("{header}S,A,,\nS,A,,\nS,A,,\nS,Z,,\nS,A,,\n")).unwrap();
        let error = restore_world(&mut world(), &path).unwrap_err();
        assert_eq!(
            error.to_string(),
            format!("'{}' line 5: city 'Z' is not defined", path.display())
        );
    }

    #[test]
    fn exposed_row_without_timer_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(
            &path,
            "state,city_name,remaining_steps_for_onset,remaining_steps_for_recover\n\
             S,A,,\nS,A,,\nE,A,,\nS,B,,\nS,B,,\n",
        )
        .unwrap();
        let error = restore_world(&mut world(), &path).unwrap_err();
        assert!(matches!(error.root_cause(), SimError::InvalidParameter(_)));
    }

    #[test]
    fn failed_restore_leaves_people_untouched() {
        let dir = TempDir::new().unwrap();
        let header = "state,city_name,remaining_steps_for_onset,remaining_steps_for_recover
";
        let path = dir.path().join("bad.csv");
        let mut world = world();
        let before: Vec<_> = world.people().iter().map(Person::snapshot).collect();

        for rows in [
            "R,B,,\nE,B,1,\nS,A,,\nS,Atlantis,,\nS,B,,\n",
            "R,B,,\nE,B,1,\nS,A,,\nS,B,,\nI,B,,\n",
        ] {
            fs::write(&path, format!("{header}{rows}")).unwrap();
            assert!(restore_world(&mut world, &path).is_err());
            let after: Vec<_> = world.people().iter().map(Person::snapshot).collect();
            assert_eq!(before, after);
        }
    }
}
