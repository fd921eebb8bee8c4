//! Reads the four input tables and assembles a [`World`].
//!
//! | table        | columns                                                              |
//! |--------------|----------------------------------------------------------------------|
//! | cities       | `name,x,y`                                                           |
//! | connections  | `from,to`                                                            |
//! | city groups  | `name,city,lockdown_regulation`                                      |
//! | people       | `city_name,init_state,p_infection,p_staying,action_regulation,steps_for_onset,steps_for_recover` |
//!
//! Every table has a header row. Fields are read as text and converted here, so that a bad
//! value is reported with its column, its raw text, the file and the line it came from.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::city::{City, CityGroup, CityId};
use crate::error::SimError;
use crate::log::{debug, info};
use crate::person::{InfectionPolicy, Person, PersonParameters, PersonState};
use crate::world::World;
use crate::HashMap;

/// The planar coordinates of a city. The simulation itself never reads them; they are kept
/// for collaborators that draw the map.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct CityPosition {
    pub x: f64,
    pub y: f64,
}

/// The paths of the four input tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputFiles {
    pub cities: PathBuf,
    pub connections: PathBuf,
    pub city_groups: PathBuf,
    pub people: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CityRow {
    name: String,
    x: String,
    y: String,
}

#[derive(Debug, Deserialize)]
struct ConnectionRow {
    from: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct CityGroupRow {
    name: String,
    city: String,
    lockdown_regulation: String,
}

#[derive(Debug, Deserialize)]
struct PersonRow {
    city_name: String,
    init_state: String,
    p_infection: String,
    p_staying: String,
    action_regulation: String,
    steps_for_onset: String,
    steps_for_recover: String,
}

/// Reads every data row of the table at `path`, paired with its 1-based line number.
pub(crate) fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<(usize, T)>, SimError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| SimError::from(e).in_file(path))?;
    let headers = reader
        .headers()
        .map_err(|e| SimError::from(e).in_file(path))?
        .clone();

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    loop {
        let line = usize::try_from(reader.position().line()).unwrap_or(usize::MAX);
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => return Err(SimError::from(e).at_line(path, line)),
        }
        let line = record
            .position()
            .and_then(|position| usize::try_from(position.line()).ok())
            .unwrap_or(line);
        let row = record
            .deserialize(Some(&headers))
            .map_err(|e| SimError::from(e).at_line(path, line))?;
        rows.push((line, row));
    }
    Ok(rows)
}

fn parse_float(column: &str, raw: &str) -> Result<f64, SimError> {
    raw.parse::<f64>().map_err(|_| {
        SimError::ParseError(format!(
            "could not convert '{column}' to a number: '{raw}'"
        ))
    })
}

fn parse_steps(column: &str, raw: &str) -> Result<u32, SimError> {
    let steps = raw.parse::<i64>().map_err(|_| {
        SimError::ParseError(format!(
            "could not convert '{column}' to an integer: '{raw}'"
        ))
    })?;
    if steps < 1 {
        return Err(SimError::InvalidParameter(format!(
            "'{column}' must be a positive number: {steps}"
        )));
    }
    u32::try_from(steps)
        .map_err(|_| SimError::InvalidParameter(format!("'{column}' is too large: {steps}")))
}

fn lookup_city(index: &HashMap<String, CityId>, name: &str) -> Result<CityId, SimError> {
    index
        .get(name)
        .copied()
        .ok_or_else(|| SimError::UnknownReference(format!("city '{name}' is not defined")))
}

fn city_index(cities: &[City]) -> HashMap<String, CityId> {
    cities
        .iter()
        .enumerate()
        .map(|(index, city)| (city.name().to_string(), CityId(index)))
        .collect()
}

/// Reads the city and connection tables. The returned positions are indexed by `CityId`, like
/// the cities.
///
/// # Errors
///
/// - `SimError::DuplicateDefinition` if a city name appears twice.
/// - `SimError::ParseError` if a coordinate is not a number.
/// - `SimError::UnknownReference` if a connection names an undefined city.
pub fn load_cities(
    cities_path: &Path,
    connections_path: &Path,
) -> Result<(Vec<City>, Vec<CityPosition>), SimError> {
    let mut cities = Vec::new();
    let mut positions = Vec::new();
    let mut index = HashMap::default();

    for (line, row) in read_rows::<CityRow>(cities_path)? {
        let parsed = || -> Result<CityPosition, SimError> {
            if index.contains_key(&row.name) {
                return Err(SimError::DuplicateDefinition(format!(
                    "duplicated city name '{}' is found",
                    row.name
                )));
            }
            Ok(CityPosition {
                x: parse_float("x", &row.x)?,
                y: parse_float("y", &row.y)?,
            })
        };
        let position = parsed().map_err(|e| e.at_line(cities_path, line))?;
        index.insert(row.name.clone(), CityId(cities.len()));
        cities.push(City::new(row.name));
        positions.push(position);
    }

    let mut connections = vec![BTreeSet::new(); cities.len()];
    for (line, row) in read_rows::<ConnectionRow>(connections_path)? {
        let from = lookup_city(&index, &row.from).map_err(|e| e.at_line(connections_path, line))?;
        let to = lookup_city(&index, &row.to).map_err(|e| e.at_line(connections_path, line))?;
        connections[from.0].insert(to);
    }

    for (city, visitables) in cities.iter_mut().zip(connections) {
        city.setup_initial_visitables(visitables)?;
    }

    debug!(
        "loaded {} cities from '{}'",
        cities.len(),
        cities_path.display()
    );
    Ok((cities, positions))
}

/// Reads the city group table. Rows sharing a group name add cities to that group; groups
/// are returned in the order their names first appear.
///
/// # Errors
///
/// - `SimError::UnknownReference` if a row names an undefined city.
/// - `SimError::ParseError` or `SimError::InvalidParameter` for a bad threshold.
/// - `SimError::InconsistentDefinition` if rows of one group disagree on the threshold.
pub fn load_city_groups(path: &Path, cities: &[City]) -> Result<Vec<CityGroup>, SimError> {
    let index = city_index(cities);
    let mut groups: Vec<CityGroup> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::default();

    for (line, row) in read_rows::<CityGroupRow>(path)? {
        let mut apply = || -> Result<(), SimError> {
            let city = lookup_city(&index, &row.city)?;
            let lockdown_regulation = parse_float("lockdown_regulation", &row.lockdown_regulation)?;
            match group_index.get(&row.name) {
                Some(&position) => {
                    let group = &mut groups[position];
                    if group.lockdown_regulation() != lockdown_regulation {
                        return Err(SimError::InconsistentDefinition(format!(
                            "lockdown regulation of city group '{}' is not consistent for all \
                             definitions: {} and {lockdown_regulation}",
                            row.name,
                            group.lockdown_regulation()
                        )));
                    }
                    group.add_city(city);
                }
                None => {
                    groups.push(CityGroup::new(
                        row.name.clone(),
                        [city],
                        lockdown_regulation,
                    )?);
                    group_index.insert(row.name.clone(), groups.len() - 1);
                }
            }
            Ok(())
        };
        apply().map_err(|e| e.at_line(path, line))?;
    }

    debug!(
        "loaded {} city groups from '{}'",
        groups.len(),
        path.display()
    );
    Ok(groups)
}

/// Reads the person table. Every person gets `policy`.
///
/// # Errors
///
/// - `SimError::UnknownReference` for an undefined city or state name.
/// - `SimError::ParseError` for a field that is not a number.
/// - `SimError::InvalidParameter` for a probability outside [0, 1] or a non-positive duration.
pub fn load_people(
    path: &Path,
    cities: &[City],
    policy: InfectionPolicy,
) -> Result<Vec<Person>, SimError> {
    let index = city_index(cities);
    let mut people = Vec::new();

    for (line, row) in read_rows::<PersonRow>(path)? {
        let parsed = || -> Result<Person, SimError> {
            let position = lookup_city(&index, &row.city_name)?;
            let state: PersonState = row.init_state.parse()?;
            let parameters = PersonParameters {
                p_infection: parse_float("p_infection", &row.p_infection)?,
                p_staying: parse_float("p_staying", &row.p_staying)?,
                action_regulation: parse_float("action_regulation", &row.action_regulation)?,
                steps_for_onset: parse_steps("steps_for_onset", &row.steps_for_onset)?,
                steps_for_recover: parse_steps("steps_for_recover", &row.steps_for_recover)?,
            };
            Person::new(position, state, parameters, policy)
        };
        people.push(parsed().map_err(|e| e.at_line(path, line))?);
    }

    debug!("loaded {} people from '{}'", people.len(), path.display());
    Ok(people)
}

/// Loads all four tables and assembles the world. Lockdown is evaluated once so that the
/// graph matches the initial population before the first step.
pub fn load_world(
    files: &InputFiles,
    policy: InfectionPolicy,
) -> Result<(World, Vec<CityPosition>), SimError> {
    let (cities, positions) = load_cities(&files.cities, &files.connections)?;
    let city_groups = load_city_groups(&files.city_groups, &cities)?;
    let people = load_people(&files.people, &cities, policy)?;
    let mut world = World::new(people, cities, city_groups)?;
    world.evaluate_lockdown();
    info!(
        "loaded a world of {} people in {} cities and {} city groups",
        world.people().len(),
        world.cities().len(),
        world.city_groups().len()
    );
    Ok((world, positions))
}
