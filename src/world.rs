//! The `World` owns the population, the city arena and the city groups, and advances all of
//! them by one discrete step at a time.
//!
//! A step runs five phases in strict order:
//!
//! 1. Lockdown evaluation: every city group compares the share of infectious people in its
//!    cities with its threshold and locks or unlocks, rewriting the open edges of the graph.
//! 2. Movement: every person samples a new city over the edges open this step.
//! 3. Tally: the people in every city are counted by state.
//! 4. Evaluation: every person computes their next state from the tally of their city.
//! 5. Commit: every person makes their next state visible.
//!
//! Tallying completes before any evaluation and nothing is committed before every evaluation
//! is done, so the update is synchronous: no person sees a transition made in the same step.

use crate::city::{City, CityGroup, CityId};
use crate::error::SimError;
use crate::log::{debug, trace};
use crate::person::{Person, PersonSnapshot, StateCounts};
use crate::rand::Rng;
use crate::HashMap;

#[derive(Clone, Debug)]
pub struct World {
    people: Vec<Person>,
    cities: Vec<City>,
    city_groups: Vec<CityGroup>,
    city_index: HashMap<String, CityId>,
    step: usize,
}

impl World {
    /// Assembles a world. The `CityId`s held by people, groups and city edges are indices
    /// into `cities`.
    ///
    /// # Errors
    ///
    /// - `SimError::DuplicateDefinition` if two cities share a name.
    /// - `SimError::UnknownReference` if a person, group member or edge refers to a city that
    ///   is not in `cities`.
    pub fn new(
        people: Vec<Person>,
        cities: Vec<City>,
        city_groups: Vec<CityGroup>,
    ) -> Result<Self, SimError> {
        let mut city_index = HashMap::default();
        for (index, city) in cities.iter().enumerate() {
            if city_index
                .insert(city.name().to_string(), CityId(index))
                .is_some()
            {
                return Err(SimError::DuplicateDefinition(format!(
                    "duplicated city name '{}' is found",
                    city.name()
                )));
            }
        }

        let check = |city: CityId, context: &dyn Fn() -> String| {
            if city.0 < cities.len() {
                Ok(())
            } else {
                Err(SimError::UnknownReference(format!(
                    "{} refers to city {city}, which is not defined",
                    context()
                )))
            }
        };
        for city in &cities {
            for &visitable in city.initial_visitables() {
                check(visitable, &|| format!("city '{}'", city.name()))?;
            }
        }
        for group in &city_groups {
            for &member in group.cities() {
                check(member, &|| format!("city group '{}'", group.name()))?;
            }
        }
        for (index, person) in people.iter().enumerate() {
            check(person.position(), &|| format!("person {index}"))?;
        }

        Ok(World {
            people,
            cities,
            city_groups,
            city_index,
            step: 0,
        })
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn city_groups(&self) -> &[CityGroup] {
        &self.city_groups
    }

    pub fn city(&self, id: CityId) -> Option<&City> {
        self.cities.get(id.0)
    }

    pub fn city_id(&self, name: &str) -> Option<CityId> {
        self.city_index.get(name).copied()
    }

    pub fn city_by_name(&self, name: &str) -> Option<&City> {
        self.city_id(name).and_then(|id| self.city(id))
    }

    /// The number of completed calls to [`World::update`].
    pub fn step(&self) -> usize {
        self.step
    }

    /// Advances the world by one step.
    ///
    /// # Panics
    ///
    /// Panics if a person's state cannot be committed, which means the two-phase protocol was
    /// broken and the world is no longer consistent.
    pub fn update<R: Rng>(&mut self, rng: &mut R) {
        self.evaluate_lockdown();

        for person in &mut self.people {
            person.update_position(rng, &self.cities);
        }

        let tallies = self.counts_by_city();

        for person in &mut self.people {
            let counts = &tallies[person.position().0];
            person.eval_next_state(counts, rng);
        }

        for person in &mut self.people {
            if let Err(error) = person.update_state() {
                panic!("step {}: {error}", self.step + 1);
            }
        }

        self.step += 1;
        debug!("step {} done: {}", self.step, self.total_counts());
    }

    /// Runs the lockdown evaluation of every city group against the current positions and
    /// states of the population. Groups with nobody in their cities are skipped.
    ///
    /// Every group decides before any graph change. A city stays locked while any group that
    /// contains it is in lockdown after the pass, so the order of the groups does not matter.
    pub fn evaluate_lockdown(&mut self) {
        let tallies = self.counts_by_city();
        let decisions: Vec<Option<bool>> = self
            .city_groups
            .iter()
            .map(|group| {
                let mut counts = StateCounts::new();
                for member in group.cities() {
                    counts.merge(&tallies[member.0]);
                }
                group.should_lock(&counts)
            })
            .collect();

        let mut held = vec![false; self.cities.len()];
        for (group, decision) in self.city_groups.iter().zip(&decisions) {
            if decision.unwrap_or_else(|| group.in_lockdown()) {
                for member in group.cities() {
                    held[member.0] = true;
                }
            }
        }

        for (group, decision) in self.city_groups.iter_mut().zip(&decisions) {
            if *decision == Some(true) {
                group.lock(&mut self.cities);
            }
        }
        for (group, decision) in self.city_groups.iter_mut().zip(&decisions) {
            match decision {
                Some(true) => {}
                Some(false) => group.unlock_except(&mut self.cities, |city| held[city.0]),
                None => trace!("city group '{}' is empty; skipping", group.name()),
            }
        }
    }

    /// Rebuilds the mobility graph from scratch for the current population: every city gets
    /// its static edges back and the lockdown evaluation runs again. Call this after
    /// overwriting people with [`World::restore_person`].
    pub fn resync_lockdown(&mut self) {
        for city in &mut self.cities {
            city.reset();
        }
        for group in &mut self.city_groups {
            group.reset();
        }
        self.evaluate_lockdown();
    }

    /// Tallies the population by state for every city, indexed by `CityId`.
    pub fn counts_by_city(&self) -> Vec<StateCounts> {
        let mut tallies = vec![StateCounts::new(); self.cities.len()];
        for person in &self.people {
            tallies[person.position().0].add(person.state());
        }
        tallies
    }

    pub fn counts_in_city(&self, city: CityId) -> StateCounts {
        self.people
            .iter()
            .filter(|person| person.position() == city)
            .map(Person::state)
            .collect()
    }

    pub fn total_counts(&self) -> StateCounts {
        self.people.iter().map(Person::state).collect()
    }

    /// Overwrites the state, position and timers of the person at `index`. The mobility graph
    /// is stale until [`World::resync_lockdown`] runs.
    ///
    /// # Errors
    ///
    /// - `SimError::UnknownReference` if there is no person at `index` or the snapshot's city
    ///   is not in this world.
    /// - `SimError::InvalidParameter` if the snapshot's timers do not fit its state.
    pub fn restore_person(
        &mut self,
        index: usize,
        snapshot: PersonSnapshot,
    ) -> Result<(), SimError> {
        if snapshot.position.0 >= self.cities.len() {
            return Err(SimError::UnknownReference(format!(
                "city {} is not defined",
                snapshot.position
            )));
        }
        let population = self.people.len();
        let person = self.people.get_mut(index).ok_or_else(|| {
            SimError::UnknownReference(format!(
                "person {index} does not exist in a population of {population}"
            ))
        })?;
        person.restore(snapshot)
    }
}
