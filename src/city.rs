//! The mobility graph and lockdown policy.
//!
//! Cities are stored in an arena owned by the [`World`](crate::World) and refer to each other
//! by [`CityId`], their index in that arena. Each city keeps two edge sets: the static
//! `initial_visitables`, fixed once when the graph is built, and `current_visitables`, the
//! edges that are open this step. A [`CityGroup`] locks and unlocks its member cities together
//! and severs or restores the edges leading into them from the rest of the graph.

use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

use crate::error::SimError;
use crate::log::{debug, trace};
use crate::person::{check_probability, StateCounts};

/// The index of a city in the world's city arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CityId(pub usize);

impl Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct City {
    name: String,
    initialized: bool,
    initial_visitables: BTreeSet<CityId>,
    current_visitables: BTreeSet<CityId>,
    in_lockdown: bool,
}

impl City {
    pub fn new(name: impl Into<String>) -> Self {
        City {
            name: name.into(),
            initialized: false,
            initial_visitables: BTreeSet::new(),
            current_visitables: BTreeSet::new(),
            in_lockdown: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the static outgoing edges of this city. Both edge sets start out equal.
    ///
    /// # Errors
    ///
    /// Returns `SimError::DoubleInitialization` if the edges have already been set.
    pub fn setup_initial_visitables(
        &mut self,
        visitables: impl IntoIterator<Item = CityId>,
    ) -> Result<(), SimError> {
        if self.initialized {
            return Err(SimError::DoubleInitialization(format!(
                "initial visitables of city '{}' have already been set",
                self.name
            )));
        }
        self.initial_visitables = visitables.into_iter().collect();
        self.current_visitables = self.initial_visitables.clone();
        self.initialized = true;
        Ok(())
    }

    pub fn initial_visitables(&self) -> &BTreeSet<CityId> {
        &self.initial_visitables
    }

    pub fn current_visitables(&self) -> &BTreeSet<CityId> {
        &self.current_visitables
    }

    pub fn in_lockdown(&self) -> bool {
        self.in_lockdown
    }

    /// Closes every outgoing edge.
    pub fn lock(&mut self) {
        self.current_visitables.clear();
        self.in_lockdown = true;
    }

    /// Reopens the static edges that lead to cities which are not locked. `is_locked` reports
    /// the lockdown flag of any other city in the arena.
    pub fn unlock(&mut self, is_locked: impl Fn(CityId) -> bool) {
        self.current_visitables = self
            .initial_visitables
            .iter()
            .copied()
            .filter(|&city| !is_locked(city))
            .collect();
        self.in_lockdown = false;
    }

    /// Reopens every static edge. The lockdown flag is left as is.
    pub fn reset_visitables(&mut self) {
        self.current_visitables = self.initial_visitables.clone();
    }

    pub fn add_visitable(&mut self, city: CityId) {
        self.current_visitables.insert(city);
    }

    /// Closes the edge to `city`. Closing an edge that is not open does nothing.
    pub fn discard_visitable(&mut self, city: CityId) {
        self.current_visitables.remove(&city);
    }

    /// Returns the city to its freshly built state: every static edge open and not locked.
    pub(crate) fn reset(&mut self) {
        self.reset_visitables();
        self.in_lockdown = false;
    }
}

impl PartialEq for City {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for City {}

impl Hash for City {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Display for City {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A set of cities that go into and out of lockdown together.
#[derive(Clone, Debug)]
pub struct CityGroup {
    name: String,
    cities: BTreeSet<CityId>,
    lockdown_regulation: f64,
    in_lockdown: bool,
}

impl CityGroup {
    /// Creates a group that locks down once the share of infectious people in its cities
    /// reaches `lockdown_regulation`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidParameter` if `lockdown_regulation` is outside [0, 1].
    pub fn new(
        name: impl Into<String>,
        cities: impl IntoIterator<Item = CityId>,
        lockdown_regulation: f64,
    ) -> Result<Self, SimError> {
        check_probability("lockdown_regulation", lockdown_regulation)?;
        Ok(CityGroup {
            name: name.into(),
            cities: cities.into_iter().collect(),
            lockdown_regulation,
            in_lockdown: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cities(&self) -> &BTreeSet<CityId> {
        &self.cities
    }

    pub fn add_city(&mut self, city: CityId) {
        self.cities.insert(city);
    }

    pub fn has_city(&self, city: CityId) -> bool {
        self.cities.contains(&city)
    }

    pub fn lockdown_regulation(&self) -> f64 {
        self.lockdown_regulation
    }

    pub fn in_lockdown(&self) -> bool {
        self.in_lockdown
    }

    /// Decides the lockdown state for a tally of everyone currently in the group's cities.
    /// Returns `None` for an empty tally, in which case the group is left alone.
    pub fn should_lock(&self, counts: &StateCounts) -> Option<bool> {
        counts
            .rate_infected()
            .map(|rate_infected| rate_infected >= self.lockdown_regulation)
    }

    /// Locks every member city and closes the edges that lead into the group from outside.
    /// `cities` is the full city arena. Locking twice has the same effect as locking once.
    pub fn lock(&mut self, cities: &mut [City]) {
        if !self.in_lockdown {
            debug!("locking down city group '{}'", self.name);
        }
        self.in_lockdown = true;

        for (index, city) in cities.iter_mut().enumerate() {
            if self.has_city(CityId(index)) {
                city.lock();
            } else {
                for &member in &self.cities {
                    city.discard_visitable(member);
                }
            }
        }
    }

    /// Unlocks every member city and reopens the edges that lead into the group from outside
    /// cities that are not locked themselves. `cities` is the full city arena.
    ///
    /// Members reopen their edges to each other. Edges to cities locked by another group stay
    /// closed.
    pub fn unlock(&mut self, cities: &mut [City]) {
        let locked: Vec<bool> = cities
            .iter()
            .enumerate()
            .map(|(index, city)| city.in_lockdown() && !self.has_city(CityId(index)))
            .collect();
        self.unlock_except(cities, |city| locked.get(city.0).copied().unwrap_or(false));
    }

    /// Unlocks the group while `held` cities stay locked. `held` reports, for every city in
    /// the arena, whether some group keeps it in lockdown after this pass; members included.
    ///
    /// A held member is left locked, no edge is reopened into a held city and held non-members
    /// get no edges back.
    pub fn unlock_except(&mut self, cities: &mut [City], held: impl Fn(CityId) -> bool) {
        if self.in_lockdown {
            debug!("lifting lockdown of city group '{}'", self.name);
        }
        self.in_lockdown = false;

        for (index, city) in cities.iter_mut().enumerate() {
            let id = CityId(index);
            if held(id) {
                trace!(
                    "city '{}' is held in lockdown; group '{}' leaves it closed",
                    city.name(),
                    self.name
                );
            } else if self.has_city(id) {
                city.unlock(&held);
            } else {
                for &member in &self.cities {
                    if !held(member) && city.initial_visitables().contains(&member) {
                        city.add_visitable(member);
                    }
                }
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.in_lockdown = false;
    }
}

impl PartialEq for CityGroup {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
