//! The per-agent SEIR state machine.
//!
//! A [`Person`] is advanced in two phases so that every agent in the world transitions
//! simultaneously:
//!
//! 1. [`Person::update_position`] samples where the person spends this step.
//! 2. [`Person::eval_next_state`] computes the next disease state from the tally of the city the
//!    person moved to and buffers it.
//! 3. [`Person::update_state`] commits the buffered state.
//!
//! Between phases 2 and 3 the person's visible [`Person::state`] is still the old one, so no
//! other person's evaluation can observe a transition made in the same step.

use std::fmt::{self, Display};
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::city::{City, CityId};
use crate::error::SimError;
use crate::log::trace;
use crate::rand::Rng;
use crate::random::{sample_bool, sample_weighted};

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PersonState {
    /// Susceptible
    S,
    /// Exposed: infected but not yet infectious
    E,
    /// Infectious
    I,
    /// Recovered
    R,
}

impl PersonState {
    pub const ALL: [PersonState; 4] = [
        PersonState::S,
        PersonState::E,
        PersonState::I,
        PersonState::R,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PersonState::S => "S",
            PersonState::E => "E",
            PersonState::I => "I",
            PersonState::R => "R",
        }
    }

    fn index(self) -> usize {
        match self {
            PersonState::S => 0,
            PersonState::E => 1,
            PersonState::I => 2,
            PersonState::R => 3,
        }
    }
}

impl Display for PersonState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PersonState {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S" => Ok(PersonState::S),
            "E" => Ok(PersonState::E),
            "I" => Ok(PersonState::I),
            "R" => Ok(PersonState::R),
            _ => Err(SimError::UnknownReference(format!(
                "state '{s}' is not defined"
            ))),
        }
    }
}

/// A tally of people by disease state.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StateCounts([usize; 4]);

impl StateCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, state: PersonState) -> usize {
        self[state]
    }

    pub fn add(&mut self, state: PersonState) {
        self[state] += 1;
    }

    /// Removes one person in `state` from the tally. Saturates at zero.
    pub fn remove(&mut self, state: PersonState) {
        self[state] = self[state].saturating_sub(1);
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    /// The share of infectious people, or `None` for an empty tally.
    #[allow(clippy::cast_precision_loss)]
    pub fn rate_infected(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self[PersonState::I] as f64 / total as f64),
        }
    }

    /// Adds every count of `other` into `self`.
    pub fn merge(&mut self, other: &StateCounts) {
        for state in PersonState::ALL {
            self[state] += other[state];
        }
    }
}

impl Index<PersonState> for StateCounts {
    type Output = usize;

    fn index(&self, state: PersonState) -> &usize {
        &self.0[state.index()]
    }
}

impl IndexMut<PersonState> for StateCounts {
    fn index_mut(&mut self, state: PersonState) -> &mut usize {
        &mut self.0[state.index()]
    }
}

impl FromIterator<PersonState> for StateCounts {
    fn from_iter<T: IntoIterator<Item = PersonState>>(iter: T) -> Self {
        let mut counts = StateCounts::new();
        for state in iter {
            counts.add(state);
        }
        counts
    }
}

impl Display for StateCounts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "S={} E={} I={} R={}",
            self[PersonState::S],
            self[PersonState::E],
            self[PersonState::I],
            self[PersonState::R]
        )
    }
}

/// How a susceptible person is exposed by the infectious people sharing their city.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfectionPolicy {
    /// Exposure with probability `p_infection` whenever at least one infectious person is present.
    #[default]
    Constant,
    /// Each infectious contact independently exposes with probability `p_infection`, so a
    /// person stays susceptible with probability `(1 - p_infection)^count(I)`.
    PopulationDependent,
}

impl InfectionPolicy {
    /// Probability that a susceptible person is exposed given the infectious people around them.
    pub fn exposure_probability(self, p_infection: f64, infectious_others: usize) -> f64 {
        match self {
            InfectionPolicy::Constant => {
                if infectious_others > 0 {
                    p_infection
                } else {
                    0.0
                }
            }
            InfectionPolicy::PopulationDependent => {
                let exponent = i32::try_from(infectious_others).unwrap_or(i32::MAX);
                1.0 - (1.0 - p_infection).powi(exponent)
            }
        }
    }
}

/// The fixed mobility and epidemiological parameters of a person.
#[derive(Clone, Debug, PartialEq)]
pub struct PersonParameters {
    pub p_infection: f64,
    pub p_staying: f64,
    /// Scales the probability of leaving the current city while infectious. `1.0` leaves
    /// mobility unchanged, `0.0` keeps infectious people at home.
    pub action_regulation: f64,
    pub steps_for_onset: u32,
    pub steps_for_recover: u32,
}

impl PersonParameters {
    /// Checks that every probability lies in [0, 1] and every duration is positive.
    pub fn validate(&self) -> Result<(), SimError> {
        check_probability("p_infection", self.p_infection)?;
        check_probability("p_staying", self.p_staying)?;
        check_probability("action_regulation", self.action_regulation)?;
        check_duration("steps_for_onset", self.steps_for_onset)?;
        check_duration("steps_for_recover", self.steps_for_recover)?;
        Ok(())
    }
}

pub(crate) fn check_probability(name: &str, value: f64) -> Result<(), SimError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::InvalidParameter(format!(
            "'{name}' must be in range [0, 1]: {value}"
        )))
    }
}

fn check_duration(name: &str, value: u32) -> Result<(), SimError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(SimError::InvalidParameter(format!(
            "'{name}' must be a positive number: {value}"
        )))
    }
}

/// The mutable part of a person, as written to and read back from a snapshot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PersonSnapshot {
    pub state: PersonState,
    pub position: CityId,
    pub remaining_steps_for_onset: Option<u32>,
    pub remaining_steps_for_recover: Option<u32>,
}

impl PersonSnapshot {
    /// Checks that the timers fit the state: an exposed person needs an onset timer and an
    /// infectious person a recovery timer. Timers that are present must be positive.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.state == PersonState::E && self.remaining_steps_for_onset.is_none() {
            return Err(SimError::InvalidParameter(
                "an exposed person needs 'remaining_steps_for_onset'".to_string(),
            ));
        }
        if self.state == PersonState::I && self.remaining_steps_for_recover.is_none() {
            return Err(SimError::InvalidParameter(
                "an infectious person needs 'remaining_steps_for_recover'".to_string(),
            ));
        }
        if let Some(onset) = self.remaining_steps_for_onset {
            check_duration("remaining_steps_for_onset", onset)?;
        }
        if let Some(recover) = self.remaining_steps_for_recover {
            check_duration("remaining_steps_for_recover", recover)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Person {
    position: CityId,
    state: PersonState,
    parameters: PersonParameters,
    policy: InfectionPolicy,
    next_state: Option<PersonState>,
    remaining_steps_for_onset: Option<u32>,
    remaining_steps_for_recover: Option<u32>,
}

impl Person {
    /// Creates a person in `state` at `position`.
    ///
    /// A person that starts out exposed or infectious starts with a full onset or recovery
    /// timer respectively.
    pub fn new(
        position: CityId,
        state: PersonState,
        parameters: PersonParameters,
        policy: InfectionPolicy,
    ) -> Result<Self, SimError> {
        parameters.validate()?;
        let remaining_steps_for_onset =
            (state == PersonState::E).then_some(parameters.steps_for_onset);
        let remaining_steps_for_recover =
            (state == PersonState::I).then_some(parameters.steps_for_recover);
        Ok(Person {
            position,
            state,
            parameters,
            policy,
            next_state: None,
            remaining_steps_for_onset,
            remaining_steps_for_recover,
        })
    }

    pub fn position(&self) -> CityId {
        self.position
    }

    pub fn state(&self) -> PersonState {
        self.state
    }

    /// The state buffered by [`Person::eval_next_state`], if an evaluation is pending.
    pub fn next_state(&self) -> Option<PersonState> {
        self.next_state
    }

    pub fn parameters(&self) -> &PersonParameters {
        &self.parameters
    }

    pub fn policy(&self) -> InfectionPolicy {
        self.policy
    }

    pub fn remaining_steps_for_onset(&self) -> Option<u32> {
        self.remaining_steps_for_onset
    }

    pub fn remaining_steps_for_recover(&self) -> Option<u32> {
        self.remaining_steps_for_recover
    }

    /// Moves the person to a city sampled from their current city and the cities currently
    /// reachable from it. `cities` is the world's city arena.
    ///
    /// Staying has probability `p_staying` and the remaining mass is split evenly between the
    /// reachable cities. An infectious person scales the weight of every other city by
    /// `action_regulation` and puts the difference on staying. A person in a city without
    /// open edges never moves and draws no randomness.
    pub fn update_position<R: Rng>(&mut self, rng: &mut R, cities: &[City]) {
        let Some(current) = cities.get(self.position.0) else {
            return;
        };
        let mut candidates = Vec::with_capacity(current.current_visitables().len() + 1);
        candidates.push(self.position);
        candidates.extend(current.current_visitables().iter().copied());

        let num_next = candidates.len();
        if num_next == 1 {
            return;
        }

        #[allow(clippy::cast_precision_loss)]
        let num_others = (num_next - 1) as f64;
        let mut p_staying = self.parameters.p_staying;
        let mut weight_others = (1.0 - self.parameters.p_staying) / num_others;
        if self.state == PersonState::I {
            weight_others *= self.parameters.action_regulation;
            p_staying = (1.0 - num_others * weight_others).max(0.0);
        }

        let mut weights = vec![weight_others; num_next];
        weights[0] = p_staying;

        let next = candidates[sample_weighted(rng, &weights)];
        if next != self.position {
            trace!("person moved from {} to {}", self.position, next);
        }
        self.position = next;
    }

    /// Evaluates the next state from the tally of the person's current city and buffers it.
    ///
    /// `counts_in_city` includes this person; their own contribution is removed before the
    /// infection pressure is computed. Onset and recovery timers advance here, the visible
    /// state only changes on [`Person::update_state`].
    pub fn eval_next_state<R: Rng>(&mut self, counts_in_city: &StateCounts, rng: &mut R) {
        let mut counts_others = *counts_in_city;
        counts_others.remove(self.state);

        let next_state = match self.state {
            PersonState::S => self.eval_next_state_when_s(&counts_others, rng),
            PersonState::E => self.eval_next_state_when_e(),
            PersonState::I => self.eval_next_state_when_i(),
            PersonState::R => PersonState::R,
        };
        self.next_state = Some(next_state);
    }

    fn eval_next_state_when_s<R: Rng>(
        &mut self,
        counts_others: &StateCounts,
        rng: &mut R,
    ) -> PersonState {
        let infectious = counts_others[PersonState::I];
        let exposed = match self.policy {
            InfectionPolicy::Constant => {
                if infectious == 0 {
                    return PersonState::S;
                }
                let p_infection = self.parameters.p_infection;
                sample_weighted(rng, &[1.0 - p_infection, p_infection]) == 1
            }
            InfectionPolicy::PopulationDependent => sample_bool(
                rng,
                self.policy
                    .exposure_probability(self.parameters.p_infection, infectious),
            ),
        };

        if exposed {
            trace!("person exposed by {infectious} infectious people");
            self.remaining_steps_for_onset = Some(self.parameters.steps_for_onset);
            PersonState::E
        } else {
            PersonState::S
        }
    }

    fn eval_next_state_when_e(&mut self) -> PersonState {
        let remaining = self
            .remaining_steps_for_onset
            .unwrap_or(1)
            .saturating_sub(1);
        if remaining == 0 {
            self.remaining_steps_for_onset = None;
            self.remaining_steps_for_recover = Some(self.parameters.steps_for_recover);
            PersonState::I
        } else {
            self.remaining_steps_for_onset = Some(remaining);
            PersonState::E
        }
    }

    fn eval_next_state_when_i(&mut self) -> PersonState {
        let remaining = self
            .remaining_steps_for_recover
            .unwrap_or(1)
            .saturating_sub(1);
        if remaining == 0 {
            self.remaining_steps_for_recover = None;
            PersonState::R
        } else {
            self.remaining_steps_for_recover = Some(remaining);
            PersonState::I
        }
    }

    /// Commits the state buffered by [`Person::eval_next_state`].
    pub fn update_state(&mut self) -> Result<(), SimError> {
        match self.next_state.take() {
            Some(next_state) => {
                self.state = next_state;
                Ok(())
            }
            None => Err(SimError::ProtocolViolation(
                "the next state has not been evaluated yet".to_string(),
            )),
        }
    }

    pub fn snapshot(&self) -> PersonSnapshot {
        PersonSnapshot {
            state: self.state,
            position: self.position,
            remaining_steps_for_onset: self.remaining_steps_for_onset,
            remaining_steps_for_recover: self.remaining_steps_for_recover,
        }
    }

    /// Overwrites the mutable fields of this person from a snapshot and drops any pending
    /// evaluation.
    ///
    /// Fails without touching the person if [`PersonSnapshot::validate`] does.
    pub fn restore(&mut self, snapshot: PersonSnapshot) -> Result<(), SimError> {
        snapshot.validate()?;
        self.state = snapshot.state;
        self.position = snapshot.position;
        self.remaining_steps_for_onset = snapshot.remaining_steps_for_onset;
        self.remaining_steps_for_recover = snapshot.remaining_steps_for_recover;
        self.next_state = None;
        Ok(())
    }
}
