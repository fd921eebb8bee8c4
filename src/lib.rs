//! A Markov-chain SEIR simulation of disease spread across a network of cities
//!
//! The population is a list of agents, each located in a city and carrying one of four
//! disease states: susceptible, exposed, infectious or recovered. Cities form a directed
//! mobility graph. Groups of cities lock down when the share of infectious people inside them
//! reaches a threshold, which closes the edges out of and into the group until the share
//! drops again.
//!
//! The central object is the [`World`], which advances the whole population by one discrete
//! step with [`World::update`]. A step evaluates the lockdown policy, moves every person, tallies
//! every city, and then updates every person's state synchronously using an
//! evaluate-then-commit protocol so that no agent observes a transition made in the same step.
//!
//! Randomness is never global: every sampling operation takes an explicit generator, so a run
//! is reproducible from its seed.
//!
//! The modules around the core read the input tables ([`load`]), write and restore
//! snapshots ([`snapshot`]), write per-step state counts ([`report`]) and drive a full run from
//! a configuration file ([`config`], [`runner`]).
pub mod city;
pub mod config;
pub mod error;
pub mod load;
pub mod log;
pub mod person;
#[cfg(feature = "progress_bar")]
pub mod progress;
pub mod random;
pub mod report;
pub mod runner;
pub mod snapshot;
pub mod world;

pub use city::{City, CityGroup, CityId};
pub use error::SimError;
pub use person::{
    InfectionPolicy, Person, PersonParameters, PersonSnapshot, PersonState, StateCounts,
};
pub use world::World;

// Deterministic hashing for name lookups.
pub use rustc_hash::FxHashMap as HashMap;

// Re-export for use in generic code.
pub use rand;
