use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use seir_markov_lockdown::random::rng_from_seed;
use seir_markov_lockdown::{
    City, CityGroup, CityId, InfectionPolicy, Person, PersonParameters, PersonState, World,
};

static CITIES: usize = 50;
static POPULATION: usize = 10_000;
static GROUP_SIZE: usize = 5;
static SEED: u64 = 123;

/// A ring of cities where every city also reaches the city halfway around the ring, with
/// one infectious person in every hundred.
fn synthetic_world(policy: InfectionPolicy) -> World {
    let cities = (0..CITIES)
        .map(|index| {
            let mut city = City::new(format!("city-{index}"));
            let neighbors = [
                (index + 1) % CITIES,
                (index + CITIES - 1) % CITIES,
                (index + CITIES / 2) % CITIES,
            ];
            city.setup_initial_visitables(neighbors.map(CityId))
                .expect("fresh city");
            city
        })
        .collect();

    let groups = (0..CITIES / GROUP_SIZE)
        .map(|group| {
            let members = (group * GROUP_SIZE..(group + 1) * GROUP_SIZE).map(CityId);
            CityGroup::new(format!("group-{group}"), members, 0.05).expect("valid threshold")
        })
        .collect();

    let parameters = PersonParameters {
        p_infection: 0.3,
        p_staying: 0.7,
        action_regulation: 0.4,
        steps_for_onset: 3,
        steps_for_recover: 7,
    };
    let people = (0..POPULATION)
        .map(|index| {
            let state = if index % 100 == 0 {
                PersonState::I
            } else {
                PersonState::S
            };
            Person::new(CityId(index % CITIES), state, parameters.clone(), policy)
                .expect("valid parameters")
        })
        .collect();

    World::new(people, cities, groups).expect("consistent world")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    for (name, policy) in [
        ("world update constant", InfectionPolicy::Constant),
        (
            "world update population dependent",
            InfectionPolicy::PopulationDependent,
        ),
    ] {
        c.bench_function(name, |bencher| {
            bencher.iter_batched(
                || (synthetic_world(policy), rng_from_seed(SEED)),
                |(mut world, mut rng)| {
                    for _ in 0..10 {
                        world.update(&mut rng);
                    }
                    world
                },
                BatchSize::LargeInput,
            );
        });
    }
}

criterion_group!(world_benches, criterion_benchmark);
criterion_main!(world_benches);
