use std::path::PathBuf;

use seir_markov_lockdown::load::{load_world, InputFiles};
use seir_markov_lockdown::random::rng_from_seed;
use seir_markov_lockdown::snapshot::snapshot_records;
use seir_markov_lockdown::{
    City, CityGroup, CityId, InfectionPolicy, Person, PersonParameters, PersonState, World,
};

fn fixture_files() -> InputFiles {
    let data = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data");
    InputFiles {
        cities: data.join("cities.csv"),
        connections: data.join("connections.csv"),
        city_groups: data.join("city_groups.csv"),
        people: data.join("people.csv"),
    }
}

fn certain_parameters() -> PersonParameters {
    PersonParameters {
        p_infection: 1.0,
        p_staying: 1.0,
        action_regulation: 1.0,
        steps_for_onset: 1,
        steps_for_recover: 1,
    }
}

fn two_cities() -> Vec<City> {
    let mut a = City::new("A");
    let mut b = City::new("B");
    a.setup_initial_visitables([CityId(1)]).unwrap();
    b.setup_initial_visitables([CityId(0)]).unwrap();
    vec![a, b]
}

#[test]
fn exposure_onset_and_recovery_in_two_cities() {
    let people = vec![
        Person::new(
            CityId(0),
            PersonState::I,
            certain_parameters(),
            InfectionPolicy::Constant,
        )
        .unwrap(),
        Person::new(
            CityId(0),
            PersonState::S,
            certain_parameters(),
            InfectionPolicy::Constant,
        )
        .unwrap(),
    ];
    let mut world = World::new(people, two_cities(), Vec::new()).unwrap();
    let mut rng = rng_from_seed(0);

    world.update(&mut rng);
    let person = &world.people()[1];
    assert_eq!(person.state(), PersonState::E);
    assert_eq!(person.remaining_steps_for_onset(), Some(1));
    assert_eq!(world.people()[0].state(), PersonState::R);

    world.update(&mut rng);
    let person = &world.people()[1];
    assert_eq!(person.state(), PersonState::I);
    assert_eq!(person.remaining_steps_for_onset(), None);
    assert_eq!(person.remaining_steps_for_recover(), Some(1));

    world.update(&mut rng);
    let person = &world.people()[1];
    assert_eq!(person.state(), PersonState::R);
    assert_eq!(person.remaining_steps_for_recover(), None);
    assert!(world.people().iter().all(|p| p.position() == CityId(0)));
    assert_eq!(world.step(), 3);
}

#[test]
fn half_infectious_city_locks_its_group() {
    let states = [PersonState::I, PersonState::I, PersonState::S, PersonState::S];
    let people = states
        .into_iter()
        .map(|state| {
            Person::new(CityId(0), state, certain_parameters(), InfectionPolicy::Constant)
                .unwrap()
        })
        .collect();
    let group = CityGroup::new("a", [CityId(0)], 0.5).unwrap();
    let mut world = World::new(people, two_cities(), vec![group]).unwrap();

    world.evaluate_lockdown();
    assert!(world.city_groups()[0].in_lockdown());
    assert!(world.cities()[0].in_lockdown());
    assert!(world.cities()[0].current_visitables().is_empty());
    assert!(world.cities()[1].current_visitables().is_empty());
    assert!(!world.cities()[1].in_lockdown());
}

#[test]
fn group_reopens_when_infections_clear() {
    let states = [PersonState::I, PersonState::S];
    let people = states
        .into_iter()
        .map(|state| {
            Person::new(CityId(0), state, certain_parameters(), InfectionPolicy::Constant)
                .unwrap()
        })
        .collect();
    let group = CityGroup::new("a", [CityId(0)], 0.5).unwrap();
    let mut world = World::new(people, two_cities(), vec![group]).unwrap();
    let mut rng = rng_from_seed(1);

    // Step 1 locks A (1 of 2 infectious). The infectious person recovers and the other is
    // exposed.
    world.update(&mut rng);
    assert!(world.cities()[0].in_lockdown());
    // Step 2 sees nobody infectious and reopens A.
    world.update(&mut rng);
    assert!(!world.city_groups()[0].in_lockdown());
    assert!(world.cities()[0].current_visitables().contains(&CityId(1)));
    assert!(world.cities()[1].current_visitables().contains(&CityId(0)));
}

#[test]
fn population_is_conserved_on_fixture_tables() {
    let (mut world, _) = load_world(&fixture_files(), InfectionPolicy::Constant).unwrap();
    let population = world.people().len();
    let mut rng = rng_from_seed(42);
    for _ in 0..50 {
        world.update(&mut rng);
        let tallies = world.counts_by_city();
        assert_eq!(
            tallies.iter().map(|counts| counts.total()).sum::<usize>(),
            population
        );
        for (index, counts) in tallies.iter().enumerate() {
            assert_eq!(*counts, world.counts_in_city(CityId(index)));
        }
    }
}

#[test]
fn same_seed_same_snapshots() {
    for policy in [InfectionPolicy::Constant, InfectionPolicy::PopulationDependent] {
        let run = |seed: u64| {
            let (mut world, _) = load_world(&fixture_files(), policy).unwrap();
            let mut rng = rng_from_seed(seed);
            let mut history = Vec::new();
            for _ in 0..25 {
                world.update(&mut rng);
                history.push(snapshot_records(&world));
            }
            history
        };
        assert_eq!(run(2024), run(2024));
    }
}

#[test]
fn recovered_people_never_change() {
    let (mut world, _) = load_world(&fixture_files(), InfectionPolicy::Constant).unwrap();
    let recovered: Vec<usize> = world
        .people()
        .iter()
        .enumerate()
        .filter(|(_, person)| person.state() == PersonState::R)
        .map(|(index, _)| index)
        .collect();
    assert!(!recovered.is_empty());

    let mut rng = rng_from_seed(9);
    for _ in 0..20 {
        world.update(&mut rng);
        for &index in &recovered {
            assert_eq!(world.people()[index].state(), PersonState::R);
        }
    }
}
