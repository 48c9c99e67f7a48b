use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use invaders_engine::{
    Bounds, CollisionConfig, Entity, EntityId, EntityManager, EntityPatch, Rng, Vec2,
};
use rstest::rstest;

const WORLD: f32 = 2000.0;

fn random_entity(rng: &mut Rng) -> Entity {
    let w = rng.range(2.0, 40.0);
    let h = rng.range(2.0, 40.0);
    Entity::new(rng.range(0.0, WORLD), rng.range(0.0, WORLD), w, h).unwrap()
}

fn brute_force(manager: &EntityManager) -> BTreeSet<(EntityId, EntityId)> {
    let active: Vec<&Entity> = manager.iter().filter(|e| e.is_active()).collect();
    let mut pairs = BTreeSet::new();
    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            if a.bounds().intersects(&b.bounds()) {
                pairs.insert((a.id().min(b.id()), a.id().max(b.id())));
            }
        }
    }
    pairs
}

fn detected(manager: &mut EntityManager) -> Vec<(EntityId, EntityId)> {
    manager
        .detect_collisions()
        .unwrap()
        .into_iter()
        .map(|r| {
            assert!(r.collided);
            assert!(r.entity_a < r.entity_b);
            (r.entity_a, r.entity_b)
        })
        .collect()
}

#[rstest]
#[case(1, 10.0)]
#[case(2, 50.0)]
#[case(3, 50.0)]
#[case(4, 137.0)]
#[case(5, 1000.0)]
fn grid_sweep_matches_brute_force(#[case] seed: u64, #[case] cell_size: f32) {
    let mut rng = Rng::new(seed);
    let mut manager = EntityManager::new(CollisionConfig { cell_size });
    let mut ids = Vec::new();
    for _ in 0..300 {
        ids.push(manager.add_entity(random_entity(&mut rng)).unwrap());
    }

    for round in 0..5 {
        // Move, resize, deactivate and remove a random subset between sweeps.
        for &id in &ids {
            match rng.next_int(10) {
                0 => {
                    manager.remove_entity(id);
                }
                1 => {
                    let patch = EntityPatch {
                        size: Some(Vec2::new(rng.range(1.0, 80.0), rng.range(1.0, 80.0))),
                        ..EntityPatch::default()
                    };
                    let _ = manager.update_entity(id, patch);
                }
                2 => {
                    let _ = manager.modify(id, |e| e.deactivate());
                }
                3 | 4 => {
                    let patch = EntityPatch::position(rng.range(-50.0, WORLD), rng.range(-50.0, WORLD));
                    let _ = manager.update_entity(id, patch);
                }
                _ => {}
            }
        }

        let got = detected(&mut manager);
        let sorted: Vec<_> = {
            let mut s = got.clone();
            s.sort();
            s
        };
        assert_eq!(got, sorted, "results must come back sorted");

        let expected = brute_force(&manager);
        let got_set: BTreeSet<_> = got.iter().copied().collect();
        assert_eq!(got_set.len(), got.len(), "duplicate pair in round {round}");
        assert_eq!(got_set, expected, "seed {seed} round {round}");

        let rebuilt: Vec<_> = manager
            .detect_collisions_rebuild()
            .unwrap()
            .into_iter()
            .map(|r| (r.entity_a, r.entity_b))
            .collect();
        assert_eq!(rebuilt, got);
    }
}

#[test]
fn touching_grid_aligned_boxes_are_found() {
    // Shared edge lies exactly on a cell boundary.
    let mut manager = EntityManager::new(CollisionConfig { cell_size: 10.0 });
    let a = manager.add_entity(Entity::new(0.0, 0.0, 10.0, 10.0).unwrap()).unwrap();
    let b = manager.add_entity(Entity::new(10.0, 0.0, 10.0, 10.0).unwrap()).unwrap();
    let c = manager.add_entity(Entity::new(10.0, 10.0, 10.0, 10.0).unwrap()).unwrap();
    let found = detected(&mut manager);
    let mut expected = vec![(a, b), (a, c), (b, c)];
    expected.sort();
    assert_eq!(found, expected);
}

#[test]
fn region_query_matches_scan() {
    let mut rng = Rng::new(99);
    let mut manager = EntityManager::default();
    for _ in 0..200 {
        manager.add_entity(random_entity(&mut rng)).unwrap();
    }
    let region = Bounds::new(400.0, 300.0, 900.0, 700.0);
    let mut via_grid: Vec<_> = manager
        .entities_in_region(&region)
        .into_iter()
        .map(|e| e.id())
        .collect();
    via_grid.sort();
    let mut via_scan: Vec<_> = manager
        .iter()
        .filter(|e| e.bounds().intersects(&region))
        .map(|e| e.id())
        .collect();
    via_scan.sort();
    assert_eq!(via_grid, via_scan);
}

#[test]
fn thousand_entities_sweep_is_fast_and_exact() {
    let mut rng = Rng::new(1000);
    let mut manager = EntityManager::default();
    for _ in 0..1000 {
        let entity = Entity::new(rng.range(0.0, 800.0), rng.range(0.0, 600.0), 16.0, 16.0).unwrap();
        manager.add_entity(entity).unwrap();
    }

    let start = Instant::now();
    let got = detected(&mut manager);
    let elapsed = start.elapsed();

    assert!(
        elapsed < Duration::from_secs(1),
        "sweep took {elapsed:?}"
    );
    let expected = brute_force(&manager);
    assert_eq!(got.into_iter().collect::<BTreeSet<_>>(), expected);

    let metrics = manager.metrics();
    assert_eq!(metrics.entities, 1000);
    assert_eq!(metrics.active, 1000);
    assert_eq!(metrics.collisions, expected.len());
    assert!(metrics.candidate_pairs >= metrics.collisions);
}

#[rstest]
#[case(1e4)]
#[case(1e6)]
#[case(3e38)]
fn huge_entity_sweep_is_bounded_and_exact(#[case] side: f32) {
    let mut rng = Rng::new(7);
    let mut manager = EntityManager::new(CollisionConfig { cell_size: 10.0 });
    let big = manager
        .add_entity(Entity::new(-side / 2.0, -side / 2.0, side, side).unwrap())
        .unwrap();
    for _ in 0..100 {
        manager.add_entity(random_entity(&mut rng)).unwrap();
    }
    manager
        .add_entity(Entity::new(-side, -side, 5.0, 5.0).unwrap())
        .unwrap();

    let start = Instant::now();
    let got = detected(&mut manager);
    assert!(start.elapsed() < Duration::from_secs(1), "sweep took {:?}", start.elapsed());
    assert_eq!(manager.grid().oversized_count(), 1);
    assert!(got.iter().any(|&(a, b)| a == big || b == big));
    assert_eq!(got.iter().copied().collect::<BTreeSet<_>>(), brute_force(&manager));

    let rebuilt: Vec<_> = manager
        .detect_collisions_rebuild()
        .unwrap()
        .into_iter()
        .map(|r| (r.entity_a, r.entity_b))
        .collect();
    assert_eq!(rebuilt, got);

    assert!(manager.remove_entity(big));
    assert_eq!(manager.grid().oversized_count(), 0);
}
