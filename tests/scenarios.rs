use std::collections::HashSet;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use foldhash::fast::RandomState;
use rand::{rngs::StdRng, Rng, SeedableRng};
use sphash::*;

#[test]
fn test_map_scenario() {
    let mut builder = SphMapBuilder::new();
    builder.add(5u32, 50u32);
    builder.add(17, 170);
    builder.add(42, 420);
    builder.add(1000, 10000);
    let stats = builder.build().unwrap();
    assert_eq!(stats.num_keys, 4);

    let map = SphMap::<u32, u32>::from_bytes(&builder.save_to_memory().unwrap()).unwrap();
    assert_eq!(map.get(&42), Some(420));
    assert_eq!(map.get(&99), None);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.bin");
    builder.save_to_file(&path).unwrap();

    let mut fresh = SphMap::<u32, u32>::new();
    fresh.load_from_file(&path).unwrap();
    for (k, v) in [(5, 50), (17, 170), (42, 420), (1000, 10000)] {
        assert_eq!(fresh.get(&k), Some(v));
    }
    assert_eq!(fresh.get(&99), None);
}

#[test]
fn test_set_scenario() {
    let mut builder = SphSetBuilder::new();
    for key in 0u64..100 {
        builder.add(key);
    }
    let stats = builder.build().unwrap();
    assert!(stats.retry_count < 3);

    let set = SphSet::<u64>::from_bytes(&builder.save_to_memory().unwrap()).unwrap();
    assert!((0u64..100).all(|key| set.contains(&key)));
    assert!(!set.contains(&100));
}

#[test]
fn test_negative_cross_check() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut members: HashSet<u64, RandomState> = HashSet::with_hasher(RandomState::default());
    while members.len() < 20_000 {
        members.insert(rng.random());
    }

    let mut builder = SphMapBuilder::with_capacity(members.len());
    builder.extend(members.iter().map(|&k| (k, k.rotate_left(7))));
    builder.build().unwrap();
    let map = SphMap::<u64, u64>::from_bytes(&builder.save_to_memory().unwrap()).unwrap();

    for &key in &members {
        assert_eq!(map.get(&key), Some(key.rotate_left(7)));
    }
    for _ in 0..100_000 {
        let probe: u64 = rng.random();
        assert_eq!(map.contains_key(&probe), members.contains(&probe));
    }
    // Neighbours of members are the likeliest to share slots.
    for &key in members.iter().take(1000) {
        let probe = key.wrapping_add(1);
        assert_eq!(map.get(&probe).is_some(), members.contains(&probe));
    }
}

#[test]
fn test_bijection_over_slots() {
    let keys: Vec<u64> = (0..10_000u64).map(|i| i.wrapping_mul(0x9e3779b97f4a7c15)).collect();
    let mut builder: SphSetBuilder<u64> = keys.iter().copied().collect();
    let stats = builder.build().unwrap().clone();
    let set = SphSet::<u64>::from_bytes(&builder.save_to_memory().unwrap()).unwrap();

    let mut seen = vec![false; keys.len()];
    for key in &keys {
        let slot = set.slot_of(key).unwrap();
        assert!(slot < keys.len());
        assert!(!seen[slot], "slot {slot} used twice");
        seen[slot] = true;
    }
    assert!(seen.into_iter().all(|s| s));

    let n = keys.len();
    let allowed = [n, (n as f64 * 1.5).ceil() as usize, n * 2];
    assert!(allowed.contains(&(stats.num_buckets as usize)));
    assert_eq!(
        stats.space_overhead,
        (stats.num_buckets as f64 - n as f64) / n as f64 * 100.0
    );
    assert_eq!(stats.num_buckets as usize, allowed[stats.retry_count as usize]);
    assert!(stats.max_bucket_size >= 1);
    assert!(stats.empty_buckets < stats.num_buckets);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
struct Point {
    x: u32,
    y: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Payload {
    weight: f32,
    id: u32,
    tag: [u8; 8],
}

#[test]
fn test_struct_keys_and_values() {
    let mut builder = SphMapBuilder::new();
    for x in 0..40u32 {
        for y in 0..25u32 {
            let payload = Payload {
                weight: x as f32 * 0.5,
                id: x * 100 + y,
                tag: *b"payload!",
            };
            builder.add(Point { x, y }, payload);
        }
    }
    builder.build().unwrap();
    let bytes = builder.save_to_memory().unwrap();
    let map = SphMap::<Point, Payload>::from_bytes(&bytes).unwrap();

    assert_eq!(map.header().key_size, 8);
    assert_eq!(map.len(), 1000);
    let found = map.get(&Point { x: 12, y: 7 }).unwrap();
    assert_eq!(found.id, 1207);
    assert_eq!(found.weight, 6.0);
    assert_eq!(&found.tag, b"payload!");
    assert_eq!(map.get(&Point { x: 40, y: 0 }), None);
}

#[test]
fn test_concurrent_readers() {
    const N: u64 = 50_000;
    const P: u64 = 8;

    let mut builder: SphMapBuilder<u64, u64> = (0..N).map(|i| (i, i * 3)).collect();
    builder.build().unwrap();
    let map = Arc::new(SphMap::<u64, u64>::from_bytes(&builder.save_to_memory().unwrap()).unwrap());

    let mut threads = Vec::with_capacity(P as usize);
    for i in 0..P {
        const CHUNK: u64 = N / P;
        let range = CHUNK * i..CHUNK * (i + 1);
        let map = map.clone();
        threads.push(std::thread::spawn(move || {
            for v in range {
                assert_eq!(map.get(&v), Some(v * 3));
                assert_eq!(map.get(&(v + N)), None);
            }
        }));
    }

    for thread in threads {
        thread.join().unwrap();
    }
}

#[test]
fn test_custom_retry_policy() {
    let config = SphBuildConfig {
        bucket_multipliers: vec![2.0],
        max_displacement: MAX_DISPLACEMENT,
    };
    let mut builder: SphSetBuilder<u32> = (0..500).collect::<SphSetBuilder<u32>>().with_config(config);
    let stats = builder.build().unwrap();
    assert_eq!(stats.retry_count, 0);
    assert_eq!(stats.num_buckets, 1000);
    assert_eq!(stats.space_overhead, 100.0);
    assert_eq!(builder.config().bucket_multipliers, vec![2.0]);
}
