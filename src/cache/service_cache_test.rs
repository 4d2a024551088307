use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use super::*;
use crate::Error;
use crate::ServiceAddress;
use crate::UNFETCHED_VERSION;

fn addr(
    host: &str,
    port: u16,
) -> ServiceAddress {
    ServiceAddress::new(host, port)
}

#[test]
fn watch_should_initialize_unfetched_entry() {
    let cache = ServiceCache::new();
    cache.watch("svc1");

    assert!(cache.is_watched("svc1"));
    assert_eq!(cache.version("svc1"), UNFETCHED_VERSION);
    assert!(cache.snapshot("svc1").unwrap().addresses.is_empty());
    assert_eq!(cache.global_version(), UNFETCHED_VERSION);
}

#[test]
fn rewatch_should_keep_existing_snapshot() {
    let cache = ServiceCache::new();
    cache.watch("svc1");
    cache.replace("svc1", 4, vec![addr("10.0.0.1", 8080)]);
    cache.watch("svc1");

    assert_eq!(cache.version("svc1"), 4);
    assert_eq!(cache.snapshot("svc1").unwrap().addresses.len(), 1);
}

#[test]
fn replace_should_ignore_unwatched_names() {
    let cache = ServiceCache::new();
    cache.replace("ghost", 3, vec![addr("10.0.0.1", 8080)]);

    assert!(!cache.is_watched("ghost"));
    assert_eq!(cache.version("ghost"), UNFETCHED_VERSION);
}

#[test]
fn unwatch_should_drop_entry() {
    let cache = ServiceCache::new();
    cache.watch("svc1");
    cache.unwatch("svc1");

    assert!(!cache.is_watched("svc1"));
    assert!(cache.names().is_empty());
}

#[test]
fn names_should_be_sorted() {
    let cache = ServiceCache::new();
    for name in ["svc3", "svc1", "svc2"] {
        cache.watch(name);
    }
    assert_eq!(cache.names(), vec!["svc1", "svc2", "svc3"]);
}

#[test]
fn random_address_should_pick_from_primary_list() {
    let cache = ServiceCache::new();
    cache.watch("svc1");
    cache.set_failover("svc1", vec![addr("backup", 9000)]);
    let primary = vec![addr("10.0.0.1", 8080), addr("10.0.0.2", 8080)];
    cache.replace("svc1", 2, primary.clone());

    for _ in 0..100 {
        let picked = cache.random_address("svc1").unwrap();
        assert!(primary.contains(&picked));
    }
}

#[test]
fn random_address_should_fall_back_to_failover_when_primary_empty() {
    let cache = ServiceCache::new();
    cache.watch("svc1");
    cache.set_failover("svc1", vec![addr("backup", 9000)]);

    assert_eq!(cache.random_address("svc1").unwrap(), addr("backup", 9000));
}

#[test]
fn random_address_should_fail_when_nothing_available() {
    let cache = ServiceCache::new();
    cache.watch("svc1");

    match cache.random_address("svc1") {
        Err(Error::NoProvider { name }) => assert_eq!(name, "svc1"),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(matches!(
        cache.random_address("never_watched"),
        Err(Error::NoProvider { .. })
    ));
}

#[test]
fn global_version_should_invalidate_to_unfetched() {
    let cache = ServiceCache::new();
    cache.set_global_version(17);
    assert_eq!(cache.global_version(), 17);

    cache.invalidate_global_version();
    assert_eq!(cache.global_version(), UNFETCHED_VERSION);
}

#[test]
fn concurrent_readers_should_never_observe_torn_replace() {
    let cache = Arc::new(ServiceCache::new());
    cache.watch("svc1");

    let old: Vec<ServiceAddress> = (0..8).map(|i| addr("old", 7000 + i)).collect();
    let new: Vec<ServiceAddress> = (0..3).map(|i| addr("new", 8000 + i)).collect();
    cache.replace("svc1", 1, old.clone());

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = cache.clone();
            let stop = stop.clone();
            let (old, new) = (old.clone(), new.clone());
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let snapshot = cache.snapshot("svc1").unwrap();
                    match snapshot.version {
                        1 => assert_eq!(snapshot.addresses, old),
                        2 => assert_eq!(snapshot.addresses, new),
                        v => panic!("unexpected version {v}"),
                    }
                    let picked = cache.random_address("svc1").unwrap();
                    assert!(old.contains(&picked) || new.contains(&picked));
                }
            })
        })
        .collect();

    for round in 0..2_000 {
        if round % 2 == 0 {
            cache.replace("svc1", 2, new.clone());
        } else {
            cache.replace("svc1", 1, old.clone());
        }
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        reader.join().expect("reader observed a torn snapshot");
    }
}
