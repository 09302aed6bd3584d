use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use genome_traversal::{
    ClaimRegistry, GenomeLoc, NoopClaimRegistry, ProcessingLoc, SharedMemoryClaimRegistry,
};

fn loc(idx: u64) -> GenomeLoc {
    GenomeLoc::new("chr1", idx * 100 + 1, idx * 100 + 100).unwrap()
}

#[test]
fn concurrent_polling_loses_nothing() {
    let registry = Arc::new(SharedMemoryClaimRegistry::new());
    let writers: Vec<_> = (0..4u64)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for idx in 0..50 {
                    let owner = format!("w{worker}");
                    let claim = ProcessingLoc::at(loc(worker * 50 + idx), owner, idx).unwrap();
                    registry.register(vec![claim]).unwrap();
                }
            })
        })
        .collect();

    let poller = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            let mut seen = Vec::new();
            while seen.len() < 200 {
                seen.extend(registry.poll_new().unwrap());
                thread::yield_now();
            }
            seen
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    let seen = poller.join().unwrap();
    assert_eq!(seen.len(), 200);
    assert!(registry.poll_new().unwrap().is_empty());

    let mut per_owner: HashMap<String, Vec<u64>> = HashMap::new();
    for record in &seen {
        per_owner.entry(record.owner().to_string()).or_default().push(record.timestamp_ms());
    }
    for stamps in per_owner.values() {
        assert_eq!(stamps, &(0..50).collect::<Vec<u64>>(), "records of one writer stay in order");
    }
}

#[test]
fn competing_workers_partition_the_candidates() {
    let registry = Arc::new(SharedMemoryClaimRegistry::new());
    let candidates: Arc<Vec<GenomeLoc>> = Arc::new((0..40).map(loc).collect());
    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            let candidates = Arc::clone(&candidates);
            thread::spawn(move || {
                let owner = format!("w{worker}");
                let mut won = Vec::new();
                while let Some(loc) = registry.claim_next_available(&candidates, &owner).unwrap() {
                    won.push(loc);
                }
                won
            })
        })
        .collect();

    let mut all: Vec<GenomeLoc> = workers
        .into_iter()
        .flat_map(|worker| worker.join().unwrap())
        .collect();
    assert_eq!(all.len(), 40);
    all.sort_by_key(GenomeLoc::start);
    assert_eq!(all, *candidates);
    for loc in candidates.iter() {
        assert!(registry.is_claimed(loc).unwrap());
    }
}

#[test]
fn duplicate_registrations_are_all_visible_once() {
    let registry = Arc::new(SharedMemoryClaimRegistry::new());
    let workers: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|owner| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry
                    .register(vec![ProcessingLoc::new(loc(7), owner).unwrap()])
                    .unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let mut owners: Vec<String> = registry
        .poll_new()
        .unwrap()
        .iter()
        .map(|record| record.owner().to_string())
        .collect();
    owners.sort();
    assert_eq!(owners, vec!["a", "b"]);
    assert!(registry.poll_new().unwrap().is_empty());

    let winner = registry.owner_of(&loc(7)).unwrap().unwrap();
    assert!(winner.is_owned_by("a") || winner.is_owned_by("b"));
}

#[test]
fn noop_registry_reports_everything_unclaimed() {
    let registry = NoopClaimRegistry;
    registry.register(vec![ProcessingLoc::new(loc(1), "a").unwrap()]).unwrap();
    assert!(!registry.is_claimed(&loc(1)).unwrap());
    assert!(registry.poll_new().unwrap().is_empty());
    assert!(registry.claim(&loc(1), "b").unwrap().is_owned_by("b"));
}
