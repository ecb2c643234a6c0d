//! Concurrent scanners and gate consumers sharing one router

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use bagrouter::error::ScanLogError;
use bagrouter::{
    Lane, MemoryScanLog, MemorySnapshotStore, Router, RoutingOutcome, RoutingPolicy, ScanRecord,
    ScanRecordSink,
};

const SCANNERS: usize = 4;
const BAGS_PER_SCANNER: usize = 250;
const GATES: [&str; 3] = ["G1", "G2", "G3"];

#[test]
fn test_no_bag_lost_or_delivered_twice() {
    let router = Arc::new(
        Router::builder()
            .policy(RoutingPolicy::new(usize::MAX).with_allowed_gates(GATES))
            .snapshot_store(MemorySnapshotStore::new())
            .build()
            .unwrap(),
    );

    let scanners: Vec<_> = (0..SCANNERS)
        .map(|s| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                for i in 0..BAGS_PER_SCANNER {
                    let gate = GATES[i % GATES.len()];
                    let outcome = router
                        .scan(&format!("S{s}-BAG{i}"), Some(gate), i % 4 == 0)
                        .unwrap();
                    assert!(matches!(outcome, RoutingOutcome::Enqueued { .. }));
                }
            })
        })
        .collect();

    let consumers: Vec<_> = GATES
        .into_iter()
        .map(|gate| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                let mut delivered = Vec::new();
                for _ in 0..2000 {
                    if let Some(bag) = router.next_bag(gate).unwrap() {
                        delivered.push(bag.into_inner());
                    }
                }
                delivered
            })
        })
        .collect();

    for handle in scanners {
        handle.join().unwrap();
    }
    let mut delivered: Vec<String> = consumers
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    // drain whatever the consumers did not reach
    for gate in GATES {
        while let Some(bag) = router.next_bag(gate).unwrap() {
            delivered.push(bag.into_inner());
        }
    }

    let unique: BTreeSet<_> = delivered.iter().cloned().collect();
    assert_eq!(delivered.len(), SCANNERS * BAGS_PER_SCANNER);
    assert_eq!(unique.len(), delivered.len(), "a bag was delivered twice");
}

#[test]
fn test_racing_scans_of_same_bag_enqueue_once() {
    let router = Arc::new(Router::builder().build().unwrap());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                (0..100)
                    .filter(|i| {
                        let gate = if t % 2 == 0 { "G1" } else { "G2" };
                        router.scan(&format!("BAG{i}"), Some(gate), false).unwrap()
                            != RoutingOutcome::Duplicate
                    })
                    .count()
            })
        })
        .collect();

    let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(accepted, 100);
    assert_eq!(router.count_bags("G1") + router.count_bags("G2"), 100);
}

#[test]
fn test_capacity_holds_under_contention() {
    let max = 50;
    let router = Arc::new(
        Router::builder()
            .policy(RoutingPolicy::new(max))
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                for i in 0..100 {
                    router
                        .scan(&format!("T{t}-{i}"), Some("G1"), t % 2 == 0)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(router.count_bags("G1"), max);
    assert_eq!(router.view_buffer().len(), 400 - max);
}

#[test]
fn test_scan_record_sequence_is_gapless() {
    let log = MemoryScanLog::new();
    let router = Arc::new(Router::builder().scan_sink(log.clone()).build().unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                for i in 0..50 {
                    // every tenth bag is rescanned to mix in duplicates
                    let bag = format!("T{t}-{}", i - i % 10);
                    router.scan(&bag, Some("G1"), false).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let records = log.records();
    assert_eq!(records.len(), 200);
    for (expected, record) in records.iter().enumerate() {
        assert_eq!(record.sequence, expected as u64);
    }
}

/// Sink that panics on one bag, poisoning the router lock mid-scan
struct PanickingSink {
    bag_id: &'static str,
}

impl ScanRecordSink for PanickingSink {
    fn emit(&mut self, record: &ScanRecord) -> Result<(), ScanLogError> {
        if record.bag_id == self.bag_id {
            panic!("sink failure for {}", record.bag_id);
        }
        Ok(())
    }
}

#[test]
fn test_router_usable_after_panic_while_locked() {
    let router = Arc::new(
        Router::builder()
            .scan_sink(PanickingSink { bag_id: "BOOM" })
            .build()
            .unwrap(),
    );

    let panicking = {
        let router = Arc::clone(&router);
        thread::spawn(move || {
            let _ = router.scan("BOOM", Some("G1"), false);
        })
    };
    assert!(panicking.join().is_err(), "scan of BOOM should have panicked");

    // routing ran before the sink, so the bag is queued and remembered
    assert!(router.has_seen("BOOM"));
    assert_eq!(router.count_bags("G1"), 1);

    assert_eq!(
        router.scan("OK", Some("G1"), false).unwrap(),
        RoutingOutcome::Enqueued { lane: Lane::Regular }
    );
    assert_eq!(router.count_bags("G1"), 2);
    assert_eq!(router.stats().counters.scanned, 2);
}
