// tests/change_coalescing.rs

mod common;
use crate::common::{copy_rule, input, output, Harness};

use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;

use proptest::prelude::*;
use watchtree::engine::ChangeQueue;
use watchtree::fs::mock::MockFileSystem;
use watchtree::types::ChangeKind;

type TestResult = Result<(), Box<dyn Error>>;

fn kind_strategy() -> impl Strategy<Value = ChangeKind> {
    prop_oneof![
        Just(ChangeKind::Written),
        Just(ChangeKind::Deleted),
        Just(ChangeKind::Renamed),
        Just(ChangeKind::MetadataChanged),
    ]
}

#[test]
fn burst_on_one_path_collapses_to_latest() {
    let mut queue = ChangeQueue::new(true);
    queue.record(input("a.md"), ChangeKind::Written);
    queue.record(input("b.md"), ChangeKind::Written);
    queue.record(input("a.md"), ChangeKind::Deleted);
    queue.record(input("a.md"), ChangeKind::Written);

    assert_eq!(queue.len(), 2);
    assert_eq!(queue.coalesced(), 2);
    assert_eq!(
        queue.drain_pending(),
        vec![
            (input("a.md"), ChangeKind::Written),
            (input("b.md"), ChangeKind::Written),
        ]
    );
    assert!(queue.is_empty());
}

#[test]
fn disabled_coalescing_keeps_every_notification() {
    let mut queue = ChangeQueue::new(false);
    for _ in 0..3 {
        queue.record(input("a.md"), ChangeKind::Written);
    }
    assert_eq!(queue.len(), 3);
    assert_eq!(queue.coalesced(), 0);
}

#[test]
fn three_rapid_writes_yield_final_content() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(input("a.md"), "v1");
    let mut h = Harness::new(fs, copy_rule("a.md", "a.out"));
    h.scheduler.build()?;
    h.fs.clear_writes();

    let mut queue = ChangeQueue::new(true);
    for content in ["v2", "v3", "v4"] {
        h.fs.add_file(input("a.md"), content);
        queue.record(input("a.md"), ChangeKind::Written);
    }
    for (path, kind) in queue.drain_pending() {
        h.scheduler.handle_change(&path, kind)?;
    }

    assert_eq!(h.fs.writes(), vec![output("a.out")]);
    assert_eq!(h.text(output("a.out")).as_deref(), Some("v4"));
    Ok(())
}

proptest! {
    #[test]
    fn drain_keeps_first_arrival_order_and_last_kind(
        events in proptest::collection::vec((0..5usize, kind_strategy()), 0..40),
    ) {
        let mut queue = ChangeQueue::new(true);
        let mut order: Vec<PathBuf> = Vec::new();
        let mut last: HashMap<PathBuf, ChangeKind> = HashMap::new();

        for (index, kind) in &events {
            let path = input(&format!("f{index}.md"));
            if !order.contains(&path) {
                order.push(path.clone());
            }
            last.insert(path.clone(), *kind);
            queue.record(path, *kind);
        }

        let drained = queue.drain_pending();
        prop_assert_eq!(queue.coalesced(), events.len() - order.len());
        let paths: Vec<PathBuf> = drained.iter().map(|(p, _)| p.clone()).collect();
        prop_assert_eq!(paths, order);
        for (path, kind) in drained {
            prop_assert_eq!(Some(&kind), last.get(&path));
        }
    }
}
