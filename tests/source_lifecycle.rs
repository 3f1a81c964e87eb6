// tests/source_lifecycle.rs

mod common;
use crate::common::{
    copy_rule, input, output, scheduler, Harness, RecordingWatchBackend, INPUT, OUTPUT,
};

use std::error::Error;

use watchtree::errors::WatchtreeError;
use watchtree::fs::mock::MockFileSystem;
use watchtree::tree::{Context, Rule};
use watchtree::types::{ChangeKind, ReaderKind};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn missing_input_is_absent_until_it_appears() -> TestResult {
    let mut h = Harness::new(MockFileSystem::new(), copy_rule("later.txt", "later.out"));

    let step = h.scheduler.build()?;
    assert!(step.written.is_empty());
    let source = h
        .scheduler
        .source(&input("later.txt"), ReaderKind::File)
        .ok_or("source should exist")?;
    assert!(source.content().is_none());
    assert!(source.is_watched());
    assert!(matches!(
        h.scheduler.cached_bytes(&input("later.txt")),
        Err(WatchtreeError::SourceUnavailable(_))
    ));

    h.fs.add_file(input("later.txt"), "now");
    h.scheduler.handle_change(&input("later.txt"), ChangeKind::Written)?;
    assert_eq!(h.text(output("later.out")).as_deref(), Some("now"));
    assert_eq!(h.scheduler.cached_bytes(&input("later.txt"))?, b"now");
    Ok(())
}

#[test]
fn deleted_then_recreated_file_recovers() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(input("a.txt"), "one");
    let mut h = Harness::new(fs, copy_rule("a.txt", "a.out"));
    h.scheduler.build()?;

    h.fs.remove(input("a.txt"));
    let step = h.scheduler.handle_change(&input("a.txt"), ChangeKind::Deleted)?;
    assert_eq!(step.discarded, 1);
    assert!(h.backend.is_watching(INPUT));

    h.fs.clear_writes();
    h.fs.add_file(input("a.txt"), "two");
    h.scheduler.handle_change(&input("a.txt"), ChangeKind::Written)?;

    assert_eq!(h.fs.writes(), vec![output("a.out")]);
    assert_eq!(h.text(output("a.out")).as_deref(), Some("two"));
    Ok(())
}

#[test]
fn rename_away_clears_and_rename_onto_rereads() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(input("a.txt"), "one");
    let mut h = Harness::new(fs, copy_rule("a.txt", "a.out"));
    h.scheduler.build()?;

    h.fs.remove(input("a.txt"));
    h.scheduler.handle_change(&input("a.txt"), ChangeKind::Renamed)?;
    let source = h
        .scheduler
        .source(&input("a.txt"), ReaderKind::File)
        .ok_or("source should still be live")?;
    assert!(source.content().is_none());

    h.fs.add_file(input("a.txt"), "moved in");
    h.scheduler.handle_change(&input("a.txt"), ChangeKind::Renamed)?;
    assert_eq!(h.text(output("a.out")).as_deref(), Some("moved in"));
    Ok(())
}

#[test]
fn failed_reread_keeps_previous_content() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(input("a.txt"), "kept");
    let mut h = Harness::new(fs, copy_rule("a.txt", "a.out"));
    h.scheduler.build()?;
    h.fs.clear_writes();

    // Editors briefly remove a file during an atomic save.
    h.fs.remove(input("a.txt"));
    let step = h.scheduler.handle_change(&input("a.txt"), ChangeKind::Written)?;

    assert!(step.is_noop());
    assert_eq!(h.scheduler.cached_bytes(&input("a.txt"))?, b"kept");
    assert_eq!(h.fs.write_count(), 0);
    Ok(())
}

#[test]
fn torn_down_sources_ignore_late_events() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(input("switch.txt"), "on");
    fs.add_file(input("x.txt"), "X");
    let tree = Rule::read("switch.txt", |bytes| {
        if bytes == b"on" {
            vec![copy_rule("x.txt", "x.out")]
        } else {
            Vec::new()
        }
    });
    let mut h = Harness::new(fs, tree);
    h.scheduler.build()?;
    assert_eq!(h.scheduler.source_count(), 2);

    h.fs.add_file(input("switch.txt"), "off");
    h.scheduler.handle_change(&input("switch.txt"), ChangeKind::Written)?;
    assert_eq!(h.scheduler.source_count(), 1);
    assert!(h.scheduler.source(&input("x.txt"), ReaderKind::File).is_none());

    h.fs.clear_writes();
    h.fs.add_file(input("x.txt"), "X2");
    let step = h.scheduler.handle_change(&input("x.txt"), ChangeKind::Written)?;
    assert!(step.is_noop());
    assert_eq!(h.fs.write_count(), 0);
    Ok(())
}

#[test]
fn readers_of_one_path_share_a_source() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(input("shared.txt"), "S");
    let tree = Rule::sequence(vec![
        copy_rule("shared.txt", "one.out"),
        copy_rule("shared.txt", "two.out"),
    ]);
    let mut h = Harness::new(fs, tree);
    h.scheduler.build()?;

    assert_eq!(h.scheduler.source_count(), 1);
    assert_eq!(h.backend.watch_calls(INPUT), 1);

    h.fs.clear_writes();
    h.fs.add_file(input("shared.txt"), "S2");
    h.scheduler.handle_change(&input("shared.txt"), ChangeKind::Written)?;
    let mut writes = h.fs.writes();
    writes.sort();
    assert_eq!(writes, vec![output("one.out"), output("two.out")]);
    Ok(())
}

#[test]
fn deleted_input_directory_is_rewatched_when_recreated() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(input("a.md"), "A");
    let tree = Rule::read_directory_each(|name| copy_rule(name, &format!("{name}.out")));
    let mut h = Harness::new(fs, tree);
    h.scheduler.build()?;
    assert!(h.backend.is_watching(INPUT));

    h.fs.remove(INPUT);
    h.scheduler.handle_change(std::path::Path::new(INPUT), ChangeKind::Deleted)?;
    assert!(!h.backend.is_watching(INPUT));
    assert!(h.backend.is_watching("/site"));

    h.fs.clear_writes();
    h.fs.add_file(input("b.md"), "B");
    h.scheduler
        .handle_change(std::path::Path::new(INPUT), ChangeKind::Written)?;

    assert!(h.backend.is_watching(INPUT));
    assert_eq!(h.fs.writes(), vec![output("b.md.out")]);
    Ok(())
}

#[test]
fn deleted_parent_directory_is_observed_when_recreated() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(input("sub/b.md"), "B");
    let mut h = Harness::new(fs, copy_rule("sub/b.md", "b.out"));
    h.scheduler.build()?;
    assert_eq!(h.backend.active(), vec![input("sub")]);

    h.fs.remove(input("sub"));
    h.scheduler.handle_change(&input("sub/b.md"), ChangeKind::Deleted)?;
    let source = h
        .scheduler
        .source(&input("sub/b.md"), ReaderKind::File)
        .ok_or("source should still be live")?;
    assert!(source.is_pending());
    assert_eq!(h.backend.active(), vec![std::path::PathBuf::from(INPUT)]);

    h.fs.clear_writes();
    h.fs.add_file(input("sub/b.md"), "B2");
    h.scheduler.handle_change(&input("sub"), ChangeKind::Written)?;

    assert_eq!(h.backend.active(), vec![input("sub")]);
    assert_eq!(h.fs.writes(), vec![output("b.out")]);
    assert_eq!(h.text(output("b.out")).as_deref(), Some("B2"));
    Ok(())
}

#[test]
fn input_under_missing_directory_is_watched_once_it_exists() -> TestResult {
    let mut h = Harness::new(MockFileSystem::new(), copy_rule("nowhere/x.txt", "x.out"));
    h.scheduler.build()?;
    let source = h
        .scheduler
        .source(&input("nowhere/x.txt"), ReaderKind::File)
        .ok_or("source should exist")?;
    assert!(source.is_watched());
    assert!(source.is_pending());

    // The directory and file show up without any event reaching us.
    h.fs.add_file(input("nowhere/x.txt"), "X");
    h.scheduler.rebuild()?;

    let source = h
        .scheduler
        .source(&input("nowhere/x.txt"), ReaderKind::File)
        .ok_or("source should exist")?;
    assert!(source.is_watched());
    assert!(!source.is_pending());
    assert!(h.backend.is_watching(input("nowhere")));
    assert!(!h.backend.is_watching(INPUT));
    assert_eq!(h.text(output("x.out")).as_deref(), Some("X"));
    Ok(())
}

#[test]
fn unwatchable_path_is_not_fatal() -> TestResult {
    // No root directory at all, so there is no ancestor to fall back to.
    let fs = MockFileSystem::default();
    let backend = RecordingWatchBackend::new();
    let mut scheduler = scheduler(
        &fs,
        &backend,
        copy_rule("x.txt", "x.out"),
        Context::new(INPUT, OUTPUT),
    );

    scheduler.build()?;
    let source = scheduler
        .source(&input("x.txt"), ReaderKind::File)
        .ok_or("source should exist")?;
    assert!(!source.is_watched());

    fs.add_dir(INPUT);
    scheduler.rebuild()?;
    let source = scheduler
        .source(&input("x.txt"), ReaderKind::File)
        .ok_or("source should exist")?;
    assert!(source.is_watched());
    assert!(backend.is_watching(INPUT));
    Ok(())
}

#[test]
fn running_out_of_watch_handles_is_fatal() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(input("a/x.txt"), "X");
    fs.add_file(input("b/y.txt"), "Y");
    let tree = Rule::sequence(vec![
        copy_rule("a/x.txt", "x.out"),
        copy_rule("b/y.txt", "y.out"),
    ]);
    let backend = RecordingWatchBackend::new().with_limit(1);
    let mut h = Harness::with_backend(fs, backend, tree);

    let err = h.scheduler.build().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, WatchtreeError::WatchLimit(_)));
    Ok(())
}

#[test]
fn shutdown_releases_every_watch() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(input("a.md"), "A");
    fs.add_file(input("sub/b.md"), "B");
    let tree = Rule::sequence(vec![
        Rule::read_directory_each(|name| copy_rule(name, &format!("{name}.out"))),
        copy_rule("sub/b.md", "b.out"),
    ]);
    let mut h = Harness::new(fs, tree);
    h.scheduler.build()?;
    assert!(!h.backend.active().is_empty());

    h.scheduler.shutdown();
    assert!(h.backend.active().is_empty());
    assert_eq!(h.scheduler.watches().subscription_count(), 0);
    assert_eq!(h.scheduler.source_count(), 0);
    Ok(())
}
