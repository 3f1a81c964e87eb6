// tests/write_failures.rs

mod common;
use crate::common::{copy_rule, core, input, output, Harness, RecordingWatchBackend, INPUT};

use std::error::Error;

use watchtree::engine::RuntimeOptions;
use watchtree::errors::WatchtreeError;
use watchtree::fs::mock::MockFileSystem;
use watchtree::tree::{Context, Payload, Rule};
use watchtree::types::ChangeKind;

type TestResult = Result<(), Box<dyn Error>>;

fn two_copies() -> Rule {
    Rule::sequence(vec![copy_rule("a.txt", "a.out"), copy_rule("b.txt", "b.out")])
}

fn fs_with_inputs() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file(input("a.txt"), "A");
    fs.add_file(input("b.txt"), "B");
    fs.deny_writes(output("a.out"));
    fs
}

#[test]
fn failed_write_does_not_stop_siblings() -> TestResult {
    let mut h = Harness::new(fs_with_inputs(), two_copies());

    let step = h.scheduler.build()?;

    assert_eq!(step.failed_writes.len(), 1);
    assert_eq!(step.failed_writes[0].path, output("a.out"));
    assert!(step.failed_writes[0].message.contains("Permission denied"));
    assert_eq!(step.written, vec![output("b.out")]);
    assert_eq!(h.text(output("b.out")).as_deref(), Some("B"));
    Ok(())
}

#[test]
fn failed_write_is_retried_on_next_evaluation() -> TestResult {
    let mut h = Harness::new(fs_with_inputs(), two_copies());
    h.scheduler.build()?;

    // No stamp was recorded, so a rebuild tries again instead of skipping.
    let step = h.scheduler.rebuild()?;
    assert_eq!(step.failed_writes.len(), 1);
    assert_eq!(step.skipped_writes, 1);

    h.fs.add_file(input("b.txt"), "B2");
    let step = h.scheduler.handle_change(&input("b.txt"), ChangeKind::Written)?;
    assert!(step.failed_writes.is_empty());
    assert_eq!(step.written, vec![output("b.out")]);
    Ok(())
}

#[test]
fn one_shot_build_reports_the_first_failed_write() {
    let fs = fs_with_inputs();
    let backend = RecordingWatchBackend::new();
    let mut engine = core(
        &fs,
        &backend,
        two_copies(),
        RuntimeOptions {
            exit_when_idle: true,
            coalesce: true,
        },
    );

    let err = engine.start().unwrap_err();
    match err {
        WatchtreeError::WriteFailure { path, .. } => assert_eq!(path, output("a.out")),
        other => panic!("expected WriteFailure, got {other:?}"),
    }
    // The sibling was still written.
    assert_eq!(fs.writes_to(output("b.out")), 1);
}

#[test]
fn watch_mode_keeps_running_after_failed_write() -> TestResult {
    let fs = fs_with_inputs();
    let backend = RecordingWatchBackend::new();
    let mut engine = core(&fs, &backend, two_copies(), RuntimeOptions::default());

    let step = engine.start()?;
    assert!(step.keep_running);
    assert_eq!(step.evaluation.failed_writes.len(), 1);
    Ok(())
}

#[test]
fn writing_into_a_watched_directory_still_writes() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(input("a.md"), "A");
    let tree = Rule::read_directory(|names| {
        vec![Rule::write(
            "listing.txt",
            Payload::new("listing", names.join("\n")),
        )]
    });
    let backend = RecordingWatchBackend::new();
    // Output root equal to the input root: the write lands in a watched
    // directory. Logged as a warning, never refused.
    let mut scheduler = common::scheduler(&fs, &backend, tree, Context::new(INPUT, INPUT));

    let step = scheduler.build()?;
    assert_eq!(step.written, vec![input("listing.txt")]);
    assert_eq!(fs.contents(input("listing.txt")), Some(b"a.md".to_vec()));
    Ok(())
}
