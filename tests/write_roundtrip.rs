// tests/write_roundtrip.rs

mod common;
use crate::common::{copy_rule, input, output, Harness};

use std::error::Error;

use proptest::prelude::*;
use tempfile::tempdir;
use watchtree::fs::mock::MockFileSystem;
use watchtree::fs::{FileSystem, RealFileSystem};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn real_write_creates_parents_and_leaves_no_temp_file() -> TestResult {
    let dir = tempdir()?;
    let fs = RealFileSystem;
    let target = dir.path().join("nested/deeper/index.html");

    fs.write(&target, b"<p>hi</p>")?;
    fs.write(&target, b"<p>again</p>")?;

    assert_eq!(fs.read(&target)?, b"<p>again</p>");
    let names = fs.list_dir(&dir.path().join("nested/deeper"))?;
    assert_eq!(names, vec!["index.html".to_string()]);
    Ok(())
}

#[test]
fn real_write_to_a_directory_fails() -> TestResult {
    let dir = tempdir()?;
    let fs = RealFileSystem;
    std::fs::create_dir(dir.path().join("taken"))?;

    assert!(fs.write(&dir.path().join("taken"), b"x").is_err());
    // The temp file is cleaned up on failure.
    let names = fs.list_dir(dir.path())?;
    assert_eq!(names, vec!["taken".to_string()]);
    Ok(())
}

proptest! {
    #[test]
    fn real_write_then_read_returns_the_payload(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let dir = tempdir().unwrap();
        let fs = RealFileSystem;
        let target = dir.path().join("out.bin");

        fs.write(&target, &bytes).unwrap();
        prop_assert_eq!(fs.read(&target).unwrap(), bytes);
    }

    #[test]
    fn copied_input_arrives_unchanged(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let fs = MockFileSystem::new();
        fs.add_file(input("blob.bin"), bytes.clone());
        let mut h = Harness::new(fs, copy_rule("blob.bin", "blob.out"));

        h.scheduler.build().unwrap();
        prop_assert_eq!(h.fs.contents(output("blob.out")), Some(bytes));
    }
}
