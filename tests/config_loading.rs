// tests/config_loading.rs

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;
use watchtree::config::{load_and_validate, load_from_path, validate_roots};
use watchtree::errors::WatchtreeError;
use watchtree_test_utils::builders::ConfigFileBuilder;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(dir: &Path, body: &str) -> std::io::Result<PathBuf> {
    let path = dir.join("Watchtree.toml");
    fs::write(&path, body)?;
    Ok(path)
}

#[test]
fn empty_file_uses_defaults() -> TestResult {
    let dir = tempdir()?;
    let cfg = load_and_validate(write_config(dir.path(), "")?)?;

    assert_eq!(cfg.config.input, PathBuf::from("content"));
    assert_eq!(cfg.config.output, PathBuf::from("public"));
    assert_eq!(cfg.config.queue_capacity, 64);
    assert!(cfg.config.coalesce);
    assert_eq!(cfg.site.source_extension, "md");
    assert_eq!(cfg.site.output_file, "index.html");
    assert_eq!(cfg.site.listing_file, "pages.txt");
    assert_eq!(cfg.site.listing_channel, "pages");
    assert_eq!(cfg.site.exclude, vec![".*".to_string(), "*~".to_string()]);

    let (input, output) = cfg.resolve_roots(dir.path());
    assert_eq!(input, dir.path().join("content"));
    assert_eq!(output, dir.path().join("public"));
    Ok(())
}

#[test]
fn sections_override_defaults() -> TestResult {
    let dir = tempdir()?;
    let path = write_config(
        dir.path(),
        r#"
[config]
input = "src"
output = "dist"
queue_capacity = 4
coalesce = false

[site]
source_extension = "txt"
output_file = "page.html"
exclude = ["draft-*"]
"#,
    )?;
    let cfg = load_and_validate(path)?;

    assert_eq!(cfg.config.input, PathBuf::from("src"));
    assert_eq!(cfg.config.output, PathBuf::from("dist"));
    assert_eq!(cfg.config.queue_capacity, 4);
    assert!(!cfg.config.coalesce);
    assert_eq!(cfg.site.source_extension, "txt");
    assert_eq!(cfg.site.output_file, "page.html");
    assert_eq!(cfg.site.exclude, vec!["draft-*".to_string()]);
    Ok(())
}

#[test]
fn zero_queue_capacity_is_rejected() -> TestResult {
    let dir = tempdir()?;
    let path = write_config(dir.path(), "[config]\nqueue_capacity = 0\n")?;

    let err = load_and_validate(path).unwrap_err();
    assert!(matches!(err, WatchtreeError::ConfigError(ref m) if m.contains("queue_capacity")));
    Ok(())
}

#[test]
fn overlapping_roots_are_rejected() {
    let same = ConfigFileBuilder::new().input("site").output("site").try_build();
    assert!(matches!(same, Err(WatchtreeError::ConfigError(_))));

    let nested = ConfigFileBuilder::new()
        .input("site")
        .output("site/public")
        .try_build();
    assert!(matches!(nested, Err(WatchtreeError::ConfigError(_))));

    // Input inside output is fine: outputs never land in the input tree.
    assert!(validate_roots(Path::new("/out/src"), Path::new("/out")).is_ok());
    assert!(validate_roots(Path::new("/a/./b/.."), Path::new("/a")).is_err());
}

#[test]
fn bad_exclude_pattern_is_rejected() {
    let result = ConfigFileBuilder::new().exclude("[unclosed").try_build();
    assert!(matches!(result, Err(WatchtreeError::ConfigError(ref m)) if m.contains("exclude")));
}

#[test]
fn empty_site_names_are_rejected() {
    assert!(ConfigFileBuilder::new().source_extension("").try_build().is_err());
    assert!(ConfigFileBuilder::new().output_file(" ").try_build().is_err());
    assert!(ConfigFileBuilder::new().listing_file("").try_build().is_err());
}

#[test]
fn malformed_toml_is_a_toml_error() -> TestResult {
    let dir = tempdir()?;
    let path = write_config(dir.path(), "[config\ninput = ")?;

    assert!(matches!(load_from_path(path), Err(WatchtreeError::TomlError(_))));
    Ok(())
}

#[test]
fn missing_explicit_file_is_an_io_error() -> TestResult {
    let dir = tempdir()?;
    let err = load_and_validate(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, WatchtreeError::IoError(_)));
    Ok(())
}
