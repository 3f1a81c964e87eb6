// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// input = "content"
/// output = "public"
/// queue_capacity = 64
/// coalesce = true
///
/// [site]
/// source_extension = "md"
/// output_file = "index.html"
/// listing_file = "pages.txt"
/// listing_channel = "pages"
/// exclude = [".*", "*~"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Roots and runtime behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Site pipeline settings from `[site]`.
    #[serde(default)]
    pub site: SiteSection,
}

/// Validated configuration. Only built through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub site: SiteSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, site: SiteSection) -> Self {
        Self { config, site }
    }

    /// Input and output roots, with relative paths taken against
    /// `base_dir` (normally the directory holding the config file).
    pub fn resolve_roots(&self, base_dir: &Path) -> (PathBuf, PathBuf) {
        (
            base_dir.join(&self.config.input),
            base_dir.join(&self.config.output),
        )
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Directory every `Read` resolves against.
    #[serde(default = "default_input")]
    pub input: PathBuf,

    /// Directory every `Write` resolves against.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Size of the bounded channel between the watcher and the evaluation
    /// thread.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Collapse bursts of notifications for the same path.
    #[serde(default = "default_coalesce")]
    pub coalesce: bool,
}

fn default_input() -> PathBuf {
    PathBuf::from("content")
}

fn default_output() -> PathBuf {
    PathBuf::from("public")
}

fn default_queue_capacity() -> usize {
    64
}

fn default_coalesce() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
            queue_capacity: default_queue_capacity(),
            coalesce: default_coalesce(),
        }
    }
}

/// `[site]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteSection {
    /// Entries of the input root with this extension become pages.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// File name written for each page.
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Listing of every page stem, written at the output root.
    #[serde(default = "default_listing_file")]
    pub listing_file: String,

    #[serde(default = "default_listing_channel")]
    pub listing_channel: String,

    /// Glob patterns for entry names to ignore.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_source_extension() -> String {
    "md".to_string()
}

fn default_output_file() -> String {
    crate::tree::DEFAULT_OUTPUT_FILE.to_string()
}

fn default_listing_file() -> String {
    "pages.txt".to_string()
}

fn default_listing_channel() -> String {
    "pages".to_string()
}

fn default_exclude() -> Vec<String> {
    vec![".*".to_string(), "*~".to_string()]
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            source_extension: default_source_extension(),
            output_file: default_output_file(),
            listing_file: default_listing_file(),
            listing_channel: default_listing_channel(),
            exclude: default_exclude(),
        }
    }
}
