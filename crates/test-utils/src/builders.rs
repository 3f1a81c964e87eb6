use std::path::PathBuf;

use watchtree::config::{ConfigFile, RawConfigFile};
use watchtree::errors::Result;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn input(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.config.input = dir.into();
        self
    }

    pub fn output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.config.output = dir.into();
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.config.queue_capacity = capacity;
        self
    }

    pub fn coalesce(mut self, val: bool) -> Self {
        self.config.config.coalesce = val;
        self
    }

    pub fn source_extension(mut self, ext: &str) -> Self {
        self.config.site.source_extension = ext.to_string();
        self
    }

    pub fn output_file(mut self, name: &str) -> Self {
        self.config.site.output_file = name.to_string();
        self
    }

    pub fn listing_file(mut self, name: &str) -> Self {
        self.config.site.listing_file = name.to_string();
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.site.exclude.push(pattern.to_string());
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
