// src/config/validate.rs

use std::path::Path;

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, WatchtreeError};
use crate::watch::path_utils::{is_within, normalize};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::WatchtreeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.site))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global_config(cfg)?;
    validate_roots(&cfg.config.input, &cfg.config.output)?;
    validate_site(cfg)?;
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.queue_capacity == 0 {
        return Err(WatchtreeError::ConfigError(
            "[config].queue_capacity must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

/// Reject root pairs where writing output would feed back into input.
///
/// Also used for roots overridden on the command line.
pub fn validate_roots(input: &Path, output: &Path) -> Result<()> {
    let input = normalize(input);
    let output = normalize(output);

    if input == output {
        return Err(WatchtreeError::ConfigError(format!(
            "input and output roots must differ (both are {})",
            input.display()
        )));
    }
    if is_within(&input, &output) {
        return Err(WatchtreeError::ConfigError(format!(
            "output root {} lies inside input root {}; outputs would be read back as inputs",
            output.display(),
            input.display()
        )));
    }
    Ok(())
}

fn validate_site(cfg: &RawConfigFile) -> Result<()> {
    let site = &cfg.site;

    if site.source_extension.trim().is_empty() {
        return Err(WatchtreeError::ConfigError(
            "[site].source_extension must not be empty".to_string(),
        ));
    }
    for (field, value) in [
        ("output_file", &site.output_file),
        ("listing_file", &site.listing_file),
    ] {
        if value.trim().is_empty() {
            return Err(WatchtreeError::ConfigError(format!(
                "[site].{field} must not be empty"
            )));
        }
    }
    if site.listing_channel.is_empty() {
        return Err(WatchtreeError::ConfigError(
            "[site].listing_channel must not be empty".to_string(),
        ));
    }

    for pattern in &site.exclude {
        Glob::new(pattern).map_err(|e| {
            WatchtreeError::ConfigError(format!(
                "invalid [site].exclude pattern '{pattern}': {e}"
            ))
        })?;
    }
    Ok(())
}
