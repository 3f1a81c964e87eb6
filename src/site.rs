// src/site.rs

//! The rule tree the `watchtree` binary evaluates.
//!
//! Every entry of the input root with the configured extension becomes a
//! page: its bytes are copied to `<stem>/<output_file>` (the `index` stem
//! goes straight to `<output_file>`), and its stem is published on the
//! listing channel. An aggregate at the root writes the collected stems,
//! one per line, to the listing file.

use std::path::Path;
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::trace;

use crate::config::SiteSection;
use crate::errors::{Result, WatchtreeError};
use crate::tree::{Payload, Rule};

/// Compiled page selection: extension plus exclude patterns.
#[derive(Debug, Clone)]
pub struct PageFilter {
    extension: String,
    exclude: GlobSet,
}

impl PageFilter {
    pub fn new(site: &SiteSection) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &site.exclude {
            let glob = Glob::new(pattern).map_err(|e| {
                WatchtreeError::ConfigError(format!("invalid exclude pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }
        let exclude = builder
            .build()
            .map_err(|e| WatchtreeError::ConfigError(format!("building exclude set: {e}")))?;

        Ok(Self {
            extension: site.source_extension.trim_start_matches('.').to_string(),
            exclude,
        })
    }

    /// The page stem for `name`, or `None` if the entry is not a page.
    pub fn page_stem<'a>(&self, name: &'a str) -> Option<&'a str> {
        if self.exclude.is_match(name) {
            trace!(entry = name, "excluded");
            return None;
        }
        let path = Path::new(name);
        if path.extension()? != self.extension.as_str() {
            return None;
        }
        path.file_stem()?.to_str().filter(|stem| !stem.is_empty())
    }
}

/// Output path, relative to the output root, for the page `stem`.
pub fn page_output(stem: &str, output_file: &str) -> String {
    if stem == "index" {
        output_file.to_string()
    } else {
        format!("{stem}/{output_file}")
    }
}

/// Build the site tree from the `[site]` settings.
pub fn site_tree(site: &SiteSection) -> Result<Rule> {
    let filter = Arc::new(PageFilter::new(site)?);
    let channel = site.listing_channel.clone();
    let output_file = site.output_file.clone();
    let listing_file = site.listing_file.clone();

    let pages = {
        let channel = channel.clone();
        Rule::read_directory(move |names| {
            let mut names: Vec<&String> = names.iter().collect();
            names.sort();
            names
                .into_iter()
                .filter_map(|name| {
                    let stem = filter.page_stem(name)?;
                    Some(page_rule(name, stem, &output_file, &channel).with_key(name.clone()))
                })
                .collect()
        })
    };

    Ok(Rule::aggregate(channel, vec![pages], move |stems| {
        let mut listing = stems.join("\n");
        if !listing.is_empty() {
            listing.push('\n');
        }
        vec![Rule::write(
            listing_file.clone(),
            Payload::new("listing", listing),
        )]
    }))
}

fn page_rule(name: &str, stem: &str, output_file: &str, channel: &str) -> Rule {
    let target = page_output(stem, output_file);
    let payload_name = name.to_string();
    Rule::sequence(vec![
        Rule::read(name, move |bytes| {
            vec![Rule::write(
                target.clone(),
                Payload::new(payload_name.clone(), bytes),
            )]
        }),
        Rule::publish(channel, stem),
    ])
}
