// src/eval/aggregate.rs

//! Pass-scoped aggregation channels.
//!
//! Every node keeps the publications of its subtree in evaluation order.
//! An aggregate node consumes the publications on its own channel that its
//! body produced; everything else keeps bubbling up. Nothing is remembered
//! across passes except what each node record currently holds.

/// One value published on a named channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub channel: String,
    pub value: String,
}

impl Publication {
    pub fn new(channel: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            value: value.into(),
        }
    }
}

/// Values published on `channel`, in order.
pub fn collect(channel: &str, publications: &[Publication]) -> Vec<String> {
    publications
        .iter()
        .filter(|p| p.channel == channel)
        .map(|p| p.value.clone())
        .collect()
}

/// `publications` minus everything on `channel`.
pub fn without_channel(channel: &str, publications: &[Publication]) -> Vec<Publication> {
    publications
        .iter()
        .filter(|p| p.channel != channel)
        .cloned()
        .collect()
}
