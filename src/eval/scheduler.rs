use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use crate::errors::{Result, WatchtreeError};
use crate::eval::aggregate::{self, Publication};
use crate::eval::node_info::{Dependency, NodeInfo, SourceKey, WriteStamp};
use crate::eval::scheduler_step::{EvaluationStep, FailedWrite};
use crate::fs::FileSystem;
use crate::tree::{Context, ContextField, NodeId, Rule, RuleKind, Slot, Stage};
use crate::types::{ChangeKind, ReaderKind};
use crate::watch::{CachedSource, SourceContent, WatchManager};

#[derive(Debug)]
struct SourceEntry {
    source: CachedSource,
    /// Number of node records depending on this source.
    refs: usize,
}

/// Scheduler holds the rule tree plus everything learned from evaluating
/// it.
///
/// It is responsible for:
/// - evaluating the tree depth first under the root [`Context`]
/// - keeping one [`CachedSource`] per live (path, reader kind) pair
/// - recording, per node, which sources and context fields it read
/// - re-evaluating exactly the nodes whose dependencies changed
/// - skipping writes whose destination and payload are unchanged
/// - re-running aggregate stage-2 children when their collected sequence
///   changes
///
/// Everything here runs on the single evaluation thread.
pub struct Scheduler {
    root: Rule,
    context: Context,
    fs: Arc<dyn FileSystem>,
    watches: WatchManager,
    nodes: HashMap<NodeId, NodeInfo>,
    sources: HashMap<SourceKey, SourceEntry>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("context", &self.context)
            .field("nodes", &self.nodes.len())
            .field("sources", &self.sources.len())
            .field("watches", &self.watches)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(
        root: Rule,
        context: Context,
        fs: Arc<dyn FileSystem>,
        watches: WatchManager,
    ) -> Self {
        Self {
            root,
            context,
            fs,
            watches,
            nodes: HashMap::new(),
            sources: HashMap::new(),
        }
    }

    /// Returns `true` once the tree has been evaluated at least once.
    pub fn is_built(&self) -> bool {
        self.nodes.contains_key(&NodeId::root())
    }

    /// Initial evaluation of the whole tree.
    pub fn build(&mut self) -> Result<EvaluationStep> {
        info!(
            input = ?self.context.input_root(),
            output = ?self.context.output_root(),
            "building rule tree"
        );
        self.rebuild()
    }

    /// Re-evaluate the whole tree from the root. Cached sources are reused
    /// and unchanged writes are still skipped.
    pub fn rebuild(&mut self) -> Result<EvaluationStep> {
        let mut step = EvaluationStep::default();
        let root = NodeId::root();
        step.invalidated.push(root.clone());
        self.evaluate(root, self.root.clone(), self.context.clone(), None, &mut step)?;
        log_step("rebuild", &step);
        Ok(step)
    }

    /// Deliver one change notification for `path`.
    pub fn handle_change(&mut self, path: &Path, kind: ChangeKind) -> Result<EvaluationStep> {
        let mut step = EvaluationStep::default();

        if kind == ChangeKind::Other {
            trace!(path = ?path, "ignoring unrecognized change kind");
            return Ok(step);
        }

        let mut keys: Vec<SourceKey> = self
            .sources
            .iter()
            .filter(|(_, entry)| entry.source.matches(path))
            .map(|(key, _)| key.clone())
            .collect();
        if keys.is_empty() {
            trace!(path = ?path, %kind, "no live source for changed path; dropping");
            return Ok(step);
        }
        keys.sort();

        let mut changed = Vec::new();
        for key in keys {
            let Some(entry) = self.sources.get_mut(&key) else {
                continue;
            };
            if entry
                .source
                .on_change(path, kind, self.fs.as_ref(), &mut self.watches)?
            {
                changed.push(key);
            }
        }

        if changed.is_empty() {
            debug!(path = ?path, %kind, "content unchanged; nothing to re-evaluate");
            return Ok(step);
        }

        let invalid: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, info)| changed.iter().any(|key| info.depends_on_source(key)))
            .map(|(id, _)| id.clone())
            .collect();

        self.reevaluate(invalid, &mut step)?;
        log_step("change", &step);
        Ok(step)
    }

    /// Replace the root context. Only nodes that read a field whose value
    /// changed are re-evaluated. Outputs at the old location are left alone.
    pub fn set_context(&mut self, context: Context) -> Result<EvaluationStep> {
        let mut step = EvaluationStep::default();
        let changed = self.context.changed_fields(&context);
        self.context = context;

        if changed.is_empty() || !self.is_built() {
            return Ok(step);
        }
        info!(
            ?changed,
            input = ?self.context.input_root(),
            output = ?self.context.output_root(),
            "context changed"
        );

        // Push the new contexts down without evaluating anything, noting
        // which nodes actually observe a field that moved.
        let mut invalid = Vec::new();
        let mut stack = vec![(NodeId::root(), self.context.clone())];
        while let Some((id, context)) = stack.pop() {
            let Some(info) = self.nodes.get_mut(&id) else {
                continue;
            };
            let moved = info.context.changed_fields(&context);
            if moved.iter().any(|field| info.depends_on_field(*field)) {
                invalid.push(id.clone());
            }
            let child_context = match info.rule.kind() {
                RuleKind::Scope {
                    segment,
                    applies_to,
                    ..
                } => context.derive(segment, *applies_to),
                _ => context.clone(),
            };
            info.context = context;
            for child in info.all_children() {
                stack.push((child.clone(), child_context.clone()));
            }
        }

        self.reevaluate(invalid, &mut step)?;
        log_step("context change", &step);
        Ok(step)
    }

    /// Release every cached source and watch subscription.
    pub fn shutdown(&mut self) {
        for (_, mut entry) in self.sources.drain() {
            entry.source.release(&mut self.watches);
        }
        self.nodes.clear();
        self.watches.shutdown();
        info!("scheduler shut down; all watches released");
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn watches(&self) -> &WatchManager {
        &self.watches
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeInfo> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn source(&self, path: &Path, kind: ReaderKind) -> Option<&CachedSource> {
        let key = SourceKey {
            path: path.to_path_buf(),
            kind,
        };
        self.sources.get(&key).map(|entry| &entry.source)
    }

    /// Cached bytes of a live file source.
    pub fn cached_bytes(&self, path: &Path) -> Result<&[u8]> {
        self.source(path, ReaderKind::File)
            .and_then(|s| s.content())
            .and_then(SourceContent::as_bytes)
            .ok_or_else(|| WatchtreeError::SourceUnavailable(path.to_path_buf()))
    }

    /// Sequence last collected by the first aggregate (in identity order)
    /// observing `channel`.
    pub fn collected(&self, channel: &str) -> Option<Vec<String>> {
        self.nodes
            .iter()
            .filter(|(_, info)| {
                matches!(info.rule.kind(), RuleKind::Aggregate { channel: c, .. } if c == channel)
            })
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .and_then(|(_, info)| info.collected.clone())
    }

    fn reevaluate(&mut self, mut ids: Vec<NodeId>, step: &mut EvaluationStep) -> Result<()> {
        ids.sort();
        ids.dedup();
        // Descendants of an invalidated node are re-evaluated with it.
        let roots: Vec<NodeId> = ids
            .iter()
            .filter(|id| !ids.iter().any(|other| other.is_ancestor_of(id)))
            .cloned()
            .collect();

        // Ancestors are refreshed after every root has its new publications.
        let mut moved = Vec::new();
        for id in roots {
            let Some(info) = self.nodes.get(&id) else {
                debug!(node = %id, "invalidated node was discarded meanwhile");
                continue;
            };
            let rule = info.rule.clone();
            let context = info.context.clone();
            let parent = info.parent.clone();
            let before = info.publications.clone();

            debug!(node = %id, kind = rule.kind_name(), "re-evaluating invalidated node");
            step.invalidated.push(id.clone());
            self.evaluate(id.clone(), rule, context, parent, step)?;

            let after = self
                .nodes
                .get(&id)
                .map(|info| info.publications.clone())
                .unwrap_or_default();
            if before != after {
                moved.push(id);
            }
        }

        for id in moved {
            self.propagate_publications(id, step)?;
        }
        Ok(())
    }

    /// Walk up from `from` after its publications changed, refreshing each
    /// ancestor's publications and regenerating aggregate stage-2 children
    /// whose collected sequence moved. Stops at the first ancestor whose
    /// publications come out unchanged.
    fn propagate_publications(&mut self, mut from: NodeId, step: &mut EvaluationStep) -> Result<()> {
        while let Some(parent) = self.nodes.get(&from).and_then(|info| info.parent.clone()) {
            let Some(info) = self.nodes.get(&parent) else {
                break;
            };
            let before = info.publications.clone();

            let regenerate = match info.rule.kind() {
                RuleKind::Aggregate { channel, make, .. } if info.children.contains(&from) => {
                    let body = self.concat_publications(&info.children);
                    let collected = aggregate::collect(channel, &body);
                    if info.collected.as_ref() != Some(&collected) {
                        Some((make.clone(), info.context.clone(), collected))
                    } else {
                        None
                    }
                }
                _ => None,
            };

            if let Some((make, context, collected)) = regenerate {
                debug!(node = %parent, count = collected.len(), "collected sequence changed; regenerating");
                let rules = make(&collected);
                let old = self
                    .nodes
                    .get(&parent)
                    .map(|info| info.derived.clone())
                    .unwrap_or_default();
                let derived = self.evaluate_children(&parent, Stage::Derived, rules, &context, step)?;
                for stale in old.iter().filter(|id| !derived.contains(id)) {
                    self.discard(stale, step);
                }
                if let Some(info) = self.nodes.get_mut(&parent) {
                    info.derived = derived;
                    info.collected = Some(collected);
                }
            }

            let publications = self.subtree_publications(&parent);
            let unchanged = publications == before;
            if let Some(info) = self.nodes.get_mut(&parent) {
                info.publications = publications;
            }
            if unchanged {
                break;
            }
            from = parent;
        }
        Ok(())
    }

    fn evaluate(
        &mut self,
        id: NodeId,
        rule: Rule,
        context: Context,
        parent: Option<NodeId>,
        step: &mut EvaluationStep,
    ) -> Result<()> {
        let previous = self.nodes.remove(&id);
        step.evaluated += 1;
        trace!(node = %id, kind = rule.kind_name(), "evaluating");

        let mut info = NodeInfo::new(rule.clone(), context.clone(), parent);

        match rule.kind() {
            RuleKind::Read { path, make } => {
                let key = SourceKey::file(context.input_path(path));
                info.deps.push(Dependency::Context(ContextField::InputRoot));
                self.acquire(&key)?;
                let rules = match self.content_of(&key).and_then(SourceContent::as_bytes) {
                    Some(bytes) => make(bytes),
                    None => {
                        debug!(node = %id, path = ?key.path, "input absent; waiting for it to appear");
                        Vec::new()
                    }
                };
                info.deps.push(Dependency::Source(key));
                info.children = self.evaluate_children(&id, Stage::Body, rules, &context, step)?;
            }
            RuleKind::ReadDirectory { path, make } => {
                let key = SourceKey::directory(context.input_path(path));
                info.deps.push(Dependency::Context(ContextField::InputRoot));
                self.acquire(&key)?;
                let rules = match self.content_of(&key).and_then(SourceContent::as_listing) {
                    Some(names) => make(names),
                    None => {
                        debug!(node = %id, path = ?key.path, "directory absent; waiting for it to appear");
                        Vec::new()
                    }
                };
                info.deps.push(Dependency::Source(key));
                info.children = self.evaluate_children(&id, Stage::Body, rules, &context, step)?;
            }
            RuleKind::Write { path, payload } => {
                info.deps.push(Dependency::Context(ContextField::OutputRoot));
                let target = context.output_path(path);
                let stamp = WriteStamp::new(target.clone(), payload);
                let last = previous.as_ref().and_then(|p| p.written.clone());

                if last.as_ref() == Some(&stamp) {
                    trace!(node = %id, path = ?target, "payload unchanged; skipping write");
                    step.skipped_writes += 1;
                    info.written = last;
                } else {
                    if self.is_watched(&target) {
                        warn!(
                            node = %id,
                            path = ?target,
                            "output path is also watched as an input; this can loop"
                        );
                    }
                    match self.fs.write(&target, &payload.bytes) {
                        Ok(()) => {
                            debug!(
                                node = %id,
                                path = ?target,
                                payload = %payload.name,
                                bytes = payload.bytes.len(),
                                "wrote output"
                            );
                            step.written.push(target);
                            info.written = Some(stamp);
                        }
                        Err(err) => {
                            let message = format!("{err:#}");
                            error!(node = %id, path = ?target, error = %message, "write failed");
                            step.failed_writes.push(FailedWrite {
                                path: target,
                                message,
                            });
                        }
                    }
                }
            }
            RuleKind::Scope {
                segment,
                applies_to,
                children,
            } => {
                let scoped = context.derive(segment, *applies_to);
                info.children =
                    self.evaluate_children(&id, Stage::Body, children.clone(), &scoped, step)?;
            }
            RuleKind::Sequence(children) => {
                info.children =
                    self.evaluate_children(&id, Stage::Body, children.clone(), &context, step)?;
            }
            RuleKind::Aggregate {
                channel,
                children,
                make,
            } => {
                info.children =
                    self.evaluate_children(&id, Stage::Body, children.clone(), &context, step)?;
                let body = self.concat_publications(&info.children);
                let collected = aggregate::collect(channel, &body);
                trace!(node = %id, channel = %channel, ?collected, "collected publications");
                let rules = make(&collected);
                info.derived = self.evaluate_children(&id, Stage::Derived, rules, &context, step)?;
                info.collected = Some(collected);
            }
            RuleKind::Publish { .. } => {}
        }

        // Release what the previous evaluation held only now, so sources
        // shared with the new evaluation are reused rather than re-read.
        if let Some(previous) = previous {
            for key in previous.source_deps() {
                self.release(key);
            }
            let keep: HashSet<&NodeId> = info.all_children().collect();
            for child in previous.all_children() {
                if !keep.contains(child) {
                    self.discard(child, step);
                }
            }
        }

        self.nodes.insert(id.clone(), info);
        let publications = self.subtree_publications(&id);
        if let Some(info) = self.nodes.get_mut(&id) {
            info.publications = publications;
        }
        Ok(())
    }

    fn evaluate_children(
        &mut self,
        parent: &NodeId,
        stage: Stage,
        rules: Vec<Rule>,
        context: &Context,
        step: &mut EvaluationStep,
    ) -> Result<Vec<NodeId>> {
        let mut ids = Vec::with_capacity(rules.len());
        let mut seen = HashSet::new();

        for (index, rule) in rules.into_iter().enumerate() {
            let slot = match rule.key() {
                Some(key) => Slot::Named(key.to_string()),
                None => Slot::Index(index),
            };
            let id = parent.child(stage, slot);
            if !seen.insert(id.clone()) {
                warn!(node = %id, "duplicate sibling key; skipping rule");
                continue;
            }
            self.evaluate(id.clone(), rule, context.clone(), Some(parent.clone()), step)?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Drop a node and its whole subtree. No outputs are removed.
    fn discard(&mut self, id: &NodeId, step: &mut EvaluationStep) {
        let Some(info) = self.nodes.remove(id) else {
            return;
        };
        step.discarded += 1;
        trace!(node = %id, "discarding node");
        for key in info.source_deps() {
            self.release(key);
        }
        for child in info.all_children() {
            self.discard(child, step);
        }
    }

    fn acquire(&mut self, key: &SourceKey) -> Result<()> {
        if let Some(entry) = self.sources.get_mut(key) {
            entry.refs += 1;
            if entry
                .source
                .refresh_watch(self.fs.as_ref(), &mut self.watches)?
            {
                debug!(path = ?key.path, "picked up content changed while unwatched");
            }
            return Ok(());
        }

        let mut source = CachedSource::new(key.kind);
        source.set_path(key.path.clone(), self.fs.as_ref(), &mut self.watches)?;
        debug!(
            path = ?key.path,
            kind = ?key.kind,
            present = source.content().is_some(),
            "created cached source"
        );
        self.sources
            .insert(key.clone(), SourceEntry { source, refs: 1 });
        Ok(())
    }

    fn release(&mut self, key: &SourceKey) {
        let Some(entry) = self.sources.get_mut(key) else {
            return;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return;
        }
        if let Some(mut entry) = self.sources.remove(key) {
            entry.source.release(&mut self.watches);
            debug!(path = ?key.path, kind = ?key.kind, "dropped cached source");
        }
    }

    fn content_of(&self, key: &SourceKey) -> Option<&SourceContent> {
        self.sources.get(key).and_then(|entry| entry.source.content())
    }

    fn is_watched(&self, target: &Path) -> bool {
        self.sources.values().any(|entry| entry.source.matches(target))
    }

    fn concat_publications(&self, ids: &[NodeId]) -> Vec<Publication> {
        ids.iter()
            .filter_map(|id| self.nodes.get(id))
            .flat_map(|info| info.publications.iter().cloned())
            .collect()
    }

    /// Publications a node passes upwards, computed from its own rule and
    /// its children's current records.
    fn subtree_publications(&self, id: &NodeId) -> Vec<Publication> {
        let Some(info) = self.nodes.get(id) else {
            return Vec::new();
        };
        match info.rule.kind() {
            RuleKind::Publish { channel, value } => vec![Publication::new(channel, value)],
            RuleKind::Aggregate { channel, .. } => {
                let body = self.concat_publications(&info.children);
                let derived = self.concat_publications(&info.derived);
                let echoed = derived.iter().filter(|p| &p.channel == channel).count();
                if echoed > 0 {
                    debug!(
                        node = %id,
                        channel = %channel,
                        echoed,
                        "derived children published on their own channel; not re-collected"
                    );
                }
                let mut out = aggregate::without_channel(channel, &body);
                out.extend(aggregate::without_channel(channel, &derived));
                out
            }
            _ => self.concat_publications(&info.children),
        }
    }
}

fn log_step(label: &str, step: &EvaluationStep) {
    debug!(
        invalidated = step.invalidated.len(),
        evaluated = step.evaluated,
        written = step.written.len(),
        skipped = step.skipped_writes,
        failed = step.failed_writes.len(),
        discarded = step.discarded,
        "{label} evaluated"
    );
}
