#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

pub use watchtree_test_utils::{init_tracing, RecordingWatchBackend};

use watchtree::engine::{CoreEngine, RuntimeOptions};
use watchtree::eval::Scheduler;
use watchtree::fs::FileSystem;
use watchtree::fs::mock::MockFileSystem;
use watchtree::tree::{Context, Rule};
use watchtree::watch::WatchManager;

pub const INPUT: &str = "/site/content";
pub const OUTPUT: &str = "/site/public";

pub fn input(rel: &str) -> PathBuf {
    PathBuf::from(INPUT).join(rel)
}

pub fn output(rel: &str) -> PathBuf {
    PathBuf::from(OUTPUT).join(rel)
}

/// Scheduler over an in-memory filesystem and a recording watch backend.
pub struct Harness {
    pub fs: MockFileSystem,
    pub backend: RecordingWatchBackend,
    pub scheduler: Scheduler,
}

impl Harness {
    pub fn new(fs: MockFileSystem, root: Rule) -> Self {
        Self::with_backend(fs, RecordingWatchBackend::new(), root)
    }

    pub fn with_backend(fs: MockFileSystem, backend: RecordingWatchBackend, root: Rule) -> Self {
        init_tracing();
        fs.add_dir(INPUT);
        let scheduler = scheduler(&fs, &backend, root, Context::new(INPUT, OUTPUT));
        Self {
            fs,
            backend,
            scheduler,
        }
    }

    pub fn text(&self, path: impl Into<PathBuf>) -> Option<String> {
        self.fs
            .contents(path.into())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub fn scheduler(
    fs: &MockFileSystem,
    backend: &RecordingWatchBackend,
    root: Rule,
    context: Context,
) -> Scheduler {
    let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
    let watches = WatchManager::new(backend.clone(), Arc::clone(&shared));
    Scheduler::new(root, context, shared, watches)
}

pub fn core(
    fs: &MockFileSystem,
    backend: &RecordingWatchBackend,
    root: Rule,
    options: RuntimeOptions,
) -> CoreEngine {
    init_tracing();
    fs.add_dir(INPUT);
    CoreEngine::new(
        scheduler(fs, backend, root, Context::new(INPUT, OUTPUT)),
        options,
    )
}

/// `read(name) -> write(out, bytes)` for a single file.
pub fn copy_rule(name: &str, out: &str) -> Rule {
    let out = out.to_string();
    let payload_name = name.to_string();
    Rule::read(name, move |bytes| {
        vec![Rule::write(
            out.clone(),
            watchtree::tree::Payload::new(payload_name.clone(), bytes),
        )]
    })
}
