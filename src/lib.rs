// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod eval;
pub mod fs;
pub mod logging;
pub mod site;
pub mod tree;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_or_default, validate_roots};
use crate::engine::{CoreEngine, Runtime, RuntimeEvent, RuntimeOptions};
use crate::eval::Scheduler;
use crate::fs::{FileSystem, RealFileSystem};
use crate::tree::Context;
use crate::watch::{NotifyBackend, NullWatchBackend, WatchManager};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the site rule tree and its scheduler
/// - the OS watch backend (disabled in --once mode)
/// - the runtime event loop
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_or_default(&config_path)?;

    let base_dir = config_root_dir(&config_path);
    let (mut input, mut output) = cfg.resolve_roots(&base_dir);
    if let Some(dir) = &args.input {
        input = dir.clone();
    }
    if let Some(dir) = &args.output {
        output = dir.clone();
    }
    validate_roots(&input, &output)?;

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let context = Context::resolve(fs.as_ref(), &input, &output);

    if args.dry_run {
        print_dry_run(&cfg, &context);
        return Ok(());
    }

    let root = site::site_tree(&cfg.site)?;

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(cfg.config.queue_capacity);

    let watches = if args.once {
        WatchManager::new(NullWatchBackend, Arc::clone(&fs))
    } else {
        WatchManager::new(NotifyBackend::spawn(rt_tx.clone())?, Arc::clone(&fs))
    };

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    info!(
        input = ?context.input_root(),
        output = ?context.output_root(),
        once = args.once,
        "starting watchtree"
    );

    let options = RuntimeOptions {
        exit_when_idle: args.once,
        coalesce: cfg.config.coalesce,
    };

    let scheduler = Scheduler::new(root, context, fs, watches);
    let core = CoreEngine::new(scheduler, options);

    let runtime = Runtime::new(core, rt_rx);
    runtime.run().await?;
    Ok(())
}

/// Directory the config's relative roots are taken against.
///
/// - If the config path has a non-empty parent (e.g. "site/Watchtree.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Watchtree.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: resolved roots and site settings.
fn print_dry_run(cfg: &ConfigFile, context: &Context) {
    println!("watchtree dry-run");
    println!("  input  = {}", context.input_root().display());
    println!("  output = {}", context.output_root().display());
    println!("  config.queue_capacity = {}", cfg.config.queue_capacity);
    println!("  config.coalesce = {}", cfg.config.coalesce);
    println!();

    let site = &cfg.site;
    println!("site:");
    println!("  source_extension: {}", site.source_extension);
    println!("  output_file: {}", site.output_file);
    println!("  listing_file: {}", site.listing_file);
    println!("  listing_channel: {}", site.listing_channel);
    if !site.exclude.is_empty() {
        println!("  exclude: {:?}", site.exclude);
    }

    debug!("dry-run complete (nothing written)");
}
