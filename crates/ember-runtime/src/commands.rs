// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! What each subcommand does.

use crate::cli::{BuildArgs, Cli, Command};
use crate::config::EmberConfig;
use crate::loader::LibraryLoader;
use crate::reloader::{Reloader, ReloaderConfig};
use anyhow::{Context as _, Result};
use ember_build::{ArtifactNamer, BuildDispatcher, CompileOptions};
use ember_core::{Context, Output};
use ember_io::FileWatcher;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use walkdir::{DirEntry, WalkDir};

/// Runs the parsed command line and returns the process exit code.
pub fn dispatch(cli: Cli) -> Result<i32> {
    let config = EmberConfig::load(&cli.config)?;
    match cli.command {
        Command::Run { seed, main, args } => run(config, main, args, seed),
        Command::Build(args) => build(&config, &args).map(|()| 0),
        Command::Watch(args) => watch(&config, &args),
        Command::Format => format(&config),
    }
}

fn dispatcher(config: &EmberConfig) -> BuildDispatcher {
    let namer = ArtifactNamer::new(&config.build.out_dir, &config.build.artifact_stem);
    BuildDispatcher::new(config.build.toolchain.clone(), namer)
        .retain_artifacts(config.build.retain_artifacts)
}

/// One set of options per requested platform.
fn compile_options(args: &BuildArgs) -> Vec<CompileOptions> {
    let several = args.platforms.len() > 1;
    args.platforms
        .iter()
        .map(|&platform| {
            let output = if several {
                platform.artifact_path(&args.output, args.dynamic)
            } else {
                args.output.clone()
            };
            CompileOptions::new(&args.input, output)
                .platform(platform)
                .release(args.release)
                .loadable(args.dynamic)
        })
        .collect()
}

/// Builds `main`, then keeps it running and reloads it on every change.
fn run(mut config: EmberConfig, main: PathBuf, args: Vec<String>, seed: Option<u64>) -> Result<i32> {
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        config.build.link_host_crates(&exe_dir);
    }

    let mut watcher = FileWatcher::new(config.watch_config_for(&main))
        .context("Failed to establish the file watcher")?;
    let mut reloader = Reloader::new(
        dispatcher(&config),
        LibraryLoader::new(),
        ReloaderConfig {
            input: main.clone(),
            default_wake: config.runtime.default_wake(),
        },
    );

    let seed = seed
        .or(config.runtime.seed)
        .unwrap_or_else(rand::random);
    log::debug!("Random seed: {seed}");

    let mut module_args = vec![main.display().to_string()];
    module_args.extend(args);
    let mut ctx = Box::new(Context::new(module_args, seed, Output::stdout()));

    let code = reloader.run(&mut ctx, &mut watcher);
    if let Err(e) = ctx.out.flush() {
        log::warn!("Failed to flush module output: {e}");
    }
    log_memory_summary(&ctx);
    Ok(code)
}

fn log_memory_summary(ctx: &Context) {
    let stats = ctx.chunks.stats();
    log::info!(
        "Chunks: {} from the system ({} MiB), {} reused ({:.0}%), {} in use, {} cached",
        stats.system_allocations,
        stats.system_bytes / (1024 * 1024),
        stats.cache_hits,
        stats.reuse_ratio * 100.0,
        stats.chunks_in_use(),
        stats.cached_chunks,
    );
    if ctx.clock.frame_skips() > 0 {
        log::info!("Frames skipped: {}", ctx.clock.frame_skips());
    }
}

/// One build per platform; the first error makes the process exit with 1.
fn build(config: &EmberConfig, args: &BuildArgs) -> Result<()> {
    let builder = dispatcher(config);
    for opts in compile_options(args) {
        builder.compile(&opts).with_context(|| {
            format!("Failed to build '{}' for {}", args.input.display(), opts.platform)
        })?;
    }
    Ok(())
}

/// Rebuilds on every change, forever. Build failures are logged and waited out.
fn watch(config: &EmberConfig, args: &BuildArgs) -> Result<i32> {
    let targets = compile_options(args);
    let mut watch_config = config.watch_config_for(&args.input);
    for opts in &targets {
        if let Some(name) = opts.output.file_name() {
            watch_config.ignore_names.push(name.to_string_lossy().into_owned());
        }
    }
    let mut watcher =
        FileWatcher::new(watch_config).context("Failed to establish the file watcher")?;
    let builder = dispatcher(config);

    log::info!("Watching for changes to rebuild '{}'", args.output.display());
    let mut changed = true;
    loop {
        if changed {
            for opts in &targets {
                if let Err(e) = builder.compile(opts) {
                    log::error!("{e}");
                }
            }
        }
        changed = watcher.changed();
    }
}

fn is_source_tree(entry: &DirEntry, skip: &[PathBuf]) -> bool {
    let hidden = entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.');
    let skipped = skip.iter().any(|dir| entry.path().starts_with(dir));
    !(hidden || skipped || entry.file_name() == "target")
}

/// Collects every file under `dirs` whose extension is in `extensions`.
fn find_sources(dirs: &[PathBuf], skip: &[PathBuf], extensions: &[&str]) -> Vec<String> {
    let mut files: Vec<String> = dirs
        .iter()
        .flat_map(|dir| {
            WalkDir::new(dir)
                .into_iter()
                .filter_entry(|entry| is_source_tree(entry, skip))
                .filter_map(|entry| entry.ok())
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
        .map(|entry| entry.path().display().to_string())
        .collect();
    files.sort();
    files
}

/// Runs `rustfmt` and `clang-format` over the watched directories.
fn format(config: &EmberConfig) -> Result<i32> {
    let dirs = if config.watch.dirs.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        config.watch.dirs.clone()
    };
    let out_dir = &config.build.out_dir;
    let skip = [out_dir.clone(), Path::new(".").join(out_dir)];

    let rust = find_sources(&dirs, &skip, &["rs"]);
    let c = find_sources(&dirs, &skip, &["c", "h"]);
    if rust.is_empty() && c.is_empty() {
        log::info!("Nothing to format");
        return Ok(0);
    }

    if !rust.is_empty() {
        let mut args = vec![format!("--edition={}", config.build.toolchain.edition)];
        args.extend(rust);
        execute_command("rustfmt", &args, "Rust formatting")?;
    }
    if !c.is_empty() {
        let mut args = vec!["-i".to_string()];
        args.extend(c);
        execute_command("clang-format", &args, "C formatting")?;
    }
    Ok(0)
}

/// Runs a tool to completion with inherited output, timing it.
fn execute_command(cmd: &str, args: &[String], task_name: &str) -> Result<()> {
    let start_time = Instant::now();
    log::info!("> {} {}", cmd, args.join(" "));

    let status = process::Command::new(cmd)
        .args(args)
        .status()
        .with_context(|| format!("Failed to execute {cmd}"))?;
    let duration = start_time.elapsed();

    if status.success() {
        log::info!("{} completed in {:.2}s", task_name, duration.as_secs_f64());
        Ok(())
    } else {
        anyhow::bail!(
            "{} failed after {:.2}s with status: {}",
            task_name,
            duration.as_secs_f64(),
            status
        );
    }
}
