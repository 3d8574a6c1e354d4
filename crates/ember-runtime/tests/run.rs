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

//! The `ember` binary driving real modules.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const OVERSIZED: &str = r#"
use ember_core::{Context, CHUNK_SIZE};
use std::alloc::Layout;

fn update(ctx: &mut Context) {
    let layout = Layout::from_size_align(2 * CHUNK_SIZE, 8).unwrap();
    ctx.tmp.allocate(&mut ctx.chunks, layout);
}

ember_core::export_main!(update);
"#;

const ONCE: &str = r#"
use ember_core::Context;
use std::fmt::Write;

fn update(ctx: &mut Context) {
    ember_core::log::info!("running with {} args", ctx.args.len());
    let _ = writeln!(ctx.out, "args: {}", ctx.args[1..].join(" "));
    if ctx.args.iter().any(|arg| arg == "--once") {
        ctx.request_exit(7);
    }
}

ember_core::export_main!(update);
"#;

fn ember_run(dir: &Path, module: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ember"))
        .current_dir(dir)
        .env("RUST_LOG", "info")
        .arg("run")
        .arg(module)
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_module_panic_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("oversized.rs"), OVERSIZED).unwrap();

    let output = ember_run(dir.path(), "oversized.rs", &[]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(1), "stderr: {stderr}");
    assert!(stderr.contains("arena allocation failed"), "stderr: {stderr}");
}

#[test]
fn test_module_exit_code_and_args() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("once.rs"), ONCE).unwrap();

    let output = ember_run(dir.path(), "once.rs", &["--once", "-v"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(7), "stderr: {stderr}");
    assert!(stdout.contains("args: --once -v"), "stdout: {stdout}");
    // Records from the module go through the host's logger.
    assert!(stderr.contains("running with 3 args"), "stderr: {stderr}");
}

#[test]
fn test_compile_error_on_startup_keeps_waiting() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Ember.toml"), "[build]\nrustc = \"ember-no-such-rustc\"\n").unwrap();
    fs::write(dir.path().join("once.rs"), ONCE).unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_ember"))
        .current_dir(dir.path())
        .args(["run", "once.rs", "--once"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(500));
    // Still alive: a failed build is not fatal.
    assert!(child.try_wait().unwrap().is_none());
    child.kill().unwrap();
    child.wait().unwrap();
}
