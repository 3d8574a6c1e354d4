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

use crate::platform::Platform;
use ember_core::BuildError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A compiler family the dispatcher knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toolchain {
    /// `rustc` over a single-file crate.
    Rustc,
    /// `clang` over a single C translation unit.
    Clang,
}

/// Compiler selection and the flags that do not depend on a single build.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Forces a toolchain instead of picking one from the input extension.
    pub toolchain: Option<Toolchain>,
    /// Program used for [`Toolchain::Rustc`].
    pub rustc: String,
    /// Program used for [`Toolchain::Clang`].
    pub clang: String,
    /// Rust edition passed to rustc.
    pub edition: String,
    /// C standard passed to clang.
    pub c_standard: String,
    /// Crates passed to rustc as `--extern name=path`.
    pub externs: BTreeMap<String, PathBuf>,
    /// Directories passed to rustc as `-L dependency=dir`.
    pub library_dirs: Vec<PathBuf>,
    /// Directories passed to clang as include and embed paths.
    pub include_dirs: Vec<PathBuf>,
    /// Appended verbatim before the output flag.
    pub extra_flags: Vec<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            toolchain: None,
            rustc: "rustc".to_string(),
            clang: "clang".to_string(),
            edition: "2021".to_string(),
            c_standard: "c23".to_string(),
            externs: BTreeMap::new(),
            library_dirs: Vec::new(),
            include_dirs: vec![PathBuf::from("src")],
            extra_flags: Vec::new(),
        }
    }
}

impl ToolchainConfig {
    /// Picks the toolchain for `input`: the forced one, else by extension.
    pub fn toolchain_for(&self, input: &Path) -> Result<Toolchain, BuildError> {
        if let Some(forced) = self.toolchain {
            return Ok(forced);
        }
        match input.extension().and_then(|ext| ext.to_str()) {
            Some("rs") => Ok(Toolchain::Rustc),
            Some("c") => Ok(Toolchain::Clang),
            _ => Err(BuildError::UnknownToolchain(input.to_path_buf())),
        }
    }
}

/// One compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Source file.
    pub input: PathBuf,
    /// Artifact path.
    pub output: PathBuf,
    /// Target platform.
    pub platform: Platform,
    /// Optimized, stripped build.
    pub release: bool,
    /// Produce a shared library for the dynamic loader instead of an executable.
    pub loadable: bool,
}

impl CompileOptions {
    /// A native debug executable build of `input` into `output`.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            platform: Platform::Native,
            release: false,
            loadable: false,
        }
    }

    /// Sets the target platform.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Selects release mode.
    pub fn release(mut self, release: bool) -> Self {
        self.release = release;
        self
    }

    /// Requests a dynamically loadable artifact.
    pub fn loadable(mut self, loadable: bool) -> Self {
        self.loadable = loadable;
        self
    }
}

/// Turns a file stem into a valid crate name.
fn crate_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let mut name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Release builds target a fixed x86-64 feature level so the artifact runs on
/// other machines; every other build targets the build machine.
fn release_cpu_level(platform: Platform) -> bool {
    platform == Platform::Windows || cfg!(target_arch = "x86_64")
}

impl Toolchain {
    /// The program to run, as configured.
    pub fn program(self, config: &ToolchainConfig) -> &str {
        match self {
            Self::Rustc => &config.rustc,
            Self::Clang => &config.clang,
        }
    }

    /// Assembles the argument list for one invocation. Pure.
    pub fn command_line(self, opts: &CompileOptions, config: &ToolchainConfig) -> Vec<String> {
        match self {
            Self::Rustc => rustc_args(opts, config),
            Self::Clang => clang_args(opts, config),
        }
    }
}

fn rustc_args(opts: &CompileOptions, config: &ToolchainConfig) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-D".into(),
        "warnings".into(),
        format!("--edition={}", config.edition),
        "--crate-name".into(),
        crate_name(&opts.input),
        "--crate-type".into(),
    ];
    let shared = opts.loadable || opts.platform == Platform::Wasm;
    args.push(if shared { "cdylib" } else { "bin" }.into());

    if opts.platform.has_cpu_level() {
        let cpu = if opts.release && release_cpu_level(opts.platform) {
            "x86-64-v3"
        } else {
            "native"
        };
        args.push("-C".into());
        args.push(format!("target-cpu={cpu}"));
    }

    match opts.platform {
        Platform::Native => {}
        Platform::Windows => args.extend(["--target", "x86_64-pc-windows-gnu"].map(String::from)),
        Platform::Wasm => args.extend(["--target", "wasm32-unknown-unknown"].map(String::from)),
    }

    if opts.release {
        args.extend(["-C", "opt-level=3", "-C", "strip=symbols"].map(String::from));
    } else {
        args.extend(["-C", "opt-level=0", "-g"].map(String::from));
    }

    for dir in &config.library_dirs {
        args.push("-L".into());
        args.push(format!("dependency={}", dir.display()));
    }
    for (name, path) in &config.externs {
        args.push("--extern".into());
        args.push(format!("{name}={}", path.display()));
    }

    args.extend(config.extra_flags.iter().cloned());
    args.push("-o".into());
    args.push(opts.output.display().to_string());
    args.push(opts.input.display().to_string());
    args
}

fn clang_args(opts: &CompileOptions, config: &ToolchainConfig) -> Vec<String> {
    let mut args: Vec<String> = [
        "-Wall",
        "-Werror",
        "-Wno-unused-function",
        "-Wno-unused-variable",
        "-Wno-unused-but-set-variable",
        "-Wno-format",
    ]
    .map(String::from)
    .to_vec();

    for dir in &config.include_dirs {
        args.push(format!("-I{}", dir.display()));
        args.push(format!("--embed-dir={}", dir.display()));
    }
    args.push(format!("-std={}", config.c_standard));

    if opts.platform.has_cpu_level() {
        let arch = if opts.release && release_cpu_level(opts.platform) {
            "x86-64-v3"
        } else {
            "native"
        };
        args.push(format!("-march={arch}"));
    }

    match opts.platform {
        Platform::Native => {}
        Platform::Windows => {
            let triple = if cfg!(windows) {
                "x86_64-unknown-windows-msvc"
            } else {
                "x86_64-unknown-windows-gnu"
            };
            args.extend(["-target", triple].map(String::from));
        }
        Platform::Wasm => args.extend(
            [
                "-target",
                "wasm32",
                "--no-standard-libraries",
                "-Wl,--no-entry",
                "-Wl,--export-all",
                "-fno-builtin",
                "-msimd128",
            ]
            .map(String::from),
        ),
    }

    if opts.release {
        args.push("-O3".into());
        if cfg!(target_os = "linux") && opts.platform == Platform::Native {
            args.extend(["-Xlinker", "--strip-all"].map(String::from));
        }
    } else {
        args.extend(["-O1", "-g"].map(String::from));
    }

    if opts.loadable {
        args.extend(["-shared", "-fPIC"].map(String::from));
    }

    args.extend(config.extra_flags.iter().cloned());
    args.push("-o".into());
    args.push(opts.output.display().to_string());
    args.push(opts.input.display().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_pair(args: &[String], a: &str, b: &str) -> bool {
        args.windows(2).any(|w| w[0] == a && w[1] == b)
    }

    #[test]
    fn test_toolchain_from_extension() {
        let config = ToolchainConfig::default();
        assert_eq!(config.toolchain_for(Path::new("src/app.rs")).unwrap(), Toolchain::Rustc);
        assert_eq!(config.toolchain_for(Path::new("src/app.c")).unwrap(), Toolchain::Clang);
        assert!(matches!(
            config.toolchain_for(Path::new("src/app.zig")),
            Err(BuildError::UnknownToolchain(_))
        ));
    }

    #[test]
    fn test_forced_toolchain_wins() {
        let config = ToolchainConfig {
            toolchain: Some(Toolchain::Clang),
            ..Default::default()
        };
        assert_eq!(config.toolchain_for(Path::new("x.rs")).unwrap(), Toolchain::Clang);
    }

    #[test]
    fn test_crate_name_is_sanitized() {
        assert_eq!(crate_name(Path::new("src/my-app.rs")), "my_app");
        assert_eq!(crate_name(Path::new("3d.rs")), "_3d");
    }

    #[test]
    fn test_rustc_debug_loadable() {
        let mut config = ToolchainConfig::default();
        config
            .externs
            .insert("ember_core".into(), PathBuf::from("target/debug/libember_core.rlib"));
        config.library_dirs.push(PathBuf::from("target/debug/deps"));

        let opts = CompileOptions::new("src/app.rs", "out/hot-1-1.so").loadable(true);
        let args = Toolchain::Rustc.command_line(&opts, &config);

        assert!(has_pair(&args, "-D", "warnings"));
        assert!(args.contains(&"--edition=2021".to_string()));
        assert!(has_pair(&args, "--crate-type", "cdylib"));
        assert!(has_pair(&args, "-C", "target-cpu=native"));
        assert!(has_pair(&args, "-C", "opt-level=0"));
        assert!(has_pair(&args, "-L", "dependency=target/debug/deps"));
        assert!(has_pair(&args, "--extern", "ember_core=target/debug/libember_core.rlib"));
        assert!(!args.contains(&"--target".to_string()));
        assert_eq!(&args[args.len() - 3..], ["-o", "out/hot-1-1.so", "src/app.rs"]);
    }

    #[test]
    fn test_rustc_release_executable() {
        let opts = CompileOptions::new("app.rs", "app").release(true);
        let args = Toolchain::Rustc.command_line(&opts, &ToolchainConfig::default());
        assert!(has_pair(&args, "--crate-type", "bin"));
        assert!(has_pair(&args, "-C", "opt-level=3"));
        assert!(has_pair(&args, "-C", "strip=symbols"));
        assert!(!args.contains(&"-g".to_string()));
    }

    #[test]
    fn test_rustc_wasm_is_a_cdylib_without_cpu_level() {
        let opts = CompileOptions::new("app.rs", "app.wasm").platform(Platform::Wasm);
        let args = Toolchain::Rustc.command_line(&opts, &ToolchainConfig::default());
        assert!(has_pair(&args, "--target", "wasm32-unknown-unknown"));
        assert!(has_pair(&args, "--crate-type", "cdylib"));
        assert!(!args.iter().any(|a| a.starts_with("target-cpu")));
    }

    #[test]
    fn test_rustc_windows_release() {
        let opts = CompileOptions::new("app.rs", "app.exe")
            .platform(Platform::Windows)
            .release(true);
        let args = Toolchain::Rustc.command_line(&opts, &ToolchainConfig::default());
        assert!(has_pair(&args, "--target", "x86_64-pc-windows-gnu"));
        assert!(has_pair(&args, "-C", "target-cpu=x86-64-v3"));
    }

    #[test]
    fn test_clang_debug_loadable() {
        let opts = CompileOptions::new("src/main.c", "out/hot.so").loadable(true);
        let args = Toolchain::Clang.command_line(&opts, &ToolchainConfig::default());

        assert_eq!(&args[..2], ["-Wall", "-Werror"]);
        assert!(args.contains(&"-Wno-unused-but-set-variable".to_string()));
        assert!(args.contains(&"-Isrc".to_string()));
        assert!(args.contains(&"-std=c23".to_string()));
        assert!(args.contains(&"-march=native".to_string()));
        assert!(has_pair(&args, "-O1", "-g"));
        assert!(has_pair(&args, "-shared", "-fPIC"));
        assert_eq!(&args[args.len() - 3..], ["-o", "out/hot.so", "src/main.c"]);
    }

    #[test]
    fn test_clang_wasm() {
        let opts = CompileOptions::new("main.c", "main.wasm")
            .platform(Platform::Wasm)
            .release(true);
        let args = Toolchain::Clang.command_line(&opts, &ToolchainConfig::default());
        assert!(has_pair(&args, "-target", "wasm32"));
        assert!(args.contains(&"-Wl,--no-entry".to_string()));
        assert!(args.contains(&"-msimd128".to_string()));
        assert!(args.contains(&"-O3".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("-march")));
        assert!(!args.contains(&"--strip-all".to_string()));
    }
}
