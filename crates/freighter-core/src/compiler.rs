//! Compiler invocation.
//!
//! The pipeline treats `mica` as a black box that either accepts the
//! package or does not. Diagnostics go to the user via the error message;
//! freighter never interprets them.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};

use freighter_types::BuildPlan;

/// Diagnostic lines kept when a build fails.
const STDERR_TAIL_LINES: usize = 30;

/// Which dependency set a build compiles against.
#[derive(Debug, Clone, Copy)]
pub enum DependencySet<'a> {
    /// Whatever `mica.toml` declares; the compiler resolves freely.
    Declared,
    /// Every package pinned to the solver's plan.
    Resolved(&'a BuildPlan),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorFormat {
    #[default]
    Human,
    Json,
}

/// One compiler invocation.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions<'a> {
    pub deps: DependencySet<'a>,
    pub error_format: ErrorFormat,
}

impl<'a> BuildOptions<'a> {
    /// The validation build: declared dependencies, human diagnostics.
    pub fn declared() -> BuildOptions<'static> {
        BuildOptions {
            deps: DependencySet::Declared,
            error_format: ErrorFormat::Human,
        }
    }

    /// The pre-submission build: everything pinned to the solved plan.
    pub fn resolved(plan: &'a BuildPlan) -> BuildOptions<'a> {
        BuildOptions {
            deps: DependencySet::Resolved(plan),
            error_format: ErrorFormat::Human,
        }
    }
}

/// Narrow seam to the toolchain: a build either succeeds or fails, and
/// the compiler can state its version.
pub trait BuildRunner {
    fn build(&self, options: &BuildOptions<'_>) -> Result<()>;
    fn compiler_version(&self) -> Result<String>;
}

/// Shells out to the `mica` binary (or whatever `[build] compiler`
/// names) in the package root.
#[derive(Debug, Clone)]
pub struct MicaBuild {
    root: PathBuf,
    program: String,
}

impl MicaBuild {
    pub fn new(root: &Path, program: &str) -> Self {
        MicaBuild {
            root: root.to_path_buf(),
            program: program.to_string(),
        }
    }
}

impl BuildRunner for MicaBuild {
    fn build(&self, options: &BuildOptions<'_>) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.arg("build").current_dir(&self.root);
        if options.error_format == ErrorFormat::Json {
            command.args(["--error-format", "json"]);
        }
        if let DependencySet::Resolved(plan) = options.deps {
            for (name, dep) in plan {
                command.arg("--pin").arg(format!("{name}@{}", dep.version));
            }
        }
        let output = command.output().with_context(|| {
            format!(
                "failed to run {}; is the Mica toolchain installed?",
                self.program
            )
        })?;
        if !output.status.success() {
            bail!(
                "{} build failed ({}):\n{}",
                self.program,
                output.status,
                tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_LINES)
            );
        }
        Ok(())
    }

    fn compiler_version(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .with_context(|| format!("failed to run {} --version", self.program))?;
        if !output.status.success() {
            bail!("{} --version exited with {}", self.program, output.status);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        // Convention is `mica X.Y.Z`; the second token is the version.
        stdout
            .split_whitespace()
            .nth(1)
            .map(ToString::to_string)
            .with_context(|| {
                format!(
                    "unexpected {} --version output: {}",
                    self.program,
                    stdout.trim()
                )
            })
    }
}

fn tail(text: &str, keep: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= keep {
        return text.trim_end().to_string();
    }
    let mut kept = vec!["..."];
    kept.extend(&lines[lines.len() - keep..]);
    kept.join("\n")
}
