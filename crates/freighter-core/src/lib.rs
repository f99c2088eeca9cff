//! # Freighter
//!
//! The publish pipeline for Mica packages.
//!
//! Freighter takes a package directory, proves it is fit to ship, and
//! walks it through the central registry's asynchronous intake. The
//! pipeline refuses to guess: every precondition is checked up front,
//! every finding is reported with a concrete fix, and the only local
//! side effect (the version tag push) happens strictly after validation
//! succeeds.
//!
//! ## Pipeline
//!
//! The core flow is **validate, push the tag, rebuild pinned, submit,
//! poll**:
//!
//! 1. [`validate::run_preflight`] loads `mica.toml`, compiles the
//!    package, analyzes its imports, solves the dependency ranges
//!    against the registry, assembles the manifest, and checks the
//!    version history and repository state. Findings accumulate so one
//!    run reports everything; only environmental failures abort early.
//! 2. [`publish::run_publish`] pushes the `v<version>` tag, rebuilds
//!    against the solved plan, and submits the manifest.
//! 3. [`poll::poll_job`] follows the registry job, replaying its log
//!    stream until the registry declares success or failure.
//!
//! ## Example
//!
//! ```ignore
//! use freighter_core::config::LoadedPackage;
//! use freighter_core::compiler::MicaBuild;
//! use freighter_core::publish::{self, PublishOutcome};
//! use freighter_core::validate::{PublishContext, RuntimeOptions};
//! use freighter_core::vcs::SystemGit;
//! use freighter_registry::RegistryClient;
//!
//! let package = LoadedPackage::load(".".as_ref())?;
//! let registry = RegistryClient::new(freighter_registry::DEFAULT_API_BASE)?;
//! let ctx = PublishContext {
//!     package: &package,
//!     registry: &registry,
//!     vcs: &SystemGit::new(&package.root, "origin"),
//!     build: &MicaBuild::new(&package.root, &package.config.build.compiler),
//!     options: RuntimeOptions::default(),
//! };
//! match publish::run_publish(&ctx, &mut reporter)? {
//!     PublishOutcome::Completed { job, .. } if job.succeeded() => {}
//!     _ => std::process::exit(1),
//! }
//! ```
//!
//! ## Modules
//!
//! - [`validate`]: the preflight check sequence and its outcome
//! - [`publish`]: the full pipeline on top of preflight
//! - [`poll`]: registry job polling and log replay
//! - [`manifest`]: manifest assembly and module-layout checks
//! - [`imports`]: `use` scanning across the build sources
//! - [`compiler`]: `mica build` invocation
//! - [`config`]: `mica.toml` and `.freighter.toml` loading
//! - [`vcs`]: repository state behind the [`vcs::VersionControl`] trait
//! - [`report`]: the [`report::Reporter`] sink the pipeline narrates to

/// `mica build` invocation with declared or pinned dependencies.
pub mod compiler;

/// Package (`mica.toml`) and tool (`.freighter.toml`) configuration.
pub mod config;

/// Import scanning and dependency cross-checks.
pub mod imports;

/// Manifest assembly and module-layout checks.
pub mod manifest;

/// Registry job polling and log replay.
pub mod poll;

/// The full publish pipeline.
pub mod publish;

/// Progress reporting sink.
pub mod report;

/// The preflight check sequence.
pub mod validate;

/// Repository state behind the `VersionControl` trait.
pub mod vcs;

/// Git operations against the system `git` binary.
/// Re-exported from the freighter-git microcrate.
pub use freighter_git as git;

/// Registry HTTP client.
/// Re-exported from the freighter-registry microcrate.
pub use freighter_registry as registry;

/// Retry with exponential backoff and jitter.
/// Re-exported from the freighter-retry microcrate.
pub use freighter_retry as retry;

/// Wire and domain types shared across the pipeline.
/// Re-exported from the freighter-types microcrate.
pub use freighter_types as types;

/// Shared test doubles and the scripted registry server.
#[cfg(test)]
pub(crate) mod testing;
