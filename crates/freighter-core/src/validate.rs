use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;

use freighter_registry::RegistryClient;
use freighter_types::{
    BuildPlan, DependencySource, DependencySpec, LogLevel, PublishManifest, RegistryMetadata,
    ValidationError,
};

use crate::compiler::{BuildOptions, BuildRunner};
use crate::config::LoadedPackage;
use crate::imports;
use crate::manifest;
use crate::report::Reporter;
use crate::vcs::VersionControl;

/// Knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Minimum severity requested when replaying job logs.
    pub log_level: LogLevel,
    /// Ceiling on job polling; `None` waits as long as the job takes.
    pub poll_timeout: Option<Duration>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            log_level: LogLevel::Info,
            poll_timeout: None,
        }
    }
}

/// Everything a pipeline run needs. Version control and the compiler sit
/// behind traits so tests can stand in for them.
pub struct PublishContext<'a> {
    pub package: &'a LoadedPackage,
    pub registry: &'a RegistryClient,
    pub vcs: &'a dyn VersionControl,
    pub build: &'a dyn BuildRunner,
    pub options: RuntimeOptions,
}

/// Verdict of the validation pass.
#[derive(Debug)]
pub enum PreflightOutcome {
    /// Every check passed; the candidate may be submitted as-is.
    Ready {
        manifest: PublishManifest,
        plan: BuildPlan,
    },
    /// At least one check failed. Findings are in detection order and the
    /// candidate must not be submitted.
    Rejected { errors: Vec<ValidationError> },
}

/// Run every publish precondition against the package.
///
/// Findings accumulate so one run reports everything wrong at once; only
/// conditions that make further checking meaningless (a broken build, an
/// unreachable registry, an unanswerable repository query) abort with
/// `Err`. Repository checks always run, even when package checks have
/// already failed.
pub fn run_preflight(
    ctx: &PublishContext<'_>,
    reporter: &mut dyn Reporter,
) -> Result<PreflightOutcome> {
    let config = &ctx.package.config;
    let mut errors: Vec<ValidationError> = Vec::new();

    reporter.info(&format!(
        "validating {} {}",
        config.package.name, config.package.version
    ));
    ctx.build.build(&BuildOptions::declared())?;

    let graph = imports::analyze(&ctx.package.root, &config.build.sources)?;
    for violation in imports::check_imports(&graph, &config.package.name, &config.dependencies) {
        errors.push(ValidationError::new(violation.to_string()));
    }

    if let Some(error) = check_version_bounds(&config.dependencies) {
        errors.push(error);
    }

    reporter.info("solving dependency ranges against the registry...");
    let plan = ctx.registry.solve(&config.dependencies)?;

    let manifest = match &config.publish {
        None => {
            errors.push(ValidationError::new(
                "mica.toml has no [publish] section; add one naming the registry location \
                 before publishing",
            ));
            None
        }
        Some(publish) => {
            let location = publish.location.as_deref();
            if location.is_none() {
                errors.push(ValidationError::new(
                    "[publish] does not set `location`; the registry needs to know where \
                     this package lives",
                ));
            }

            reporter.info("fetching registry metadata...");
            let metadata = match ctx.registry.fetch_metadata(&config.package.name)? {
                Some(metadata) => metadata,
                None => {
                    reporter.info("package is unknown to the registry; treating as a first publish");
                    RegistryMetadata::synthesized(location.unwrap_or_default())
                }
            };

            if let Some(location) = location {
                if metadata.location != location {
                    errors.push(ValidationError::new(format!(
                        "[publish] location `{location}` does not match the registry's record \
                         `{}` for this package",
                        metadata.location
                    )));
                }
            }

            if let Some(error) = check_plan_sources(&plan) {
                errors.push(error);
            }

            let offenders = manifest::check_module_layout(&ctx.package.root);
            if !offenders.is_empty() {
                errors.push(ValidationError::new(format!(
                    "source layout is not publishable:\n  {}",
                    offenders.join("\n  ")
                )));
            }

            if config.package.name == manifest::RESERVED_PACKAGE_NAME {
                errors.push(ValidationError::new(format!(
                    "the package name `{}` is reserved by the registry",
                    manifest::RESERVED_PACKAGE_NAME
                )));
            }

            let version = &config.package.version;
            if let Some(record) = metadata.published.get(version) {
                let by = record
                    .published_by
                    .as_deref()
                    .map(|who| format!(" by {who}"))
                    .unwrap_or_default();
                errors.push(ValidationError::new(format!(
                    "version {version} is already published (on {}{by}); bump the version \
                     in mica.toml",
                    record.published_at
                )));
            }
            if let Some(record) = metadata.unpublished.get(version) {
                let reason = record
                    .reason
                    .as_deref()
                    .map(|why| format!(": {why}"))
                    .unwrap_or_default();
                errors.push(ValidationError::new(format!(
                    "version {version} was unpublished on {}{reason}; a withdrawn version \
                     number can never be reused",
                    record.unpublished_at
                )));
            }

            match location {
                Some(location) => {
                    let compiler = ctx.build.compiler_version()?;
                    Some(manifest::assemble(config, location, &compiler))
                }
                None => None,
            }
        }
    };

    reporter.info("checking repository state...");
    let status = ctx.vcs.tree_status()?;
    let expected = freighter_git::expected_tag(&config.package.version);
    if !status.is_clean() {
        errors.push(ValidationError::new(format!(
            "working tree has uncommitted changes ({}); commit or stash them so the tag \
             matches what ships",
            status.dirty_paths.join(", ")
        )));
    } else {
        match ctx.vcs.checked_out_tag()? {
            Some(tag) if tag == expected => {}
            Some(tag) => {
                errors.push(ValidationError::new(format!(
                    "HEAD is on tag `{tag}` but version {} expects `{expected}`",
                    config.package.version
                )));
            }
            None => {
                let tags = ctx.vcs.list_tags()?;
                if tags.contains(&expected) {
                    errors.push(ValidationError::new(format!(
                        "tag `{expected}` exists but is not checked out; run:\n  \
                         git checkout {expected}"
                    )));
                } else {
                    errors.push(ValidationError::new(format!(
                        "no release tag for version {}; run:\n  git tag {expected}\n  \
                         git checkout {expected}",
                        config.package.version
                    )));
                }
            }
        }
    }

    match manifest {
        Some(manifest) if errors.is_empty() => {
            reporter.info("all checks passed");
            Ok(PreflightOutcome::Ready { manifest, plan })
        }
        _ => Ok(PreflightOutcome::Rejected { errors }),
    }
}

/// One combined error naming every dependency declared without a bound.
fn check_version_bounds(
    declared: &BTreeMap<String, DependencySpec>,
) -> Option<ValidationError> {
    let unbounded: Vec<&str> = declared
        .iter()
        .filter(|(_, spec)| spec.is_unbounded())
        .map(|(name, _)| name.as_str())
        .collect();
    if unbounded.is_empty() {
        return None;
    }
    Some(ValidationError::new(format!(
        "dependencies declared without a version range: {}; pin each to a range such as \
         `^1.0` in [dependencies]",
        unbounded.join(", ")
    )))
}

/// One combined error naming every resolved dependency that is not a
/// registry version.
fn check_plan_sources(plan: &BuildPlan) -> Option<ValidationError> {
    let offenders: Vec<String> = plan
        .iter()
        .filter(|(_, dep)| dep.source != DependencySource::Registry)
        .map(|(name, dep)| format!("{name} ({})", dep.source))
        .collect();
    if offenders.is_empty() {
        return None;
    }
    Some(ValidationError::new(format!(
        "resolved dependencies not hosted on the registry: {}; published packages may only \
         depend on registry versions",
        offenders.join(", ")
    )))
}
