//! The full publish pipeline: validate, push the tag, rebuild against
//! the solved plan, submit, then follow the registry job to its verdict.

use anyhow::{Context, Result};

use freighter_types::{PublishJob, PublishManifest, ValidationError};

use crate::compiler::BuildOptions;
use crate::poll::poll_job;
use crate::report::Reporter;
use crate::validate::{PreflightOutcome, PublishContext, run_preflight};

/// Terminal state of a publish attempt that did not hit a fatal error.
#[derive(Debug)]
pub enum PublishOutcome {
    /// Validation found problems; nothing was pushed or submitted.
    Rejected { errors: Vec<ValidationError> },
    /// The candidate was submitted. `job` holds the registry's verdict,
    /// which may still be a failure.
    Completed {
        manifest: PublishManifest,
        job: PublishJob,
    },
}

/// Validate the package and, if every check passes, publish it.
///
/// The tag push is the only local side effect and happens strictly after
/// validation succeeds. Any failure past that point leaves the pushed tag
/// in place; rerunning after a fix is safe because the tag already
/// matches the version being published.
pub fn run_publish(
    ctx: &PublishContext<'_>,
    reporter: &mut dyn Reporter,
) -> Result<PublishOutcome> {
    let (manifest, plan) = match run_preflight(ctx, reporter)? {
        PreflightOutcome::Ready { manifest, plan } => (manifest, plan),
        PreflightOutcome::Rejected { errors } => {
            return Ok(PublishOutcome::Rejected { errors });
        }
    };

    let tag = freighter_git::expected_tag(&manifest.version);
    reporter.info(&format!("pushing tag {tag} to the remote..."));
    ctx.vcs.push_tag(&tag)?;

    reporter.info("rebuilding against the solved plan...");
    ctx.build
        .build(&BuildOptions::resolved(&plan))
        .context("the package no longer builds with the solved dependency versions")?;

    reporter.info(&format!(
        "submitting {} {} to the registry...",
        manifest.name, manifest.version
    ));
    let job_id = ctx.registry.submit(&manifest, &tag, &plan)?;
    reporter.info(&format!("submission accepted as job {job_id}"));

    let job = poll_job(ctx.registry, &job_id, &ctx.options, reporter)?;
    Ok(PublishOutcome::Completed { manifest, job })
}
