//! Publish-job tracking.
//!
//! Submission hands back a job id; the registry does the real work
//! asynchronously. This loop polls the job, replays every new log line
//! exactly once at its own severity, and returns once the registry
//! declares a terminal state.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};

use freighter_registry::RegistryClient;
use freighter_types::{JobLogEntry, LogLevel, PublishJob};

use crate::report::Reporter;
use crate::validate::RuntimeOptions;

/// Fixed delay between polls.
pub const POLL_DELAY: Duration = Duration::from_millis(500);

/// Poll `job_id` until the registry reports completion.
///
/// The returned job carries the full log history and the terminal
/// verdict, success or not; deciding what failure means is the caller's
/// business. A poll that cannot reach the registry at all is fatal.
pub fn poll_job(
    registry: &RegistryClient,
    job_id: &str,
    options: &RuntimeOptions,
    reporter: &mut dyn Reporter,
) -> Result<PublishJob> {
    let started = Instant::now();
    let mut job = PublishJob::new(job_id);
    loop {
        let status = registry.job_status(job_id, job.cursor(), options.log_level)?;
        for entry in &status.logs {
            replay(reporter, entry);
        }
        job.absorb(status);

        if job.is_finished() {
            if job.succeeded() {
                reporter.info(&format!("job {job_id} finished successfully"));
            } else {
                reporter.error(&format!("job {job_id} finished with errors"));
            }
            return Ok(job);
        }

        if let Some(ceiling) = options.poll_timeout {
            if started.elapsed() >= ceiling {
                bail!(
                    "job {job_id} did not finish within {}; it may still complete on the registry",
                    humantime::format_duration(ceiling)
                );
            }
        }
        thread::sleep(POLL_DELAY);
    }
}

fn replay(reporter: &mut dyn Reporter, entry: &JobLogEntry) {
    match entry.level {
        LogLevel::Debug => reporter.debug(&entry.message),
        LogLevel::Info => reporter.info(&entry.message),
        LogLevel::Warn => reporter.warn(&entry.message),
        LogLevel::Error => reporter.error(&entry.message),
    }
}
