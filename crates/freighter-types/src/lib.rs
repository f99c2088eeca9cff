//! Core data model for freighter.
//!
//! Everything that crosses a crate boundary lives here: the candidate
//! manifest built from `mica.toml`, the registry's per-package metadata,
//! the solved build plan, publish-job state, and validation findings.
//! Wire-facing types serialize to the registry's camelCase JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a registry job log line.
///
/// Variant names double as the wire encoding (`Debug` | `Info` | `Warn`
/// | `Error`) and as the `level` query parameter when polling a job.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "Debug",
            LogLevel::Info => "Info",
            LogLevel::Warn => "Warn",
            LogLevel::Error => "Error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!(
                "unknown log level `{other}` (expected debug, info, warn, or error)"
            )),
        }
    }
}

/// A dependency requirement as declared in `mica.toml`.
///
/// `json = "^1.2"` parses as a range; `json = { path = "../json" }` as a
/// local path. Paths are a development convenience only and never make it
/// past validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Range(String),
    Path { path: String },
}

impl DependencySpec {
    /// The declared version range, if this is a range dependency.
    pub fn range(&self) -> Option<&str> {
        match self {
            DependencySpec::Range(range) => Some(range),
            DependencySpec::Path { .. } => None,
        }
    }

    /// True when the declaration places no bound on the version at all.
    pub fn is_unbounded(&self) -> bool {
        match self {
            DependencySpec::Range(range) => {
                let range = range.trim();
                range.is_empty() || range == "*"
            }
            DependencySpec::Path { .. } => false,
        }
    }
}

/// Where a solved dependency is satisfied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencySource {
    Registry,
    Local,
    Override,
}

impl fmt::Display for DependencySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencySource::Registry => f.write_str("registry"),
            DependencySource::Local => f.write_str("local"),
            DependencySource::Override => f.write_str("override"),
        }
    }
}

/// One pinned entry of the solved build plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    pub version: String,
    pub source: DependencySource,
}

impl ResolvedDependency {
    pub fn registry(version: &str) -> Self {
        ResolvedDependency {
            version: version.to_string(),
            source: DependencySource::Registry,
        }
    }
}

/// The full transitive dependency map the registry's solver answers with.
///
/// Keyed by package name; `BTreeMap` keeps iteration (and therefore every
/// report derived from it) in a stable order.
pub type BuildPlan = BTreeMap<String, ResolvedDependency>;

/// The canonical description of one package version, assembled locally and
/// submitted to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishManifest {
    pub name: String,
    /// Registry location the package publishes to, from `[publish]`.
    pub location: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Declared range per direct dependency (path entries are excluded;
    /// they fail validation before a manifest is ever submitted).
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Version of the compiler that validated the package.
    pub compiler: String,
}

/// Publication record for a version that exists on the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedVersion {
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_by: Option<String>,
}

/// Record of a version that was published and later withdrawn. Such a
/// version number is burned and can never be reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpublishedVersion {
    pub unpublished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Per-package metadata as the registry reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMetadata {
    /// Registry location the package is recorded under.
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners: Option<Vec<String>>,
    /// Version string to publication record.
    #[serde(default)]
    pub published: BTreeMap<String, PublishedVersion>,
    /// Version string to withdrawal record.
    #[serde(default)]
    pub unpublished: BTreeMap<String, UnpublishedVersion>,
}

impl RegistryMetadata {
    /// In-memory default for a package the registry has never seen, so
    /// first-time publishes flow through the same checks as re-publishes.
    pub fn synthesized(location: &str) -> Self {
        RegistryMetadata {
            location: location.to_string(),
            owners: None,
            published: BTreeMap::new(),
            unpublished: BTreeMap::new(),
        }
    }
}

/// One log line produced by a registry publish job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// One poll's worth of job state from `GET /jobs/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// Log entries newer than the requested cursor, oldest first.
    #[serde(default)]
    pub logs: Vec<JobLogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// A registry publish job tracked across polls.
///
/// Mutated only by [`PublishJob::absorb`]; the accumulated log order is
/// exactly the arrival order, with nothing dropped or deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishJob {
    pub id: String,
    pub logs: Vec<JobLogEntry>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: Option<bool>,
}

impl PublishJob {
    pub fn new(id: &str) -> Self {
        PublishJob {
            id: id.to_string(),
            logs: Vec::new(),
            finished_at: None,
            success: None,
        }
    }

    /// The poll cursor: timestamp of the newest log entry seen so far.
    pub fn cursor(&self) -> Option<DateTime<Utc>> {
        self.logs.last().map(|entry| entry.timestamp)
    }

    /// Fold one poll response into the job.
    pub fn absorb(&mut self, status: JobStatus) {
        self.logs.extend(status.logs);
        if status.finished_at.is_some() {
            self.finished_at = status.finished_at;
        }
        if status.success.is_some() {
            self.success = status.success;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// A finished job without an explicit `success: true` counts as failed.
    pub fn succeeded(&self) -> bool {
        self.success == Some(true)
    }
}

/// A single validation finding: a human-readable message naming the
/// problem and, where possible, the remediation.
///
/// Findings are accumulated in detection order and never deduplicated;
/// one underlying cause may surface several times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn entry(secs: i64, message: &str) -> JobLogEntry {
        JobLogEntry {
            timestamp: ts(secs),
            level: LogLevel::Info,
            message: message.to_string(),
        }
    }

    #[test]
    fn log_level_wire_names_are_pascal_case() {
        assert_eq!(serde_json::to_string(&LogLevel::Warn).unwrap(), "\"Warn\"");
        assert_eq!(
            serde_json::from_str::<LogLevel>("\"Debug\"").unwrap(),
            LogLevel::Debug
        );
        assert_eq!(LogLevel::Error.to_string(), "Error");
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn dependency_spec_distinguishes_ranges_from_paths() {
        let range: DependencySpec = serde_json::from_str("\"^1.2.0\"").unwrap();
        assert_eq!(range, DependencySpec::Range("^1.2.0".to_string()));
        assert!(!range.is_unbounded());

        let path: DependencySpec = serde_json::from_str(r#"{"path":"../json"}"#).unwrap();
        assert_eq!(
            path,
            DependencySpec::Path {
                path: "../json".to_string()
            }
        );
        assert_eq!(path.range(), None);
    }

    #[test]
    fn star_and_empty_ranges_are_unbounded() {
        assert!(DependencySpec::Range("*".to_string()).is_unbounded());
        assert!(DependencySpec::Range(String::new()).is_unbounded());
        assert!(DependencySpec::Range("  ".to_string()).is_unbounded());
        assert!(!DependencySpec::Range("^0.3".to_string()).is_unbounded());
    }

    #[test]
    fn job_status_parses_wire_json() {
        let raw = r#"{
            "logs": [
                {"timestamp": "2026-03-01T10:00:00Z", "level": "Info", "message": "unpacking"},
                {"timestamp": "2026-03-01T10:00:02Z", "level": "Error", "message": "checksum mismatch"}
            ],
            "finishedAt": "2026-03-01T10:00:03Z",
            "success": false
        }"#;
        let status: JobStatus = serde_json::from_str(raw).unwrap();
        assert_eq!(status.logs.len(), 2);
        assert_eq!(status.logs[1].level, LogLevel::Error);
        assert!(status.is_finished());
        assert_eq!(status.success, Some(false));
    }

    #[test]
    fn job_status_tolerates_a_minimal_body() {
        let status: JobStatus = serde_json::from_str("{}").unwrap();
        assert!(status.logs.is_empty());
        assert!(!status.is_finished());
    }

    #[test]
    fn absorb_appends_logs_and_advances_the_cursor() {
        let mut job = PublishJob::new("job-7");
        assert_eq!(job.cursor(), None);

        job.absorb(JobStatus {
            logs: vec![entry(10, "a"), entry(11, "b")],
            ..JobStatus::default()
        });
        assert_eq!(job.cursor(), Some(ts(11)));

        // An empty poll leaves the cursor where it was.
        job.absorb(JobStatus::default());
        assert_eq!(job.cursor(), Some(ts(11)));

        job.absorb(JobStatus {
            logs: vec![entry(12, "c")],
            finished_at: Some(ts(13)),
            success: Some(true),
        });
        let messages: Vec<&str> = job.logs.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
        assert!(job.is_finished());
        assert!(job.succeeded());
    }

    #[test]
    fn a_finished_job_without_a_success_flag_counts_as_failed() {
        let mut job = PublishJob::new("job-8");
        job.absorb(JobStatus {
            finished_at: Some(ts(20)),
            ..JobStatus::default()
        });
        assert!(job.is_finished());
        assert!(!job.succeeded());
    }

    #[test]
    fn synthesized_metadata_is_empty_history() {
        let meta = RegistryMetadata::synthesized("registry.mica-lang.org/json");
        assert_eq!(meta.location, "registry.mica-lang.org/json");
        assert!(meta.published.is_empty());
        assert!(meta.unpublished.is_empty());
    }

    #[test]
    fn registry_metadata_round_trips() {
        let raw = r#"{
            "location": "registry.mica-lang.org/json",
            "published": {"1.0.0": {"publishedAt": "2026-01-05T00:00:00Z", "publishedBy": "ann"}},
            "unpublished": {"0.9.0": {"unpublishedAt": "2026-01-02T00:00:00Z"}}
        }"#;
        let meta: RegistryMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(meta.published["1.0.0"].published_by.as_deref(), Some("ann"));
        assert!(meta.unpublished.contains_key("0.9.0"));
        let back = serde_json::to_string(&meta).unwrap();
        let again: RegistryMetadata = serde_json::from_str(&back).unwrap();
        assert_eq!(meta, again);
    }

    proptest! {
        /// However a log stream is chunked across polls, absorbing the
        /// chunks reproduces the stream exactly and the cursor tracks the
        /// final entry.
        #[test]
        fn absorb_is_chunking_invariant(
            messages in proptest::collection::vec("[a-z]{1,8}", 0..24),
            splits in proptest::collection::vec(0usize..24, 0..6),
        ) {
            let stream: Vec<JobLogEntry> = messages
                .iter()
                .enumerate()
                .map(|(i, m)| entry(i as i64, m))
                .collect();

            let mut cuts: Vec<usize> = splits
                .into_iter()
                .map(|s| s.min(stream.len()))
                .collect();
            cuts.push(0);
            cuts.push(stream.len());
            cuts.sort_unstable();

            let mut job = PublishJob::new("job");
            for pair in cuts.windows(2) {
                job.absorb(JobStatus {
                    logs: stream[pair[0]..pair[1]].to_vec(),
                    ..JobStatus::default()
                });
            }

            prop_assert_eq!(&job.logs, &stream);
            prop_assert_eq!(job.cursor(), stream.last().map(|e| e.timestamp));
        }
    }
}
