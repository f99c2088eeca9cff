//! Test doubles and a scripted registry server for the pipeline tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};

use freighter_git::TreeStatus;
use freighter_registry::RegistryClient;
use freighter_retry::BackoffConfig;
use freighter_types::LogLevel;

use crate::compiler::{BuildOptions, BuildRunner, DependencySet};
use crate::report::Reporter;
use crate::vcs::VersionControl;

pub(crate) const BASIC_MANIFEST: &str = r#"
[package]
name = "demo"
version = "0.1.0"
description = "demo package"
license = "MIT"

[dependencies]
unicode = "^2.0"

[publish]
location = "registry.mica-lang.org/demo"
"#;

pub(crate) const SOLVE_OK: &str =
    r#"{"resolutions":{"unicode":{"version":"2.1.3","source":"registry"}}}"#;

pub(crate) fn write_package(root: &Path, manifest: &str, files: &[(&str, &str)]) {
    fs::write(root.join("mica.toml"), manifest).unwrap();
    for (relative, contents) in files {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
}

pub(crate) fn quick_client(base: &str) -> RegistryClient {
    RegistryClient::new(base)
        .unwrap()
        .with_backoff(BackoffConfig {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            jitter: 0.0,
        })
}

#[derive(Default)]
pub(crate) struct RecordingReporter {
    pub lines: Vec<(LogLevel, String)>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages_at(&self, level: LogLevel) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|(at, _)| *at == level)
            .map(|(_, message)| message.as_str())
            .collect()
    }

    pub fn saw_info(&self, needle: &str) -> bool {
        self.messages_at(LogLevel::Info)
            .iter()
            .any(|message| message.contains(needle))
    }
}

impl Reporter for RecordingReporter {
    fn debug(&mut self, message: &str) {
        self.lines.push((LogLevel::Debug, message.to_string()));
    }

    fn info(&mut self, message: &str) {
        self.lines.push((LogLevel::Info, message.to_string()));
    }

    fn warn(&mut self, message: &str) {
        self.lines.push((LogLevel::Warn, message.to_string()));
    }

    fn error(&mut self, message: &str) {
        self.lines.push((LogLevel::Error, message.to_string()));
    }
}

pub(crate) struct FakeGit {
    pub status: TreeStatus,
    pub tag: Option<String>,
    pub tags: BTreeSet<String>,
    pub pushed: RefCell<Vec<String>>,
    pub fail_push: bool,
    pub broken: bool,
}

impl FakeGit {
    fn base() -> Self {
        FakeGit {
            status: TreeStatus::default(),
            tag: None,
            tags: BTreeSet::new(),
            pushed: RefCell::new(Vec::new()),
            fail_push: false,
            broken: false,
        }
    }

    /// Clean tree, the given tag checked out and known.
    pub fn clean_at_tag(tag: &str) -> Self {
        FakeGit {
            tag: Some(tag.to_string()),
            tags: BTreeSet::from([tag.to_string()]),
            ..Self::base()
        }
    }

    /// Clean tree, detached from any tag, with the given tags known.
    pub fn clean_with_tags(tags: &[&str]) -> Self {
        FakeGit {
            tags: tags.iter().map(ToString::to_string).collect(),
            ..Self::base()
        }
    }

    pub fn dirty(paths: &[&str]) -> Self {
        FakeGit {
            status: TreeStatus {
                dirty_paths: paths.iter().map(ToString::to_string).collect(),
            },
            ..Self::base()
        }
    }

    /// Every status query fails, as outside a repository.
    pub fn broken() -> Self {
        FakeGit {
            broken: true,
            ..Self::base()
        }
    }

    pub fn pushed_tags(&self) -> Vec<String> {
        self.pushed.borrow().clone()
    }
}

impl VersionControl for FakeGit {
    fn tree_status(&self) -> Result<TreeStatus> {
        if self.broken {
            bail!("git status failed: fatal: not a git repository");
        }
        Ok(self.status.clone())
    }

    fn checked_out_tag(&self) -> Result<Option<String>> {
        Ok(self.tag.clone())
    }

    fn list_tags(&self) -> Result<BTreeSet<String>> {
        Ok(self.tags.clone())
    }

    fn push_tag(&self, tag: &str) -> Result<()> {
        if self.fail_push {
            bail!("git push rejected tag {tag} on remote origin: permission denied");
        }
        self.pushed.borrow_mut().push(tag.to_string());
        Ok(())
    }
}

pub(crate) struct FakeBuild {
    pub version: String,
    pub fail_declared: bool,
    pub fail_resolved: bool,
    pub invocations: RefCell<Vec<&'static str>>,
}

impl FakeBuild {
    fn base(version: &str) -> Self {
        FakeBuild {
            version: version.to_string(),
            fail_declared: false,
            fail_resolved: false,
            invocations: RefCell::new(Vec::new()),
        }
    }

    pub fn passing(version: &str) -> Self {
        Self::base(version)
    }

    /// The validation build (declared dependencies) fails.
    pub fn failing_build(version: &str) -> Self {
        FakeBuild {
            fail_declared: true,
            ..Self::base(version)
        }
    }

    /// Only the pinned pre-submission rebuild fails.
    pub fn failing_pinned(version: &str) -> Self {
        FakeBuild {
            fail_resolved: true,
            ..Self::base(version)
        }
    }

    pub fn builds(&self) -> Vec<&'static str> {
        self.invocations.borrow().clone()
    }
}

impl BuildRunner for FakeBuild {
    fn build(&self, options: &BuildOptions<'_>) -> Result<()> {
        let (kind, fail) = match options.deps {
            DependencySet::Declared => ("declared", self.fail_declared),
            DependencySet::Resolved(_) => ("resolved", self.fail_resolved),
        };
        self.invocations.borrow_mut().push(kind);
        if fail {
            bail!("mica build failed (exit status: 1):\nerror[E0001]: type mismatch");
        }
        Ok(())
    }

    fn compiler_version(&self) -> Result<String> {
        Ok(self.version.clone())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: String,
}

/// A tiny_http server answering from a script: responses are FIFO per
/// path with the final one sticky, and anything unscripted is a 404.
pub(crate) struct ScriptedRegistry {
    pub base_url: String,
    seen: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ScriptedRegistry {
    pub fn builder() -> ScriptBuilder {
        ScriptBuilder::default()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn saw_publish(&self) -> bool {
        self.requests().iter().any(|r| r.url.starts_with("/publish"))
    }
}

#[derive(Default)]
pub(crate) struct ScriptBuilder {
    routes: BTreeMap<String, Vec<(u16, String)>>,
}

impl ScriptBuilder {
    fn push(mut self, path: String, code: u16, body: &str) -> Self {
        self.routes.entry(path).or_default().push((code, body.to_string()));
        self
    }

    pub fn solve(self, body: &str) -> Self {
        self.push("/solve".to_string(), 200, body)
    }

    pub fn solve_error(self, code: u16, body: &str) -> Self {
        self.push("/solve".to_string(), code, body)
    }

    pub fn metadata(self, name: &str, body: &str) -> Self {
        self.push(format!("/packages/{name}"), 200, body)
    }

    pub fn metadata_missing(self, name: &str) -> Self {
        self.push(format!("/packages/{name}"), 404, "{}")
    }

    pub fn publish_accepted(self, job_id: &str) -> Self {
        let body = format!(r#"{{"jobId":"{job_id}"}}"#);
        self.push("/publish".to_string(), 200, &body)
    }

    pub fn publish_rejected(self, code: u16, body: &str) -> Self {
        self.push("/publish".to_string(), code, body)
    }

    pub fn job(self, job_id: &str, body: &str) -> Self {
        self.push(format!("/jobs/{job_id}"), 200, body)
    }

    pub fn job_error(self, job_id: &str, code: u16) -> Self {
        self.push(format!("/jobs/{job_id}"), code, "{}")
    }

    pub fn spawn(self) -> ScriptedRegistry {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("server");
        let base_url = format!("http://{}", server.server_addr());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_writer = Arc::clone(&seen);
        let mut routes = self.routes;
        thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let url = request.url().to_string();
                seen_writer.lock().expect("lock").push(RecordedRequest {
                    method: request.method().to_string(),
                    url: url.clone(),
                    body,
                });
                let path = url.split('?').next().unwrap_or("").to_string();
                let (code, payload) = match routes.get_mut(&path) {
                    Some(responses) if responses.len() > 1 => responses.remove(0),
                    Some(responses) if responses.len() == 1 => responses[0].clone(),
                    _ => (404, "{}".to_string()),
                };
                let response = tiny_http::Response::from_string(payload)
                    .with_status_code(tiny_http::StatusCode(code))
                    .with_header(
                        tiny_http::Header::from_bytes("Content-Type", "application/json")
                            .expect("header"),
                    );
                let _ = request.respond(response);
            }
        });
        ScriptedRegistry { base_url, seen }
    }
}
