//! Registry API client for freighter.
//!
//! Four operations, all blocking JSON over HTTP: fetch a package's
//! metadata, solve declared dependency ranges into a pinned plan, submit
//! a publish manifest, and poll the resulting job. Transport failures are
//! retried with the shared backoff policy; a non-200 answer is a semantic
//! response from the registry and is surfaced, never retried.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};

use freighter_retry::{BackoffConfig, retry};
use freighter_types::{BuildPlan, DependencySpec, JobStatus, LogLevel, PublishManifest, RegistryMetadata};

pub const DEFAULT_API_BASE: &str = "https://registry.mica-lang.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("freighter/", env!("CARGO_PKG_VERSION"));

/// Blocking client for the Mica package registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    api_base: String,
    http: Client,
    backoff: BackoffConfig,
    token: Option<String>,
    offline: bool,
}

impl RegistryClient {
    pub fn new(api_base: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to construct the HTTP client")?;
        Ok(RegistryClient {
            api_base: api_base.trim_end_matches('/').to_string(),
            http,
            backoff: BackoffConfig::default(),
            token: None,
            offline: false,
        })
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Bearer token sent with submissions, typically from
    /// `FREIGHTER_REGISTRY_TOKEN`.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// In offline mode every operation fails up front instead of touching
    /// the network.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// `GET /packages/{name}`. `Ok(None)` means the registry has never
    /// seen the package; that is a normal first-publish answer.
    pub fn fetch_metadata(&self, name: &str) -> Result<Option<RegistryMetadata>> {
        let url = format!("{}/packages/{name}", self.api_base);
        let response = self.call("metadata fetch", || self.http.get(&url).send())?;
        match response.status() {
            StatusCode::OK => {
                let metadata = response
                    .json::<RegistryMetadata>()
                    .with_context(|| format!("registry returned unparseable metadata for {name}"))?;
                Ok(Some(metadata))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => bail!("unexpected status fetching metadata for {name}: {status}"),
        }
    }

    /// `POST /solve`: ask the registry's solver to pin every declared
    /// range into a full transitive plan.
    pub fn solve(&self, dependencies: &BTreeMap<String, DependencySpec>) -> Result<BuildPlan> {
        let url = format!("{}/solve", self.api_base);
        let body = SolveRequest { dependencies };
        let response = self.call("dependency solve", || {
            self.http.post(&url).json(&body).send()
        })?;
        let status = response.status();
        if status != StatusCode::OK {
            let detail = response.text().unwrap_or_default();
            bail!("registry solver answered {status}: {}", detail.trim());
        }
        let solved = response
            .json::<SolveResponse>()
            .context("registry solver returned an unparseable plan")?;
        Ok(solved.resolutions)
    }

    /// `POST /publish`: submit the manifest for asynchronous processing.
    /// A 200 carries the job id; any other status is a rejection and the
    /// raw body is preserved in the error.
    pub fn submit(
        &self,
        manifest: &PublishManifest,
        reference: &str,
        plan: &BuildPlan,
    ) -> Result<String> {
        let url = format!("{}/publish", self.api_base);
        let resolutions: BTreeMap<&str, &str> = plan
            .iter()
            .map(|(name, dep)| (name.as_str(), dep.version.as_str()))
            .collect();
        let body = PublishRequest {
            name: &manifest.name,
            location: &manifest.location,
            r#ref: reference,
            compiler: &manifest.compiler,
            resolutions,
        };
        let response = self.call("publish submission", || {
            let mut request = self.http.post(&url).json(&body);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }
            request.send()
        })?;
        let status = response.status();
        if status != StatusCode::OK {
            let detail = response.text().unwrap_or_default();
            bail!(
                "registry rejected the submission of {} {} ({status}): {}",
                manifest.name,
                manifest.version,
                detail.trim()
            );
        }
        let accepted = response
            .json::<PublishResponse>()
            .context("registry accepted the submission but returned an unparseable body")?;
        Ok(accepted.job_id)
    }

    /// `GET /jobs/{id}`: one poll. `since` trims the log replay to
    /// entries newer than the cursor; `level` filters by severity.
    pub fn job_status(
        &self,
        job_id: &str,
        since: Option<DateTime<Utc>>,
        level: LogLevel,
    ) -> Result<JobStatus> {
        let url = format!("{}/jobs/{job_id}", self.api_base);
        let mut params: Vec<(&str, String)> = vec![("level", level.to_string())];
        if let Some(cursor) = since {
            params.push((
                "since",
                cursor.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ));
        }
        let response = self.call("job status poll", || {
            self.http.get(&url).query(&params).send()
        })?;
        match response.status() {
            StatusCode::OK => response
                .json::<JobStatus>()
                .with_context(|| format!("registry returned an unparseable status for job {job_id}")),
            status => bail!("unexpected status polling job {job_id}: {status}"),
        }
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline {
            bail!(
                "offline mode: refusing to contact the registry at {}",
                self.api_base
            );
        }
        Ok(())
    }

    fn call<F>(&self, what: &str, mut send: F) -> Result<Response>
    where
        F: FnMut() -> reqwest::Result<Response>,
    {
        self.ensure_online()?;
        retry(&self.backoff, |_attempt| send()).with_context(|| {
            format!(
                "{what} failed after {} attempt(s) against {}",
                self.backoff.max_attempts.max(1),
                self.api_base
            )
        })
    }
}

#[derive(Debug, Serialize)]
struct SolveRequest<'a> {
    dependencies: &'a BTreeMap<String, DependencySpec>,
}

#[derive(Debug, Deserialize)]
struct SolveResponse {
    resolutions: BuildPlan,
}

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    name: &'a str,
    location: &'a str,
    r#ref: &'a str,
    compiler: &'a str,
    resolutions: BTreeMap<&'a str, &'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    job_id: String,
}
