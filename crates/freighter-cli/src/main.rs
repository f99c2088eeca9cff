use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::{Parser, Subcommand};

use freighter_core::compiler::MicaBuild;
use freighter_core::config::{LoadedPackage, ToolConfig};
use freighter_core::publish::{self, PublishOutcome};
use freighter_core::report::Reporter;
use freighter_core::validate::{self, PreflightOutcome, PublishContext, RuntimeOptions};
use freighter_core::vcs::SystemGit;
use freighter_registry::{DEFAULT_API_BASE, RegistryClient};
use freighter_retry::BackoffConfig;
use freighter_types::{LogLevel, RegistryMetadata, ValidationError};

/// Environment variable holding the registry bearer token.
const TOKEN_ENV: &str = "FREIGHTER_REGISTRY_TOKEN";
const DEFAULT_REMOTE: &str = "origin";

#[derive(Parser, Debug)]
#[command(name = "freighter", version)]
#[command(about = "Validates and publishes Mica packages to the central registry")]
struct Cli {
    /// Package directory containing mica.toml
    #[arg(long, default_value = ".")]
    package_dir: PathBuf,

    /// Registry API base URL (default: https://registry.mica-lang.org)
    #[arg(long)]
    api_base: Option<String>,

    /// Refuse to touch the network.
    #[arg(long)]
    offline: bool,

    /// Max attempts per registry call.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Base backoff delay between retries (e.g. 1s, 500ms)
    #[arg(long)]
    base_delay: Option<String>,

    /// Max backoff delay between retries (e.g. 30s)
    #[arg(long)]
    max_delay: Option<String>,

    /// Minimum severity of replayed job logs (debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Give up on the publish job after this long (e.g. 10m). Waits
    /// indefinitely when omitted.
    #[arg(long)]
    poll_timeout: Option<String>,

    /// Git remote that receives the release tag (default: origin)
    #[arg(long)]
    remote: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every publish check without publishing.
    Check,
    /// Validate, push the release tag, and submit to the registry.
    Publish,
    /// Show the package's version history on the registry.
    Status,
}

struct CliReporter;

impl Reporter for CliReporter {
    fn debug(&mut self, msg: &str) {
        eprintln!("[debug] {msg}");
    }

    fn info(&mut self, msg: &str) {
        eprintln!("[info] {msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("[warn] {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("[error] {msg}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let package = LoadedPackage::load(&cli.package_dir)?;
    let tool = ToolConfig::load(&cli.package_dir)?;

    let registry = build_client(&cli, &tool)?;
    let remote = cli
        .remote
        .clone()
        .or(tool.remote)
        .unwrap_or_else(|| DEFAULT_REMOTE.to_string());
    let vcs = SystemGit::new(&package.root, &remote);
    let build = MicaBuild::new(&package.root, &package.config.build.compiler);

    let ctx = PublishContext {
        package: &package,
        registry: &registry,
        vcs: &vcs,
        build: &build,
        options: runtime_options(&cli)?,
    };

    let mut reporter = CliReporter;

    let code = match cli.cmd {
        Commands::Check => match validate::run_preflight(&ctx, &mut reporter)? {
            PreflightOutcome::Ready { manifest, .. } => {
                println!("ok: {} {} is ready to publish", manifest.name, manifest.version);
                0
            }
            PreflightOutcome::Rejected { errors } => {
                print_findings(&errors);
                1
            }
        },
        Commands::Publish => match publish::run_publish(&ctx, &mut reporter)? {
            PublishOutcome::Completed { manifest, job } if job.succeeded() => {
                println!("published {} {} (job {})", manifest.name, manifest.version, job.id);
                0
            }
            PublishOutcome::Completed { manifest, job } => {
                println!(
                    "the registry rejected {} {} (job {}); its log is above",
                    manifest.name, manifest.version, job.id
                );
                1
            }
            PublishOutcome::Rejected { errors } => {
                print_findings(&errors);
                1
            }
        },
        Commands::Status => {
            run_status(&package, &registry)?;
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn build_client(cli: &Cli, tool: &ToolConfig) -> Result<RegistryClient> {
    let api_base = cli
        .api_base
        .clone()
        .or_else(|| tool.registry.api_base.clone())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

    let mut backoff: BackoffConfig = tool.retry.clone().unwrap_or_default();
    if let Some(attempts) = cli.max_attempts {
        backoff.max_attempts = attempts;
    }
    if let Some(delay) = &cli.base_delay {
        backoff.base_delay = parse_duration(delay)?;
    }
    if let Some(delay) = &cli.max_delay {
        backoff.max_delay = parse_duration(delay)?;
    }

    Ok(RegistryClient::new(&api_base)?
        .with_backoff(backoff)
        .with_token(std::env::var(TOKEN_ENV).ok())
        .offline(cli.offline))
}

fn runtime_options(cli: &Cli) -> Result<RuntimeOptions> {
    let log_level: LogLevel = cli.log_level.parse().map_err(anyhow::Error::msg)?;
    let poll_timeout = match &cli.poll_timeout {
        Some(raw) => Some(parse_duration(raw)?),
        None => None,
    };
    Ok(RuntimeOptions {
        log_level,
        poll_timeout,
    })
}

fn parse_duration(s: &str) -> Result<Duration> {
    humantime::parse_duration(s).with_context(|| format!("invalid duration: {s}"))
}

fn print_findings(errors: &[ValidationError]) {
    for (idx, finding) in errors.iter().enumerate() {
        println!("{:>3}. {}", idx + 1, finding.message);
    }
    println!();
    if errors.len() == 1 {
        println!("1 validation error found");
    } else {
        println!("{} validation errors found", errors.len());
    }
}

fn run_status(package: &LoadedPackage, registry: &RegistryClient) -> Result<()> {
    let name = &package.config.package.name;
    let Some(metadata) = registry.fetch_metadata(name)? else {
        println!("{name}: not on the registry yet");
        return Ok(());
    };
    print_history(name, &metadata);
    Ok(())
}

fn print_history(name: &str, metadata: &RegistryMetadata) {
    println!("{name} ({})", metadata.location);
    if let Some(owners) = &metadata.owners {
        println!("owners: {}", owners.join(", "));
    }
    println!();

    if metadata.published.is_empty() && metadata.unpublished.is_empty() {
        println!("no versions on record");
        return;
    }
    for (version, record) in &metadata.published {
        let by = record.published_by.as_deref().unwrap_or("unknown");
        println!(
            "{version}: published {} by {by}",
            record.published_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }
    for (version, record) in &metadata.unpublished {
        let reason = record.reason.as_deref().unwrap_or("no reason given");
        println!(
            "{version}: unpublished {} ({reason})",
            record.unpublished_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }
}
