//! On-disk configuration.
//!
//! Two files matter: `mica.toml`, the package's own manifest, and the
//! optional `.freighter.toml` beside it with publish-tool settings.
//! Command-line flags win over `.freighter.toml`, which wins over
//! built-in defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use freighter_retry::BackoffConfig;
use freighter_types::DependencySpec;

pub const PACKAGE_FILE: &str = "mica.toml";
pub const TOOL_FILE: &str = ".freighter.toml";

/// Parsed `mica.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    pub package: PackageSection,
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,
    #[serde(default)]
    pub publish: Option<PublishSection>,
    #[serde(default)]
    pub build: BuildSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
}

/// `[publish]` marks a package as publishable and names its registry
/// location. Without it, validation stops a publish early.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishSection {
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSection {
    /// Compiler binary to invoke.
    #[serde(default = "default_compiler")]
    pub compiler: String,
    /// Globs, relative to the package root, naming the build sources.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
}

fn default_compiler() -> String {
    "mica".to_string()
}

fn default_sources() -> Vec<String> {
    vec!["src/**/*.mica".to_string()]
}

impl Default for BuildSection {
    fn default() -> Self {
        BuildSection {
            compiler: default_compiler(),
            sources: default_sources(),
        }
    }
}

/// A package rooted somewhere on disk, with its parsed manifest.
#[derive(Debug, Clone)]
pub struct LoadedPackage {
    pub root: PathBuf,
    pub config: PackageConfig,
}

impl LoadedPackage {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(PACKAGE_FILE);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: PackageConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(LoadedPackage {
            root: dir.to_path_buf(),
            config,
        })
    }
}

/// Parsed `.freighter.toml`. Every field is optional; a missing file is
/// an empty configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub registry: RegistrySettings,
    /// Backoff overrides for registry calls.
    #[serde(default)]
    pub retry: Option<BackoffConfig>,
    /// Git remote that receives the release tag.
    #[serde(default)]
    pub remote: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrySettings {
    #[serde(default)]
    pub api_base: Option<String>,
}

impl ToolConfig {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(TOOL_FILE);
        if !path.exists() {
            return Ok(ToolConfig::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }
}
