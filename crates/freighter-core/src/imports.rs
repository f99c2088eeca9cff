//! Static import analysis.
//!
//! Mica modules import with `use package/module` lines. The checker walks
//! the build globs, records which packages the sources actually name, and
//! compares that against `[dependencies]`: importing an undeclared
//! package and declaring a package nothing imports are both publish
//! blockers.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use freighter_types::DependencySpec;

/// Namespaces importable without a declaration.
const BUILTIN_NAMESPACES: &[&str] = &["std", "mica"];

/// Packages a source tree imports, each with one representative site.
#[derive(Debug, Clone, Default)]
pub struct ImportGraph {
    imports: BTreeMap<String, ImportSite>,
}

impl ImportGraph {
    pub fn imports(&self, package: &str) -> bool {
        self.imports.contains_key(package)
    }

    pub fn imported_packages(&self) -> impl Iterator<Item = &str> {
        self.imports.keys().map(String::as_str)
    }
}

/// Where an import was first seen, relative to the package root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSite {
    pub file: PathBuf,
    /// 1-based.
    pub line: usize,
}

/// One import-graph finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportViolation {
    /// A source file imports a package `[dependencies]` does not declare.
    Undeclared { package: String, site: ImportSite },
    /// `[dependencies]` declares a package nothing imports.
    Unused { package: String },
}

impl fmt::Display for ImportViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportViolation::Undeclared { package, site } => write!(
                f,
                "{}:{} imports `{package}`, which is not declared in [dependencies]",
                site.file.display(),
                site.line
            ),
            ImportViolation::Unused { package } => write!(
                f,
                "dependency `{package}` is declared but never imported by the build sources"
            ),
        }
    }
}

/// Parse every import under the build globs.
///
/// Fails when the analysis itself cannot run: an invalid glob, an
/// unreadable file, or a malformed import line.
pub fn analyze(root: &Path, globs: &[String]) -> Result<ImportGraph> {
    let mut graph = ImportGraph::default();
    for pattern in globs {
        let full = root.join(pattern);
        let paths = glob::glob(&full.to_string_lossy())
            .with_context(|| format!("invalid build glob `{pattern}`"))?;
        for entry in paths {
            let path =
                entry.with_context(|| format!("failed to walk build glob `{pattern}`"))?;
            if path.is_file() {
                scan_file(root, &path, &mut graph)?;
            }
        }
    }
    Ok(graph)
}

fn scan_file(root: &Path, path: &Path, graph: &mut ImportGraph) -> Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    for (index, line) in source.lines().enumerate() {
        let Some(target) = import_target(line) else {
            continue;
        };
        let package = import_package(target).with_context(|| {
            format!(
                "{}:{}: malformed import `{}`",
                relative.display(),
                index + 1,
                line.trim()
            )
        })?;
        graph
            .imports
            .entry(package.to_string())
            .or_insert_with(|| ImportSite {
                file: relative.clone(),
                line: index + 1,
            });
    }
    Ok(())
}

/// `use json/decode` gives `json/decode`; `None` for non-import lines.
fn import_target(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("use ")?;
    let token = rest.split_whitespace().next()?;
    Some(token.trim_end_matches(';'))
}

/// The leading path segment, with every segment checked against the
/// compiler's identifier grammar.
fn import_package(target: &str) -> Result<&str> {
    for segment in target.split('/') {
        if !is_legal_package_name(segment) {
            bail!("`{target}` is not a legal import path");
        }
    }
    Ok(target.split('/').next().unwrap_or(target))
}

fn is_legal_package_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('a'..='z'))
        && chars.all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'))
}

/// Compare the graph against the declared dependency map.
///
/// The package's own name and the builtin namespaces need no declaration.
/// Violations come back in a stable order: undeclared imports by package
/// name, then unused declarations by package name.
pub fn check_imports(
    graph: &ImportGraph,
    package_name: &str,
    declared: &BTreeMap<String, DependencySpec>,
) -> Vec<ImportViolation> {
    let mut violations = Vec::new();
    for (package, site) in &graph.imports {
        if package == package_name || BUILTIN_NAMESPACES.contains(&package.as_str()) {
            continue;
        }
        if !declared.contains_key(package) {
            violations.push(ImportViolation::Undeclared {
                package: package.clone(),
                site: site.clone(),
            });
        }
    }
    for package in declared.keys() {
        if !graph.imports.contains_key(package) {
            violations.push(ImportViolation::Unused {
                package: package.clone(),
            });
        }
    }
    violations
}
