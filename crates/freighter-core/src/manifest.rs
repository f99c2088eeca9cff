//! Candidate manifest assembly and source-layout rules.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use freighter_types::PublishManifest;

use crate::config::PackageConfig;

/// Package name the registry reserves for its own metadata endpoints.
pub const RESERVED_PACKAGE_NAME: &str = "metadata";

/// Module names the compiler reserves; no source file may claim them.
pub const RESERVED_MODULE_NAMES: &[&str] = &["mica", "std", "metadata"];

/// Assemble the canonical manifest for one publishable version.
///
/// Path dependencies carry no range and are left out; validation rejects
/// them before any manifest is submitted.
pub fn assemble(config: &PackageConfig, location: &str, compiler: &str) -> PublishManifest {
    let dependencies: BTreeMap<String, String> = config
        .dependencies
        .iter()
        .filter_map(|(name, spec)| spec.range().map(|range| (name.clone(), range.to_string())))
        .collect();
    PublishManifest {
        name: config.package.name.clone(),
        location: location.to_string(),
        version: config.package.version.clone(),
        description: config.package.description.clone(),
        license: config.package.license.clone(),
        dependencies,
        compiler: compiler.to_string(),
    }
}

/// Inspect `src/` for publishable module files.
///
/// Returns one formatted line per offender; empty means the layout is
/// publishable. Problems reading a file count as offenders rather than
/// aborting the run.
pub fn check_module_layout(root: &Path) -> Vec<String> {
    let mut offenders = Vec::new();
    let pattern = root.join("src/**/*.mica");
    let paths = match glob::glob(&pattern.to_string_lossy()) {
        Ok(paths) => paths,
        Err(err) => return vec![format!("src/ could not be scanned: {err}")],
    };

    let mut seen_any = false;
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(err) => {
                offenders.push(format!("src/ could not be scanned fully: {err}"));
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        seen_any = true;
        let relative = path.strip_prefix(root).unwrap_or(&path).display().to_string();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            offenders.push(format!("{relative}: module name is not valid UTF-8"));
            continue;
        };
        if !is_legal_module_name(stem) {
            offenders.push(format!(
                "{relative}: module name `{stem}` is not a legal identifier"
            ));
        } else if RESERVED_MODULE_NAMES.contains(&stem) {
            offenders.push(format!("{relative}: module name `{stem}` is reserved"));
        }
        if fs::read_to_string(&path).is_err() {
            offenders.push(format!("{relative}: module file is not readable UTF-8"));
        }
    }

    if !seen_any {
        offenders.push("no module files found under src/".to_string());
    }
    offenders
}

fn is_legal_module_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('a'..='z'))
        && chars.all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'))
}
