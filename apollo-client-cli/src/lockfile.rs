//! Reads the pinned `apollo-client-core` version out of `Cargo.lock`, backing
//! the `--ignore-version-mismatch` check.
//!
//! This is the Rust-ecosystem counterpart to a `Package.resolved`-style
//! lockfile check: a lockfile-based version pin whose absence is not itself
//! an error (see DESIGN.md for the adaptation notes).

use std::path::Path;

/// Scans `lockfile_contents` (the text of a `Cargo.lock`) for the pinned
/// version of `package_name`'s `[[package]]` entry.
///
/// This is a minimal, purpose-built scanner rather than a full TOML parser:
/// `Cargo.lock`'s `[[package]]` array-of-tables shape is regular enough that
/// matching `name = "..."` followed by `version = "..."` within the same
/// block is sufficient, and keeps this crate's dependency list from growing
/// a TOML parser for one read-only lookup.
pub fn pinned_version(lockfile_contents: &str, package_name: &str) -> Option<String> {
    let mut in_matching_package = false;
    for line in lockfile_contents.lines() {
        let trimmed = line.trim();
        if trimmed == "[[package]]" {
            in_matching_package = false;
            continue;
        }
        if let Some(name) = trimmed.strip_prefix("name = \"").and_then(|s| s.strip_suffix('"')) {
            in_matching_package = name == package_name;
            continue;
        }
        if in_matching_package {
            if let Some(version) = trimmed.strip_prefix("version = \"").and_then(|s| s.strip_suffix('"')) {
                return Some(version.to_string());
            }
        }
    }
    None
}

/// Reads `Cargo.lock` from `project_root`, returning `None` (not an error)
/// if it is absent.
pub fn read_project_lockfile(project_root: &Path) -> std::io::Result<Option<String>> {
    let lockfile_path = project_root.join("Cargo.lock");
    match std::fs::read_to_string(&lockfile_path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}
