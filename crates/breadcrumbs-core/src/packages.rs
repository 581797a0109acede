//! Compiled-dependency inventory for run records.
//!
//! A compiled pipeline's "installed packages" are the crates it was built
//! against, which the workspace lockfile pins exactly. The inventory walks
//! up from a set of hint paths (tracked source file, working directory)
//! to the nearest `Cargo.lock` and reports every pinned package. No
//! lockfile is a normal outcome for an installed binary; the section then
//! degrades to null in the record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Lockfile {
    #[serde(default)]
    package: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
}

/// Find the nearest `Cargo.lock` at or above `start`.
pub fn find_lockfile(start: &Path) -> Option<PathBuf> {
    let mut current = if start.is_file() {
        start.parent()?
    } else {
        start
    };
    loop {
        let candidate = current.join("Cargo.lock");
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// Build the name→version inventory from the first lockfile found above
/// any of the hint paths.
pub fn package_inventory(hints: &[&Path]) -> Option<BTreeMap<String, String>> {
    let path = hints.iter().find_map(|hint| find_lockfile(hint))?;
    match read_lockfile(&path) {
        Ok(inventory) => {
            debug!(path = %path.display(), packages = inventory.len(), "Read package inventory");
            Some(inventory)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read lockfile");
            None
        }
    }
}

fn read_lockfile(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    let contents = std::fs::read_to_string(path)?;
    let lockfile: Lockfile = toml::from_str(&contents)?;
    Ok(lockfile
        .package
        .into_iter()
        .map(|p| (p.name, p.version))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCKFILE: &str = r#"
version = 3

[[package]]
name = "serde"
version = "1.0.228"

[[package]]
name = "serde_json"
version = "1.0.148"
dependencies = ["serde"]
"#;

    #[test]
    fn inventory_maps_name_to_version() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.lock"), LOCKFILE).unwrap();

        let inventory = package_inventory(&[dir.path()]).expect("lockfile present");
        assert_eq!(inventory.get("serde").map(String::as_str), Some("1.0.228"));
        assert_eq!(inventory.len(), 2);
    }

    #[test]
    fn lockfile_is_found_from_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.lock"), LOCKFILE).unwrap();
        let nested = dir.path().join("src/jobs");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            find_lockfile(&nested),
            Some(dir.path().join("Cargo.lock"))
        );
    }

    #[test]
    fn missing_lockfile_degrades_to_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(package_inventory(&[dir.path()]).is_none());
    }

    #[test]
    fn unparseable_lockfile_degrades_to_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.lock"), "not toml [").unwrap();
        assert!(package_inventory(&[dir.path()]).is_none());
    }
}
