//! Process and platform introspection for run records.
//!
//! Everything here is read-only best effort: a field that cannot be
//! determined is recorded as null rather than failing the run. Environment
//! variables are reported from an explicit watch-list only, so records
//! never leak arbitrary secrets from the environment.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variables always reported in a record.
pub const DEFAULT_WATCHED_VARIABLES: &[&str] = &[
    "CUDA_VISIBLE_DEVICES",
    "RAYON_NUM_THREADS",
    "RUST_BACKTRACE",
    "RUST_LOG",
];

/// Facts about the process and host a tracked call ran in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Command-line arguments of the running process.
    pub argv: Vec<String>,

    /// Operating system identifier.
    pub platform: String,

    /// Combined os-arch-family identifier.
    pub platform_info: String,

    /// Path of the running executable.
    pub executable: Option<PathBuf>,

    /// Working directory at capture time.
    pub cwd: Option<PathBuf>,

    /// Hostname of the machine.
    pub hostname: Option<String>,

    /// Entries of the executable search path.
    pub search_path: Vec<PathBuf>,

    /// Number of logical CPUs available to the process.
    pub cpu_count: Option<usize>,

    /// Name of the user running the process.
    pub user: Option<String>,

    /// Watch-list snapshot; absent variables are explicit nulls.
    pub environment_variables: BTreeMap<String, Option<String>>,
}

impl EnvironmentInfo {
    /// Capture the current environment.
    pub fn capture(extra_variables: &[String]) -> Self {
        Self {
            argv: env::args().collect(),
            platform: env::consts::OS.to_string(),
            platform_info: format!(
                "{}-{}-{}",
                env::consts::OS,
                env::consts::ARCH,
                env::consts::FAMILY
            ),
            executable: env::current_exe().ok(),
            cwd: env::current_dir().ok(),
            hostname: hostname(),
            search_path: env::var_os("PATH")
                .map(|path| env::split_paths(&path).collect())
                .unwrap_or_default(),
            cpu_count: std::thread::available_parallelism().ok().map(|n| n.get()),
            user: env::var("USER").or_else(|_| env::var("USERNAME")).ok(),
            environment_variables: watched_variables(extra_variables),
        }
    }
}

/// Snapshot the watch-list environment variables.
///
/// The defaults cover the knobs that commonly change a pipeline's
/// behavior; all `SLURM*` variables join the list when the process runs
/// under SLURM, and callers can extend it per tracker. Variables may change
/// between calls, so this runs again for every record.
pub fn watched_variables(extra_variables: &[String]) -> BTreeMap<String, Option<String>> {
    let mut names: Vec<String> = DEFAULT_WATCHED_VARIABLES
        .iter()
        .map(|v| v.to_string())
        .collect();
    if env::var_os("SLURM_JOB_ID").is_some() {
        names.extend(
            env::vars()
                .map(|(name, _)| name)
                .filter(|name| name.starts_with("SLURM")),
        );
    }
    names.extend(extra_variables.iter().cloned());

    names
        .into_iter()
        .map(|name| {
            let value = env::var(&name).ok();
            (name, value)
        })
        .collect()
}

#[cfg(unix)]
fn hostname() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
}

#[cfg(not(unix))]
fn hostname() -> Option<String> {
    env::var("COMPUTERNAME").or_else(|_| env::var("HOSTNAME")).ok()
}
