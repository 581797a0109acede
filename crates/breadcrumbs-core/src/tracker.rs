//! Call orchestration: wrap once, invoke many times.
//!
//! A [`Tracker`] is the configured wrapper around one function. Building it
//! validates the directory and seed configuration against the declared
//! signature and captures the call-invariant facts (repository state,
//! static environment, package inventory) once. Each [`Tracker::invoke`]
//! then runs one call: bind arguments, resolve the output directory, seed
//! randomness, execute, and — only after a successful return — write the
//! run record into the resolved directory. A failing function propagates
//! its error and leaves no record behind.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use breadcrumbs_git::RepositoryInfo;
use chrono::Local;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::directory::DirectorySpec;
use crate::environment::{watched_variables, EnvironmentInfo};
use crate::error::{BindingError, ConfigError, TrackError, TrackResult};
use crate::packages::package_inventory;
use crate::record::{clip_parameters, CalledFunction, Record, Timing};
use crate::seed::{RngCollaborator, SeedManager};
use crate::signature::{BoundArguments, CallArgs, Signature};
use crate::writer::{record_path, write_record};

/// Identity of the function a tracker wraps.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionTarget {
    /// Simple name of the function.
    pub name: String,

    /// Module path the function is declared in.
    pub module: String,

    /// Source file, when known.
    pub source_file: Option<PathBuf>,
}

impl FunctionTarget {
    /// Describe a function by name, module, and optional source file.
    pub fn new(
        name: impl Into<String>,
        module: impl Into<String>,
        source_file: Option<impl Into<PathBuf>>,
    ) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            source_file: source_file.map(Into::into),
        }
    }
}

/// Describe the calling function, capturing module path and source file.
#[macro_export]
macro_rules! function_target {
    ($name:expr) => {
        $crate::FunctionTarget::new($name, module_path!(), Some(file!()))
    };
}

/// Full tracking configuration for one wrapped function.
#[derive(Debug, Clone)]
pub struct TrackSpec {
    /// How the output directory is computed.
    pub directory: DirectorySpec,

    /// Parameter carrying the seed, if the signature exposes one.
    pub seed_parameter: Option<String>,

    /// Record filename override; defaults to `<function>_record.json`.
    pub record_filename: Option<String>,

    /// Extra environment variables to watch.
    pub extra_environment_variables: Vec<String>,

    /// Additional repositories whose state should be reported.
    pub extra_tracked_paths: Vec<PathBuf>,

    /// Report version-control state for the function's source file.
    pub git_tracking: bool,

    /// Accept repositories with uncommitted changes. When false, a dirty
    /// repository fails tracker construction.
    pub allow_dirty: bool,

    /// Include the pinned dependency inventory in records.
    pub package_inventory: bool,

    /// Reject output directories that already contain files.
    pub require_empty_directory: bool,

    /// Append to an existing record file instead of overwriting it.
    pub chain_records: bool,
}

impl Default for TrackSpec {
    fn default() -> Self {
        Self {
            directory: DirectorySpec::default(),
            seed_parameter: None,
            record_filename: None,
            extra_environment_variables: Vec::new(),
            extra_tracked_paths: Vec::new(),
            git_tracking: true,
            allow_dirty: true,
            package_inventory: true,
            require_empty_directory: false,
            chain_records: false,
        }
    }
}

impl TrackSpec {
    /// Start from a directory configuration with all defaults.
    pub fn new(directory: DirectorySpec) -> Self {
        Self {
            directory,
            ..Self::default()
        }
    }

    /// Name the parameter that carries the seed.
    pub fn with_seed_parameter(mut self, name: impl Into<String>) -> Self {
        self.seed_parameter = Some(name.into());
        self
    }

    /// Override the record filename.
    pub fn with_record_filename(mut self, name: impl Into<String>) -> Self {
        self.record_filename = Some(name.into());
        self
    }

    /// Watch one more environment variable.
    pub fn with_watched_variable(mut self, name: impl Into<String>) -> Self {
        self.extra_environment_variables.push(name.into());
        self
    }

    /// Report version-control state for one more repository.
    pub fn with_tracked_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_tracked_paths.push(path.into());
        self
    }

    /// Skip version-control reporting for the wrapped function.
    pub fn without_git_tracking(mut self) -> Self {
        self.git_tracking = false;
        self
    }

    /// Fail construction when a tracked repository has uncommitted changes.
    pub fn forbid_dirty(mut self) -> Self {
        self.allow_dirty = false;
        self
    }

    /// Leave the dependency inventory out of records.
    pub fn without_package_inventory(mut self) -> Self {
        self.package_inventory = false;
        self
    }

    /// Reject output directories that already contain files.
    pub fn require_empty(mut self) -> Self {
        self.require_empty_directory = true;
        self
    }

    /// Accumulate records in a JSON array instead of overwriting.
    pub fn with_chaining(mut self) -> Self {
        self.chain_records = true;
        self
    }
}

/// Configured wrapper around one function.
#[derive(Debug)]
pub struct Tracker {
    target: FunctionTarget,
    signature: Signature,
    spec: TrackSpec,
    seed_manager: SeedManager,
    environment: EnvironmentInfo,
    tracked_module: Option<RepositoryInfo>,
    extra_tracked_modules: Option<BTreeMap<String, Option<RepositoryInfo>>>,
    inventory: Option<BTreeMap<String, String>>,
    record_filename: String,
}

impl Tracker {
    /// Validate the configuration and capture call-invariant facts.
    pub fn new(
        target: FunctionTarget,
        signature: Signature,
        spec: TrackSpec,
    ) -> Result<Self, ConfigError> {
        spec.directory.validate(&target.name, &signature)?;
        if let Some(parameter) = &spec.seed_parameter {
            if !signature.contains(parameter) {
                return Err(ConfigError::NoSuchParameter {
                    function: target.name.clone(),
                    parameter: parameter.clone(),
                });
            }
        }

        let tracked_module = if spec.git_tracking {
            lookup_repository(target.source_file.as_deref())
        } else {
            None
        };
        if !spec.allow_dirty {
            if let Some(info) = tracked_module.as_ref().filter(|info| info.is_dirty) {
                return Err(ConfigError::DirtyRepository {
                    working_dir: info.working_dir.clone(),
                });
            }
        }

        let extra_tracked_modules = if spec.extra_tracked_paths.is_empty() {
            None
        } else {
            let mut modules = BTreeMap::new();
            for path in &spec.extra_tracked_paths {
                let info = lookup_repository(Some(path));
                if !spec.allow_dirty {
                    if let Some(info) = info.as_ref().filter(|info| info.is_dirty) {
                        return Err(ConfigError::DirtyRepository {
                            working_dir: info.working_dir.clone(),
                        });
                    }
                }
                modules.insert(path.display().to_string(), info);
            }
            Some(modules)
        };

        let environment = EnvironmentInfo::capture(&spec.extra_environment_variables);

        let inventory = if spec.package_inventory {
            let cwd = env::current_dir().ok();
            let mut hints: Vec<&Path> = Vec::new();
            if let Some(file) = &target.source_file {
                hints.push(file);
            }
            if let Some(cwd) = &cwd {
                hints.push(cwd);
            }
            let inventory = package_inventory(&hints);
            if inventory.is_none() {
                warn!(function = %target.name, "No lockfile found; package inventory unavailable");
            }
            inventory
        } else {
            None
        };

        let record_filename = spec
            .record_filename
            .clone()
            .unwrap_or_else(|| format!("{}_record.json", target.name));

        Ok(Self {
            target,
            signature,
            spec,
            seed_manager: SeedManager::new(),
            environment,
            tracked_module,
            extra_tracked_modules,
            inventory,
            record_filename,
        })
    }

    /// Register an additional seedable generator.
    pub fn with_rng_collaborator(mut self, collaborator: Box<dyn RngCollaborator>) -> Self {
        self.seed_manager.register(collaborator);
        self
    }

    /// The repository state captured for the wrapped function, if any.
    pub fn tracked_module(&self) -> Option<&RepositoryInfo> {
        self.tracked_module.as_ref()
    }

    /// Run one tracked call.
    ///
    /// The closure receives the bound arguments — including any injected
    /// directory and seed values — and its error, if any, propagates
    /// unchanged without a record being written.
    pub fn invoke<T, F>(&self, args: CallArgs, function: F) -> TrackResult<T>
    where
        F: FnOnce(&BoundArguments) -> anyhow::Result<T>,
    {
        let run_uuid = Uuid::new_v4();
        let resolved_at = Local::now();

        let mut bound = self.bind(args)?;
        let parameters = bound.snapshot();

        let directory = self
            .spec
            .directory
            .resolve(&mut bound, &resolved_at, &run_uuid)?;

        let requested = self.requested_seed(&bound)?;
        let seed = self.seed_manager.resolve(requested);
        if let Some(parameter) = &self.spec.seed_parameter {
            bound.set(parameter, seed);
        }

        fs::create_dir_all(&directory)?;
        if self.spec.require_empty_directory && directory.read_dir()?.next().is_some() {
            return Err(TrackError::DirectoryNotEmpty(directory));
        }

        let altered_parameters = bound.snapshot();

        let start_time = Local::now();
        let clock = Instant::now();
        let result = function(&bound).map_err(TrackError::Function)?;
        let end_time = Local::now();

        let mut environment = self.environment.clone();
        environment.environment_variables =
            watched_variables(&self.spec.extra_environment_variables);

        let record = Record {
            uuid: run_uuid.to_string(),
            timing: Timing {
                start_time,
                end_time,
                run_time_seconds: clock.elapsed().as_secs_f64(),
            },
            environment,
            package_inventory: self.inventory.clone(),
            called_function: CalledFunction {
                name: self.target.name.clone(),
                module: self.target.module.clone(),
                source_file: self.target.source_file.clone(),
                parameters: clip_parameters(&parameters),
                altered_parameters: clip_parameters(&altered_parameters),
            },
            tracked_module: self.tracked_module.clone(),
            extra_tracked_modules: self.extra_tracked_modules.clone(),
            seed,
        };

        write_record(
            &record_path(&directory, &self.record_filename),
            &record,
            self.spec.chain_records,
        )?;
        info!(
            function = %self.target.name,
            directory = %directory.display(),
            "Tracked call recorded"
        );
        Ok(result)
    }

    /// Bind call arguments, pre-filling injected parameters the caller may
    /// legitimately omit.
    fn bind(&self, args: CallArgs) -> TrackResult<BoundArguments> {
        let injectable: Vec<&str> = self
            .spec
            .directory
            .directory_injection_parameter
            .as_deref()
            .into_iter()
            .chain(self.spec.seed_parameter.as_deref())
            .collect();

        let mut call = args;
        loop {
            match self.signature.bind(&call) {
                Ok(bound) => return Ok(bound),
                Err(BindingError::MissingArgument(name))
                    if injectable.contains(&name.as_str()) && !call.has_keyword(&name) =>
                {
                    call = call.with_null_keyword(&name);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read the caller's seed from the bound arguments.
    fn requested_seed(&self, bound: &BoundArguments) -> TrackResult<Option<u64>> {
        let Some(parameter) = &self.spec.seed_parameter else {
            return Ok(None);
        };
        match bound.get(parameter) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => {
                value
                    .as_u64()
                    .map(Some)
                    .ok_or_else(|| TrackError::InvalidSeed {
                        parameter: parameter.clone(),
                    })
            }
        }
    }
}

/// Best-effort repository lookup; any failure degrades to None.
fn lookup_repository(path: Option<&Path>) -> Option<RepositoryInfo> {
    let start = path
        .map(Path::to_path_buf)
        .or_else(|| env::current_dir().ok())?;
    match breadcrumbs_git::repository_info(&start) {
        Ok(Some(info)) => Some(info),
        Ok(None) => {
            debug!(path = %start.display(), "Not inside a repository");
            None
        }
        Err(e) => {
            warn!(path = %start.display(), error = %e, "Repository lookup failed");
            None
        }
    }
}
