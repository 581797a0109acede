//! Output-directory configuration and per-call resolution.
//!
//! A [`DirectorySpec`] describes how the output directory of a tracked call
//! is computed: a fixed base or a parameter-supplied base, an optional
//! parameter-supplied subdirectory, and optional unique suffixes (timestamp
//! and/or uuid) appended to the final segment. Whenever the final name is
//! generated rather than supplied, the resolver writes it back into the
//! bound arguments so the tracked function observes the directory it should
//! use.

use std::env;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ConfigError, TrackError, TrackResult};
use crate::signature::{BoundArguments, Signature};

/// Filesystem-safe, lexically sortable timestamp token format.
pub const TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// Configuration for computing a tracked call's output directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectorySpec {
    /// Fixed base path. Mutually exclusive with `directory_parameter`.
    pub literal_directory: Option<PathBuf>,

    /// Parameter whose runtime value supplies the base path.
    pub directory_parameter: Option<String>,

    /// Parameter whose runtime value is appended to the base as one path
    /// segment.
    pub subdirectory_name_parameter: Option<String>,

    /// Append a timestamp token to the final segment.
    pub include_timestamp: bool,

    /// Append the run uuid to the final segment. Combines with
    /// `include_timestamp`; the timestamp comes first.
    pub include_uuid: bool,

    /// Parameter that receives the full resolved path before the call.
    pub directory_injection_parameter: Option<String>,
}

impl DirectorySpec {
    /// Base the directory on a fixed path.
    pub fn literal(path: impl Into<PathBuf>) -> Self {
        Self {
            literal_directory: Some(path.into()),
            ..Self::default()
        }
    }

    /// Base the directory on the runtime value of a parameter.
    pub fn from_parameter(name: impl Into<String>) -> Self {
        Self {
            directory_parameter: Some(name.into()),
            ..Self::default()
        }
    }

    /// Append the runtime value of a parameter as a subdirectory.
    pub fn subdirectory_parameter(mut self, name: impl Into<String>) -> Self {
        self.subdirectory_name_parameter = Some(name.into());
        self
    }

    /// Append a timestamp token to the directory name.
    pub fn with_timestamp(mut self) -> Self {
        self.include_timestamp = true;
        self
    }

    /// Append the run uuid to the directory name.
    pub fn with_uuid(mut self) -> Self {
        self.include_uuid = true;
        self
    }

    /// Inject the full resolved path into a parameter before the call.
    pub fn inject_into(mut self, name: impl Into<String>) -> Self {
        self.directory_injection_parameter = Some(name.into());
        self
    }

    /// Validate the configuration against a function signature.
    ///
    /// Runs once at tracker construction, never at call time.
    pub fn validate(&self, function: &str, signature: &Signature) -> Result<(), ConfigError> {
        if self.literal_directory.is_some() == self.directory_parameter.is_some() {
            return Err(ConfigError::ConflictingDirectorySources);
        }
        if (self.include_timestamp || self.include_uuid)
            && self.directory_parameter.is_none()
            && self.subdirectory_name_parameter.is_none()
            && self.directory_injection_parameter.is_none()
        {
            return Err(ConfigError::SuffixNeedsCarrier);
        }
        for parameter in [
            &self.directory_parameter,
            &self.subdirectory_name_parameter,
            &self.directory_injection_parameter,
        ]
        .into_iter()
        .flatten()
        {
            if !signature.contains(parameter) {
                return Err(ConfigError::NoSuchParameter {
                    function: function.to_string(),
                    parameter: parameter.clone(),
                });
            }
        }
        Ok(())
    }

    /// Compute the absolute output directory for one call.
    ///
    /// Injects the mutated segment back into its source parameter and the
    /// full path into the injection parameter, as configured.
    pub fn resolve(
        &self,
        args: &mut BoundArguments,
        started: &DateTime<Local>,
        run_uuid: &Uuid,
    ) -> TrackResult<PathBuf> {
        let mut dir = match (&self.literal_directory, &self.directory_parameter) {
            (Some(path), _) => path.clone(),
            (None, Some(parameter)) => segment_value(args, parameter).map(PathBuf::from)?,
            (None, None) => unreachable!("validated at construction"),
        };
        if dir.is_relative() {
            dir = env::current_dir()?.join(dir);
        }

        if let Some(parameter) = &self.subdirectory_name_parameter {
            dir.push(segment_value(args, parameter)?);
        }

        if self.include_timestamp || self.include_uuid {
            let mut name = dir
                .file_name()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .ok_or_else(|| TrackError::DirectoryResolution {
                    parameter: self.source_parameter().unwrap_or("literal_directory").to_string(),
                    reason: "path has no final segment to suffix".to_string(),
                })?;
            if self.include_timestamp {
                name = format!("{name}_{}", started.format(TIMESTAMP_FORMAT));
            }
            if self.include_uuid {
                name = format!("{name}_{run_uuid}");
            }
            dir.set_file_name(&name);

            // The source of the segment observes the generated name.
            if let Some(parameter) = &self.subdirectory_name_parameter {
                args.set(parameter, name);
            } else if let Some(parameter) = &self.directory_parameter {
                args.set(parameter, dir.display().to_string());
            }
        }
        if let Some(parameter) = &self.directory_injection_parameter {
            args.set(parameter, dir.display().to_string());
        }

        debug!(directory = %dir.display(), "Resolved output directory");
        Ok(dir)
    }

    /// The parameter the final path segment came from, if any.
    fn source_parameter(&self) -> Option<&str> {
        self.subdirectory_name_parameter
            .as_deref()
            .or(self.directory_parameter.as_deref())
    }
}

/// Read a bound parameter as a path segment.
fn segment_value(args: &BoundArguments, parameter: &str) -> TrackResult<String> {
    match args.get(parameter) {
        Some(value) => value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TrackError::DirectoryResolution {
                parameter: parameter.to_string(),
                reason: format!("value {value} is not a string"),
            }),
        None => Err(TrackError::DirectoryResolution {
            parameter: parameter.to_string(),
            reason: "no such bound parameter".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{CallArgs, Signature};

    fn bound(args: CallArgs) -> BoundArguments {
        Signature::new()
            .with_default("out_dir", "/data/out")
            .with_default("name", "model_a")
            .with_default("target", serde_json::Value::Null)
            .bind(&args)
            .unwrap()
    }

    fn run_stamp() -> (DateTime<Local>, Uuid) {
        (Local::now(), Uuid::new_v4())
    }

    #[test]
    fn literal_base_ignores_arguments() {
        let spec = DirectorySpec::literal("/tmp/proj");
        let (started, id) = run_stamp();
        let mut args = bound(CallArgs::new());

        let dir = spec.resolve(&mut args, &started, &id).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/proj"));
    }

    #[test]
    fn parameter_base_reads_runtime_value() {
        let spec = DirectorySpec::from_parameter("out_dir");
        let (started, id) = run_stamp();
        let mut args = bound(CallArgs::new().kwarg("out_dir", "/data/elsewhere"));

        let dir = spec.resolve(&mut args, &started, &id).unwrap();
        assert_eq!(dir, PathBuf::from("/data/elsewhere"));
    }

    #[test]
    fn subdirectory_parameter_appends_segment() {
        let spec = DirectorySpec::literal("/tmp/proj").subdirectory_parameter("name");
        let (started, id) = run_stamp();
        let mut args = bound(CallArgs::new().kwarg("name", "run1"));

        let dir = spec.resolve(&mut args, &started, &id).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/proj/run1"));
    }

    #[test]
    fn resolution_is_deterministic_without_suffixes() {
        let spec = DirectorySpec::literal("/tmp/proj").subdirectory_parameter("name");
        let (started, id) = run_stamp();
        let mut first = bound(CallArgs::new());
        let mut second = bound(CallArgs::new());

        let a = spec.resolve(&mut first, &started, &id).unwrap();
        let b = spec.resolve(&mut second, &started, &id).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn timestamp_suffix_uses_start_time() {
        let spec = DirectorySpec::literal("/tmp/proj")
            .subdirectory_parameter("name")
            .with_timestamp();
        let (started, id) = run_stamp();
        let mut args = bound(CallArgs::new());

        let dir = spec.resolve(&mut args, &started, &id).unwrap();
        let expected = format!("model_a_{}", started.format(TIMESTAMP_FORMAT));
        assert_eq!(dir, PathBuf::from("/tmp/proj").join(&expected));
        // The source parameter observes the final segment.
        assert_eq!(args.get_str("name"), Some(expected.as_str()));
    }

    #[test]
    fn uuid_suffix_uses_run_uuid() {
        let spec = DirectorySpec::literal("/tmp/proj")
            .subdirectory_parameter("name")
            .with_uuid();
        let (started, id) = run_stamp();
        let mut args = bound(CallArgs::new());

        let dir = spec.resolve(&mut args, &started, &id).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/proj").join(format!("model_a_{id}")));
    }

    #[test]
    fn combined_suffixes_put_timestamp_first() {
        let spec = DirectorySpec::literal("/tmp/proj")
            .subdirectory_parameter("name")
            .with_timestamp()
            .with_uuid();
        let (started, id) = run_stamp();
        let mut args = bound(CallArgs::new());

        let dir = spec.resolve(&mut args, &started, &id).unwrap();
        let expected = format!("model_a_{}_{id}", started.format(TIMESTAMP_FORMAT));
        assert_eq!(dir.file_name().unwrap().to_str().unwrap(), expected);
    }

    #[test]
    fn directory_parameter_source_receives_full_mutated_path() {
        let spec = DirectorySpec::from_parameter("out_dir").with_uuid();
        let (started, id) = run_stamp();
        let mut args = bound(CallArgs::new());

        let dir = spec.resolve(&mut args, &started, &id).unwrap();
        assert_eq!(args.get_str("out_dir"), Some(dir.display().to_string().as_str()));
    }

    #[test]
    fn injection_parameter_receives_full_path() {
        let spec = DirectorySpec::literal("/tmp/proj")
            .with_uuid()
            .inject_into("target");
        let (started, id) = run_stamp();
        let mut args = bound(CallArgs::new());

        let dir = spec.resolve(&mut args, &started, &id).unwrap();
        assert_eq!(args.get_str("target"), Some(dir.display().to_string().as_str()));
        assert!(dir.display().to_string().ends_with(&id.to_string()));
    }

    #[test]
    fn non_string_segment_is_a_resolution_error() {
        let spec = DirectorySpec::literal("/tmp/proj").subdirectory_parameter("name");
        let (started, id) = run_stamp();
        let mut args = bound(CallArgs::new().kwarg("name", 17));

        let err = spec.resolve(&mut args, &started, &id).unwrap_err();
        assert!(matches!(err, TrackError::DirectoryResolution { parameter, .. } if parameter == "name"));
    }

    #[test]
    fn validation_requires_exactly_one_base() {
        let signature = Signature::new().required("out_dir");
        let err = DirectorySpec::default()
            .validate("f", &signature)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingDirectorySources));

        let both = DirectorySpec {
            literal_directory: Some("/tmp".into()),
            directory_parameter: Some("out_dir".into()),
            ..DirectorySpec::default()
        };
        assert!(matches!(
            both.validate("f", &signature),
            Err(ConfigError::ConflictingDirectorySources)
        ));
    }

    #[test]
    fn validation_requires_a_suffix_carrier() {
        let signature = Signature::new().required("x");
        let err = DirectorySpec::literal("/tmp/proj")
            .with_uuid()
            .validate("f", &signature)
            .unwrap_err();
        assert!(matches!(err, ConfigError::SuffixNeedsCarrier));
    }

    #[test]
    fn validation_rejects_unknown_parameter_names() {
        let signature = Signature::new().required("x");
        let err = DirectorySpec::from_parameter("out_dir")
            .validate("train", &signature)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NoSuchParameter { parameter, .. } if parameter == "out_dir"
        ));
    }
}
