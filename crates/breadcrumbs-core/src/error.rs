//! Error types for run tracking.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for call-time tracking operations.
pub type TrackResult<T> = Result<T, TrackError>;

/// Errors raised while constructing a tracker. These are configuration
/// mistakes and always surface before the first call.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Zero or both of the directory sources were configured.
    #[error("exactly one of literal_directory or directory_parameter must be set")]
    ConflictingDirectorySources,

    /// A unique suffix was requested but no parameter can carry the final
    /// directory name back into the call.
    #[error(
        "include_timestamp/include_uuid need a parameter that receives the \
         updated directory name; set directory_injection_parameter"
    )]
    SuffixNeedsCarrier,

    /// A configured parameter name is not part of the function signature.
    #[error("no such parameter '{parameter}' for function '{function}'")]
    NoSuchParameter { function: String, parameter: String },

    /// Strict mode rejected a repository with uncommitted changes.
    #[error("repository at {working_dir} has uncommitted changes")]
    DirtyRepository { working_dir: PathBuf },
}

/// Errors raised when call arguments cannot be matched against the
/// function signature.
#[derive(Debug, Error)]
pub enum BindingError {
    /// More positional values than declared parameters.
    #[error("too many positional arguments: expected at most {expected}, got {given}")]
    TooManyPositional { expected: usize, given: usize },

    /// A keyword argument that matches no declared parameter.
    #[error("unknown keyword argument '{0}'")]
    UnknownKeyword(String),

    /// A parameter received both a positional and a keyword value, or the
    /// same keyword twice.
    #[error("got multiple values for argument '{0}'")]
    DuplicateArgument(String),

    /// A parameter without a default was not supplied.
    #[error("missing required argument '{0}'")]
    MissingArgument(String),
}

/// Errors raised during a tracked call.
#[derive(Debug, Error)]
pub enum TrackError {
    /// Call arguments are incompatible with the signature.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// A parameter referenced by the directory configuration is missing or
    /// unusable as a path segment.
    #[error("cannot resolve output directory from '{parameter}': {reason}")]
    DirectoryResolution { parameter: String, reason: String },

    /// The seed parameter held something other than a non-negative integer
    /// or null.
    #[error("seed parameter '{parameter}' must hold a non-negative integer or null")]
    InvalidSeed { parameter: String },

    /// The output directory was required to be empty but is not.
    #[error("output directory {0} is not empty")]
    DirectoryNotEmpty(PathBuf),

    /// The tracked function itself failed. The underlying error propagates
    /// unchanged; no record is written for the call.
    #[error("tracked function failed: {0}")]
    Function(#[source] anyhow::Error),

    /// Directory creation or record write failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization failed.
    #[error("record serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
