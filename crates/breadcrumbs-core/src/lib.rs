//! Provenance records for tracked function calls.
//!
//! Wrap a data-processing entrypoint in a [`Tracker`] and every call gets
//! an output directory computed from static and runtime fragments, a
//! resolved random seed applied to process-global generators, and a JSON
//! run record written into that directory: who ran what, where, with which
//! arguments, on which commit, against which dependencies.
//!
//! ## The call pipeline
//!
//! ```text
//! invoke(args, f)
//!   ├── bind        CallArgs × Signature  →  BoundArguments
//!   ├── resolve     DirectorySpec         →  output directory (+ injection)
//!   ├── seed        SeedManager           →  seed (+ injection)
//!   ├── run         f(&BoundArguments)    →  result (timed)
//!   └── record      Record                →  <dir>/<function>_record.json
//! ```
//!
//! The record is written only after the function returns successfully; a
//! failing call propagates its error and leaves no record.
//!
//! ## Example
//!
//! ```no_run
//! use breadcrumbs_core::{function_target, CallArgs, DirectorySpec, Signature, TrackSpec, Tracker};
//!
//! let tracker = Tracker::new(
//!     function_target!("train"),
//!     Signature::new()
//!         .required("name")
//!         .with_default("seed", serde_json::Value::Null),
//!     TrackSpec::new(
//!         DirectorySpec::literal("/data/experiments").subdirectory_parameter("name"),
//!     )
//!     .with_seed_parameter("seed"),
//! )?;
//!
//! let accuracy = tracker.invoke(CallArgs::new().kwarg("name", "run1"), |args| {
//!     let seed = args.get_u64("seed").expect("injected");
//!     // ... train with the seed, write outputs ...
//!     Ok(0.93)
//! })?;
//! # Ok::<(), anyhow::Error>(())
//! ```

mod directory;
mod environment;
mod error;
mod packages;
mod record;
mod seed;
mod signature;
mod tracker;
mod writer;

pub use breadcrumbs_git::RepositoryInfo;
pub use directory::{DirectorySpec, TIMESTAMP_FORMAT};
pub use environment::{watched_variables, EnvironmentInfo, DEFAULT_WATCHED_VARIABLES};
pub use error::{BindingError, ConfigError, TrackError, TrackResult};
pub use packages::{find_lockfile, package_inventory};
pub use record::{clip_parameters, clip_value, CalledFunction, Record, Timing, VALUE_CHAR_LIMIT};
pub use seed::{generate_seed, with_global_rng, GlobalStdRng, RngCollaborator, SeedManager};
pub use signature::{lossy_value, BoundArguments, CallArgs, Signature};
pub use tracker::{FunctionTarget, TrackSpec, Tracker};
pub use writer::{record_path, write_record};
