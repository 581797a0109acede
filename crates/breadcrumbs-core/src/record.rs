//! The run record: the serializable account of one tracked call.
//!
//! Top-level key names and nesting are a compatibility contract;
//! downstream tooling parses these files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use breadcrumbs_git::RepositoryInfo;
use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::environment::EnvironmentInfo;

/// Serialized length above which a parameter value is suppressed.
pub const VALUE_CHAR_LIMIT: usize = 200;

const SUPPRESSED: &str = "<suppressed due to excessive length>";

/// Wall-clock timing bracketing the tracked function's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    /// Moment the function was invoked.
    pub start_time: DateTime<Local>,

    /// Moment the function returned.
    pub end_time: DateTime<Local>,

    /// Elapsed seconds between the two.
    pub run_time_seconds: f64,
}

/// Identity and arguments of the tracked function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalledFunction {
    /// Simple name of the function.
    pub name: String,

    /// Module path the function is declared in.
    pub module: String,

    /// Source file, when known. Null for targets without one.
    pub source_file: Option<PathBuf>,

    /// Bound arguments as passed or defaulted.
    pub parameters: IndexMap<String, Value>,

    /// Bound arguments as the function observed them, after directory and
    /// seed injection. Snapshot taken immediately before invocation.
    pub altered_parameters: IndexMap<String, Value>,
}

/// Complete provenance record of one tracked call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier of this run, freshly generated per call.
    pub uuid: String,

    /// Timing around the function's execution.
    pub timing: Timing,

    /// Process and host facts.
    pub environment: EnvironmentInfo,

    /// Pinned dependency inventory; absent when disabled or undiscoverable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_inventory: Option<BTreeMap<String, String>>,

    /// The call itself.
    pub called_function: CalledFunction,

    /// Version-control state of the function's repository; an explicit
    /// null when the source is not inside one.
    pub tracked_module: Option<RepositoryInfo>,

    /// Version-control state of additionally tracked repositories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_tracked_modules: Option<BTreeMap<String, Option<RepositoryInfo>>>,

    /// The seed the call ran with, caller-supplied or generated.
    pub seed: u64,
}

/// Clip one value for recording.
///
/// Values whose serialized form exceeds [`VALUE_CHAR_LIMIT`] are replaced
/// by a fixed placeholder so records stay readable.
pub fn clip_value(value: &Value) -> Value {
    match serde_json::to_string(value) {
        Ok(s) if s.len() > VALUE_CHAR_LIMIT => Value::String(SUPPRESSED.to_string()),
        _ => value.clone(),
    }
}

/// Clip every value of a parameter snapshot.
pub fn clip_parameters(parameters: &IndexMap<String, Value>) -> IndexMap<String, Value> {
    parameters
        .iter()
        .map(|(name, value)| (name.clone(), clip_value(value)))
        .collect()
}
