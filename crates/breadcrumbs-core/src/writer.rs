//! Record persistence.
//!
//! One pretty-printed JSON file per resolved directory, named after the
//! tracked function. Overwrite wins; callers that want one record per run
//! give each run its own directory. Chaining turns the file into a JSON
//! array that accumulates one element per run instead.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::error::TrackResult;
use crate::record::Record;

/// Join a directory and a record filename, enforcing the `.json` extension.
pub fn record_path(directory: &Path, filename: &str) -> PathBuf {
    if filename.ends_with(".json") {
        directory.join(filename)
    } else {
        directory.join(format!("{filename}.json"))
    }
}

/// Serialize a record and write it at `path`, creating missing directories.
///
/// With `chain` set and a record file already present, the new record is
/// appended: an existing array gains one element, an existing object
/// becomes a two-element array.
pub fn write_record(path: &Path, record: &Record, chain: bool) -> TrackResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let payload = if chain && path.exists() {
        let previous: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        let current = serde_json::to_value(record)?;
        match previous {
            Value::Array(mut items) => {
                items.push(current);
                Value::Array(items)
            }
            other => Value::Array(vec![other, current]),
        }
    } else {
        serde_json::to_value(record)?
    };

    fs::write(path, serde_json::to_string_pretty(&payload)?)?;
    info!(path = %path.display(), "Wrote run record");
    Ok(())
}
