//! Explicit call-signature model and argument binding.
//!
//! A [`Signature`] declares the parameters a tracked function accepts, in
//! order, each optionally carrying a default. [`CallArgs`] holds the values
//! of one call (positional plus keyword), and [`Signature::bind`] resolves
//! them into [`BoundArguments`] — a complete ordered name→value mapping the
//! rest of the pipeline reads from and injects into.
//!
//! Values are [`serde_json::Value`] throughout. This keeps the record
//! serializable by construction while still accepting arbitrary payloads.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::error::BindingError;

/// Convert any serializable value into a record-safe JSON value.
///
/// Serialization failures (e.g. map keys that cannot become strings)
/// degrade to a string placeholder instead of raising.
pub fn lossy_value<T: Serialize>(value: T) -> Value {
    match serde_json::to_value(&value) {
        Ok(v) => v,
        Err(e) => Value::String(format!("<unserializable: {e}>")),
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
struct Param {
    name: String,
    default: Option<Value>,
}

/// Ordered parameter declarations for a tracked function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    /// Create an empty signature.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required parameter.
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Declare a parameter with a default value.
    pub fn with_default(mut self, name: impl Into<String>, default: impl Serialize) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: Some(lossy_value(default)),
        });
        self
    }

    /// Whether a parameter with this name is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether no parameters are declared.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Resolve one call's arguments against this signature.
    ///
    /// Positional values fill parameters in declaration order, keywords
    /// match by name, and declared defaults fill the rest. The result
    /// covers every declared parameter or the call is rejected.
    pub fn bind(&self, args: &CallArgs) -> Result<BoundArguments, BindingError> {
        if args.positional.len() > self.params.len() {
            return Err(BindingError::TooManyPositional {
                expected: self.params.len(),
                given: args.positional.len(),
            });
        }
        for (name, _) in &args.keyword {
            if !self.contains(name) {
                return Err(BindingError::UnknownKeyword(name.clone()));
            }
            if args.keyword.iter().filter(|(n, _)| n == name).count() > 1 {
                return Err(BindingError::DuplicateArgument(name.clone()));
            }
        }

        let mut values = IndexMap::with_capacity(self.params.len());
        for (index, param) in self.params.iter().enumerate() {
            let keyword = args.keyword.iter().find(|(n, _)| n == &param.name);
            let value = if index < args.positional.len() {
                if keyword.is_some() {
                    return Err(BindingError::DuplicateArgument(param.name.clone()));
                }
                args.positional[index].clone()
            } else if let Some((_, v)) = keyword {
                v.clone()
            } else if let Some(default) = &param.default {
                default.clone()
            } else {
                return Err(BindingError::MissingArgument(param.name.clone()));
            };
            values.insert(param.name.clone(), value);
        }

        Ok(BoundArguments { values })
    }
}

/// The positional and keyword values of one call.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
}

impl CallArgs {
    /// Create an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional value.
    pub fn arg(mut self, value: impl Serialize) -> Self {
        self.positional.push(lossy_value(value));
        self
    }

    /// Append a keyword value.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        self.keyword.push((name.into(), lossy_value(value)));
        self
    }

    /// Whether a keyword with this name was supplied.
    pub fn has_keyword(&self, name: &str) -> bool {
        self.keyword.iter().any(|(n, _)| n == name)
    }

    /// Append a null keyword, used to pre-fill parameters whose values the
    /// tracker injects after binding.
    pub(crate) fn with_null_keyword(mut self, name: &str) -> Self {
        self.keyword.push((name.to_string(), Value::Null));
        self
    }
}

/// Complete ordered name→value mapping for one call.
///
/// Created by [`Signature::bind`], mutated by directory and seed injection,
/// and read by the tracked function. Two snapshots of it (before and after
/// injection) end up in the run record.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArguments {
    values: IndexMap<String, Value>,
}

impl BoundArguments {
    /// Look up a value by parameter name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Look up a string value by parameter name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Look up a string value and interpret it as a path.
    pub fn get_path(&self, name: &str) -> Option<PathBuf> {
        self.get_str(name).map(PathBuf::from)
    }

    /// Look up a non-negative integer value by parameter name.
    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    /// Overwrite the value of an existing parameter. Returns false when no
    /// parameter with this name is bound.
    pub fn set(&mut self, name: &str, value: impl Serialize) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = lossy_value(value);
                true
            }
            None => false,
        }
    }

    /// Iterate parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Clone the current mapping, preserving order.
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.values.clone()
    }
}
