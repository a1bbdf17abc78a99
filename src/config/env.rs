//! Raw environment access.
//!
//! The task is configured through flat, numbered environment keys
//! (`ATTR0`, `OUTPUT1_PREPARE_IMAGE`, …). This module is the only place that
//! knows about that naming; everything past the resolver works on typed
//! [`TargetSpec`](super::TargetSpec) records.

use std::collections::BTreeMap;

use crate::error::TaskError;

/// Values that switch a boolean-ish setting off (compared case-insensitively).
const FALSE_STRS: &[&str] = &["0", "false"];

/// Snapshot of the environment the task was started with.
#[derive(Debug, Clone, Default)]
pub struct Env {
    vars: BTreeMap<String, String>,
}

impl Env {
    /// Capture the current process environment. Non-UTF-8 values are converted lossily.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .map(|(k, v)| {
                (
                    k.to_string_lossy().into_owned(),
                    v.to_string_lossy().into_owned(),
                )
            })
            .collect()
    }

    /// Non-empty value of `key`. An empty variable counts as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// All `PREFIX<key>` variables with the prefix stripped, sorted by key.
    /// A bare `PREFIX` with nothing after it is skipped.
    pub fn with_prefix(&self, prefix: &str) -> BTreeMap<String, String> {
        self.vars
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(prefix)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_string(), v.clone()))
            })
            .collect()
    }

    /// Resolve an unqualified key that aliases the index-0 key.
    ///
    /// Both being set is a conflict, whether or not the values agree.
    pub fn aliased(&self, unqualified: &str, indexed0: &str) -> Result<Option<String>, TaskError> {
        match (self.get(unqualified), self.get(indexed0)) {
            (Some(_), Some(_)) => Err(TaskError::ConfigConflict(format!(
                "both ${unqualified} and ${indexed0} set"
            ))),
            (Some(v), None) | (None, Some(v)) => Ok(Some(v.to_string())),
            (None, None) => Ok(None),
        }
    }
}

impl FromIterator<(String, String)> for Env {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Env {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// Whether a setting value means "on".
pub fn is_truthy(value: Option<&str>) -> bool {
    match value {
        None => false,
        Some(v) if v.is_empty() => false,
        Some(v) => !FALSE_STRS.contains(&v.to_ascii_lowercase().as_str()),
    }
}

/// Parse the numeric suffix of an `ATTR<n>` key.
pub fn attr_index(key: &str) -> Option<usize> {
    let digits = key.strip_prefix("ATTR")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
