//! Process environment access behind a capability trait.
//!
//! The store backends never touch `std::env` directly. They go through
//! [`EnvVars`], so tests can substitute an in-memory environment and
//! observe fallback behavior without mutating real process state.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Read, write and enumerate access to environment variables.
///
/// Implementations must be `Send + Sync` so store handles built on top of
/// them can be shared across async tasks.
pub trait EnvVars: Send + Sync {
    /// Fetch the variable `key`, failing if it is unset or not unicode.
    fn var(&self, key: &str) -> Result<String, env::VarError>;

    /// Set the variable `key` to `value`.
    fn set_var(&self, key: &str, value: &str) -> Result<(), VarsError>;

    /// Every variable visible to the process, as `(name, value)` pairs.
    fn vars(&self) -> Vec<(String, String)>;
}

/// Errors from writing to an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarsError {
    /// The variable name was empty or contained `=` or a NUL byte.
    InvalidKey(String),
    /// The value contained a NUL byte.
    InvalidValue { key: String },
}

impl fmt::Display for VarsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey(key) => {
                write!(f, "invalid environment variable name {key:?}")
            }
            Self::InvalidValue { key } => {
                write!(f, "invalid value for environment variable {key:?}")
            }
        }
    }
}

impl std::error::Error for VarsError {}

/// Reject names and values that `std::env::set_var` would panic on.
fn validate(key: &str, value: &str) -> Result<(), VarsError> {
    if key.is_empty() || key.contains('=') || key.contains('\0') {
        return Err(VarsError::InvalidKey(key.to_string()));
    }
    if value.contains('\0') {
        return Err(VarsError::InvalidValue {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// [`EnvVars`] backed by the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvVars for ProcessEnv {
    #[inline]
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    fn set_var(&self, key: &str, value: &str) -> Result<(), VarsError> {
        validate(key, value)?;
        env::set_var(key, value);
        Ok(())
    }

    fn vars(&self) -> Vec<(String, String)> {
        env::vars().collect()
    }
}

/// Thread-safe in-memory environment.
///
/// Backed by `Arc<Mutex<BTreeMap>>` so it is `Clone`, `Send` and `Sync`,
/// and clones share state. Enumeration order is the sorted key order,
/// which keeps test assertions deterministic.
#[derive(Debug, Clone, Default)]
pub struct MemoryEnv {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryEnv {
    /// Create a new, empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a variable without going through validation. Test convenience.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.lock().unwrap().insert(key.into(), value.into());
    }

    /// Number of variables currently set.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// `true` if no variables are set.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

impl EnvVars for MemoryEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        self.inner
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or(env::VarError::NotPresent)
    }

    fn set_var(&self, key: &str, value: &str) -> Result<(), VarsError> {
        validate(key, value)?;
        self.inner
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
