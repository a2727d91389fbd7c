//! Process-scoped configuration store
//!
//! String keys map to string values; readers choose the type at access
//! time. Malformed numerics quietly become zero (or false), keeping
//! configuration errors local. Listeners registered per key run
//! synchronously on the setter's thread.

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

/// One configuration value with typed readers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue(String);

impl ConfigValue {
    /// Wrap a raw string value
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse as i64, defaulting to 0
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0.trim().parse().unwrap_or(0)
    }

    /// Parse as u64, defaulting to 0
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0.trim().parse().unwrap_or(0)
    }

    /// Parse as f64, defaulting to 0.0
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        self.0.trim().parse().unwrap_or(0.0)
    }

    /// True for "true", "yes" or "1" (case-insensitive), false otherwise
    #[must_use]
    pub fn as_bool(&self) -> bool {
        matches!(
            self.0.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "1"
        )
    }

    /// Comma-separated list with whitespace-trimmed entries; empty entries
    /// are skipped
    #[must_use]
    pub fn as_string_list(&self) -> Vec<String> {
        self.0
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Comma-separated i64 list; unparseable entries are skipped
    #[must_use]
    pub fn as_i64_list(&self) -> Vec<i64> {
        self.0
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect()
    }

    /// Comma-separated f64 list; unparseable entries are skipped
    #[must_use]
    pub fn as_f64_list(&self) -> Vec<f64> {
        self.0
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect()
    }
}

/// Listener invoked with the key and new value after each `set`
pub type ConfigListener = Arc<dyn Fn(&str, &ConfigValue) + Send + Sync>;

#[derive(Default)]
struct Inner {
    values: FxHashMap<String, String>,
    listeners: FxHashMap<String, Vec<ConfigListener>>,
}

/// Thread-safe string KV store with per-key change listeners
#[derive(Default)]
pub struct ConfigStore {
    inner: RwLock<Inner>,
}

impl ConfigStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value; absent keys yield `default`
    #[must_use]
    pub fn get_or(&self, key: &str, default: &str) -> ConfigValue {
        let inner = self.inner.read();
        ConfigValue::new(inner.values.get(key).map_or(default, String::as_str))
    }

    /// Read a value; absent keys yield the empty string
    #[must_use]
    pub fn get(&self, key: &str) -> ConfigValue {
        self.get_or(key, "")
    }

    /// Whether a key is present
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.inner.read().values.contains_key(key)
    }

    /// All present keys
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().values.keys().cloned().collect()
    }

    /// Store a value, then notify this key's listeners synchronously on the
    /// calling thread (outside the store lock)
    pub fn set(&self, key: &str, value: &str) {
        let to_notify = {
            let mut inner = self.inner.write();
            inner.values.insert(key.to_string(), value.to_string());
            inner.listeners.get(key).cloned().unwrap_or_default()
        };

        let value = ConfigValue::new(value);
        for listener in to_notify {
            listener(key, &value);
        }
    }

    /// Register a listener for one key
    pub fn subscribe(&self, key: &str, listener: ConfigListener) {
        self.inner
            .write()
            .listeners
            .entry(key.to_string())
            .or_default()
            .push(listener);
    }

    /// Remove all listeners for one key
    pub fn unsubscribe(&self, key: &str) {
        self.inner.write().listeners.remove(key);
    }

    /// Load `key = value` lines from a file. Blank lines and lines starting
    /// with `#` are skipped; keys and values are whitespace-trimmed.
    ///
    /// # Errors
    /// Fails when the file cannot be read.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if !key.is_empty() {
                self.set(key, value.trim());
            }
        }
        Ok(())
    }
}
