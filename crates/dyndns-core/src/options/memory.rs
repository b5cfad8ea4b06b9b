// # Memory Config Store
//
// In-memory implementation of ConfigStore.
//
// ## Purpose
//
// Holds the dynamic DNS options in a map protected by a lock. The daemon
// fills it from environment variables and an optional JSON file; tests
// build it directly.
//
// ## Reload Behavior
//
// Options can be changed at runtime with `set()`/`remove()`. The scheduler
// reads them at the start of every update attempt, so a change is visible
// from the next attempt onward.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::DynDnsOption;
use crate::traits::ConfigStore;
use crate::Error;

/// In-memory option store
///
/// # Example
///
/// ```rust
/// use dyndns_core::config::DynDnsOption;
/// use dyndns_core::options::MemoryConfigStore;
/// use dyndns_core::traits::ConfigStore;
///
/// let store = MemoryConfigStore::new();
/// store.set(DynDnsOption::Domain, "EXAMPLE.TEST");
/// store.set(DynDnsOption::Ttl, 3600);
///
/// assert_eq!(store.get_string(DynDnsOption::Domain).as_deref(), Some("EXAMPLE.TEST"));
/// assert_eq!(store.get_int(DynDnsOption::Ttl), Some(3600));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    inner: Arc<RwLock<HashMap<DynDnsOption, Value>>>,
}

impl MemoryConfigStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON object keyed by option name
    ///
    /// Unknown keys are rejected so that typos surface at startup.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let store = Self::new();
        store.merge_json(json)?;
        Ok(store)
    }

    /// Overlay options from a JSON object keyed by option name
    pub fn merge_json(&self, json: &str) -> Result<(), Error> {
        let parsed: HashMap<String, Value> = serde_json::from_str(json)?;
        let mut resolved = Vec::with_capacity(parsed.len());
        for (key, value) in parsed {
            let option = DynDnsOption::from_key(&key)
                .ok_or_else(|| Error::config(format!("Unknown option '{}'", key)))?;
            resolved.push((option, value));
        }

        let mut guard = self.write();
        guard.extend(resolved);
        Ok(())
    }

    /// Set an option
    pub fn set(&self, option: DynDnsOption, value: impl Into<Value>) {
        self.write().insert(option, value.into());
    }

    /// Remove an option
    pub fn remove(&self, option: DynDnsOption) {
        self.write().remove(&option);
    }

    /// Get the number of options in the store
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<DynDnsOption, Value>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<DynDnsOption, Value>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_string(&self, option: DynDnsOption) -> Option<String> {
        match self.read().get(&option)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn get_int(&self, option: DynDnsOption) -> Option<i64> {
        match self.read().get(&option)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn get_bool(&self, option: DynDnsOption) -> Option<bool> {
        match self.read().get(&option)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}
