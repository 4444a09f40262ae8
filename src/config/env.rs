//! The environment snapshot threaded through resolution.
//!
//! Values are looked up in an ordered list rather than the live process
//! table; the process environment is only ever read.

use std::collections::HashMap;

use super::source::EnvEntry;

/// Where an environment value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Process,
    Descriptor,
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
    pub origin: Origin,
}

/// Ordered `(key, value, origin)` list. The first entry for a key wins.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: Vec<EnvVar>,
    index: HashMap<String, usize>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the process environment. Non UTF-8 entries are skipped.
    pub fn from_process() -> Self {
        let mut env = Self::new();
        for (key, value) in std::env::vars_os() {
            if let (Ok(key), Ok(value)) = (key.into_string(), value.into_string()) {
                env.set(key, value, Origin::Process);
            }
        }
        env
    }

    /// Adds `key` unless it is already present. Returns whether it was added.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>, origin: Origin) -> bool {
        let key = key.into();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key.clone(), self.vars.len());
        self.vars.push(EnvVar {
            key,
            value: value.into(),
            origin,
        });
        true
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value, Origin::Explicit);
        self
    }

    pub fn get(&self, key: &str) -> Option<&EnvVar> {
        self.index.get(key).map(|&i| &self.vars[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvVar> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Appends the literal values of descriptor entries whose keys are not
    /// yet present. Returns how many were added.
    pub fn layer<'e>(&mut self, entries: impl IntoIterator<Item = &'e EnvEntry>) -> usize {
        entries
            .into_iter()
            .filter_map(|entry| entry.value.as_deref().map(|value| (&entry.name, value)))
            .filter(|(name, value)| self.set(name.as_str(), *value, Origin::Descriptor))
            .count()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = Self::new();
        for (key, value) in iter {
            env.set(key, value, Origin::Explicit);
        }
        env
    }
}
