//! Persisted session state.
//!
//! # Design
//! A `SessionStore` is a tiny string key/value store, the analogue of a
//! browser's local storage. The bearer token lives in it under a fixed key
//! and is read every time a request leaves the app, so a login or logout
//! takes effect on the very next request. Writes report whether they were
//! persisted; a store that fails to write leaves its previous contents in
//! place.

use std::collections::HashMap;

use crate::error::SessionError;

pub trait SessionStore {
    fn load(&self, key: &str) -> Option<String>;
    fn store(&mut self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&mut self, key: &str) -> Result<(), SessionError>;
}

impl<S: SessionStore + ?Sized> SessionStore for Box<S> {
    fn load(&self, key: &str) -> Option<String> {
        (**self).load(key)
    }

    fn store(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        (**self).store(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        (**self).remove(key)
    }
}

/// In-memory store; state is lost when dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with one entry.
    pub fn with(key: &str, value: &str) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.to_string(), value.to_string());
        Self { entries }
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn store(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), SessionError> {
        self.entries.remove(key);
        Ok(())
    }
}
