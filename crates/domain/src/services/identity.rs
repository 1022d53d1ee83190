//! Identity storage.
//!
//! The device identifier must survive process restarts. Stores are simple
//! string key/value maps; the agent provides a file-backed one.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

/// Errors raised by an identity store.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Identity store is corrupt: {0}")]
    Corrupt(String),
}

/// Persistent key/value storage for identity values.
pub trait IdentityStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, IdentityError>;

    fn put(&self, key: &str, value: &str) -> Result<(), IdentityError>;

    /// Returns the stored value, creating and persisting it on first use.
    fn get_or_create(
        &self,
        key: &str,
        create: &dyn Fn() -> String,
    ) -> Result<String, IdentityError> {
        if let Some(existing) = self.get(key)? {
            return Ok(existing);
        }
        let value = create();
        self.put(key, &value)?;
        Ok(value)
    }
}

/// Identity store kept in memory. Values last for the lifetime of the store.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn get(&self, key: &str) -> Result<Option<String>, IdentityError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), IdentityError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
