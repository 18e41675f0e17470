//! # Queue configuration
//!
//! A flat string key/value store plus the typed [`ManagerConfig`] read from
//! it. Keys are dotted and lowercase:
//!
//! ```rust
//! use dog_jobs::config::{ConfigStore, ManagerConfig};
//!
//! let mut store = ConfigStore::new();
//! store.set("email.concurrency", "8");
//! store.set("shutdown.timeout_ms", "2500");
//!
//! let config = ManagerConfig::from_store(&store).unwrap();
//! assert_eq!(config.queues["email"].concurrency, 8);
//! assert_eq!(config.queues["exports"].concurrency, 2);
//! ```
//!
//! Environment variables map onto the same keys, so
//! `DOGJOBS__EMAIL__CONCURRENCY=8` becomes `email.concurrency`.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;

use crate::manager::{DEFAULT_QUEUE, EMAIL_QUEUE, EXPORTS_QUEUE, NOTIFICATIONS_QUEUE};
use crate::{QueueError, QueueOptions, QueueResult};

/// Prefix used by [`ManagerConfig::from_env`]
pub const ENV_PREFIX: &str = "DOGJOBS__";

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    values: HashMap<String, String>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every environment variable starting with `prefix`.
    ///
    /// The remainder is lowercased and `__` becomes `.`.
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    pub fn from_vars<I, K, V>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut store = Self::new();
        for (key, value) in vars {
            if let Some(stripped) = key.as_ref().strip_prefix(prefix) {
                store.set(stripped.to_lowercase().replace("__", "."), value);
            }
        }
        store
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_usize(&self, key: &str) -> QueueResult<Option<usize>> {
        self.parse(key)
    }

    pub fn get_u64(&self, key: &str) -> QueueResult<Option<u64>> {
        self.parse(key)
    }

    pub fn get_bool(&self, key: &str) -> QueueResult<Option<bool>> {
        self.parse(key)
    }

    fn parse<T: FromStr>(&self, key: &str) -> QueueResult<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| QueueError::InvalidConfig {
                    key: key.to_string(),
                    value: raw.to_string(),
                }),
        }
    }
}

/// Settings for [`crate::QueueManager::with_defaults`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Queues to create, by name
    pub queues: BTreeMap<String, QueueOptions>,
    /// Drain budget for [`crate::QueueManager::shutdown`]
    pub shutdown_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        let queues = [
            (DEFAULT_QUEUE, 5),
            (EMAIL_QUEUE, 3),
            (NOTIFICATIONS_QUEUE, 10),
            (EXPORTS_QUEUE, 2),
        ]
        .into_iter()
        .map(|(name, concurrency)| (name.to_string(), QueueOptions::default().with_concurrency(concurrency)))
        .collect();

        Self {
            queues,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ManagerConfig {
    /// Defaults overridden by `<queue>.concurrency` and `shutdown.timeout_ms`
    pub fn from_store(store: &ConfigStore) -> QueueResult<Self> {
        let mut config = Self::default();

        for (name, options) in config.queues.iter_mut() {
            if let Some(concurrency) = store.get_usize(&format!("{}.concurrency", name))? {
                *options = options.clone().with_concurrency(concurrency);
            }
        }

        if let Some(ms) = store.get_u64("shutdown.timeout_ms")? {
            config.shutdown_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }

    pub fn from_env() -> QueueResult<Self> {
        Self::from_store(&ConfigStore::from_env(ENV_PREFIX))
    }
}
