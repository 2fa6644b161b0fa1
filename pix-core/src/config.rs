//! # Pixgram Configuration
//!
//! A minimal string key/value store. Keys are dotted (`upload.max_file_bytes`)
//! and values are parsed on read through a [`PixConfigSnapshot`].
//!
//! ## Setting and reading values
//! ```rust
//! use pix_core::PixConfig;
//! let mut config = PixConfig::new();
//!
//! config.set("feed.limit", "12");
//!
//! assert_eq!(config.get("feed.limit"), Some("12"));
//! assert_eq!(config.snapshot().get_usize("feed.limit"), Some(12));
//! ```
//!
//! ## Environment overrides
//! [`PixConfig::load_env`] copies every variable starting with a prefix,
//! lower-casing it and turning `__` into `.`:
//!
//! ```bash
//! export PIXGRAM__FEED__LIMIT=24   # feed.limit = 24
//! ```

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct PixConfig {
    values: HashMap<String, String>,
}

impl PixConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Set a key only when it has no value yet.
    pub fn set_default<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Check whether a key is present.
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Override values from `std::env::vars()`.
    ///
    /// `PIXGRAM__UPLOAD__MAX_FILE_BYTES` with prefix `PIXGRAM__` becomes
    /// `upload.max_file_bytes`. Returns how many keys were applied.
    pub fn load_env(&mut self, prefix: &str) -> usize {
        self.load_vars(prefix, std::env::vars())
    }

    /// Same as [`PixConfig::load_env`] over an explicit variable list.
    pub fn load_vars<I>(&mut self, prefix: &str, vars: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut applied = 0;
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                if normalized.is_empty() {
                    continue;
                }
                tracing::debug!(key = %normalized, "config override from environment");
                self.values.insert(normalized, value);
                applied += 1;
            }
        }
        applied
    }

    pub fn snapshot(&self) -> PixConfigSnapshot {
        PixConfigSnapshot::new(self.values.clone())
    }
}

/// Read-only view of the configuration handed to services at build time.
#[derive(Debug, Clone, Default)]
pub struct PixConfigSnapshot {
    map: HashMap<String, String>,
}

impl PixConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse::<u32>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }
}
