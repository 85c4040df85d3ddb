//! Session configuration.
//!
//! A flat key → string map handed to the engine when a session is created.
//! Order does not matter and the last write to a key wins. Files are TOML;
//! nested tables flatten into dotted keys.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Configuration parameters for a [`Session`](crate::session::Session).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionConfig {
    params: BTreeMap<String, String>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any earlier value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) -> &mut Self {
        self.set(key, value.to_string())
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: i64) -> &mut Self {
        self.set(key, value.to_string())
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Build from an alternating `key, value, key, value, ...` list.
    pub fn from_pairs<S: AsRef<str>>(items: &[S]) -> ConfigResult<Self> {
        if items.len() % 2 != 0 {
            return Err(ConfigError::OddPairs { count: items.len() });
        }
        let mut config = Self::new();
        for pair in items.chunks_exact(2) {
            config.set(pair[0].as_ref(), pair[1].as_ref());
        }
        Ok(config)
    }

    /// Parse a `key=value` assignment, as given on the command line.
    pub fn parse_assignment(&mut self, assignment: &str) -> ConfigResult<&mut Self> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| ConfigError::Parse {
                message: format!("expected key=value, got \"{assignment}\""),
            })?;
        Ok(self.set(key.trim(), value.trim()))
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let table: toml::Table = toml::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        let mut config = Self::new();
        flatten_into(&mut config, "", &table)?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Merge `other` into `self`; keys in `other` win.
    pub fn merge(&mut self, other: &SessionConfig) {
        for (k, v) in &other.params {
            self.params.insert(k.clone(), v.clone());
        }
    }
}

fn flatten_into(config: &mut SessionConfig, prefix: &str, table: &toml::Table) -> ConfigResult<()> {
    for (key, value) in table {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten_into(config, &full, nested)?,
            toml::Value::String(s) => {
                config.set(full, s.clone());
            }
            toml::Value::Integer(i) => {
                config.set_int(full, *i);
            }
            toml::Value::Float(f) => {
                config.set(full, f.to_string());
            }
            toml::Value::Boolean(b) => {
                config.set_bool(full, *b);
            }
            toml::Value::Datetime(d) => {
                config.set(full, d.to_string());
            }
            toml::Value::Array(_) => {
                return Err(ConfigError::Parse {
                    message: format!("\"{full}\" is an array; only scalar values are supported"),
                });
            }
        }
    }
    Ok(())
}
