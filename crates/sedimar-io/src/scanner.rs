//! The KEY : VALUE configuration format.
//!
//! One entry per line, a colon between key and value, `#` starts a
//! comment. Keys are matched case-insensitively and may contain
//! spaces; array values separate elements with commas.

use crate::{IoError, Result};
use indexmap::IndexMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: IndexMap<String, String>,
}

impl SymbolTable {
    /// Parse a configuration text.
    pub fn from_text(text: &str) -> Self {
        let mut entries = IndexMap::new();
        for line in text.lines() {
            let line = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            };
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            entries.insert(key.to_lowercase(), value.trim().to_string());
        }
        Self { entries }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| IoError::File {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_text(&text))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    /// The raw value of `key`.
    pub fn value(&self, key: &str) -> Result<&str> {
        self.entries
            .get(&key.to_lowercase())
            .map(String::as_str)
            .ok_or_else(|| IoError::MissingKey(key.to_string()))
    }

    /// The value of `key` as a float.
    pub fn f64_value(&self, key: &str) -> Result<f64> {
        let value = self.value(key)?;
        value.parse().map_err(|_| IoError::BadValue {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// The value of `key` as a comma-separated float array.
    pub fn f64_array_value(&self, key: &str) -> Result<Vec<f64>> {
        let value = self.value(key)?;
        value
            .split(',')
            .map(|item| {
                item.trim().parse().map_err(|_| IoError::BadValue {
                    key: key.to_string(),
                    value: item.trim().to_string(),
                })
            })
            .collect()
    }

    /// The value of `key` as a string, trimmed.
    pub fn str_value(&self, key: &str) -> Result<String> {
        Ok(self.value(key)?.to_string())
    }
}
