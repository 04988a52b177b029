//! Companion properties files.
//!
//! Flat `key=value` documents (`gradle.properties`) whose bindings
//! participate in the resolution chain of their associated build file.
//! No nesting, no blocks.

use indexmap::IndexMap;
use std::path::PathBuf;

/// One parsed properties file.
#[derive(Debug, Clone)]
pub struct PropertiesFile {
    pub path: PathBuf,
    bindings: IndexMap<String, String>,
}

impl PropertiesFile {
    pub fn parse(path: PathBuf, text: &str) -> Self {
        Self {
            path,
            bindings: parse_properties(text),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.bindings.get(key).map(String::as_str)
    }

    /// Bindings in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Parses `key=value` lines. `#` and `!` start comments; whitespace around
/// keys and values is trimmed; `:` is accepted as a separator like the Java
/// properties format; later duplicates win.
fn parse_properties(text: &str) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some(split) = line.find(['=', ':']) else {
            continue;
        };
        let key = line[..split].trim();
        let value = line[split + 1..].trim();
        if !key.is_empty() {
            out.insert(key.to_string(), value.to_string());
        }
    }
    out
}
