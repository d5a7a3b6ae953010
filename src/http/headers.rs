//! Case-insensitive, insertion-ordered HTTP header map.

use crate::error::{Error, Result};

/// HTTP header fields.
///
/// Lookups ignore ASCII case; iteration and serialization keep the order in
/// which names were first set. Setting an existing name replaces its value in
/// place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Value of `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    /// Value of `name` if present and non-empty after trimming.
    #[must_use]
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Set `name` to `value`, replacing any existing value.
    ///
    /// Values are trusted; use [`HeaderMap::try_set`] for values that come
    /// from outside the crate.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Set a header after checking that neither part can break the head.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHeaderValue` if the name or value contains CR
    /// or LF, or the name contains `:` or is empty.
    pub fn try_set(&mut self, name: &str, value: &str) -> Result<()> {
        if name.is_empty() || name.contains([':', '\r', '\n']) {
            return Err(Error::InvalidHeaderValue {
                header: name.to_string(),
                reason: "invalid header name".to_string(),
            });
        }
        if value.contains(['\r', '\n']) {
            return Err(Error::InvalidHeaderValue {
                header: name.to_string(),
                reason: "contains CR or LF characters".to_string(),
            });
        }
        self.set(name, value);
        Ok(())
    }

    /// Remove `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    /// Parse the value of `name` as an integer.
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn set_int(&mut self, name: impl Into<String>, value: i64) {
        self.set(name, value.to_string());
    }

    /// Parse the value of `name` as a float.
    #[must_use]
    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn set_float(&mut self, name: impl Into<String>, value: f64) {
        self.set(name, value.to_string());
    }

    /// Parse one `Name: value` line. Lines without a colon are ignored.
    pub(crate) fn parse_line(&mut self, line: &str) {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() {
                self.set(name, value.trim());
            }
        }
    }

    /// Append `Name: value\r\n` lines to `buf`.
    pub(crate) fn write_lines(&self, buf: &mut Vec<u8>) {
        for (name, value) in &self.entries {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
