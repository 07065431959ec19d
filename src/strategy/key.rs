//! Composite cache keys.

use std::fmt;

/// Key uniquely identifying one (spatial cell, date) pair.
///
/// The key is the cell identifier concatenated with the date, compared by
/// exact string equality. For a given (region, resolution, date) the same
/// key is always produced, which the cache depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey(String);

impl CompositeKey {
    /// Build a key from a cell identifier and a date.
    pub fn new(cell: &str, date: &str) -> Self {
        Self(format!("{cell}{date}"))
    }

    /// Wrap an already-composed key string, e.g. a feature's
    /// `properties.index`.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CompositeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_cell_then_date() {
        let key = CompositeKey::new("862830827ffffff", "2023-01-01");
        assert_eq!(key.as_str(), "862830827ffffff2023-01-01");
    }

    #[test]
    fn construction_is_deterministic() {
        let a = CompositeKey::new("abc", "2023-01-01");
        let b = CompositeKey::new("abc", "2023-01-01");
        assert_eq!(a, b);
        assert_eq!(a, CompositeKey::from_raw("abc2023-01-01"));
    }
}
