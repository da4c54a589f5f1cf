//! Parameter tables
//!
//! Weight, bias and requantization-scale blobs live in device memory; the
//! driver only needs each table's base address and contents. Provenance
//! (flash, host filesystem, generated) is a call-site concern.

use crate::error::{ModelError, Result};

/// One contiguous parameter table at a fixed device address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterTable {
    /// Human-readable label, used in logs and overlap diagnostics.
    pub name: String,
    /// Device memory base address, in words.
    pub base: u32,
    /// Table contents.
    pub words: Vec<i32>,
}

impl ParameterTable {
    /// Create a table.
    pub fn new(name: impl Into<String>, base: u32, words: Vec<i32>) -> Self {
        Self {
            name: name.into(),
            base,
            words,
        }
    }

    /// One past the last word address this table occupies.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn end(&self) -> u32 {
        self.base + self.words.len() as u32
    }
}

/// The complete parameter set for one network.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    tables: Vec<ParameterTable>,
}

impl ParameterSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, checking it against the tables already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the new table overlaps an existing one in device
    /// memory.
    pub fn push(&mut self, table: ParameterTable) -> Result<()> {
        for existing in &self.tables {
            let disjoint = table.end() <= existing.base || existing.end() <= table.base;
            if !disjoint {
                return Err(ModelError::TableOverlap {
                    first: existing.name.clone(),
                    second: table.name,
                });
            }
        }
        tracing::debug!(
            name = %table.name,
            base = table.base,
            words = table.words.len(),
            "parameter table registered"
        );
        self.tables.push(table);
        Ok(())
    }

    /// Iterate tables in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, ParameterTable> {
        self.tables.iter()
    }

    /// Total words across all tables.
    #[must_use]
    pub fn total_words(&self) -> usize {
        self.tables.iter().map(|t| t.words.len()).sum()
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// True if no tables have been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_rejected() {
        let mut set = ParameterSet::new();
        set.push(ParameterTable::new("a", 100, vec![0; 50])).unwrap();
        let clash = ParameterTable::new("b", 120, vec![0; 10]);
        assert!(matches!(
            set.push(clash),
            Err(ModelError::TableOverlap { .. })
        ));
    }

    #[test]
    fn adjacent_tables_allowed() {
        let mut set = ParameterSet::new();
        set.push(ParameterTable::new("a", 100, vec![0; 50])).unwrap();
        set.push(ParameterTable::new("b", 150, vec![0; 10])).unwrap();
        assert_eq!(set.total_words(), 60);
    }
}
