//! Per-function fixture tables
//!
//! A table is either a mapping from invocation key to recorded value or a
//! plain ordered sequence for keyless fixtures. The one merge implementation
//! here serves both the store (merging captures into a prior file) and
//! accumulating recorders (merging windows into retained state).

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::codec::Value;
use crate::invocation::InvocationKey;

/// Table shape discriminant, used in merge errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Mapping,
    Sequence,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Mapping => "mapping",
            Shape::Sequence => "sequence",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merging tables of different shapes is never guessed at.
#[derive(Debug, Error)]
#[error("cannot merge {fresh} fixtures into {prior} fixtures")]
pub struct ShapeMismatch {
    pub prior: Shape,
    pub fresh: Shape,
}

/// Recorded fixtures for one monitored function.
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureTable {
    /// Invocation key to recorded value.
    Mapping(BTreeMap<String, Value>),
    /// Ordered recorded values, for fixtures without a meaningful key.
    Sequence(Vec<Value>),
}

impl FixtureTable {
    pub fn shape(&self) -> Shape {
        match self {
            FixtureTable::Mapping(_) => Shape::Mapping,
            FixtureTable::Sequence(_) => Shape::Sequence,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FixtureTable::Mapping(entries) => entries.len(),
            FixtureTable::Sequence(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View a decoded fixture value as a table. Values that are neither
    /// mappings nor sequences have no table form.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Mapping(fields) => Some(FixtureTable::Mapping(fields)),
            Value::Sequence(items) => Some(FixtureTable::Sequence(items)),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        self.clone().into_value()
    }

    pub fn into_value(self) -> Value {
        match self {
            FixtureTable::Mapping(entries) => Value::Mapping(entries),
            FixtureTable::Sequence(items) => Value::Sequence(items),
        }
    }

    /// Merge `newer` into this table.
    ///
    /// Mappings: the newer value wins per key, untouched keys stay.
    /// Sequences: prior order is preserved, duplicates keep their first
    /// occurrence, new distinct items append in their own order. Merging is
    /// idempotent either way.
    pub fn merge(&mut self, newer: FixtureTable) -> Result<(), ShapeMismatch> {
        match (self, newer) {
            (FixtureTable::Mapping(prior), FixtureTable::Mapping(fresh)) => {
                for (key, value) in fresh {
                    prior.insert(key, value);
                }
                Ok(())
            }
            (FixtureTable::Sequence(prior), FixtureTable::Sequence(fresh)) => {
                for item in fresh {
                    if !prior.contains(&item) {
                        prior.push(item);
                    }
                }
                Ok(())
            }
            (prior, fresh) => Err(ShapeMismatch {
                prior: prior.shape(),
                fresh: fresh.shape(),
            }),
        }
    }
}

impl Default for FixtureTable {
    fn default() -> Self {
        FixtureTable::Mapping(BTreeMap::new())
    }
}

/// Everything one recording window captured: monitored-function name to its
/// table, name-ordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureSet {
    tables: BTreeMap<String, FixtureTable>,
}

impl FixtureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, function: impl Into<String>, table: FixtureTable) {
        self.tables.insert(function.into(), table);
    }

    pub fn get(&self, function: &str) -> Option<&FixtureTable> {
        self.tables.get(function)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FixtureTable)> {
        self.tables.iter().map(|(name, table)| (name.as_str(), table))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// File one capture under `function`. Mapping tables store it under the
    /// key; sequence tables keep capture order and ignore the key.
    pub fn record(&mut self, function: &str, key: InvocationKey, value: Value) {
        match self.tables.entry(function.to_string()).or_default() {
            FixtureTable::Mapping(entries) => {
                entries.insert(key.into_string(), value);
            }
            FixtureTable::Sequence(items) => items.push(value),
        }
    }

    /// Merge a whole newer set into this one, table by table.
    pub fn absorb(&mut self, newer: FixtureSet) -> Result<(), ShapeMismatch> {
        for (function, table) in newer.tables {
            match self.tables.entry(function) {
                Entry::Occupied(mut existing) => existing.get_mut().merge(table)?,
                Entry::Vacant(slot) => {
                    slot.insert(table);
                }
            }
        }
        Ok(())
    }
}
