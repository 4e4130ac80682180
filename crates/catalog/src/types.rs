//! Core domain types for the place catalog.
//!
//! A catalog row is kept as an ordered, typed field mapping rather than a
//! fixed struct: the service only needs the identifier column, every other
//! column is passed through to clients untouched.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Identifiers
// =============================================================================

/// Normalised item identifier.
///
/// Request bodies, CSV cells and model output all spell ids differently
/// (`7`, `7.0`, `" 7"`), so every id goes through the same normalisation
/// before it is compared: trim, then render integral numbers as integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

/// Largest float that still maps exactly onto an integer id.
const MAX_EXACT_F64: f64 = 9_007_199_254_740_992.0;

impl ItemId {
    /// Parse an identifier from text. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(int) = trimmed.parse::<i64>() {
            return Some(Self(int.to_string()));
        }
        if let Ok(float) = trimmed.parse::<f64>() {
            if let Some(id) = Self::from_f64(float) {
                return Some(id);
            }
        }
        Some(Self(trimmed.to_string()))
    }

    /// Build an identifier from a number. Only integral, finite values are ids.
    pub fn from_f64(value: f64) -> Option<Self> {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_EXACT_F64 {
            Some(Self((value as i64).to_string()))
        } else {
            None
        }
    }

    pub fn from_i64(value: i64) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

// =============================================================================
// Field values
// =============================================================================

/// One typed catalog cell.
///
/// Typing is per cell: empty → `Null`, integer literal → `Integer`, finite
/// float literal → `Float`, anything else → `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
            FieldValue::Float(x) => serializer.serialize_f64(*x),
            FieldValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

// =============================================================================
// Rows
// =============================================================================

/// One place from the catalog.
///
/// Column names are shared between all rows of a catalog; `values` is
/// aligned with them. Serialises as a flat JSON object in header order.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    pub id: ItemId,
    pub(crate) columns: Arc<[String]>,
    pub(crate) values: Vec<FieldValue>,
}

impl CatalogRow {
    /// Get the value of a column, if the column exists
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    /// Iterate `(column, value)` pairs in header order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.columns
            .iter()
            .map(|c| c.as_str())
            .zip(self.values.iter())
    }
}

impl Serialize for CatalogRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.fields() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

// =============================================================================
// ReferenceCatalog - the in-memory index
// =============================================================================

/// Immutable, indexed view of the catalog dataset.
///
/// Built once at startup (see `index.rs`) and shared read-only afterwards,
/// usually behind an `Arc`.
#[derive(Debug)]
pub struct ReferenceCatalog {
    pub(crate) id_column: String,
    pub(crate) columns: Arc<[String]>,
    /// Rows in load order
    pub(crate) rows: Vec<CatalogRow>,
    /// Identifier → position in `rows`
    pub(crate) index: HashMap<ItemId, usize>,
}

impl ReferenceCatalog {
    /// Look up a row by identifier.
    ///
    /// Absence is an ordinary outcome, so this never errors.
    pub fn lookup(&self, id: &ItemId) -> Option<&CatalogRow> {
        self.index.get(id).map(|&idx| &self.rows[idx])
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows in load order
    pub fn rows(&self) -> &[CatalogRow] {
        &self.rows
    }

    /// All identifiers in load order
    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.rows.iter().map(|row| &row.id)
    }
}
