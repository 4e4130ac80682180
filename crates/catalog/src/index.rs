//! ReferenceCatalog loading and indexing logic.
//!
//! Loading happens once at startup:
//! 1. Read header and raw records (`parser`)
//! 2. Locate the identifier column
//! 3. Type every record's cells in parallel (rayon)
//! 4. Build the identifier index, rejecting blank and duplicate ids

use crate::error::{CatalogLoadError, Result};
use crate::parser::{self, RawTable};
use crate::types::*;
use rayon::prelude::*;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

impl ReferenceCatalog {
    /// Load the catalog from a CSV file
    ///
    /// This is the main entry point used at process startup.
    pub fn load(path: &Path, id_column: &str) -> Result<Self> {
        info!("Loading catalog from {:?} (id column: {})", path, id_column);

        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CatalogLoadError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => CatalogLoadError::IoError(e),
        })?;

        let source_name = path.display().to_string();
        let catalog = Self::from_reader(BufReader::new(file), &source_name, id_column)?;

        info!(
            "Catalog loaded: {} rows, {} columns",
            catalog.len(),
            catalog.columns().len()
        );
        Ok(catalog)
    }

    /// Load the catalog from any reader producing CSV
    ///
    /// `source_name` only appears in error messages.
    pub fn from_reader<R: Read>(reader: R, source_name: &str, id_column: &str) -> Result<Self> {
        let table = parser::read_table(reader, source_name)?;
        Self::build(table, source_name, id_column)
    }

    /// Build the index from a parsed table
    fn build(table: RawTable, source_name: &str, id_column: &str) -> Result<Self> {
        let id_idx = table
            .headers
            .iter()
            .position(|h| h == id_column)
            .ok_or_else(|| CatalogLoadError::MissingIdColumn {
                source_name: source_name.to_string(),
                column: id_column.to_string(),
            })?;

        let columns: Arc<[String]> = table.headers.into();

        // Typing is per cell, so records are independent of each other
        let typed: Vec<(u64, Option<ItemId>, String, Vec<FieldValue>)> = table
            .records
            .into_par_iter()
            .map(|record| {
                let raw_id = record.cells[id_idx].clone();
                let id = ItemId::parse(&raw_id);
                let values = record.cells.iter().map(|c| parser::parse_cell(c)).collect();
                (record.line, id, raw_id, values)
            })
            .collect();

        let mut rows = Vec::with_capacity(typed.len());
        let mut index = HashMap::with_capacity(typed.len());
        let mut first_lines: HashMap<ItemId, u64> = HashMap::with_capacity(typed.len());

        for (line, id, raw_id, values) in typed {
            let id = id.ok_or_else(|| CatalogLoadError::InvalidIdentifier {
                source_name: source_name.to_string(),
                line,
                value: raw_id,
            })?;

            match first_lines.entry(id.clone()) {
                Entry::Occupied(first) => {
                    return Err(CatalogLoadError::DuplicateId {
                        id: id.to_string(),
                        line,
                        first_line: *first.get(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(line);
                }
            }

            index.insert(id.clone(), rows.len());
            rows.push(CatalogRow {
                id,
                columns: columns.clone(),
                values,
            });
        }

        debug!("Indexed {} catalog rows from {}", rows.len(), source_name);

        Ok(Self {
            id_column: id_column.to_string(),
            columns,
            rows,
            index,
        })
    }

    /// Case-insensitive substring search over a text column
    ///
    /// Exact matches come first, then substring matches; within each group
    /// rows keep their load order. An unknown column yields no matches.
    pub fn search(&self, column: &str, needle: &str) -> Vec<&CatalogRow> {
        let Some(col_idx) = self.columns.iter().position(|c| c == column) else {
            return Vec::new();
        };
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut exact = Vec::new();
        let mut partial = Vec::new();
        for row in &self.rows {
            let Some(text) = row.values[col_idx].as_text() else {
                continue;
            };
            let text = text.to_lowercase();
            if text == needle {
                exact.push(row);
            } else if text.contains(&needle) {
                partial.push(row);
            }
        }
        exact.extend(partial);
        exact
    }
}
