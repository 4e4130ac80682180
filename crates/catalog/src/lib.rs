//! # Catalog Crate
//!
//! This crate loads the reference dataset of recommendable places (a CSV
//! file such as `tourism_with_id.csv`) into an immutable in-memory index.
//!
//! ## Main Components
//!
//! - **types**: `ItemId`, `FieldValue`, `CatalogRow`, `ReferenceCatalog`
//! - **parser**: CSV reading, header normalisation and cell typing
//! - **index**: building and querying the identifier index
//! - **error**: `CatalogLoadError`
//!
//! ## Example Usage
//!
//! ```ignore
//! use catalog::{ItemId, ReferenceCatalog};
//! use std::path::Path;
//!
//! let catalog = ReferenceCatalog::load(Path::new("data/tourism_with_id.csv"), "Place_Id")?;
//!
//! if let Some(row) = catalog.lookup(&ItemId::from_i64(7)) {
//!     println!("{:?}", row.get("Place_Name"));
//! }
//! ```

pub mod error;
pub mod index;
pub mod parser;
pub mod types;

pub use error::{CatalogLoadError, Result};
pub use types::{CatalogRow, FieldValue, ItemId, ReferenceCatalog};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_normalisation() {
        assert_eq!(ItemId::parse("7"), Some(ItemId::from_i64(7)));
        assert_eq!(ItemId::parse(" 7 "), Some(ItemId::from_i64(7)));
        assert_eq!(ItemId::parse("7.0"), Some(ItemId::from_i64(7)));
        assert_eq!(ItemId::from_f64(7.0), Some(ItemId::from_i64(7)));
        assert_eq!(ItemId::parse("P-7").map(String::from), Some("P-7".to_string()));
        assert_eq!(ItemId::parse("  "), None);
    }

    #[test]
    fn test_item_id_rejects_fractional_numbers() {
        assert_eq!(ItemId::from_f64(7.5), None);
        assert_eq!(ItemId::from_f64(f64::NAN), None);
        assert_eq!(ItemId::from_f64(f64::INFINITY), None);
        // As text, a fractional id is kept verbatim
        assert_eq!(ItemId::parse("7.5").map(String::from), Some("7.5".to_string()));
    }

    #[test]
    fn test_row_serialises_in_header_order() {
        let catalog = ReferenceCatalog::from_reader(
            "Place_Id,Name,Price\n7,Museum,\n".as_bytes(),
            "inline",
            "Place_Id",
        )
        .unwrap();
        let row = catalog.lookup(&ItemId::from_i64(7)).unwrap();
        let json = serde_json::to_string(row).unwrap();
        assert_eq!(json, r#"{"Place_Id":7,"Name":"Museum","Price":null}"#);
    }
}
