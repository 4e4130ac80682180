//! Request validation.
//!
//! A `RatingQuery` can only be built through the checks in this module, so
//! by the time the service holds one the model will be called with
//! well-formed input.

use catalog::ItemId;
use serde_json::{Map, Value};

use crate::config::QueryLimits;
use crate::error::{RecommendationError, Result};

const ITEM_FIELD: &str = "Item";
const RATING_FIELD: &str = "Rating";
const TOP_K_FIELD: &str = "TopK";

/// A validated recommendation request
#[derive(Debug, Clone, PartialEq)]
pub struct RatingQuery {
    pub item: ItemId,
    pub rating: f64,
    pub top_k: usize,
}

impl RatingQuery {
    /// Validate already-typed input (used by the CLI)
    pub fn new(item: ItemId, rating: f64, top_k: usize, limits: &QueryLimits) -> Result<Self> {
        Ok(Self {
            item,
            rating: check_rating(rating, limits)?,
            top_k: check_top_k(top_k as u64, limits)?,
        })
    }

    /// Validate a JSON body of the form `{"Item": 7, "Rating": 4, "TopK": 5}`.
    ///
    /// `Item` may be an integer or a string, `Rating` must be a number and
    /// `TopK` is optional.
    pub fn from_json(body: &[u8], limits: &QueryLimits) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| invalid(format!("Request body is not valid JSON: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| invalid("Request body must be a JSON object"))?;

        let item = parse_item(object)?;
        let rating = parse_rating(object)?;
        let top_k = match present(object, TOP_K_FIELD) {
            None => limits.default_top_k,
            Some(v) => {
                let k = v.as_u64().ok_or_else(|| top_k_error(limits))?;
                check_top_k(k, limits)?
            }
        };

        Ok(Self {
            item,
            rating: check_rating(rating, limits)?,
            top_k,
        })
    }
}

fn invalid(reason: impl Into<String>) -> RecommendationError {
    RecommendationError::InvalidRequest(reason.into())
}

/// A field that is absent or `null` counts as missing
fn present<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    object.get(field).filter(|v| !v.is_null())
}

fn parse_item(object: &Map<String, Value>) -> Result<ItemId> {
    let value = present(object, ITEM_FIELD)
        .ok_or_else(|| invalid(format!("Missing field '{}'", ITEM_FIELD)))?;
    match value {
        Value::Number(n) => {
            let id = match n.as_i64() {
                Some(i) => Some(ItemId::from_i64(i)),
                None => n.as_f64().and_then(ItemId::from_f64),
            };
            id.ok_or_else(|| invalid(format!("Field '{}' must be an integer identifier", ITEM_FIELD)))
        }
        Value::String(s) => ItemId::parse(s)
            .ok_or_else(|| invalid(format!("Field '{}' must not be empty", ITEM_FIELD))),
        _ => Err(invalid(format!(
            "Field '{}' must be a number or a string",
            ITEM_FIELD
        ))),
    }
}

fn parse_rating(object: &Map<String, Value>) -> Result<f64> {
    let value = present(object, RATING_FIELD)
        .ok_or_else(|| invalid(format!("Missing field '{}'", RATING_FIELD)))?;
    value
        .as_f64()
        .ok_or_else(|| invalid(format!("Field '{}' must be a number", RATING_FIELD)))
}

fn check_rating(rating: f64, limits: &QueryLimits) -> Result<f64> {
    if !rating.is_finite() {
        return Err(invalid(format!("Field '{}' must be a finite number", RATING_FIELD)));
    }
    if rating < limits.min_rating || rating > limits.max_rating {
        return Err(invalid(format!(
            "Field '{}' must be between {} and {}",
            RATING_FIELD, limits.min_rating, limits.max_rating
        )));
    }
    Ok(rating)
}

fn check_top_k(k: u64, limits: &QueryLimits) -> Result<usize> {
    match usize::try_from(k) {
        Ok(k) if k >= 1 && k <= limits.max_top_k => Ok(k),
        _ => Err(top_k_error(limits)),
    }
}

fn top_k_error(limits: &QueryLimits) -> RecommendationError {
    invalid(format!(
        "Field '{}' must be an integer between 1 and {}",
        TOP_K_FIELD, limits.max_top_k
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<RatingQuery> {
        RatingQuery::from_json(body.as_bytes(), &QueryLimits::default())
    }

    fn reason(result: Result<RatingQuery>) -> String {
        match result {
            Err(RecommendationError::InvalidRequest(reason)) => reason,
            other => panic!("expected InvalidRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_body() {
        let query = parse(r#"{"Item": 7, "Rating": 4}"#).unwrap();
        assert_eq!(query.item, ItemId::from_i64(7));
        assert_eq!(query.rating, 4.0);
        assert_eq!(query.top_k, 5, "TopK defaults to 5");
    }

    #[test]
    fn test_item_spellings() {
        // The browser client sends parseFloat() output
        assert_eq!(parse(r#"{"Item": 7.0, "Rating": 4.5}"#).unwrap().item, ItemId::from_i64(7));
        assert_eq!(parse(r#"{"Item": "7", "Rating": 4.5}"#).unwrap().item, ItemId::from_i64(7));
        assert_eq!(
            parse(r#"{"Item": "P-7", "Rating": 4.5}"#).unwrap().item.as_str(),
            "P-7"
        );
    }

    #[test]
    fn test_explicit_top_k() {
        assert_eq!(parse(r#"{"Item": 7, "Rating": 4, "TopK": 10}"#).unwrap().top_k, 10);
        assert!(reason(parse(r#"{"Item": 7, "Rating": 4, "TopK": 0}"#)).contains("TopK"));
        assert!(reason(parse(r#"{"Item": 7, "Rating": 4, "TopK": 51}"#)).contains("TopK"));
        assert!(reason(parse(r#"{"Item": 7, "Rating": 4, "TopK": 2.5}"#)).contains("TopK"));
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(reason(parse(r#"{"Item": 7}"#)), "Missing field 'Rating'");
        assert_eq!(reason(parse(r#"{"Rating": 4}"#)), "Missing field 'Item'");
        assert_eq!(reason(parse(r#"{"Item": 7, "Rating": null}"#)), "Missing field 'Rating'");
    }

    #[test]
    fn test_wrong_types() {
        assert!(reason(parse(r#"{"Item": 7, "Rating": "4"}"#)).contains("must be a number"));
        assert!(reason(parse(r#"{"Item": [7], "Rating": 4}"#)).contains("number or a string"));
        assert!(reason(parse(r#"{"Item": 7.5, "Rating": 4}"#)).contains("integer"));
        assert!(reason(parse(r#"{"Item": "  ", "Rating": 4}"#)).contains("empty"));
    }

    #[test]
    fn test_rating_out_of_range() {
        assert!(reason(parse(r#"{"Item": 7, "Rating": 9}"#)).contains("between 1 and 5"));
        assert!(reason(parse(r#"{"Item": 7, "Rating": 0}"#)).contains("between"));
    }

    #[test]
    fn test_malformed_bodies() {
        assert!(reason(parse("")).contains("not valid JSON"));
        assert!(reason(parse("{Item: 7}")).contains("not valid JSON"));
        assert_eq!(reason(parse("[1, 2]")), "Request body must be a JSON object");
    }

    #[test]
    fn test_new_validates_typed_input() {
        let limits = QueryLimits::default();
        assert!(RatingQuery::new(ItemId::from_i64(1), 3.0, 5, &limits).is_ok());
        assert!(RatingQuery::new(ItemId::from_i64(1), f64::NAN, 5, &limits).is_err());
        assert!(RatingQuery::new(ItemId::from_i64(1), 3.0, 0, &limits).is_err());
    }
}
