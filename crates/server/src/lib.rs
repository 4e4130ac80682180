//! Server crate for the place recommendation service.
//!
//! This crate contains the `RecommendationService` that joins ranking model
//! output with the catalog, request validation, the error taxonomy and the
//! HTTP surface.

pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod service;

pub use config::{QueryLimits, ServiceConfig};
pub use error::RecommendationError;
pub use query::RatingQuery;
pub use service::{EnrichedResult, RecommendationService, Recommendations};
