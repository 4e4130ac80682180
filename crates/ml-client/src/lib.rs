//! Client side of the external ranking model.
//!
//! The pre-trained place recommender is opaque to this workspace: it takes
//! `{items: {id: rating}, k}` and answers with scored item ids. This crate
//! provides:
//! - The `RankingModel` capability trait the service depends on
//! - Query and candidate types
//! - `GrpcRankingModel`, which calls the model-serving sidecar over gRPC

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

pub mod grpc;

// Generated protobuf code for proto/ranking.proto
pub mod ranking {
    tonic::include_proto!("ranking");
}

pub use grpc::{rank_candidates, GrpcRankingModel};

/// Errors that can occur when interacting with the ranking model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MLClientError {
    #[error("Failed to connect to ranking model: {0}")]
    ConnectionError(String),

    /// The model refused the input (unknown item, bad rating, ...)
    #[error("Ranking model rejected the input: {0}")]
    Rejected(String),

    #[error("Failed to score items: {0}")]
    ScoringError(String),

    #[error("Invalid response from ranking model: {0}")]
    InvalidResponse(String),
}

/// Input to the ranking model: the user's ratings and how many items to return
#[derive(Debug, Clone, PartialEq)]
pub struct RankingQuery {
    pub items: BTreeMap<String, f64>,
    pub k: usize,
}

impl RankingQuery {
    /// Query for a single rated item, the only shape the HTTP surface sends
    pub fn single(item_id: impl Into<String>, rating: f64, k: usize) -> Self {
        let mut items = BTreeMap::new();
        items.insert(item_id.into(), rating);
        Self { items, k }
    }
}

/// One recommended item with its score (higher is better)
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub item_id: String,
    pub score: f64,
}

impl ScoredCandidate {
    pub fn new(item_id: impl Into<String>, score: f64) -> Self {
        Self {
            item_id: item_id.into(),
            score,
        }
    }
}

/// Narrow capability interface over the ranking model.
///
/// Implementations return candidates best first; callers keep that order.
#[async_trait]
pub trait RankingModel: Send + Sync {
    async fn predict(&self, query: &RankingQuery) -> Result<Vec<ScoredCandidate>, MLClientError>;
}
