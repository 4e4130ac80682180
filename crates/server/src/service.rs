//! # Recommendation Service
//!
//! Turns one validated `(item, rating)` query into ranked, enriched places:
//! 1. Ask the ranking model for `top_k` candidates (under a deadline)
//! 2. Keep at most `top_k` candidates, in the model's order
//! 3. Join each candidate with its catalog row
//! 4. Return the joined results without re-sorting
//!
//! Candidates the catalog does not know are dropped and logged; they are
//! never returned with an empty detail.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use catalog::{CatalogRow, ItemId, ReferenceCatalog};
use ml_client::{GrpcRankingModel, RankingModel, RankingQuery, ScoredCandidate};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::error::{RecommendationError, Result};
use crate::query::RatingQuery;

/// One recommended place: catalog detail plus the model's score
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedResult {
    pub item_id: ItemId,
    pub detail: CatalogRow,
    pub probability: f64,
}

/// Ranked results, best first.
///
/// Serialises as a JSON object keyed by item id whose key order is the
/// ranking order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recommendations(Vec<EnrichedResult>);

impl Recommendations {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EnrichedResult> {
        self.0.iter()
    }
}

#[derive(Serialize)]
struct ResultBody<'a> {
    detail: &'a CatalogRow,
    probability: f64,
}

impl Serialize for Recommendations {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for result in &self.0 {
            map.serialize_entry(
                &result.item_id,
                &ResultBody {
                    detail: &result.detail,
                    probability: result.probability,
                },
            )?;
        }
        map.end()
    }
}

/// Stateless orchestrator over two read-only resources: the catalog and the model
#[derive(Clone)]
pub struct RecommendationService {
    catalog: Arc<ReferenceCatalog>,
    model: Arc<dyn RankingModel>,
    model_timeout: Duration,
}

impl RecommendationService {
    /// Create a service from already-built dependencies
    ///
    /// # Arguments
    /// * `catalog` - Shared reference catalog
    /// * `model` - Ranking model (the gRPC client in production, a stub in tests)
    /// * `model_timeout` - Deadline for each model call
    pub fn new(
        catalog: Arc<ReferenceCatalog>,
        model: Arc<dyn RankingModel>,
        model_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            model,
            model_timeout,
        }
    }

    /// Load the catalog and connect to the model sidecar.
    ///
    /// Any failure here is fatal: the service must not accept traffic
    /// without its catalog.
    pub async fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let path = config.catalog_path.clone();
        let id_column = config.id_column.clone();
        let catalog = tokio::task::spawn_blocking(move || ReferenceCatalog::load(&path, &id_column))
            .await
            .context("Catalog load task panicked")?
            .with_context(|| format!("Failed to load catalog {}", config.catalog_path.display()))?;

        let model = GrpcRankingModel::connect(&config.model_addr, config.model_connect_timeout)
            .await?;
        info!("Connected to ranking model at {}", model.service_address());

        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(model),
            config.model_timeout,
        ))
    }

    pub fn catalog(&self) -> &ReferenceCatalog {
        &self.catalog
    }

    /// Main entry point: recommend places for one rated item
    pub async fn recommend(&self, query: &RatingQuery) -> Result<Recommendations> {
        let start_time = Instant::now();

        let candidates = self.rank(query).await?;
        debug!(
            "Model returned {} candidates for item {}",
            candidates.len(),
            query.item
        );

        let recommendations = self.enrich(candidates, query.top_k);

        info!(
            "Recommended {} places for item {} (rating {}, k {}) in {:.2?}",
            recommendations.len(),
            query.item,
            query.rating,
            query.top_k,
            start_time.elapsed()
        );
        Ok(recommendations)
    }

    /// Call the model under the configured deadline
    async fn rank(&self, query: &RatingQuery) -> Result<Vec<ScoredCandidate>> {
        let model_query = RankingQuery::single(query.item.as_str(), query.rating, query.top_k);

        match tokio::time::timeout(self.model_timeout, self.model.predict(&model_query)).await {
            Ok(Ok(candidates)) => Ok(candidates),
            Ok(Err(e)) => {
                error!("Ranking model failed for item {}: {}", query.item, e);
                Err(RecommendationError::ModelInference(e))
            }
            Err(_) => {
                warn!(
                    "Ranking model timed out after {:?} for item {}",
                    self.model_timeout, query.item
                );
                Err(RecommendationError::ModelTimeout(self.model_timeout))
            }
        }
    }

    /// Join candidates with catalog rows, keeping the model's order
    fn enrich(&self, mut candidates: Vec<ScoredCandidate>, top_k: usize) -> Recommendations {
        candidates.truncate(top_k);

        let mut seen = HashSet::with_capacity(candidates.len());
        let results = candidates
            .into_iter()
            .filter_map(|candidate| {
                let Some(item_id) = ItemId::parse(&candidate.item_id) else {
                    warn!("Dropping candidate with blank id (score {})", candidate.score);
                    return None;
                };
                if !seen.insert(item_id.clone()) {
                    warn!("Dropping repeated candidate {}", item_id);
                    return None;
                }
                let Some(row) = self.catalog.lookup(&item_id) else {
                    warn!(
                        "Dropping candidate {} (score {}): not in catalog",
                        item_id, candidate.score
                    );
                    return None;
                };
                Some(EnrichedResult {
                    item_id,
                    detail: row.clone(),
                    probability: candidate.score,
                })
            })
            .collect();

        Recommendations(results)
    }
}
